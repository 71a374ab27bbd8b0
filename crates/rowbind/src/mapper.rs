//! Field-name to column-name mapping.

/// Convert an UpperCamelCase or mixedCase identifier into snake_case.
///
/// Initialisms are kept together: `HTTPServerID` maps to `http_server_id`,
/// not `h_t_t_p_server_i_d`. Identifiers that are already snake_case pass
/// through unchanged.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            // A word boundary sits before an uppercase letter when the
            // previous character is lowercase or a digit, or when this
            // letter starts a new word after an initialism (next char is
            // lowercase).
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1);
            let after_lower = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            let initialism_end = prev.is_some_and(|p| p.is_uppercase())
                && next.is_some_and(|n| n.is_lowercase());
            if after_lower || initialism_end {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
