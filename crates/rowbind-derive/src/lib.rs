//! Derive macro generating the static field tables and positional field
//! access behind `rowbind`'s `Record` trait.
//!
//! Supported field attributes, all under the `db` namespace:
//!
//! - `#[db(rename = "column")]`: bind the field to an explicit column
//!   name instead of the engine's mapped field name.
//! - `#[db(nested)]`: the field is itself a `Record` and contributes
//!   prefixed columns.
//! - `#[db(flatten)]`: like `nested`, but the inner columns keep the
//!   parent's prefix.
//! - `#[db(skip)]`: the field never binds to a column; it must implement
//!   `Default`.
//!
//! Nested fields may be wrapped in `Option`; the inner record is
//! allocated lazily when a column first targets it.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Type};

#[proc_macro_derive(Record, attributes(db))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct FieldSpec {
    ident: syn::Ident,
    ty: Type,
    rename: Option<String>,
    nested: bool,
    flatten: bool,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record requires named fields",
        ));
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let mut specs = Vec::new();
    for field in &fields.named {
        let mut rename = None;
        let mut nested = false;
        let mut flatten = false;
        let mut skip = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("db") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    rename = Some(lit.value());
                    Ok(())
                } else if meta.path.is_ident("nested") {
                    nested = true;
                    Ok(())
                } else if meta.path.is_ident("flatten") {
                    nested = true;
                    flatten = true;
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error(
                        "unsupported db attribute, expected rename, nested, flatten, or skip",
                    ))
                }
            })?;
        }
        if skip {
            continue;
        }
        specs.push(FieldSpec {
            ident: field.ident.clone().expect("named field"),
            ty: field.ty.clone(),
            rename,
            nested,
            flatten,
        });
    }

    let name = &input.ident;
    let name_str = name.to_string();

    let mut defs = Vec::new();
    let mut arms = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        let ident = &spec.ident;
        let field_name = ident.to_string();
        let column = match &spec.rename {
            Some(column) => quote!(::core::option::Option::Some(#column)),
            None => quote!(::core::option::Option::None),
        };
        if spec.nested {
            let inner = option_inner(&spec.ty);
            let target = inner.unwrap_or(&spec.ty);
            let flatten = spec.flatten;
            defs.push(quote! {
                ::rowbind::record::FieldDef {
                    name: #field_name,
                    column: #column,
                    kind: ::rowbind::record::FieldKind::Nested {
                        type_id: ::rowbind::record::type_id_of::<#target>,
                        fields: <#target as ::rowbind::record::Record>::fields,
                        flatten: #flatten,
                    },
                }
            });
            let access = if inner.is_some() {
                quote! {
                    self.#ident.get_or_insert_with(
                        <#target as ::core::default::Default>::default,
                    )
                }
            } else {
                quote!(&mut self.#ident)
            };
            arms.push(quote! {
                #index => ::core::result::Result::Ok(
                    ::rowbind::record::FieldMut::Record(#access),
                ),
            });
        } else {
            defs.push(quote! {
                ::rowbind::record::FieldDef {
                    name: #field_name,
                    column: #column,
                    kind: ::rowbind::record::FieldKind::Scalar,
                }
            });
            arms.push(quote! {
                #index => ::core::result::Result::Ok(
                    ::rowbind::record::FieldMut::Slot(&mut self.#ident),
                ),
            });
        }
    }

    Ok(quote! {
        impl ::rowbind::record::Composite for #name {
            fn child_mut(
                &mut self,
                index: usize,
            ) -> ::rowbind::error::Result<::rowbind::record::FieldMut<'_>> {
                match index {
                    #(#arms)*
                    _ => ::core::result::Result::Err(
                        ::rowbind::error::Error::invalid_destination(
                            "field index out of range",
                        ),
                    ),
                }
            }

            fn self_slot(
                &mut self,
            ) -> ::core::option::Option<&mut dyn ::rowbind::value::Slot> {
                use ::rowbind::record::ProbeFallback as _;
                ::rowbind::record::SlotProbe(self).slot()
            }

            fn type_label(&self) -> &'static str {
                #name_str
            }
        }

        impl ::rowbind::record::Record for #name {
            fn fields() -> &'static [::rowbind::record::FieldDef] {
                static FIELDS: &[::rowbind::record::FieldDef] = &[#(#defs),*];
                FIELDS
            }
        }

        impl ::rowbind::resolve::Destination for #name {
            fn binding(
                engine: &::rowbind::engine::Engine,
            ) -> ::rowbind::error::Result<::rowbind::resolve::Binding> {
                ::core::result::Result::Ok(::rowbind::resolve::record_binding(
                    engine,
                    <Self as ::rowbind::record::Record>::fields(),
                ))
            }

            fn slot(
                &mut self,
                path: &[usize],
            ) -> ::rowbind::error::Result<&mut dyn ::rowbind::value::Slot> {
                ::rowbind::record::descend(self, path)
            }
        }
    })
}

/// The `T` in `Option<T>`, if the type is spelled that way.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
