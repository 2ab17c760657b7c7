use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident};

///
/// FieldAttrs
///

#[derive(Default)]
struct FieldAttrs {
    nested: bool,
    index: bool,
    skip: bool,
}

impl FieldAttrs {
    fn parse(field: &Field) -> syn::Result<Self> {
        let mut attrs = Self::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("field")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("nested") {
                    attrs.nested = true;
                } else if meta.path.is_ident("index") {
                    attrs.index = true;
                } else if meta.path.is_ident("skip") {
                    attrs.skip = true;
                } else {
                    return Err(meta.error("expected `nested`, `index` or `skip`"));
                }
                Ok(())
            })?;
        }

        if attrs.skip && (attrs.nested || attrs.index) {
            return Err(Error::new_spanned(
                field,
                "`skip` cannot be combined with `nested` or `index`",
            ));
        }

        Ok(attrs)
    }
}

// derive_field_values
pub fn derive_field_values(input: TokenStream) -> TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(input)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "FieldValues can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "FieldValues can only be derived for structs with named fields",
            ));
        }
    };

    let mut scalar_arms = Vec::new();
    let mut nested_arms = Vec::new();
    let mut indexed = Vec::new();

    for field in fields {
        let attrs = FieldAttrs::parse(field)?;
        if attrs.skip {
            continue;
        }

        let field_ident: &Ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;
        let name = field_ident.to_string();

        if attrs.index {
            indexed.push(name.clone());
        }
        if attrs.nested {
            nested_arms.push(quote! {
                #name => ::stackdb::value::FieldValues::get_value(&self.#field_ident, rest),
            });
        } else {
            scalar_arms.push(quote! {
                #name => Some(::stackdb::value::FieldValue::to_value(&self.#field_ident)),
            });
        }
    }

    let nested = if nested_arms.is_empty() {
        quote! {}
    } else {
        quote! {
            if let Some((head, rest)) = path.split_once('.') {
                return match head {
                    #(#nested_arms)*
                    _ => None,
                };
            }
        }
    };

    let indexed_fields = if indexed.is_empty() {
        quote! {}
    } else {
        quote! {
            fn indexed_fields() -> &'static [&'static str] {
                &[#(#indexed),*]
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::stackdb::value::FieldValues for #ident #ty_generics #where_clause {
            fn get_value(&self, path: &str) -> Option<::stackdb::value::Value> {
                #nested

                match path {
                    #(#scalar_arms)*
                    _ => None,
                }
            }

            #indexed_fields
        }
    })
}
