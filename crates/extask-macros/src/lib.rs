//! Procedural macros for the extask task binding library.
//!
//! # TaskFailure Derive Macro
//!
//! Implements `FailureCategory` for an error type so handler failures can be
//! matched against error mappings by category.
//!
//! ## Usage
//!
//! ```ignore
//! #[derive(Debug, thiserror::Error, TaskFailure)]
//! #[failure(extends = "PaymentFailure")]   // extra ancestors for every variant
//! enum CardError {
//!     #[error("card declined")]
//!     Declined,                              // category "Declined", is-a "CardError"
//!     #[error("card expired")]
//!     #[failure(category = "CardExpired")]   // override for this variant
//!     Expired { month: u8 },
//! }
//! ```
//!
//! For structs the category is the type name (or `#[failure(category = "...")]`).

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Variant, parse_macro_input, spanned::Spanned};

/// Derives `FailureCategory` for an enum or struct.
///
/// Use `#[failure(category = "...")]` to rename a category and
/// `#[failure(extends = "...")]` (repeatable) on the type to declare ancestors.
#[proc_macro_derive(TaskFailure, attributes(failure))]
pub fn derive_task_failure(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_task_failure_impl(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed contents of `#[failure(...)]` attributes on one item.
#[derive(Default)]
struct FailureAttr {
    category: Option<LitStr>,
    extends: Vec<LitStr>,
}

fn derive_task_failure_impl(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let type_attr = parse_failure_attrs(&input.attrs)?;
    let type_category = type_attr
        .category
        .clone()
        .unwrap_or_else(|| LitStr::new(&name.to_string(), name.span()));
    let extends = &type_attr.extends;

    let body = match &input.data {
        Data::Struct(_) => quote! {
            ::extask::Category::new(#type_category)
                #(.extends(#extends))*
        },
        Data::Enum(data) => {
            let mut match_arms = Vec::new();
            for variant in &data.variants {
                match_arms.push(generate_match_arm(name, variant, &type_category, extends)?);
            }
            if match_arms.is_empty() {
                quote! { match *self {} }
            } else {
                quote! {
                    match self {
                        #(#match_arms)*
                    }
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "TaskFailure can only be derived for enums and structs",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::extask::FailureCategory for #name #ty_generics #where_clause {
            fn category(&self) -> ::extask::Category {
                #body
            }
        }
    })
}

/// Collect every `#[failure(...)]` attribute on an item.
fn parse_failure_attrs(attrs: &[Attribute]) -> syn::Result<FailureAttr> {
    let mut parsed = FailureAttr::default();

    for attr in attrs {
        if !attr.path().is_ident("failure") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("category") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().trim().is_empty() {
                    return Err(meta.error("failure category must not be empty"));
                }
                parsed.category = Some(value);
                Ok(())
            } else if meta.path.is_ident("extends") {
                let value: LitStr = meta.value()?.parse()?;
                parsed.extends.push(value);
                Ok(())
            } else {
                Err(meta.error("expected `category = \"...\"` or `extends = \"...\"`"))
            }
        })?;
    }

    Ok(parsed)
}

/// Generate a match arm for a variant.
fn generate_match_arm(
    enum_name: &syn::Ident,
    variant: &Variant,
    type_category: &LitStr,
    extends: &[LitStr],
) -> syn::Result<proc_macro2::TokenStream> {
    let variant_name = &variant.ident;
    let variant_attr = parse_failure_attrs(&variant.attrs)?;

    if !variant_attr.extends.is_empty() {
        return Err(syn::Error::new(
            variant.span(),
            "`extends` is only supported on the type; variants always extend the type category",
        ));
    }

    let category = variant_attr
        .category
        .unwrap_or_else(|| LitStr::new(&variant_name.to_string(), variant_name.span()));

    let pattern = match &variant.fields {
        Fields::Named(_) => quote! { #enum_name::#variant_name { .. } },
        Fields::Unnamed(_) => quote! { #enum_name::#variant_name(..) },
        Fields::Unit => quote! { #enum_name::#variant_name },
    };

    Ok(quote! {
        #pattern => ::extask::Category::new(#category)
            .extends(#type_category)
            #(.extends(#extends))*,
    })
}
