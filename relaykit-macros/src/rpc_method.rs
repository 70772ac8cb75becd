//! `#[derive(RpcMethod)]` implementation
//!
//! 1. **Parse**: the deriving item as `syn::DeriveInput`
//! 2. **Extract**: the single `#[rpc(method = "...")]` attribute
//! 3. **Quote**: an `RpcMethod` impl carrying the name as a constant
//!
//! Errors are reported as `compile_error!` spans on the offending attribute
//! rather than panics, so the user sees them at the right source location.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr};

pub fn derive_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let method = method_name(input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::relaykit_core::RpcMethod for #name #ty_generics #where_clause {
            const METHOD: &'static str = #method;
        }
    })
}

fn method_name(input: &DeriveInput) -> syn::Result<LitStr> {
    let mut found: Option<LitStr> = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("rpc")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("method") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(meta.error("rpc method name must not be empty"));
                }
                if found.is_some() {
                    return Err(meta.error("duplicate rpc method name"));
                }
                found = Some(lit);
                Ok(())
            } else {
                Err(meta.error("unsupported rpc attribute, expected `method = \"...\"`"))
            }
        })?;
    }

    found.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "missing #[rpc(method = \"...\")] attribute for RpcMethod derive",
        )
    })
}
