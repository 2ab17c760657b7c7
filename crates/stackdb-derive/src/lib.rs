//! Derive macros for StackDB record types.

use proc_macro::TokenStream;

mod field_values;

/// Implements `FieldValues` for a struct with named fields.
///
/// Field attributes:
/// - `#[field(nested)]` resolves `name.rest` through the field's own
///   `FieldValues` impl.
/// - `#[field(index)]` lists the field in `indexed_fields()`.
/// - `#[field(skip)]` hides the field from path lookup.
#[proc_macro_derive(FieldValues, attributes(field))]
pub fn derive_field_values(input: TokenStream) -> TokenStream {
    field_values::derive_field_values(input.into()).into()
}
