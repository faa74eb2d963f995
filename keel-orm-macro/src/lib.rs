//! # Keel ORM Procedural Macros
//!
//! This crate provides `#[derive(Record)]` for the Keel ORM framework. It is
//! re-exported by `keel-orm` and not meant to be used directly.
//!
//! The derive does not interpret annotations. It records each field's logical
//! name, value kind, optionality and raw annotation string in a
//! `RecordDescriptor`; the runtime schema parser turns that into a model, so a
//! malformed annotation is reported as an error when the model is first used.
//!
//! ```rust,ignore
//! use keel_orm::Record;
//!
//! #[derive(Record, Debug, Default)]
//! #[orm(table = "people", hooks(before_create, after_find))]
//! struct Person {
//!     #[orm("primaryKey;autoIncrement")]
//!     id: i64,
//!     #[orm("size:64;index")]
//!     name: String,
//!     nickname: Option<String>,
//!     #[orm("-")]
//!     scratch: Vec<String>,
//! }
//! ```
//!
//! ## Struct Attributes
//!
//! - `table = "NAME"` - Explicit table name
//! - `hooks(...)` - Lifecycle hooks the struct implements: `before_create`,
//!   `after_create`, `before_update`, `after_update`, `before_delete`,
//!   `after_delete`, `after_find`. Only listed hooks run: a hook trait
//!   implemented without being listed here is never invoked. A listed hook
//!   without a matching trait impl fails to compile.
//!
//! ## Field Attributes
//!
//! `#[orm("...")]` carries the annotation string verbatim. Fields marked `"-"`
//! are not mapped; their type only needs `Default`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod derive_record;

/// Derives `keel_orm::Record` for a struct with named fields.
#[proc_macro_derive(Record, attributes(orm))]
pub fn record_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    derive_record::expand(ast).unwrap_or_else(syn::Error::into_compile_error).into()
}
