//! Products domain module.
//!
//! This crate contains business rules for the product catalog, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage):
//! - `product`: the stored record, its editable snapshot and price update rules
//! - `validation`: the declarative field rule table
//! - `patch`: a JSON-Patch (RFC 6902) interpreter over record snapshots

pub mod money;
pub mod patch;
pub mod product;
pub mod validation;

pub use money::to_money_scale;
pub use patch::{Patch, PatchError, PatchOperation};
pub use product::{NewProduct, PriceUpdate, Product, ProductDraft, ProductFields};
pub use validation::{ProductRules, ValidationErrors, ValidationResult, Validator, Violation};
