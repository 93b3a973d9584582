use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use catalog_core::{Entity, ProductId};

use crate::money::to_money_scale;
use crate::patch::{self, Patch, PatchError};
use crate::validation::{self, ValidationErrors, Violation};

/// Editable snapshot of a product: exactly the fields a client may set.
///
/// Every field is optional so the snapshot can represent incomplete input and
/// the result of a patch that removed a member. [`crate::validation`] decides
/// which absences are acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductDraft {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price_source: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl ProductDraft {
    /// Apply a JSON patch to this snapshot, producing a new candidate.
    ///
    /// The snapshot itself is never modified. The candidate is *not* validated;
    /// callers run the validator on the result.
    pub fn apply_patch(&self, patch: &Patch) -> Result<ProductDraft, PatchError> {
        let tree = serde_json::to_value(self).map_err(|e| PatchError::InvalidValue(e.to_string()))?;
        let patched = patch::apply(&tree, patch)?;
        serde_json::from_value(patched).map_err(|e| PatchError::InvalidValue(e.to_string()))
    }
}

/// Editable fields after validation (required fields are present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub code: String,
    pub name: Option<String>,
    pub price_source: Decimal,
    pub description: Option<String>,
    pub is_available: bool,
}

impl TryFrom<ProductDraft> for ProductFields {
    type Error = ValidationErrors;

    fn try_from(draft: ProductDraft) -> Result<Self, Self::Error> {
        let mut missing: Vec<Violation> = Vec::new();
        if draft.code.is_none() {
            missing.push(validation::violation_for("code"));
        }
        if draft.price_source.is_none() {
            missing.push(validation::violation_for("price_source"));
        }
        if draft.is_available.is_none() {
            missing.push(validation::violation_for("is_available"));
        }

        match (draft.code, draft.price_source, draft.is_available) {
            (Some(code), Some(price_source), Some(is_available)) => Ok(Self {
                code,
                name: draft.name,
                price_source: to_money_scale(price_source),
                description: draft.description,
                is_available,
            }),
            _ => Err(ValidationErrors::new(missing)),
        }
    }
}

/// A validated product that has not been stored yet (no id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub fields: ProductFields,
    pub price_target: Decimal,
}

impl NewProduct {
    pub fn new(fields: ProductFields, price_target: Decimal) -> Self {
        Self { fields, price_target: to_money_scale(price_target) }
    }
}

/// How an edit affects the derived target price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUpdate {
    /// Keep both the stored source price and the derived target price.
    Unchanged,
    /// Take the edit's source price and this freshly converted target price.
    Repriced { price_target: Decimal },
}

/// A stored product record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    code: String,
    name: Option<String>,
    price_source: Decimal,
    price_target: Decimal,
    description: Option<String>,
    is_available: bool,
}

impl Product {
    /// Assemble a stored record (used by stores after insert or load).
    pub fn from_new(id: ProductId, new: NewProduct) -> Self {
        let NewProduct { fields, price_target } = new;
        Self {
            id,
            code: fields.code,
            name: fields.name,
            price_source: to_money_scale(fields.price_source),
            price_target: to_money_scale(price_target),
            description: fields.description,
            is_available: fields.is_available,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn price_source(&self) -> Decimal {
        self.price_source
    }

    pub fn price_target(&self) -> Decimal {
        self.price_target
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    /// Snapshot of the editable fields (the patch target).
    pub fn draft(&self) -> ProductDraft {
        ProductDraft {
            code: Some(self.code.clone()),
            name: self.name.clone(),
            price_source: Some(self.price_source),
            description: self.description.clone(),
            is_available: Some(self.is_available),
        }
    }

    /// Overwrite every editable field.
    ///
    /// The source price only changes together with a new target price, so the
    /// pair always reflects one conversion.
    pub fn apply_edit(&mut self, fields: ProductFields, price: PriceUpdate) {
        self.code = fields.code;
        self.name = fields.name;
        self.description = fields.description;
        self.is_available = fields.is_available;
        if let PriceUpdate::Repriced { price_target } = price {
            self.price_source = to_money_scale(fields.price_source);
            self.price_target = to_money_scale(price_target);
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
