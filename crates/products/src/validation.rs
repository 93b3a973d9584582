//! Declarative field validation for product input.
//!
//! Rules live in a single table ([`PRODUCT_RULES`]) and are evaluated in table
//! order by a pure function. Every failing rule is reported; evaluation never
//! stops at the first violation.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::product::ProductDraft;

pub const CODE_INVALID: &str = "The product code is invalid";
pub const NAME_TOO_LONG: &str = "The product name cannot exceed 32 characters";
pub const PRICE_NOT_POSITIVE: &str = "The product price must be positive";
pub const DESCRIPTION_TOO_LONG: &str = "The product description cannot exceed 128 characters";
pub const AVAILABILITY_MISSING: &str = "Product availability must be defined";

pub const NAME_MAX_CHARS: usize = 32;
pub const DESCRIPTION_MAX_CHARS: usize = 128;

static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{10}$").expect("product code pattern compiles"));

/// A single failed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub message: &'static str,
}

/// Outcome of validating a candidate record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<Violation>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(violations) => Err(ValidationErrors(violations)),
        }
    }
}

/// Aggregated violations, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", join_messages(.0))]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self(violations)
    }

    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    pub fn messages(&self) -> Vec<&'static str> {
        self.0.iter().map(|v| v.message).collect()
    }
}

fn join_messages(violations: &[Violation]) -> String {
    violations.iter().map(|v| v.message).collect::<Vec<_>>().join("; ")
}

/// Seam for swapping the rule set (the service takes any `Validator`).
pub trait Validator: Send + Sync {
    fn validate(&self, candidate: &ProductDraft) -> ValidationResult;
}

/// The product rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductRules;

impl Validator for ProductRules {
    fn validate(&self, candidate: &ProductDraft) -> ValidationResult {
        validate(candidate)
    }
}

struct Rule {
    field: &'static str,
    message: &'static str,
    holds: fn(&ProductDraft) -> bool,
}

const PRODUCT_RULES: &[Rule] = &[
    Rule { field: "code", message: CODE_INVALID, holds: code_matches_pattern },
    Rule { field: "name", message: NAME_TOO_LONG, holds: name_within_limit },
    Rule { field: "price_source", message: PRICE_NOT_POSITIVE, holds: price_is_positive },
    Rule { field: "description", message: DESCRIPTION_TOO_LONG, holds: description_within_limit },
    Rule { field: "is_available", message: AVAILABILITY_MISSING, holds: availability_defined },
];

/// Evaluate every rule against `candidate`.
pub fn validate(candidate: &ProductDraft) -> ValidationResult {
    let violations: Vec<Violation> = PRODUCT_RULES
        .iter()
        .filter(|rule| !(rule.holds)(candidate))
        .map(|rule| Violation { field: rule.field, message: rule.message })
        .collect();

    if violations.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(violations)
    }
}

/// Rule message for a field, used when a required field is missing outright.
pub(crate) fn violation_for(field: &'static str) -> Violation {
    PRODUCT_RULES
        .iter()
        .find(|rule| rule.field == field)
        .map(|rule| Violation { field: rule.field, message: rule.message })
        .unwrap_or(Violation { field, message: "invalid value" })
}

fn code_matches_pattern(d: &ProductDraft) -> bool {
    d.code.as_deref().is_some_and(|code| CODE_PATTERN.is_match(code))
}

fn name_within_limit(d: &ProductDraft) -> bool {
    d.name.as_deref().is_none_or(|name| name.chars().count() <= NAME_MAX_CHARS)
}

fn price_is_positive(d: &ProductDraft) -> bool {
    d.price_source.is_some_and(|price| price > Decimal::ZERO)
}

fn description_within_limit(d: &ProductDraft) -> bool {
    d.description
        .as_deref()
        .is_none_or(|description| description.chars().count() <= DESCRIPTION_MAX_CHARS)
}

fn availability_defined(d: &ProductDraft) -> bool {
    d.is_available.is_some()
}
