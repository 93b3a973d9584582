//! JSON-Patch (RFC 6902) interpreter over record snapshots.
//!
//! A [`Patch`] is an ordered list of [`PatchOperation`]s. [`apply`] runs them in
//! order against a *copy* of the snapshot and returns the copy, so a failure in
//! any operation leaves the caller's snapshot exactly as it was.
//!
//! Paths are RFC 6901 JSON pointers: `""` is the whole document, `/name` is a
//! top-level member, `~0` and `~1` escape `~` and `/`, and `-` addresses the
//! slot after the last element of an array (valid for `add` only).

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Failure while applying a patch. The first failing operation aborts the patch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid JSON pointer {0:?}")]
    InvalidPointer(String),

    #[error("no value at path {0:?}")]
    PathNotFound(String),

    #[error("test failed: value at {path:?} does not match")]
    TestFailed { path: String },

    #[error("cannot apply operation at {path:?}: {reason}")]
    InvalidTarget { path: String, reason: String },

    /// The patched document no longer has the shape of the patched record.
    #[error("patched document is invalid: {0}")]
    InvalidValue(String),
}

/// One JSON-Patch operation, in its wire form `{op, path, value?, from?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

/// An ordered patch document (the JSON array sent by clients).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOperation>);

impl Patch {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self(operations)
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }
}

impl From<Vec<PatchOperation>> for Patch {
    fn from(value: Vec<PatchOperation>) -> Self {
        Self(value)
    }
}

/// Apply `patch` to a copy of `snapshot`.
pub fn apply(snapshot: &Value, patch: &Patch) -> Result<Value, PatchError> {
    let mut doc = snapshot.clone();
    for op in patch.operations() {
        apply_operation(&mut doc, op)?;
    }
    Ok(doc)
}

fn apply_operation(doc: &mut Value, op: &PatchOperation) -> Result<(), PatchError> {
    match op {
        PatchOperation::Add { path, value } => add(doc, path, &parse_pointer(path)?, value.clone()),
        PatchOperation::Remove { path } => remove(doc, path, &parse_pointer(path)?).map(|_| ()),
        PatchOperation::Replace { path, value } => {
            let tokens = parse_pointer(path)?;
            let target = resolve_mut(doc, &tokens).ok_or_else(|| PatchError::PathNotFound(path.clone()))?;
            *target = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            let from_tokens = parse_pointer(from)?;
            let to_tokens = parse_pointer(path)?;
            if to_tokens.len() > from_tokens.len() && to_tokens.starts_with(&from_tokens) {
                return Err(PatchError::InvalidTarget {
                    path: path.clone(),
                    reason: format!("cannot move {from:?} into one of its own children"),
                });
            }
            if from_tokens == to_tokens {
                return resolve(doc, &from_tokens)
                    .map(|_| ())
                    .ok_or_else(|| PatchError::PathNotFound(from.clone()));
            }
            let value = remove(doc, from, &from_tokens)?;
            add(doc, path, &to_tokens, value)
        }
        PatchOperation::Copy { from, path } => {
            let value = resolve(doc, &parse_pointer(from)?)
                .cloned()
                .ok_or_else(|| PatchError::PathNotFound(from.clone()))?;
            add(doc, path, &parse_pointer(path)?, value)
        }
        PatchOperation::Test { path, value } => {
            let tokens = parse_pointer(path)?;
            match resolve(doc, &tokens) {
                Some(current) if json_eq(current, value) => Ok(()),
                _ => Err(PatchError::TestFailed { path: path.clone() }),
            }
        }
    }
}

fn add(doc: &mut Value, path: &str, tokens: &[String], value: Value) -> Result<(), PatchError> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    let parent = resolve_mut(doc, parent_tokens).ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(path, last)?;
            if index > items.len() {
                return Err(PatchError::InvalidTarget {
                    path: path.to_string(),
                    reason: format!("index {index} is out of bounds for array of length {}", items.len()),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchError::InvalidTarget {
            path: path.to_string(),
            reason: "parent is not an object or array".to_string(),
        }),
    }
}

fn remove(doc: &mut Value, path: &str, tokens: &[String]) -> Result<Value, PatchError> {
    let Some((last, parent_tokens)) = tokens.split_last() else {
        return Err(PatchError::InvalidTarget {
            path: path.to_string(),
            reason: "the document root cannot be removed".to_string(),
        });
    };
    let not_found = || PatchError::PathNotFound(path.to_string());
    match resolve_mut(doc, parent_tokens).ok_or_else(not_found)? {
        Value::Object(map) => map.remove(last).ok_or_else(not_found),
        Value::Array(items) => {
            if last == "-" {
                return Err(not_found());
            }
            let index = parse_index(path, last)?;
            if index < items.len() {
                Ok(items.remove(index))
            } else {
                Err(not_found())
            }
        }
        _ => Err(not_found()),
    }
}

fn resolve<'a>(doc: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(doc, |current, token| match current {
        Value::Object(map) => map.get(token),
        Value::Array(items) => array_index(token).and_then(|i| items.get(i)),
        _ => None,
    })
}

fn resolve_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    tokens.iter().try_fold(doc, |current, token| match current {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => array_index(token).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Split a JSON pointer into unescaped reference tokens.
fn parse_pointer(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let invalid = || PatchError::InvalidPointer(pointer.to_string());
    let rest = pointer.strip_prefix('/').ok_or_else(invalid)?;
    rest.split('/')
        .map(|token| unescape_token(token).ok_or_else(invalid))
        .collect()
}

fn unescape_token(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Array index per RFC 6901: `0` or a digit string without leading zeros.
fn array_index(token: &str) -> Option<usize> {
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if well_formed { token.parse().ok() } else { None }
}

fn parse_index(path: &str, token: &str) -> Result<usize, PatchError> {
    array_index(token).ok_or_else(|| PatchError::InvalidPointer(path.to_string()))
}

/// Structural equality where numbers compare by numeric value (`1` == `1.0`).
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_eq(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

fn numbers_eq(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
