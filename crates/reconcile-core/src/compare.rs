//! Deep structural equality over the serialized form of records.
//!
//! Records are projected through [`Serialize`] into a JSON value tree and
//! compared key by key. Field names in [`IgnoredFields`] are dropped from
//! objects at every depth before key sets are compared, so volatile
//! metadata like `updatedAt` can be excluded.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Field names excluded from structural comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoredFields(BTreeSet<String>);

impl IgnoredFields {
    /// No ignored fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field name.
    pub fn insert(&mut self, field: impl Into<String>) -> bool {
        self.0.insert(field.into())
    }

    /// Whether `field` is ignored.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    /// Number of ignored field names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is ignored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the ignored field names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoredFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Whether two records are structurally equal, ignoring `ignored` fields.
///
/// A record that fails to serialize is never equal to anything but itself.
#[must_use]
pub fn structurally_equal<T: Serialize>(a: &T, b: &T, ignored: &IgnoredFields) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }

    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => values_equal(&a, &b, ignored),
        (Err(error), _) | (_, Err(error)) => {
            tracing::warn!(%error, "Record failed to serialize, comparing as unequal");
            false
        }
    }
}

/// Deep equality of two JSON values, ignoring `ignored` object keys.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn values_equal(a: &Value, b: &Value, ignored: &IgnoredFields) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }

    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: Vec<&String> = a.keys().filter(|k| !ignored.contains(k)).collect();
            let other_len = b.keys().filter(|k| !ignored.contains(k)).count();
            if keys.len() != other_len {
                return false;
            }

            keys.into_iter().all(|key| match (a.get(key), b.get(key)) {
                (Some(left), Some(right)) => values_equal(left, right, ignored),
                _ => false,
            })
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(left, right)| values_equal(left, right, ignored))
        }
        // `1` and `1.0` are the same number; integers never go through f64
        (Value::Number(a), Value::Number(b)) if a.is_f64() || b.is_f64() => {
            matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
        }
        _ => a == b,
    }
}
