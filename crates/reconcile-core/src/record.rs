//! Record shapes understood by the merge engine.
//!
//! The engine only needs a minimal structural contract from each record:
//! - a stable identifier shared across replicas
//! - an optional version counter
//! - an optional last-modified timestamp
//!
//! The delta merger additionally reads a numeric quantity and unit cost
//! through [`StockRecord`].
//!
//! An absent version is *not* the same as version `0`: it selects a
//! different detection and resolution rule.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record that can take part in a merge.
///
/// Records are compared structurally through their [`Serialize`] form.
pub trait SyncableRecord: Clone + Serialize {
    /// Identifier, unique within one snapshot and stable across replicas.
    fn id(&self) -> &str;

    /// Version counter, if the record carries one.
    fn version(&self) -> Option<u64>;

    /// Last-modified timestamp, if the record carries one.
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Overwrite the version counter.
    fn set_version(&mut self, version: u64);

    /// Overwrite the last-modified timestamp.
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// A record with a stock quantity and unit cost.
pub trait StockRecord: SyncableRecord {
    /// Stock quantity, if known.
    fn quantity(&self) -> Option<f64>;

    /// Unit cost price, if known.
    fn cost_price(&self) -> Option<f64>;

    /// Overwrite the stock quantity.
    fn set_quantity(&mut self, quantity: f64);

    /// Overwrite the unit cost price.
    fn set_cost_price(&mut self, cost_price: f64);
}

/// A generic record: sync metadata plus arbitrary JSON fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Record identifier
    pub id: String,
    /// Version counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Last-modified timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Every other field of the record
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record with no metadata and no fields.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            updated_at: None,
            fields: Map::new(),
        }
    }

    /// Set the version counter.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the last-modified timestamp.
    #[must_use]
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Set a field.
    ///
    /// `id`, `version` and `updatedAt` are written to the typed fields; a
    /// value of the wrong type for them is dropped with a warning.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            "id" => assign_typed(&mut self.id, &name, value),
            "version" => assign_typed(&mut self.version, &name, value),
            "updatedAt" => assign_typed(&mut self.updated_at, &name, value),
            _ => {
                self.fields.insert(name, value);
            }
        }
        self
    }
}

impl SyncableRecord for Record {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}

/// An inventory record with quantity and unit cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Record identifier
    pub id: String,
    /// Version counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Last-modified timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Units in stock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    /// Unit cost, same currency on every replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<f64>,
    /// Every other field of the record
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProductRecord {
    /// Create a product with no metadata, stock, or cost.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            updated_at: None,
            quantity: None,
            cost_price: None,
            fields: Map::new(),
        }
    }

    /// Set the version counter.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the last-modified timestamp.
    #[must_use]
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Set the stock quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Set the unit cost price.
    #[must_use]
    pub fn with_cost_price(mut self, cost_price: f64) -> Self {
        self.cost_price = Some(cost_price);
        self
    }

    /// Set a field.
    ///
    /// `id`, `version`, `updatedAt`, `quantity` and `costPrice` are written
    /// to the typed fields; a value of the wrong type for them is dropped
    /// with a warning.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            "id" => assign_typed(&mut self.id, &name, value),
            "version" => assign_typed(&mut self.version, &name, value),
            "updatedAt" => assign_typed(&mut self.updated_at, &name, value),
            "quantity" => assign_typed(&mut self.quantity, &name, value),
            "costPrice" => assign_typed(&mut self.cost_price, &name, value),
            _ => {
                self.fields.insert(name, value);
            }
        }
        self
    }
}

impl SyncableRecord for ProductRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}

impl StockRecord for ProductRecord {
    fn quantity(&self) -> Option<f64> {
        self.quantity
    }

    fn cost_price(&self) -> Option<f64> {
        self.cost_price
    }

    fn set_quantity(&mut self, quantity: f64) {
        self.quantity = Some(quantity);
    }

    fn set_cost_price(&mut self, cost_price: f64) {
        self.cost_price = Some(cost_price);
    }
}

/// Decode `value` into a typed field, keeping the old value if it does not fit.
fn assign_typed<T: DeserializeOwned>(slot: &mut T, name: &str, value: Value) {
    match serde_json::from_value(value) {
        Ok(typed) => *slot = typed,
        Err(error) => {
            tracing::warn!(field = name, %error, "Dropping value of wrong type for typed field");
        }
    }
}
