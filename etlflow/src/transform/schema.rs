//! Target schemas: field mapping, coercion types and business rules.

use crate::core::normalize_column;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The type a field is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Whole number. Unparsable values become `0`.
    Integer,
    /// Decimal number. Unparsable values become `null`.
    Decimal,
    /// Date and time. Unparsable values become `null`.
    Timestamp,
    /// Calendar date. Unparsable values become `null`.
    Date,
    /// Free text, passed through.
    Text,
}

/// A business rule checked after coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// The value is a number greater than zero.
    Positive,
    /// The value is present.
    NotNull,
}

/// One target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Target field name.
    pub name: String,
    /// Other source column names accepted for this field.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Coercion type.
    pub field_type: FieldType,
    /// Rules a valid record must satisfy.
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

impl FieldSpec {
    /// Creates a field with no aliases or predicates.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            field_type,
            predicates: Vec::new(),
        }
    }

    /// Accepts an extra source column name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds a rule.
    #[must_use]
    pub fn require(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Returns true if a normalized source column maps to this field.
    #[must_use]
    pub fn matches(&self, normalized: &str) -> bool {
        normalize_column(&self.name) == normalized
            || self.aliases.iter().any(|a| normalize_column(a) == normalized)
    }

    /// Describes `predicate` applied to this field, as shown for rejects.
    #[must_use]
    pub fn rule(&self, predicate: Predicate) -> Rule {
        Rule {
            field: self.name.clone(),
            predicate,
        }
    }
}

/// A predicate bound to the field it checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Field name.
    pub field: String,
    /// The failed check.
    pub predicate: Predicate,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.predicate {
            Predicate::Positive => write!(f, "{} > 0", self.field),
            Predicate::NotNull => write!(f, "{} is not null", self.field),
        }
    }
}

/// A target table and its ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    name: String,
    table: String,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Number of leading fields that identify a record in reject logs.
    pub const IDENTIFYING_FIELDS: usize = 3;

    /// Creates an empty schema.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in target order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Names of the fields that identify a record.
    pub fn identifying_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .take(Self::IDENTIFYING_FIELDS)
            .map(|f| f.name.as_str())
    }

    /// Order events: positive ids and amount, a parsable creation time.
    #[must_use]
    pub fn orders() -> Self {
        Self::new("orders", "orders_etl")
            .field(FieldSpec::new("order_id", FieldType::Integer).require(Predicate::Positive))
            .field(FieldSpec::new("user_id", FieldType::Integer).require(Predicate::Positive))
            .field(FieldSpec::new("amount", FieldType::Decimal).require(Predicate::Positive))
            .field(FieldSpec::new("created_at", FieldType::Timestamp).require(Predicate::NotNull))
            .field(FieldSpec::new("status", FieldType::Text))
    }

    /// Personal expenses exported with title-case headers.
    #[must_use]
    pub fn expenses() -> Self {
        Self::new("expenses", "expenses")
            .field(
                FieldSpec::new("date", FieldType::Date)
                    .alias("Date")
                    .require(Predicate::NotNull),
            )
            .field(FieldSpec::new("category", FieldType::Text).alias("Category"))
            .field(FieldSpec::new("description", FieldType::Text).alias("Description"))
            .field(FieldSpec::new("payment_method", FieldType::Text).alias("Payment Method"))
            .field(FieldSpec::new("amount", FieldType::Decimal).alias("Amount"))
    }

    /// Looks up a built-in schema by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "orders" => Some(Self::orders()),
            "expenses" => Some(Self::expenses()),
            _ => None,
        }
    }
}
