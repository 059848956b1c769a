//! Schema enforcement.
//!
//! The transform stage maps every input record onto a [`RecordSchema`],
//! coerces each field and partitions the result into valid and rejected
//! records. It is pure and deterministic, so it is timed but never retried.

mod coerce;
mod schema;

pub use coerce::{coerce, parse_timestamp};
pub use schema::{FieldSpec, FieldType, Predicate, RecordSchema, Rule};

use crate::core::{normalize_column, Record, StageKind};
use crate::errors::StageError;
use crate::events::{EventSink, LogRecord};
use crate::stages::Stage;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

/// A record that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Zero-based position in the transform input.
    pub index: usize,
    /// The first rule the record failed.
    pub rule: Rule,
    /// The coerced record.
    pub record: Record,
}

impl RejectedRecord {
    /// Returns the identifying fields of the record, in schema order.
    #[must_use]
    pub fn identity(&self, schema: &RecordSchema) -> Record {
        schema
            .identifying_fields()
            .map(|name| {
                let value = self.record.get(name).cloned().unwrap_or(Value::Null);
                (name.to_string(), value)
            })
            .collect()
    }
}

/// Transform output: two order-preserving partitions of the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedRecordSet {
    /// Records that satisfy every rule.
    pub valid: Vec<Record>,
    /// Records that failed a rule.
    pub rejected: Vec<RejectedRecord>,
}

impl ValidatedRecordSet {
    /// Number of input records, `valid + rejected`.
    #[must_use]
    pub fn total(&self) -> usize {
        self.valid.len() + self.rejected.len()
    }
}

/// Coerces and validates `records` against `schema`.
///
/// The output holds only the schema's fields, in schema order. A source
/// column missing from a record is treated as `null`.
#[must_use]
pub fn validate(schema: &RecordSchema, records: Vec<Record>) -> ValidatedRecordSet {
    let mut set = ValidatedRecordSet::default();

    for (index, raw) in records.into_iter().enumerate() {
        let mut record = Record::new();
        let mut failed = None;

        for spec in schema.fields() {
            let source = raw
                .iter()
                .find(|(column, _)| spec.matches(&normalize_column(column)));
            let value = match source {
                Some((_, value)) => coerce(value, spec.field_type),
                None => coerce(&Value::Null, spec.field_type),
            };

            if failed.is_none() {
                failed = spec
                    .predicates
                    .iter()
                    .find(|p| !holds(**p, &value))
                    .map(|p| spec.rule(*p));
            }
            record.insert(spec.name.clone(), value);
        }

        match failed {
            None => set.valid.push(record),
            Some(rule) => set.rejected.push(RejectedRecord {
                index,
                rule,
                record,
            }),
        }
    }
    set
}

fn holds(predicate: Predicate, value: &Value) -> bool {
    match predicate {
        Predicate::Positive => value.as_f64().is_some_and(|v| v > 0.0),
        Predicate::NotNull => !value.is_null(),
    }
}

/// The transform stage.
pub struct TransformStage {
    schema: Arc<RecordSchema>,
    events: Arc<dyn EventSink>,
}

impl TransformStage {
    /// Creates the stage for a schema.
    #[must_use]
    pub fn new(schema: Arc<RecordSchema>, events: Arc<dyn EventSink>) -> Self {
        Self { schema, events }
    }

    fn report_rejects(&self, rejected: &[RejectedRecord]) {
        let mut message = format!("Invalid rows rejected: {}", rejected.len());
        for reject in rejected {
            let identity = Value::Object(reject.identity(&self.schema));
            let _ = write!(
                message,
                "\n  row {}: {identity} failed {}",
                reject.index, reject.rule
            );
        }
        self.events.emit(LogRecord::warning(self.name(), message));
    }
}

#[async_trait]
impl Stage<Vec<Record>, ValidatedRecordSet> for TransformStage {
    fn name(&self) -> &str {
        StageKind::Transform.as_str()
    }

    async fn execute(&self, records: Vec<Record>) -> Result<ValidatedRecordSet, StageError> {
        self.events
            .emit(LogRecord::info(self.name(), "Transforming data..."));
        let input = records.len();

        let set = validate(&self.schema, records);

        self.events.emit(LogRecord::info(
            self.name(),
            format!(
                "Transform: {input} → {} valid, {} invalid",
                set.valid.len(),
                set.rejected.len()
            ),
        ));
        if !set.rejected.is_empty() {
            self.report_rejects(&set.rejected);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingEventSink, LogLevel};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn order(id: &str, user: &str, amount: &str, created: &str) -> Record {
        record(json!({
            "Order_ID": id,
            "user_id": user,
            "amount": amount,
            "created_at": created,
            "status": "paid",
        }))
    }

    #[test]
    fn test_validate_projects_and_coerces() {
        let set = validate(
            &RecordSchema::orders(),
            vec![order("1", "10", "9.50", "2024-01-01 08:00:00")],
        );

        assert_eq!(set.rejected, vec![]);
        assert_eq!(
            Value::Object(set.valid[0].clone()),
            json!({
                "order_id": 1,
                "user_id": 10,
                "amount": 9.5,
                "created_at": "2024-01-01 08:00:00",
                "status": "paid",
            })
        );
    }

    #[test]
    fn test_validate_partitions_preserving_order() {
        let input = vec![
            order("1", "10", "5", "2024-01-01"),
            order("x", "10", "5", "2024-01-01"),
            order("3", "10", "-2", "2024-01-01"),
            order("4", "10", "5", "not a date"),
            order("5", "10", "5", "2024-01-02"),
        ];

        let set = validate(&RecordSchema::orders(), input);

        assert_eq!(set.total(), 5);
        let valid_ids: Vec<_> = set.valid.iter().map(|r| r["order_id"].clone()).collect();
        assert_eq!(valid_ids, vec![json!(1), json!(5)]);

        let rejects: Vec<_> = set
            .rejected
            .iter()
            .map(|r| (r.index, r.rule.to_string()))
            .collect();
        assert_eq!(
            rejects,
            vec![
                (1, "order_id > 0".to_string()),
                (2, "amount > 0".to_string()),
                (3, "created_at is not null".to_string()),
            ]
        );
    }

    #[test]
    fn test_validate_matches_aliases() {
        let input = vec![record(json!({
            "Date": "2024-02-03",
            "Category": "Food",
            "Description": "Lunch",
            "Payment Method": "Card",
            "Amount": "12.5",
        }))];

        let set = validate(&RecordSchema::expenses(), input);

        assert_eq!(
            Value::Object(set.valid[0].clone()),
            json!({
                "date": "2024-02-03",
                "category": "Food",
                "description": "Lunch",
                "payment_method": "Card",
                "amount": 12.5,
            })
        );
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let set = validate(&RecordSchema::orders(), vec![record(json!({"order_id": "1"}))]);
        assert_eq!(set.rejected[0].rule.to_string(), "user_id > 0");
    }

    #[test]
    fn test_identity_uses_leading_fields() {
        let set = validate(
            &RecordSchema::orders(),
            vec![order("7", "0", "1", "2024-01-01")],
        );
        assert_eq!(
            Value::Object(set.rejected[0].identity(&RecordSchema::orders())),
            json!({"order_id": 7, "user_id": 0, "amount": 1.0})
        );
    }

    #[tokio::test]
    async fn test_stage_logs_counts_and_rejects() {
        let events = Arc::new(CollectingEventSink::new());
        let stage = TransformStage::new(Arc::new(RecordSchema::orders()), events.clone());

        let set = stage
            .execute(vec![
                order("1", "10", "5", "2024-01-01"),
                order("2", "10", "0", "2024-01-01"),
            ])
            .await
            .unwrap();

        assert_eq!(set.valid.len(), 1);
        let info: Vec<_> = events
            .at_level(LogLevel::Info)
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(info, vec!["Transforming data...", "Transform: 2 → 1 valid, 1 invalid"]);

        let warnings = events.at_level(LogLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].message,
            "Invalid rows rejected: 1\n  row 1: {\"order_id\":2,\"user_id\":10,\"amount\":0.0} failed amount > 0"
        );
    }

    #[tokio::test]
    async fn test_stage_empty_input() {
        let events = Arc::new(CollectingEventSink::new());
        let stage = TransformStage::new(Arc::new(RecordSchema::orders()), events.clone());

        let set = stage.execute(Vec::new()).await.unwrap();

        assert_eq!(set, ValidatedRecordSet::default());
        assert!(events.at_level(LogLevel::Warning).is_empty());
    }
}
