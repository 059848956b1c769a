//! Records: ordered mappings of field name to value.

use regex::Regex;
use std::sync::LazyLock;

/// An ordered mapping of field name to value.
///
/// Insertion order is preserved, so a record read from a CSV file keeps its
/// column order through every stage.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[allow(clippy::expect_used)]
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("separator pattern is valid"));

/// Normalizes a column name: trimmed, lower-cased, with every run of
/// non-alphanumeric characters collapsed to a single `_`.
///
/// `" Payment Method "` becomes `payment_method`.
#[must_use]
pub fn normalize_column(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    SEPARATORS
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Returns every column seen across `records`, in order of first appearance.
#[must_use]
pub fn column_set(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}
