//! Record fixtures.

use crate::core::Record;
use serde_json::{json, Value};

/// Converts a JSON object into a record.
///
/// # Panics
///
/// Panics if `value` is not an object.
#[must_use]
#[allow(clippy::panic)]
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A raw order row as extracted from a file: every value a string.
#[must_use]
pub fn order(order_id: &str, user_id: &str, amount: &str, created_at: &str) -> Record {
    record(json!({
        "order_id": order_id,
        "user_id": user_id,
        "amount": amount,
        "created_at": created_at,
        "status": "paid",
    }))
}

/// Order file content with `valid` good rows followed by `invalid` rows with
/// a non-positive amount.
#[must_use]
pub fn orders_csv(valid: usize, invalid: usize) -> String {
    let mut content = String::from("order_id,user_id,amount,created_at,status\n");
    for i in 1..=valid {
        content.push_str(&format!("{i},{},{i}.50,2024-01-01 10:00:00,paid\n", 100 + i));
    }
    for i in 1..=invalid {
        content.push_str(&format!("{},{},0,2024-01-01 10:00:00,void\n", valid + i, 100 + i));
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_csv_shape() {
        let content = orders_csv(2, 1);
        assert_eq!(content.lines().count(), 4);
        assert!(content.ends_with("3,101,0,2024-01-01 10:00:00,void\n"));
    }
}
