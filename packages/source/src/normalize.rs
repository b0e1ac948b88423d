//! Pure mapping from raw datastore records to [`AuctionRecord`].
//!
//! No I/O and no retry: a malformed field is a terminal
//! [`MappingError`], not something a refetch would fix.

use auction_watch_models::AuctionRecord;
use serde_json::Value;

/// A raw record could not be mapped to an [`AuctionRecord`].
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// A required field was absent or null.
    #[error("record is missing required field {field:?}")]
    MissingField {
        /// The raw record's field name.
        field: &'static str,
    },

    /// A field that must be numeric held something else.
    #[error("field {field:?} is not numeric: {value:?}")]
    NotNumeric {
        /// The raw record's field name.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Maps one raw record, stamping it with the run's ingestion date.
///
/// `executed_quantity` is parsed as a float and truncated toward zero
/// (`"12.9"` becomes `12`); `clearing_price` stays a float; everything
/// else is copied as-is with no validation beyond presence.
///
/// # Errors
///
/// Returns [`MappingError`] if a required field is absent or a numeric
/// field does not parse.
pub fn map_record(raw: &Value, ingested_on: &str) -> Result<AuctionRecord, MappingError> {
    Ok(AuctionRecord {
        source_id: int_field(raw, "_id")?,
        auction_unit: str_field(raw, "auctionUnit")?,
        service_type: str_field(raw, "serviceType")?,
        auction_product: str_field(raw, "auctionProduct")?,
        executed_quantity: truncate(float_field(raw, "executedQuantity")?),
        clearing_price: float_field(raw, "clearingPrice")?,
        delivery_start: str_field(raw, "deliveryStart")?,
        delivery_end: str_field(raw, "deliveryEnd")?,
        technology_type: str_field(raw, "technologyType")?,
        post_code: str_field(raw, "postCode")?,
        unit_result_id: str_field(raw, "unitResultID")?,
        full_text: str_field(raw, "_full_text")?,
        ingested_on: ingested_on.to_string(),
    })
}

/// Truncation toward zero, not rounding.
#[allow(clippy::cast_possible_truncation)]
const fn truncate(value: f64) -> i64 {
    value as i64
}

fn str_field(raw: &Value, field: &'static str) -> Result<String, MappingError> {
    match raw.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        // Some datastore columns flip between string and number typing.
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(MappingError::MissingField { field }),
    }
}

fn int_field(raw: &Value, field: &'static str) -> Result<i64, MappingError> {
    match raw.get(field) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| MappingError::NotNumeric {
            field,
            value: n.to_string(),
        }),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| MappingError::NotNumeric {
            field,
            value: s.clone(),
        }),
        _ => Err(MappingError::MissingField { field }),
    }
}

fn float_field(raw: &Value, field: &'static str) -> Result<f64, MappingError> {
    match raw.get(field) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| MappingError::NotNumeric {
            field,
            value: n.to_string(),
        }),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| MappingError::NotNumeric {
            field,
            value: s.clone(),
        }),
        _ => Err(MappingError::MissingField { field }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw() -> Value {
        json!({
            "_id": 42,
            "auctionUnit": "HAB-GRID-001",
            "serviceType": "Response",
            "auctionProduct": "DCL",
            "executedQuantity": "12.9",
            "clearingPrice": "8.25",
            "deliveryStart": "2024-05-01T23:00:00",
            "deliveryEnd": "2024-05-02T23:00:00",
            "technologyType": "Battery",
            "postCode": "EX1",
            "unitResultID": "UR-42",
            "_full_text": "'battery':3 'dcl':1",
        })
    }

    #[test]
    fn maps_all_fields() {
        let record = map_record(&raw(), "2024-05-01").unwrap();
        assert_eq!(record.source_id, 42);
        assert_eq!(record.auction_unit, "HAB-GRID-001");
        assert_eq!(record.service_type, "Response");
        assert_eq!(record.auction_product, "DCL");
        assert!((record.clearing_price - 8.25).abs() < f64::EPSILON);
        assert_eq!(record.delivery_start, "2024-05-01T23:00:00");
        assert_eq!(record.delivery_end, "2024-05-02T23:00:00");
        assert_eq!(record.technology_type, "Battery");
        assert_eq!(record.post_code, "EX1");
        assert_eq!(record.unit_result_id, "UR-42");
        assert_eq!(record.full_text, "'battery':3 'dcl':1");
        assert_eq!(record.ingested_on, "2024-05-01");
    }

    #[test]
    fn executed_quantity_truncates_not_rounds() {
        let record = map_record(&raw(), "2024-05-01").unwrap();
        assert_eq!(record.executed_quantity, 12);

        let mut negative = raw();
        negative["executedQuantity"] = json!("-3.7");
        let record = map_record(&negative, "2024-05-01").unwrap();
        assert_eq!(record.executed_quantity, -3);
    }

    #[test]
    fn accepts_numeric_json_quantity() {
        let mut raw = raw();
        raw["executedQuantity"] = json!(12.9);
        let record = map_record(&raw, "2024-05-01").unwrap();
        assert_eq!(record.executed_quantity, 12);
    }

    #[test]
    fn accepts_string_source_id() {
        let mut raw = raw();
        raw["_id"] = json!("42");
        assert_eq!(map_record(&raw, "2024-05-01").unwrap().source_id, 42);
    }

    #[test]
    fn missing_field_is_an_error() {
        let mut raw = raw();
        raw.as_object_mut().unwrap().remove("executedQuantity");
        assert!(matches!(
            map_record(&raw, "2024-05-01"),
            Err(MappingError::MissingField {
                field: "executedQuantity"
            })
        ));
    }

    #[test]
    fn null_field_is_an_error() {
        let mut raw = raw();
        raw["postCode"] = Value::Null;
        assert!(matches!(
            map_record(&raw, "2024-05-01"),
            Err(MappingError::MissingField { field: "postCode" })
        ));
    }

    #[test]
    fn non_numeric_quantity_is_an_error() {
        let mut raw = raw();
        raw["executedQuantity"] = json!("twelve");
        assert!(matches!(
            map_record(&raw, "2024-05-01"),
            Err(MappingError::NotNumeric {
                field: "executedQuantity",
                ..
            })
        ));
    }
}
