//! Conversion of Tushare `{fields, items}` tables into polars frames
//!
//! Column types are inferred from the JSON values: integers, floats, booleans
//! and strings each get their own dtype, nulls are kept as nulls, and a column
//! mixing kinds falls back to strings.

use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use serde::Deserialize;
use serde_json::Value;

use super::ProviderError;

/// The `data` object of a Tushare response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTable {
    pub fields: Vec<String>,
    #[serde(default)]
    pub items: Vec<Vec<Value>>,
    #[serde(default)]
    pub has_more: bool,
}

impl RawTable {
    /// Position of a field, if present
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Checks that every row has one value per field
    fn check_shape(&self) -> Result<(), ProviderError> {
        for (row, values) in self.items.iter().enumerate() {
            if values.len() != self.fields.len() {
                return Err(ProviderError::MalformedTable(format!(
                    "row {} has {} values for {} fields",
                    row,
                    values.len(),
                    self.fields.len()
                )));
            }
        }
        Ok(())
    }

    /// Builds a frame with one typed column per field
    pub fn into_frame(self) -> Result<DataFrame, ProviderError> {
        self.check_shape()?;

        let columns = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<&Value> = self.items.iter().map(|row| &row[i]).collect();
                Column::from(column_series(name, &values))
            })
            .collect::<Vec<_>>();

        Ok(DataFrame::new(columns)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Int,
    Float,
    Bool,
    Str,
}

fn kind_of(value: &Value) -> Option<Kind> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(Kind::Bool),
        Value::Number(n) if n.is_i64() => Some(Kind::Int),
        Value::Number(_) => Some(Kind::Float),
        _ => Some(Kind::Str),
    }
}

/// Narrowest kind that holds every non-null value
fn infer_kind(values: &[&Value]) -> Kind {
    values
        .iter()
        .filter_map(|v| kind_of(v))
        .reduce(|acc, kind| match (acc, kind) {
            (a, b) if a == b => a,
            (Kind::Int, Kind::Float) | (Kind::Float, Kind::Int) => Kind::Float,
            _ => Kind::Str,
        })
        // An all-null column has no type to go on
        .unwrap_or(Kind::Str)
}

fn column_series(name: &str, values: &[&Value]) -> Series {
    match infer_kind(values) {
        Kind::Int => {
            let data: Vec<Option<i64>> = values.iter().map(|v| v.as_i64()).collect();
            Series::new(name.into(), data)
        }
        Kind::Float => {
            let data: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
            Series::new(name.into(), data)
        }
        Kind::Bool => {
            let data: Vec<Option<bool>> = values.iter().map(|v| v.as_bool()).collect();
            Series::new(name.into(), data)
        }
        Kind::Str => {
            let data: Vec<Option<String>> = values.iter().map(|v| value_to_string(v)).collect();
            Series::new(name.into(), data)
        }
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn raw(json: &str) -> RawTable {
        serde_json::from_str(json).expect("valid raw table")
    }

    #[test]
    fn test_infers_column_types() {
        let table = raw(r#"{
            "fields": ["ts_code", "trade_date", "close", "vol", "is_open"],
            "items": [
                ["000001.SZ", "20240104", 9.21, 1021, true],
                ["000001.SZ", "20240103", 9.19, 876, false]
            ],
            "has_more": false
        }"#);

        let frame = table.into_frame().expect("Should convert");
        let expected = df!(
            "ts_code" => ["000001.SZ", "000001.SZ"],
            "trade_date" => ["20240104", "20240103"],
            "close" => [9.21, 9.19],
            "vol" => [1021i64, 876],
            "is_open" => [true, false],
        )
        .expect("valid frame");

        assert!(frame.equals_missing(&expected));
        assert_eq!(frame.schema(), expected.schema());
    }

    #[test]
    fn test_mixed_int_and_float_becomes_float() {
        let frame = raw(r#"{"fields": ["amount"], "items": [[1], [2.5], [null]]}"#)
            .into_frame()
            .expect("Should convert");
        let expected = df!("amount" => [Some(1.0), Some(2.5), None]).expect("valid frame");
        assert!(frame.equals_missing(&expected));
    }

    #[test]
    fn test_mixed_kinds_become_strings() {
        let frame = raw(r#"{"fields": ["v"], "items": [["a"], [3], [null]]}"#)
            .into_frame()
            .expect("Should convert");
        let expected = df!("v" => [Some("a"), Some("3"), None]).expect("valid frame");
        assert!(frame.equals_missing(&expected));
    }

    #[test]
    fn test_all_null_column_is_string() {
        let frame = raw(r#"{"fields": ["ann_date", "x"], "items": [[null, 1], [null, 2]]}"#)
            .into_frame()
            .expect("Should convert");
        let expected = df!(
            "ann_date" => [None::<&str>, None],
            "x" => [1i64, 2],
        )
        .expect("valid frame");
        assert!(frame.equals_missing(&expected));
    }

    #[test]
    fn test_no_items_gives_empty_frame_with_columns() {
        let frame = raw(r#"{"fields": ["ts_code", "close"], "items": []}"#)
            .into_frame()
            .expect("Should convert");
        assert_eq!(frame.height(), 0);
        assert_eq!(frame.width(), 2);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let result = raw(r#"{"fields": ["a", "b"], "items": [[1, 2], [3]]}"#).into_frame();
        assert!(matches!(result, Err(ProviderError::MalformedTable(_))));
    }

    #[test]
    fn test_field_index() {
        let table = raw(r#"{"fields": ["trade_date", "adj_factor"], "items": []}"#);
        assert_eq!(table.field_index("adj_factor"), Some(1));
        assert_eq!(table.field_index("close"), None);
    }
}
