//! Presentation adapter: column/label manifests plus flat rows for the
//! tabular renderer, and label/value pairs for the chart endpoints.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

impl Column {
    pub fn new(key: &'static str, label: &'static str) -> Self {
        Column { key, label }
    }
}

/// Rows are flat JSON objects whose keys line up with the column manifest.
/// Nested values never reach the renderer: anything non-scalar is replaced
/// with a placeholder (and flagged in debug builds, since it means a row
/// type broke the flat-object contract).
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Map<String, Value>>,
}

impl Table {
    pub fn from_rows<T: Serialize>(columns: Vec<Column>, rows: &[T]) -> Table {
        let rows = rows
            .iter()
            .filter_map(|row| match serde_json::to_value(row) {
                Ok(Value::Object(object)) => Some(flatten(object)),
                Ok(other) => {
                    debug_assert!(false, "table row is not an object: {other}");
                    log::warn!("dropping non-object table row");
                    None
                }
                Err(err) => {
                    log::warn!("failed to serialize table row: {err}");
                    None
                }
            })
            .collect();
        Table { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn flatten(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(key, value)| match value {
            Value::Object(_) | Value::Array(_) => {
                debug_assert!(false, "nested value in table row key {key}");
                (key, Value::String("—".to_owned()))
            }
            // render holes as empty cells, not "null"
            Value::Null => (key, Value::String(String::new())),
            scalar => (key, scalar),
        })
        .collect()
}

/// One bar or pie slice.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

impl ChartPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        ChartPoint {
            label: label.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct RevenueRow {
        product_name: String,
        revenue: f64,
        avg_rating: Option<f64>,
    }

    #[test]
    fn row_keys_match_manifest() {
        let columns = vec![
            Column::new("product_name", "Product"),
            Column::new("revenue", "Total Revenue"),
            Column::new("avg_rating", "Rating"),
        ];
        let rows = vec![RevenueRow {
            product_name: "Gown".to_owned(),
            revenue: 400.0,
            avg_rating: None,
        }];
        let table = Table::from_rows(columns, &rows);
        assert_eq!(table.rows.len(), 1);
        for column in &table.columns {
            assert!(table.rows[0].contains_key(column.key), "missing {}", column.key);
        }
    }

    #[test]
    fn cells_are_scalars_and_none_renders_empty() {
        let rows = vec![RevenueRow {
            product_name: "Gown".to_owned(),
            revenue: 400.0,
            avg_rating: None,
        }];
        let table = Table::from_rows(vec![Column::new("avg_rating", "Rating")], &rows);
        let cell = &table.rows[0]["avg_rating"];
        assert_eq!(cell, &Value::String(String::new()));
        assert!(table.rows[0]
            .values()
            .all(|v| !matches!(v, Value::Object(_) | Value::Array(_))));
    }

    #[test]
    fn empty_input_is_an_empty_table_not_an_error() {
        let rows: Vec<RevenueRow> = vec![];
        let table = Table::from_rows(vec![Column::new("revenue", "Revenue")], &rows);
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 1);
    }
}
