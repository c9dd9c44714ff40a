//! Untyped record, table and feature matrix structures

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single cell of an input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Parse a raw text cell (CSV style): empty is null, numeric text is a number.
    pub fn parse_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            FieldValue::Null
        } else if let Ok(n) = trimmed.parse::<f64>() {
            FieldValue::Number(n)
        } else {
            FieldValue::Text(trimmed.to_string())
        }
    }

    fn from_json(field: &str, value: &Value) -> Result<Self, InputError> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Number(if *b { 1.0 } else { 0.0 })),
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| InputError::Malformed(format!("{field} is not representable"))),
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(InputError::UnsupportedInputType(format!(
                "nested value for field {field}"
            ))),
        }
    }
}

/// An ordered set of named fields. Field order is the caller's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_number(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, FieldValue::Number(value))
    }

    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, FieldValue::Text(value.into()))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn from_json_object(map: &serde_json::Map<String, Value>) -> Result<Self, InputError> {
        let mut record = Record::new();
        for (name, value) in map {
            record.insert(name.clone(), FieldValue::from_json(name, value)?);
        }
        Ok(record)
    }
}

/// Column-major header plus row-major cells, as read from a CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<FieldValue>) {
        self.rows.push(row);
    }

    /// First column name that occurs more than once in the header.
    pub fn repeated_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .enumerate()
            .find(|(i, name)| self.columns[..*i].contains(*name))
            .map(|(_, name)| name.as_str())
    }

    /// Split the table into one record per row.
    pub fn to_records(&self) -> Result<Vec<Record>, InputError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                if row.len() != self.columns.len() {
                    return Err(InputError::RaggedRow {
                        row: row_idx,
                        expected: self.columns.len(),
                        found: row.len(),
                    });
                }
                let mut record = Record::new();
                for (name, value) in self.columns.iter().zip(row) {
                    record.insert(name.clone(), value.clone());
                }
                Ok(record)
            })
            .collect()
    }
}

/// The three accepted input shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileInput {
    Single(Record),
    Many(Vec<Record>),
    Table(Table),
}

impl ReconcileInput {
    /// Interpret a JSON payload: an object is one record, an array of objects a batch,
    /// and an object with exactly `columns` and `rows` a table. Anything else is rejected.
    pub fn from_json(value: &Value) -> Result<Self, InputError> {
        match value {
            Value::Object(map) if is_table_object(map) => table_from_json(map).map(Self::Table),
            Value::Object(map) => Record::from_json_object(map).map(Self::Single),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Record::from_json_object(map),
                    other => Err(InputError::UnsupportedInputType(format!(
                        "element {i} is {}",
                        json_kind(other)
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Many),
            other => Err(InputError::UnsupportedInputType(json_kind(other).to_string())),
        }
    }

    /// Number of records carried by the input.
    pub fn len(&self) -> usize {
        match self {
            ReconcileInput::Single(_) => 1,
            ReconcileInput::Many(records) => records.len(),
            ReconcileInput::Table(table) => table.rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into records, validating table shape.
    pub fn records(&self) -> Result<Vec<Record>, InputError> {
        match self {
            ReconcileInput::Single(record) => Ok(vec![record.clone()]),
            ReconcileInput::Many(records) => Ok(records.clone()),
            ReconcileInput::Table(table) => table.to_records(),
        }
    }
}

impl From<Record> for ReconcileInput {
    fn from(record: Record) -> Self {
        ReconcileInput::Single(record)
    }
}

impl From<Vec<Record>> for ReconcileInput {
    fn from(records: Vec<Record>) -> Self {
        ReconcileInput::Many(records)
    }
}

impl From<Table> for ReconcileInput {
    fn from(table: Table) -> Self {
        ReconcileInput::Table(table)
    }
}

fn is_table_object(map: &serde_json::Map<String, Value>) -> bool {
    map.len() == 2 && map.contains_key("columns") && map.contains_key("rows")
}

fn table_from_json(map: &serde_json::Map<String, Value>) -> Result<Table, InputError> {
    let columns: Vec<String> = serde_json::from_value(map["columns"].clone())
        .map_err(|e| InputError::Malformed(format!("table columns: {e}")))?;
    let rows = map["rows"]
        .as_array()
        .ok_or_else(|| InputError::Malformed("table rows must be an array".to_string()))?;

    let mut table = Table::new(columns);
    for (i, row) in rows.iter().enumerate() {
        let cells = row
            .as_array()
            .ok_or_else(|| InputError::Malformed(format!("table row {i} must be an array")))?;
        if cells.len() != table.columns.len() {
            return Err(InputError::RaggedRow {
                row: i,
                expected: table.columns.len(),
                found: cells.len(),
            });
        }
        let parsed = cells
            .iter()
            .zip(table.columns.iter())
            .map(|(cell, name)| FieldValue::from_json(name, cell))
            .collect::<Result<Vec<_>, _>>()?;
        table.push_row(parsed);
    }
    Ok(table)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Model-ready numeric matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row-major contiguous copy, the layout ONNX tensors expect.
    pub fn flatten(&self) -> Vec<f32> {
        self.rows.iter().flat_map(|r| r.iter().copied()).collect()
    }
}

impl From<FeatureMatrix> for Table {
    fn from(matrix: FeatureMatrix) -> Self {
        Table {
            columns: matrix.columns,
            rows: matrix
                .rows
                .into_iter()
                .map(|r| r.into_iter().map(|v| FieldValue::Number(v as f64)).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_shapes() {
        let single = ReconcileInput::from_json(&json!({"Age": 42, "Gender": "Female"})).unwrap();
        assert_eq!(single.len(), 1);

        let many = ReconcileInput::from_json(&json!([{"Age": 42}, {"Age": 35}])).unwrap();
        assert_eq!(many.len(), 2);

        let table = ReconcileInput::from_json(&json!({
            "columns": ["Age", "Gender"],
            "rows": [[42, "Female"], [35, "Male"]]
        }))
        .unwrap();
        assert!(matches!(table, ReconcileInput::Table(ref t) if t.rows.len() == 2));
    }

    #[test]
    fn test_scalar_input_rejected() {
        let err = ReconcileInput::from_json(&json!(42)).unwrap_err();
        assert!(matches!(err, InputError::UnsupportedInputType(ref k) if k == "number"));

        let err = ReconcileInput::from_json(&json!([{"Age": 1}, 7])).unwrap_err();
        assert!(matches!(err, InputError::UnsupportedInputType(_)));
    }

    #[test]
    fn test_record_preserves_order_and_replaces() {
        let record = Record::new()
            .with_number("b", 1.0)
            .with_number("a", 2.0)
            .with_number("b", 3.0);
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(record.get("b"), Some(&FieldValue::Number(3.0)));
    }

    #[test]
    fn test_ragged_table() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![FieldValue::Number(1.0)]);
        let err = table.to_records().unwrap_err();
        assert_eq!(
            err,
            InputError::RaggedRow {
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_repeated_column() {
        let table = Table::new(vec!["Age".into(), "Gender".into(), "Age".into()]);
        assert_eq!(table.repeated_column(), Some("Age"));
        assert_eq!(Table::new(vec!["Age".into()]).repeated_column(), None);
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(FieldValue::parse_cell(""), FieldValue::Null);
        assert_eq!(FieldValue::parse_cell(" 650 "), FieldValue::Number(650.0));
        assert_eq!(
            FieldValue::parse_cell("France"),
            FieldValue::Text("France".into())
        );
    }
}
