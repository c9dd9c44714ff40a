//! Feature reconciliation for churn model inference.
//!
//! Turns records, batches and tables into the numeric matrix a trained model
//! expects: categorical fields become indicator columns and, when the
//! training-time column order is known, columns are backfilled, reordered and
//! filtered to match it exactly.

use crate::error::{ChurnError, InputError, Result};
use crate::types::record::{FeatureMatrix, FieldValue, ReconcileInput, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A categorical field and its allowed levels.
///
/// The first level is the reference category: it gets no indicator column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalField {
    pub name: String,
    pub levels: Vec<String>,
}

impl CategoricalField {
    pub fn new(name: &str, levels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            levels: levels.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn reference(&self) -> Option<&str> {
        self.levels.first().map(String::as_str)
    }

    /// Indicator column names, reference level excluded.
    pub fn indicator_columns(&self) -> Vec<String> {
        self.levels
            .iter()
            .skip(1)
            .map(|level| format!("{}_{}", self.name, level))
            .collect()
    }

    fn expand(&self, value: &str) -> std::result::Result<Vec<(String, f32)>, InputError> {
        if !self.levels.iter().any(|l| l == value) {
            return Err(InputError::InvalidCategory {
                field: self.name.clone(),
                value: value.to_string(),
                allowed: self.levels.clone(),
            });
        }
        Ok(self
            .levels
            .iter()
            .skip(1)
            .map(|level| {
                let hot = if level == value { 1.0 } else { 0.0 };
                (format!("{}_{}", self.name, level), hot)
            })
            .collect())
    }
}

/// Declared categorical fields, consumed in place of runtime type inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSchema {
    pub fields: Vec<CategoricalField>,
}

impl CategoricalSchema {
    pub fn new(fields: Vec<CategoricalField>) -> Self {
        Self { fields }
    }

    /// Encoding used by the churn training pipeline: levels sorted, first dropped.
    pub fn customer_default() -> Self {
        Self::new(vec![
            CategoricalField::new("Geography", &["France", "Germany", "Spain"]),
            CategoricalField::new("Gender", &["Female", "Male"]),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&CategoricalField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Default for CategoricalSchema {
    fn default() -> Self {
        Self::customer_default()
    }
}

/// Ordered, duplicate-free list of the columns a model was fit on.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ChurnError::SchemaMismatch(
                "feature schema has no columns".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(columns.len());
        for (position, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), position).is_some() {
                return Err(ChurnError::SchemaMismatch(format!(
                    "duplicate column {name} in feature schema"
                )));
            }
        }

        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

/// Converts input records into a model-ready [`FeatureMatrix`].
#[derive(Debug, Clone, Default)]
pub struct FeatureReconciler {
    categorical: CategoricalSchema,
}

impl FeatureReconciler {
    pub fn new(categorical: CategoricalSchema) -> Self {
        Self { categorical }
    }

    pub fn categorical(&self) -> &CategoricalSchema {
        &self.categorical
    }

    /// Reconcile input against an optional target schema.
    ///
    /// With a schema, absent columns are zero-filled, extra columns dropped and
    /// the output follows the schema order. Without one, every record must
    /// expand to the same columns as the first record.
    pub fn reconcile(
        &self,
        input: &ReconcileInput,
        schema: Option<&FeatureSchema>,
    ) -> Result<FeatureMatrix> {
        if let ReconcileInput::Table(table) = input {
            if let Some(column) = table.repeated_column() {
                return Err(ChurnError::SchemaMismatch(format!(
                    "table column {column} appears more than once"
                )));
            }
        }
        let records = input.records()?;

        let expanded = records
            .iter()
            .enumerate()
            .map(|(row, record)| self.expand_record(record, row, schema))
            .collect::<Result<Vec<_>>>()?;

        match schema {
            Some(schema) => Ok(align_to_schema(expanded, schema)),
            None => align_to_first(expanded),
        }
    }

    /// Expand one record into named numeric cells, in input order.
    fn expand_record(
        &self,
        record: &Record,
        row: usize,
        schema: Option<&FeatureSchema>,
    ) -> Result<Vec<(String, f32)>> {
        let mut cells: Vec<(String, f32)> = Vec::with_capacity(record.len() + 4);

        for (name, value) in record.iter() {
            let produced = match (self.categorical.get(name), value) {
                (_, FieldValue::Null) => continue,
                (Some(field), FieldValue::Text(level)) => field.expand(level)?,
                (Some(field), FieldValue::Number(n)) => {
                    return Err(InputError::InvalidCategory {
                        field: field.name.clone(),
                        value: n.to_string(),
                        allowed: field.levels.clone(),
                    }
                    .into())
                }
                (None, FieldValue::Number(n)) if !n.is_finite() => {
                    return Err(InputError::Malformed(format!(
                        "record {row} has non-finite value {n} for {name}"
                    ))
                    .into())
                }
                (None, FieldValue::Number(n)) => vec![(name.to_string(), *n as f32)],
                (None, FieldValue::Text(_)) => match schema {
                    Some(s) if !s.contains(name) => continue,
                    _ => {
                        return Err(InputError::NonNumericField {
                            field: name.to_string(),
                            row,
                        }
                        .into())
                    }
                },
            };

            for (column, v) in produced {
                if cells.iter().any(|(c, _)| *c == column) {
                    return Err(ChurnError::SchemaMismatch(format!(
                        "column {column} produced twice in record {row}"
                    )));
                }
                cells.push((column, v));
            }
        }

        Ok(cells)
    }
}

fn align_to_schema(expanded: Vec<Vec<(String, f32)>>, schema: &FeatureSchema) -> FeatureMatrix {
    let mut backfilled: BTreeSet<&str> = BTreeSet::new();

    let rows = expanded
        .iter()
        .map(|cells| {
            let by_name: HashMap<&str, f32> =
                cells.iter().map(|(n, v)| (n.as_str(), *v)).collect();
            schema
                .columns()
                .iter()
                .map(|column| match by_name.get(column.as_str()) {
                    Some(v) => *v,
                    None => {
                        backfilled.insert(column.as_str());
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    if !backfilled.is_empty() {
        debug!(
            columns = ?backfilled,
            "Zero-filled columns missing from input"
        );
    }

    FeatureMatrix {
        columns: schema.columns().to_vec(),
        rows,
    }
}

fn align_to_first(expanded: Vec<Vec<(String, f32)>>) -> Result<FeatureMatrix> {
    let Some(first) = expanded.first() else {
        return Ok(FeatureMatrix {
            columns: Vec::new(),
            rows: Vec::new(),
        });
    };
    let columns: Vec<String> = first.iter().map(|(n, _)| n.clone()).collect();

    let mut rows = Vec::with_capacity(expanded.len());
    for (row, cells) in expanded.iter().enumerate() {
        let by_name: HashMap<&str, f32> = cells.iter().map(|(n, v)| (n.as_str(), *v)).collect();

        if let Some((extra, _)) = cells.iter().find(|(n, _)| !columns.contains(n)) {
            return Err(InputError::UnexpectedField {
                field: extra.clone(),
                row,
            }
            .into());
        }

        let values = columns
            .iter()
            .map(|column| {
                by_name
                    .get(column.as_str())
                    .copied()
                    .ok_or_else(|| InputError::MissingField {
                        field: column.clone(),
                        row,
                    })
            })
            .collect::<std::result::Result<Vec<f32>, InputError>>()?;
        rows.push(values);
    }

    Ok(FeatureMatrix { columns, rows })
}
