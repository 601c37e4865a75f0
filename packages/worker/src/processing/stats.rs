//! First profiling pass: row count, null counts, numeric min/mean/max.
//!
//! Single pass with bounded per-field state: each field carries one
//! aggregate, never the value list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parser::Row;

/// Whether a value counts as null: absent values arrive as JSON null, and
/// blank or whitespace-only strings count too.
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Cheap numeric coercion. Booleans are never numeric; strings must parse as
/// finite integer or floating-point literals.
pub fn to_finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(_) => None,
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub row_count: usize,
    pub null_counts: BTreeMap<String, u64>,
    pub numeric: BTreeMap<String, FieldStats>,
}

#[derive(Debug, Default)]
struct FieldAgg {
    /// Rows in which the field appeared at all. Absent rows count as null.
    present: u64,
    explicit_nulls: u64,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    non_numeric: bool,
}

impl FieldAgg {
    fn observe(&mut self, value: &Value) {
        self.present += 1;
        if is_null(value) {
            self.explicit_nulls += 1;
            return;
        }
        match to_finite_number(value) {
            Some(number) => {
                if self.count == 0 {
                    self.min = number;
                    self.max = number;
                } else {
                    self.min = self.min.min(number);
                    self.max = self.max.max(number);
                }
                self.count += 1;
                self.sum += number;
            }
            None => self.non_numeric = true,
        }
    }

    /// A field qualifies as numeric only if every observed non-null value
    /// parsed as a finite number and at least one did.
    fn numeric_stats(&self) -> Option<FieldStats> {
        if self.count == 0 || self.non_numeric {
            return None;
        }
        Some(FieldStats {
            min: self.min,
            mean: self.sum / self.count as f64,
            max: self.max,
        })
    }
}

/// Compute row count, null counts, and numeric statistics by field.
pub fn compute_stats(rows: &[Row]) -> Stats {
    let mut fields: BTreeMap<String, FieldAgg> = BTreeMap::new();

    for row in rows {
        for (field, value) in row {
            fields.entry(field.clone()).or_default().observe(value);
        }
    }

    let row_count = rows.len() as u64;
    let null_counts = fields
        .iter()
        .map(|(k, agg)| (k.clone(), agg.explicit_nulls + (row_count - agg.present)))
        .collect();
    let numeric = fields
        .iter()
        .filter_map(|(k, agg)| agg.numeric_stats().map(|s| (k.clone(), s)))
        .collect();

    Stats {
        row_count: rows.len(),
        null_counts,
        numeric,
    }
}
