//! Second profiling pass: exact-row duplicates and IQR outliers.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::parser::Row;
use super::stats::{Stats, to_finite_number};

/// Outlier examples are capped; `count` still reflects every outlier.
pub const MAX_OUTLIER_EXAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierExample {
    /// 0-based row index from the parser.
    pub row_index: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOutliers {
    pub count: usize,
    pub examples: Vec<OutlierExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomalies {
    /// Extra occurrences beyond the first per distinct row.
    pub duplicates_count: u64,
    pub outliers: BTreeMap<String, FieldOutliers>,
}

/// Interpolated quantile over a sorted, non-empty sample.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let index = (sorted.len() - 1) as f64 * q;
    let lower = index.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = index - lower as f64;
    sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
}

/// Count duplicate rows via canonical sorted-key serialization, so field
/// order never affects equality.
fn compute_duplicate_count(rows: &[Row]) -> u64 {
    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    let mut duplicates = 0;
    for row in rows {
        let canonical: BTreeMap<&String, &serde_json::Value> = row.iter().collect();
        let key = serde_json::to_string(&canonical).unwrap_or_default();
        if !seen.insert(key) {
            duplicates += 1;
        }
    }
    duplicates
}

/// Compute duplicate count and IQR outliers.
///
/// Outliers are evaluated only for fields that qualified for numeric stats,
/// and only when the field has at least 4 samples and a strictly positive
/// IQR. Fences sit at 1.5 IQR beyond Q1/Q3; examples keep first-seen order.
pub fn compute_anomalies(rows: &[Row], stats: &Stats) -> Anomalies {
    let mut outliers = BTreeMap::new();

    for field in stats.numeric.keys() {
        let samples: Vec<(usize, f64)> = rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                row.get(field)
                    .and_then(to_finite_number)
                    .map(|number| (idx, number))
            })
            .collect();

        if samples.len() < 4 {
            continue;
        }

        let mut values: Vec<f64> = samples.iter().map(|&(_, v)| v).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile(&values, 0.25);
        let q3 = quantile(&values, 0.75);
        let iqr = q3 - q1;
        if iqr <= 0.0 {
            continue;
        }
        let lower = q1 - 1.5 * iqr;
        let upper = q3 + 1.5 * iqr;

        let field_outliers: Vec<OutlierExample> = samples
            .iter()
            .filter(|&&(_, value)| value < lower || value > upper)
            .map(|&(row_index, value)| OutlierExample { row_index, value })
            .collect();

        if !field_outliers.is_empty() {
            outliers.insert(
                field.clone(),
                FieldOutliers {
                    count: field_outliers.len(),
                    examples: field_outliers
                        .into_iter()
                        .take(MAX_OUTLIER_EXAMPLES)
                        .collect(),
                },
            );
        }
    }

    Anomalies {
        duplicates_count: compute_duplicate_count(rows),
        outliers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::parser::parse_rows;
    use crate::processing::stats::compute_stats;

    fn csv(payload: &str) -> Vec<Row> {
        parse_rows("text/csv", payload.as_bytes(), usize::MAX).unwrap()
    }

    fn json(payload: &str) -> Vec<Row> {
        parse_rows("application/json", payload.as_bytes(), usize::MAX).unwrap()
    }

    fn anomalies_for(rows: &[Row]) -> Anomalies {
        compute_anomalies(rows, &compute_stats(rows))
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), 1.75);
        assert_eq!(quantile(&values, 0.75), 3.25);
        assert_eq!(quantile(&values, 0.5), 2.5);
        assert_eq!(quantile(&[7.0], 0.75), 7.0);
    }

    #[test]
    fn no_duplicates_no_outliers_on_clean_data() {
        let rows = csv("id,region,total\n1,n,10\n2,s,20\n3,s,30\n");
        let result = anomalies_for(&rows);
        assert_eq!(result.duplicates_count, 0);
        // Only 3 samples per field, below the outlier threshold.
        assert!(result.outliers.is_empty());
    }

    #[test]
    fn duplicates_count_extra_occurrences() {
        // One row repeated 3 times, one unique: k - 1 = 2.
        let rows = csv("a,b\n1,x\n1,x\n1,x\n2,y\n");
        assert_eq!(anomalies_for(&rows).duplicates_count, 2);
    }

    #[test]
    fn duplicate_detection_ignores_field_order() {
        let rows = json(r#"[{"a": 1, "b": 2}, {"b": 2, "a": 1}]"#);
        assert_eq!(anomalies_for(&rows).duplicates_count, 1);
    }

    #[test]
    fn outlier_detection_flags_extreme_values() {
        let rows = csv("v\n10\n11\n12\n13\n14\n100\n");
        let result = anomalies_for(&rows);
        let v = &result.outliers["v"];
        assert_eq!(v.count, 1);
        assert_eq!(v.examples.len(), 1);
        assert_eq!(v.examples[0].row_index, 5);
        assert_eq!(v.examples[0].value, 100.0);
    }

    #[test]
    fn fewer_than_four_samples_are_skipped() {
        let rows = csv("v\n1\n2\n1000\n");
        assert!(anomalies_for(&rows).outliers.is_empty());
    }

    #[test]
    fn zero_iqr_is_skipped() {
        // Constant field: IQR = 0, no outliers even with many samples.
        let rows = csv("v\n5\n5\n5\n5\n5\n5\n");
        assert!(anomalies_for(&rows).outliers.is_empty());
    }

    #[test]
    fn fields_disqualified_from_numeric_get_no_outliers() {
        // "oops" keeps the field out of numeric stats, so outliers must skip
        // it even though five values parse.
        let rows = csv("v\n10\n11\n12\n13\n100\noops\n");
        let result = anomalies_for(&rows);
        assert!(result.outliers.is_empty());
    }

    #[test]
    fn examples_cap_at_five_but_count_everything() {
        // Tight cluster plus 7 extreme values.
        let mut payload = String::from("v\n");
        for _ in 0..20 {
            payload.push_str("10\n11\n");
        }
        for i in 0..7 {
            payload.push_str(&format!("{}\n", 1000 + i));
        }
        let rows = csv(&payload);
        let v = &anomalies_for(&rows).outliers["v"];
        assert_eq!(v.count, 7);
        assert_eq!(v.examples.len(), MAX_OUTLIER_EXAMPLES);
        // First-seen order.
        assert_eq!(v.examples[0].value, 1000.0);
        assert_eq!(v.examples[4].value, 1004.0);
    }

    #[test]
    fn nulls_are_excluded_from_samples() {
        let rows = csv("id,v\n1,10\n2,11\n3,12\n4,\n5,13\n6,100\n");
        let v = &anomalies_for(&rows).outliers["v"];
        assert_eq!(v.count, 1);
        // Row indices come from the parser, nulls included.
        assert_eq!(v.examples[0].row_index, 5);
        assert_eq!(v.examples[0].value, 100.0);
    }
}
