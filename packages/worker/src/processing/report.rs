use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::anomalies::Anomalies;
use super::stats::Stats;

/// The profile report persisted to the object store.
///
/// Serialized once by the worker and served byte-for-byte by the API, so the
/// struct layout is the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub dataset_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub row_count: usize,
    pub null_counts: std::collections::BTreeMap<String, u64>,
    pub numeric: std::collections::BTreeMap<String, super::stats::FieldStats>,
    pub anomalies: Anomalies,
}

impl ProfileReport {
    pub fn assemble(dataset_id: Uuid, stats: Stats, anomalies: Anomalies) -> Self {
        Self {
            dataset_id,
            generated_at: Utc::now(),
            row_count: stats.row_count,
            null_counts: stats.null_counts,
            numeric: stats.numeric,
            anomalies,
        }
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::anomalies::compute_anomalies;
    use crate::processing::parser::parse_rows;
    use crate::processing::stats::compute_stats;

    #[test]
    fn report_json_shape() {
        let rows = parse_rows(
            "text/csv",
            b"id,region,total\n1,n,10\n2,s,20\n3,s,30\n",
            usize::MAX,
        )
        .unwrap();
        let stats = compute_stats(&rows);
        let anomalies = compute_anomalies(&rows, &stats);
        let report = ProfileReport::assemble(Uuid::new_v4(), stats, anomalies);

        let json: serde_json::Value =
            serde_json::from_slice(&report.to_json_bytes().unwrap()).unwrap();

        assert_eq!(json["row_count"], 3);
        assert_eq!(json["null_counts"]["id"], 0);
        assert_eq!(json["numeric"]["id"]["min"], 1.0);
        assert_eq!(json["numeric"]["id"]["mean"], 2.0);
        assert_eq!(json["numeric"]["id"]["max"], 3.0);
        assert_eq!(json["numeric"]["total"]["mean"], 20.0);
        assert_eq!(json["anomalies"]["duplicates_count"], 0);
        assert_eq!(
            json["anomalies"]["outliers"],
            serde_json::json!({})
        );

        // generated_at is RFC3339.
        let stamp = json["generated_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());

        // Round-trips through the wire format.
        let parsed: ProfileReport = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, report);
    }
}
