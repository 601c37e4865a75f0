use uuid::Uuid;

/// Key for the raw uploaded source blob of a dataset.
///
/// `filename` must already be a flat basename; callers strip directory
/// components before key construction.
pub fn upload_key(dataset_id: Uuid, filename: &str) -> String {
    format!("datasets/{dataset_id}/source/{filename}")
}

/// Key for the generated profile report of a dataset.
pub fn report_key(dataset_id: Uuid) -> String {
    format!("datasets/{dataset_id}/report/report.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deterministic_per_dataset() {
        let id = Uuid::new_v4();
        assert_eq!(
            upload_key(id, "sales.csv"),
            format!("datasets/{id}/source/sales.csv")
        );
        assert_eq!(upload_key(id, "sales.csv"), upload_key(id, "sales.csv"));
        assert_eq!(report_key(id), format!("datasets/{id}/report/report.json"));
    }
}
