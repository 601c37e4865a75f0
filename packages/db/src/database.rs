use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

/// Connect to Postgres and sync the entity schema.
pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    opt.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(60))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("db::entity::*").sync(&db).await?;

    ensure_indexes(&db).await?;

    Ok(db)
}

/// Ensure required database indexes exist.
///
/// Schema sync cannot express partial indexes, so the active-job uniqueness
/// constraint is created here. It is load-bearing: the enqueue race in the
/// job lifecycle controller is resolved by this index and nothing else, so a
/// failure to create it aborts startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"uq_jobs_active_dataset\" \
         ON \"jobs\" (\"dataset_id\") \
         WHERE \"state\" IN ('queued', 'started', 'retrying')",
    )
    .await?;
    info!("Ensured index uq_jobs_active_dataset exists");

    // Secondary ordering/lookup indexes. Best effort: the system is correct
    // without them.
    for (name, stmt) in [
        (
            "ix_datasets_uploaded_at",
            "CREATE INDEX IF NOT EXISTS \"ix_datasets_uploaded_at\" ON \"datasets\" (\"uploaded_at\")",
        ),
        (
            "ix_jobs_dataset_id",
            "CREATE INDEX IF NOT EXISTS \"ix_jobs_dataset_id\" ON \"jobs\" (\"dataset_id\")",
        ),
        (
            "ix_jobs_queued_at",
            "CREATE INDEX IF NOT EXISTS \"ix_jobs_queued_at\" ON \"jobs\" (\"queued_at\")",
        ),
        (
            "ix_jobs_state",
            "CREATE INDEX IF NOT EXISTS \"ix_jobs_state\" ON \"jobs\" (\"state\")",
        ),
    ] {
        match db.execute_unprepared(stmt).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) => tracing::warn!("Failed to create index {name}: {e}"),
        }
    }

    Ok(())
}
