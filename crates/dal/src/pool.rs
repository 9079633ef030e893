use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Builds the process-wide Postgres pool from `config::settings().database`.
///
/// Grounded on the teacher's `dal::get_db_pool`.
pub async fn get_db_pool() -> Result<PgPool, sqlx::Error> {
    let db_config = &config::settings().database;

    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&db_config.connection_string())
        .await
}

/// Runs pending migrations against `pool`. Grounded on the teacher's
/// `dal::initialize`, which calls `sqlx::migrate!` the same way.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// Connects and migrates in one step — the entry point a binary calls at
/// startup.
pub async fn initialize() -> anyhow::Result<PgPool> {
    tracing::info!("connecting to database and running migrations");
    let pool = get_db_pool().await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
