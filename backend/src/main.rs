use std::sync::Arc;
use backend::{
    config::AppConfig,
    queries::PgPollTable,
    routes::{build_rocket, AppState},
};
use shuttle_runtime::CustomError;
use sqlx::PgPool;
use tracing::info;

#[shuttle_runtime::main]
async fn rocket(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secret_store: shuttle_runtime::SecretStore,
) -> shuttle_rocket::ShuttleRocket {
    info!("🚀 Starting poll server");

    let config = AppConfig::from_lookup(|key| secret_store.get(key)).map_err(CustomError::new)?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(CustomError::new)?;

    info!("📋 Migrations complete");

    let table = PgPollTable::with_table(pool, config.table.clone()).map_err(CustomError::new)?;
    table.ensure_table().await.map_err(CustomError::new)?;
    info!("Using poll table {}", table.table());

    let state = AppState::new(Arc::new(table), &config);

    Ok(build_rocket(state).into())
}
