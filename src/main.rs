use hotel_occupancy_engine::adapter::driven::MySqlOccupancyStore;
use hotel_occupancy_engine::adapter::{telemetry, DatabaseConfig, DatabaseMigration};
use hotel_occupancy_engine::application::service::ReservationQueryService;
use hotel_occupancy_engine::domain::model::ReservationId;
use hotel_occupancy_engine::domain::port::OccupancyStore;

use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    telemetry::init();

    // データベース設定を読み込む
    let config = DatabaseConfig::from_env()?;
    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "database configuration loaded"
    );

    // 接続プールを作成
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.operation_timeout)
        .connect(&config.connection_string())
        .await?;
    info!(max_connections = config.max_connections, "connection pool created");

    // マイグレーションを実行
    DatabaseMigration::new(pool.clone()).run().await?;

    // ストレージの疎通確認
    let store: Arc<dyn OccupancyStore> = Arc::new(MySqlOccupancyStore::new(pool));
    let queries = ReservationQueryService::new(store, config.operation_timeout);
    queries.get_reservation_by_id(ReservationId::new()).await?;

    info!(
        operation_timeout_ms = config.operation_timeout.as_millis() as u64,
        "schema migrated and storage verified"
    );

    Ok(())
}
