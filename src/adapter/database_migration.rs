use crate::adapter::database_error::DatabaseError;
use sqlx::{MySql, Pool};
use tracing::info;

/// マイグレーションファイルのリスト（実行順）
const MIGRATIONS: [(&str, &str); 10] = [
    (
        "001_create_room_categories_table",
        include_str!("../../migrations/001_create_room_categories_table.sql"),
    ),
    (
        "002_create_rooms_table",
        include_str!("../../migrations/002_create_rooms_table.sql"),
    ),
    (
        "003_create_promotions_table",
        include_str!("../../migrations/003_create_promotions_table.sql"),
    ),
    (
        "004_create_visits_table",
        include_str!("../../migrations/004_create_visits_table.sql"),
    ),
    (
        "005_create_movements_table",
        include_str!("../../migrations/005_create_movements_table.sql"),
    ),
    (
        "006_create_consumptions_table",
        include_str!("../../migrations/006_create_consumptions_table.sql"),
    ),
    (
        "007_create_reservations_table",
        include_str!("../../migrations/007_create_reservations_table.sql"),
    ),
    (
        "008_create_room_inventories_table",
        include_str!("../../migrations/008_create_room_inventories_table.sql"),
    ),
    (
        "009_create_general_inventories_table",
        include_str!("../../migrations/009_create_general_inventories_table.sql"),
    ),
    (
        "010_create_audit_logs_table",
        include_str!("../../migrations/010_create_audit_logs_table.sql"),
    ),
];

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        for (name, migration_sql) in MIGRATIONS {
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationError(format!("{} failed: {}", name, e)))?;
            info!(migration = name, "migration applied");
        }

        info!(count = MIGRATIONS.len(), "all migrations completed");
        Ok(())
    }
}
