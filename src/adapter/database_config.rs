use std::env;
use std::time::Duration;

/// データベース接続設定を管理する構造体
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
    /// ストレージ呼び出し1回あたりのタイムアウト
    pub operation_timeout: Duration,
}

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl DatabaseConfig {
    /// 環境変数から設定を読み取る
    /// 環境変数が設定されていない場合はデフォルト値を使用
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string());

        let port = env::var("DATABASE_PORT")
            .unwrap_or_else(|_| "3306".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid DATABASE_PORT: {}", e)))?;

        let database = env::var("DATABASE_NAME").unwrap_or_else(|_| "hotel_db".to_string());

        let username = env::var("DATABASE_USER").unwrap_or_else(|_| "hotel_user".to_string());

        let password =
            env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "hotel_password".to_string());

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", e))
            })?;

        let timeout_ms = env::var("DATABASE_OPERATION_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid DATABASE_OPERATION_TIMEOUT_MS: {}", e))
            })?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "DATABASE_OPERATION_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            database,
            username,
            password,
            max_connections,
            operation_timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// MySQL接続文字列を生成
    pub fn connection_string(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}
