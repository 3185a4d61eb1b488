use crate::domain::port::RepositoryError;
use sqlx::mysql::MySqlDatabaseError;

/// デッドロック検出（ER_LOCK_DEADLOCK）
const ER_LOCK_DEADLOCK: u16 = 1213;
/// ロック待ちタイムアウト（ER_LOCK_WAIT_TIMEOUT）
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// 直列化失敗のSQLSTATE
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// データベースエラー型
/// データベース操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatabaseError {
    /// データベース接続エラー
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    /// SQLクエリエラー
    #[error("Database query error: {0}")]
    QueryError(String),
    /// ロックの競合（デッドロック、ロック待ちタイムアウト、直列化失敗）
    #[error("Database lock conflict: {0}")]
    LockConflict(String),
    /// 保存されている値をドメインモデルに戻せない
    #[error("Database row decode error: {0}")]
    DecodeError(String),
    /// マイグレーションエラー
    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl DatabaseError {
    /// sqlxのエラーを分類する
    /// ロックの競合は再試行可能な競合として区別する
    ///
    /// # Arguments
    /// * `context` - 失敗した操作の説明
    /// * `err` - sqlxのエラー
    pub fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let number = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|mysql_err| mysql_err.number());
                let sqlstate = db_err.code();
                if is_lock_conflict(number, sqlstate.as_deref()) {
                    DatabaseError::LockConflict(format!("{}: {}", context, err))
                } else {
                    DatabaseError::QueryError(format!("{}: {}", context, err))
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(format!("{}: {}", context, err))
            }
            _ => DatabaseError::QueryError(format!("{}: {}", context, err)),
        }
    }
}

/// MySQLのエラー番号とSQLSTATEからロックの競合か判定する
pub fn is_lock_conflict(number: Option<u16>, sqlstate: Option<&str>) -> bool {
    matches!(number, Some(ER_LOCK_DEADLOCK) | Some(ER_LOCK_WAIT_TIMEOUT))
        || sqlstate == Some(SQLSTATE_SERIALIZATION_FAILURE)
}

/// DatabaseErrorからRepositoryErrorへの変換
impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionError(msg) => RepositoryError::ConnectionFailed(msg),
            DatabaseError::QueryError(msg) => RepositoryError::OperationFailed(msg),
            DatabaseError::LockConflict(msg) => RepositoryError::Conflict(msg),
            DatabaseError::DecodeError(msg) => RepositoryError::FetchFailed(msg),
            DatabaseError::MigrationError(msg) => RepositoryError::OperationFailed(msg),
        }
    }
}
