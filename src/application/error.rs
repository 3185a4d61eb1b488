use crate::domain::error::DomainError;
use crate::domain::port::RepositoryError;

/// アプリケーション層のエラー型
/// すべての公開操作はこの判別可能なエラーを返す
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OccupancyError {
    /// 入力値が不正（呼び出し側の誤り。再試行しない）
    #[error("Validation error: {0}")]
    Validation(String),
    /// 部屋・予約・来訪が存在しない
    #[error("Not found: {0}")]
    NotFound(String),
    /// 排他資源の取り合いに負けた（別の入力で再試行可能）
    #[error("Conflict: {0}")]
    Conflict(String),
    /// ビジネスルール違反（プロモーション不一致、キャンセル済みなど）
    #[error("Business rule violated: {0}")]
    BusinessRule(String),
    /// 予期しない永続化の失敗
    /// 詳細はログにのみ出力し、呼び出し側には内部情報を見せない
    #[error("persistence failure")]
    Persistence(String),
}

impl OccupancyError {
    /// エラー種別の名前（ログ用）
    pub fn kind(&self) -> &'static str {
        match self {
            OccupancyError::Validation(_) => "validation",
            OccupancyError::NotFound(_) => "not_found",
            OccupancyError::Conflict(_) => "conflict",
            OccupancyError::BusinessRule(_) => "business_rule",
            OccupancyError::Persistence(_) => "persistence",
        }
    }

    /// ログ出力用の詳細メッセージ
    pub fn detail(&self) -> &str {
        match self {
            OccupancyError::Validation(msg)
            | OccupancyError::NotFound(msg)
            | OccupancyError::Conflict(msg)
            | OccupancyError::BusinessRule(msg)
            | OccupancyError::Persistence(msg) => msg,
        }
    }
}

// From実装でエラー変換を簡潔に
impl From<DomainError> for OccupancyError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidDuration(_) | DomainError::InvalidValue(_) => {
                OccupancyError::Validation(err.to_string())
            }
            DomainError::RoomUnavailable => OccupancyError::Conflict(err.to_string()),
            DomainError::PromotionRejected(msg) => OccupancyError::BusinessRule(msg),
            DomainError::AlreadyCancelled
            | DomainError::InvalidReservationState(_)
            | DomainError::InvalidRate(_) => OccupancyError::BusinessRule(err.to_string()),
        }
    }
}

impl From<RepositoryError> for OccupancyError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => OccupancyError::Conflict(format!(
                "concurrent booking conflict, retry with a different room: {}",
                msg
            )),
            other => OccupancyError::Persistence(other.to_string()),
        }
    }
}
