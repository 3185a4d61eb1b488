/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// 無効な滞在時間（例: 0分、7日超）
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
    /// 無効な値
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// 無効な予約状態（例: 完了済みの予約を一時停止しようとした）
    #[error("Invalid reservation state: {0}")]
    InvalidReservationState(String),
    /// 既にキャンセル済み
    #[error("already cancelled")]
    AlreadyCancelled,
    /// 部屋が既に使用中
    #[error("room no longer available")]
    RoomUnavailable,
    /// プロモーションが適用できない
    #[error("{0}")]
    PromotionRejected(String),
    /// 料金設定が不正（0以下の単価）
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
}
