use crate::domain::model::{GuestDetails, InstitutionId, PromotionId, RoomId, UserId};
use chrono::{DateTime, Utc};

/// 予約作成コマンド
#[derive(Debug, Clone)]
pub struct CreateReservationCommand {
    pub room_id: RoomId,
    pub institution_id: InstitutionId,
    pub start_time: DateTime<Utc>,
    pub hours: u32,
    pub minutes: u32,
    /// nil UUIDは「プロモーションなし」として扱う
    pub promotion_id: Option<PromotionId>,
    pub guest: Option<GuestDetails>,
    /// 操作したユーザー（監査ログ用）
    pub user_id: UserId,
}

