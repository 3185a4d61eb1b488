use crate::domain::model::{
    InstitutionId, InventoryRestoration, Money, PromotionId, ReservationId, RoomId, UserId,
    VisitId,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

/// 監査ログに記録するモジュール名
pub const AUDIT_MODULE: &str = "reservations";

/// 監査ログのエントリ
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub description: String,
    pub module: String,
    pub institution_id: InstitutionId,
    pub user_id: Option<UserId>,
    /// 構造化メタデータ（JSON）
    pub metadata: serde_json::Value,
    /// 関連エンティティのID（予約ID）
    pub related_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

/// ドメインイベント列挙型
/// 監査ログに残すべき業務上の出来事を表現する
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// 予約が作成された
    ReservationCreated(ReservationCreated),
    /// 利用が包括的にキャンセルされた
    OccupationCancelled(OccupationCancelled),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::ReservationCreated(_) => "ReservationCreated",
            DomainEvent::OccupationCancelled(_) => "OccupationCancelled",
        }
    }

    /// 監査ログのエントリに変換する
    pub fn to_audit_entry(&self) -> AuditEntry {
        match self {
            DomainEvent::ReservationCreated(e) => AuditEntry {
                description: format!(
                    "Reservation created for room {} (guest {})",
                    e.room_id, e.guest_identifier
                ),
                module: AUDIT_MODULE.to_string(),
                institution_id: e.institution_id,
                user_id: Some(e.user_id),
                metadata: json!({
                    "event": self.event_type(),
                    "room_id": e.room_id.to_string(),
                    "visit_id": e.visit_id.to_string(),
                    "guest": e.guest_identifier,
                    "promotion_id": e.promotion_id.map(|id| id.to_string()),
                    "total": e.total.to_string(),
                    "timestamp": e.occurred_at.to_rfc3339(),
                }),
                related_id: Some(e.reservation_id.as_uuid()),
                occurred_at: e.occurred_at,
            },
            DomainEvent::OccupationCancelled(e) => AuditEntry {
                description: format!("Occupation of room {} cancelled: {}", e.room_id, e.reason),
                module: AUDIT_MODULE.to_string(),
                institution_id: e.institution_id,
                user_id: Some(e.user_id),
                metadata: json!({
                    "event": self.event_type(),
                    "room_id": e.room_id.to_string(),
                    "visit_id": e.visit_id.to_string(),
                    "reason": e.reason,
                    "voided_movements": e.voided_movements,
                    "voided_consumptions": e.voided_consumptions,
                    "restored": e.restored,
                    "skipped": e.skipped,
                    "timestamp": e.occurred_at.to_rfc3339(),
                }),
                related_id: Some(e.reservation_id.as_uuid()),
                occurred_at: e.occurred_at,
            },
        }
    }
}

/// 予約作成イベント
#[derive(Debug, Clone)]
pub struct ReservationCreated {
    pub reservation_id: ReservationId,
    pub institution_id: InstitutionId,
    pub room_id: RoomId,
    pub visit_id: VisitId,
    /// 宿泊客の表示用識別子
    pub guest_identifier: String,
    pub promotion_id: Option<PromotionId>,
    /// 計算された合計金額
    pub total: Money,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// 包括キャンセルイベント
#[derive(Debug, Clone)]
pub struct OccupationCancelled {
    pub reservation_id: ReservationId,
    pub institution_id: InstitutionId,
    pub room_id: RoomId,
    pub visit_id: VisitId,
    pub reason: String,
    pub user_id: UserId,
    /// 取り消した会計明細の件数
    pub voided_movements: usize,
    /// 取り消した消費明細の件数
    pub voided_consumptions: usize,
    /// 復元した在庫
    pub restored: Vec<InventoryRestoration>,
    /// 在庫行がなく復元できなかった在庫
    pub skipped: Vec<InventoryRestoration>,
    pub occurred_at: DateTime<Utc>,
}
