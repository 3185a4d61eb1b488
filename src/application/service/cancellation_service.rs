use super::not_found_reservation;
use super::transaction_scope::{log_failure, TransactionScope};
use crate::application::OccupancyError;
use crate::domain::error::DomainError;
use crate::domain::event::{DomainEvent, OccupationCancelled};
use crate::domain::model::{
    validate_cancellation_reason, ConsumptionId, InstitutionId, InventoryRestoration, MovementId,
    Reservation, ReservationId, ReservationState, UserId,
};
use crate::domain::port::{
    AuditLog, Clock, InventoryStore, MovementLedger, OccupancyStore, OccupancyTransaction,
    ReservationRepository, RoomRepository, VisitRegistry,
};
use crate::domain::service::RestorationPlan;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 包括キャンセルの結果
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationReport {
    pub reservation: Reservation,
    /// 取り消した会計明細の件数
    pub voided_movements: usize,
    /// 取り消した消費明細の件数
    pub voided_consumptions: usize,
    /// 復元した在庫
    pub restored: Vec<InventoryRestoration>,
    /// 在庫行が存在せず復元しなかった在庫
    pub skipped: Vec<InventoryRestoration>,
}

/// 利用の包括キャンセルサービス
/// 予約が生み出した副作用（会計明細・消費明細・在庫の引き落とし）をすべて取り消し、
/// 部屋を解放する。すべて1つのトランザクション内で行い、途中で失敗した場合は何も残さない
pub struct OccupancyCancellationService {
    scope: TransactionScope,
    clock: Arc<dyn Clock>,
}

impl OccupancyCancellationService {
    /// 新しいキャンセルサービスを作成
    ///
    /// # Arguments
    /// * `store` - 利用管理ストア
    /// * `clock` - 時刻の取得元
    /// * `operation_timeout` - ストレージ呼び出し1回あたりのタイムアウト
    pub fn new(
        store: Arc<dyn OccupancyStore>,
        clock: Arc<dyn Clock>,
        operation_timeout: std::time::Duration,
    ) -> Self {
        Self {
            scope: TransactionScope::new(store, operation_timeout),
            clock,
        }
    }

    /// 利用を包括的にキャンセルする
    ///
    /// # Arguments
    /// * `reservation_id` - 予約ID
    /// * `reason` - キャンセル理由（150文字以内）
    /// * `institution_id` - 操作する施設ID
    /// * `user_id` - 操作したユーザー（監査ログ用）
    ///
    /// # Returns
    /// * `Ok(CancellationReport)` - キャンセル成功
    /// * `Err(OccupancyError::Validation)` - 理由が長すぎる
    /// * `Err(OccupancyError::NotFound)` - 予約または来訪が存在しない、他施設の予約
    /// * `Err(OccupancyError::BusinessRule)` - 既にキャンセル済み、または完了済み
    #[instrument(
        skip_all,
        fields(
            reservation_id = %reservation_id,
            institution_id = %institution_id,
            user_id = %user_id
        )
    )]
    pub async fn comprehensive_cancel_occupation(
        &self,
        reservation_id: ReservationId,
        reason: String,
        institution_id: InstitutionId,
        user_id: UserId,
    ) -> Result<CancellationReport, OccupancyError> {
        self.try_cancel(reservation_id, reason, institution_id, user_id)
            .await
            .inspect_err(|err| log_failure("comprehensive_cancel_occupation", err))
    }

    async fn try_cancel(
        &self,
        reservation_id: ReservationId,
        reason: String,
        institution_id: InstitutionId,
        user_id: UserId,
    ) -> Result<CancellationReport, OccupancyError> {
        validate_cancellation_reason(&reason)?;
        let now = self.clock.now();

        let mut tx = self.scope.begin().await?;
        let outcome = self
            .cancel_in(tx.as_mut(), reservation_id, reason, institution_id, user_id, now)
            .await;
        let report = self.scope.finish(tx, outcome).await?;

        info!(
            room_id = %report.reservation.room_id(),
            visit_id = %report.reservation.visit_id(),
            voided_movements = report.voided_movements,
            voided_consumptions = report.voided_consumptions,
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            "occupation cancelled"
        );
        Ok(report)
    }

    async fn cancel_in(
        &self,
        tx: &mut dyn OccupancyTransaction,
        reservation_id: ReservationId,
        reason: String,
        institution_id: InstitutionId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<CancellationReport, OccupancyError> {
        let snapshot = self
            .scope
            .call("find_reservation", tx.find_reservation(reservation_id))
            .await?
            .filter(|reservation| reservation.institution_id() == institution_id)
            .ok_or_else(|| not_found_reservation(reservation_id))?;

        // ロック順序: 部屋 → 予約
        let room = self
            .scope
            .call("lock_room", tx.lock_room(snapshot.room_id()))
            .await?;
        let mut reservation = self
            .scope
            .call("lock_reservation", tx.lock_reservation(reservation_id))
            .await?
            .ok_or_else(|| not_found_reservation(reservation_id))?;

        let visit_id = reservation.visit_id();
        self.scope
            .call("find_visit", tx.find_visit(visit_id))
            .await?
            .ok_or_else(|| OccupancyError::NotFound(format!("visit {} not found", visit_id)))?;

        // 副作用を取り消す前に終端状態を拒否する
        match reservation.state() {
            ReservationState::Active => {}
            ReservationState::Cancelled { .. } => {
                return Err(DomainError::AlreadyCancelled.into());
            }
            ReservationState::Completed { .. } => {
                return Err(DomainError::InvalidReservationState(
                    "completed reservations cannot be cancelled".to_string(),
                )
                .into());
            }
        }

        let movements = self
            .scope
            .call("find_open_movements", tx.find_open_movements(visit_id))
            .await?;
        let movement_ids: Vec<MovementId> = movements.iter().map(|m| m.id()).collect();
        if !movement_ids.is_empty() {
            self.scope
                .call("void_movements", tx.void_movements(&movement_ids))
                .await?;
        }

        let consumptions = if movement_ids.is_empty() {
            Vec::new()
        } else {
            self.scope
                .call(
                    "find_open_consumptions",
                    tx.find_open_consumptions(&movement_ids),
                )
                .await?
        };
        let consumption_ids: Vec<ConsumptionId> = consumptions.iter().map(|c| c.id()).collect();
        if !consumption_ids.is_empty() {
            self.scope
                .call("void_consumptions", tx.void_consumptions(&consumption_ids))
                .await?;
        }

        let plan = RestorationPlan::from_consumptions(
            &consumptions,
            Some(reservation.room_id()),
            institution_id,
        )?;
        let mut restored = Vec::new();
        let mut skipped = Vec::new();
        for restoration in plan.restorations() {
            let updated = self
                .scope
                .call(
                    "increase_quantity",
                    tx.increase_quantity(
                        restoration.article_id,
                        restoration.scope,
                        restoration.quantity,
                    ),
                )
                .await?;
            if updated {
                restored.push(*restoration);
            } else {
                warn!(
                    article_id = %restoration.article_id,
                    scope = %restoration.scope,
                    quantity = restoration.quantity,
                    "inventory row missing, restoration skipped"
                );
                skipped.push(*restoration);
            }
        }

        reservation.cancel(now, Some(reason.clone()))?;
        self.scope
            .call("save_reservation", tx.save_reservation(&reservation))
            .await?;

        if let Some(mut room) = room {
            if room.release_for(visit_id) {
                self.scope.call("save_room", tx.save_room(&room)).await?;
            }
        }

        self.scope
            .call("cancel_visit", tx.cancel_visit(visit_id))
            .await?;

        let event = DomainEvent::OccupationCancelled(OccupationCancelled {
            reservation_id,
            institution_id,
            room_id: reservation.room_id(),
            visit_id,
            reason,
            user_id,
            voided_movements: movement_ids.len(),
            voided_consumptions: consumption_ids.len(),
            restored: restored.clone(),
            skipped: skipped.clone(),
            occurred_at: now,
        });
        self.scope
            .call("record_audit", tx.record(&event.to_audit_entry()))
            .await?;

        Ok(CancellationReport {
            reservation,
            voided_movements: movement_ids.len(),
            voided_consumptions: consumption_ids.len(),
            restored,
            skipped,
        })
    }
}
