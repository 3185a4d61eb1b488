use crate::application::command::CreateReservationCommand;
use crate::application::OccupancyError;
use crate::domain::error::DomainError;
use crate::domain::event::{DomainEvent, ReservationCreated};
use crate::domain::model::{
    validate_cancellation_reason, GuestDetails, PromotionId, Reservation, ReservationId, RoomId,
    StayDuration, VisitId,
};
use crate::domain::port::{
    AuditLog, Clock, MovementLedger, OccupancyStore, OccupancyTransaction, PromotionCatalog,
    ReservationRepository, RoomRepository, VisitRegistry,
};
use crate::domain::service::{PricingResolver, PricingResult, PromotionLookup};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

mod cancellation_service;
mod reservation_query_service;
mod transaction_scope;

pub use cancellation_service::{CancellationReport, OccupancyCancellationService};
pub use reservation_query_service::ReservationQueryService;
pub use transaction_scope::TransactionScope;

use transaction_scope::log_failure;

/// 開始時刻として許容する過去方向の猶予（分）
pub const START_TIME_PAST_TOLERANCE_MINUTES: i64 = 5;
/// 開始時刻として許容する未来方向の上限（日）
pub const START_TIME_FUTURE_LIMIT_DAYS: i64 = 365;

/// 予約作成の結果
#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub reservation: Reservation,
    pub pricing: PricingResult,
}

/// 開始時刻が許容範囲内か検証する
/// 5分より前の過去、365日より先の未来は不可
pub fn validate_start_time(
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), OccupancyError> {
    if start_time < now - Duration::minutes(START_TIME_PAST_TOLERANCE_MINUTES) {
        return Err(OccupancyError::Validation(format!(
            "start time must not be more than {} minutes in the past",
            START_TIME_PAST_TOLERANCE_MINUTES
        )));
    }
    if start_time > now + Duration::days(START_TIME_FUTURE_LIMIT_DAYS) {
        return Err(OccupancyError::Validation(format!(
            "start time must not be more than {} days in the future",
            START_TIME_FUTURE_LIMIT_DAYS
        )));
    }
    Ok(())
}

/// 予約アプリケーションサービス
/// 予約の作成と、終了・一時停止・再開・延長・プロモーション変更・キャンセルの状態遷移を扱う
pub struct ReservationApplicationService {
    scope: TransactionScope,
    clock: Arc<dyn Clock>,
}

impl ReservationApplicationService {
    /// 新しいアプリケーションサービスを作成
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

    /// 新しい予約を作成
    /// 部屋行をロックした1つのトランザクション内で、料金計算・来訪・会計明細・予約の作成と
    /// 部屋の使用中への切り替えを行う
    ///
    /// # Returns
    /// * `Ok(BookingConfirmation)` - 作成された予約と料金
    /// * `Err(OccupancyError::Validation)` - 滞在時間・開始時刻・宿泊客情報が不正
    /// * `Err(OccupancyError::NotFound)` - 部屋が存在しない
    /// * `Err(OccupancyError::Conflict)` - 部屋が既に使用中、またはロックの競合
    /// * `Err(OccupancyError::BusinessRule)` - プロモーションが無効
    #[instrument(
        skip_all,
        fields(
            room_id = %command.room_id,
            institution_id = %command.institution_id,
            user_id = %command.user_id
        )
    )]
    pub async fn create_reservation(
        &self,
        command: CreateReservationCommand,
    ) -> Result<BookingConfirmation, OccupancyError> {
        self.try_create_reservation(command)
            .await
            .inspect_err(|err| log_failure("create_reservation", err))
    }

    async fn try_create_reservation(
        &self,
        command: CreateReservationCommand,
    ) -> Result<BookingConfirmation, OccupancyError> {
        let now = self.clock.now();

        // 変更を行う前にすべての入力を検証する
        let duration = StayDuration::new(command.hours, command.minutes)?;
        validate_start_time(command.start_time, now)?;
        let guest = command
            .guest
            .clone()
            .ok_or_else(|| OccupancyError::Validation("guest details are required".to_string()))?;

        let mut tx = self.scope.begin().await?;
        let outcome = self
            .create_in(tx.as_mut(), &command, duration, &guest, now)
            .await;
        let confirmation = self.scope.finish(tx, outcome).await?;

        info!(
            reservation_id = %confirmation.reservation.id(),
            visit_id = %confirmation.reservation.visit_id(),
            total = %confirmation.pricing.total,
            "reservation created"
        );
        Ok(confirmation)
    }

    async fn create_in(
        &self,
        tx: &mut dyn OccupancyTransaction,
        command: &CreateReservationCommand,
        duration: StayDuration,
        guest: &GuestDetails,
        now: DateTime<Utc>,
    ) -> Result<BookingConfirmation, OccupancyError> {
        let room_id = command.room_id;
        let institution_id = command.institution_id;

        let mut room = self
            .scope
            .call("lock_room", tx.lock_room(room_id))
            .await?
            .filter(|room| room.institution_id() == institution_id)
            .ok_or_else(|| OccupancyError::NotFound(format!("room {} not found", room_id)))?;

        // ロック取得後に再確認する（二重予約の防止）
        if !room.is_available() {
            return Err(DomainError::RoomUnavailable.into());
        }

        let promotion_id = PromotionId::normalize(command.promotion_id);
        let promotion = match promotion_id {
            Some(id) => {
                self.scope
                    .call("find_promotion", tx.find_promotion(id, institution_id))
                    .await?
            }
            None => None,
        };
        let lookup = match (promotion_id, promotion.as_ref()) {
            (None, _) => PromotionLookup::NotRequested,
            (Some(_), Some(promotion)) => PromotionLookup::Found(promotion),
            (Some(id), None) => PromotionLookup::Missing(id),
        };
        let pricing = PricingResolver::resolve(
            room.hourly_rate(),
            lookup,
            duration,
            institution_id,
            Some(room.category_id()),
        )?;

        let visit = self
            .scope
            .call("create_visit", tx.create_visit(institution_id, guest, room_id))
            .await?;

        let description = format!("Room occupancy {} at {}/h", duration, pricing.rate);
        let movement = self
            .scope
            .call(
                "create_movement",
                tx.create_movement(visit.id(), pricing.total, &description),
            )
            .await?;

        let reservation = Reservation::new(
            ReservationId::new(),
            institution_id,
            room_id,
            visit.id(),
            movement.id(),
            command.start_time,
            duration,
            promotion_id,
        );
        self.scope
            .call("insert_reservation", tx.insert_reservation(&reservation))
            .await?;

        room.occupy(visit.id())?;
        self.scope.call("save_room", tx.save_room(&room)).await?;

        let event = DomainEvent::ReservationCreated(ReservationCreated {
            reservation_id: reservation.id(),
            institution_id,
            room_id,
            visit_id: visit.id(),
            guest_identifier: guest.display_identifier().to_string(),
            promotion_id,
            total: pricing.total,
            user_id: command.user_id,
            occurred_at: now,
        });
        self.scope
            .call("record_audit", tx.record(&event.to_audit_entry()))
            .await?;

        Ok(BookingConfirmation {
            reservation,
            pricing,
        })
    }

    /// 部屋の利用中の予約を終了し、部屋を空室に戻す
    /// 利用中の予約がなければ何もせず`Ok(None)`を返す（部屋が存在しない場合は警告を出す）
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn finalize_reservation(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Reservation>, OccupancyError> {
        self.try_finalize_reservation(room_id)
            .await
            .inspect_err(|err| log_failure("finalize_reservation", err))
    }

    async fn try_finalize_reservation(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Reservation>, OccupancyError> {
        let now = self.clock.now();
        let mut tx = self.scope.begin().await?;
        let outcome = self.finalize_in(tx.as_mut(), room_id, now).await;
        let finalized = self.scope.finish(tx, outcome).await?;

        match &finalized {
            Some(reservation) => info!(reservation_id = %reservation.id(), "reservation finalized"),
            None => info!("no active reservation to finalize"),
        }
        Ok(finalized)
    }

    async fn finalize_in(
        &self,
        tx: &mut dyn OccupancyTransaction,
        room_id: RoomId,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, OccupancyError> {
        let Some(mut room) = self.scope.call("lock_room", tx.lock_room(room_id)).await? else {
            warn!("room not found, nothing to finalize");
            return Ok(None);
        };
        let Some(mut reservation) = self
            .scope
            .call(
                "lock_active_reservation_for_room",
                tx.lock_active_reservation_for_room(room_id),
            )
            .await?
        else {
            return Ok(None);
        };

        reservation.complete(now)?;
        self.scope
            .call("save_reservation", tx.save_reservation(&reservation))
            .await?;

        room.release();
        self.scope.call("save_room", tx.save_room(&room)).await?;

        Ok(Some(reservation))
    }

    /// 利用を一時停止する
    /// 名目終了前なら残り時間（正）、終了後なら超過時間（負）を記録する
    #[instrument(skip_all, fields(visit_id = %visit_id))]
    pub async fn pause_occupation(&self, visit_id: VisitId) -> Result<Reservation, OccupancyError> {
        let now = self.clock.now();
        self.update_active_for_visit(visit_id, |reservation| {
            reservation.pause_at(now).map(|_| ())
        })
        .await
        .inspect_err(|err| log_failure("pause_occupation", err))
    }

    /// 一時停止を解除する
    #[instrument(skip_all, fields(visit_id = %visit_id))]
    pub async fn resume_occupation(&self, visit_id: VisitId) -> Result<Reservation, OccupancyError> {
        self.update_active_for_visit(visit_id, Reservation::resume)
            .await
            .inspect_err(|err| log_failure("resume_occupation", err))
    }

    async fn update_active_for_visit<F>(
        &self,
        visit_id: VisitId,
        change: F,
    ) -> Result<Reservation, OccupancyError>
    where
        F: FnOnce(&mut Reservation) -> Result<(), DomainError> + Send,
    {
        let mut tx = self.scope.begin().await?;
        let outcome = self.update_visit_in(tx.as_mut(), visit_id, change).await;
        let reservation = self.scope.finish(tx, outcome).await?;

        info!(
            reservation_id = %reservation.id(),
            pause_hours = reservation.pause().hours(),
            pause_minutes = reservation.pause().minutes(),
            "occupation pause updated"
        );
        Ok(reservation)
    }

    async fn update_visit_in<F>(
        &self,
        tx: &mut dyn OccupancyTransaction,
        visit_id: VisitId,
        change: F,
    ) -> Result<Reservation, OccupancyError>
    where
        F: FnOnce(&mut Reservation) -> Result<(), DomainError> + Send,
    {
        let mut reservation = self
            .scope
            .call(
                "lock_active_reservation_for_visit",
                tx.lock_active_reservation_for_visit(visit_id),
            )
            .await?
            .ok_or_else(|| {
                OccupancyError::NotFound(format!("no active reservation for visit {}", visit_id))
            })?;
        change(&mut reservation)?;
        self.scope
            .call("save_reservation", tx.save_reservation(&reservation))
            .await?;
        Ok(reservation)
    }

    /// 滞在時間を延長する
    /// 60分以上の分は時間に繰り上げる。7日の上限は再チェックしない
    #[instrument(skip_all, fields(reservation_id = %reservation_id))]
    pub async fn extend_reservation(
        &self,
        reservation_id: ReservationId,
        hours: u32,
        minutes: u32,
    ) -> Result<Reservation, OccupancyError> {
        self.try_extend_reservation(reservation_id, hours, minutes)
            .await
            .inspect_err(|err| log_failure("extend_reservation", err))
    }

    async fn try_extend_reservation(
        &self,
        reservation_id: ReservationId,
        hours: u32,
        minutes: u32,
    ) -> Result<Reservation, OccupancyError> {
        let mut tx = self.scope.begin().await?;
        let outcome = self
            .extend_in(tx.as_mut(), reservation_id, hours, minutes)
            .await;
        let reservation = self.scope.finish(tx, outcome).await?;

        info!(duration = %reservation.duration(), "reservation extended");
        Ok(reservation)
    }

    async fn extend_in(
        &self,
        tx: &mut dyn OccupancyTransaction,
        reservation_id: ReservationId,
        hours: u32,
        minutes: u32,
    ) -> Result<Reservation, OccupancyError> {
        let mut reservation = self
            .scope
            .call("lock_reservation", tx.lock_reservation(reservation_id))
            .await?
            .ok_or_else(|| not_found_reservation(reservation_id))?;
        reservation.extend(hours, minutes)?;
        self.scope
            .call("save_reservation", tx.save_reservation(&reservation))
            .await?;
        Ok(reservation)
    }

    /// 予約のプロモーションを差し替える
    /// カテゴリの適合性のみ検証し、料金は再計算しない。`None`またはnil UUIDで解除する
    #[instrument(skip_all, fields(reservation_id = %reservation_id))]
    pub async fn update_reservation_promotion(
        &self,
        reservation_id: ReservationId,
        promotion_id: Option<PromotionId>,
    ) -> Result<Reservation, OccupancyError> {
        self.try_update_reservation_promotion(reservation_id, promotion_id)
            .await
            .inspect_err(|err| log_failure("update_reservation_promotion", err))
    }

    async fn try_update_reservation_promotion(
        &self,
        reservation_id: ReservationId,
        promotion_id: Option<PromotionId>,
    ) -> Result<Reservation, OccupancyError> {
        let mut tx = self.scope.begin().await?;
        let outcome = self
            .update_promotion_in(tx.as_mut(), reservation_id, promotion_id)
            .await;
        let reservation = self.scope.finish(tx, outcome).await?;

        info!(
            promotion_id = ?reservation.promotion_id(),
            "reservation promotion updated"
        );
        Ok(reservation)
    }

    async fn update_promotion_in(
        &self,
        tx: &mut dyn OccupancyTransaction,
        reservation_id: ReservationId,
        promotion_id: Option<PromotionId>,
    ) -> Result<Reservation, OccupancyError> {
        let snapshot = self
            .scope
            .call("find_reservation", tx.find_reservation(reservation_id))
            .await?
            .ok_or_else(|| not_found_reservation(reservation_id))?;

        // ロック順序: 部屋 → 予約
        let room = self
            .scope
            .call("lock_room", tx.lock_room(snapshot.room_id()))
            .await?
            .ok_or_else(|| {
                OccupancyError::NotFound(format!("room {} not found", snapshot.room_id()))
            })?;
        let mut reservation = self
            .scope
            .call("lock_reservation", tx.lock_reservation(reservation_id))
            .await?
            .ok_or_else(|| not_found_reservation(reservation_id))?;

        let promotion_id = PromotionId::normalize(promotion_id);
        if let Some(id) = promotion_id {
            let promotion = self
                .scope
                .call(
                    "find_promotion",
                    tx.find_promotion(id, reservation.institution_id()),
                )
                .await?;
            let lookup = match promotion.as_ref() {
                Some(promotion) => PromotionLookup::Found(promotion),
                None => PromotionLookup::Missing(id),
            };
            PricingResolver::check_promotion(
                lookup,
                reservation.institution_id(),
                Some(room.category_id()),
            )?;
        }

        reservation.change_promotion(promotion_id)?;
        self.scope
            .call("save_reservation", tx.save_reservation(&reservation))
            .await?;
        Ok(reservation)
    }

    /// 予約をキャンセルする（会計・在庫の取り消しは行わない）
    /// 消費が記録される前の予約を取り消す場合に使う
    ///
    /// # Returns
    /// * `Ok(Reservation)` - キャンセルされた予約
    /// * `Err(OccupancyError::Validation)` - 理由が150文字を超える
    /// * `Err(OccupancyError::NotFound)` - 予約が存在しない
    /// * `Err(OccupancyError::BusinessRule)` - 既にキャンセル済み、または完了済み
    #[instrument(skip_all, fields(reservation_id = %reservation_id))]
    pub async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
        reason: String,
    ) -> Result<Reservation, OccupancyError> {
        self.try_cancel_reservation(reservation_id, reason)
            .await
            .inspect_err(|err| log_failure("cancel_reservation", err))
    }

    async fn try_cancel_reservation(
        &self,
        reservation_id: ReservationId,
        reason: String,
    ) -> Result<Reservation, OccupancyError> {
        validate_cancellation_reason(&reason)?;
        let now = self.clock.now();

        let mut tx = self.scope.begin().await?;
        let outcome = self.cancel_in(tx.as_mut(), reservation_id, reason, now).await;
        let reservation = self.scope.finish(tx, outcome).await?;

        info!(room_id = %reservation.room_id(), "reservation cancelled");
        Ok(reservation)
    }

    async fn cancel_in(
        &self,
        tx: &mut dyn OccupancyTransaction,
        reservation_id: ReservationId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Reservation, OccupancyError> {
        let snapshot = self
            .scope
            .call("find_reservation", tx.find_reservation(reservation_id))
            .await?
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

        reservation.cancel(now, Some(reason))?;
        self.scope
            .call("save_reservation", tx.save_reservation(&reservation))
            .await?;

        if let Some(mut room) = room {
            if room.release_for(reservation.visit_id()) {
                self.scope.call("save_room", tx.save_room(&room)).await?;
            }
        }

        Ok(reservation)
    }
}

pub(crate) fn not_found_reservation(reservation_id: ReservationId) -> OccupancyError {
    OccupancyError::NotFound(format!("reservation {} not found", reservation_id))
}
