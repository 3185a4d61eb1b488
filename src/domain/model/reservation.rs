use crate::domain::error::DomainError;
use crate::domain::model::{
    InstitutionId, MovementId, PauseBalance, PromotionId, ReservationId, RoomId, StayDuration,
    VisitId,
};
use chrono::{DateTime, Utc};

/// キャンセル理由の最大文字数
pub const MAX_CANCELLATION_REASON_CHARS: usize = 150;

/// キャンセル理由の長さを検証する
pub fn validate_cancellation_reason(reason: &str) -> Result<(), DomainError> {
    if reason.chars().count() > MAX_CANCELLATION_REASON_CHARS {
        return Err(DomainError::InvalidValue(format!(
            "キャンセル理由は{}文字以下である必要があります",
            MAX_CANCELLATION_REASON_CHARS
        )));
    }
    Ok(())
}

/// 予約のライフサイクル状態
/// Completed と Cancelled は終端状態で、そこからの遷移はない
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationState {
    /// 利用中
    Active,
    /// 正常終了
    Completed { ended_at: DateTime<Utc> },
    /// キャンセル済み（終了時刻はキャンセル時刻と同じ）
    Cancelled {
        cancelled_at: DateTime<Utc>,
        reason: Option<String>,
    },
}

impl ReservationState {
    /// 永続化された終了時刻・キャンセル時刻から状態を復元する
    pub fn from_timestamps(
        end_time: Option<DateTime<Utc>>,
        cancelled_at: Option<DateTime<Utc>>,
        reason: Option<String>,
    ) -> Result<Self, DomainError> {
        match (end_time, cancelled_at) {
            (None, None) => Ok(ReservationState::Active),
            (Some(ended_at), None) => Ok(ReservationState::Completed { ended_at }),
            (end_time, Some(cancelled_at)) => {
                if let Some(ended_at) = end_time {
                    if ended_at != cancelled_at {
                        return Err(DomainError::InvalidValue(
                            "キャンセル済み予約の終了時刻がキャンセル時刻と一致しません"
                                .to_string(),
                        ));
                    }
                }
                Ok(ReservationState::Cancelled {
                    cancelled_at,
                    reason,
                })
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Active => "Active",
            ReservationState::Completed { .. } => "Completed",
            ReservationState::Cancelled { .. } => "Cancelled",
        }
    }
}

/// 予約集約
/// 部屋への来訪の時間枠付き割り当て。料金・プロモーション・一時停止の情報を持つ
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    id: ReservationId,
    institution_id: InstitutionId,
    room_id: RoomId,
    visit_id: VisitId,
    movement_id: MovementId,
    start_time: DateTime<Utc>,
    duration: StayDuration,
    pause: PauseBalance,
    promotion_id: Option<PromotionId>,
    state: ReservationState,
}

impl Reservation {
    /// 新しい予約を作成
    /// 初期状態はActive、一時停止は0
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ReservationId,
        institution_id: InstitutionId,
        room_id: RoomId,
        visit_id: VisitId,
        movement_id: MovementId,
        start_time: DateTime<Utc>,
        duration: StayDuration,
        promotion_id: Option<PromotionId>,
    ) -> Self {
        Self {
            id,
            institution_id,
            room_id,
            visit_id,
            movement_id,
            start_time,
            duration,
            pause: PauseBalance::zero(),
            promotion_id: PromotionId::normalize(promotion_id),
            state: ReservationState::Active,
        }
    }

    /// データベースから取得したデータで予約を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: ReservationId,
        institution_id: InstitutionId,
        room_id: RoomId,
        visit_id: VisitId,
        movement_id: MovementId,
        start_time: DateTime<Utc>,
        duration: StayDuration,
        pause: PauseBalance,
        promotion_id: Option<PromotionId>,
        state: ReservationState,
    ) -> Self {
        Self {
            id,
            institution_id,
            room_id,
            visit_id,
            movement_id,
            start_time,
            duration,
            pause,
            promotion_id,
            state,
        }
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn institution_id(&self) -> InstitutionId {
        self.institution_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn visit_id(&self) -> VisitId {
        self.visit_id
    }

    pub fn movement_id(&self) -> MovementId {
        self.movement_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration(&self) -> StayDuration {
        self.duration
    }

    pub fn pause(&self) -> PauseBalance {
        self.pause
    }

    pub fn promotion_id(&self) -> Option<PromotionId> {
        self.promotion_id
    }

    pub fn state(&self) -> &ReservationState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ReservationState::Active)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, ReservationState::Cancelled { .. })
    }

    /// 名目上の終了時刻（開始時刻 + 滞在時間）
    /// 延長を重ねて表現可能な日時を超えた場合はエラー
    pub fn nominal_end(&self) -> Result<DateTime<Utc>, DomainError> {
        self.start_time
            .checked_add_signed(self.duration.as_duration())
            .ok_or_else(|| {
                DomainError::InvalidDuration(format!(
                    "滞在時間{}では終了時刻を計算できません",
                    self.duration
                ))
            })
    }

    /// 終了時刻。キャンセル済みの場合はキャンセル時刻
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            ReservationState::Active => None,
            ReservationState::Completed { ended_at } => Some(*ended_at),
            ReservationState::Cancelled { cancelled_at, .. } => Some(*cancelled_at),
        }
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            ReservationState::Cancelled { cancelled_at, .. } => Some(*cancelled_at),
            _ => None,
        }
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        match &self.state {
            ReservationState::Cancelled { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    fn ensure_active(&self, action: &str) -> Result<(), DomainError> {
        match &self.state {
            ReservationState::Active => Ok(()),
            ReservationState::Completed { .. } => Err(DomainError::InvalidReservationState(
                format!("完了済みの予約は{}できません", action),
            )),
            ReservationState::Cancelled { .. } => Err(DomainError::InvalidReservationState(
                format!("キャンセル済みの予約は{}できません", action),
            )),
        }
    }

    /// 予約を正常終了する
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_active("終了")?;
        self.state = ReservationState::Completed { ended_at: now };
        Ok(())
    }

    /// 利用を一時停止する
    /// 名目終了時刻を過ぎていれば超過時間を負の値で、過ぎていなければ残り時間を正の値で記録する
    pub fn pause_at(&mut self, now: DateTime<Utc>) -> Result<PauseBalance, DomainError> {
        self.ensure_active("一時停止")?;
        let nominal_end = self.nominal_end()?;
        self.pause = if now > nominal_end {
            PauseBalance::overtime(now - nominal_end)
        } else {
            PauseBalance::remaining(nominal_end - now)
        };
        Ok(self.pause)
    }

    /// 一時停止を解除する（残り時間を無条件に0へ戻す）
    pub fn resume(&mut self) -> Result<(), DomainError> {
        self.ensure_active("再開")?;
        self.pause = PauseBalance::zero();
        Ok(())
    }

    /// 滞在時間を延長する
    pub fn extend(&mut self, hours: u32, minutes: u32) -> Result<StayDuration, DomainError> {
        self.ensure_active("延長")?;
        self.duration = self.duration.extended_by(hours, minutes)?;
        Ok(self.duration)
    }

    /// プロモーションを差し替える（カテゴリの検証は呼び出し側で行う）
    pub fn change_promotion(&mut self, promotion_id: Option<PromotionId>) -> Result<(), DomainError> {
        self.ensure_active("プロモーション変更")?;
        self.promotion_id = PromotionId::normalize(promotion_id);
        Ok(())
    }

    /// 予約をキャンセルする
    /// 事前条件:
    /// - キャンセル済みでない
    /// - 完了済みでない
    pub fn cancel(&mut self, now: DateTime<Utc>, reason: Option<String>) -> Result<(), DomainError> {
        match &self.state {
            ReservationState::Active => {}
            ReservationState::Cancelled { .. } => return Err(DomainError::AlreadyCancelled),
            ReservationState::Completed { .. } => {
                return Err(DomainError::InvalidReservationState(
                    "完了済みの予約はキャンセルできません".to_string(),
                ))
            }
        }
        if let Some(reason) = &reason {
            validate_cancellation_reason(reason)?;
        }
        self.state = ReservationState::Cancelled {
            cancelled_at: now,
            reason,
        };
        Ok(())
    }
}
