use crate::domain::error::DomainError;
use chrono::Duration;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// UUIDをラップした識別子型を定義する
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// 新しい一意の識別子を生成
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// UUIDから識別子を作成
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// 文字列から識別子を作成
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                let uuid = Uuid::parse_str(s)?;
                Ok(Self(uuid))
            }

            /// 内部のUUIDを取得
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

entity_id!(
    /// 施設（テナント）の識別子
    InstitutionId
);
entity_id!(
    /// 部屋の識別子
    RoomId
);
entity_id!(
    /// 部屋カテゴリの識別子
    CategoryId
);
entity_id!(
    /// 来訪（宿泊客の記録）の識別子
    VisitId
);
entity_id!(
    /// 予約の識別子
    ReservationId
);
entity_id!(
    /// 会計明細（ムーブメント）の識別子
    MovementId
);
entity_id!(
    /// 消費明細の識別子
    ConsumptionId
);
entity_id!(
    /// 商品の識別子
    ArticleId
);
entity_id!(
    /// 操作ユーザーの識別子
    UserId
);
entity_id!(
    /// プロモーションの識別子
    PromotionId
);

impl PromotionId {
    /// 「プロモーションなし」を表すセンチネル値（nil UUID）
    pub fn none_sentinel() -> Self {
        Self(Uuid::nil())
    }

    /// センチネル値かどうか
    pub fn is_sentinel(&self) -> bool {
        self.0.is_nil()
    }

    /// センチネル値を`None`に正規化する
    pub fn normalize(promotion_id: Option<PromotionId>) -> Option<PromotionId> {
        promotion_id.filter(|id| !id.is_sentinel())
    }
}

/// 金額を表す値オブジェクト
/// 固定小数点（rust_decimal）で保持し、浮動小数点は使わない
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// 金額を取得
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// 時間単価から指定分数分の料金を計算する
    /// `rate × minutes / 60` を小数第2位で四捨五入（0から遠い方向）
    pub fn charge_for_minutes(&self, minutes: u32) -> Result<Money, DomainError> {
        let raw = self
            .0
            .checked_mul(Decimal::from(minutes))
            .and_then(|value| value.checked_div(Decimal::from(60)))
            .ok_or_else(|| DomainError::InvalidValue("料金計算でオーバーフローしました".to_string()))?;
        Ok(Money(raw.round_dp_with_strategy(
            2,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// 1予約あたりの最大滞在時間（7日間）
pub const MAX_STAY_MINUTES: u32 = 7 * 24 * 60;

/// 滞在時間を表す値オブジェクト
/// 分は常に0〜59に正規化される
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayDuration {
    hours: u32,
    minutes: u32,
}

impl StayDuration {
    /// 新しい滞在時間を作成
    /// バリデーション:
    /// - 合計1分以上
    /// - 合計7日（10,080分）以下
    pub fn new(hours: u32, minutes: u32) -> Result<Self, DomainError> {
        let total = u64::from(hours) * 60 + u64::from(minutes);
        if total == 0 {
            return Err(DomainError::InvalidDuration(
                "滞在時間は1分以上である必要があります".to_string(),
            ));
        }
        if total > u64::from(MAX_STAY_MINUTES) {
            return Err(DomainError::InvalidDuration(format!(
                "滞在時間は{}分以下である必要があります",
                MAX_STAY_MINUTES
            )));
        }
        Ok(Self::normalized(total))
    }

    /// 永続化されたデータから再構築（上限チェックなし）
    pub fn reconstruct(hours: u32, minutes: u32) -> Self {
        Self::normalized(u64::from(hours) * 60 + u64::from(minutes))
    }

    fn normalized(total_minutes: u64) -> Self {
        Self {
            hours: u32::try_from(total_minutes / 60).unwrap_or(u32::MAX),
            minutes: (total_minutes % 60) as u32,
        }
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// 合計分数
    pub fn total_minutes(&self) -> u64 {
        u64::from(self.hours) * 60 + u64::from(self.minutes)
    }

    pub fn as_duration(&self) -> Duration {
        Duration::minutes(self.total_minutes() as i64)
    }

    /// 延長後の滞在時間を返す
    /// 60分以上の分は時間に繰り上げる。上限の再チェックは行わない
    pub fn extended_by(&self, hours: u32, minutes: u32) -> Result<Self, DomainError> {
        let extra = u64::from(hours) * 60 + u64::from(minutes);
        let total = self.total_minutes() + extra;
        if total / 60 > u64::from(u32::MAX) {
            return Err(DomainError::InvalidDuration(
                "延長後の滞在時間が大きすぎます".to_string(),
            ));
        }
        Ok(Self::normalized(total))
    }
}

impl fmt::Display for StayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h{:02}m", self.hours, self.minutes)
    }
}

/// 一時停止時の残り時間／超過時間
/// 正の値は残り時間、負の値は名目終了時刻からの超過時間を表す
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PauseBalance {
    hours: i64,
    minutes: i64,
}

impl PauseBalance {
    pub fn zero() -> Self {
        Self::default()
    }

    /// 符号付きの分数から作成
    /// 時間と分は同じ符号を持つ（例: -65分 → -1時間 -5分）
    pub fn from_signed_minutes(total: i64) -> Self {
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }

    /// 永続化されたデータから再構築
    pub fn reconstruct(hours: i64, minutes: i64) -> Self {
        Self { hours, minutes }
    }

    /// 残り時間（正）として記録する
    pub fn remaining(duration: Duration) -> Self {
        Self::from_signed_minutes(duration.num_minutes().abs())
    }

    /// 超過時間（負）として記録する
    pub fn overtime(duration: Duration) -> Self {
        Self::from_signed_minutes(-duration.num_minutes().abs())
    }

    pub fn hours(&self) -> i64 {
        self.hours
    }

    pub fn minutes(&self) -> i64 {
        self.minutes
    }

    pub fn total_minutes(&self) -> i64 {
        self.hours * 60 + self.minutes
    }

    pub fn is_overtime(&self) -> bool {
        self.total_minutes() < 0
    }

    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0
    }
}

/// 宿泊客情報のスナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDetails {
    display_identifier: String,
    phone: Option<String>,
    plate: Option<String>,
}

impl GuestDetails {
    /// 新しい宿泊客情報を作成
    /// 表示用識別子は空にできない
    pub fn new(
        display_identifier: String,
        phone: Option<String>,
        plate: Option<String>,
    ) -> Result<Self, DomainError> {
        if display_identifier.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "宿泊客の識別子は空にできません".to_string(),
            ));
        }
        Ok(Self {
            display_identifier,
            phone: phone.filter(|p| !p.trim().is_empty()),
            plate: plate.filter(|p| !p.trim().is_empty()),
        })
    }

    pub fn display_identifier(&self) -> &str {
        &self.display_identifier
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn plate(&self) -> Option<&str> {
        self.plate.as_deref()
    }
}

/// 在庫の保管場所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InventoryScope {
    /// 部屋ごとの在庫（ミニバーなど）
    Room(RoomId),
    /// 施設全体の共通在庫
    General(InstitutionId),
}

impl fmt::Display for InventoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryScope::Room(room_id) => write!(f, "room:{}", room_id),
            InventoryScope::General(institution_id) => write!(f, "general:{}", institution_id),
        }
    }
}
