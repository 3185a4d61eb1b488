use crate::domain::model::{
    ArticleId, ConsumptionId, InstitutionId, InventoryScope, Money, MovementId, RoomId, VisitId,
};
use chrono::{DateTime, Utc};

/// 会計明細（ムーブメント）
/// 作成後は金額を変更せず、取り消し（void）のみ可能。削除はしない
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    id: MovementId,
    visit_id: VisitId,
    amount: Money,
    description: String,
    created_at: DateTime<Utc>,
    cancelled: bool,
}

impl Movement {
    pub fn new(
        id: MovementId,
        visit_id: VisitId,
        amount: Money,
        description: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            visit_id,
            amount,
            description,
            created_at,
            cancelled: false,
        }
    }

    /// データベースから取得したデータで会計明細を再構築
    pub fn reconstruct(
        id: MovementId,
        visit_id: VisitId,
        amount: Money,
        description: String,
        created_at: DateTime<Utc>,
        cancelled: bool,
    ) -> Self {
        Self {
            id,
            visit_id,
            amount,
            description,
            created_at,
            cancelled,
        }
    }

    pub fn id(&self) -> MovementId {
        self.id
    }

    pub fn visit_id(&self) -> VisitId {
        self.visit_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn void(&mut self) {
        self.cancelled = true;
    }
}

/// 消費明細の在庫引当元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumptionSource {
    /// 部屋の在庫から引き当て
    RoomStock,
    /// 施設共通の在庫から引き当て
    GeneralStock,
}

impl ConsumptionSource {
    /// 永続化用のフラグ（部屋在庫ならtrue）
    pub fn is_room_scoped(&self) -> bool {
        matches!(self, ConsumptionSource::RoomStock)
    }

    pub fn from_room_scoped(room_scoped: bool) -> Self {
        if room_scoped {
            ConsumptionSource::RoomStock
        } else {
            ConsumptionSource::GeneralStock
        }
    }

    /// 引当元の在庫スコープを解決する
    /// 部屋在庫で部屋が不明な場合は`None`
    pub fn scope(
        &self,
        room_id: Option<RoomId>,
        institution_id: InstitutionId,
    ) -> Option<InventoryScope> {
        match self {
            ConsumptionSource::RoomStock => room_id.map(InventoryScope::Room),
            ConsumptionSource::GeneralStock => Some(InventoryScope::General(institution_id)),
        }
    }
}

/// 消費明細
/// 滞在中に会計明細へ計上された商品の行。取り消し時に在庫を戻す
#[derive(Debug, Clone, PartialEq)]
pub struct Consumption {
    id: ConsumptionId,
    movement_id: MovementId,
    article_id: ArticleId,
    quantity: u32,
    unit_price: Money,
    source: ConsumptionSource,
    cancelled: bool,
}

impl Consumption {
    pub fn new(
        id: ConsumptionId,
        movement_id: MovementId,
        article_id: ArticleId,
        quantity: u32,
        unit_price: Money,
        source: ConsumptionSource,
    ) -> Self {
        Self {
            id,
            movement_id,
            article_id,
            quantity,
            unit_price,
            source,
            cancelled: false,
        }
    }

    /// データベースから取得したデータで消費明細を再構築
    pub fn reconstruct(
        id: ConsumptionId,
        movement_id: MovementId,
        article_id: ArticleId,
        quantity: u32,
        unit_price: Money,
        source: ConsumptionSource,
        cancelled: bool,
    ) -> Self {
        Self {
            id,
            movement_id,
            article_id,
            quantity,
            unit_price,
            source,
            cancelled,
        }
    }

    pub fn id(&self) -> ConsumptionId {
        self.id
    }

    pub fn movement_id(&self) -> MovementId {
        self.movement_id
    }

    pub fn article_id(&self) -> ArticleId {
        self.article_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn source(&self) -> ConsumptionSource {
        self.source
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn void(&mut self) {
        self.cancelled = true;
    }
}
