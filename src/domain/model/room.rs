use crate::domain::error::DomainError;
use crate::domain::model::{CategoryId, InstitutionId, Money, RoomId, VisitId};

/// 部屋エンティティ
/// 排他的に割り当てられる資源。使用中は`active_visit`が設定され`available`はfalseになる
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    id: RoomId,
    institution_id: InstitutionId,
    category_id: CategoryId,
    hourly_rate: Money,
    available: bool,
    active_visit: Option<VisitId>,
}

impl Room {
    /// 空室として新しい部屋を作成
    pub fn new(
        id: RoomId,
        institution_id: InstitutionId,
        category_id: CategoryId,
        hourly_rate: Money,
    ) -> Self {
        Self {
            id,
            institution_id,
            category_id,
            hourly_rate,
            available: true,
            active_visit: None,
        }
    }

    /// データベースから取得したデータで部屋を再構築
    pub fn reconstruct(
        id: RoomId,
        institution_id: InstitutionId,
        category_id: CategoryId,
        hourly_rate: Money,
        available: bool,
        active_visit: Option<VisitId>,
    ) -> Self {
        Self {
            id,
            institution_id,
            category_id,
            hourly_rate,
            available,
            active_visit,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn institution_id(&self) -> InstitutionId {
        self.institution_id
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    /// カテゴリの基本時間単価
    pub fn hourly_rate(&self) -> Money {
        self.hourly_rate
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn active_visit(&self) -> Option<VisitId> {
        self.active_visit
    }

    /// 部屋を使用中にする
    /// `available: true → false` の遷移。既に使用中なら失敗する
    pub fn occupy(&mut self, visit_id: VisitId) -> Result<(), DomainError> {
        if !self.available {
            return Err(DomainError::RoomUnavailable);
        }
        self.available = false;
        self.active_visit = Some(visit_id);
        Ok(())
    }

    /// 部屋を解放する
    pub fn release(&mut self) {
        self.available = true;
        self.active_visit = None;
    }

    /// 指定の来訪が使用中、または誰も割り当てられていない場合に部屋を解放する
    /// 別の来訪が既に入室している部屋は解放しない
    pub fn release_for(&mut self, visit_id: VisitId) -> bool {
        match self.active_visit {
            Some(current) if current != visit_id => false,
            _ => {
                self.release();
                true
            }
        }
    }
}
