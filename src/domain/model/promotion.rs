use crate::domain::model::{CategoryId, InstitutionId, Money, PromotionId};

/// プロモーション
/// 部屋カテゴリ単位で基本単価を上書きする時間単価
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    id: PromotionId,
    institution_id: InstitutionId,
    category_id: CategoryId,
    name: String,
    rate: Money,
    active: bool,
}

impl Promotion {
    pub fn new(
        id: PromotionId,
        institution_id: InstitutionId,
        category_id: CategoryId,
        name: String,
        rate: Money,
        active: bool,
    ) -> Self {
        Self {
            id,
            institution_id,
            category_id,
            name,
            rate,
            active,
        }
    }

    pub fn id(&self) -> PromotionId {
        self.id
    }

    pub fn institution_id(&self) -> InstitutionId {
        self.institution_id
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> Money {
        self.rate
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 指定の施設で利用可能か
    pub fn is_usable_in(&self, institution_id: InstitutionId) -> bool {
        self.active && self.institution_id == institution_id
    }

    /// 指定の部屋カテゴリに適用できるか
    pub fn applies_to(&self, category_id: CategoryId) -> bool {
        self.category_id == category_id
    }
}
