// ドメインサービス
// 複数の集約にまたがるビジネスロジックを実装

use crate::domain::error::DomainError;
use crate::domain::model::{
    ArticleId, CategoryId, Consumption, InstitutionId, InventoryRestoration, InventoryScope, Money,
    Promotion, PromotionId, RoomId, StayDuration,
};
use std::collections::BTreeMap;

pub const PROMOTION_INVALID: &str = "promotion invalid or not in this institution";
pub const PROMOTION_CATEGORY_MISMATCH: &str = "promotion not valid for this room category";

/// プロモーションの検索結果
#[derive(Debug, Clone, Copy)]
pub enum PromotionLookup<'a> {
    /// プロモーション指定なし
    NotRequested,
    /// 指定されたが見つからなかった
    Missing(PromotionId),
    /// 見つかった
    Found(&'a Promotion),
}

/// 適用されたプロモーション（表示用）
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPromotion {
    pub id: PromotionId,
    pub name: String,
    pub rate: Money,
}

/// 料金計算の結果（永続化しない）
#[derive(Debug, Clone, PartialEq)]
pub struct PricingResult {
    /// 適用された時間単価
    pub rate: Money,
    /// 合計金額（小数第2位で丸め済み）
    pub total: Money,
    pub promotion: Option<AppliedPromotion>,
}

/// 料金リゾルバ
/// カテゴリの基本単価とプロモーションから課金単価と合計金額を求める。副作用なし
pub struct PricingResolver;

impl PricingResolver {
    /// プロモーションが施設・カテゴリに対して有効か検証する
    ///
    /// # Returns
    /// * `Ok(None)` - プロモーション指定なし
    /// * `Ok(Some(Promotion))` - 適用可能
    /// * `Err(DomainError::PromotionRejected)` - 無効、他施設、またはカテゴリ不一致
    pub fn check_promotion<'a>(
        lookup: PromotionLookup<'a>,
        institution_id: InstitutionId,
        category_id: Option<CategoryId>,
    ) -> Result<Option<&'a Promotion>, DomainError> {
        let promotion = match lookup {
            PromotionLookup::NotRequested => return Ok(None),
            PromotionLookup::Missing(_) => {
                return Err(DomainError::PromotionRejected(PROMOTION_INVALID.to_string()))
            }
            PromotionLookup::Found(promotion) => promotion,
        };

        if !promotion.is_usable_in(institution_id) {
            return Err(DomainError::PromotionRejected(PROMOTION_INVALID.to_string()));
        }

        if let Some(category_id) = category_id {
            if !promotion.applies_to(category_id) {
                return Err(DomainError::PromotionRejected(
                    PROMOTION_CATEGORY_MISMATCH.to_string(),
                ));
            }
        }

        Ok(Some(promotion))
    }

    /// 料金を計算する
    ///
    /// # Arguments
    /// * `base_rate` - カテゴリの基本時間単価
    /// * `lookup` - プロモーションの検索結果
    /// * `duration` - 滞在時間
    /// * `institution_id` - 施設ID
    /// * `category_id` - 部屋カテゴリID
    ///
    /// # Returns
    /// * `Ok(PricingResult)` - 計算成功
    /// * `Err(DomainError)` - プロモーションが無効、または単価が0以下
    pub fn resolve(
        base_rate: Money,
        lookup: PromotionLookup<'_>,
        duration: StayDuration,
        institution_id: InstitutionId,
        category_id: Option<CategoryId>,
    ) -> Result<PricingResult, DomainError> {
        let promotion = Self::check_promotion(lookup, institution_id, category_id)?;

        let (rate, applied) = match promotion {
            Some(promotion) => (
                promotion.rate(),
                Some(AppliedPromotion {
                    id: promotion.id(),
                    name: promotion.name().to_string(),
                    rate: promotion.rate(),
                }),
            ),
            None => (base_rate, None),
        };

        if !rate.is_positive() {
            return Err(DomainError::InvalidRate(format!(
                "時間単価は0より大きい必要があります: {}",
                rate
            )));
        }

        let minutes = u32::try_from(duration.total_minutes()).map_err(|_| {
            DomainError::InvalidDuration("滞在時間が大きすぎます".to_string())
        })?;
        let total = rate.charge_for_minutes(minutes)?;

        Ok(PricingResult {
            rate,
            total,
            promotion: applied,
        })
    }
}

/// 在庫復元計画
/// 取り消す消費明細を商品と保管場所ごとに集計する
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestorationPlan {
    restorations: Vec<InventoryRestoration>,
}

impl RestorationPlan {
    /// 消費明細から復元計画を作成する
    /// 部屋在庫の明細は部屋が分かっている場合のみ対象にする
    pub fn from_consumptions(
        consumptions: &[Consumption],
        room_id: Option<RoomId>,
        institution_id: InstitutionId,
    ) -> Result<Self, DomainError> {
        let mut totals: BTreeMap<(ArticleId, InventoryScope), u32> = BTreeMap::new();

        for consumption in consumptions {
            let Some(scope) = consumption.source().scope(room_id, institution_id) else {
                continue;
            };
            let entry = totals.entry((consumption.article_id(), scope)).or_insert(0);
            *entry = entry.checked_add(consumption.quantity()).ok_or_else(|| {
                DomainError::InvalidValue(format!(
                    "復元数量がオーバーフローしました: article={}",
                    consumption.article_id()
                ))
            })?;
        }

        let restorations = totals
            .into_iter()
            .filter(|(_, quantity)| *quantity > 0)
            .map(|((article_id, scope), quantity)| InventoryRestoration {
                article_id,
                scope,
                quantity,
            })
            .collect();

        Ok(Self { restorations })
    }

    pub fn restorations(&self) -> &[InventoryRestoration] {
        &self.restorations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ConsumptionId, ConsumptionSource, MovementId};
    use rust_decimal_macros::dec;

    fn promotion(institution_id: InstitutionId, category_id: CategoryId, active: bool) -> Promotion {
        Promotion::new(
            PromotionId::new(),
            institution_id,
            category_id,
            "Happy hour".to_string(),
            Money::new(dec!(80)),
            active,
        )
    }

    fn consumption(article_id: ArticleId, quantity: u32, source: ConsumptionSource) -> Consumption {
        Consumption::new(
            ConsumptionId::new(),
            MovementId::new(),
            article_id,
            quantity,
            Money::new(dec!(3.50)),
            source,
        )
    }

    #[test]
    fn test_base_rate_without_promotion() {
        let result = PricingResolver::resolve(
            Money::new(dec!(100)),
            PromotionLookup::NotRequested,
            StayDuration::new(2, 30).unwrap(),
            InstitutionId::new(),
            Some(CategoryId::new()),
        )
        .unwrap();
        assert_eq!(result.rate.amount(), dec!(100));
        assert_eq!(result.total.amount(), dec!(250.00));
        assert!(result.promotion.is_none());
    }

    #[test]
    fn test_promotion_rate_overrides_base_rate() {
        let institution_id = InstitutionId::new();
        let category_id = CategoryId::new();
        let promotion = promotion(institution_id, category_id, true);

        let result = PricingResolver::resolve(
            Money::new(dec!(100)),
            PromotionLookup::Found(&promotion),
            StayDuration::new(2, 30).unwrap(),
            institution_id,
            Some(category_id),
        )
        .unwrap();
        assert_eq!(result.total.amount(), dec!(200.00));
        let applied = result.promotion.unwrap();
        assert_eq!(applied.name, "Happy hour");
        assert_eq!(applied.rate.amount(), dec!(80));
    }

    #[test]
    fn test_promotion_for_other_category_is_rejected() {
        let institution_id = InstitutionId::new();
        let promotion = promotion(institution_id, CategoryId::new(), true);

        let result = PricingResolver::resolve(
            Money::new(dec!(100)),
            PromotionLookup::Found(&promotion),
            StayDuration::new(2, 30).unwrap(),
            institution_id,
            Some(CategoryId::new()),
        );
        assert_eq!(
            result,
            Err(DomainError::PromotionRejected(
                PROMOTION_CATEGORY_MISMATCH.to_string()
            ))
        );
    }

    #[test]
    fn test_missing_inactive_or_foreign_promotion_is_rejected() {
        let institution_id = InstitutionId::new();
        let category_id = CategoryId::new();
        let expected = Err(DomainError::PromotionRejected(PROMOTION_INVALID.to_string()));

        let missing = PricingResolver::check_promotion(
            PromotionLookup::Missing(PromotionId::new()),
            institution_id,
            Some(category_id),
        );
        assert_eq!(missing.map(|p| p.cloned()), expected);

        let inactive = promotion(institution_id, category_id, false);
        let result = PricingResolver::check_promotion(
            PromotionLookup::Found(&inactive),
            institution_id,
            Some(category_id),
        );
        assert_eq!(result.map(|p| p.cloned()), expected);

        let foreign = promotion(InstitutionId::new(), category_id, true);
        let result = PricingResolver::check_promotion(
            PromotionLookup::Found(&foreign),
            institution_id,
            Some(category_id),
        );
        assert_eq!(result.map(|p| p.cloned()), expected);
    }

    #[test]
    fn test_non_positive_rate_is_rejected() {
        let result = PricingResolver::resolve(
            Money::zero(),
            PromotionLookup::NotRequested,
            StayDuration::new(1, 0).unwrap(),
            InstitutionId::new(),
            None,
        );
        assert!(matches!(result, Err(DomainError::InvalidRate(_))));
    }

    #[test]
    fn test_restoration_plan_groups_by_article_and_scope() {
        let institution_id = InstitutionId::new();
        let room_id = RoomId::new();
        let water = ArticleId::new();
        let towel = ArticleId::new();

        let consumptions = vec![
            consumption(water, 2, ConsumptionSource::RoomStock),
            consumption(water, 3, ConsumptionSource::RoomStock),
            consumption(water, 1, ConsumptionSource::GeneralStock),
            consumption(towel, 4, ConsumptionSource::GeneralStock),
        ];

        let plan =
            RestorationPlan::from_consumptions(&consumptions, Some(room_id), institution_id)
                .unwrap();

        let find = |article_id: ArticleId, scope: InventoryScope| {
            plan.restorations()
                .iter()
                .find(|r| r.article_id == article_id && r.scope == scope)
                .map(|r| r.quantity)
        };

        assert_eq!(plan.restorations().len(), 3);
        assert_eq!(find(water, InventoryScope::Room(room_id)), Some(5));
        assert_eq!(find(water, InventoryScope::General(institution_id)), Some(1));
        assert_eq!(find(towel, InventoryScope::General(institution_id)), Some(4));
    }

    #[test]
    fn test_restoration_plan_skips_room_stock_without_room() {
        let institution_id = InstitutionId::new();
        let article_id = ArticleId::new();
        let consumptions = vec![
            consumption(article_id, 2, ConsumptionSource::RoomStock),
            consumption(article_id, 1, ConsumptionSource::GeneralStock),
        ];

        let plan = RestorationPlan::from_consumptions(&consumptions, None, institution_id).unwrap();
        assert_eq!(
            plan.restorations(),
            &[InventoryRestoration {
                article_id,
                scope: InventoryScope::General(institution_id),
                quantity: 1,
            }]
        );
    }
}
