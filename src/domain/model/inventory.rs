use crate::domain::error::DomainError;
use crate::domain::model::{ArticleId, InventoryScope};
use serde::Serialize;

/// 在庫集約
/// 保管場所（部屋／施設共通）ごとの商品の在庫数を管理する
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    article_id: ArticleId,
    scope: InventoryScope,
    quantity_on_hand: u32,
}

impl Inventory {
    /// 新しい在庫を作成
    ///
    /// # Arguments
    /// * `article_id` - 商品ID
    /// * `scope` - 保管場所
    /// * `quantity_on_hand` - 在庫数
    pub fn new(article_id: ArticleId, scope: InventoryScope, quantity_on_hand: u32) -> Self {
        Self {
            article_id,
            scope,
            quantity_on_hand,
        }
    }

    pub fn article_id(&self) -> ArticleId {
        self.article_id
    }

    pub fn scope(&self) -> InventoryScope {
        self.scope
    }

    /// 在庫数を取得
    pub fn quantity_on_hand(&self) -> u32 {
        self.quantity_on_hand
    }

    /// 在庫を戻す（消費の取り消し時）
    ///
    /// # Arguments
    /// * `quantity` - 戻す数量
    ///
    /// # Returns
    /// * `Ok(())` - 成功
    /// * `Err(DomainError::InvalidValue)` - 在庫数が上限を超える
    pub fn release(&mut self, quantity: u32) -> Result<(), DomainError> {
        self.quantity_on_hand = self.quantity_on_hand.checked_add(quantity).ok_or_else(|| {
            DomainError::InvalidValue(format!(
                "在庫数が上限を超えます: article={} scope={}",
                self.article_id, self.scope
            ))
        })?;
        Ok(())
    }
}

/// 在庫の復元指示
/// 商品と保管場所ごとに集計された、戻すべき数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InventoryRestoration {
    pub article_id: ArticleId,
    pub scope: InventoryScope,
    pub quantity: u32,
}
