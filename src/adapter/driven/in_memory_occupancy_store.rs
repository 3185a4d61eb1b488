use crate::domain::event::AuditEntry;
use crate::domain::model::{
    ArticleId, Consumption, ConsumptionId, GuestDetails, InstitutionId, Inventory, InventoryScope,
    Money, Movement, MovementId, Promotion, PromotionId, Reservation, ReservationId, Room, RoomId,
    Visit, VisitId,
};
use crate::domain::port::{
    AuditLog, InventoryStore, MovementLedger, OccupancyStore, OccupancyTransaction,
    PromotionCatalog, RepositoryError, ReservationRepository, RoomRepository, VisitRegistry,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// インメモリストアが保持する状態
#[derive(Debug, Clone, Default)]
pub struct OccupancyState {
    rooms: HashMap<RoomId, Room>,
    reservations: HashMap<ReservationId, Reservation>,
    visits: HashMap<VisitId, Visit>,
    movements: HashMap<MovementId, Movement>,
    consumptions: HashMap<ConsumptionId, Consumption>,
    promotions: HashMap<PromotionId, Promotion>,
    inventories: HashMap<(ArticleId, InventoryScope), Inventory>,
    audit_entries: Vec<AuditEntry>,
}

/// インメモリ利用管理ストア
/// トランザクションは状態全体に対する所有ミューテックスで直列化される（単一プロセス専用）
/// 作業用のコピーに変更を加え、コミット時にのみ書き戻す
#[derive(Clone, Default)]
pub struct InMemoryOccupancyStore {
    state: Arc<Mutex<OccupancyState>>,
    fail_audit: Arc<AtomicBool>,
}

impl InMemoryOccupancyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 部屋を登録する
    pub async fn add_room(&self, room: Room) {
        self.state.lock().await.rooms.insert(room.id(), room);
    }

    /// プロモーションを登録する
    pub async fn add_promotion(&self, promotion: Promotion) {
        self.state
            .lock()
            .await
            .promotions
            .insert(promotion.id(), promotion);
    }

    /// 在庫を登録する
    pub async fn add_inventory(&self, inventory: Inventory) {
        self.state
            .lock()
            .await
            .inventories
            .insert((inventory.article_id(), inventory.scope()), inventory);
    }

    /// 会計明細を登録する（滞在中の追加の計上など）
    pub async fn add_movement(&self, movement: Movement) {
        self.state
            .lock()
            .await
            .movements
            .insert(movement.id(), movement);
    }

    /// 消費明細を登録する
    pub async fn add_consumption(&self, consumption: Consumption) {
        self.state
            .lock()
            .await
            .consumptions
            .insert(consumption.id(), consumption);
    }

    /// 監査ログの記録を失敗させる（ロールバックの確認用）
    pub fn set_audit_failure(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    pub async fn room(&self, room_id: RoomId) -> Option<Room> {
        self.state.lock().await.rooms.get(&room_id).cloned()
    }

    pub async fn visit(&self, visit_id: VisitId) -> Option<Visit> {
        self.state.lock().await.visits.get(&visit_id).cloned()
    }

    pub async fn movements_for_visit(&self, visit_id: VisitId) -> Vec<Movement> {
        self.state
            .lock()
            .await
            .movements
            .values()
            .filter(|m| m.visit_id() == visit_id)
            .cloned()
            .collect()
    }

    pub async fn consumption(&self, consumption_id: ConsumptionId) -> Option<Consumption> {
        self.state
            .lock()
            .await
            .consumptions
            .get(&consumption_id)
            .cloned()
    }

    pub async fn inventory_quantity(
        &self,
        article_id: ArticleId,
        scope: InventoryScope,
    ) -> Option<u32> {
        self.state
            .lock()
            .await
            .inventories
            .get(&(article_id, scope))
            .map(Inventory::quantity_on_hand)
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.lock().await.reservations.len()
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit_entries.clone()
    }
}

#[async_trait]
impl OccupancyStore for InMemoryOccupancyStore {
    async fn begin(&self) -> Result<Box<dyn OccupancyTransaction>, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryOccupancyTransaction {
            guard: Some(guard),
            working,
            fail_audit: self.fail_audit.load(Ordering::SeqCst),
        }))
    }

    async fn find_reservation_by_id(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .await
            .reservations
            .get(&reservation_id)
            .cloned())
    }

    async fn find_active_reservations(
        &self,
        institution_id: InstitutionId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let state = self.state.lock().await;
        let mut reservations: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.institution_id() == institution_id && r.is_active())
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.start_time());
        Ok(reservations)
    }
}

/// インメモリトランザクション
/// ドロップされると作業用のコピーを捨ててロックを解放する（ロールバック）
pub struct InMemoryOccupancyTransaction {
    guard: Option<OwnedMutexGuard<OccupancyState>>,
    working: OccupancyState,
    fail_audit: bool,
}

impl InMemoryOccupancyTransaction {
    fn ensure_open(&self) -> Result<(), RepositoryError> {
        if self.guard.is_none() {
            return Err(RepositoryError::OperationFailed(
                "transaction already finished".to_string(),
            ));
        }
        Ok(())
    }

    fn active_reservation_where<F>(&self, predicate: F) -> Option<Reservation>
    where
        F: Fn(&Reservation) -> bool,
    {
        self.working
            .reservations
            .values()
            .filter(|r| r.is_active() && predicate(r))
            .max_by_key(|r| r.start_time())
            .cloned()
    }
}

#[async_trait]
impl RoomRepository for InMemoryOccupancyTransaction {
    async fn lock_room(&mut self, room_id: RoomId) -> Result<Option<Room>, RepositoryError> {
        self.ensure_open()?;
        Ok(self.working.rooms.get(&room_id).cloned())
    }

    async fn save_room(&mut self, room: &Room) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        match self.working.rooms.get_mut(&room.id()) {
            Some(stored) => {
                *stored = room.clone();
                Ok(())
            }
            None => Err(RepositoryError::OperationFailed(format!(
                "room {} does not exist",
                room.id()
            ))),
        }
    }
}

#[async_trait]
impl ReservationRepository for InMemoryOccupancyTransaction {
    async fn find_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.ensure_open()?;
        Ok(self.working.reservations.get(&reservation_id).cloned())
    }

    async fn lock_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.find_reservation(reservation_id).await
    }

    async fn lock_active_reservation_for_room(
        &mut self,
        room_id: RoomId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.ensure_open()?;
        Ok(self.active_reservation_where(|r| r.room_id() == room_id))
    }

    async fn lock_active_reservation_for_visit(
        &mut self,
        visit_id: VisitId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.ensure_open()?;
        Ok(self.active_reservation_where(|r| r.visit_id() == visit_id))
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        if self.working.reservations.contains_key(&reservation.id()) {
            return Err(RepositoryError::OperationFailed(format!(
                "reservation {} already exists",
                reservation.id()
            )));
        }
        self.working
            .reservations
            .insert(reservation.id(), reservation.clone());
        Ok(())
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        self.working
            .reservations
            .insert(reservation.id(), reservation.clone());
        Ok(())
    }
}

#[async_trait]
impl VisitRegistry for InMemoryOccupancyTransaction {
    async fn create_visit(
        &mut self,
        institution_id: InstitutionId,
        guest: &GuestDetails,
        room_id: RoomId,
    ) -> Result<Visit, RepositoryError> {
        self.ensure_open()?;
        let visit = Visit::new(VisitId::new(), institution_id, room_id, guest.clone());
        self.working.visits.insert(visit.id(), visit.clone());
        Ok(visit)
    }

    async fn find_visit(&mut self, visit_id: VisitId) -> Result<Option<Visit>, RepositoryError> {
        self.ensure_open()?;
        Ok(self.working.visits.get(&visit_id).cloned())
    }

    async fn cancel_visit(&mut self, visit_id: VisitId) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        if let Some(visit) = self.working.visits.get_mut(&visit_id) {
            visit.cancel();
        }
        Ok(())
    }
}

#[async_trait]
impl MovementLedger for InMemoryOccupancyTransaction {
    async fn create_movement(
        &mut self,
        visit_id: VisitId,
        amount: Money,
        description: &str,
    ) -> Result<Movement, RepositoryError> {
        self.ensure_open()?;
        let movement = Movement::new(
            MovementId::new(),
            visit_id,
            amount,
            description.to_string(),
            Utc::now(),
        );
        self.working.movements.insert(movement.id(), movement.clone());
        Ok(movement)
    }

    async fn find_open_movements(
        &mut self,
        visit_id: VisitId,
    ) -> Result<Vec<Movement>, RepositoryError> {
        self.ensure_open()?;
        let mut movements: Vec<Movement> = self
            .working
            .movements
            .values()
            .filter(|m| m.visit_id() == visit_id && !m.is_cancelled())
            .cloned()
            .collect();
        movements.sort_by_key(|m| m.created_at());
        Ok(movements)
    }

    async fn void_movements(
        &mut self,
        movement_ids: &[MovementId],
    ) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        for id in movement_ids {
            if let Some(movement) = self.working.movements.get_mut(id) {
                movement.void();
            }
        }
        Ok(())
    }

    async fn find_open_consumptions(
        &mut self,
        movement_ids: &[MovementId],
    ) -> Result<Vec<Consumption>, RepositoryError> {
        self.ensure_open()?;
        Ok(self
            .working
            .consumptions
            .values()
            .filter(|c| !c.is_cancelled() && movement_ids.contains(&c.movement_id()))
            .cloned()
            .collect())
    }

    async fn void_consumptions(
        &mut self,
        consumption_ids: &[ConsumptionId],
    ) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        for id in consumption_ids {
            if let Some(consumption) = self.working.consumptions.get_mut(id) {
                consumption.void();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PromotionCatalog for InMemoryOccupancyTransaction {
    async fn find_promotion(
        &mut self,
        promotion_id: PromotionId,
        institution_id: InstitutionId,
    ) -> Result<Option<Promotion>, RepositoryError> {
        self.ensure_open()?;
        Ok(self
            .working
            .promotions
            .get(&promotion_id)
            .filter(|p| p.institution_id() == institution_id)
            .cloned())
    }
}

#[async_trait]
impl InventoryStore for InMemoryOccupancyTransaction {
    async fn increase_quantity(
        &mut self,
        article_id: ArticleId,
        scope: InventoryScope,
        amount: u32,
    ) -> Result<bool, RepositoryError> {
        self.ensure_open()?;
        let Some(inventory) = self.working.inventories.get_mut(&(article_id, scope)) else {
            return Ok(false);
        };
        inventory
            .release(amount)
            .map_err(|e| RepositoryError::OperationFailed(e.to_string()))?;
        Ok(true)
    }
}

#[async_trait]
impl AuditLog for InMemoryOccupancyTransaction {
    async fn record(&mut self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        if self.fail_audit {
            return Err(RepositoryError::OperationFailed(
                "audit log unavailable".to_string(),
            ));
        }
        self.working.audit_entries.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl OccupancyTransaction for InMemoryOccupancyTransaction {
    async fn commit(&mut self) -> Result<(), RepositoryError> {
        let mut guard = self.guard.take().ok_or_else(|| {
            RepositoryError::OperationFailed("transaction already finished".to_string())
        })?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), RepositoryError> {
        self.guard = None;
        self.working = OccupancyState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CategoryId;
    use rust_decimal_macros::dec;

    fn room() -> Room {
        Room::new(
            RoomId::new(),
            InstitutionId::new(),
            CategoryId::new(),
            Money::new(dec!(100)),
        )
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = InMemoryOccupancyStore::new();
        let room = room();
        store.add_room(room.clone()).await;

        let mut tx = store.begin().await.unwrap();
        let mut locked = tx.lock_room(room.id()).await.unwrap().unwrap();
        locked.occupy(VisitId::new()).unwrap();
        tx.save_room(&locked).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!store.room(room.id()).await.unwrap().is_available());
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let store = InMemoryOccupancyStore::new();
        let room = room();
        store.add_room(room.clone()).await;

        {
            let mut tx = store.begin().await.unwrap();
            let mut locked = tx.lock_room(room.id()).await.unwrap().unwrap();
            locked.occupy(VisitId::new()).unwrap();
            tx.save_room(&locked).await.unwrap();
        }

        assert!(store.room(room.id()).await.unwrap().is_available());
    }

    #[tokio::test]
    async fn test_missing_inventory_row_is_not_created() {
        let store = InMemoryOccupancyStore::new();
        let article_id = ArticleId::new();
        let scope = InventoryScope::General(InstitutionId::new());

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.increase_quantity(article_id, scope, 3).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.inventory_quantity(article_id, scope).await, None);
    }

    #[tokio::test]
    async fn test_finished_transaction_rejects_calls() {
        let store = InMemoryOccupancyStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.rollback().await.unwrap();

        assert!(tx.lock_room(RoomId::new()).await.is_err());
        assert!(tx.commit().await.is_err());
    }
}
