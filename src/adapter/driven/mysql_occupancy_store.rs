use crate::adapter::database_error::DatabaseError;
use crate::domain::event::AuditEntry;
use crate::domain::model::{
    ArticleId, CategoryId, Consumption, ConsumptionId, ConsumptionSource, GuestDetails,
    InstitutionId, InventoryScope, Money, Movement, MovementId, PauseBalance, Promotion,
    PromotionId, Reservation, ReservationId, ReservationState, Room, RoomId, StayDuration, Visit,
    VisitId,
};
use crate::domain::port::{
    AuditLog, InventoryStore, MovementLedger, OccupancyStore, OccupancyTransaction,
    PromotionCatalog, RepositoryError, ReservationRepository, RoomRepository, VisitRegistry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{MySql, Pool, QueryBuilder, Row, Transaction};
use uuid::Uuid;

const RESERVATION_COLUMNS: &str = "id, institution_id, room_id, visit_id, movement_id, \
     start_time, duration_hours, duration_minutes, pause_hours, pause_minutes, promotion_id, \
     end_time, cancelled_at, cancellation_reason";

/// MySQL利用管理ストア
/// InnoDBのトランザクションと`SELECT ... FOR UPDATE`の行ロックで部屋の排他を実現する
pub struct MySqlOccupancyStore {
    pool: Pool<MySql>,
}

impl MySqlOccupancyStore {
    /// 新しいMySQL利用管理ストアを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OccupancyStore for MySqlOccupancyStore {
    async fn begin(&self) -> Result<Box<dyn OccupancyTransaction>, RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from_sqlx("トランザクション開始に失敗しました", e))
            .map_err(RepositoryError::from)?;

        Ok(Box::new(MySqlOccupancyTransaction { tx: Some(tx) }))
    }

    async fn find_reservation_by_id(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let sql = format!("SELECT {} FROM reservations WHERE id = ?", RESERVATION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(reservation_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("予約の取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn find_active_reservations(
        &self,
        institution_id: InstitutionId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE institution_id = ? AND state = 'Active' \
             ORDER BY start_time ASC",
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(institution_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("利用中の予約の取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        rows.iter().map(reservation_from_row).collect()
    }
}

/// MySQLトランザクション
/// コミットもロールバックもされずにドロップされた場合、sqlxがロールバックする
pub struct MySqlOccupancyTransaction {
    tx: Option<Transaction<'static, MySql>>,
}

impl MySqlOccupancyTransaction {
    fn conn(&mut self) -> Result<&mut MySqlConnection, RepositoryError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(RepositoryError::OperationFailed(
                "トランザクションは既に終了しています".to_string(),
            )),
        }
    }

    async fn fetch_reservation(
        &mut self,
        condition: &str,
        key: String,
        context: &'static str,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE {}",
            RESERVATION_COLUMNS, condition
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| DatabaseError::from_sqlx(context, e))
            .map_err(RepositoryError::from)?;

        row.as_ref().map(reservation_from_row).transpose()
    }
}

#[async_trait]
impl RoomRepository for MySqlOccupancyTransaction {
    async fn lock_room(&mut self, room_id: RoomId) -> Result<Option<Room>, RepositoryError> {
        // カテゴリ行はロックしない（同じカテゴリの別の部屋の予約を妨げない）
        let row = sqlx::query(
            r#"
            SELECT r.id, r.institution_id, r.category_id, r.available, r.active_visit_id,
                   c.hourly_rate
            FROM rooms r
            INNER JOIN room_categories c ON c.id = r.category_id
            WHERE r.id = ?
            FOR UPDATE OF r
            "#,
        )
        .bind(room_id.to_string())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("部屋のロックに失敗しました", e))
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Room::reconstruct(
            RoomId::from_uuid(uuid_column(&row, "id")?),
            InstitutionId::from_uuid(uuid_column(&row, "institution_id")?),
            CategoryId::from_uuid(uuid_column(&row, "category_id")?),
            Money::new(column::<Decimal>(&row, "hourly_rate")?),
            column(&row, "available")?,
            optional_uuid_column(&row, "active_visit_id")?.map(VisitId::from_uuid),
        )))
    }

    async fn save_room(&mut self, room: &Room) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE rooms SET available = ?, active_visit_id = ? WHERE id = ?")
            .bind(room.is_available())
            .bind(room.active_visit().map(|id| id.to_string()))
            .bind(room.id().to_string())
            .execute(self.conn()?)
            .await
            .map_err(|e| DatabaseError::from_sqlx("部屋の保存に失敗しました", e))
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}

#[async_trait]
impl ReservationRepository for MySqlOccupancyTransaction {
    async fn find_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.fetch_reservation(
            "id = ?",
            reservation_id.to_string(),
            "予約の取得に失敗しました",
        )
        .await
    }

    async fn lock_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.fetch_reservation(
            "id = ? FOR UPDATE",
            reservation_id.to_string(),
            "予約のロックに失敗しました",
        )
        .await
    }

    async fn lock_active_reservation_for_room(
        &mut self,
        room_id: RoomId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.fetch_reservation(
            "room_id = ? AND state = 'Active' ORDER BY start_time DESC LIMIT 1 FOR UPDATE",
            room_id.to_string(),
            "部屋の利用中予約のロックに失敗しました",
        )
        .await
    }

    async fn lock_active_reservation_for_visit(
        &mut self,
        visit_id: VisitId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        self.fetch_reservation(
            "visit_id = ? AND state = 'Active' ORDER BY start_time DESC LIMIT 1 FOR UPDATE",
            visit_id.to_string(),
            "来訪の利用中予約のロックに失敗しました",
        )
        .await
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, institution_id, room_id, visit_id, movement_id, start_time,
                duration_hours, duration_minutes, pause_hours, pause_minutes, promotion_id,
                state, end_time, cancelled_at, cancellation_reason
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reservation.id().to_string())
        .bind(reservation.institution_id().to_string())
        .bind(reservation.room_id().to_string())
        .bind(reservation.visit_id().to_string())
        .bind(reservation.movement_id().to_string())
        .bind(reservation.start_time())
        .bind(reservation.duration().hours())
        .bind(reservation.duration().minutes())
        .bind(reservation.pause().hours())
        .bind(reservation.pause().minutes())
        .bind(reservation.promotion_id().map(|id| id.to_string()))
        .bind(reservation.state().as_str())
        .bind(reservation.end_time())
        .bind(reservation.cancelled_at())
        .bind(reservation.cancellation_reason())
        .execute(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("予約の挿入に失敗しました", e))
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE reservations
            SET duration_hours = ?, duration_minutes = ?, pause_hours = ?, pause_minutes = ?,
                promotion_id = ?, state = ?, end_time = ?, cancelled_at = ?,
                cancellation_reason = ?
            WHERE id = ?
            "#,
        )
        .bind(reservation.duration().hours())
        .bind(reservation.duration().minutes())
        .bind(reservation.pause().hours())
        .bind(reservation.pause().minutes())
        .bind(reservation.promotion_id().map(|id| id.to_string()))
        .bind(reservation.state().as_str())
        .bind(reservation.end_time())
        .bind(reservation.cancelled_at())
        .bind(reservation.cancellation_reason())
        .bind(reservation.id().to_string())
        .execute(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("予約の保存に失敗しました", e))
        .map_err(RepositoryError::from)?;
        Ok(())
    }
}

#[async_trait]
impl VisitRegistry for MySqlOccupancyTransaction {
    async fn create_visit(
        &mut self,
        institution_id: InstitutionId,
        guest: &GuestDetails,
        room_id: RoomId,
    ) -> Result<Visit, RepositoryError> {
        let visit = Visit::new(VisitId::new(), institution_id, room_id, guest.clone());

        sqlx::query(
            r#"
            INSERT INTO visits (id, institution_id, room_id, guest_identifier, phone, plate, cancelled)
            VALUES (?, ?, ?, ?, ?, ?, FALSE)
            "#,
        )
        .bind(visit.id().to_string())
        .bind(institution_id.to_string())
        .bind(room_id.to_string())
        .bind(guest.display_identifier())
        .bind(guest.phone())
        .bind(guest.plate())
        .execute(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("来訪の作成に失敗しました", e))
        .map_err(RepositoryError::from)?;

        Ok(visit)
    }

    async fn find_visit(&mut self, visit_id: VisitId) -> Result<Option<Visit>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, institution_id, room_id, guest_identifier, phone, plate, cancelled
            FROM visits
            WHERE id = ?
            "#,
        )
        .bind(visit_id.to_string())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("来訪の取得に失敗しました", e))
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let guest = GuestDetails::new(
            column(&row, "guest_identifier")?,
            column(&row, "phone")?,
            column(&row, "plate")?,
        )
        .map_err(|e| {
            RepositoryError::FetchFailed(format!("宿泊客情報の構築に失敗しました: {}", e))
        })?;

        Ok(Some(Visit::reconstruct(
            VisitId::from_uuid(uuid_column(&row, "id")?),
            InstitutionId::from_uuid(uuid_column(&row, "institution_id")?),
            RoomId::from_uuid(uuid_column(&row, "room_id")?),
            guest,
            column(&row, "cancelled")?,
        )))
    }

    async fn cancel_visit(&mut self, visit_id: VisitId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE visits SET cancelled = TRUE WHERE id = ?")
            .bind(visit_id.to_string())
            .execute(self.conn()?)
            .await
            .map_err(|e| DatabaseError::from_sqlx("来訪のキャンセルに失敗しました", e))
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}

#[async_trait]
impl MovementLedger for MySqlOccupancyTransaction {
    async fn create_movement(
        &mut self,
        visit_id: VisitId,
        amount: Money,
        description: &str,
    ) -> Result<Movement, RepositoryError> {
        let movement = Movement::new(
            MovementId::new(),
            visit_id,
            amount,
            description.to_string(),
            Utc::now(),
        );

        sqlx::query(
            r#"
            INSERT INTO movements (id, visit_id, amount, description, created_at, cancelled)
            VALUES (?, ?, ?, ?, ?, FALSE)
            "#,
        )
        .bind(movement.id().to_string())
        .bind(visit_id.to_string())
        .bind(amount.amount())
        .bind(description)
        .bind(movement.created_at())
        .execute(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("会計明細の作成に失敗しました", e))
        .map_err(RepositoryError::from)?;

        Ok(movement)
    }

    async fn find_open_movements(
        &mut self,
        visit_id: VisitId,
    ) -> Result<Vec<Movement>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, visit_id, amount, description, created_at, cancelled
            FROM movements
            WHERE visit_id = ? AND cancelled = FALSE
            ORDER BY created_at ASC
            FOR UPDATE
            "#,
        )
        .bind(visit_id.to_string())
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("会計明細の取得に失敗しました", e))
        .map_err(RepositoryError::from)?;

        rows.iter()
            .map(|row| {
                Ok(Movement::reconstruct(
                    MovementId::from_uuid(uuid_column(row, "id")?),
                    VisitId::from_uuid(uuid_column(row, "visit_id")?),
                    Money::new(column::<Decimal>(row, "amount")?),
                    column(row, "description")?,
                    column(row, "created_at")?,
                    column(row, "cancelled")?,
                ))
            })
            .collect()
    }

    async fn void_movements(
        &mut self,
        movement_ids: &[MovementId],
    ) -> Result<(), RepositoryError> {
        if movement_ids.is_empty() {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::<MySql>::new("UPDATE movements SET cancelled = TRUE WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in movement_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        builder
            .build()
            .execute(self.conn()?)
            .await
            .map_err(|e| DatabaseError::from_sqlx("会計明細の取り消しに失敗しました", e))
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn find_open_consumptions(
        &mut self,
        movement_ids: &[MovementId],
    ) -> Result<Vec<Consumption>, RepositoryError> {
        if movement_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<MySql>::new(
            "SELECT id, movement_id, article_id, quantity, unit_price, room_scoped, cancelled \
             FROM consumptions WHERE cancelled = FALSE AND movement_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in movement_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") FOR UPDATE");

        let rows = builder
            .build()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| DatabaseError::from_sqlx("消費明細の取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        rows.iter()
            .map(|row| {
                Ok(Consumption::reconstruct(
                    ConsumptionId::from_uuid(uuid_column(row, "id")?),
                    MovementId::from_uuid(uuid_column(row, "movement_id")?),
                    ArticleId::from_uuid(uuid_column(row, "article_id")?),
                    column(row, "quantity")?,
                    Money::new(column::<Decimal>(row, "unit_price")?),
                    ConsumptionSource::from_room_scoped(column(row, "room_scoped")?),
                    column(row, "cancelled")?,
                ))
            })
            .collect()
    }

    async fn void_consumptions(
        &mut self,
        consumption_ids: &[ConsumptionId],
    ) -> Result<(), RepositoryError> {
        if consumption_ids.is_empty() {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::<MySql>::new("UPDATE consumptions SET cancelled = TRUE WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in consumption_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        builder
            .build()
            .execute(self.conn()?)
            .await
            .map_err(|e| DatabaseError::from_sqlx("消費明細の取り消しに失敗しました", e))
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}

#[async_trait]
impl PromotionCatalog for MySqlOccupancyTransaction {
    async fn find_promotion(
        &mut self,
        promotion_id: PromotionId,
        institution_id: InstitutionId,
    ) -> Result<Option<Promotion>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, institution_id, category_id, name, rate, active
            FROM promotions
            WHERE id = ? AND institution_id = ?
            "#,
        )
        .bind(promotion_id.to_string())
        .bind(institution_id.to_string())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("プロモーションの取得に失敗しました", e))
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Promotion::new(
            PromotionId::from_uuid(uuid_column(&row, "id")?),
            InstitutionId::from_uuid(uuid_column(&row, "institution_id")?),
            CategoryId::from_uuid(uuid_column(&row, "category_id")?),
            column(&row, "name")?,
            Money::new(column::<Decimal>(&row, "rate")?),
            column(&row, "active")?,
        )))
    }
}

#[async_trait]
impl InventoryStore for MySqlOccupancyTransaction {
    async fn increase_quantity(
        &mut self,
        article_id: ArticleId,
        scope: InventoryScope,
        amount: u32,
    ) -> Result<bool, RepositoryError> {
        let (sql, owner) = match scope {
            InventoryScope::Room(room_id) => (
                "UPDATE room_inventories SET quantity = quantity + ? \
                 WHERE room_id = ? AND article_id = ?",
                room_id.to_string(),
            ),
            InventoryScope::General(institution_id) => (
                "UPDATE general_inventories SET quantity = quantity + ? \
                 WHERE institution_id = ? AND article_id = ?",
                institution_id.to_string(),
            ),
        };

        let result = sqlx::query(sql)
            .bind(amount)
            .bind(owner)
            .bind(article_id.to_string())
            .execute(self.conn()?)
            .await
            .map_err(|e| DatabaseError::from_sqlx("在庫の復元に失敗しました", e))
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AuditLog for MySqlOccupancyTransaction {
    async fn record(&mut self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                description, module, institution_id, user_id, metadata, related_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.description)
        .bind(&entry.module)
        .bind(entry.institution_id.to_string())
        .bind(entry.user_id.map(|id| id.to_string()))
        .bind(entry.metadata.to_string())
        .bind(entry.related_id.map(|id| id.to_string()))
        .bind(entry.occurred_at)
        .execute(self.conn()?)
        .await
        .map_err(|e| DatabaseError::from_sqlx("監査ログの記録に失敗しました", e))
        .map_err(RepositoryError::from)?;
        Ok(())
    }
}

#[async_trait]
impl OccupancyTransaction for MySqlOccupancyTransaction {
    async fn commit(&mut self) -> Result<(), RepositoryError> {
        match self.tx.take() {
            Some(tx) => tx
                .commit()
                .await
                .map_err(|e| DatabaseError::from_sqlx("コミットに失敗しました", e))
                .map_err(RepositoryError::from),
            None => Err(RepositoryError::OperationFailed(
                "トランザクションは既に終了しています".to_string(),
            )),
        }
    }

    async fn rollback(&mut self) -> Result<(), RepositoryError> {
        match self.tx.take() {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| DatabaseError::from_sqlx("ロールバックに失敗しました", e))
                .map_err(RepositoryError::from),
            None => Ok(()),
        }
    }
}

/// 予約の行をドメインモデルに再構築する
fn reservation_from_row(row: &MySqlRow) -> Result<Reservation, RepositoryError> {
    let state = ReservationState::from_timestamps(
        column(row, "end_time")?,
        column(row, "cancelled_at")?,
        column(row, "cancellation_reason")?,
    )
    .map_err(|e| RepositoryError::FetchFailed(format!("予約状態の復元に失敗しました: {}", e)))?;

    Ok(Reservation::reconstruct(
        ReservationId::from_uuid(uuid_column(row, "id")?),
        InstitutionId::from_uuid(uuid_column(row, "institution_id")?),
        RoomId::from_uuid(uuid_column(row, "room_id")?),
        VisitId::from_uuid(uuid_column(row, "visit_id")?),
        MovementId::from_uuid(uuid_column(row, "movement_id")?),
        column::<DateTime<Utc>>(row, "start_time")?,
        StayDuration::reconstruct(
            column(row, "duration_hours")?,
            column(row, "duration_minutes")?,
        ),
        PauseBalance::reconstruct(column(row, "pause_hours")?, column(row, "pause_minutes")?),
        optional_uuid_column(row, "promotion_id")?.map(PromotionId::from_uuid),
        state,
    ))
}

fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(name)
        .map_err(|e| DatabaseError::DecodeError(format!("{}: {}", name, e)))
        .map_err(RepositoryError::from)
}

fn uuid_column(row: &MySqlRow, name: &str) -> Result<Uuid, RepositoryError> {
    let value: String = column(row, name)?;
    parse_uuid(name, &value)
}

fn optional_uuid_column(row: &MySqlRow, name: &str) -> Result<Option<Uuid>, RepositoryError> {
    let value: Option<String> = column(row, name)?;
    value.map(|v| parse_uuid(name, &v)).transpose()
}

fn parse_uuid(name: &str, value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value)
        .map_err(|e| DatabaseError::DecodeError(format!("{}のUUID解析に失敗しました: {}", name, e)))
        .map_err(RepositoryError::from)
}
