// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する
//
// 予約の作成とキャンセルは複数の集約をまたぐため、協調するポートはすべて
// 1つのトランザクション（OccupancyTransaction）の上で実装される

use crate::domain::event::AuditEntry;
use crate::domain::model::{
    ArticleId, Consumption, ConsumptionId, GuestDetails, InstitutionId, InventoryScope, Money,
    Movement, MovementId, Promotion, PromotionId, Reservation, ReservationId, Room, RoomId, Visit,
    VisitId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    /// データベース接続に失敗
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作に失敗
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// データの取得に失敗
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    /// 同時実行の競合（デッドロック、ロック待ちタイムアウト、直列化失敗）
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),
}

/// 時刻の取得を抽象化するポート
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 部屋リポジトリ
#[async_trait]
pub trait RoomRepository: Send {
    /// 部屋を書き込み意図付き（排他）でロックして取得する
    /// ロックはトランザクションの終了まで保持される
    ///
    /// # Returns
    /// * `Ok(Some(Room))` - 部屋が見つかった
    /// * `Ok(None)` - 部屋が見つからなかった
    /// * `Err(RepositoryError::Conflict)` - ロックの取得で競合した
    async fn lock_room(&mut self, room_id: RoomId) -> Result<Option<Room>, RepositoryError>;

    /// 部屋の空き状態と使用中の来訪を保存する
    async fn save_room(&mut self, room: &Room) -> Result<(), RepositoryError>;
}

/// 予約リポジトリ
#[async_trait]
pub trait ReservationRepository: Send {
    /// 予約IDで予約を取得する（ロックなし）
    async fn find_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// 予約IDで予約をロックして取得する
    async fn lock_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// 部屋の利用中（Active）の予約をロックして取得する
    async fn lock_active_reservation_for_room(
        &mut self,
        room_id: RoomId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// 来訪の利用中（Active）の予約をロックして取得する
    async fn lock_active_reservation_for_visit(
        &mut self,
        visit_id: VisitId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// 新しい予約を挿入する
    async fn insert_reservation(&mut self, reservation: &Reservation)
        -> Result<(), RepositoryError>;

    /// 既存の予約を更新する
    async fn save_reservation(&mut self, reservation: &Reservation) -> Result<(), RepositoryError>;
}

/// 来訪レジストリ
#[async_trait]
pub trait VisitRegistry: Send {
    /// 宿泊客情報と部屋を指定して来訪を作成する
    async fn create_visit(
        &mut self,
        institution_id: InstitutionId,
        guest: &GuestDetails,
        room_id: RoomId,
    ) -> Result<Visit, RepositoryError>;

    async fn find_visit(&mut self, visit_id: VisitId) -> Result<Option<Visit>, RepositoryError>;

    /// 来訪をキャンセル済みにする
    async fn cancel_visit(&mut self, visit_id: VisitId) -> Result<(), RepositoryError>;
}

/// 会計台帳
#[async_trait]
pub trait MovementLedger: Send {
    /// 来訪に対する会計明細を作成する
    async fn create_movement(
        &mut self,
        visit_id: VisitId,
        amount: Money,
        description: &str,
    ) -> Result<Movement, RepositoryError>;

    /// 来訪に紐づく取り消されていない会計明細を取得する
    async fn find_open_movements(
        &mut self,
        visit_id: VisitId,
    ) -> Result<Vec<Movement>, RepositoryError>;

    /// 会計明細を一括で取り消す
    async fn void_movements(&mut self, movement_ids: &[MovementId])
        -> Result<(), RepositoryError>;

    /// 会計明細に紐づく取り消されていない消費明細を取得する
    async fn find_open_consumptions(
        &mut self,
        movement_ids: &[MovementId],
    ) -> Result<Vec<Consumption>, RepositoryError>;

    /// 消費明細を一括で取り消す
    async fn void_consumptions(
        &mut self,
        consumption_ids: &[ConsumptionId],
    ) -> Result<(), RepositoryError>;
}

/// プロモーションカタログ
#[async_trait]
pub trait PromotionCatalog: Send {
    /// 施設内の有効なプロモーションを検索する
    async fn find_promotion(
        &mut self,
        promotion_id: PromotionId,
        institution_id: InstitutionId,
    ) -> Result<Option<Promotion>, RepositoryError>;
}

/// 在庫ストア
#[async_trait]
pub trait InventoryStore: Send {
    /// 在庫数を増やす
    ///
    /// # Returns
    /// * `Ok(true)` - 在庫を更新した
    /// * `Ok(false)` - 該当する在庫行が存在しない（作成はしない）
    async fn increase_quantity(
        &mut self,
        article_id: ArticleId,
        scope: InventoryScope,
        amount: u32,
    ) -> Result<bool, RepositoryError>;
}

/// 監査ログ
#[async_trait]
pub trait AuditLog: Send {
    async fn record(&mut self, entry: &AuditEntry) -> Result<(), RepositoryError>;
}

/// 利用管理のトランザクション
/// ドロップされた場合はロールバックされる
#[async_trait]
pub trait OccupancyTransaction:
    RoomRepository
    + ReservationRepository
    + VisitRegistry
    + MovementLedger
    + PromotionCatalog
    + InventoryStore
    + AuditLog
    + Send
{
    /// トランザクションをコミットする
    async fn commit(&mut self) -> Result<(), RepositoryError>;

    /// トランザクションをロールバックする
    async fn rollback(&mut self) -> Result<(), RepositoryError>;
}

/// 利用管理ストア
/// トランザクションの開始と読み取り専用の問い合わせを提供する
#[async_trait]
pub trait OccupancyStore: Send + Sync {
    /// 新しいトランザクションを開始する
    async fn begin(&self) -> Result<Box<dyn OccupancyTransaction>, RepositoryError>;

    /// 予約IDで予約を取得する
    async fn find_reservation_by_id(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// 施設の利用中の予約を開始時刻の昇順で取得する
    async fn find_active_reservations(
        &self,
        institution_id: InstitutionId,
    ) -> Result<Vec<Reservation>, RepositoryError>;
}
