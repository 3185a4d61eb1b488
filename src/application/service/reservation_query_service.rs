use super::transaction_scope::{log_failure, TransactionScope};
use crate::application::OccupancyError;
use crate::domain::model::{InstitutionId, Reservation, ReservationId};
use crate::domain::port::OccupancyStore;
use std::sync::Arc;
use tracing::instrument;

/// 予約クエリサービス
/// 読み取り専用の予約操作を提供する（ロックを取らない）
pub struct ReservationQueryService {
    scope: TransactionScope,
}

impl ReservationQueryService {
    /// 新しい予約クエリサービスを作成
    ///
    /// # Arguments
    /// * `store` - 利用管理ストア
    /// * `operation_timeout` - ストレージ呼び出し1回あたりのタイムアウト
    pub fn new(store: Arc<dyn OccupancyStore>, operation_timeout: std::time::Duration) -> Self {
        Self {
            scope: TransactionScope::new(store, operation_timeout),
        }
    }

    /// 予約IDで予約を取得
    ///
    /// # Returns
    /// * `Ok(Some(Reservation))` - 予約が見つかった
    /// * `Ok(None)` - 予約が見つからなかった
    /// * `Err(OccupancyError)` - 取得失敗
    #[instrument(skip_all, fields(reservation_id = %reservation_id))]
    pub async fn get_reservation_by_id(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, OccupancyError> {
        self.scope
            .call(
                "find_reservation_by_id",
                self.scope.store().find_reservation_by_id(reservation_id),
            )
            .await
            .inspect_err(|err| log_failure("get_reservation_by_id", err))
    }

    /// 施設の利用中の予約を取得
    /// 開始時刻の昇順で並べて返す
    #[instrument(skip_all, fields(institution_id = %institution_id))]
    pub async fn get_active_reservations(
        &self,
        institution_id: InstitutionId,
    ) -> Result<Vec<Reservation>, OccupancyError> {
        self.scope
            .call(
                "find_active_reservations",
                self.scope.store().find_active_reservations(institution_id),
            )
            .await
            .inspect_err(|err| log_failure("get_active_reservations", err))
    }
}
