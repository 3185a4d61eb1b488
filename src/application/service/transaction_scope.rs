use crate::application::OccupancyError;
use crate::domain::port::{OccupancyStore, OccupancyTransaction, RepositoryError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// トランザクションスコープ
/// トランザクションの開始・コミット・ロールバックと、各ストレージ呼び出しのタイムアウトを管理する
///
/// エラー経路ではロールバックし、呼び出し側のフューチャーが途中で破棄された場合も
/// トランザクションのドロップによりロールバックされる
#[derive(Clone)]
pub struct TransactionScope {
    store: Arc<dyn OccupancyStore>,
    operation_timeout: Duration,
}

impl TransactionScope {
    /// 新しいトランザクションスコープを作成
    ///
    /// # Arguments
    /// * `store` - 利用管理ストア
    /// * `operation_timeout` - ストレージ呼び出し1回あたりのタイムアウト
    pub fn new(store: Arc<dyn OccupancyStore>, operation_timeout: Duration) -> Self {
        Self {
            store,
            operation_timeout,
        }
    }

    pub fn store(&self) -> &dyn OccupancyStore {
        self.store.as_ref()
    }

    /// ストレージ呼び出しをタイムアウト付きで実行する
    /// タイムアウトは内部情報を含まない永続化エラーとして返す
    pub async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T, OccupancyError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result.map_err(OccupancyError::from),
            Err(_) => Err(OccupancyError::Persistence(format!(
                "storage call `{}` timed out after {:?}",
                operation, self.operation_timeout
            ))),
        }
    }

    /// トランザクションを開始する
    pub async fn begin(&self) -> Result<Box<dyn OccupancyTransaction>, OccupancyError> {
        self.call("begin", self.store.begin()).await
    }

    /// 処理結果に応じてトランザクションを終了する
    /// 成功ならコミット、失敗ならロールバックして元のエラーを返す
    pub async fn finish<T>(
        &self,
        mut tx: Box<dyn OccupancyTransaction>,
        outcome: Result<T, OccupancyError>,
    ) -> Result<T, OccupancyError> {
        match outcome {
            Ok(value) => {
                self.call("commit", tx.commit()).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.call("rollback", tx.rollback()).await {
                    tracing::error!(
                        detail = %rollback_err.detail(),
                        "transaction rollback failed"
                    );
                }
                Err(err)
            }
        }
    }
}

/// 失敗した操作をログに出力する
/// 呼び出し側の誤りは warn、永続化の失敗は error で出力する
pub(crate) fn log_failure(operation: &'static str, err: &OccupancyError) {
    match err {
        OccupancyError::Persistence(detail) => {
            tracing::error!(operation, kind = err.kind(), detail = %detail, "operation failed");
        }
        _ => {
            tracing::warn!(operation, kind = err.kind(), detail = %err.detail(), "operation rejected");
        }
    }
}
