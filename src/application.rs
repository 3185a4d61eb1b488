// アプリケーション層
// ユースケース（予約の作成・一時停止・延長・終了・キャンセル）を調整する

pub mod command;
pub mod error;
pub mod service;

pub use error::OccupancyError;
