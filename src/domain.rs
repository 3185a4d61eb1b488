// ドメイン層
// 部屋の利用（予約）のライフサイクルとビジネスルールを表現する

pub mod error;
pub mod event;
pub mod model;
pub mod port;
pub mod service;
