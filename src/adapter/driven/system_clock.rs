use crate::domain::port::Clock;
use chrono::{DateTime, Utc};

/// システム時刻を返す時計
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
