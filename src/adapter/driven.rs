// 駆動される側アダプター（ストア実装、時計）

mod in_memory_occupancy_store;
mod mysql_occupancy_store;
mod system_clock;

pub use in_memory_occupancy_store::{
    InMemoryOccupancyStore, InMemoryOccupancyTransaction, OccupancyState,
};
pub use mysql_occupancy_store::{MySqlOccupancyStore, MySqlOccupancyTransaction};
pub use system_clock::SystemClock;
