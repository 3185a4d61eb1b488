// ドメインモデル（エンティティと値オブジェクト）

mod value_objects;
mod room;
mod visit;
mod reservation;
mod movement;
mod promotion;
mod inventory;

pub use value_objects::{
    ArticleId, CategoryId, ConsumptionId, InstitutionId, MovementId, PromotionId, ReservationId,
    RoomId, UserId, VisitId,
    Money,
    StayDuration, MAX_STAY_MINUTES,
    PauseBalance,
    GuestDetails,
    InventoryScope,
};

pub use room::Room;
pub use visit::Visit;
pub use reservation::{
    validate_cancellation_reason, Reservation, ReservationState, MAX_CANCELLATION_REASON_CHARS,
};
pub use movement::{Consumption, ConsumptionSource, Movement};
pub use promotion::Promotion;
pub use inventory::{Inventory, InventoryRestoration};
