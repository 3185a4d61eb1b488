use hotel_occupancy_engine::adapter::driven::InMemoryOccupancyStore;
use hotel_occupancy_engine::application::command::CreateReservationCommand;
use hotel_occupancy_engine::application::service::{
    OccupancyCancellationService, ReservationApplicationService, ReservationQueryService,
};
use hotel_occupancy_engine::application::OccupancyError;
use hotel_occupancy_engine::domain::model::{
    ArticleId, CategoryId, Consumption, ConsumptionId, ConsumptionSource, GuestDetails,
    InstitutionId, Inventory, InventoryScope, Money, Movement, MovementId, PauseBalance,
    Promotion, PromotionId, ReservationId, ReservationState, Room, RoomId, UserId, VisitId,
};
use hotel_occupancy_engine::domain::port::{Clock, OccupancyStore};
use hotel_occupancy_engine::domain::service::PROMOTION_CATEGORY_MISMATCH;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// テスト用の時計（時刻を進められる）
struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

struct Hotel {
    store: InMemoryOccupancyStore,
    clock: Arc<TestClock>,
    reservations: ReservationApplicationService,
    cancellations: OccupancyCancellationService,
    queries: ReservationQueryService,
    institution_id: InstitutionId,
    category_id: CategoryId,
    room_id: RoomId,
    user_id: UserId,
}

fn opening_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap()
}

async fn hotel() -> Hotel {
    let store = InMemoryOccupancyStore::new();
    let clock = Arc::new(TestClock::at(opening_time()));
    let institution_id = InstitutionId::new();
    let category_id = CategoryId::new();
    let room = Room::new(
        RoomId::new(),
        institution_id,
        category_id,
        Money::new(dec!(100)),
    );
    let room_id = room.id();
    store.add_room(room).await;

    let shared: Arc<dyn OccupancyStore> = Arc::new(store.clone());
    let shared_clock: Arc<dyn Clock> = clock.clone();

    Hotel {
        reservations: ReservationApplicationService::new(
            shared.clone(),
            shared_clock.clone(),
            TIMEOUT,
        ),
        cancellations: OccupancyCancellationService::new(shared.clone(), shared_clock, TIMEOUT),
        queries: ReservationQueryService::new(shared, TIMEOUT),
        store,
        clock,
        institution_id,
        category_id,
        room_id,
        user_id: UserId::new(),
    }
}

fn guest() -> GuestDetails {
    GuestDetails::new(
        "ABC-123".to_string(),
        Some("555-0100".to_string()),
        Some("ABC-123".to_string()),
    )
    .unwrap()
}

fn booking(hotel: &Hotel, hours: u32, minutes: u32) -> CreateReservationCommand {
    CreateReservationCommand {
        room_id: hotel.room_id,
        institution_id: hotel.institution_id,
        start_time: opening_time(),
        hours,
        minutes,
        promotion_id: None,
        guest: Some(guest()),
        user_id: hotel.user_id,
    }
}

async fn add_promotion(hotel: &Hotel, category_id: CategoryId) -> PromotionId {
    let promotion = Promotion::new(
        PromotionId::new(),
        hotel.institution_id,
        category_id,
        "Weekday".to_string(),
        Money::new(dec!(80)),
        true,
    );
    let id = promotion.id();
    hotel.store.add_promotion(promotion).await;
    id
}

#[tokio::test]
async fn test_booking_with_promotion_then_cancel() {
    let hotel = hotel().await;
    let promotion_id = add_promotion(&hotel, hotel.category_id).await;

    let mut command = booking(&hotel, 2, 30);
    command.promotion_id = Some(promotion_id);
    let confirmation = hotel.reservations.create_reservation(command).await.unwrap();

    assert_eq!(confirmation.pricing.total.amount(), dec!(200.00));
    assert_eq!(confirmation.pricing.rate.amount(), dec!(80));
    assert_eq!(confirmation.pricing.promotion.as_ref().unwrap().name, "Weekday");
    let reservation = confirmation.reservation;
    assert!(reservation.is_active());
    assert_eq!(reservation.promotion_id(), Some(promotion_id));
    assert_eq!(reservation.pause(), PauseBalance::zero());

    let room = hotel.store.room(hotel.room_id).await.unwrap();
    assert!(!room.is_available());
    assert_eq!(room.active_visit(), Some(reservation.visit_id()));

    let movements = hotel.store.movements_for_visit(reservation.visit_id()).await;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].amount().amount(), dec!(200.00));

    let audit = hotel.store.audit_entries().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].related_id, Some(reservation.id().as_uuid()));

    // 同じ部屋への2件目の予約は競合
    let second = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await;
    assert_eq!(
        second,
        Err(OccupancyError::Conflict("room no longer available".to_string()))
    );

    hotel.clock.set(opening_time() + Duration::minutes(20));
    let cancelled = hotel
        .reservations
        .cancel_reservation(reservation.id(), "guest changed plans".to_string())
        .await
        .unwrap();

    let cancelled_at = opening_time() + Duration::minutes(20);
    assert_eq!(cancelled.cancelled_at(), Some(cancelled_at));
    assert_eq!(cancelled.end_time(), Some(cancelled_at));
    assert_eq!(cancelled.cancellation_reason(), Some("guest changed plans"));

    let room = hotel.store.room(hotel.room_id).await.unwrap();
    assert!(room.is_available());
    assert_eq!(room.active_visit(), None);
}

#[tokio::test]
async fn test_base_rate_pricing_without_promotion() {
    let hotel = hotel().await;

    let confirmation = hotel
        .reservations
        .create_reservation(booking(&hotel, 2, 30))
        .await
        .unwrap();

    assert_eq!(confirmation.pricing.total.amount(), dec!(250.00));
    assert!(confirmation.pricing.promotion.is_none());
}

#[tokio::test]
async fn test_invalid_duration_is_rejected_without_writes() {
    let hotel = hotel().await;

    let zero = hotel
        .reservations
        .create_reservation(booking(&hotel, 0, 0))
        .await;
    assert!(matches!(zero, Err(OccupancyError::Validation(_))));

    let too_long = hotel
        .reservations
        .create_reservation(booking(&hotel, 168, 1))
        .await;
    assert!(matches!(too_long, Err(OccupancyError::Validation(_))));

    let longest = hotel
        .reservations
        .create_reservation(booking(&hotel, 168, 0))
        .await;
    assert!(longest.is_ok());
    assert_eq!(hotel.store.reservation_count().await, 1);
}

#[tokio::test]
async fn test_start_time_and_guest_are_validated() {
    let hotel = hotel().await;

    let mut past = booking(&hotel, 1, 0);
    past.start_time = opening_time() - Duration::minutes(6);
    assert!(matches!(
        hotel.reservations.create_reservation(past).await,
        Err(OccupancyError::Validation(_))
    ));

    let mut far_future = booking(&hotel, 1, 0);
    far_future.start_time = opening_time() + Duration::days(366);
    assert!(matches!(
        hotel.reservations.create_reservation(far_future).await,
        Err(OccupancyError::Validation(_))
    ));

    let mut anonymous = booking(&hotel, 1, 0);
    anonymous.guest = None;
    assert!(matches!(
        hotel.reservations.create_reservation(anonymous).await,
        Err(OccupancyError::Validation(_))
    ));

    assert_eq!(hotel.store.reservation_count().await, 0);
    assert!(hotel.store.room(hotel.room_id).await.unwrap().is_available());
}

#[tokio::test]
async fn test_unknown_or_foreign_room_is_not_found() {
    let hotel = hotel().await;

    let mut unknown = booking(&hotel, 1, 0);
    unknown.room_id = RoomId::new();
    assert!(matches!(
        hotel.reservations.create_reservation(unknown).await,
        Err(OccupancyError::NotFound(_))
    ));

    let mut foreign = booking(&hotel, 1, 0);
    foreign.institution_id = InstitutionId::new();
    assert!(matches!(
        hotel.reservations.create_reservation(foreign).await,
        Err(OccupancyError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_promotion_for_other_category_is_rejected_without_writes() {
    let hotel = hotel().await;
    let promotion_id = add_promotion(&hotel, CategoryId::new()).await;

    let mut command = booking(&hotel, 2, 30);
    command.promotion_id = Some(promotion_id);
    let result = hotel.reservations.create_reservation(command).await;

    assert_eq!(
        result,
        Err(OccupancyError::BusinessRule(
            PROMOTION_CATEGORY_MISMATCH.to_string()
        ))
    );
    assert_eq!(hotel.store.reservation_count().await, 0);
    assert!(hotel.store.room(hotel.room_id).await.unwrap().is_available());
}

#[tokio::test]
async fn test_nil_promotion_means_no_promotion() {
    let hotel = hotel().await;

    let mut command = booking(&hotel, 1, 0);
    command.promotion_id = Some(PromotionId::none_sentinel());
    let confirmation = hotel.reservations.create_reservation(command).await.unwrap();

    assert_eq!(confirmation.reservation.promotion_id(), None);
    assert_eq!(confirmation.pricing.total.amount(), dec!(100.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_bookings_for_same_room() {
    let hotel = Arc::new(hotel().await);

    let first = {
        let hotel = hotel.clone();
        tokio::spawn(async move {
            hotel
                .reservations
                .create_reservation(booking(&hotel, 1, 0))
                .await
        })
    };
    let second = {
        let hotel = hotel.clone();
        tokio::spawn(async move {
            hotel
                .reservations
                .create_reservation(booking(&hotel, 2, 0))
                .await
        })
    };

    let results = vec![first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(OccupancyError::Conflict(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(hotel.store.reservation_count().await, 1);

    let winner = results
        .iter()
        .find_map(|r| r.as_ref().ok())
        .unwrap()
        .reservation
        .visit_id();
    let room = hotel.store.room(hotel.room_id).await.unwrap();
    assert!(!room.is_available());
    assert_eq!(room.active_visit(), Some(winner));
    assert_eq!(
        hotel
            .queries
            .get_active_reservations(hotel.institution_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_double_cancel_is_rejected() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .unwrap()
        .reservation;

    hotel
        .reservations
        .cancel_reservation(reservation.id(), "no-show".to_string())
        .await
        .unwrap();
    let again = hotel
        .reservations
        .cancel_reservation(reservation.id(), "no-show".to_string())
        .await;

    assert_eq!(
        again,
        Err(OccupancyError::BusinessRule("already cancelled".to_string()))
    );
}

#[tokio::test]
async fn test_cancel_reason_longer_than_150_chars_is_rejected() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .unwrap()
        .reservation;

    let result = hotel
        .reservations
        .cancel_reservation(reservation.id(), "x".repeat(151))
        .await;
    assert!(matches!(result, Err(OccupancyError::Validation(_))));

    let stored = hotel
        .queries
        .get_reservation_by_id(reservation.id())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_active());
}

#[tokio::test]
async fn test_comprehensive_cancel_reverses_every_side_effect() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 3, 0))
        .await
        .unwrap()
        .reservation;
    let visit_id = reservation.visit_id();

    let water = ArticleId::new();
    let towel = ArticleId::new();
    let souvenir = ArticleId::new();
    let room_scope = InventoryScope::Room(hotel.room_id);
    let general_scope = InventoryScope::General(hotel.institution_id);

    // 消費後の在庫
    hotel.store.add_inventory(Inventory::new(water, room_scope, 7)).await;
    hotel.store.add_inventory(Inventory::new(towel, general_scope, 6)).await;

    let minibar = Movement::new(
        MovementId::new(),
        visit_id,
        Money::new(dec!(12.50)),
        "Minibar".to_string(),
        opening_time(),
    );
    hotel.store.add_movement(minibar.clone()).await;

    let lines = [
        (reservation.movement_id(), water, 2, ConsumptionSource::RoomStock),
        (minibar.id(), water, 1, ConsumptionSource::RoomStock),
        (minibar.id(), towel, 4, ConsumptionSource::GeneralStock),
        (minibar.id(), souvenir, 1, ConsumptionSource::GeneralStock),
    ];
    let mut consumption_ids = Vec::new();
    for (movement_id, article_id, quantity, source) in lines {
        let consumption = Consumption::new(
            ConsumptionId::new(),
            movement_id,
            article_id,
            quantity,
            Money::new(dec!(2.50)),
            source,
        );
        consumption_ids.push(consumption.id());
        hotel.store.add_consumption(consumption).await;
    }

    hotel.clock.set(opening_time() + Duration::minutes(45));
    let report = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            reservation.id(),
            "double booking at the desk".to_string(),
            hotel.institution_id,
            hotel.user_id,
        )
        .await
        .unwrap();

    assert_eq!(report.voided_movements, 2);
    assert_eq!(report.voided_consumptions, 4);
    assert_eq!(report.restored.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].article_id, souvenir);
    assert!(report.reservation.is_cancelled());
    assert_eq!(
        report.reservation.end_time(),
        Some(opening_time() + Duration::minutes(45))
    );

    assert_eq!(hotel.store.inventory_quantity(water, room_scope).await, Some(10));
    assert_eq!(hotel.store.inventory_quantity(towel, general_scope).await, Some(10));
    assert_eq!(hotel.store.inventory_quantity(souvenir, general_scope).await, None);

    let movements = hotel.store.movements_for_visit(visit_id).await;
    assert!(movements.iter().all(|m| m.is_cancelled()));
    for id in consumption_ids {
        assert!(hotel.store.consumption(id).await.unwrap().is_cancelled());
    }

    assert!(hotel.store.visit(visit_id).await.unwrap().is_cancelled());
    let room = hotel.store.room(hotel.room_id).await.unwrap();
    assert!(room.is_available());
    assert_eq!(room.active_visit(), None);

    let audit = hotel.store.audit_entries().await;
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[1].metadata["reason"], "double booking at the desk");
    assert_eq!(audit[1].metadata["voided_consumptions"], 4);

    let again = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            reservation.id(),
            "again".to_string(),
            hotel.institution_id,
            hotel.user_id,
        )
        .await;
    assert_eq!(
        again,
        Err(OccupancyError::BusinessRule("already cancelled".to_string()))
    );
}

#[tokio::test]
async fn test_comprehensive_cancel_preconditions() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .unwrap()
        .reservation;

    let foreign = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            reservation.id(),
            "wrong desk".to_string(),
            InstitutionId::new(),
            hotel.user_id,
        )
        .await;
    assert!(matches!(foreign, Err(OccupancyError::NotFound(_))));

    let unknown = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            ReservationId::new(),
            "missing".to_string(),
            hotel.institution_id,
            hotel.user_id,
        )
        .await;
    assert!(matches!(unknown, Err(OccupancyError::NotFound(_))));

    let too_long = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            reservation.id(),
            "y".repeat(151),
            hotel.institution_id,
            hotel.user_id,
        )
        .await;
    assert!(matches!(too_long, Err(OccupancyError::Validation(_))));

    hotel
        .reservations
        .finalize_reservation(hotel.room_id)
        .await
        .unwrap();
    let completed = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            reservation.id(),
            "late".to_string(),
            hotel.institution_id,
            hotel.user_id,
        )
        .await;
    assert!(matches!(completed, Err(OccupancyError::BusinessRule(_))));
    assert!(!hotel
        .store
        .movements_for_visit(reservation.visit_id())
        .await
        .iter()
        .any(|m| m.is_cancelled()));
}

#[tokio::test]
async fn test_failed_audit_rolls_back_booking() {
    let hotel = hotel().await;
    hotel.store.set_audit_failure(true);

    let result = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, OccupancyError::Persistence(_)));
    assert_eq!(err.to_string(), "persistence failure");
    assert_eq!(hotel.store.reservation_count().await, 0);
    assert!(hotel.store.room(hotel.room_id).await.unwrap().is_available());
    assert!(hotel.store.audit_entries().await.is_empty());

    hotel.store.set_audit_failure(false);
    assert!(hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_failed_audit_rolls_back_comprehensive_cancel() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 2, 0))
        .await
        .unwrap()
        .reservation;
    let visit_id = reservation.visit_id();

    let water = ArticleId::new();
    let room_scope = InventoryScope::Room(hotel.room_id);
    hotel.store.add_inventory(Inventory::new(water, room_scope, 5)).await;
    let consumption = Consumption::new(
        ConsumptionId::new(),
        reservation.movement_id(),
        water,
        3,
        Money::new(dec!(2.50)),
        ConsumptionSource::RoomStock,
    );
    let consumption_id = consumption.id();
    hotel.store.add_consumption(consumption).await;

    hotel.store.set_audit_failure(true);
    let result = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            reservation.id(),
            "guest left early".to_string(),
            hotel.institution_id,
            hotel.user_id,
        )
        .await;

    assert!(matches!(result, Err(OccupancyError::Persistence(_))));
    assert_eq!(hotel.store.inventory_quantity(water, room_scope).await, Some(5));
    assert!(!hotel.store.consumption(consumption_id).await.unwrap().is_cancelled());
    assert!(!hotel
        .store
        .movements_for_visit(visit_id)
        .await
        .iter()
        .any(|m| m.is_cancelled()));
    assert!(!hotel.store.visit(visit_id).await.unwrap().is_cancelled());
    let room = hotel.store.room(hotel.room_id).await.unwrap();
    assert!(!room.is_available());
    assert_eq!(room.active_visit(), Some(visit_id));
    assert!(hotel
        .queries
        .get_reservation_by_id(reservation.id())
        .await
        .unwrap()
        .unwrap()
        .is_active());
    assert_eq!(hotel.store.audit_entries().await.len(), 1);

    hotel.store.set_audit_failure(false);
    let report = hotel
        .cancellations
        .comprehensive_cancel_occupation(
            reservation.id(),
            "guest left early".to_string(),
            hotel.institution_id,
            hotel.user_id,
        )
        .await
        .unwrap();
    assert_eq!(report.voided_consumptions, 1);
    assert_eq!(hotel.store.inventory_quantity(water, room_scope).await, Some(8));
}

#[tokio::test]
async fn test_begin_timeout_is_reported_as_persistence_failure() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .unwrap()
        .reservation;

    let shared: Arc<dyn OccupancyStore> = Arc::new(hotel.store.clone());
    let impatient = ReservationApplicationService::new(
        shared,
        hotel.clock.clone(),
        std::time::Duration::from_millis(20),
    );

    // 別のトランザクションが状態を保持している間は開始できない
    let held = hotel.store.begin().await.unwrap();
    let extend = impatient.extend_reservation(reservation.id(), 1, 0).await;
    let promotion = impatient
        .update_reservation_promotion(reservation.id(), None)
        .await;
    let finalize = impatient.finalize_reservation(hotel.room_id).await;
    drop(held);

    for result in [extend.map(|_| ()), promotion.map(|_| ()), finalize.map(|_| ())] {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "persistence");
        assert!(err.detail().contains("begin"));
    }

    let stored = hotel
        .queries
        .get_reservation_by_id(reservation.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.duration().hours(), 1);
}

#[tokio::test]
async fn test_finalize_completes_and_releases_room() {
    let hotel = hotel().await;

    let nothing = hotel
        .reservations
        .finalize_reservation(hotel.room_id)
        .await
        .unwrap();
    assert!(nothing.is_none());

    let unknown_room = hotel
        .reservations
        .finalize_reservation(RoomId::new())
        .await
        .unwrap();
    assert!(unknown_room.is_none());

    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .unwrap()
        .reservation;

    let finished_at = opening_time() + Duration::minutes(58);
    hotel.clock.set(finished_at);
    let finalized = hotel
        .reservations
        .finalize_reservation(hotel.room_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(finalized.id(), reservation.id());
    assert_eq!(
        finalized.state(),
        &ReservationState::Completed {
            ended_at: finished_at
        }
    );
    let room = hotel.store.room(hotel.room_id).await.unwrap();
    assert!(room.is_available());
    assert_eq!(room.active_visit(), None);

    // 2回目は何もしない
    assert!(hotel
        .reservations
        .finalize_reservation(hotel.room_id)
        .await
        .unwrap()
        .is_none());

    // 終端状態は変更できない
    let extend = hotel
        .reservations
        .extend_reservation(reservation.id(), 1, 0)
        .await;
    assert!(matches!(extend, Err(OccupancyError::BusinessRule(_))));
}

#[tokio::test]
async fn test_pause_records_remaining_or_overtime() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .unwrap()
        .reservation;
    let visit_id = reservation.visit_id();

    hotel.clock.set(opening_time() + Duration::minutes(50));
    let paused = hotel.reservations.pause_occupation(visit_id).await.unwrap();
    assert_eq!(paused.pause(), PauseBalance::reconstruct(0, 10));

    hotel.clock.set(opening_time() + Duration::minutes(65));
    let overtime = hotel.reservations.pause_occupation(visit_id).await.unwrap();
    assert_eq!(overtime.pause(), PauseBalance::reconstruct(0, -5));

    let resumed = hotel.reservations.resume_occupation(visit_id).await.unwrap();
    assert!(resumed.pause().is_zero());

    let unknown = hotel.reservations.pause_occupation(VisitId::new()).await;
    assert!(matches!(unknown, Err(OccupancyError::NotFound(_))));
}

#[tokio::test]
async fn test_pause_after_huge_extension_is_rejected() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 1, 0))
        .await
        .unwrap()
        .reservation;

    hotel
        .reservations
        .extend_reservation(reservation.id(), 3_000_000_000, 0)
        .await
        .unwrap();

    let paused = hotel
        .reservations
        .pause_occupation(reservation.visit_id())
        .await;
    assert!(matches!(paused, Err(OccupancyError::Validation(_))));

    let stored = hotel
        .queries
        .get_reservation_by_id(reservation.id())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.pause().is_zero());
    assert!(stored.is_active());
}

#[tokio::test]
async fn test_extend_normalizes_minutes() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 2, 30))
        .await
        .unwrap()
        .reservation;

    let extended = hotel
        .reservations
        .extend_reservation(reservation.id(), 1, 45)
        .await
        .unwrap();
    assert_eq!(extended.duration().hours(), 4);
    assert_eq!(extended.duration().minutes(), 15);

    let missing = hotel
        .reservations
        .extend_reservation(ReservationId::new(), 1, 0)
        .await;
    assert!(matches!(missing, Err(OccupancyError::NotFound(_))));
}

#[tokio::test]
async fn test_update_promotion_checks_room_category() {
    let hotel = hotel().await;
    let reservation = hotel
        .reservations
        .create_reservation(booking(&hotel, 2, 0))
        .await
        .unwrap()
        .reservation;
    let matching = add_promotion(&hotel, hotel.category_id).await;
    let other = add_promotion(&hotel, CategoryId::new()).await;

    let updated = hotel
        .reservations
        .update_reservation_promotion(reservation.id(), Some(matching))
        .await
        .unwrap();
    assert_eq!(updated.promotion_id(), Some(matching));

    let mismatch = hotel
        .reservations
        .update_reservation_promotion(reservation.id(), Some(other))
        .await;
    assert_eq!(
        mismatch,
        Err(OccupancyError::BusinessRule(
            PROMOTION_CATEGORY_MISMATCH.to_string()
        ))
    );

    let cleared = hotel
        .reservations
        .update_reservation_promotion(reservation.id(), Some(PromotionId::none_sentinel()))
        .await
        .unwrap();
    assert_eq!(cleared.promotion_id(), None);
}

#[tokio::test]
async fn test_active_reservations_are_ordered_by_start_time() {
    let hotel = hotel().await;
    let second_room = Room::new(
        RoomId::new(),
        hotel.institution_id,
        hotel.category_id,
        Money::new(dec!(100)),
    );
    let second_room_id = second_room.id();
    hotel.store.add_room(second_room).await;

    let mut later = booking(&hotel, 1, 0);
    later.start_time = opening_time() + Duration::hours(3);
    let later = hotel
        .reservations
        .create_reservation(later)
        .await
        .unwrap()
        .reservation;

    let mut earlier = booking(&hotel, 1, 0);
    earlier.room_id = second_room_id;
    let earlier = hotel
        .reservations
        .create_reservation(earlier)
        .await
        .unwrap()
        .reservation;

    let active = hotel
        .queries
        .get_active_reservations(hotel.institution_id)
        .await
        .unwrap();
    let ids: Vec<ReservationId> = active.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![earlier.id(), later.id()]);

    assert!(hotel
        .queries
        .get_active_reservations(InstitutionId::new())
        .await
        .unwrap()
        .is_empty());
    assert!(hotel
        .queries
        .get_reservation_by_id(ReservationId::new())
        .await
        .unwrap()
        .is_none());
}
