//! Integration tests for player commands.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use colony_core::{CommandError, Commands, MockClock, RecordingBroadcaster};
use colony_db::{InMemoryStore, SettlementStore, StoreError};
use colony_types::{PlayerId, QueueStatus, SettlementId, StructureType, WorldId};
use colony_world::{BuildRejection, Founding, WorldError, WorldRules};

type Cmds = Commands<InMemoryStore, RecordingBroadcaster, MockClock>;

fn setup(rules: WorldRules) -> (Cmds, Arc<InMemoryStore>, Arc<MockClock>) {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MockClock::parse("2026-05-10T08:00:00Z").unwrap());
    let commands = Commands::new(
        Arc::clone(&store),
        Arc::new(RecordingBroadcaster::new()),
        Arc::clone(&clock),
        rules,
    );
    (commands, store, clock)
}

async fn found(commands: &Cmds) -> SettlementId {
    commands
        .found_settlement(Founding {
            world_id: WorldId::new(),
            owner_id: PlayerId::new(),
            name: String::from("Juniper"),
            biome: String::from("forest"),
        })
        .await
        .unwrap()
        .id()
}

fn rich_rules() -> WorldRules {
    let mut rules = WorldRules::default();
    rules.settlement.starting_resources.wood = 1000;
    rules.settlement.starting_resources.stone = 1000;
    rules
}

fn code(result: Result<impl std::fmt::Debug, CommandError>) -> Option<&'static str> {
    result.err().and_then(|e| e.rejection().map(BuildRejection::code))
}

#[tokio::test]
async fn five_builds_leave_three_active() {
    let (commands, store, clock) = setup(WorldRules::default());
    let id = found(&commands).await;

    for _ in 0..5 {
        commands.request_build(id, StructureType::House).await.unwrap();
    }
    let record = store.get(id).await.unwrap();
    let statuses: Vec<QueueStatus> = record.queue.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            QueueStatus::Active,
            QueueStatus::Active,
            QueueStatus::Active,
            QueueStatus::Queued,
            QueueStatus::Queued,
        ]
    );

    // Cancelling an active item promotes the oldest queued one.
    let first = record.queue.first().map(|i| i.id).unwrap();
    let refunded = commands.cancel_construction(id, first).await.unwrap();
    assert_eq!((refunded.wood, refunded.stone), (30, 10));
    let record = store.get(id).await.unwrap();
    let active = record.queue.iter().filter(|i| i.status == QueueStatus::Active).count();
    assert_eq!((active, record.queue.len()), (3, 4));

    // The lazy sweep of the next command completes the three active houses.
    clock.advance(Duration::from_secs(121));
    let summary = commands.area_summary(id).await.unwrap();
    assert_eq!(summary.used, 250);
    let record = store.get(id).await.unwrap();
    assert_eq!(record.queue.len(), 1);
    assert_eq!(record.queue.first().map(|i| i.status), Some(QueueStatus::Active));
}

#[tokio::test]
async fn town_hall_gate_is_reported_before_area() {
    let (commands, _store, _clock) = setup(rich_rules());
    let id = found(&commands).await;

    // Reserve 450 of the 500 free area units.
    for _ in 0..9 {
        commands.request_build(id, StructureType::House).await.unwrap();
    }
    let summary = commands.area_summary(id).await.unwrap();
    assert_eq!(summary.reserved, 450);

    // Manor needs Town Hall 3 and 120 area: both rules fail, the gate wins.
    let manor = commands.request_build(id, StructureType::Manor).await;
    assert_eq!(code(manor), Some("TOWN_HALL_LEVEL_TOO_LOW"));

    let shelter = commands.request_build(id, StructureType::Shelter).await;
    assert!(matches!(
        shelter,
        Err(CommandError::Rejected(BuildRejection::InsufficientArea {
            required: 60,
            available: 50
        }))
    ));
}

#[tokio::test]
async fn area_invariant_holds_through_construction() {
    let (commands, _store, clock) = setup(rich_rules());
    let id = found(&commands).await;

    for structure_type in [StructureType::House, StructureType::Tavern, StructureType::Farm] {
        commands.request_build(id, structure_type).await.unwrap();
    }
    for _ in 0..4 {
        let summary = commands.area_summary(id).await.unwrap();
        assert_eq!(summary.used + summary.available, summary.capacity);
        assert_eq!(summary.capacity, 600);
        clock.advance(Duration::from_secs(90));
    }
    let summary = commands.area_summary(id).await.unwrap();
    // Farm is an extractor and consumes no area.
    assert_eq!(summary.used, 100 + 50 + 70);
    assert_eq!(summary.reserved, 0);
}

#[tokio::test]
async fn unique_structures_cannot_be_queued_twice() {
    let (commands, _store, _clock) = setup(rich_rules());
    let id = found(&commands).await;

    commands.request_build(id, StructureType::Tavern).await.unwrap();
    let again = commands.request_build(id, StructureType::Tavern).await;
    assert_eq!(code(again), Some("UNIQUE_CONSTRAINT_VIOLATED"));
    let hall = commands.request_build(id, StructureType::TownHall).await;
    assert_eq!(code(hall), Some("UNIQUE_CONSTRAINT_VIOLATED"));
}

#[tokio::test]
async fn town_hall_cannot_be_demolished() {
    let (commands, store, _clock) = setup(WorldRules::default());
    let id = found(&commands).await;
    let hall = store.get(id).await.unwrap().structures.first().map(|s| s.id).unwrap();

    let result = commands.demolish_structure(id, hall).await;
    assert!(matches!(
        result,
        Err(CommandError::World(WorldError::ProtectedStructure(StructureType::TownHall)))
    ));
}

#[tokio::test]
async fn upgrade_raises_level_after_its_timer() {
    let (commands, store, clock) = setup(rich_rules());
    let id = found(&commands).await;
    let hall = store.get(id).await.unwrap().structures.first().map(|s| s.id).unwrap();

    commands.request_upgrade(id, hall).await.unwrap();
    let twice = commands.request_upgrade(id, hall).await;
    assert_eq!(code(twice), Some("UPGRADE_ALREADY_QUEUED"));

    // Level-2 Town Hall takes 1.5 x 600 s.
    clock.advance(Duration::from_secs(900));
    let summary = commands.area_summary(id).await.unwrap();
    assert_eq!(summary.capacity, 700);
    assert_eq!(store.get(id).await.unwrap().settlement.town_hall_level, 2);
}

#[tokio::test]
async fn collect_offline_applies_tiered_accumulation() {
    let (commands, store, clock) = setup(WorldRules::default());
    let id = found(&commands).await;

    let first = commands.collect_offline(id).await.unwrap();
    assert!(first.first_activation);

    clock.advance(Duration::from_secs(30 * 3600));
    let second = commands.collect_offline(id).await.unwrap();
    assert!(!second.first_activation);
    assert_eq!(second.effective_hours, rust_decimal::Decimal::from(27));
    assert_eq!(
        store.get(id).await.unwrap().settlement.last_harvest_at,
        Some(chrono::DateTime::parse_from_rfc3339("2026-05-11T14:00:00Z").unwrap().to_utc())
    );
}

#[tokio::test]
async fn repair_and_disaster_commands_without_damage() {
    let (commands, store, _clock) = setup(WorldRules::default());
    let id = found(&commands).await;
    let hall = store.get(id).await.unwrap().structures.first().map(|s| s.id).unwrap();

    let repair = commands.request_repair(id, hall).await;
    assert_eq!(code(repair), Some("STRUCTURE_NOT_DAMAGED"));

    let ack = commands.acknowledge_aftermath(id).await;
    assert!(matches!(ack, Err(CommandError::World(WorldError::NoAftermath))));

    let remaining = commands.repair_window_remaining(id).await.unwrap();
    assert_eq!(remaining, TimeDelta::zero());
}

#[tokio::test]
async fn abandoned_settlement_is_gone() {
    let (commands, store, _clock) = setup(WorldRules::default());
    let id = found(&commands).await;

    commands.abandon_settlement(id).await.unwrap();
    assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
    let again = commands.request_build(id, StructureType::House).await;
    assert!(matches!(again, Err(CommandError::Store(StoreError::NotFound(_)))));
}
