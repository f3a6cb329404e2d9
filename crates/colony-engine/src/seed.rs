//! Demo world seeding.
//!
//! On a fresh store the engine founds a handful of settlements so the tick
//! scheduler has something to simulate. Each one queues a starter set of
//! extractors through the regular command path, so seeding exercises the
//! same validation and area bookkeeping a player would.

use colony_core::config::WorldConfig;
use colony_core::{Broadcaster, Clock, Commands};
use colony_db::SettlementStore;
use colony_types::{PlayerId, SettlementId, StructureType, WorldId};
use colony_world::Founding;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// Extractors queued in every seeded settlement.
const STARTER_BUILDS: [StructureType; 3] = [
    StructureType::Farm,
    StructureType::Well,
    StructureType::LumberMill,
];

/// Settlement names handed out in order.
const NAMES: [&str; 8] = [
    "Ashford", "Brindle", "Cresthollow", "Dunmere", "Eastwatch", "Fallowby", "Greystone",
    "Harrowgate",
];

/// The world id derived from the configured seed.
///
/// Stable across restarts so world rooms keep their address.
pub fn world_id(seed: u64) -> WorldId {
    WorldId::from(Uuid::from_u64_pair(seed, 0))
}

/// Found `config.demo_settlements` settlements and queue their starter
/// builds.
///
/// A rejected starter build is logged and skipped.
pub async fn seed_world<S, B, C>(
    commands: &Commands<S, B, C>,
    config: &WorldConfig,
) -> Result<Vec<SettlementId>, EngineError>
where
    S: SettlementStore,
    B: Broadcaster,
    C: Clock,
{
    let world_id = world_id(config.seed);
    let owner_id = PlayerId::new();
    let mut seeded = Vec::new();

    for (index, name) in (0..config.demo_settlements).zip(NAMES.iter().cycle()) {
        let biome = usize::try_from(index)
            .ok()
            .and_then(|i| config.biomes.get(i.checked_rem(config.biomes.len())?))
            .cloned()
            .unwrap_or_else(|| String::from("plains"));
        let round = index.checked_div(8).unwrap_or(0);
        let name = if round == 0 {
            (*name).to_owned()
        } else {
            format!("{name} {}", round.saturating_add(1))
        };

        let record = commands
            .found_settlement(Founding {
                world_id,
                owner_id,
                name,
                biome,
            })
            .await?;
        let id = record.id();

        for structure_type in STARTER_BUILDS {
            if let Err(e) = commands.request_build(id, structure_type).await {
                warn!(settlement_id = %id, ?structure_type, error = %e, "starter build rejected");
            }
        }
        seeded.push(id);
    }

    info!(
        world_id = %world_id,
        world = %config.name,
        settlements = seeded.len(),
        "demo world seeded"
    );
    Ok(seeded)
}
