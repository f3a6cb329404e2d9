//! Resource storage arithmetic.
//!
//! Every mutation clamps amounts to `[0, capacity]`. Deposits beyond the
//! ceiling are discarded; withdrawals never go below zero.

use colony_types::{ResourceAmounts, ResourceStorage, ResourceType, StructureInstance};

use crate::catalog::{definition, storage_bonus};

/// A resource the settlement cannot currently pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    /// The short resource.
    pub resource: ResourceType,
    /// Amount required.
    pub required: u32,
    /// Amount in storage.
    pub available: u32,
}

/// Storage capacity for one resource: base plus per-level structure bonuses.
pub fn capacity_for(structures: &[StructureInstance], resource: ResourceType, base: u32) -> u32 {
    structures.iter().fold(base, |total, s| {
        let bonus = storage_bonus(&definition(s.structure_type), resource);
        total.saturating_add(bonus.saturating_mul(s.level))
    })
}

/// Recompute every capacity from the standing structures and clamp amounts.
pub fn recompute_capacities(
    storage: &mut ResourceStorage,
    structures: &[StructureInstance],
    base: u32,
) {
    for resource in ResourceType::ALL {
        let stock = storage.stock_mut(resource);
        stock.capacity = capacity_for(structures, resource, base);
        stock.amount = stock.amount.min(stock.capacity);
    }
}

/// Add up to `quantity`, returning the amount actually stored.
pub fn deposit(storage: &mut ResourceStorage, resource: ResourceType, quantity: u32) -> u32 {
    let stock = storage.stock_mut(resource);
    let headroom = stock.capacity.saturating_sub(stock.amount);
    let added = quantity.min(headroom);
    stock.amount = stock.amount.saturating_add(added);
    added
}

/// Remove up to `quantity`, returning the amount actually removed.
pub fn withdraw(storage: &mut ResourceStorage, resource: ResourceType, quantity: u32) -> u32 {
    let stock = storage.stock_mut(resource);
    let taken = quantity.min(stock.amount);
    stock.amount = stock.amount.saturating_sub(taken);
    taken
}

/// First resource (in storage order) the settlement cannot pay for.
pub fn first_shortfall(storage: &ResourceStorage, cost: &ResourceAmounts) -> Option<Shortfall> {
    cost.iter().find_map(|(resource, required)| {
        let available = storage.stock(resource).amount;
        (available < required).then_some(Shortfall {
            resource,
            required,
            available,
        })
    })
}

/// Deduct a cost in full.
///
/// # Errors
///
/// Returns the first [`Shortfall`] without touching storage when the cost
/// cannot be paid.
pub fn pay(storage: &mut ResourceStorage, cost: &ResourceAmounts) -> Result<(), Shortfall> {
    if let Some(shortfall) = first_shortfall(storage, cost) {
        return Err(shortfall);
    }
    for (resource, quantity) in cost.iter() {
        withdraw(storage, resource, quantity);
    }
    Ok(())
}

/// Credit every component of `amounts`, returning what was actually stored.
pub fn credit(storage: &mut ResourceStorage, amounts: &ResourceAmounts) -> ResourceAmounts {
    let mut stored = ResourceAmounts::ZERO;
    for (resource, quantity) in amounts.iter() {
        *stored.get_mut(resource) = deposit(storage, resource, quantity);
    }
    stored
}

/// Debit up to every component of `amounts`, returning what was removed.
pub fn debit(storage: &mut ResourceStorage, amounts: &ResourceAmounts) -> ResourceAmounts {
    let mut removed = ResourceAmounts::ZERO;
    for (resource, quantity) in amounts.iter() {
        *removed.get_mut(resource) = withdraw(storage, resource, quantity);
    }
    removed
}

/// Fresh storage with every capacity at `base` and the given opening stock.
pub fn initial_storage(base: u32, opening: &ResourceAmounts) -> ResourceStorage {
    let mut storage = ResourceStorage::default();
    for resource in ResourceType::ALL {
        storage.stock_mut(resource).capacity = base;
    }
    credit(&mut storage, opening);
    storage
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use colony_types::{SettlementId, StructureCategory, StructureId, StructureType};

    use super::*;

    fn storage_with(amount: u32, capacity: u32) -> ResourceStorage {
        let mut storage = ResourceStorage::default();
        for resource in ResourceType::ALL {
            let stock = storage.stock_mut(resource);
            stock.amount = amount;
            stock.capacity = capacity;
        }
        storage
    }

    #[test]
    fn deposit_is_clamped_to_capacity() {
        let mut storage = storage_with(95, 100);
        assert_eq!(deposit(&mut storage, ResourceType::Food, 10), 5);
        assert_eq!(storage.food.amount, 100);
    }

    #[test]
    fn withdraw_never_goes_negative() {
        let mut storage = storage_with(3, 100);
        assert_eq!(withdraw(&mut storage, ResourceType::Ore, 10), 3);
        assert_eq!(storage.ore.amount, 0);
    }

    #[test]
    fn pay_is_all_or_nothing() {
        let mut storage = storage_with(20, 100);
        let cost = ResourceAmounts {
            wood: 10,
            stone: 30,
            ..ResourceAmounts::ZERO
        };
        let result = pay(&mut storage, &cost);
        assert_eq!(
            result,
            Err(Shortfall {
                resource: ResourceType::Stone,
                required: 30,
                available: 20,
            })
        );
        assert_eq!(storage.wood.amount, 20);

        let cost = ResourceAmounts {
            wood: 10,
            ..ResourceAmounts::ZERO
        };
        assert!(pay(&mut storage, &cost).is_ok());
        assert_eq!(storage.wood.amount, 10);
    }

    #[test]
    fn granary_raises_food_capacity_per_level() {
        let granary = StructureInstance {
            id: StructureId::new(),
            settlement_id: SettlementId::new(),
            structure_type: StructureType::Granary,
            category: StructureCategory::Building,
            level: 2,
            health: 100,
            repair_pending: false,
            built_at: Utc::now(),
        };
        let mut storage = storage_with(900, 1000);
        recompute_capacities(&mut storage, &[granary], 1000);
        assert_eq!(storage.food.capacity, 2000);
        assert_eq!(storage.water.capacity, 1000);

        recompute_capacities(&mut storage, &[], 500);
        assert_eq!(storage.food.amount, 500);
    }

    #[test]
    fn initial_storage_clamps_opening_stock() {
        let opening = ResourceAmounts {
            food: 1500,
            water: 10,
            ..ResourceAmounts::ZERO
        };
        let storage = initial_storage(1000, &opening);
        assert_eq!(storage.food.amount, 1000);
        assert_eq!(storage.water.amount, 10);
        assert_eq!(storage.ore.capacity, 1000);
    }
}
