//! Construction queue manager.
//!
//! Each settlement has a bounded number of `ACTIVE` slots and an unbounded
//! FIFO of `QUEUED` items. Queue order in [`SettlementRecord::queue`] is
//! enqueue order, and promotion always takes the oldest `QUEUED` item; there
//! is no priority reordering.
//!
//! Costs are charged when a request is accepted and refunded in full if the
//! item is cancelled or its target is demolished before completion.
//!
//! [`complete_due`] instantiates finished items, recomputes derived fields
//! and promotes waiting items in one pass over the record. Callers run it
//! inside the settlement's store transaction so completion and area
//! recomputation land together.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use colony_types::{
    ConstructionAction, ConstructionQueueItem, QueueItemId, QueueStatus, ResourceAmounts,
    SettlementRecord, StructureId, StructureInstance, StructureType,
};

use crate::error::WorldError;
use crate::rules::WorldRules;
use crate::settlement::{new_instance, recompute_derived};
use crate::storage::{credit, pay};
use crate::validation::{BuildPlan, BuildRejection};

/// Construction queue parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionConfig {
    /// Items that may be `ACTIVE` at once per settlement.
    #[serde(default = "default_active_slots")]
    pub active_slots: usize,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            active_slots: default_active_slots(),
        }
    }
}

const fn default_active_slots() -> usize {
    3
}

/// Result of accepting a build or upgrade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enqueued {
    /// The new queue item.
    pub item_id: QueueItemId,
    /// `ACTIVE` when a slot was free, otherwise `QUEUED`.
    pub status: QueueStatus,
}

/// One item finished by a completion sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedItem {
    /// The finished queue item.
    pub item_id: QueueItemId,
    /// Definition built or upgraded.
    pub structure_type: StructureType,
    /// The created or upgraded structure; `None` when an upgrade target
    /// vanished before completion.
    pub structure_id: Option<StructureId>,
    /// Level of the structure after completion.
    pub level: u32,
    /// When the build timer ran out.
    pub finished_at: DateTime<Utc>,
}

/// What a completion sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionReport {
    /// Items completed, in completion order.
    pub completed: Vec<CompletedItem>,
    /// Items promoted from `QUEUED` to `ACTIVE`.
    pub promoted: Vec<QueueItemId>,
}

impl ConstructionReport {
    /// Whether the sweep changed nothing.
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.promoted.is_empty()
    }
}

/// What a demolition removed and returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Demolition {
    /// The removed structure.
    pub removed: StructureInstance,
    /// Upgrade items for it that were cancelled.
    pub cancelled: Vec<QueueItemId>,
    /// Resources refunded for the cancelled items.
    pub refunded: ResourceAmounts,
}

/// Accept a validated plan: charge its cost and append a queue item,
/// promoting it immediately when a slot is free.
///
/// # Errors
///
/// Returns [`BuildRejection::InsufficientResources`] if storage changed
/// since validation and can no longer pay.
pub fn enqueue(
    record: &mut SettlementRecord,
    plan: BuildPlan,
    now: DateTime<Utc>,
    rules: &WorldRules,
) -> Result<Enqueued, BuildRejection> {
    pay(&mut record.storage, &plan.cost).map_err(|shortfall| {
        BuildRejection::InsufficientResources {
            resource: shortfall.resource,
            required: shortfall.required,
            available: shortfall.available,
        }
    })?;

    let item_id = QueueItemId::new();
    record.queue.push(ConstructionQueueItem {
        id: item_id,
        settlement_id: record.settlement.id,
        structure_type: plan.structure_type,
        action: plan.action,
        status: QueueStatus::Queued,
        enqueued_at: now,
        started_at: None,
        duration_ms: plan.duration_ms,
        area_reserved: plan.area,
        cost_paid: plan.cost,
    });
    promote(record, now, rules.construction.active_slots);

    let status = record
        .queue
        .iter()
        .find(|item| item.id == item_id)
        .map_or(QueueStatus::Queued, |item| item.status);
    debug!(
        settlement_id = %record.settlement.id,
        item_id = %item_id,
        structure_type = %plan.structure_type,
        status = ?status,
        "construction enqueued"
    );
    Ok(Enqueued { item_id, status })
}

/// Promote the oldest `QUEUED` items while `ACTIVE` slots are free.
///
/// Returns the promoted item IDs in promotion order.
pub fn promote(
    record: &mut SettlementRecord,
    started_at: DateTime<Utc>,
    active_slots: usize,
) -> Vec<QueueItemId> {
    let mut active = active_count(&record.queue);
    let mut promoted = Vec::new();
    for item in &mut record.queue {
        if active >= active_slots {
            break;
        }
        if item.status == QueueStatus::Queued {
            item.status = QueueStatus::Active;
            item.started_at = Some(started_at);
            active = active.saturating_add(1);
            promoted.push(item.id);
        }
    }
    promoted
}

/// Number of `ACTIVE` items.
pub fn active_count(queue: &[ConstructionQueueItem]) -> usize {
    queue
        .iter()
        .filter(|item| item.status == QueueStatus::Active)
        .count()
}

/// When an active item's build timer runs out.
pub fn finishes_at(item: &ConstructionQueueItem) -> Option<DateTime<Utc>> {
    let started = item.started_at?;
    let millis = i64::try_from(item.duration_ms).ok()?;
    started.checked_add_signed(Duration::milliseconds(millis))
}

/// Complete every active item whose timer has run out by `now`.
///
/// Items finish in timer order. Each completion frees a slot that is
/// refilled as of the finishing instant, so a long gap between sweeps still
/// completes chained items in the right order.
pub fn complete_due(
    record: &mut SettlementRecord,
    now: DateTime<Utc>,
    rules: &WorldRules,
) -> ConstructionReport {
    let mut report = ConstructionReport::default();
    report
        .promoted
        .extend(promote(record, now, rules.construction.active_slots));

    loop {
        let next = record
            .queue
            .iter()
            .filter(|item| item.status == QueueStatus::Active)
            .filter_map(|item| finishes_at(item).map(|at| (at, item.id)))
            .filter(|(at, _)| *at <= now)
            .min_by_key(|(at, _)| *at);
        let Some((finished_at, item_id)) = next else {
            break;
        };

        let Some(position) = record.queue.iter().position(|item| item.id == item_id) else {
            break;
        };
        let mut item = record.queue.remove(position);
        item.status = QueueStatus::Complete;

        let completed = apply_completion(record, &item, finished_at);
        recompute_derived(record, rules);
        debug!(
            settlement_id = %record.settlement.id,
            item_id = %item.id,
            structure_type = %item.structure_type,
            level = completed.level,
            "construction complete"
        );
        report.completed.push(completed);
        report
            .promoted
            .extend(promote(record, finished_at, rules.construction.active_slots));
    }

    report
}

fn apply_completion(
    record: &mut SettlementRecord,
    item: &ConstructionQueueItem,
    finished_at: DateTime<Utc>,
) -> CompletedItem {
    let (structure_id, level) = match item.action {
        ConstructionAction::Build => {
            let instance = new_instance(record.settlement.id, item.structure_type, finished_at);
            let id = instance.id;
            record.structures.push(instance);
            (Some(id), 1)
        }
        ConstructionAction::Upgrade {
            structure_id,
            target_level,
        } => match record.structure_mut(structure_id) {
            Some(structure) => {
                structure.level = structure.level.max(target_level);
                (Some(structure_id), structure.level)
            }
            None => {
                debug!(
                    structure_id = %structure_id,
                    "upgrade target no longer exists"
                );
                (None, target_level)
            }
        },
    };
    CompletedItem {
        item_id: item.id,
        structure_type: item.structure_type,
        structure_id,
        level,
        finished_at,
    }
}

/// Cancel an unfinished item and refund its cost in full.
///
/// Returns the resources actually credited (storage ceilings still apply).
///
/// # Errors
///
/// Returns [`WorldError::QueueItemNotFound`] for an unknown item.
pub fn cancel(
    record: &mut SettlementRecord,
    item_id: QueueItemId,
    now: DateTime<Utc>,
    rules: &WorldRules,
) -> Result<ResourceAmounts, WorldError> {
    let position = record
        .queue
        .iter()
        .position(|item| item.id == item_id)
        .ok_or(WorldError::QueueItemNotFound(item_id))?;
    if record
        .queue
        .get(position)
        .is_some_and(|item| item.status == QueueStatus::Complete)
    {
        return Err(WorldError::QueueItemComplete(item_id));
    }
    let item = record.queue.remove(position);
    let refunded = credit(&mut record.storage, &item.cost_paid);
    promote(record, now, rules.construction.active_slots);
    Ok(refunded)
}

/// Remove a standing structure.
///
/// Unfinished upgrades of it are cancelled and refunded. The Town Hall is
/// protected.
///
/// # Errors
///
/// Returns [`WorldError::StructureNotFound`] or
/// [`WorldError::ProtectedStructure`].
pub fn demolish(
    record: &mut SettlementRecord,
    structure_id: StructureId,
    now: DateTime<Utc>,
    rules: &WorldRules,
) -> Result<Demolition, WorldError> {
    let position = record
        .structures
        .iter()
        .position(|s| s.id == structure_id)
        .ok_or(WorldError::StructureNotFound(structure_id))?;
    if record
        .structures
        .get(position)
        .is_some_and(|s| s.structure_type == StructureType::TownHall)
    {
        return Err(WorldError::ProtectedStructure(StructureType::TownHall));
    }

    let removed = record.structures.remove(position);
    let (cancelled, refunded) = drop_upgrades_of(record, structure_id);
    recompute_derived(record, rules);
    promote(record, now, rules.construction.active_slots);
    Ok(Demolition {
        removed,
        cancelled,
        refunded,
    })
}

/// Remove unfinished upgrade items targeting a structure, refunding them.
pub fn drop_upgrades_of(
    record: &mut SettlementRecord,
    structure_id: StructureId,
) -> (Vec<QueueItemId>, ResourceAmounts) {
    let mut cancelled = Vec::new();
    let mut refunded = ResourceAmounts::ZERO;
    let mut kept = Vec::with_capacity(record.queue.len());
    for item in std::mem::take(&mut record.queue) {
        let targets = matches!(
            item.action,
            ConstructionAction::Upgrade { structure_id: target, .. } if target == structure_id
        );
        if targets && item.status != QueueStatus::Complete {
            let credited = credit(&mut record.storage, &item.cost_paid);
            for (resource, quantity) in credited.iter() {
                let total = refunded.get_mut(resource);
                *total = total.saturating_add(quantity);
            }
            cancelled.push(item.id);
        } else {
            kept.push(item);
        }
    }
    record.queue = kept;
    (cancelled, refunded)
}
