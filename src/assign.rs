use std::cmp::Reverse;
use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use rand::prelude::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::action::{Action, Position};
use crate::cache::TableCache;
use crate::cluster::Cluster;
use crate::error::Anomaly;
use crate::model::condition::Condition;
use crate::model::entity::Id;
use crate::model::group::GroupIndex;

/// Where a student landed in the initial assignment, and whether their
/// cluster had to be broken up to get there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Placement {
    Placed { group: GroupIndex },
    Degraded { group: GroupIndex, reason: DegradeReason },
}

impl Placement {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Placement::Degraded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DegradeReason {
    /// Placed away from part of its cluster, but without breaking a constraint.
    ClusterSplit,
    /// No group was free of excluded students; shares a group with `conflicts`.
    ConstraintForced { conflicts: Vec<Id> },
}

pub type Placements = BTreeMap<Id, Placement>;

/// Largest clusters first, ties by lowest member id.
pub fn order_clusters(clusters: &mut [Cluster]) {
    clusters.sort_by_key(|cluster| (Reverse(cluster.len()), cluster.lowest()));
}

/// Like [`order_clusters`], but equal-sized clusters come in random order.
pub fn shuffle_ties<R: Rng>(clusters: &mut [Cluster], rng: &mut R) {
    clusters.shuffle(rng);
    clusters.sort_by_key(|cluster| Reverse(cluster.len()));
}

fn least_full(cache: &TableCache, eligible: impl Iterator<Item = GroupIndex>) -> Option<GroupIndex> {
    let sizes = cache.sizes();
    eligible.min_by_key(|&index| (sizes[index], index))
}

/// Places `clusters`, in the given order, into `num_groups` groups.
pub fn assign(
    clusters: &[Cluster],
    num_groups: usize,
    condition: &Condition,
    anomalies: &mut Vec<Anomaly>,
) -> (TableCache, Placements) {
    let mut cache = TableCache::empty(num_groups);
    let mut placements = Placements::new();
    for cluster in clusters {
        let internal_conflict = cluster.members.iter()
            .tuple_combinations()
            .any(|(a, b)| condition.constraints.contains_pair([*a, *b]));
        let target = if internal_conflict {
            None
        } else {
            least_full(&cache, (0..num_groups).filter(|&index| {
                let members = cache.members(index);
                cluster.members.iter().all(|&id| condition.constraints.conflicts(id, members).next().is_none())
            }))
        };
        match target {
            Some(group_index) => {
                for &id in &cluster.members {
                    place(&mut cache, id, group_index, condition);
                    placements.insert(id, Placement::Placed { group: group_index });
                }
            }
            None => place_degraded(&mut cache, &mut placements, cluster, condition, anomalies),
        }
    }
    debug!("initial assignment: sizes {:?}, {} satisfied", cache.sizes(), cache.satisfied());
    (cache, placements)
}

fn place(cache: &mut TableCache, id: Id, group_index: GroupIndex, condition: &Condition) {
    // Group indices come from this module and each id appears in one cluster.
    let placed = cache.act(Action::Add { id, group_index }, condition.graph);
    debug_assert!(placed.is_ok(), "placing {id} in group {group_index}: {placed:?}");
}

fn place_degraded(
    cache: &mut TableCache,
    placements: &mut Placements,
    cluster: &Cluster,
    condition: &Condition,
    anomalies: &mut Vec<Anomaly>,
) {
    let mut forced = Vec::new();
    for &id in &cluster.members {
        let table: &TableCache = cache;
        let eligible = least_full(table, (0..table.num_groups()).filter(|&index| {
            condition.constraints.conflicts(id, table.members(index)).next().is_none()
        }));
        let (group_index, reason) = match eligible {
            Some(group_index) => (group_index, DegradeReason::ClusterSplit),
            None => {
                let group_index = least_full(table, 0..table.num_groups()).unwrap_or_default();
                let conflicts: Vec<Id> = condition.constraints.conflicts(id, table.members(group_index)).collect();
                forced.extend(conflicts.iter().map(|&other| [id.min(other), id.max(other)]));
                (group_index, DegradeReason::ConstraintForced { conflicts })
            }
        };
        place(cache, id, group_index, condition);
        placements.insert(id, Placement::Degraded { group: group_index, reason });
    }
    Anomaly::InfeasibleConstraint { students: cluster.members.iter().copied().collect(), forced }.record(anomalies);
}

/// One or two moves that shift a student's worth of size from a largest group
/// to a smallest one. A two-move route relays through a third group.
#[derive(Debug, Clone)]
struct Route {
    diff: isize,
    moves: Vec<Action>,
}

impl Route {
    /// Highest satisfaction first, then fewest moves, then lowest ids and groups.
    fn rank(&self) -> (Reverse<isize>, usize, Vec<(Id, GroupIndex, GroupIndex)>) {
        let key = self.moves.iter()
            .map(|action| match action {
                Action::Move { from, to } => (from.id, from.group_index, *to),
                _ => (Id::MAX, usize::MAX, usize::MAX),
            })
            .collect();
        (Reverse(self.diff), self.moves.len(), key)
    }
}

fn moves_between(table: &TableCache, from: GroupIndex, to: GroupIndex) -> impl Iterator<Item = Action> + '_ {
    table.members(from).iter().map(move |&id| Action::Move { from: Position::new(from, id), to })
}

fn direct_route(table: &TableCache, condition: &Condition, largest: &[GroupIndex], smallest: &[GroupIndex]) -> Option<Route> {
    largest.iter()
        .cartesian_product(smallest)
        .flat_map(|(&from, &to)| moves_between(table, from, to))
        .filter_map(|action| {
            let diff = table.simulate(&action, condition).feasible_diff()?;
            Some(Route { diff, moves: vec![action] })
        })
        .min_by_key(Route::rank)
}

fn relayed_route(table: &TableCache, condition: &Condition, largest: &[GroupIndex], smallest: &[GroupIndex]) -> Option<Route> {
    let num_groups = table.num_groups();
    largest.iter()
        .cartesian_product(smallest)
        .flat_map(|(&from, &to)| {
            (0..num_groups).filter(move |&via| via != from && via != to).map(move |via| (from, via, to))
        })
        .flat_map(|(from, via, to)| moves_between(table, from, via).map(move |first| (first, via, to)))
        .filter_map(|(first, via, to)| {
            let first_diff = table.simulate(&first, condition).feasible_diff()?;
            let mut relay = table.clone();
            relay.act(first.clone(), condition.graph).ok()?;
            moves_between(&relay, via, to)
                .filter_map(|second| {
                    let diff = first_diff + relay.simulate(&second, condition).feasible_diff()?;
                    Some(Route { diff, moves: vec![first.clone(), second] })
                })
                .min_by_key(Route::rank)
        })
        .min_by_key(Route::rank)
}

/// Moves students from the largest to the smallest groups until sizes differ
/// by at most one, losing as little satisfaction as possible. A student who
/// cannot go straight to a smallest group may still make room by moving into
/// another group whose own student then moves on.
pub fn repair_sizes(cache: &mut TableCache, condition: &Condition, anomalies: &mut Vec<Anomaly>) -> usize {
    let mut moves = 0;
    'repair: while cache.spread() > 1 {
        let sizes = cache.sizes();
        let (Some(&max), Some(&min)) = (sizes.iter().max(), sizes.iter().min()) else { break };
        let largest = (0..sizes.len()).filter(|&index| sizes[index] == max).collect_vec();
        let smallest = (0..sizes.len()).filter(|&index| sizes[index] == min).collect_vec();
        let table: &TableCache = cache;
        let route = direct_route(table, condition, &largest, &smallest)
            .or_else(|| relayed_route(table, condition, &largest, &smallest));
        let Some(route) = route else {
            Anomaly::BalanceUnreachable { spread: cache.spread() }.record(anomalies);
            break;
        };
        for action in route.moves {
            if let Err(err) = cache.act(action, condition.graph) {
                debug!("size repair stopped: {err}");
                break 'repair;
            }
            moves += 1;
        }
    }
    if moves > 0 {
        debug!("size repair: {moves} moves, sizes {:?}", cache.sizes());
    }
    moves
}
