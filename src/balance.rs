use log::{debug, info};
use serde::Serialize;

use crate::action::{Action, Position};
use crate::cache::TableCache;
use crate::error::Anomaly;
use crate::model::condition::Condition;
use crate::model::entity::Id;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub max_passes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BalancerStats {
    pub passes: usize,
    pub moves: usize,
    pub swaps: usize,
    pub hit_pass_cap: bool,
}

/// Candidate actions for one unsatisfied student, in scan order: for each
/// requested friend elsewhere, first a plain move into the friend's group,
/// then swaps with that group's members by ascending id.
struct CandidateGenerator<'a> {
    cache: &'a TableCache,
    condition: &'a Condition<'a>,
}

impl<'a> CandidateGenerator<'a> {
    fn unsatisfied(&self) -> impl Iterator<Item = Id> + 'a {
        let cache = self.cache;
        let graph = self.condition.graph;
        graph.nodes().filter(move |&id| !graph.requests(id).is_empty() && !cache.is_satisfied(id, graph))
    }

    fn candidates(&self, student: Id) -> impl Iterator<Item = Action> + 'a {
        let cache = self.cache;
        let home = cache.group_of(student);
        self.condition.graph.requests(student).iter()
            .filter_map(move |&friend| {
                let home = home?;
                let target = cache.group_of(friend)?;
                (target != home).then_some((home, target))
            })
            .flat_map(move |(home, target)| {
                let from = Position::new(home, student);
                std::iter::once(Action::Move { from, to: target }).chain(
                    cache.members(target).iter()
                        .map(move |&other| Action::Swap(from, Position::new(target, other)))
                )
            })
    }

    /// Satisfaction must rise, or stay level while the sizes even out. Sizes
    /// never spread further than one apart (or than they already are).
    fn improves(&self, action: &Action) -> bool {
        let Some(diff) = self.cache.simulate(action, self.condition).feasible_diff() else {
            return false;
        };
        let before = self.cache.spread();
        let after = self.cache.spread_after(action);
        if after > before.max(1) {
            return false;
        }
        diff > 0 || (diff == 0 && after < before)
    }

    fn first_improvement(&self) -> Option<Action> {
        self.unsatisfied()
            .flat_map(|student| self.candidates(student))
            .find(|action| self.improves(action))
    }
}

/// First-improvement local search over single moves and swaps.
pub fn balance(cache: &mut TableCache, condition: &Condition, params: Params, anomalies: &mut Vec<Anomaly>) -> BalancerStats {
    let mut stats = BalancerStats::default();
    let start = cache.satisfied();
    while stats.passes < params.max_passes {
        stats.passes += 1;
        let generator = CandidateGenerator { cache: &*cache, condition };
        let Some(action) = generator.first_improvement() else {
            debug!("balancer converged after {} passes", stats.passes);
            info!("balancer: {start} -> {} satisfied", cache.satisfied());
            return stats;
        };
        let is_swap = matches!(action, Action::Swap(..));
        if let Err(err) = cache.act(action, condition.graph) {
            debug!("balancer stopped after {} passes: {err}", stats.passes);
            info!("balancer: {start} -> {} satisfied", cache.satisfied());
            return stats;
        }
        if is_swap {
            stats.swaps += 1;
        } else {
            stats.moves += 1;
        }
    }
    stats.hit_pass_cap = true;
    Anomaly::BalancerPassLimitReached { passes: stats.passes }.record(anomalies);
    info!("balancer: {start} -> {} satisfied", cache.satisfied());
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FriendshipGraph;
    use crate::model::condition::ConstraintSet;
    use crate::model::entity::Student;
    use crate::model::group::{Assignment, Group};

    fn table(groups: &[&[Id]], graph: &FriendshipGraph) -> TableCache {
        let assignment = Assignment {
            groups: groups.iter().map(|ids| Group { members: ids.iter().copied().collect() }).collect(),
        };
        TableCache::create(&assignment, graph)
    }

    fn pairs() -> FriendshipGraph {
        let students = (1..=4).map(|id| Student::new(id, [if id % 2 == 1 { id + 1 } else { id - 1 }])).collect::<Vec<_>>();
        FriendshipGraph::build(&students, &mut vec![]).unwrap()
    }

    #[test]
    fn swap_reunites_pairs() {
        let graph = pairs();
        let constraints = ConstraintSet::new();
        let condition = Condition { graph: &graph, constraints: &constraints };
        let mut cache = table(&[&[1, 3], &[2, 4]], &graph);
        let mut anomalies = vec![];
        let stats = balance(&mut cache, &condition, Params { max_passes: 100 }, &mut anomalies);
        assert_eq!(cache.satisfied(), 4);
        assert_eq!(cache.spread(), 0);
        assert_eq!(stats.swaps, 1);
        assert_eq!(stats.moves, 0);
        assert!(!stats.hit_pass_cap);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn moves_respect_balance() {
        let graph = pairs();
        let constraints = ConstraintSet::new();
        let condition = Condition { graph: &graph, constraints: &constraints };
        // Moving 2 next to 1 would leave sizes 3 and 1.
        let mut cache = table(&[&[1, 4], &[2, 3]], &graph);
        balance(&mut cache, &condition, Params { max_passes: 100 }, &mut vec![]);
        assert!(cache.spread() <= 1);
        assert_eq!(cache.satisfied(), 4);
    }

    #[test]
    fn moves_fill_an_open_slot() {
        let graph = pairs();
        let constraints = ConstraintSet::new();
        let condition = Condition { graph: &graph, constraints: &constraints };
        let mut cache = table(&[&[1, 3], &[2], &[4]], &graph);
        let stats = balance(&mut cache, &condition, Params { max_passes: 100 }, &mut vec![]);
        assert_eq!(stats.moves, 1);
        assert_eq!(stats.swaps, 0);
        assert_eq!(cache.group_of(1), Some(1));
        // 3 and 4 could only meet by emptying a group.
        assert_eq!(cache.satisfied(), 2);
        assert_eq!(cache.spread(), 1);
    }

    #[test]
    fn level_move_evens_sizes() {
        let students = vec![
            Student::new(1, [4]),
            Student::new(2, [1]),
            Student::new(3, []),
            Student::new(4, []),
            Student::new(5, []),
            Student::new(6, []),
        ];
        let graph = FriendshipGraph::build(&students, &mut vec![]).unwrap();
        let constraints = ConstraintSet::new();
        let condition = Condition { graph: &graph, constraints: &constraints };
        let mut cache = table(&[&[1, 2, 3], &[4], &[5, 6]], &graph);
        assert_eq!(cache.spread(), 2);
        // 1 gains 4 while 2 loses 1: no net gain, but the sizes even out.
        let mut anomalies = vec![];
        let stats = balance(&mut cache, &condition, Params { max_passes: 100 }, &mut anomalies);
        assert_eq!(stats.moves, 1);
        assert_eq!(stats.swaps, 0);
        assert_eq!(cache.group_of(1), Some(1));
        assert_eq!(cache.satisfied(), 1);
        assert_eq!(cache.spread(), 0);
        assert!(!stats.hit_pass_cap);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn constraints_block_improvements() {
        let graph = pairs();
        let mut constraints = ConstraintSet::new();
        constraints.insert(1, 2);
        constraints.insert(3, 4);
        let condition = Condition { graph: &graph, constraints: &constraints };
        let mut cache = table(&[&[1, 3], &[2, 4]], &graph);
        let stats = balance(&mut cache, &condition, Params { max_passes: 100 }, &mut vec![]);
        assert_eq!(cache.satisfied(), 0);
        assert_eq!(stats.passes, 1);
    }

    #[test]
    fn pass_cap_is_reported() {
        let graph = pairs();
        let constraints = ConstraintSet::new();
        let condition = Condition { graph: &graph, constraints: &constraints };
        let mut cache = table(&[&[1, 3], &[2, 4]], &graph);
        let mut anomalies = vec![];
        let stats = balance(&mut cache, &condition, Params { max_passes: 0 }, &mut anomalies);
        assert!(stats.hit_pass_cap);
        assert_eq!(cache.satisfied(), 0);
        assert_eq!(anomalies, vec![Anomaly::BalancerPassLimitReached { passes: 0 }]);
    }
}
