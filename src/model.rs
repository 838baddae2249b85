pub mod entity {
    use std::collections::BTreeSet;
    use serde::{Deserialize, Serialize};

    pub type Id = u32;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Student {
        pub id: Id,
        /// Requested friends in preference order. Records carry at most two.
        #[serde(default)]
        pub friends: Vec<Id>,
        /// Students this one must never share a group with.
        #[serde(default)]
        pub forbidden: BTreeSet<Id>,
    }

    impl Student {
        pub fn new(id: Id, friends: impl IntoIterator<Item = Id>) -> Student {
            Student { id, friends: friends.into_iter().collect(), forbidden: BTreeSet::new() }
        }

        /// Builds a student from the `{student_id, friend1?, friend2?}` record shape.
        pub fn from_record(id: Id, friend1: Option<Id>, friend2: Option<Id>) -> Student {
            Student::new(id, friend1.into_iter().chain(friend2))
        }

        pub fn forbid(mut self, other: Id) -> Student {
            self.forbidden.insert(other);
            self
        }
    }

    /// An unordered pair of students that must never share a group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Exclusion {
        pub student_a: Id,
        pub student_b: Id,
    }

    impl Exclusion {
        pub fn new(student_a: Id, student_b: Id) -> Exclusion {
            Exclusion { student_a, student_b }
        }
    }
}


pub mod group {
    use std::collections::BTreeSet;
    use serde::{Deserialize, Serialize};
    use super::entity::Id;

    pub type GroupIndex = usize;

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Group {
        pub members: BTreeSet<Id>,
    }

    impl Group {
        pub fn len(&self) -> usize {
            self.members.len()
        }

        pub fn is_empty(&self) -> bool {
            self.members.is_empty()
        }
    }

    /// Final mapping from group index `0..G` to its members.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Assignment {
        pub groups: Vec<Group>,
    }

    impl Assignment {
        pub fn empty(num_groups: usize) -> Assignment {
            Assignment { groups: vec![Group::default(); num_groups] }
        }

        pub fn sizes(&self) -> Vec<usize> {
            self.groups.iter().map(Group::len).collect()
        }

        /// Difference between the largest and the smallest group.
        pub fn spread(&self) -> usize {
            spread(&self.sizes())
        }

        pub fn group_of(&self, id: Id) -> Option<GroupIndex> {
            self.groups.iter().position(|group| group.members.contains(&id))
        }

        pub fn student_count(&self) -> usize {
            self.groups.iter().map(Group::len).sum()
        }
    }

    pub fn spread(sizes: &[usize]) -> usize {
        match (sizes.iter().max(), sizes.iter().min()) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        }
    }
}

pub mod condition {
    use std::collections::{BTreeMap, BTreeSet};
    use super::entity::Id;
    use crate::graph::FriendshipGraph;

    /// What a placement is judged against: whose friends count, and who may not meet.
    #[derive(Debug, Clone, Copy)]
    pub struct Condition<'a> {
        pub graph: &'a FriendshipGraph,
        pub constraints: &'a ConstraintSet,
    }

    /// Symmetric set of exclusion pairs, indexed by student.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct ConstraintSet {
        forbidden: BTreeMap<Id, BTreeSet<Id>>,
    }

    impl ConstraintSet {
        pub fn new() -> ConstraintSet {
            ConstraintSet::default()
        }

        /// Returns false for self-pairs, which are never stored.
        pub fn insert(&mut self, a: Id, b: Id) -> bool {
            if a == b {
                return false;
            }
            self.forbidden.entry(a).or_default().insert(b);
            self.forbidden.entry(b).or_default().insert(a)
        }

        pub fn contains_pair(&self, [a, b]: [Id; 2]) -> bool {
            self.forbidden.get(&a).map_or(false, |others| others.contains(&b))
        }

        pub fn forbidden_for(&self, id: Id) -> impl Iterator<Item = Id> + '_ {
            self.forbidden.get(&id).into_iter().flatten().copied()
        }

        /// Members of `group` that `id` may not join.
        pub fn conflicts<'a>(&'a self, id: Id, group: &'a BTreeSet<Id>) -> impl Iterator<Item = Id> + 'a {
            self.forbidden_for(id).filter(move |other| group.contains(other))
        }

        /// Every stored pair once, as `[low, high]`, in ascending order.
        pub fn pairs(&self) -> impl Iterator<Item = [Id; 2]> + '_ {
            self.forbidden.iter().flat_map(|(a, others)| {
                others.iter().filter(move |b| a < *b).map(move |b| [*a, *b])
            })
        }

        pub fn len(&self) -> usize {
            self.pairs().count()
        }

        pub fn is_empty(&self) -> bool {
            self.forbidden.is_empty()
        }
    }
}

pub mod config {
    use serde::{Deserialize, Serialize};
    use crate::error::InputError;

    pub const DEFAULT_MAX_PASSES: usize = 1_000;

    /// How an oversized friendship component is cut into clusters.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SplitStrategy {
        /// Grow from the seed, always taking the frontier student with the most
        /// edges into the cluster; ties go to the lowest id.
        #[default]
        MostEdges,
        /// Plain breadth-first order from the seed.
        BreadthFirst,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Config {
        pub num_groups: usize,
        #[serde(default)]
        pub group_capacity_override: Option<usize>,
        #[serde(default = "default_max_passes")]
        pub max_passes: usize,
        #[serde(default)]
        pub split_strategy: SplitStrategy,
        #[serde(default = "default_restarts")]
        pub restarts: usize,
        #[serde(default)]
        pub seed: u64,
    }

    fn default_max_passes() -> usize {
        DEFAULT_MAX_PASSES
    }

    fn default_restarts() -> usize {
        1
    }

    impl Config {
        pub fn new(num_groups: usize) -> Config {
            Config {
                num_groups,
                group_capacity_override: None,
                max_passes: DEFAULT_MAX_PASSES,
                split_strategy: SplitStrategy::default(),
                restarts: default_restarts(),
                seed: 0,
            }
        }

        pub fn with_capacity(mut self, capacity: usize) -> Config {
            self.group_capacity_override = Some(capacity);
            self
        }

        pub fn with_max_passes(mut self, max_passes: usize) -> Config {
            self.max_passes = max_passes;
            self
        }

        pub fn with_split_strategy(mut self, split_strategy: SplitStrategy) -> Config {
            self.split_strategy = split_strategy;
            self
        }

        pub fn with_restarts(mut self, restarts: usize, seed: u64) -> Config {
            self.restarts = restarts;
            self.seed = seed;
            self
        }

        pub fn validate(&self, student_count: usize) -> Result<(), InputError> {
            if self.num_groups == 0 {
                return Err(InputError::NoGroups);
            }
            if student_count == 0 {
                return Err(InputError::NoStudents);
            }
            if let Some(capacity) = self.group_capacity_override {
                if capacity < 1 {
                    return Err(InputError::InvalidCapacity(capacity));
                }
            }
            Ok(())
        }

        /// Cluster size limit: the override, or `ceil(student_count / num_groups)`.
        pub fn capacity(&self, student_count: usize) -> usize {
            self.group_capacity_override
                .unwrap_or_else(|| student_count.div_ceil(self.num_groups.max(1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::condition::ConstraintSet;
    use super::config::{Config, SplitStrategy};
    use super::entity::Student;
    use super::group::{Assignment, Group};
    use crate::error::InputError;

    #[test]
    fn record_drops_missing_friends() {
        assert_eq!(Student::from_record(1, None, Some(3)).friends, vec![3]);
        assert_eq!(Student::from_record(1, Some(2), Some(3)).friends, vec![2, 3]);
        assert!(Student::from_record(1, None, None).friends.is_empty());
    }

    #[test]
    fn constraints_are_symmetric() {
        let mut constraints = ConstraintSet::new();
        assert!(constraints.insert(4, 2));
        assert!(!constraints.insert(2, 4));
        assert!(!constraints.insert(3, 3));
        assert!(constraints.contains_pair([2, 4]));
        assert!(constraints.contains_pair([4, 2]));
        assert!(!constraints.contains_pair([3, 3]));
        assert_eq!(constraints.pairs().collect::<Vec<_>>(), vec![[2, 4]]);
    }

    #[test]
    fn capacity_rounds_up() {
        assert_eq!(Config::new(3).capacity(10), 4);
        assert_eq!(Config::new(2).capacity(6), 3);
        assert_eq!(Config::new(2).with_capacity(5).capacity(6), 5);
    }

    #[test]
    fn validation_rejects_bad_configs() {
        assert_eq!(Config::new(0).validate(4), Err(InputError::NoGroups));
        assert_eq!(Config::new(2).validate(0), Err(InputError::NoStudents));
        assert_eq!(Config::new(2).with_capacity(0).validate(4), Err(InputError::InvalidCapacity(0)));
        assert_eq!(Config::new(2).validate(4), Ok(()));
    }

    #[test]
    fn config_defaults_from_json() {
        let config: Config = serde_json::from_str(r#"{"num_groups": 9}"#).unwrap();
        assert_eq!(config, Config::new(9));
        let config: Config = serde_json::from_str(
            r#"{"num_groups": 2, "group_capacity_override": 4, "split_strategy": "breadth_first"}"#,
        ).unwrap();
        assert_eq!(config.group_capacity_override, Some(4));
        assert_eq!(config.split_strategy, SplitStrategy::BreadthFirst);
    }

    #[test]
    fn spread_of_assignment() {
        let mut assignment = Assignment::empty(3);
        assignment.groups[0] = Group { members: [1, 2, 3].into() };
        assignment.groups[1] = Group { members: [4].into() };
        assert_eq!(assignment.spread(), 3);
        assert_eq!(assignment.group_of(4), Some(1));
        assert_eq!(assignment.group_of(9), None);
        assert_eq!(assignment.student_count(), 4);
    }
}
