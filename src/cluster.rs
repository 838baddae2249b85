use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;
use serde::Serialize;

use crate::error::InputError;
use crate::graph::FriendshipGraph;
use crate::model::config::SplitStrategy;
use crate::model::entity::Id;

/// A connected placement unit no larger than the group capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub members: BTreeSet<Id>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn lowest(&self) -> Option<Id> {
        self.members.first().copied()
    }

    /// Number of friendship edges with both ends inside the cluster.
    pub fn internal_edges(&self, graph: &FriendshipGraph) -> usize {
        self.members.iter()
            .map(|&id| graph.neighbors(id).filter(|n| self.members.contains(n)).count())
            .sum::<usize>() / 2
    }
}

/// Connected components, each sorted, ordered by their lowest id.
pub fn components(graph: &FriendshipGraph) -> Vec<BTreeSet<Id>> {
    let mut seen = BTreeSet::new();
    let mut components = Vec::new();
    for start in graph.nodes() {
        if !seen.insert(start) {
            continue;
        }
        let mut component = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            for neighbor in graph.neighbors(id) {
                if seen.insert(neighbor) {
                    component.insert(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Covers every student with clusters of at most `capacity` members.
pub fn cluster(graph: &FriendshipGraph, capacity: usize, strategy: SplitStrategy) -> Result<Vec<Cluster>, InputError> {
    if capacity == 0 {
        return Err(InputError::InvalidCapacity(capacity));
    }
    if graph.is_empty() {
        return Err(InputError::NoStudents);
    }
    let mut clusters = Vec::new();
    for component in components(graph) {
        if component.len() <= capacity {
            clusters.push(Cluster { members: component });
        } else {
            debug!("splitting component of {} students (capacity {capacity})", component.len());
            clusters.extend(split(graph, component, capacity, strategy));
        }
    }
    Ok(clusters)
}

/// Cuts one oversized component into connected pieces of at most `capacity`.
pub fn split(graph: &FriendshipGraph, mut remaining: BTreeSet<Id>, capacity: usize, strategy: SplitStrategy) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    while let Some(seed) = remaining.pop_first() {
        let members = match strategy {
            SplitStrategy::MostEdges => grow_most_edges(graph, seed, &mut remaining, capacity),
            SplitStrategy::BreadthFirst => grow_breadth_first(graph, seed, &mut remaining, capacity),
        };
        clusters.push(Cluster { members });
    }
    clusters
}

fn grow_most_edges(graph: &FriendshipGraph, seed: Id, remaining: &mut BTreeSet<Id>, capacity: usize) -> BTreeSet<Id> {
    let mut members = BTreeSet::from([seed]);
    // frontier student -> edges into the growing cluster
    let mut links: BTreeMap<Id, usize> = BTreeMap::new();
    let absorb = |id: Id, links: &mut BTreeMap<Id, usize>, remaining: &BTreeSet<Id>| {
        for neighbor in graph.neighbors(id).filter(|n| remaining.contains(n)) {
            *links.entry(neighbor).or_insert(0) += 1;
        }
    };
    absorb(seed, &mut links, remaining);
    while members.len() < capacity {
        let next = links.iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(id, _)| *id);
        let Some(next) = next else { break };
        links.remove(&next);
        remaining.remove(&next);
        members.insert(next);
        absorb(next, &mut links, remaining);
    }
    members
}

fn grow_breadth_first(graph: &FriendshipGraph, seed: Id, remaining: &mut BTreeSet<Id>, capacity: usize) -> BTreeSet<Id> {
    let mut members = BTreeSet::from([seed]);
    let mut queue = VecDeque::from([seed]);
    while let Some(id) = queue.pop_front() {
        for neighbor in graph.neighbors(id) {
            if members.len() == capacity {
                return members;
            }
            if remaining.remove(&neighbor) {
                members.insert(neighbor);
                queue.push_back(neighbor);
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::Student;

    fn graph(students: &[Student]) -> FriendshipGraph {
        FriendshipGraph::build(students, &mut vec![]).unwrap()
    }

    fn chain(n: u32) -> FriendshipGraph {
        graph(&(1..=n).map(|id| Student::new(id, (id < n).then_some(id + 1))).collect::<Vec<_>>())
    }

    #[test]
    fn components_are_found() {
        let g = graph(&[
            Student::new(1, [2]), Student::new(2, []), Student::new(3, []),
            Student::new(4, [5]), Student::new(5, [3]),
        ]);
        assert_eq!(components(&g), vec![BTreeSet::from([1, 2]), BTreeSet::from([3, 4, 5])]);
    }

    #[test]
    fn small_components_stay_whole() {
        let clusters = cluster(&chain(3), 3, SplitStrategy::MostEdges).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].internal_edges(&chain(3)), 2);
    }

    #[test]
    fn chain_splits_into_pairs() {
        let g = chain(4);
        for strategy in [SplitStrategy::MostEdges, SplitStrategy::BreadthFirst] {
            let clusters = cluster(&g, 2, strategy).unwrap();
            let members: Vec<Vec<Id>> = clusters.iter().map(|c| c.members.iter().copied().collect()).collect();
            assert_eq!(members, vec![vec![1, 2], vec![3, 4]]);
            assert!(clusters.iter().all(|c| c.internal_edges(&g) == 1));
        }
    }

    #[test]
    fn most_edges_prefers_dense_neighbors() {
        // 1 knows 2, 3 and 4; 2 and 4 also know each other.
        let g = graph(&[
            Student::new(1, [2, 3]), Student::new(2, [4]), Student::new(3, []), Student::new(4, [1]),
        ]);
        let clusters = cluster(&g, 3, SplitStrategy::MostEdges).unwrap();
        assert_eq!(clusters[0].members, BTreeSet::from([1, 2, 4]));
        assert_eq!(clusters[0].internal_edges(&g), 3);
        assert_eq!(clusters[1].members, BTreeSet::from([3]));

        let clusters = cluster(&g, 3, SplitStrategy::BreadthFirst).unwrap();
        assert_eq!(clusters[0].members, BTreeSet::from([1, 2, 3]));
        assert_eq!(clusters[1].members, BTreeSet::from([4]));
    }

    #[test]
    fn every_student_is_covered_once() {
        let g = graph(&(1..=10).map(|id| Student::new(id, [id % 10 + 1, (id + 4) % 10 + 1])).collect::<Vec<_>>());
        let clusters = cluster(&g, 3, SplitStrategy::MostEdges).unwrap();
        let mut seen: Vec<Id> = clusters.iter().flat_map(|c| c.members.iter().copied()).collect();
        assert!(clusters.iter().all(|c| c.len() <= 3 && !c.is_empty()));
        seen.sort();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(cluster(&chain(2), 0, SplitStrategy::MostEdges), Err(InputError::InvalidCapacity(0)));
        assert_eq!(cluster(&FriendshipGraph::default(), 2, SplitStrategy::MostEdges), Err(InputError::NoStudents));
    }
}
