use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{Anomaly, InputError};
use crate::model::entity::{Id, Student};

/// Undirected friendship graph plus the directed requests it came from.
///
/// Edges drive clustering. Requests decide who counts as satisfied: a student
/// is satisfied by their own friends, not by whoever named them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FriendshipGraph {
    adjacency: BTreeMap<Id, BTreeSet<Id>>,
    requests: BTreeMap<Id, Vec<Id>>,
}

impl FriendshipGraph {
    pub fn build(students: &[Student], anomalies: &mut Vec<Anomaly>) -> Result<FriendshipGraph, InputError> {
        let mut graph = FriendshipGraph::default();
        for student in students {
            if graph.adjacency.insert(student.id, BTreeSet::new()).is_some() {
                return Err(InputError::DuplicateStudent(student.id));
            }
            graph.requests.insert(student.id, Vec::new());
        }
        for student in students {
            for &friend in &student.friends {
                if friend == student.id {
                    Anomaly::SelfFriendReference { student: student.id }.record(anomalies);
                } else if !graph.adjacency.contains_key(&friend) {
                    Anomaly::UnresolvedFriendReference { student: student.id, friend }.record(anomalies);
                } else {
                    graph.add_request(student.id, friend);
                }
            }
        }
        debug!("friendship graph: {} students, {} edges", graph.len(), graph.edge_count());
        Ok(graph)
    }

    fn add_request(&mut self, from: Id, to: Id) {
        let requests = self.requests.entry(from).or_default();
        if !requests.contains(&to) {
            requests.push(to);
        }
        self.adjacency.entry(from).or_default().insert(to);
        self.adjacency.entry(to).or_default().insert(from);
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn contains(&self, id: Id) -> bool {
        self.adjacency.contains_key(&id)
    }

    /// Student ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = Id> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn neighbors(&self, id: Id) -> impl Iterator<Item = Id> + '_ {
        self.adjacency.get(&id).into_iter().flatten().copied()
    }

    pub fn has_edge(&self, a: Id, b: Id) -> bool {
        self.adjacency.get(&a).map_or(false, |neighbors| neighbors.contains(&b))
    }

    /// Resolved friend requests of `id`, in the order they were given.
    pub fn requests(&self, id: Id) -> &[Id] {
        self.requests.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `id` has a requested friend inside `members`.
    pub fn is_satisfied_in(&self, id: Id, members: &BTreeSet<Id>) -> bool {
        self.requests(id).iter().any(|friend| members.contains(friend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_undirected_and_deduplicated() {
        let students = vec![Student::new(1, [2]), Student::new(2, [1]), Student::new(3, [1, 1])];
        let graph = FriendshipGraph::build(&students, &mut vec![]).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.has_edge(2, 1));
        assert!(graph.has_edge(1, 3));
        assert_eq!(graph.requests(3), &[1]);
    }

    #[test]
    fn edge_set_ignores_input_order() {
        let students = vec![Student::new(1, [2]), Student::new(2, [3]), Student::new(3, [])];
        let mut reversed = students.clone();
        reversed.reverse();
        let a = FriendshipGraph::build(&students, &mut vec![]).unwrap();
        let b = FriendshipGraph::build(&reversed, &mut vec![]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_references_become_anomalies() {
        let students = vec![Student::new(1, [1, 7]), Student::new(2, [])];
        let mut anomalies = vec![];
        let graph = FriendshipGraph::build(&students, &mut anomalies).unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(anomalies, vec![
            Anomaly::SelfFriendReference { student: 1 },
            Anomaly::UnresolvedFriendReference { student: 1, friend: 7 },
        ]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let students = vec![Student::new(1, []), Student::new(1, [])];
        assert_eq!(
            FriendshipGraph::build(&students, &mut vec![]),
            Err(InputError::DuplicateStudent(1)),
        );
    }
}
