use serde::Serialize;

use crate::graph::FriendshipGraph;
use crate::model::entity::Id;
use crate::model::group::{Assignment, GroupIndex};

/// One row of the exported sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentOutcome {
    pub id: Id,
    pub group: GroupIndex,
    pub friends: Vec<Id>,
    pub friends_in_group: Vec<Id>,
    pub satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total: usize,
    pub satisfied: usize,
    /// `satisfied / total`, or 0 for an empty assignment.
    pub rate: f64,
    pub group_sizes: Vec<usize>,
    /// Ordered by group, then by id.
    pub students: Vec<StudentOutcome>,
}

impl Metrics {
    /// Reads the final groups; nothing is modified.
    pub fn compute(assignment: &Assignment, graph: &FriendshipGraph) -> Metrics {
        let students: Vec<StudentOutcome> = assignment.groups.iter().enumerate()
            .flat_map(|(index, group)| group.members.iter().map(move |&id| {
                let friends = graph.requests(id).to_vec();
                let friends_in_group: Vec<Id> = friends.iter()
                    .copied()
                    .filter(|friend| group.members.contains(friend))
                    .collect();
                let satisfied = !friends_in_group.is_empty();
                StudentOutcome { id, group: index, friends, friends_in_group, satisfied }
            }))
            .collect();
        let total = students.len();
        let satisfied = students.iter().filter(|student| student.satisfied).count();
        let rate = if total > 0 { satisfied as f64 / total as f64 } else { 0.0 };
        Metrics { total, satisfied, rate, group_sizes: assignment.sizes(), students }
    }

    pub fn percent(&self) -> f64 {
        self.rate * 100.0
    }

    pub fn is_satisfied(&self, id: Id) -> Option<bool> {
        self.students.iter().find(|student| student.id == id).map(|student| student.satisfied)
    }
}
