use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::model::entity::Id;

/// Problems with the input that stop a run before any group is built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("number of groups must be at least 1")]
    NoGroups,
    #[error("student set is empty")]
    NoStudents,
    #[error("group capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
    #[error("student {0} appears more than once")]
    DuplicateStudent(Id),
}

/// Things that went less than ideally during a successful run.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum Anomaly {
    #[error("student {student} names unknown friend {friend}, ignored")]
    UnresolvedFriendReference { student: Id, friend: Id },
    #[error("student {student} names themselves as a friend, ignored")]
    SelfFriendReference { student: Id },
    #[error("exclusion {pair:?} names a student outside the population, ignored")]
    UnknownConstraintMember { pair: [Id; 2] },
    #[error("student {student} is excluded from themselves, ignored")]
    SelfConstraint { student: Id },
    #[error("cluster {students:?} could not be placed whole, split across groups (forced pairs: {forced:?})")]
    InfeasibleConstraint { students: Vec<Id>, forced: Vec<[Id; 2]> },
    #[error("group sizes still differ by {spread} after repair")]
    BalanceUnreachable { spread: usize },
    #[error("balancer stopped at the pass cap of {passes}")]
    BalancerPassLimitReached { passes: usize },
}

impl Anomaly {
    /// Logs the anomaly and appends it to `anomalies`.
    pub fn record(self, anomalies: &mut Vec<Anomaly>) {
        warn!("{self}");
        anomalies.push(self);
    }

    /// Whether this anomaly excuses `pair` sharing a group.
    pub fn excuses_pair(&self, pair: [Id; 2]) -> bool {
        let [a, b] = pair;
        match self {
            Anomaly::InfeasibleConstraint { forced, .. } => {
                forced.iter().any(|p| *p == [a, b] || *p == [b, a])
            }
            _ => false,
        }
    }
}
