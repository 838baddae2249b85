use std::ops::Add;
use thiserror::Error;
use crate::model::{entity::Id, group::GroupIndex};

/// A student and the group they are expected to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub group_index: GroupIndex,
    pub id: Id,
}

impl Position {
    pub fn new(group_index: GroupIndex, id: Id) -> Position {
        Position { group_index, id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Swap(Position, Position),
    Move { from: Position, to: GroupIndex },
    Add { id: Id, group_index: GroupIndex },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("group {0} does not exist")]
    InvalidGroup(GroupIndex),
    #[error("student {id} is not in group {group_index}")]
    NotInGroup { id: Id, group_index: GroupIndex },
    #[error("student {0} is already placed")]
    AlreadyPlaced(Id),
    #[error("source and target are the same group")]
    SameGroup,
}

/// Effect of an action on the number of satisfied students.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    ScoreDiff(isize),
    Violation { diff: isize, pairs: Vec<[Id; 2]> },
    Failed(Vec<ActionError>),
}

impl ActionResult {
    /// The satisfaction change, if the action is legal.
    pub fn feasible_diff(&self) -> Option<isize> {
        match self {
            ActionResult::ScoreDiff(diff) => Some(*diff),
            _ => None,
        }
    }
}

impl Add for ActionResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (ActionResult::Failed(mut err1), ActionResult::Failed(err2)) => {
                err1.extend(err2);
                ActionResult::Failed(err1)
            }
            (failed @ ActionResult::Failed(_), _) | (_, failed @ ActionResult::Failed(_)) => failed,
            (ActionResult::ScoreDiff(s1), ActionResult::ScoreDiff(s2))
                => ActionResult::ScoreDiff(s1 + s2),
            (ActionResult::ScoreDiff(s1), ActionResult::Violation { diff, pairs })
            | (ActionResult::Violation { diff, pairs }, ActionResult::ScoreDiff(s1))
                => ActionResult::Violation { diff: s1 + diff, pairs },
            (ActionResult::Violation { diff: d1, pairs: mut p1 }, ActionResult::Violation { diff: d2, pairs: p2 }) => {
                p1.extend(p2);
                ActionResult::Violation { diff: d1 + d2, pairs: p1 }
            }
        }
    }
}
