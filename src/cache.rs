use std::collections::{BTreeMap, BTreeSet};

use crate::action::{Action, ActionError, ActionResult, Position};
use crate::graph::FriendshipGraph;
use crate::model::condition::Condition;
use crate::model::entity::Id;
use crate::model::group::{self, Assignment, Group, GroupIndex};


fn count_satisfied(members: &BTreeSet<Id>, graph: &FriendshipGraph) -> usize {
    members.iter().filter(|&&id| graph.is_satisfied_in(id, members)).count()
}

fn diff(after: usize, before: usize) -> isize {
    after as isize - before as isize
}

/// One group's members and how many of them currently have a friend inside.
#[derive(Debug, Clone)]
struct GroupCache {
    index: GroupIndex,
    members: BTreeSet<Id>,
    satisfied: usize,
}

impl GroupCache {
    fn create(index: GroupIndex, members: BTreeSet<Id>, graph: &FriendshipGraph) -> GroupCache {
        let satisfied = count_satisfied(&members, graph);
        GroupCache { index, members, satisfied }
    }

    fn violations(&self, incoming: Id, outgoing: Option<Id>, condition: &Condition) -> Vec<[Id; 2]> {
        condition.constraints.conflicts(incoming, &self.members)
            .filter(|other| Some(*other) != outgoing)
            .map(|other| [incoming.min(other), incoming.max(other)])
            .collect()
    }

    fn judge(&self, members: &BTreeSet<Id>, violations: Vec<[Id; 2]>, condition: &Condition) -> ActionResult {
        let diff = diff(count_satisfied(members, condition.graph), self.satisfied);
        if violations.is_empty() {
            ActionResult::ScoreDiff(diff)
        } else {
            ActionResult::Violation { diff, pairs: violations }
        }
    }

    fn missing(&self, id: Id) -> Option<ActionError> {
        (!self.members.contains(&id)).then_some(ActionError::NotInGroup { id, group_index: self.index })
    }

    fn simulate_add(&self, id: Id, condition: &Condition) -> ActionResult {
        let mut members = self.members.clone();
        members.insert(id);
        self.judge(&members, self.violations(id, None, condition), condition)
    }

    fn simulate_remove(&self, id: Id, condition: &Condition) -> ActionResult {
        if let Some(err) = self.missing(id) {
            return ActionResult::Failed(vec![err]);
        }
        let mut members = self.members.clone();
        members.remove(&id);
        self.judge(&members, vec![], condition)
    }

    fn simulate_swap(&self, outgoing: Id, incoming: Id, condition: &Condition) -> ActionResult {
        if let Some(err) = self.missing(outgoing) {
            return ActionResult::Failed(vec![err]);
        }
        let mut members = self.members.clone();
        members.remove(&outgoing);
        members.insert(incoming);
        self.judge(&members, self.violations(incoming, Some(outgoing), condition), condition)
    }

    fn add(&mut self, id: Id, graph: &FriendshipGraph) {
        self.members.insert(id);
        self.satisfied = count_satisfied(&self.members, graph);
    }

    fn remove(&mut self, id: Id, graph: &FriendshipGraph) -> Result<(), ActionError> {
        if let Some(err) = self.missing(id) {
            return Err(err);
        }
        self.members.remove(&id);
        self.satisfied = count_satisfied(&self.members, graph);
        Ok(())
    }

    fn swap(&mut self, outgoing: Id, incoming: Id, graph: &FriendshipGraph) -> Result<(), ActionError> {
        if let Some(err) = self.missing(outgoing) {
            return Err(err);
        }
        self.members.remove(&outgoing);
        self.members.insert(incoming);
        self.satisfied = count_satisfied(&self.members, graph);
        Ok(())
    }
}

/// Working copy of the group mapping with a student index and running
/// satisfaction count. Owned by one stage at a time.
#[derive(Debug, Clone)]
pub struct TableCache {
    groups: Vec<GroupCache>,
    group_of: BTreeMap<Id, GroupIndex>,
    satisfied: usize,
}

impl TableCache {
    pub fn empty(num_groups: usize) -> TableCache {
        let groups = (0..num_groups)
            .map(|index| GroupCache { index, members: BTreeSet::new(), satisfied: 0 })
            .collect();
        TableCache { groups, group_of: BTreeMap::new(), satisfied: 0 }
    }

    pub fn create(assignment: &Assignment, graph: &FriendshipGraph) -> TableCache {
        let groups: Vec<GroupCache> = assignment.groups.iter().enumerate()
            .map(|(index, group)| GroupCache::create(index, group.members.clone(), graph))
            .collect();
        let group_of = groups.iter()
            .flat_map(|group| group.members.iter().map(move |id| (*id, group.index)))
            .collect();
        let satisfied = groups.iter().map(|group| group.satisfied).sum();
        TableCache { groups, group_of, satisfied }
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn satisfied(&self) -> usize {
        self.satisfied
    }

    pub fn group_of(&self, id: Id) -> Option<GroupIndex> {
        self.group_of.get(&id).copied()
    }

    pub fn members(&self, group_index: GroupIndex) -> &BTreeSet<Id> {
        &self.groups[group_index].members
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.groups.iter().map(|group| group.members.len()).collect()
    }

    pub fn spread(&self) -> usize {
        group::spread(&self.sizes())
    }

    /// Whether `id` has a requested friend in their current group.
    pub fn is_satisfied(&self, id: Id, graph: &FriendshipGraph) -> bool {
        self.group_of(id).map_or(false, |index| graph.is_satisfied_in(id, self.members(index)))
    }

    fn get_group(&self, group_index: GroupIndex) -> Result<&GroupCache, ActionError> {
        self.groups.get(group_index).ok_or(ActionError::InvalidGroup(group_index))
    }

    fn get_mut_group(&mut self, group_index: GroupIndex) -> Result<&mut GroupCache, ActionError> {
        self.groups.get_mut(group_index).ok_or(ActionError::InvalidGroup(group_index))
    }

    /// Size spread the table would have after `action`.
    pub fn spread_after(&self, action: &Action) -> usize {
        let mut sizes = self.sizes();
        match action {
            Action::Swap(..) => {}
            Action::Move { from, to } => {
                if from.group_index < sizes.len() && *to < sizes.len() {
                    sizes[from.group_index] -= 1;
                    sizes[*to] += 1;
                }
            }
            Action::Add { group_index, .. } => {
                if let Some(size) = sizes.get_mut(*group_index) {
                    *size += 1;
                }
            }
        }
        group::spread(&sizes)
    }

    pub fn simulate(&self, action: &Action, condition: &Condition) -> ActionResult {
        match self.check(action) {
            Err(err) => ActionResult::Failed(vec![err]),
            Ok(()) => match action {
                Action::Add { id, group_index } => {
                    self.groups[*group_index].simulate_add(*id, condition)
                }
                Action::Move { from, to } => {
                    self.groups[from.group_index].simulate_remove(from.id, condition)
                        + self.groups[*to].simulate_add(from.id, condition)
                }
                Action::Swap(position1, position2) => {
                    self.groups[position1.group_index].simulate_swap(position1.id, position2.id, condition)
                        + self.groups[position2.group_index].simulate_swap(position2.id, position1.id, condition)
                }
            },
        }
    }

    fn check(&self, action: &Action) -> Result<(), ActionError> {
        match action {
            Action::Add { id, group_index } => {
                self.get_group(*group_index)?;
                match self.group_of(*id) {
                    Some(_) => Err(ActionError::AlreadyPlaced(*id)),
                    None => Ok(()),
                }
            }
            Action::Move { from, to } => {
                self.check_position(from)?;
                self.get_group(*to)?;
                if from.group_index == *to {
                    return Err(ActionError::SameGroup);
                }
                Ok(())
            }
            Action::Swap(position1, position2) => {
                self.check_position(position1)?;
                self.check_position(position2)?;
                if position1.group_index == position2.group_index {
                    return Err(ActionError::SameGroup);
                }
                Ok(())
            }
        }
    }

    fn check_position(&self, position: &Position) -> Result<(), ActionError> {
        self.get_group(position.group_index)?;
        match self.group_of(position.id) {
            Some(index) if index == position.group_index => Ok(()),
            _ => Err(ActionError::NotInGroup { id: position.id, group_index: position.group_index }),
        }
    }

    /// Applies `action`. Constraint violations are not rejected here; callers
    /// decide whether to simulate first.
    pub fn act(&mut self, action: Action, graph: &FriendshipGraph) -> Result<(), ActionError> {
        self.check(&action)?;
        match action {
            Action::Add { id, group_index } => {
                let group = self.get_mut_group(group_index)?;
                let before = group.satisfied;
                group.add(id, graph);
                let after = group.satisfied;
                self.group_of.insert(id, group_index);
                self.satisfied = self.satisfied + after - before;
            }
            Action::Move { from, to } => {
                let mut score = self.satisfied as isize;
                let group_from = self.get_mut_group(from.group_index)?;
                score -= group_from.satisfied as isize;
                group_from.remove(from.id, graph)?;
                score += group_from.satisfied as isize;
                let group_to = self.get_mut_group(to)?;
                score -= group_to.satisfied as isize;
                group_to.add(from.id, graph);
                score += group_to.satisfied as isize;
                self.group_of.insert(from.id, to);
                self.satisfied = score as usize;
            }
            Action::Swap(position1, position2) => {
                let mut score = self.satisfied as isize;
                let group1 = self.get_mut_group(position1.group_index)?;
                score -= group1.satisfied as isize;
                group1.swap(position1.id, position2.id, graph)?;
                score += group1.satisfied as isize;
                let group2 = self.get_mut_group(position2.group_index)?;
                score -= group2.satisfied as isize;
                group2.swap(position2.id, position1.id, graph)?;
                score += group2.satisfied as isize;
                self.group_of.insert(position1.id, position2.group_index);
                self.group_of.insert(position2.id, position1.group_index);
                self.satisfied = score as usize;
            }
        }
        Ok(())
    }

    pub fn into_assignment(self) -> Assignment {
        Assignment {
            groups: self.groups.into_iter().map(|group| Group { members: group.members }).collect(),
        }
    }
}
