use log::{debug, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::assign::{self, Placements};
use crate::balance::{self, BalancerStats, Params};
use crate::cache::TableCache;
use crate::cluster::{self, Cluster};
use crate::error::{Anomaly, InputError};
use crate::graph::FriendshipGraph;
use crate::metrics::Metrics;
use crate::model::condition::{Condition, ConstraintSet};
use crate::model::config::Config;
use crate::model::entity::{Exclusion, Student};
use crate::model::group::Assignment;

/// Everything that happened on the way to the final groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub anomalies: Vec<Anomaly>,
    /// Initial placement of each student, before repair and balancing.
    pub placements: Placements,
    pub repair_moves: usize,
    pub balancer: BalancerStats,
    /// Which restart produced the result; 0 is the canonical order.
    pub attempt: usize,
}

impl RunReport {
    pub fn degraded_count(&self) -> usize {
        self.placements.values().filter(|placement| placement.is_degraded()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub assignment: Assignment,
    pub metrics: Metrics,
    pub report: RunReport,
}

/// Merges explicit exclusions with each student's forbidden list, dropping
/// pairs that name unknown students or the same student twice.
pub fn build_constraints(
    students: &[Student],
    exclusions: &[Exclusion],
    graph: &FriendshipGraph,
    anomalies: &mut Vec<Anomaly>,
) -> ConstraintSet {
    let pairs = exclusions.iter()
        .map(|exclusion| (exclusion.student_a, exclusion.student_b))
        .chain(students.iter().flat_map(|student| student.forbidden.iter().map(|&other| (student.id, other))));
    let mut constraints = ConstraintSet::new();
    for (a, b) in pairs {
        if a == b {
            Anomaly::SelfConstraint { student: a }.record(anomalies);
        } else if !graph.contains(a) || !graph.contains(b) {
            Anomaly::UnknownConstraintMember { pair: [a, b] }.record(anomalies);
        } else {
            constraints.insert(a, b);
        }
    }
    constraints
}

struct Attempt {
    cache: TableCache,
    report: RunReport,
}

fn attempt(index: usize, clusters: &[Cluster], config: &Config, condition: &Condition) -> Attempt {
    let mut order = clusters.to_vec();
    if index > 0 {
        let mut rng = SmallRng::seed_from_u64(config.seed.wrapping_add(index as u64));
        assign::shuffle_ties(&mut order, &mut rng);
    }
    let mut anomalies = Vec::new();
    let (mut cache, placements) = assign::assign(&order, config.num_groups, condition, &mut anomalies);
    let repair_moves = assign::repair_sizes(&mut cache, condition, &mut anomalies);
    let params = Params { max_passes: config.max_passes };
    let balancer = balance::balance(&mut cache, condition, params, &mut anomalies);
    debug!("attempt {index}: {} satisfied", cache.satisfied());
    Attempt {
        cache,
        report: RunReport { anomalies, placements, repair_moves, balancer, attempt: index },
    }
}

/// Builds groups for `students`. Fails only on invalid input; everything else
/// that could not be honoured is listed in the report.
pub fn run(students: &[Student], exclusions: &[Exclusion], config: &Config) -> Result<Outcome, InputError> {
    config.validate(students.len())?;
    let mut anomalies = Vec::new();
    let graph = FriendshipGraph::build(students, &mut anomalies)?;
    let constraints = build_constraints(students, exclusions, &graph, &mut anomalies);
    let capacity = config.capacity(students.len());
    let mut clusters = cluster::cluster(&graph, capacity, config.split_strategy)?;
    assign::order_clusters(&mut clusters);
    debug!("{} clusters at capacity {capacity}, {} exclusions", clusters.len(), constraints.len());

    let condition = Condition { graph: &graph, constraints: &constraints };
    let mut best: Option<Attempt> = None;
    for index in 0..config.restarts.max(1) {
        let candidate = attempt(index, &clusters, config, &condition);
        let better = best.as_ref().map_or(true, |best| candidate.cache.satisfied() > best.cache.satisfied());
        if better {
            best = Some(candidate);
        }
    }
    let Attempt { cache, report: mut report } = best.unwrap_or_else(|| attempt(0, &clusters, config, &condition));
    anomalies.append(&mut report.anomalies);
    report.anomalies = anomalies;

    let assignment = cache.into_assignment();
    let metrics = Metrics::compute(&assignment, &graph);
    info!(
        "friend success rate: {}/{} students ({:.2}%)",
        metrics.satisfied, metrics.total, metrics.percent(),
    );
    Ok(Outcome { assignment, metrics, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraints_merge_both_sources() {
        let students = vec![Student::new(1, []).forbid(3), Student::new(2, []), Student::new(3, [])];
        let graph = FriendshipGraph::build(&students, &mut vec![]).unwrap();
        let mut anomalies = vec![];
        let exclusions = [Exclusion::new(2, 1), Exclusion::new(2, 2), Exclusion::new(2, 8)];
        let constraints = build_constraints(&students, &exclusions, &graph, &mut anomalies);
        assert_eq!(constraints.pairs().collect::<Vec<_>>(), vec![[1, 2], [1, 3]]);
        assert_eq!(anomalies, vec![
            Anomaly::SelfConstraint { student: 2 },
            Anomaly::UnknownConstraintMember { pair: [2, 8] },
        ]);
    }

    #[test]
    fn zero_groups_fail_before_anything_runs() {
        let students = vec![Student::new(1, [])];
        assert_eq!(run(&students, &[], &Config::new(0)), Err(InputError::NoGroups));
        assert_eq!(run(&[], &[], &Config::new(2)), Err(InputError::NoStudents));
    }

    #[test]
    fn restarts_never_do_worse() {
        let students: Vec<Student> = (1..=12)
            .map(|id| Student::new(id, [(id * 5) % 12 + 1, (id * 7) % 12 + 1]))
            .collect();
        let single = run(&students, &[], &Config::new(3)).unwrap();
        let many = run(&students, &[], &Config::new(3).with_restarts(8, 42)).unwrap();
        assert!(many.metrics.satisfied >= single.metrics.satisfied);
        assert_eq!(many, run(&students, &[], &Config::new(3).with_restarts(8, 42)).unwrap());
    }
}
