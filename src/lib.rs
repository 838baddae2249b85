//! Splits a class into a fixed number of groups so that as many students as
//! possible share a group with at least one friend they asked for.
//!
//! The run is a fixed pipeline: build the friendship graph, cut it into
//! clusters no larger than a group, place clusters greedily, even out group
//! sizes, then improve with single moves and swaps. Exclusion pairs are never
//! put together unless no group could avoid it, and every such case is listed
//! in the [`RunReport`].
//!
//!```
//!use friend_groups::{run, Config, Student};
//!
//!let students = vec![
//!    Student::from_record(1, Some(2), None),
//!    Student::from_record(2, Some(1), None),
//!    Student::from_record(3, Some(4), None),
//!    Student::from_record(4, Some(3), None),
//!];
//!let outcome = run(&students, &[], &Config::new(2)).unwrap();
//!assert_eq!(outcome.metrics.rate, 1.0);
//!assert_eq!(outcome.assignment.sizes(), vec![2, 2]);
//!```

pub mod action;
pub mod assign;
pub mod balance;
pub mod cache;
pub mod cluster;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod model;
mod run;

pub use crate::error::{Anomaly, InputError};
pub use crate::metrics::{Metrics, StudentOutcome};
pub use crate::model::config::{Config, SplitStrategy};
pub use crate::model::entity::{Exclusion, Id, Student};
pub use crate::model::group::{Assignment, Group};
pub use crate::run::{build_constraints, run, Outcome, RunReport};
