//! Error taxonomy of the selection and compaction engine
//!
//! Configuration-time problems (`SelectionError`) are fatal: they must be
//! fixed before any event is processed. Topology problems are detected per
//! event and only cause that event to be dropped. Orphaned child references
//! and events rejected by the multiplicity gate are not errors at all, see
//! [`ChildRef::Orphaned`](crate::particle::ChildRef::Orphaned) and
//! [`Decision::Reject`](crate::gate::Decision::Reject).

use crate::{numeric::Float, particle::Species};

use thiserror::Error;

/// Problems with a cut layout or a bitmask request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    /// The layout needs more bits than the cut container has
    #[error(
        "cut layout of {species} overflows: criterion {criterion} needs bits up to {required}, \
         but only {available} are available"
    )]
    LayoutOverflow {
        /// Species whose layout overflows
        species: String,
        /// First criterion that does not fit
        criterion: String,
        /// Number of bits needed up to the end of that criterion
        required: u32,
        /// Number of bits in the cut container
        available: u32,
    },

    /// The thresholds of a criterion are malformed
    #[error("invalid thresholds for criterion {criterion}: {reason}")]
    InvalidThresholds {
        /// Name of the criterion
        criterion: String,
        /// What is wrong with the thresholds
        reason: &'static str,
    },

    /// A criterion selected for variations has no candidate value
    #[error("criterion {criterion} has an empty list of candidate values")]
    EmptyCandidateList {
        /// Name of the criterion
        criterion: String,
    },

    /// A criterion was named twice in one layout or request
    #[error("criterion {criterion} appears more than once")]
    DuplicateCriterion {
        /// Name of the criterion
        criterion: String,
    },

    /// A request named a criterion that the layout does not have
    #[error("unknown criterion {criterion}")]
    UnknownCriterion {
        /// Name that was requested
        criterion: String,
    },

    /// A request picked a value that is not one of the criterion's thresholds
    #[error("{value} is not a threshold of criterion {criterion}")]
    UnknownThreshold {
        /// Name of the criterion
        criterion: String,
        /// Requested threshold
        value: Float,
    },

    /// A record lacks the observable needed to evaluate a criterion
    #[error("no observable provided for criterion {criterion}")]
    MissingObservable {
        /// Name of the criterion
        criterion: String,
    },
}

/// Violations of the positional contract between the upstream producer and
/// the compaction pass
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyViolation {
    /// A parent does not have its daughters at the expected positions
    #[error("{species:?} at position {position} is not preceded by its {expected} daughters")]
    MissingDaughters {
        /// Position of the parent in the event
        position: usize,
        /// Species of the parent
        species: Species,
        /// Number of daughters that should precede it
        expected: usize,
    },

    /// A record has a child list of the wrong size for its species
    #[error("{species:?} at position {position} has {found} child references")]
    ChildArity {
        /// Position of the record in the event
        position: usize,
        /// Species of the record
        species: Species,
        /// Number of child references it carries
        found: usize,
    },

    /// A record references a record that comes after it
    #[error("record at position {position} references later position {target}")]
    ForwardReference {
        /// Position of the referencing record
        position: usize,
        /// Position it references
        target: u32,
    },
}
