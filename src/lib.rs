//! femto_skim: selection bitmasks and derived-table production for
//! femtoscopy analyses
//!
//!
//! # Introduction (for the physicist)
//!
//! Femtoscopic correlation analyses study pairs of particles that come out of
//! the same collision at small relative momentum. The input data is first
//! skimmed by a producer which keeps only the events that contain enough
//! interesting particles, and writes them out in a compact table where each
//! particle carries a bitmask summarizing which selection criteria it passes.
//!
//! Analyses then pick their working point, and any number of systematic
//! variations around it, by requiring a certain bitmask.
//!
//!
//! # Introduction (for the numerical guy)
//!
//! Every selection criterion owns a disjoint range of bits in a fixed-width
//! integer. For criteria where passing a threshold implies passing all looser
//! ones, passing bits are cumulative, so requiring "at least this tight" is a
//! simple subset test on the bitmask.
//!
//!
//! # Introduction (for the computer guy)
//!
//! The program is organized as a pipeline:
//!
//! * describe the cut layout of each species ([`layout`], [`criterion`])
//! * compose the bitmask that an analysis requires ([`bitmask`])
//! * for each event, count the selected particles of each charge hypothesis
//!   and decide whether the event is kept ([`selector`], [`gate`])
//! * compact the kept events into a table where children references point to
//!   rows of the same table ([`derived`])
//! * accumulate the results of event batches, possibly in parallel, and write
//!   them out ([`skim`], [`scheduling`], [`report`])

#![warn(missing_docs)]

pub mod bitmask;
pub mod config;
pub mod criterion;
pub mod derived;
pub mod error;
pub mod gate;
pub mod layout;
pub mod numeric;
pub mod particle;
pub mod random;
pub mod report;
pub mod scheduling;
pub mod selector;
pub mod skim;

/// We'll use eyre's type-erased result type at the application level
pub type Result<T> = eyre::Result<T>;
