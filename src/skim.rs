//! Processing of whole events: multiplicity gate, then compaction, and
//! accumulation of the results

use crate::{
    config::SkimConfig,
    derived::{DerivedTableBuilder, DerivedTables, EventSkim},
    error::TopologyViolation,
    gate::{Decision, EventAggregate, EventGate},
    particle::Event,
};

/// What happened to one event
#[derive(Clone, Debug, PartialEq)]
pub enum EventOutcome {
    /// The event passed the gate and was compacted
    Accepted(EventSkim),

    /// The event did not pass the multiplicity gate
    Rejected(EventAggregate),

    /// The event passed the gate, but its records do not follow the expected
    /// topology, so it was dropped
    Malformed(TopologyViolation),
}

/// Event processor
pub struct Skimmer<'cfg> {
    gate: EventGate<'cfg>,
    builder: DerivedTableBuilder<'cfg>,
}
//
impl<'cfg> Skimmer<'cfg> {
    /// Set up event processing
    pub fn new(cfg: &'cfg SkimConfig) -> Self {
        Self {
            gate: EventGate::new(&cfg.tracks, &cfg.secondaries, &cfg.min),
            builder: DerivedTableBuilder::new(&cfg.secondaries),
        }
    }

    /// Process one event
    pub fn process(&self, event: &Event) -> EventOutcome {
        // Count selected particles first, nothing is written for events that
        // fail the multiplicity requirement
        let (aggregate, decision) = self.gate.decide(event);
        match decision {
            Decision::Reject => {
                tracing::debug!(?aggregate, "event rejected by the multiplicity gate");
                EventOutcome::Rejected(aggregate)
            }
            // Accepted events are compacted whole, or dropped whole if their
            // records do not follow the expected layout
            Decision::Accept => match self.builder.build(&event.collision, &event.particles) {
                Ok(skim) => {
                    tracing::debug!(?aggregate, rows = skim.particles.len(), "event accepted");
                    EventOutcome::Accepted(skim)
                }
                Err(violation) => {
                    tracing::warn!(%violation, "dropping event with broken topology");
                    EventOutcome::Malformed(violation)
                }
            },
        }
    }

    /// Process a batch of events, in order
    pub fn process_all<'ev>(&self, events: impl IntoIterator<Item = &'ev Event>) -> SkimResults {
        let mut results = SkimResults::default();
        for event in events {
            results.integrate(self.process(event));
        }
        results
    }
}

/// Event counters of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkimStatistics {
    /// Number of events seen
    pub processed: usize,

    /// Number of events written out
    pub accepted: usize,

    /// Number of events rejected by the gate
    pub rejected: usize,

    /// Number of events dropped because of a topology violation
    pub malformed: usize,

    /// Number of child references which could not be resolved
    pub orphaned: usize,
}
//
impl SkimStatistics {
    /// Add the counters of another run
    pub fn merge(&mut self, other: SkimStatistics) {
        self.processed += other.processed;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.malformed += other.malformed;
        self.orphaned += other.orphaned;
    }
}

/// Accumulated output of a run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkimResults {
    /// Compacted tables
    pub tables: DerivedTables,

    /// Event counters
    pub stats: SkimStatistics,
}
//
impl SkimResults {
    /// Integrate the outcome of one event
    pub fn integrate(&mut self, outcome: EventOutcome) {
        self.stats.processed += 1;
        match outcome {
            EventOutcome::Accepted(skim) => {
                self.stats.accepted += 1;
                self.stats.orphaned += skim.orphaned;
                self.tables.append(skim);
            }
            EventOutcome::Rejected(_) => self.stats.rejected += 1,
            EventOutcome::Malformed(_) => self.stats.malformed += 1,
        }
    }

    /// Append the results of events that come after ours
    pub fn merge(&mut self, other: SkimResults) {
        self.tables.merge(other.tables);
        self.stats.merge(other.stats);
    }
}
