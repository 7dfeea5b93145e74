//! Event-level multiplicity requirement
//!
//! Selected particles of an event are counted in four buckets (tracks and
//! secondaries, each split by charge hypothesis). The event passes if the
//! particle buckets or the antiparticle buckets, taken on their own, reach
//! both multiplicity floors. Counts of the two hypotheses are never summed.

use crate::{
    particle::{Event, ParticleRecord},
    selector::{CascadeSelection, Charge, TrackSelection, V0Selection},
};

/// Selection of the secondary species, which also decides which topology the
/// derived table is built for
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SecondarySelection {
    /// Tracks and V0s
    V0(V0Selection),
    /// Tracks and cascades
    Cascade(CascadeSelection),
}
//
impl SecondarySelection {
    /// Charge hypothesis of a selected secondary
    pub fn classify(&self, record: &ParticleRecord) -> Option<Charge> {
        match self {
            SecondarySelection::V0(sel) => sel.classify(record),
            SecondarySelection::Cascade(sel) => sel.classify(record),
        }
    }
}

/// Minimal number of particles of each species
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Multiplicity {
    /// Minimal number of tracks
    pub tracks: usize,
    /// Minimal number of secondaries
    pub secondaries: usize,
}

/// Outcome of the gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The event must be written out
    Accept,
    /// The event contributes nothing to the output
    Reject,
}

/// Per-event counts of selected particles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventAggregate {
    /// Tracks with the particle hypothesis
    pub tracks: usize,
    /// Tracks with the antiparticle hypothesis
    pub anti_tracks: usize,
    /// Secondaries with the particle hypothesis
    pub secondaries: usize,
    /// Secondaries with the antiparticle hypothesis
    pub anti_secondaries: usize,
}
//
impl EventAggregate {
    /// Count a selected track
    pub fn add_track(&mut self, charge: Charge) {
        match charge {
            Charge::Particle => self.tracks += 1,
            Charge::Antiparticle => self.anti_tracks += 1,
        }
    }

    /// Count a selected secondary
    pub fn add_secondary(&mut self, charge: Charge) {
        match charge {
            Charge::Particle => self.secondaries += 1,
            Charge::Antiparticle => self.anti_secondaries += 1,
        }
    }

    /// Final decision, once every record has been counted
    pub fn decide(&self, min: &Multiplicity) -> Decision {
        let particles = self.tracks >= min.tracks && self.secondaries >= min.secondaries;
        let antiparticles =
            self.anti_tracks >= min.tracks && self.anti_secondaries >= min.secondaries;
        if particles || antiparticles {
            Decision::Accept
        } else {
            Decision::Reject
        }
    }
}

/// Multiplicity gate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventGate<'cfg> {
    tracks: &'cfg TrackSelection,
    secondaries: &'cfg SecondarySelection,
    min: &'cfg Multiplicity,
}
//
impl<'cfg> EventGate<'cfg> {
    /// Set up the gate from the selection configuration
    pub fn new(
        tracks: &'cfg TrackSelection,
        secondaries: &'cfg SecondarySelection,
        min: &'cfg Multiplicity,
    ) -> Self {
        Self {
            tracks,
            secondaries,
            min,
        }
    }

    /// Count the selected particles of an event
    pub fn count(&self, event: &Event) -> EventAggregate {
        let mut aggregate = EventAggregate::default();
        for record in &event.particles {
            if let Some(charge) = self.tracks.classify(record) {
                aggregate.add_track(charge);
            } else if let Some(charge) = self.secondaries.classify(record) {
                aggregate.add_secondary(charge);
            }
        }
        aggregate
    }

    /// Count the selected particles of an event and decide its fate
    pub fn decide(&self, event: &Event) -> (EventAggregate, Decision) {
        let aggregate = self.count(event);
        (aggregate, aggregate.decide(self.min))
    }
}
