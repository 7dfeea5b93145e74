//! This module defines the properties and storage of particle records, before
//! and after compaction

use crate::numeric::{CutContainer, Float};

use serde::{Deserialize, Serialize};

/// Kind of particle stored in a record
///
/// Upstream producers store daughters right before their parent: the two
/// daughters of a V0 at positions `i - 2` and `i - 1`, and the three
/// daughters of a cascade at `i - 3` (positive), `i - 2` (negative) and
/// `i - 1` (bachelor).
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    /// Primary track
    Track,
    /// Neutral two-body decay candidate
    V0,
    /// Track stored as a daughter of a V0
    V0Daughter,
    /// Three-body decay candidate
    Cascade,
    /// Track stored as a daughter of a cascade
    CascadeDaughter,
}
//
impl Species {
    /// Number of child references that records of this species carry
    pub fn arity(self) -> usize {
        match self {
            Species::Track => 0,
            Species::V0 | Species::V0Daughter => 2,
            Species::Cascade | Species::CascadeDaughter => 3,
        }
    }

    /// Number of daughter records stored right before a parent of this
    /// species
    pub fn daughters(self) -> usize {
        match self {
            Species::V0 => 2,
            Species::Cascade => 3,
            Species::Track | Species::V0Daughter | Species::CascadeDaughter => 0,
        }
    }
}

/// Reference from a record to one of its children
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildRef {
    /// There is no child in this slot
    Empty,
    /// Position of the child in the same table
    Row(u32),
    /// Index in the upstream track table, passed through without remapping
    Upstream(u32),
    /// The child could not be found, usually because an upstream selection
    /// already dropped it
    Orphaned,
}
//
impl ChildRef {
    /// Position of the child in the same table, if that's what this is
    pub fn row(self) -> Option<u32> {
        match self {
            ChildRef::Row(row) => Some(row),
            ChildRef::Empty | ChildRef::Upstream(_) | ChildRef::Orphaned => None,
        }
    }

    /// Shift a row reference when a table is appended to a larger one
    pub fn rebase(self, offset: u32) -> Self {
        match self {
            ChildRef::Row(row) => ChildRef::Row(row + offset),
            other => other,
        }
    }

    /// Turn a same-table reference into an upstream one, for daughters whose
    /// track-level reference is passed through
    pub fn into_upstream(self) -> Self {
        match self {
            ChildRef::Row(id) => ChildRef::Upstream(id),
            other => other,
        }
    }
}

/// Fixed-size list of child references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Children {
    /// No child reference
    None,
    /// Positive and negative daughter
    Pair([ChildRef; 2]),
    /// Positive, negative and bachelor daughter
    Triple([ChildRef; 3]),
}
//
impl Children {
    /// Access the references as a slice
    pub fn as_slice(&self) -> &[ChildRef] {
        match self {
            Children::None => &[],
            Children::Pair(refs) => refs,
            Children::Triple(refs) => refs,
        }
    }

    /// Number of child slots
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Truth that there is no child slot
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a transformation to every reference
    pub fn map(self, f: impl FnMut(ChildRef) -> ChildRef) -> Self {
        match self {
            Children::None => Children::None,
            Children::Pair(refs) => Children::Pair(refs.map(f)),
            Children::Triple(refs) => Children::Triple(refs.map(f)),
        }
    }

    /// Keep only the reference in one slot, emptying the others
    pub fn keep_slot(self, slot: usize) -> Self {
        let mut idx = 0;
        self.map(|child| {
            let kept = if idx == slot { child } else { ChildRef::Empty };
            idx += 1;
            kept
        })
    }
}

/// Event-level quantities, passed through verbatim to the output
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionRecord {
    /// Position of the primary vertex along the beam axis
    pub pos_z: Float,
    /// Multiplicity estimator from the forward detectors
    pub mult_v0m: Float,
    /// Number of tracks
    pub mult_ntr: i32,
    /// Event sphericity
    pub sphericity: Float,
    /// Magnetic field strength
    pub mag_field: Float,
}

/// One particle record, as stored by the upstream producer
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    /// Kind of particle
    pub species: Species,
    /// Transverse momentum
    pub pt: Float,
    /// Pseudorapidity
    pub eta: Float,
    /// Azimuthal angle
    pub phi: Float,
    /// Selection bitmask
    pub cut: CutContainer,
    /// Particle identification bitmask
    pub pid_cut: CutContainer,
    /// Variable used for template fits (DCA for tracks, cosine of pointing
    /// angle for decays)
    pub temp_fit_var: Float,
    /// References to the children of this particle
    pub children: Children,
    /// Invariant mass under the primary hypothesis
    pub mass: Float,
    /// Invariant mass under the alternate hypothesis
    pub mass_alt: Float,
}

/// A particle record in the compacted output table
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompactedParticleRecord {
    /// Row of the owning collision in the output collision table
    pub collision: u32,
    /// Kind of particle
    pub species: Species,
    /// Transverse momentum
    pub pt: Float,
    /// Pseudorapidity
    pub eta: Float,
    /// Azimuthal angle
    pub phi: Float,
    /// Selection bitmask
    pub cut: CutContainer,
    /// Particle identification bitmask
    pub pid_cut: CutContainer,
    /// Variable used for template fits
    pub temp_fit_var: Float,
    /// References to the children of this particle, as output rows
    pub children: Children,
    /// Invariant mass under the primary hypothesis
    pub mass: Float,
    /// Invariant mass under the alternate hypothesis
    pub mass_alt: Float,
}
//
impl CompactedParticleRecord {
    /// Copy a record into the compacted table, with rewritten children
    pub fn new(collision: u32, record: &ParticleRecord, children: Children) -> Self {
        Self {
            collision,
            species: record.species,
            pt: record.pt,
            eta: record.eta,
            phi: record.phi,
            cut: record.cut,
            pid_cut: record.pid_cut,
            temp_fit_var: record.temp_fit_var,
            children,
            mass: record.mass,
            mass_alt: record.mass_alt,
        }
    }

    /// Read back a compacted record as upstream input
    pub fn to_record(&self) -> ParticleRecord {
        ParticleRecord {
            species: self.species,
            pt: self.pt,
            eta: self.eta,
            phi: self.phi,
            cut: self.cut,
            pid_cut: self.pid_cut,
            temp_fit_var: self.temp_fit_var,
            children: self.children,
            mass: self.mass,
            mass_alt: self.mass_alt,
        }
    }
}

/// One event: collision data and particle records in storage order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event-level quantities
    pub collision: CollisionRecord,
    /// Particle records, in the order the upstream producer stored them
    pub particles: Vec<ParticleRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_matches_daughter_layout() {
        assert_eq!(Species::Track.arity(), 0);
        assert_eq!(Species::V0.arity(), Species::V0.daughters());
        assert_eq!(Species::Cascade.arity(), Species::Cascade.daughters());
        assert_eq!(Species::V0Daughter.daughters(), 0);
    }

    #[test]
    fn rebase_only_touches_rows() {
        let children = Children::Triple([
            ChildRef::Row(2),
            ChildRef::Upstream(7),
            ChildRef::Orphaned,
        ]);
        assert_eq!(
            children.map(|r| r.rebase(10)),
            Children::Triple([ChildRef::Row(12), ChildRef::Upstream(7), ChildRef::Orphaned])
        );
    }

    #[test]
    fn keep_slot_empties_the_others() {
        let children = Children::Triple([ChildRef::Row(1), ChildRef::Row(2), ChildRef::Row(3)]);
        assert_eq!(
            children.keep_slot(1),
            Children::Triple([ChildRef::Empty, ChildRef::Row(2), ChildRef::Empty])
        );
    }
}
