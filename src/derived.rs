//! Construction of the compacted derived table of an accepted event
//!
//! The records of an event are scanned once, in storage order. Every record
//! that is written out gets a new row number, and every child reference is
//! rewritten to point at the new row of the child. Children are always
//! written before their parent, so references only ever point backwards.

use crate::{
    error::TopologyViolation,
    gate::SecondarySelection,
    particle::{ChildRef, Children, CollisionRecord, CompactedParticleRecord, ParticleRecord, Species},
};

use serde::{Deserialize, Serialize};

/// Compacted output of one accepted event, with event-local row numbers
#[derive(Clone, Debug, PartialEq)]
pub struct EventSkim {
    /// Event-level quantities, passed through
    pub collision: CollisionRecord,

    /// Compacted particle records, rows numbered from 0
    pub particles: Vec<CompactedParticleRecord>,

    /// Number of child references that could not be resolved
    pub orphaned: usize,
}
//
impl EventSkim {
    /// Truth that every row reference points to an earlier row
    pub fn children_precede_parents(&self) -> bool {
        children_precede_parents(&self.particles, 0)
    }
}

/// Truth that rows reference only earlier rows, for rows numbered from `first`
fn children_precede_parents(rows: &[CompactedParticleRecord], first: u32) -> bool {
    rows.iter().enumerate().all(|(idx, rec)| {
        let row = first + idx as u32;
        rec.children
            .as_slice()
            .iter()
            .filter_map(|child| child.row())
            .all(|child| child < row)
    })
}

/// Rows written so far for one event, and where each track went
struct Emission {
    rows: Vec<CompactedParticleRecord>,
    track_rows: Vec<(u32, u32)>,
    orphaned: usize,
}
//
impl Emission {
    fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            track_rows: Vec::new(),
            orphaned: 0,
        }
    }

    /// Write a record and return its new row
    fn emit(&mut self, record: &ParticleRecord, children: Children) -> u32 {
        let row = self.rows.len() as u32;
        self.rows.push(CompactedParticleRecord::new(0, record, children));
        row
    }

    /// Row of the last written record
    fn last_row(&self) -> Option<u32> {
        (self.rows.len() as u32).checked_sub(1)
    }

    /// Find the new row of a track from its original position
    ///
    /// Only tracks that were already written can be found. The number of
    /// tracks per event is small, so a linear search is good enough.
    ///
    fn lookup(&mut self, original: u32) -> ChildRef {
        match self.track_rows.iter().find(|&&(orig, _)| orig == original) {
            Some(&(_, row)) => ChildRef::Row(row),
            None => {
                tracing::warn!(original, "child track was not written, reference is orphaned");
                self.orphaned += 1;
                ChildRef::Orphaned
            }
        }
    }
}

/// Builder of the compacted table of accepted events
pub struct DerivedTableBuilder<'cfg> {
    secondaries: &'cfg SecondarySelection,
}
//
impl<'cfg> DerivedTableBuilder<'cfg> {
    /// Prepare to build tables for a certain secondary species
    pub fn new(secondaries: &'cfg SecondarySelection) -> Self {
        Self { secondaries }
    }

    /// Check that the records of an event follow the expected layout
    ///
    /// This runs before anything is written, so that an event is either
    /// written out whole or not at all.
    ///
    pub fn validate(&self, particles: &[ParticleRecord]) -> Result<(), TopologyViolation> {
        for (position, record) in particles.iter().enumerate() {
            let species = record.species;
            if record.children.len() != species.arity() {
                return Err(TopologyViolation::ChildArity {
                    position,
                    species,
                    found: record.children.len(),
                });
            }
            let handled = match self.secondaries {
                SecondarySelection::V0(_) => matches!(species, Species::V0 | Species::V0Daughter),
                SecondarySelection::Cascade(_) => species == Species::Cascade,
            };
            if !handled {
                continue;
            }
            let expected = species.daughters();
            let daughter_species = match species {
                Species::Cascade => Species::CascadeDaughter,
                _ => Species::V0Daughter,
            };
            if position < expected
                || particles[position - expected..position]
                    .iter()
                    .any(|daughter| daughter.species != daughter_species)
            {
                return Err(TopologyViolation::MissingDaughters {
                    position,
                    species,
                    expected,
                });
            }
            if species == Species::V0Daughter {
                if let Some(target) = record
                    .children
                    .as_slice()
                    .iter()
                    .filter_map(|child| child.row())
                    .find(|&target| target as usize >= position)
                {
                    return Err(TopologyViolation::ForwardReference { position, target });
                }
            }
        }
        Ok(())
    }

    /// Compact the records of an accepted event
    pub fn build(
        &self,
        collision: &CollisionRecord,
        particles: &[ParticleRecord],
    ) -> Result<EventSkim, TopologyViolation> {
        self.validate(particles)?;
        let mut out = Emission::new(particles.len());

        for (position, record) in particles.iter().enumerate() {
            match (record.species, self.secondaries) {
                (Species::Track, _) => {
                    let row = out.emit(record, Children::None);
                    out.track_rows.push((position as u32, row));
                }

                (Species::V0Daughter, SecondarySelection::V0(_)) => {
                    let children = record.children.map(|child| match child {
                        ChildRef::Row(original) => out.lookup(original),
                        other => other,
                    });
                    out.emit(record, children);
                }

                // Daughters were just written as the two previous rows
                (Species::V0, SecondarySelection::V0(_)) => {
                    let last = out
                        .last_row()
                        .filter(|&last| last >= 1)
                        .ok_or(TopologyViolation::MissingDaughters {
                            position,
                            species: Species::V0,
                            expected: 2,
                        })?;
                    out.emit(
                        record,
                        Children::Pair([ChildRef::Row(last - 1), ChildRef::Row(last)]),
                    );
                }

                (Species::Cascade, SecondarySelection::Cascade(selection)) => {
                    let daughters = [
                        &particles[position - 3],
                        &particles[position - 2],
                        &particles[position - 1],
                    ];
                    if !selection.accepts_daughters(record, daughters) {
                        tracing::debug!(position, "cascade daughters fail the child cuts");
                        continue;
                    }
                    let mut rows = [ChildRef::Empty; 3];
                    for (slot, daughter) in daughters.into_iter().enumerate() {
                        let children = daughter.children.keep_slot(slot).map(ChildRef::into_upstream);
                        rows[slot] = ChildRef::Row(out.emit(daughter, children));
                    }
                    out.emit(record, Children::Triple(rows));
                }

                // Cascade daughters are written along with their cascade, and
                // species which the active mode does not handle are dropped
                (Species::CascadeDaughter, _)
                | (Species::V0 | Species::V0Daughter, SecondarySelection::Cascade(_))
                | (Species::Cascade, SecondarySelection::V0(_)) => {}
            }
        }

        let skim = EventSkim {
            collision: *collision,
            particles: out.rows,
            orphaned: out.orphaned,
        };
        debug_assert!(skim.children_precede_parents());
        Ok(skim)
    }
}

/// Output tables, to which accepted events are appended in order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedTables {
    /// One row per accepted event
    pub collisions: Vec<CollisionRecord>,

    /// Compacted particle records of all accepted events
    pub particles: Vec<CompactedParticleRecord>,
}
//
impl DerivedTables {
    /// Append the output of one event, turning its event-local rows into
    /// rows of the shared table
    pub fn append(&mut self, skim: EventSkim) {
        let collision = self.collisions.len() as u32;
        let offset = self.particles.len() as u32;
        self.collisions.push(skim.collision);
        self.particles
            .extend(skim.particles.into_iter().map(|mut rec| {
                rec.collision = collision;
                rec.children = rec.children.map(|child| child.rebase(offset));
                rec
            }));
    }

    /// Append all rows of another set of tables
    pub fn merge(&mut self, other: DerivedTables) {
        let collision_offset = self.collisions.len() as u32;
        let offset = self.particles.len() as u32;
        self.collisions.extend(other.collisions);
        self.particles
            .extend(other.particles.into_iter().map(|mut rec| {
                rec.collision += collision_offset;
                rec.children = rec.children.map(|child| child.rebase(offset));
                rec
            }));
    }

    /// Truth that every row reference points to an earlier row
    pub fn children_precede_parents(&self) -> bool {
        children_precede_parents(&self.particles, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{V0Selection, Window};

    fn record(species: Species, children: Children) -> ParticleRecord {
        ParticleRecord {
            species,
            pt: 1.,
            eta: 0.,
            phi: 0.,
            cut: 0,
            pid_cut: 0,
            temp_fit_var: 0.,
            children,
            mass: 0.,
            mass_alt: 0.,
        }
    }

    fn v0_mode() -> SecondarySelection {
        SecondarySelection::V0(V0Selection {
            mass: Window::new(1.08, 1.15),
            anti_mass: Window::new(1.08, 1.15),
        })
    }

    #[test]
    fn v0_daughters_point_to_written_tracks() {
        let mode = v0_mode();
        let builder = DerivedTableBuilder::new(&mode);
        let particles = [
            record(Species::Track, Children::None),
            record(Species::Track, Children::None),
            record(
                Species::V0Daughter,
                Children::Pair([ChildRef::Row(1), ChildRef::Empty]),
            ),
            record(
                Species::V0Daughter,
                Children::Pair([ChildRef::Empty, ChildRef::Row(0)]),
            ),
            record(Species::V0, Children::Pair([ChildRef::Row(2), ChildRef::Row(3)])),
        ];
        let skim = builder.build(&CollisionRecord::default(), &particles).unwrap();
        assert_eq!(skim.particles.len(), 5);
        assert_eq!(
            skim.particles[2].children,
            Children::Pair([ChildRef::Row(1), ChildRef::Empty])
        );
        assert_eq!(
            skim.particles[3].children,
            Children::Pair([ChildRef::Empty, ChildRef::Row(0)])
        );
        assert_eq!(
            skim.particles[4].children,
            Children::Pair([ChildRef::Row(2), ChildRef::Row(3)])
        );
        assert_eq!(skim.orphaned, 0);
    }

    #[test]
    fn misplaced_v0_is_a_topology_violation() {
        let mode = v0_mode();
        let builder = DerivedTableBuilder::new(&mode);
        let particles = [
            record(Species::Track, Children::None),
            record(Species::V0, Children::Pair([ChildRef::Empty, ChildRef::Empty])),
        ];
        assert_eq!(
            builder.build(&CollisionRecord::default(), &particles),
            Err(TopologyViolation::MissingDaughters {
                position: 1,
                species: Species::V0,
                expected: 2
            })
        );
    }

    #[test]
    fn forward_references_are_refused() {
        let mode = v0_mode();
        let builder = DerivedTableBuilder::new(&mode);
        let particles = [
            record(
                Species::V0Daughter,
                Children::Pair([ChildRef::Row(2), ChildRef::Empty]),
            ),
            record(
                Species::V0Daughter,
                Children::Pair([ChildRef::Empty, ChildRef::Orphaned]),
            ),
            record(Species::Track, Children::None),
        ];
        assert_eq!(
            builder.validate(&particles),
            Err(TopologyViolation::ForwardReference {
                position: 0,
                target: 2
            })
        );
    }

    #[test]
    fn wrong_arity_is_refused() {
        let mode = v0_mode();
        let builder = DerivedTableBuilder::new(&mode);
        let particles = [record(
            Species::Track,
            Children::Pair([ChildRef::Empty, ChildRef::Empty]),
        )];
        assert!(matches!(
            builder.validate(&particles),
            Err(TopologyViolation::ChildArity { found: 2, .. })
        ));
    }

    #[test]
    fn append_rebases_rows() {
        let mode = v0_mode();
        let builder = DerivedTableBuilder::new(&mode);
        let particles = [
            record(
                Species::V0Daughter,
                Children::Pair([ChildRef::Orphaned, ChildRef::Empty]),
            ),
            record(
                Species::V0Daughter,
                Children::Pair([ChildRef::Empty, ChildRef::Orphaned]),
            ),
            record(Species::V0, Children::Pair([ChildRef::Empty, ChildRef::Empty])),
        ];
        let mut tables = DerivedTables::default();
        for _ in 0..2 {
            let skim = builder.build(&CollisionRecord::default(), &particles).unwrap();
            tables.append(skim);
        }
        assert_eq!(tables.collisions.len(), 2);
        assert_eq!(tables.particles.len(), 6);
        assert_eq!(tables.particles[5].collision, 1);
        assert_eq!(
            tables.particles[5].children,
            Children::Pair([ChildRef::Row(3), ChildRef::Row(4)])
        );
        assert!(tables.children_precede_parents());
    }
}
