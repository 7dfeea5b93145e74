//! Bit layout of the selection bitmask of one particle species

use crate::{
    criterion::{Criterion, CriterionEncoder, Packing},
    error::SelectionError,
    numeric::{CutContainer, Float, CUT_CONTAINER_BITS},
};

use std::fmt::{self, Display};

/// Source of the observables that the criteria of a layout look at
pub trait Observables {
    /// Value of the observable that a criterion is named after
    fn value(&self, criterion: &str) -> Option<Float>;

    /// Transverse momentum of the candidate, for pT-dependent criteria
    fn pt(&self) -> Float;
}

/// Ordered, immutable mapping from criteria to bit ranges
///
/// Criteria are packed from the least significant bit upwards, in the order
/// where they were registered. Both the configurator and the producer must
/// register criteria in the same order for bitmasks to be interchangeable.
///
#[derive(Clone, Debug, PartialEq)]
pub struct CutLayout {
    species: String,
    encoders: Vec<CriterionEncoder>,
}
//
impl CutLayout {
    /// Pack a list of criteria, in order
    pub fn new(
        species: impl Into<String>,
        criteria: impl IntoIterator<Item = Criterion>,
    ) -> Result<Self, SelectionError> {
        let species = species.into();
        let mut encoders = Vec::<CriterionEncoder>::new();
        let mut bits_used = 0;
        for criterion in criteria {
            if encoders.iter().any(|enc| enc.name() == criterion.name()) {
                return Err(SelectionError::DuplicateCriterion {
                    criterion: criterion.name().to_owned(),
                });
            }
            let encoder = criterion.encoder(bits_used).map_err(|e| match e {
                SelectionError::LayoutOverflow {
                    criterion,
                    required,
                    available,
                    ..
                } => SelectionError::LayoutOverflow {
                    species: species.clone(),
                    criterion,
                    required,
                    available,
                },
                other => other,
            })?;
            bits_used += encoder.width();
            encoders.push(encoder);
        }
        Ok(Self { species, encoders })
    }

    /// Name of the particle species
    pub fn species(&self) -> &str {
        &self.species
    }

    /// Encoders, in registration order
    pub fn encoders(&self) -> &[CriterionEncoder] {
        &self.encoders
    }

    /// Look up the encoder of a criterion
    pub fn get(&self, criterion: &str) -> Result<&CriterionEncoder, SelectionError> {
        self.encoders
            .iter()
            .find(|enc| enc.name() == criterion)
            .ok_or_else(|| SelectionError::UnknownCriterion {
                criterion: criterion.to_owned(),
            })
    }

    /// Total number of bits used
    pub fn total_width(&self) -> u32 {
        self.encoders.iter().map(CriterionEncoder::width).sum()
    }

    /// Compute the selection bitmask of a candidate
    pub fn encode(&self, observables: &impl Observables) -> Result<CutContainer, SelectionError> {
        let pt = observables.pt();
        self.encoders.iter().try_fold(0, |bits, enc| {
            let value =
                observables
                    .value(enc.name())
                    .ok_or_else(|| SelectionError::MissingObservable {
                        criterion: enc.name().to_owned(),
                    })?;
            Ok(bits | enc.evaluate(value, pt))
        })
    }

    /// Check a candidate's bitmask against a manual selection
    ///
    /// One-bit-per-threshold fields must contain all required bits,
    /// level-packed fields must have reached at least the required level.
    ///
    pub fn satisfies(&self, bits: CutContainer, required: CutContainer) -> bool {
        self.encoders.iter().all(|enc| match enc.packing() {
            Packing::PerThreshold => {
                let req = required & enc.mask();
                bits & req == req
            }
            Packing::Level => enc.level(bits) >= enc.level(required),
        })
    }
}

impl Display for CutLayout {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            fmt,
            "{}: {} of {} bits used",
            self.species,
            self.total_width(),
            CUT_CONTAINER_BITS
        )?;
        for enc in &self.encoders {
            writeln!(fmt, "  {}", enc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::Comparator;
    use std::collections::HashMap;

    struct Candidate {
        pt: Float,
        values: HashMap<&'static str, Float>,
    }
    //
    impl Observables for Candidate {
        fn value(&self, criterion: &str) -> Option<Float> {
            self.values.get(criterion).copied()
        }
        fn pt(&self) -> Float {
            self.pt
        }
    }

    fn track_layout() -> CutLayout {
        CutLayout::new(
            "track",
            [
                Criterion::new("sign", Comparator::Equal, vec![-1., 1.]),
                Criterion::new("pt", Comparator::GreaterThan, vec![0.4, 0.5, 0.6]),
                Criterion::new("eta", Comparator::AbsLessThan, vec![0.7, 0.8, 0.9]).level_packed(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn criteria_are_packed_in_order() {
        let layout = track_layout();
        let ranges = layout
            .encoders()
            .iter()
            .map(|enc| (enc.offset(), enc.width()))
            .collect::<Vec<_>>();
        assert_eq!(ranges, vec![(0, 2), (2, 3), (5, 2)]);
        assert_eq!(layout.total_width(), 7);
    }

    #[test]
    fn encode_combines_all_criteria() {
        let layout = track_layout();
        let candidate = Candidate {
            pt: 0.55,
            values: HashMap::from([("sign", 1.), ("pt", 0.55), ("eta", 0.75)]),
        };
        // sign=+1 -> bit 1, pt -> bits 2 and 3, eta passes 2 levels -> 2 << 5
        assert_eq!(layout.encode(&candidate).unwrap(), 0b10 | 0b1100 | (2 << 5));
    }

    #[test]
    fn missing_observables_are_reported() {
        let layout = track_layout();
        let candidate = Candidate {
            pt: 1.,
            values: HashMap::from([("sign", 1.)]),
        };
        assert_eq!(
            layout.encode(&candidate),
            Err(SelectionError::MissingObservable {
                criterion: "pt".to_owned()
            })
        );
    }

    #[test]
    fn satisfies_compares_levels() {
        let layout = track_layout();
        let eta = layout.get("eta").unwrap();
        let required = eta.select(0.8).unwrap();
        assert!(layout.satisfies(3 << 5, required));
        assert!(layout.satisfies(2 << 5, required));
        assert!(!layout.satisfies(1 << 5, required));
    }

    #[test]
    fn duplicates_and_overflow_are_rejected() {
        let dup = CutLayout::new(
            "track",
            [
                Criterion::new("pt", Comparator::GreaterThan, vec![0.4]),
                Criterion::new("pt", Comparator::GreaterThan, vec![0.5]),
            ],
        );
        assert!(matches!(dup, Err(SelectionError::DuplicateCriterion { .. })));

        let wide = (0..9).map(|i| {
            Criterion::new(
                format!("c{}", i),
                Comparator::GreaterThan,
                (0..8).map(|t| t as Float).collect(),
            )
        });
        match CutLayout::new("track", wide) {
            Err(SelectionError::LayoutOverflow {
                species, criterion, ..
            }) => {
                assert_eq!(species, "track");
                assert_eq!(criterion, "c8");
            }
            other => panic!("expected an overflow, got {:?}", other),
        }
    }
}
