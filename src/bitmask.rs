//! Composition of the selection bitmask that an analysis requires, either for
//! one manual choice of thresholds or for a whole set of systematic variations

use crate::{
    criterion::CriterionEncoder,
    error::SelectionError,
    layout::CutLayout,
    numeric::{CutContainer, Float},
    random::RandGenerator,
};

use std::fmt::{self, Display};

/// One combination of thresholds and the bitmask that selects it
#[derive(Clone, Debug, PartialEq)]
pub struct Variation {
    /// Position of this combination in its sequence
    pub index: usize,

    /// Chosen threshold of each selected criterion
    pub choices: Vec<(String, Float)>,

    /// Bitmask that a candidate must contain to pass these thresholds
    pub bits: CutContainer,

    /// Human-readable description of the choices
    pub description: String,
}

impl Display for Variation {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "{:>6} : {} : bitmask {} (0x{:x})",
            self.index, self.description, self.bits, self.bits
        )
    }
}

/// Candidate thresholds of one criterion, resolved against a layout
struct Axis<'layout> {
    encoder: &'layout CriterionEncoder,
    candidates: Vec<(Float, CutContainer)>,
}

/// Build a variation out of one candidate per axis
fn combine(index: usize, axes: &[Axis], picks: impl Iterator<Item = usize>) -> Variation {
    let mut choices = Vec::with_capacity(axes.len());
    let mut descriptions = Vec::with_capacity(axes.len());
    let mut bits = 0;
    for (axis, pick) in axes.iter().zip(picks) {
        let (value, contribution) = axis.candidates[pick];
        choices.push((axis.encoder.name().to_owned(), value));
        descriptions.push(axis.encoder.describe(value));
        bits |= contribution;
    }
    Variation {
        index,
        choices,
        bits,
        description: descriptions.join(", "),
    }
}

/// Tool that composes required bitmasks for one species
pub struct BitmaskBuilder<'layout> {
    layout: &'layout CutLayout,
}
//
impl<'layout> BitmaskBuilder<'layout> {
    /// Prepare to build bitmasks following a certain layout
    pub fn new(layout: &'layout CutLayout) -> Self {
        Self { layout }
    }

    /// Bitmask for one chosen threshold per selected criterion
    ///
    /// Criteria which are not mentioned are not required.
    ///
    pub fn manual<S: AsRef<str>>(&self, choices: &[(S, Float)]) -> Result<Variation, SelectionError> {
        let candidates = choices
            .iter()
            .map(|(name, value)| (name.as_ref(), vec![*value]))
            .collect::<Vec<_>>();
        let axes = self.resolve(&candidates)?;
        Ok(combine(0, &axes, std::iter::repeat(0)))
    }

    /// Enumerate every combination of candidate thresholds
    ///
    /// Combinations come in odometer order: the first criterion varies
    /// slowest and the last one fastest, and candidates of a criterion are
    /// visited in the order they were given. Combinations are produced
    /// lazily, so only the candidate lists are kept in memory.
    ///
    pub fn variations<S: AsRef<str>>(
        &self,
        candidates: &[(S, Vec<Float>)],
    ) -> Result<Variations<'layout>, SelectionError> {
        let axes = self.resolve(candidates)?;
        Ok(Variations {
            odometer: vec![0; axes.len()],
            axes,
            next_index: 0,
            done: false,
        })
    }

    /// Draw random combinations of candidate thresholds
    ///
    /// The same seed always gives the same sequence.
    ///
    pub fn sample<S: AsRef<str>>(
        &self,
        candidates: &[(S, Vec<Float>)],
        count: usize,
        seed: u64,
    ) -> Result<Samples<'layout>, SelectionError> {
        let axes = self.resolve(candidates)?;
        Ok(Samples {
            axes,
            rng: RandGenerator::new(seed),
            next_index: 0,
            count,
        })
    }

    /// Match candidate lists with the encoders of the layout
    fn resolve<S: AsRef<str>>(
        &self,
        candidates: &[(S, Vec<Float>)],
    ) -> Result<Vec<Axis<'layout>>, SelectionError> {
        let mut axes = Vec::<Axis>::with_capacity(candidates.len());
        for (name, values) in candidates {
            let name = name.as_ref();
            let encoder = self.layout.get(name)?;
            if axes.iter().any(|axis| axis.encoder.name() == name) {
                return Err(SelectionError::DuplicateCriterion {
                    criterion: name.to_owned(),
                });
            }
            if values.is_empty() {
                return Err(SelectionError::EmptyCandidateList {
                    criterion: name.to_owned(),
                });
            }
            let candidates = values
                .iter()
                .map(|&value| encoder.select(value).map(|bits| (value, bits)))
                .collect::<Result<Vec<_>, _>>()?;
            axes.push(Axis {
                encoder,
                candidates,
            });
        }
        Ok(axes)
    }
}

/// Lazy cross-product of candidate thresholds
pub struct Variations<'layout> {
    axes: Vec<Axis<'layout>>,
    odometer: Vec<usize>,
    next_index: usize,
    done: bool,
}
//
impl Variations<'_> {
    /// Total number of combinations (saturates at usize::MAX)
    pub fn total(&self) -> usize {
        self.axes
            .iter()
            .fold(1usize, |acc, axis| acc.saturating_mul(axis.candidates.len()))
    }

    /// Move the odometer to the next combination
    fn advance(&mut self) {
        for (digit, axis) in self.odometer.iter_mut().zip(&self.axes).rev() {
            *digit += 1;
            if *digit < axis.candidates.len() {
                return;
            }
            *digit = 0;
        }
        self.done = true;
    }
}

impl Iterator for Variations<'_> {
    type Item = Variation;

    fn next(&mut self) -> Option<Variation> {
        if self.done {
            return None;
        }
        let variation = combine(self.next_index, &self.axes, self.odometer.iter().copied());
        self.next_index += 1;
        self.advance();
        Some(variation)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            let remaining = self.total().saturating_sub(self.next_index);
            (remaining, Some(remaining))
        }
    }
}

/// Seeded random draws of candidate thresholds
pub struct Samples<'layout> {
    axes: Vec<Axis<'layout>>,
    rng: RandGenerator,
    next_index: usize,
    count: usize,
}

impl Iterator for Samples<'_> {
    type Item = Variation;

    fn next(&mut self) -> Option<Variation> {
        if self.next_index >= self.count {
            return None;
        }
        let picks = self
            .axes
            .iter()
            .map(|axis| self.rng.pick(axis.candidates.len()))
            .collect::<Vec<_>>();
        let variation = combine(self.next_index, &self.axes, picks.into_iter());
        self.next_index += 1;
        Some(variation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::{Comparator, Criterion};

    fn layout() -> CutLayout {
        CutLayout::new(
            "track",
            [
                Criterion::new("sign", Comparator::Equal, vec![-1., 1.]),
                Criterion::new("pt", Comparator::GreaterThan, vec![0.4, 0.5, 0.6]),
                Criterion::new("eta", Comparator::AbsLessThan, vec![0.7, 0.8, 0.9]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn manual_mask_includes_looser_bits() {
        let layout = layout();
        let builder = BitmaskBuilder::new(&layout);
        let v = builder.manual(&[("sign", 1.), ("pt", 0.5), ("eta", 0.8)]).unwrap();
        // sign +1 -> bit 1, pt 0.5 -> bits 2..=3, eta 0.8 -> bits 6..=7
        assert_eq!(v.bits, 0b1100_1110);
        assert_eq!(v.description, "sign == 1, pt > 0.5, eta |<| 0.8");
    }

    #[test]
    fn manual_rejects_unknown_requests() {
        let layout = layout();
        let builder = BitmaskBuilder::new(&layout);
        assert!(matches!(
            builder.manual(&[("dca", 0.1)]),
            Err(SelectionError::UnknownCriterion { .. })
        ));
        assert!(matches!(
            builder.manual(&[("pt", 0.45)]),
            Err(SelectionError::UnknownThreshold { .. })
        ));
        assert!(matches!(
            builder.manual(&[("pt", 0.4), ("pt", 0.5)]),
            Err(SelectionError::DuplicateCriterion { .. })
        ));
    }

    #[test]
    fn variations_follow_odometer_order() {
        let layout = layout();
        let builder = BitmaskBuilder::new(&layout);
        let variations = builder
            .variations(&[("pt", vec![0.4, 0.6]), ("eta", vec![0.9, 0.8, 0.7])])
            .unwrap();
        assert_eq!(variations.total(), 6);
        let choices = variations
            .map(|v| (v.index, v.choices[0].1, v.choices[1].1))
            .collect::<Vec<_>>();
        assert_eq!(
            choices,
            vec![
                (0, 0.4, 0.9),
                (1, 0.4, 0.8),
                (2, 0.4, 0.7),
                (3, 0.6, 0.9),
                (4, 0.6, 0.8),
                (5, 0.6, 0.7),
            ]
        );
    }

    #[test]
    fn empty_candidate_lists_are_rejected() {
        let layout = layout();
        let builder = BitmaskBuilder::new(&layout);
        assert_eq!(
            builder
                .variations(&[("pt", vec![0.4]), ("eta", vec![])])
                .err(),
            Some(SelectionError::EmptyCandidateList {
                criterion: "eta".to_owned()
            })
        );
    }

    #[test]
    fn samples_are_reproducible() {
        let layout = layout();
        let builder = BitmaskBuilder::new(&layout);
        let candidates = [("pt", vec![0.4, 0.5, 0.6]), ("eta", vec![0.7, 0.8, 0.9])];
        let first = builder.sample(&candidates, 50, 7).unwrap().collect::<Vec<_>>();
        let second = builder.sample(&candidates, 50, 7).unwrap().collect::<Vec<_>>();
        assert_eq!(first.len(), 50);
        assert_eq!(first, second);
    }
}
