//! Named selection criteria and their encoding into a range of bits
//!
//! A criterion compares one observable of a candidate against a list of
//! thresholds. Each threshold is a level of strictness: a candidate which
//! passes a strict threshold of a monotonic criterion also passes all the
//! looser ones. The encoder turns the outcome of these comparisons into a
//! contiguous range of bits of the selection bitmask.

use crate::{
    error::SelectionError,
    numeric::{functions::*, CutContainer, Float, CUT_CONTAINER_BITS},
};

use std::fmt::{self, Display};

/// How an observable is compared to a threshold
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Comparator {
    /// Observable equals the threshold (flags, charge sign...)
    Equal,
    /// Observable is strictly larger than the threshold
    GreaterThan,
    /// Absolute value of the observable is strictly smaller than the threshold
    AbsLessThan,
    /// Absolute value of the observable is below the threshold times a
    /// pT-dependent curve `offset + scale / pt^exponent`
    PtCurve {
        /// Constant term of the curve
        offset: Float,
        /// Coefficient of the pT-dependent term
        scale: Float,
        /// Power of pT in the pT-dependent term
        exponent: Float,
    },
}
//
impl Comparator {
    /// Decide whether an observable passes a threshold
    #[allow(clippy::float_cmp)]
    pub fn passes(&self, value: Float, pt: Float, threshold: Float) -> bool {
        match *self {
            Comparator::Equal => value == threshold,
            Comparator::GreaterThan => value > threshold,
            Comparator::AbsLessThan => abs(value) < threshold,
            Comparator::PtCurve {
                offset,
                scale,
                exponent,
            } => abs(value) <= threshold * (offset + scale / pt.powf(exponent)),
        }
    }

    /// Truth that larger thresholds are stricter with this comparator
    pub fn larger_is_stricter(&self) -> bool {
        match self {
            Comparator::GreaterThan | Comparator::Equal => true,
            Comparator::AbsLessThan | Comparator::PtCurve { .. } => false,
        }
    }

    /// Symbol used when describing a selection to humans
    fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::GreaterThan => ">",
            Comparator::AbsLessThan => "|<|",
            Comparator::PtCurve { .. } => "|<=| x curve(pT)",
        }
    }
}

/// How the outcome of the threshold comparisons is stored
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Packing {
    /// One bit per threshold, set when the threshold is passed
    PerThreshold,
    /// Number of thresholds passed, stored as a binary integer
    Level,
}

/// A named selection criterion
#[derive(Clone, Debug, PartialEq)]
pub struct Criterion {
    name: String,
    comparator: Comparator,
    thresholds: Vec<Float>,
    monotonic: bool,
    packing: Packing,
}
//
impl Criterion {
    /// Set up a criterion with one bit per threshold
    ///
    /// Equality criteria are not monotonic, every other comparator is.
    ///
    pub fn new(name: impl Into<String>, comparator: Comparator, thresholds: Vec<Float>) -> Self {
        Self {
            name: name.into(),
            comparator,
            thresholds,
            monotonic: comparator != Comparator::Equal,
            packing: Packing::PerThreshold,
        }
    }

    /// Give up on monotonic evaluation, thresholds may then come in any order
    pub fn non_monotonic(mut self) -> Self {
        self.monotonic = false;
        self
    }

    /// Store the number of passed thresholds instead of one bit per threshold
    pub fn level_packed(mut self) -> Self {
        self.packing = Packing::Level;
        self
    }

    /// Name of the criterion
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Comparison performed by this criterion
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// Thresholds, in storage order
    pub fn thresholds(&self) -> &[Float] {
        &self.thresholds
    }

    /// Truth that passing a threshold implies passing all looser ones
    pub fn is_monotonic(&self) -> bool {
        self.monotonic
    }

    /// Storage scheme of this criterion
    pub fn packing(&self) -> Packing {
        self.packing
    }

    /// Truth that this criterion is a plain yes/no test
    pub fn is_boolean(&self) -> bool {
        self.thresholds.len() == 1
    }

    /// Number of bits needed to store this criterion
    pub fn width(&self) -> u32 {
        if self.is_boolean() {
            return 1;
        }
        match self.packing {
            Packing::PerThreshold => self.thresholds.len() as u32,
            Packing::Level => bits_for(self.thresholds.len()),
        }
    }

    /// Check the thresholds and place this criterion after `bits_used` bits
    pub fn encoder(self, bits_used: u32) -> Result<CriterionEncoder, SelectionError> {
        self.validate()?;
        let width = self.width();
        let end = bits_used + width;
        if end > CUT_CONTAINER_BITS {
            return Err(SelectionError::LayoutOverflow {
                species: String::new(),
                criterion: self.name,
                required: end,
                available: CUT_CONTAINER_BITS,
            });
        }
        Ok(CriterionEncoder {
            criterion: self,
            offset: bits_used,
            width,
        })
    }

    /// Check that the thresholds make sense for the requested evaluation
    fn validate(&self) -> Result<(), SelectionError> {
        let invalid = |reason| SelectionError::InvalidThresholds {
            criterion: self.name.clone(),
            reason,
        };
        if self.thresholds.is_empty() {
            return Err(invalid("no threshold"));
        }
        if self.thresholds.iter().any(|t| t.is_nan()) {
            return Err(invalid("NaN threshold"));
        }
        if self.monotonic && self.thresholds.windows(2).any(|w| w[0] > w[1]) {
            return Err(invalid("thresholds must be sorted for monotonic evaluation"));
        }
        if !self.monotonic && self.packing == Packing::Level && !self.is_boolean() {
            return Err(invalid("level packing requires a monotonic criterion"));
        }
        Ok(())
    }
}

/// A criterion together with its place in the selection bitmask
#[derive(Clone, Debug, PartialEq)]
pub struct CriterionEncoder {
    criterion: Criterion,
    offset: u32,
    width: u32,
}
//
impl CriterionEncoder {
    /// Criterion being encoded
    pub fn criterion(&self) -> &Criterion {
        &self.criterion
    }

    /// Name of the criterion
    pub fn name(&self) -> &str {
        self.criterion.name()
    }

    /// Position of the first bit of this criterion
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Number of bits used by this criterion
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask covering all bits of this criterion
    pub fn mask(&self) -> CutContainer {
        low_bits(self.width) << self.offset
    }

    /// Evaluate an observable and return its contribution to the bitmask
    pub fn evaluate(&self, value: Float, pt: Float) -> CutContainer {
        let passed = self
            .criterion
            .thresholds
            .iter()
            .map(|&threshold| self.criterion.comparator.passes(value, pt, threshold));
        match self.packing() {
            Packing::PerThreshold => passed
                .enumerate()
                .filter(|&(_, ok)| ok)
                .fold(0, |bits, (idx, _)| bits | self.bit(idx)),
            Packing::Level => (passed.filter(|&ok| ok).count() as CutContainer) << self.offset,
        }
    }

    /// Contribution of a candidate that passes exactly the threshold `value`
    ///
    /// For monotonic criteria this includes the bits of all looser
    /// thresholds, so that requiring these bits is equivalent to requiring
    /// the chosen threshold.
    ///
    #[allow(clippy::float_cmp)]
    pub fn select(&self, value: Float) -> Result<CutContainer, SelectionError> {
        let thresholds = &self.criterion.thresholds;
        let chosen = thresholds
            .iter()
            .position(|&t| t == value)
            .ok_or_else(|| SelectionError::UnknownThreshold {
                criterion: self.name().to_owned(),
                value,
            })?;
        if !self.criterion.monotonic {
            return Ok(self.bit(chosen));
        }
        let looser = |idx: usize| {
            if self.criterion.comparator.larger_is_stricter() {
                idx <= chosen
            } else {
                idx >= chosen
            }
        };
        match self.packing() {
            Packing::PerThreshold => Ok((0..thresholds.len())
                .filter(|&idx| looser(idx))
                .fold(0, |bits, idx| bits | self.bit(idx))),
            Packing::Level => {
                let level = (0..thresholds.len()).filter(|&idx| looser(idx)).count();
                Ok((level as CutContainer) << self.offset)
            }
        }
    }

    /// Extract the number of passed thresholds from a level-packed bitmask
    pub fn level(&self, bits: CutContainer) -> usize {
        ((bits & self.mask()) >> self.offset) as usize
    }

    /// Storage scheme of the criterion
    pub fn packing(&self) -> Packing {
        if self.criterion.is_boolean() {
            Packing::PerThreshold
        } else {
            self.criterion.packing
        }
    }

    /// Describe the choice of one threshold, for reports
    pub fn describe(&self, value: Float) -> String {
        format!(
            "{} {} {}",
            self.name(),
            self.criterion.comparator.symbol(),
            value
        )
    }

    /// Bit associated with the idx-th threshold
    fn bit(&self, idx: usize) -> CutContainer {
        1 << (self.offset + idx as u32)
    }
}

impl Display for CriterionEncoder {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "{:<16} bits {:>2}..{:<2} {:?}",
            self.name(),
            self.offset,
            self.offset + self.width,
            self.criterion.thresholds
        )
    }
}

/// Mask with the n lowest bits set
fn low_bits(n: u32) -> CutContainer {
    if n >= CUT_CONTAINER_BITS {
        CutContainer::MAX
    } else {
        (1 << n) - 1
    }
}
