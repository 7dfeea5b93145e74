//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

// Floating-point precision is configured here
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f32")]
pub use std::f32 as reals;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
#[cfg(not(feature = "f32"))]
pub use std::f64 as reals;

/// Integer type in which selection bitmasks are stored
pub type CutContainer = u64;

/// Number of bits available in a selection bitmask
pub const CUT_CONTAINER_BITS: u32 = CutContainer::BITS;

/// Mathematical functions
pub mod functions {
    use super::Float;
    pub use prefix_num_ops::real::*;

    /// Total momentum of a particle, from its transverse momentum and
    /// pseudorapidity (p = pT·cosh η)
    pub fn momentum(pt: Float, eta: Float) -> Float {
        pt * (exp(eta) + exp(-eta)) / 2.
    }

    /// Number of bits needed to store any integer in 0..=n
    pub fn bits_for(n: usize) -> u32 {
        usize::BITS - n.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::functions::*;

    #[test]
    fn momentum_at_zero_eta_is_pt() {
        assert_eq!(momentum(1.5, 0.), 1.5);
    }

    #[test]
    fn bits_for_matches_log2_ceiling() {
        assert_eq!(bits_for(0), 0);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(4), 3);
        assert_eq!(bits_for(7), 3);
        assert_eq!(bits_for(8), 4);
    }
}
