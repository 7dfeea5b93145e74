//! Per-particle selection: kinematic windows, momentum-dependent PID and
//! tests of the stored bitmasks
//!
//! All predicates are pure functions of one record and of an immutable
//! configuration, so they can be evaluated in any order.

use crate::{
    numeric::{functions::*, CutContainer, Float},
    particle::{ParticleRecord, Species},
};

/// Test of a bitmask against required and rejected bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitSelection {
    /// Bits that must all be set
    pub required: CutContainer,

    /// Bits that must all be unset (0 disables rejection)
    pub rejected: CutContainer,
}
//
impl BitSelection {
    /// Require some bits, reject none
    pub const fn require(required: CutContainer) -> Self {
        Self {
            required,
            rejected: 0,
        }
    }

    /// Additionally reject some bits
    pub const fn rejecting(self, rejected: CutContainer) -> Self {
        Self { rejected, ..self }
    }

    /// Decide whether a bitmask passes
    pub fn passes(&self, bits: CutContainer) -> bool {
        (bits & self.required) == self.required && (bits & self.rejected) == 0
    }
}

/// Range of values
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    /// Lower bound
    pub min: Float,

    /// Upper bound
    pub max: Float,
}
//
impl Window {
    /// Set up a window
    pub const fn new(min: Float, max: Float) -> Self {
        Self { min, max }
    }

    /// Bounds excluded
    pub fn contains_open(&self, x: Float) -> bool {
        x > self.min && x < self.max
    }

    /// Bounds included
    pub fn contains(&self, x: Float) -> bool {
        x >= self.min && x <= self.max
    }
}

/// Charge-conjugate hypothesis of a candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Charge {
    /// Particle of interest
    Particle,
    /// Its antiparticle
    Antiparticle,
}

/// Particle and antiparticle bit patterns of a species
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChargeMasks {
    /// Bits that identify a particle
    pub particle: CutContainer,

    /// Bits that identify an antiparticle (0 never matches)
    pub antiparticle: CutContainer,
}
//
impl ChargeMasks {
    /// Classify a selection bitmask
    ///
    /// The antiparticle pattern is tested first. A particle pattern of 0
    /// thus means "everything that is not an antiparticle".
    ///
    pub fn classify(&self, cut: CutContainer) -> Option<Charge> {
        if self.antiparticle != 0 && (cut & self.antiparticle) == self.antiparticle {
            Some(Charge::Antiparticle)
        } else if (cut & self.particle) == self.particle {
            Some(Charge::Particle)
        } else {
            None
        }
    }

    /// Hypothesis whose mask is exactly the given bitmask, particle first
    pub fn identify(&self, cut: CutContainer) -> Option<Charge> {
        if cut == self.particle {
            Some(Charge::Particle)
        } else if cut == self.antiparticle {
            Some(Charge::Antiparticle)
        } else {
            None
        }
    }
}

/// PID requirement that switches at a momentum threshold
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidSelection {
    /// Momentum up to which the low-momentum requirement applies
    pub momentum_threshold: Float,

    /// Requirement at low momentum (TPC only)
    pub low_momentum: BitSelection,

    /// Requirement at high momentum (TPC and TOF)
    pub high_momentum: BitSelection,
}
//
impl PidSelection {
    /// Decide whether a record passes the PID requirement
    pub fn passes(&self, record: &ParticleRecord) -> bool {
        if momentum(record.pt, record.eta) <= self.momentum_threshold {
            self.low_momentum.passes(record.pid_cut)
        } else {
            self.high_momentum.passes(record.pid_cut)
        }
    }
}

/// Cut curve `|x| <= offset + scale / pt^exponent`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PtCurve {
    /// Asymptotic value at high pT
    pub offset: Float,
    /// Scale of the low-pT rise
    pub scale: Float,
    /// Power of the low-pT rise
    pub exponent: Float,
}
//
impl PtCurve {
    /// Maximal absolute value allowed at a given pT
    pub fn limit(&self, pt: Float) -> Float {
        self.offset + self.scale / pt.powf(self.exponent)
    }
}

impl Default for PtCurve {
    fn default() -> Self {
        Self {
            offset: 0.0105,
            scale: 0.035,
            exponent: 1.1,
        }
    }
}

/// Cut on the template fit variable
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitVarSelection {
    /// Flat window
    Window(Window),
    /// pT-dependent cut curve
    PtDependent(PtCurve),
}
//
impl FitVarSelection {
    /// Decide whether a record passes
    pub fn passes(&self, record: &ParticleRecord) -> bool {
        match self {
            FitVarSelection::Window(window) => window.contains(record.temp_fit_var),
            FitVarSelection::PtDependent(curve) => {
                abs(record.temp_fit_var) <= curve.limit(record.pt)
            }
        }
    }
}

/// Selection of primary tracks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackSelection {
    /// Particle and antiparticle patterns
    pub charge: ChargeMasks,
    /// PID requirement
    pub pid: PidSelection,
    /// Transverse momentum window (bounds excluded)
    pub pt: Window,
    /// Pseudorapidity window (bounds excluded)
    pub eta: Window,
    /// Fit variable cut
    pub fit_var: FitVarSelection,
}
//
impl TrackSelection {
    /// Decide whether a record is a selected track
    pub fn selects(&self, record: &ParticleRecord) -> bool {
        record.species == Species::Track
            && self.pid.passes(record)
            && self.pt.contains_open(record.pt)
            && self.eta.contains_open(record.eta)
            && self.fit_var.passes(record)
    }

    /// Charge hypothesis of a selected track
    pub fn classify(&self, record: &ParticleRecord) -> Option<Charge> {
        if self.selects(record) {
            self.charge.classify(record.cut)
        } else {
            None
        }
    }
}

/// Selection of V0s, classified by invariant mass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct V0Selection {
    /// Mass window under the particle hypothesis (bounds excluded)
    pub mass: Window,
    /// Mass window under the antiparticle hypothesis (bounds excluded)
    pub anti_mass: Window,
}
//
impl V0Selection {
    /// Charge hypothesis of a V0, if its mass fits one
    pub fn classify(&self, record: &ParticleRecord) -> Option<Charge> {
        if record.species != Species::V0 {
            None
        } else if self.mass.contains_open(record.mass) {
            Some(Charge::Particle)
        } else if self.anti_mass.contains_open(record.mass_alt) {
            Some(Charge::Antiparticle)
        } else {
            None
        }
    }
}

/// Selection and PID bits required on one cascade daughter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChildCut {
    /// Bits required in the daughter's selection bitmask
    pub cut: CutContainer,
    /// Bits required in the daughter's PID bitmask
    pub pid: CutContainer,
}

/// Requirements on the three daughters of a cascade, for one hypothesis
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DaughterCuts {
    /// Positive daughter of the V0
    pub positive: ChildCut,
    /// Negative daughter of the V0
    pub negative: ChildCut,
    /// Bachelor track
    pub bachelor: ChildCut,
}
//
impl DaughterCuts {
    /// Requirements in daughter storage order
    fn in_order(&self) -> [ChildCut; 3] {
        [self.positive, self.negative, self.bachelor]
    }
}

/// Selection of cascades
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeSelection {
    /// Particle and antiparticle patterns
    pub charge: ChargeMasks,
    /// Transverse momentum window (bounds excluded)
    pub pt: Window,
    /// Pseudorapidity window (bounds excluded)
    pub eta: Window,
    /// Cascade mass window (bounds excluded)
    pub mass: Window,
    /// Mass window of the V0 daughter (bounds excluded)
    pub v0_daughter_mass: Window,
    /// Daughter requirements under the particle hypothesis
    pub particle_daughters: DaughterCuts,
    /// Daughter requirements under the antiparticle hypothesis
    pub antiparticle_daughters: DaughterCuts,
    /// Apply the selection bits of the daughters
    pub use_child_cuts: bool,
    /// Apply the PID bits of the daughters
    pub use_child_pid_cuts: bool,
}
//
impl CascadeSelection {
    /// Decide whether a record is a selected cascade
    pub fn selects(&self, record: &ParticleRecord) -> bool {
        record.species == Species::Cascade
            && self.pt.contains_open(record.pt)
            && self.eta.contains_open(record.eta)
            && self.mass.contains_open(record.mass)
            && self.v0_daughter_mass.contains_open(record.mass_alt)
    }

    /// Charge hypothesis of a selected cascade
    pub fn classify(&self, record: &ParticleRecord) -> Option<Charge> {
        if self.selects(record) {
            self.charge.classify(record.cut)
        } else {
            None
        }
    }

    /// Check the daughters (positive, negative, bachelor) of a cascade
    ///
    /// The requirements of the hypothesis whose mask equals the cascade's
    /// own bitmask are applied, particle hypothesis first. A cascade whose
    /// bitmask equals neither mask gets no daughter requirement.
    ///
    pub fn accepts_daughters(&self, cascade: &ParticleRecord, daughters: [&ParticleRecord; 3]) -> bool {
        let cuts = match self.charge.identify(cascade.cut) {
            Some(Charge::Particle) => self.particle_daughters,
            Some(Charge::Antiparticle) => self.antiparticle_daughters,
            None => return true,
        };
        daughters
            .iter()
            .zip(cuts.in_order())
            .all(|(daughter, cut)| {
                (!self.use_child_cuts || BitSelection::require(cut.cut).passes(daughter.cut))
                    && (!self.use_child_pid_cuts
                        || BitSelection::require(cut.pid).passes(daughter.pid_cut))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Children;

    fn track(pt: Float, eta: Float, cut: CutContainer, pid_cut: CutContainer) -> ParticleRecord {
        ParticleRecord {
            species: Species::Track,
            pt,
            eta,
            phi: 0.,
            cut,
            pid_cut,
            temp_fit_var: 0.,
            children: Children::None,
            mass: 0.,
            mass_alt: 0.,
        }
    }

    fn track_selection() -> TrackSelection {
        TrackSelection {
            charge: ChargeMasks {
                particle: 0b10,
                antiparticle: 0b01,
            },
            pid: PidSelection {
                momentum_threshold: 0.75,
                low_momentum: BitSelection::require(4).rejecting(8),
                high_momentum: BitSelection::require(2),
            },
            pt: Window::new(0., 999.),
            eta: Window::new(-0.8, 0.8),
            fit_var: FitVarSelection::Window(Window::new(-0.1, 0.1)),
        }
    }

    #[test]
    fn reject_mask_of_zero_is_disabled() {
        let sel = BitSelection::require(0b101);
        assert!(sel.passes(0b111));
        assert!(!sel.passes(0b011));
        let sel = sel.rejecting(0b010);
        assert!(!sel.passes(0b111));
        assert!(sel.passes(0b101));
    }

    #[test]
    fn pid_branches_on_momentum() {
        let sel = track_selection();
        // p = pt at eta = 0
        assert!(sel.selects(&track(0.5, 0., 0b10, 4)));
        assert!(!sel.selects(&track(0.5, 0., 0b10, 4 | 8)));
        assert!(!sel.selects(&track(0.5, 0., 0b10, 2)));
        assert!(sel.selects(&track(1.0, 0., 0b10, 2)));
        assert!(!sel.selects(&track(1.0, 0., 0b10, 4)));
        // pt = 0.6 is below threshold, but p = pt cosh(0.7) is above
        assert!(sel.selects(&track(0.6, 0.7, 0b10, 2)));
    }

    #[test]
    fn kinematic_windows_exclude_bounds() {
        let sel = track_selection();
        assert!(!sel.selects(&track(1.0, 0.8, 0b10, 2)));
        assert!(sel.selects(&track(1.0, 0.79, 0b10, 2)));
    }

    #[test]
    fn pt_dependent_curve_replaces_window() {
        let mut sel = track_selection();
        sel.fit_var = FitVarSelection::PtDependent(PtCurve::default());
        let mut rec = track(1.0, 0., 0b10, 2);
        rec.temp_fit_var = -0.045;
        assert!(sel.selects(&rec));
        rec.temp_fit_var = 0.05;
        assert!(!sel.selects(&rec));
    }

    #[test]
    fn charge_masks_test_antiparticle_first() {
        let masks = ChargeMasks {
            particle: 0b10,
            antiparticle: 0b01,
        };
        assert_eq!(masks.classify(0b10), Some(Charge::Particle));
        assert_eq!(masks.classify(0b01), Some(Charge::Antiparticle));
        assert_eq!(masks.classify(0b11), Some(Charge::Antiparticle));
        assert_eq!(masks.classify(0b100), None);

        let sign_bit = ChargeMasks {
            particle: 0,
            antiparticle: 1,
        };
        assert_eq!(sign_bit.classify(0b100), Some(Charge::Particle));
        assert_eq!(sign_bit.classify(0b101), Some(Charge::Antiparticle));
    }

    #[test]
    fn identify_needs_an_exact_match() {
        let masks = ChargeMasks {
            particle: 0b100,
            antiparticle: 0b100,
        };
        assert_eq!(masks.identify(0b100), Some(Charge::Particle));
        assert_eq!(masks.identify(0b10100), None);
        assert_eq!(masks.classify(0b10100), Some(Charge::Antiparticle));
    }

    #[test]
    fn v0s_are_classified_by_mass() {
        let sel = V0Selection {
            mass: Window::new(1.08, 1.15),
            anti_mass: Window::new(1.08, 1.15),
        };
        let mut v0 = track(1., 0., 0, 0);
        v0.species = Species::V0;
        v0.mass = 1.11;
        v0.mass_alt = 1.3;
        assert_eq!(sel.classify(&v0), Some(Charge::Particle));
        v0.mass = 1.3;
        v0.mass_alt = 1.11;
        assert_eq!(sel.classify(&v0), Some(Charge::Antiparticle));
        v0.mass_alt = 1.3;
        assert_eq!(sel.classify(&v0), None);
    }
}
