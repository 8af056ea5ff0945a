//! Stochastic flicker model for incandescent nixie tubes.
//!
//! Every frame, each tube is either lit ([`Material::On`]), dimmed
//! ([`Material::Half`]) or dark ([`Material::Off`]). A tube that starts
//! flickering stays dark for a random number of frames, occasionally showing a
//! dim flash while it recovers. A tube never starts flickering while either of
//! its (cyclic) neighbours is still dark at the start of the frame.
//!
//! All randomness is drawn from the RNG passed in by the caller, so seeding
//! that RNG reproduces a sequence exactly.

use crate::{Error, Result};
use rand::Rng;


/// Material applied to the lit filament of a tube for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    On,
    Half,
    Off,
}

impl Material {
    /// Single-character glyph used when logging a frame pattern.
    pub const fn glyph(self) -> char {
        match self {
            Self::On => '█',
            Self::Half => '░',
            Self::Off => '_',
        }
    }
}

/// Probabilities and durations driving the flicker model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Chances {
    /// Per-tube, per-frame probability of starting a flicker.
    pub start: f64,
    /// Probability of showing a dim flash instead of going fully dark.
    pub skip_dim: f64,
    /// Shortest flicker, in frames. Zero yields a single-frame flash.
    pub duration_min: u32,
    /// Longest flicker, in frames (inclusive).
    pub duration_max: u32,
}

impl Default for Chances {
    fn default() -> Self {
        Self {
            start: 0.01,
            skip_dim: 0.5,
            duration_min: 0,
            duration_max: 5,
        }
    }
}

impl Chances {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a probability is outside `[0, 1]`
    /// or the duration bounds are inverted.
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [("start", self.start), ("skip_dim", self.skip_dim)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::invalid_config(format!(
                    "flicker probability `{name}` must be within [0, 1], got {p}"
                )));
            }
        }
        if self.duration_min > self.duration_max {
            return Err(Error::invalid_config(format!(
                "flicker duration_min ({}) exceeds duration_max ({})",
                self.duration_min, self.duration_max
            )));
        }
        Ok(())
    }
}

/// State of one tube at one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TubeFlicker {
    pub material: Material,
    /// Frames of darkness still owed after this one.
    pub remaining_off_frames: u32,
}

/// Per-tube states for a single frame, leftmost tube first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlickerFrame {
    pub tubes: Vec<TubeFlicker>,
}

impl FlickerFrame {
    pub fn materials(&self) -> Vec<Material> {
        self.tubes.iter().map(|t| t.material).collect()
    }

    /// Compact rendering such as `██░█_███` for logs.
    pub fn pattern(&self) -> String {
        self.tubes.iter().map(|t| t.material.glyph()).collect()
    }
}

/// Countdown state carried from one frame to the next.
///
/// Only reachable through [`FlickerGenerator`], which validates the
/// [`Chances`] it advances with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FlickerState {
    remaining: Vec<u32>,
}

impl FlickerState {
    /// All tubes lit, no flicker in progress.
    pub(crate) fn new(digits: usize) -> Self {
        Self {
            remaining: vec![0; digits],
        }
    }

    /// Resumes from explicit per-tube countdowns.
    #[cfg(test)]
    pub(crate) fn from_remaining(remaining: Vec<u32>) -> Self {
        Self { remaining }
    }

    /// Advances one frame and returns the resulting per-tube states.
    ///
    /// Neighbour suppression reads the countdowns as they were *before* this
    /// frame, never a neighbour's value updated earlier in the same pass.
    pub(crate) fn advance<R>(&mut self, chances: &Chances, rng: &mut R) -> FlickerFrame
    where
        R: Rng + ?Sized,
    {
        let previous = self.remaining.clone();
        let n = previous.len();
        let mut tubes = Vec::with_capacity(n);

        for i in 0..n {
            let mut material = Material::On;

            if previous[i] > 0 {
                self.remaining[i] = previous[i] - 1;
                material = Material::Off;
                // Dim flash ahead of reactivation.
                if self.remaining[i] > 0 && rng.random::<f64>() < chances.skip_dim {
                    material = Material::Half;
                }
            }

            let neighbour_active = previous[(i + n - 1) % n] > 0 || previous[(i + 1) % n] > 0;
            if rng.random::<f64>() < chances.start && !neighbour_active {
                self.remaining[i] = rng.random_range(chances.duration_min..=chances.duration_max);
                material = if rng.random::<f64>() < chances.skip_dim {
                    Material::Half
                } else {
                    Material::Off
                };
            }

            tubes.push(TubeFlicker {
                material,
                remaining_off_frames: self.remaining[i],
            });
        }

        FlickerFrame { tubes }
    }
}

/// Produces the per-frame flicker sequence for one animation.
///
/// The generator is stateless between calls: each call to
/// [`generate`](Self::generate) starts from all tubes lit.
#[derive(Clone, Debug)]
pub struct FlickerGenerator {
    digits: usize,
    chances: Chances,
}

impl FlickerGenerator {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero-width display or invalid
    /// [`Chances`].
    pub fn new(digits: usize, chances: Chances) -> Result<Self> {
        if digits == 0 {
            return Err(Error::invalid_config("display must have at least one tube"));
        }
        chances.validate()?;
        Ok(Self { digits, chances })
    }

    pub fn digits(&self) -> usize {
        self.digits
    }

    pub fn chances(&self) -> &Chances {
        &self.chances
    }

    /// Generates `total_frames` consecutive frames.
    pub fn generate<R>(&self, rng: &mut R, total_frames: usize) -> Vec<FlickerFrame>
    where
        R: Rng + ?Sized,
    {
        let mut state = FlickerState::new(self.digits);
        (0..total_frames)
            .map(|_| state.advance(&self.chances, rng))
            .collect()
    }
}
