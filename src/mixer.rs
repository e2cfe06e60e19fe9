//! Phase-sensitive detector: analog and digital I/Q mixer (§4.6).

use crate::math::HALF_PI;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MixerMode {
    Analog,
    Digital,
}

/// The `2/π` scale used by the digital mixer to match the fundamental
/// amplitude of a unit square wave (§4.6, §9 — documented convention, not a
/// calibrated RMS figure).
const DIGITAL_SCALE: f64 = 2.0 / core::f64::consts::PI;

#[derive(Copy, Clone, Debug)]
pub struct Mixer {
    pub mode: MixerMode,
}

impl Mixer {
    pub fn new(mode: MixerMode) -> Self {
        Self { mode }
    }

    /// Mixes sample `s` against the reference phase `theta_ref`, returning
    /// `(I, Q)`.
    #[inline]
    pub fn mix(&self, s: f64, theta_ref: f64, ref_amplitude: f64) -> (f64, f64) {
        match self.mode {
            MixerMode::Analog => (s * theta_ref.sin(), s * theta_ref.cos()),
            MixerMode::Digital => {
                if ref_amplitude > 0.0 {
                    let i = s * theta_ref.sin().signum() * DIGITAL_SCALE;
                    let q = s * (theta_ref + HALF_PI).sin().signum() * DIGITAL_SCALE;
                    (i, q)
                } else {
                    (0.0, 0.0)
                }
            }
        }
    }
}
