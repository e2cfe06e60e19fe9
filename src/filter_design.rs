//! Butterworth LP/HP and RBJ-cookbook BPF biquad design (§4.4).

use crate::biquad::BiquadCoefs;
use crate::error::EngineError;

/// Butterworth Q values for a 4th-order (two-section) cascade.
const BUTTERWORTH_4_Q: [f64; 2] = [0.5412, 1.3066];
const BUTTERWORTH_2_Q: f64 = core::f64::consts::FRAC_1_SQRT_2;

/// Empirical per-section bandwidth widening for a 4th-order band-pass so the
/// composite -3 dB bandwidth matches the requested target (§4.4, §9).
const BPF_4TH_ORDER_BANDWIDTH_FACTOR: f64 = 1.55;

fn check_corner(f: f64, sample_rate: f64) -> Result<(), EngineError> {
    let nyquist = sample_rate / 2.0;
    if f > 0.0 && f < nyquist {
        Ok(())
    } else {
        Err(EngineError::InvalidCorner(f, nyquist))
    }
}

fn one_pole_lowpass(sample_rate: f64, cutoff: f64) -> BiquadCoefs {
    let k = (core::f64::consts::PI * cutoff / sample_rate).tan();
    let a0 = k + 1.0;
    let b0 = k / a0;
    let a1 = (k - 1.0) / a0;
    BiquadCoefs::new(b0, b0, 0.0, a1, 0.0)
}

fn one_pole_highpass(sample_rate: f64, cutoff: f64) -> BiquadCoefs {
    let k = (core::f64::consts::PI * cutoff / sample_rate).tan();
    let a0 = k + 1.0;
    let b0 = 1.0 / a0;
    let a1 = (k - 1.0) / a0;
    BiquadCoefs::new(b0, -b0, 0.0, a1, 0.0)
}

fn rbj_lowpass(sample_rate: f64, cutoff: f64, q: f64) -> BiquadCoefs {
    let omega = core::f64::consts::TAU * cutoff / sample_rate;
    let (sin_w, cos_w) = (omega.sin(), omega.cos());
    let alpha = sin_w / (2.0 * q);
    let a0 = 1.0 + alpha;
    BiquadCoefs::new(
        ((1.0 - cos_w) / 2.0) / a0,
        (1.0 - cos_w) / a0,
        ((1.0 - cos_w) / 2.0) / a0,
        (-2.0 * cos_w) / a0,
        (1.0 - alpha) / a0,
    )
}

fn rbj_highpass(sample_rate: f64, cutoff: f64, q: f64) -> BiquadCoefs {
    let omega = core::f64::consts::TAU * cutoff / sample_rate;
    let (sin_w, cos_w) = (omega.sin(), omega.cos());
    let alpha = sin_w / (2.0 * q);
    let a0 = 1.0 + alpha;
    BiquadCoefs::new(
        ((1.0 + cos_w) / 2.0) / a0,
        (-(1.0 + cos_w)) / a0,
        ((1.0 + cos_w) / 2.0) / a0,
        (-2.0 * cos_w) / a0,
        (1.0 - alpha) / a0,
    )
}

/// Constant-skirt-gain-peak-=-0-dB band-pass section (RBJ cookbook), given
/// `Q = center / bandwidth`.
fn rbj_bandpass(sample_rate: f64, center: f64, q: f64) -> BiquadCoefs {
    let omega = core::f64::consts::TAU * center / sample_rate;
    let (sin_w, cos_w) = (omega.sin(), omega.cos());
    let alpha = sin_w / (2.0 * q);
    let a0 = 1.0 + alpha;
    BiquadCoefs::new(
        alpha / a0,
        0.0,
        -alpha / a0,
        (-2.0 * cos_w) / a0,
        (1.0 - alpha) / a0,
    )
}

/// Designs a low-pass Butterworth cascade. `order` is 1, 2, or 4.
pub fn design_lowpass(sample_rate: f64, cutoff: f64, order: u32) -> Result<Vec<BiquadCoefs>, EngineError> {
    check_corner(cutoff, sample_rate)?;
    Ok(match order {
        1 => vec![one_pole_lowpass(sample_rate, cutoff)],
        2 => vec![rbj_lowpass(sample_rate, cutoff, BUTTERWORTH_2_Q)],
        4 => BUTTERWORTH_4_Q
            .iter()
            .map(|&q| rbj_lowpass(sample_rate, cutoff, q))
            .collect(),
        _ => vec![rbj_lowpass(sample_rate, cutoff, BUTTERWORTH_2_Q)],
    })
}

/// Designs a high-pass Butterworth cascade. `order` is 1, 2, or 4.
pub fn design_highpass(sample_rate: f64, cutoff: f64, order: u32) -> Result<Vec<BiquadCoefs>, EngineError> {
    check_corner(cutoff, sample_rate)?;
    Ok(match order {
        1 => vec![one_pole_highpass(sample_rate, cutoff)],
        2 => vec![rbj_highpass(sample_rate, cutoff, BUTTERWORTH_2_Q)],
        4 => BUTTERWORTH_4_Q
            .iter()
            .map(|&q| rbj_highpass(sample_rate, cutoff, q))
            .collect(),
        _ => vec![rbj_highpass(sample_rate, cutoff, BUTTERWORTH_2_Q)],
    })
}

/// Designs a constant-skirt-gain band-pass cascade. `order` is 1, 2, or 4;
/// a 4th-order cascade widens each section's bandwidth by
/// `BPF_4TH_ORDER_BANDWIDTH_FACTOR` so the composite -3 dB bandwidth tracks
/// the requested `bandwidth` (§4.4, an explicitly approximate correction).
pub fn design_bandpass(
    sample_rate: f64,
    center: f64,
    bandwidth: f64,
    order: u32,
) -> Result<Vec<BiquadCoefs>, EngineError> {
    check_corner(center, sample_rate)?;
    let q = center / bandwidth;
    Ok(match order {
        4 => {
            let wide_q = center / (bandwidth * BPF_4TH_ORDER_BANDWIDTH_FACTOR);
            vec![
                rbj_bandpass(sample_rate, center, wide_q),
                rbj_bandpass(sample_rate, center, wide_q),
            ]
        }
        _ => vec![rbj_bandpass(sample_rate, center, q)],
    })
}

/// Phase response `arg(H(e^{jω}))` of a single section at `f` Hz.
pub fn phase_response(coefs: &BiquadCoefs, f: f64, sample_rate: f64) -> f64 {
    coefs.response(f, sample_rate).arg()
}

/// Sum of phase responses across a cascade.
pub fn cascaded_phase(sections: &[BiquadCoefs], f: f64, sample_rate: f64) -> f64 {
    sections.iter().map(|c| phase_response(c, f, sample_rate)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnitude(sections: &[BiquadCoefs], f: f64, fs: f64) -> f64 {
        sections
            .iter()
            .map(|c| c.response(f, fs).norm())
            .product()
    }

    #[test]
    fn lowpass_has_unit_gain_at_dc() {
        for order in [1, 2, 4] {
            let sections = design_lowpass(50_000.0, 10.0, order).unwrap();
            let mag = magnitude(&sections, 1e-6, 50_000.0);
            assert!((mag - 1.0).abs() < 1e-6, "order {order} mag {mag}");
        }
    }

    #[test]
    fn bandpass_order2_near_unity_at_center() {
        let sections = design_bandpass(50_000.0, 100.0, 50.0, 2).unwrap();
        let mag = magnitude(&sections, 100.0, 50_000.0);
        assert!((mag - 1.0).abs() < 1e-2, "mag {mag}");
    }

    #[test]
    fn bandpass_order4_near_unity_at_center_within_corrected_tolerance() {
        let sections = design_bandpass(50_000.0, 100.0, 50.0, 4).unwrap();
        let mag = magnitude(&sections, 100.0, 50_000.0);
        assert!((mag - 1.0).abs() < 5e-2, "mag {mag}");
    }

    #[test]
    fn invalid_corner_is_rejected() {
        assert!(design_lowpass(50_000.0, 0.0, 2).is_err());
        assert!(design_lowpass(50_000.0, 30_000.0, 2).is_err());
        assert!(design_bandpass(50_000.0, -5.0, 50.0, 2).is_err());
    }

    #[test]
    fn cascaded_phase_sums_sections() {
        let sections = design_lowpass(50_000.0, 10.0, 4).unwrap();
        let individual: f64 = sections.iter().map(|c| phase_response(c, 10.0, 50_000.0)).sum();
        assert_eq!(cascaded_phase(&sections, 10.0, 50_000.0), individual);
    }
}
