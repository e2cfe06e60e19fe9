//! Reference + AM-modulated sensor generator (§4.7).
//!
//! `sensor_clean` is DSB-SC: the product of carrier and modulator, never
//! `carrier * (1 + index * m)` (§4.7, §9 — an explicitly flagged source
//! behavior, not to be silently swapped for conventional AM).

use crate::oscillator::Oscillator;

pub struct DutSample {
    pub theta_ref: f64,
    pub reference: f64,
    pub sensor_clean: f64,
    pub modulating_signal: f64,
}

pub struct DutGenerator {
    reference_osc: Oscillator,
    modulating_osc: Oscillator,
}

impl DutGenerator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            reference_osc: Oscillator::new(sample_rate),
            modulating_osc: Oscillator::new(sample_rate),
        }
    }

    pub fn reset(&mut self) {
        self.reference_osc.reset();
        self.modulating_osc.reset();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.reference_osc.set_sample_rate(sample_rate);
        self.modulating_osc.set_sample_rate(sample_rate);
    }

    /// Current reference-oscillator phase, read-only (does not advance it).
    pub fn reference_phase(&self) -> f64 {
        self.reference_osc.phase()
    }

    /// Produces one sample of the reference/sensor pair and advances both
    /// internal oscillators by one sample.
    #[inline]
    pub fn generate(
        &mut self,
        reference_frequency: f64,
        reference_amplitude: f64,
        modulating_frequency: f64,
        modulation_index: f64,
        phase_shift: f64,
        sensor_amplitude: f64,
    ) -> DutSample {
        let theta_ref = self.reference_osc.phase();
        let reference = self.reference_osc.sine(reference_frequency, reference_amplitude);

        let m = if modulation_index > 0.0 {
            self.modulating_osc.sine(modulating_frequency, 1.0)
        } else {
            self.modulating_osc.advance(modulating_frequency);
            0.0
        };

        let carrier = (theta_ref + phase_shift).sin();
        let sensor_clean = sensor_amplitude * carrier * modulation_index * m;
        let modulating_signal = sensor_amplitude * modulation_index * m;

        DutSample {
            theta_ref,
            reference,
            sensor_clean,
            modulating_signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsb_sc_not_conventional_am() {
        let mut dut = DutGenerator::new(50_000.0);
        let sample = dut.generate(100.0, 1.0, 10.0, 0.5, 0.0, 1.0);
        // At t=0 both oscillators start at phase 0, so m = sin(0) = 0 and
        // sensor_clean must be exactly zero — conventional AM would instead
        // give carrier * (1 + 0) = carrier, nonzero.
        assert_eq!(sample.modulating_signal, 0.0);
        assert_eq!(sample.sensor_clean, 0.0);
    }

    #[test]
    fn modulating_oscillator_advances_even_when_index_zero() {
        let mut dut = DutGenerator::new(50_000.0);
        for _ in 0..100 {
            dut.generate(100.0, 1.0, 10.0, 0.0, 0.0, 1.0);
        }
        assert_ne!(dut.modulating_osc.phase(), 0.0);
    }

    #[test]
    fn reset_zeros_both_oscillators() {
        let mut dut = DutGenerator::new(50_000.0);
        for _ in 0..10 {
            dut.generate(100.0, 1.0, 10.0, 0.5, 0.0, 1.0);
        }
        dut.reset();
        assert_eq!(dut.reference_osc.phase(), 0.0);
        assert_eq!(dut.modulating_osc.phase(), 0.0);
    }
}
