//! Sum-of-sinusoids interferer bank with persistent phases (§4.3).

use crate::math::{wrap_tau, TWO_PI};
use crate::noise::{FunutdSource, UniformSource};

/// One interferer's configuration, as carried in `SignalSourceParams` (§3).
#[derive(Clone, Debug, PartialEq)]
pub struct InterfererSpec {
    pub id: u64,
    pub frequency: f64,
    pub amplitude: f64,
}

struct Voice {
    id: u64,
    frequency: f64,
    amplitude: f64,
    phase: f64,
}

/// Bank of independent sinusoids, each with a phase that persists across
/// amplitude-only updates so changing levels never introduces a
/// discontinuity (§4.3).
pub struct InterfererBank {
    sample_rate: f64,
    voices: Vec<Voice>,
}

impl InterfererBank {
    pub fn new(sample_rate: f64, specs: &[InterfererSpec]) -> Self {
        let mut source = FunutdSource::from_entropy();
        Self {
            sample_rate,
            voices: Self::build_voices(specs, &mut source),
        }
    }

    /// Constructs a bank with a caller-supplied uniform source, for
    /// reproducible tests.
    pub fn with_source<S: UniformSource>(
        sample_rate: f64,
        specs: &[InterfererSpec],
        source: &mut S,
    ) -> Self {
        Self {
            sample_rate,
            voices: Self::build_voices(specs, source),
        }
    }

    fn build_voices<S: UniformSource>(specs: &[InterfererSpec], source: &mut S) -> Vec<Voice> {
        specs
            .iter()
            .map(|spec| Voice {
                id: spec.id,
                frequency: spec.frequency,
                amplitude: spec.amplitude,
                phase: wrap_tau(source.next_uniform() * TWO_PI),
            })
            .collect()
    }

    /// Sums `amplitude_i * sin(phase_i)` over all voices, then advances each
    /// voice's phase.
    #[inline]
    pub fn generate(&mut self) -> f64 {
        let mut sum = 0.0;
        for voice in &mut self.voices {
            sum += voice.amplitude * voice.phase.sin();
            voice.phase = wrap_tau(voice.phase + TWO_PI * voice.frequency / self.sample_rate);
        }
        sum
    }

    /// Updates the bank per §4.3: if the incoming list has the same length
    /// and identical frequencies in the same order, only amplitudes are
    /// overwritten (phases preserved). Otherwise the bank is rebuilt with
    /// fresh random phases.
    pub fn update(&mut self, specs: &[InterfererSpec]) {
        let mut source = FunutdSource::from_entropy();
        self.update_with_source(specs, &mut source);
    }

    pub fn update_with_source<S: UniformSource>(&mut self, specs: &[InterfererSpec], source: &mut S) {
        let same_shape = specs.len() == self.voices.len()
            && specs
                .iter()
                .zip(self.voices.iter())
                .all(|(s, v)| s.frequency == v.frequency);
        if same_shape {
            for (spec, voice) in specs.iter().zip(self.voices.iter_mut()) {
                voice.id = spec.id;
                voice.amplitude = spec.amplitude;
            }
        } else {
            self.voices = Self::build_voices(specs, source);
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    pub fn ids(&self) -> Vec<u64> {
        self.voices.iter().map(|v| v.id).collect()
    }
}
