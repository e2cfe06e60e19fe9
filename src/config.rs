//! Parameter types, validation clamps, and update diffs (§3, §4.14).

use crate::interferer::InterfererSpec;
use crate::math::{clamp, clamp_min, normalize_degrees_360};
use crate::mixer::MixerMode;

#[derive(Clone, Debug, PartialEq)]
pub struct SignalSourceParams {
    pub reference_frequency: f64,
    pub reference_amplitude: f64,
    pub modulating_frequency: f64,
    pub modulation_index: f64,
    pub phase_shift_deg: f64,
    pub sensor_output_amplitude: f64,
    pub white_noise_amplitude: f64,
    pub interferers: Vec<InterfererSpec>,
}

impl SignalSourceParams {
    /// Applies the §4.14 clamp table in place.
    pub fn clamp(&mut self) {
        self.reference_frequency = clamp(self.reference_frequency, 1.0, 1000.0);
        self.reference_amplitude = clamp_min(self.reference_amplitude, 0.0);
        self.modulating_frequency = clamp_min(self.modulating_frequency, 0.1);
        self.modulation_index = clamp(self.modulation_index, 0.0, 1.0);
        self.phase_shift_deg = normalize_degrees_360(self.phase_shift_deg);
        self.sensor_output_amplitude = clamp_min(self.sensor_output_amplitude, 0.0);
        self.white_noise_amplitude = clamp_min(self.white_noise_amplitude, 0.0);
    }
}

impl Default for SignalSourceParams {
    fn default() -> Self {
        Self {
            reference_frequency: 100.0,
            reference_amplitude: 1.0,
            modulating_frequency: 10.0,
            modulation_index: 0.5,
            phase_shift_deg: 0.0,
            sensor_output_amplitude: 1.0,
            white_noise_amplitude: 0.1,
            interferers: Vec::new(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FilterOrder {
    One = 1,
    Two = 2,
    Four = 4,
}

impl FilterOrder {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BandPassFilterParams {
    pub enabled: bool,
    pub center_frequency: f64,
    pub bandwidth: f64,
    pub order: FilterOrder,
}

impl BandPassFilterParams {
    pub fn clamp(&mut self) {
        self.center_frequency = clamp_min(self.center_frequency, 1.0);
        self.bandwidth = clamp_min(self.bandwidth, 1.0);
    }
}

impl Default for BandPassFilterParams {
    fn default() -> Self {
        Self {
            enabled: true,
            center_frequency: 100.0,
            bandwidth: 50.0,
            order: FilterOrder::Two,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LowPassFilterParams {
    pub cutoff_frequency: f64,
    pub order: FilterOrder,
}

impl LowPassFilterParams {
    pub fn clamp(&mut self) {
        self.cutoff_frequency = clamp_min(self.cutoff_frequency, 0.1);
    }
}

impl Default for LowPassFilterParams {
    fn default() -> Self {
        Self {
            cutoff_frequency: 10.0,
            order: FilterOrder::Two,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MixerParams {
    pub mode: MixerMode,
}

impl Default for MixerParams {
    fn default() -> Self {
        Self {
            mode: MixerMode::Analog,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub sample_rate: f64,
    pub ring_capacity: usize,
    pub snapshot_points: usize,
    pub snapshot_rate: f64,
    /// `timeScale` in ms/div, used by the trigger holdoff window (§4.11).
    pub time_scale_ms: f64,
}

impl EngineSettings {
    pub fn clamp(&mut self) {
        self.time_scale_ms = clamp(self.time_scale_ms, 1.0, 200.0);
        if self.ring_capacity < self.snapshot_points {
            self.ring_capacity = self.snapshot_points;
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: 50_000.0,
            ring_capacity: 100_000,
            snapshot_points: 10_000,
            snapshot_rate: 30.0,
            time_scale_ms: 50.0,
        }
    }
}

/// Full parameter snapshot handed to `Start` (§3).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EngineParams {
    pub signal: SignalSourceParams,
    pub bpf: BandPassFilterParams,
    pub lpf: LowPassFilterParams,
    pub mixer: MixerParams,
    pub engine: EngineSettings,
}

impl EngineParams {
    pub fn clamp(&mut self) {
        self.signal.clamp();
        self.bpf.clamp();
        self.lpf.clamp();
        self.engine.clamp();
    }
}

/// Records which fields actually changed from an `UpdateParams` call, so
/// `ChainRunner` can decide whether to reset accumulators/filters/rings
/// (§4.10).
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangedFields {
    pub reference_frequency: bool,
    pub bpf: bool,
    pub lpf: bool,
    pub mixer_mode: bool,
    pub modulating_frequency: bool,
    pub interferers_shape: bool,
    pub interferers_amplitude_only: bool,
}

impl ChangedFields {
    /// True if any change requires resetting accumulators/filters/rings
    /// (§4.10: "any of {referenceFrequency, BPF params, LPF params, Mixer
    /// mode, modulatingFrequency, interferer list}").
    pub fn requires_hard_reset(&self) -> bool {
        self.reference_frequency
            || self.bpf
            || self.lpf
            || self.mixer_mode
            || self.modulating_frequency
            || self.interferers_shape
    }
}

/// Partial update, field-wise shallow merge (§4.14). `interferers` replaces
/// the whole list when present.
#[derive(Clone, Debug, Default)]
pub struct ParamsDiff {
    pub reference_frequency: Option<f64>,
    pub reference_amplitude: Option<f64>,
    pub modulating_frequency: Option<f64>,
    pub modulation_index: Option<f64>,
    pub phase_shift_deg: Option<f64>,
    pub sensor_output_amplitude: Option<f64>,
    pub white_noise_amplitude: Option<f64>,
    pub interferers: Option<Vec<InterfererSpec>>,
    pub bpf_enabled: Option<bool>,
    pub bpf_center_frequency: Option<f64>,
    pub bpf_bandwidth: Option<f64>,
    pub bpf_order: Option<FilterOrder>,
    pub lpf_cutoff_frequency: Option<f64>,
    pub lpf_order: Option<FilterOrder>,
    pub mixer_mode: Option<MixerMode>,
}

impl ParamsDiff {
    /// Applies this diff to `params` in place, clamps the result, and
    /// reports which fields actually changed (value differs from before
    /// clamping was applied to the new value).
    pub fn apply_to(&self, params: &mut EngineParams) -> ChangedFields {
        let mut changed = ChangedFields::default();

        if let Some(v) = self.reference_frequency {
            if v != params.signal.reference_frequency {
                changed.reference_frequency = true;
            }
            params.signal.reference_frequency = v;
        }
        if let Some(v) = self.reference_amplitude {
            params.signal.reference_amplitude = v;
        }
        if let Some(v) = self.modulating_frequency {
            if v != params.signal.modulating_frequency {
                changed.modulating_frequency = true;
            }
            params.signal.modulating_frequency = v;
        }
        if let Some(v) = self.modulation_index {
            params.signal.modulation_index = v;
        }
        if let Some(v) = self.phase_shift_deg {
            params.signal.phase_shift_deg = v;
        }
        if let Some(v) = self.sensor_output_amplitude {
            params.signal.sensor_output_amplitude = v;
        }
        if let Some(v) = self.white_noise_amplitude {
            params.signal.white_noise_amplitude = v;
        }
        if let Some(ref specs) = self.interferers {
            let same_shape = specs.len() == params.signal.interferers.len()
                && specs
                    .iter()
                    .zip(params.signal.interferers.iter())
                    .all(|(a, b)| a.frequency == b.frequency);
            if same_shape {
                changed.interferers_amplitude_only = true;
            } else {
                changed.interferers_shape = true;
            }
            params.signal.interferers = specs.clone();
        }

        if let Some(v) = self.bpf_enabled {
            if v != params.bpf.enabled {
                changed.bpf = true;
            }
            params.bpf.enabled = v;
        }
        if let Some(v) = self.bpf_center_frequency {
            if v != params.bpf.center_frequency {
                changed.bpf = true;
            }
            params.bpf.center_frequency = v;
        }
        if let Some(v) = self.bpf_bandwidth {
            if v != params.bpf.bandwidth {
                changed.bpf = true;
            }
            params.bpf.bandwidth = v;
        }
        if let Some(v) = self.bpf_order {
            if v != params.bpf.order {
                changed.bpf = true;
            }
            params.bpf.order = v;
        }

        if let Some(v) = self.lpf_cutoff_frequency {
            if v != params.lpf.cutoff_frequency {
                changed.lpf = true;
            }
            params.lpf.cutoff_frequency = v;
        }
        if let Some(v) = self.lpf_order {
            if v != params.lpf.order {
                changed.lpf = true;
            }
            params.lpf.order = v;
        }

        if let Some(v) = self.mixer_mode {
            if v != params.mixer.mode {
                changed.mixer_mode = true;
            }
            params.mixer.mode = v;
        }

        params.clamp();
        changed
    }
}
