//! Per-sample signal chain, accumulators, parameter updates, and pacing (§4.10).

use std::time::Instant;

use crate::biquad::{BiquadChain, BiquadCoefs};
use crate::config::{BandPassFilterParams, EngineParams, LowPassFilterParams, ParamsDiff};
use crate::double_buffer::{Channel, Writer};
use crate::dut::DutGenerator;
use crate::error::EngineError;
use crate::filter_design::{cascaded_phase, design_bandpass, design_lowpass};
use crate::interferer::InterfererBank;
use crate::math::wrap_degrees_180;
use crate::mixer::Mixer;
use crate::noise::{FunutdSource, NoiseGen};
use crate::ring_buffer::RingBuffer;
use crate::scheduler;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Outputs {
    pub i: f64,
    pub q: f64,
    pub signed_output: f64,
    pub phase_deg: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReady {
    pub outputs: Outputs,
    pub effective_sample_rate: f64,
    pub data_length: usize,
}

fn build_bpf_sections(bpf: &BandPassFilterParams, sample_rate: f64) -> Result<Vec<BiquadCoefs>, EngineError> {
    if !bpf.enabled {
        return Ok(Vec::new());
    }
    design_bandpass(sample_rate, bpf.center_frequency, bpf.bandwidth, bpf.order.as_u32())
}

fn build_lpf_sections(lpf: &LowPassFilterParams, sample_rate: f64) -> Result<Vec<BiquadCoefs>, EngineError> {
    design_lowpass(sample_rate, lpf.cutoff_frequency, lpf.order.as_u32())
}

fn compute_bpf_phase_offset(
    bpf: &BandPassFilterParams,
    sections: &[BiquadCoefs],
    reference_frequency: f64,
    sample_rate: f64,
) -> f64 {
    if bpf.enabled {
        cascaded_phase(sections, reference_frequency, sample_rate)
    } else {
        0.0
    }
}

/// Owns C1-C7, one ring per channel (C8), and the output accumulator. The
/// reader side of a `DoubleBuffer` is owned by the consumer; this only ever
/// touches the `Writer` half handed to it by the facade.
pub struct ChainRunner {
    sample_rate: f64,
    params: EngineParams,
    dut: DutGenerator,
    noise: NoiseGen<FunutdSource>,
    interferers: InterfererBank,
    bpf: BiquadChain,
    lpf_i: BiquadChain,
    lpf_q: BiquadChain,
    mixer: Mixer,
    rings: Vec<RingBuffer>,
    sample_count: u64,
    i_sum: f64,
    q_sum: f64,
    avg_count: u64,
    bpf_phase_offset: f64,
    last_sample_time: Instant,
    last_publish_time: Instant,
}

impl ChainRunner {
    pub fn new(params: EngineParams) -> Result<Self, EngineError> {
        let sample_rate = params.engine.sample_rate;

        let bpf_sections = build_bpf_sections(&params.bpf, sample_rate)?;
        let bpf_phase_offset = compute_bpf_phase_offset(
            &params.bpf,
            &bpf_sections,
            params.signal.reference_frequency,
            sample_rate,
        );
        let lpf_sections = build_lpf_sections(&params.lpf, sample_rate)?;

        let interferers = InterfererBank::new(sample_rate, &params.signal.interferers);
        let rings = (0..Channel::COUNT)
            .map(|_| RingBuffer::new(params.engine.ring_capacity))
            .collect();
        let now = Instant::now();

        Ok(Self {
            sample_rate,
            dut: DutGenerator::new(sample_rate),
            noise: NoiseGen::with_source(FunutdSource::from_entropy()),
            interferers,
            bpf: BiquadChain::new(bpf_sections),
            lpf_i: BiquadChain::new(lpf_sections.clone()),
            lpf_q: BiquadChain::new(lpf_sections),
            mixer: Mixer::new(params.mixer.mode),
            rings,
            sample_count: 0,
            i_sum: 0.0,
            q_sum: 0.0,
            avg_count: 0,
            bpf_phase_offset,
            last_sample_time: now,
            last_publish_time: now,
            params,
        })
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Computes `Outputs` from the accumulator as it stands right now,
    /// without resetting it or publishing a snapshot. Intended for tests and
    /// diagnostics that want the current running average (§3 "Accumulator").
    pub fn current_averages(&self) -> Outputs {
        let i_avg = if self.avg_count > 0 {
            self.i_sum / self.avg_count as f64
        } else {
            0.0
        };
        let q_avg = if self.avg_count > 0 {
            self.q_sum / self.avg_count as f64
        } else {
            0.0
        };
        let phase_shift_rad = self.params.signal.phase_shift_deg.to_radians();
        let signed_output = i_avg * phase_shift_rad.cos() + q_avg * phase_shift_rad.sin();
        let phase_deg = wrap_degrees_180(q_avg.atan2(i_avg).to_degrees() - self.bpf_phase_offset.to_degrees());
        Outputs {
            i: i_avg,
            q: q_avg,
            signed_output,
            phase_deg,
        }
    }

    /// Copies a decimated, chronologically-ordered view of `channel`'s ring,
    /// the same way a snapshot publish would (§4.8 `snapshotInto`).
    pub fn channel_snapshot(&self, channel: Channel, max_points: usize) -> Vec<f32> {
        let mut buf = vec![0.0f32; max_points];
        let written = self.rings[channel as usize].snapshot_into(&mut buf, max_points);
        buf.truncate(written);
        buf
    }

    fn push_channel(&mut self, channel: Channel, v: f64) {
        self.rings[channel as usize].push(v);
    }

    /// Runs the §4.10 per-sample procedure once.
    #[inline]
    fn step(&mut self) {
        let signal = self.params.signal.clone();
        let phase_shift_rad = signal.phase_shift_deg.to_radians();

        let sample = self.dut.generate(
            signal.reference_frequency,
            signal.reference_amplitude,
            signal.modulating_frequency,
            signal.modulation_index,
            phase_shift_rad,
            signal.sensor_output_amplitude,
        );

        let noise = self.noise.gaussian(signal.white_noise_amplitude) + self.interferers.generate();
        let modulating_plus_noise = sample.modulating_signal + noise;
        let sensor = sample.sensor_clean + noise;
        let after_bpf = if self.params.bpf.enabled {
            self.bpf.process_scalar(sensor)
        } else {
            sensor
        };
        let (mix_i, mix_q) = self.mixer.mix(after_bpf, sample.theta_ref, signal.reference_amplitude);
        let i_filt = self.lpf_i.process_scalar(mix_i);
        let q_filt = self.lpf_q.process_scalar(mix_q);
        let signed = i_filt * phase_shift_rad.cos() + q_filt * phase_shift_rad.sin();
        let t = self.sample_count as f64 / self.sample_rate;

        self.push_channel(Channel::Reference, sample.reference);
        self.push_channel(Channel::Modulating, sample.modulating_signal);
        self.push_channel(Channel::ModulatingPlusNoise, modulating_plus_noise);
        self.push_channel(Channel::SensorClean, sample.sensor_clean);
        self.push_channel(Channel::Noise, noise);
        self.push_channel(Channel::Sensor, sensor);
        self.push_channel(Channel::AfterBpf, after_bpf);
        self.push_channel(Channel::MixerI, mix_i);
        self.push_channel(Channel::MixerQ, mix_q);
        self.push_channel(Channel::IOutput, i_filt);
        self.push_channel(Channel::QOutput, q_filt);
        self.push_channel(Channel::SignedOutput, signed);
        self.push_channel(Channel::Time, t);

        self.i_sum += i_filt;
        self.q_sum += q_filt;
        self.avg_count += 1;
        self.sample_count += 1;
    }

    /// Produces every sample "due" since the last call, capped at
    /// `MAX_SAMPLES_PER_TICK`, and returns how many were actually produced.
    pub fn process_due(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.last_sample_time).as_secs_f64();
        let n = scheduler::samples_due(elapsed, self.sample_rate);
        for _ in 0..n {
            self.step();
        }
        self.last_sample_time = now;
        n
    }

    /// Runs the per-sample procedure `n` times back to back, ignoring wall
    /// clock pacing. Used by benchmarks and by tests that need deterministic
    /// settling without a real `Instant`.
    pub fn step_n(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    /// If the snapshot interval has elapsed, decimates all rings into the
    /// writer's inactive block, publishes it, and returns the averaged
    /// scalar outputs. Returns `None` if it is not yet time to publish.
    pub fn maybe_publish(&mut self, now: Instant, writer: &mut Writer) -> Option<FrameReady> {
        let elapsed = now.saturating_duration_since(self.last_publish_time).as_secs_f64();
        if !scheduler::should_publish(elapsed, self.params.engine.snapshot_rate) {
            return None;
        }

        let max_points = writer.snapshot_points();
        let mut data_length = 0usize;
        {
            let mut guard = writer.acquire_write();
            for &channel in Channel::ALL.iter() {
                let written = self.rings[channel as usize].snapshot_into(guard.channel_mut(channel), max_points);
                data_length = written;
            }
        }
        writer.publish();

        let i_avg = if self.avg_count > 0 {
            self.i_sum / self.avg_count as f64
        } else {
            0.0
        };
        let q_avg = if self.avg_count > 0 {
            self.q_sum / self.avg_count as f64
        } else {
            0.0
        };
        let phase_shift_rad = self.params.signal.phase_shift_deg.to_radians();
        let signed_output = i_avg * phase_shift_rad.cos() + q_avg * phase_shift_rad.sin();
        let phase_deg = wrap_degrees_180(q_avg.atan2(i_avg).to_degrees() - self.bpf_phase_offset.to_degrees());

        self.i_sum = 0.0;
        self.q_sum = 0.0;
        self.avg_count = 0;
        self.last_publish_time = now;

        let stride = RingBuffer::stride_for(self.params.engine.ring_capacity, max_points);
        let effective_sample_rate = self.sample_rate / stride as f64;

        Some(FrameReady {
            outputs: Outputs {
                i: i_avg,
                q: q_avg,
                signed_output,
                phase_deg,
            },
            effective_sample_rate,
            data_length,
        })
    }

    /// Applies an `UpdateParams` diff (§4.10, §4.14). Filter corner
    /// validation runs against a candidate params snapshot before anything
    /// live is mutated, so a rejected update leaves prior coefficients and
    /// parameters untouched (§7 `InvalidCorner`).
    pub fn update_params(&mut self, diff: &ParamsDiff) -> Result<(), EngineError> {
        let mut candidate = self.params.clone();
        let changed = diff.apply_to(&mut candidate);

        let bpf_sections = if changed.bpf {
            Some(build_bpf_sections(&candidate.bpf, self.sample_rate)?)
        } else {
            None
        };
        let lpf_sections = if changed.lpf {
            Some(build_lpf_sections(&candidate.lpf, self.sample_rate)?)
        } else {
            None
        };

        self.params = candidate;

        if changed.interferers_amplitude_only {
            log::trace!("interferer amplitudes updated in place, phases preserved");
        }
        if changed.interferers_amplitude_only || changed.interferers_shape {
            self.interferers.update(&self.params.signal.interferers);
        }
        if let Some(sections) = &bpf_sections {
            log::debug!("bpf coefficients rebuilt ({} section(s))", sections.len());
            self.bpf.replace_coefficients(sections);
        }
        if let Some(sections) = &lpf_sections {
            log::debug!("lpf coefficients rebuilt ({} section(s))", sections.len());
            self.lpf_i.replace_coefficients(sections);
            self.lpf_q.replace_coefficients(sections);
        }
        if changed.mixer_mode {
            self.mixer = Mixer::new(self.params.mixer.mode);
        }

        if changed.requires_hard_reset() {
            log::debug!("hard reset: clearing accumulator, filter state, and all rings");
            self.reset();
            let sections = build_bpf_sections(&self.params.bpf, self.sample_rate)?;
            self.bpf_phase_offset = compute_bpf_phase_offset(
                &self.params.bpf,
                &sections,
                self.params.signal.reference_frequency,
                self.sample_rate,
            );
        }

        Ok(())
    }

    /// Resets the accumulator and filter state and clears all 13 rings, per
    /// §4.10's hard-reset bullet for an `UpdateParams` that changes
    /// `referenceFrequency`/BPF/LPF/mixer mode/`modulatingFrequency`/the
    /// interferer list. Does *not* touch `sample_count` or oscillator phase:
    /// `time` must stay "monotonically increasing seconds since engine
    /// start" (§6) across a reconfiguration, and the reference/modulating
    /// oscillators keep running continuously so a filter-only change
    /// introduces no signal discontinuity.
    pub fn reset(&mut self) {
        self.bpf.reset();
        self.lpf_i.reset();
        self.lpf_q.reset();
        for ring in &mut self.rings {
            ring.clear();
        }
        self.i_sum = 0.0;
        self.q_sum = 0.0;
        self.avg_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_carrier_settles_near_zero_without_modulation() {
        // S1: modulationIndex=0, noise=0, BPF off, analog mixer.
        let mut p = EngineParams::default();
        p.signal.modulation_index = 0.0;
        p.signal.white_noise_amplitude = 0.0;
        p.bpf.enabled = false;
        p.engine.ring_capacity = 5000;
        p.engine.snapshot_points = 1000;
        let mut runner = ChainRunner::new(p).unwrap();
        for _ in 0..50_000 {
            runner.step();
        }
        let i_avg = runner.i_sum / runner.avg_count as f64;
        let q_avg = runner.q_sum / runner.avg_count as f64;
        assert!(i_avg.abs() < 1e-6, "i_avg={i_avg}");
        assert!(q_avg.abs() < 1e-6, "q_avg={q_avg}");
    }

    #[test]
    fn amplitude_recovery_matches_dsb_sc_half_amplitude() {
        // S2: modulationIndex=0.5, noise=0, BPF off, analog mixer, 2s settling.
        let mut p = EngineParams::default();
        p.signal.white_noise_amplitude = 0.0;
        p.bpf.enabled = false;
        p.engine.ring_capacity = 5000;
        p.engine.snapshot_points = 1000;
        let mut runner = ChainRunner::new(p).unwrap();
        let total_samples = (2.0 * runner.sample_rate) as u64;
        for _ in 0..total_samples {
            runner.step();
        }
        let i_avg = runner.i_sum / runner.avg_count as f64;
        let q_avg = runner.q_sum / runner.avg_count as f64;
        let magnitude = (i_avg * i_avg + q_avg * q_avg).sqrt();
        assert!((0.20..=0.30).contains(&magnitude), "magnitude={magnitude}");
    }

    #[test]
    fn update_params_rejecting_invalid_corner_keeps_prior_bpf() {
        let mut p = EngineParams::default();
        p.engine.ring_capacity = 2000;
        p.engine.snapshot_points = 500;
        let mut runner = ChainRunner::new(p).unwrap();
        let before = runner.bpf.sections().to_vec();

        let diff = ParamsDiff {
            bpf_center_frequency: Some(1_000_000.0), // far above nyquist at fs=50kHz
            ..Default::default()
        };
        let result = runner.update_params(&diff);
        assert!(result.is_err());
        assert_eq!(runner.bpf.sections().to_vec().len(), before.len());
        // params themselves must also be untouched by a rejected update.
        assert_eq!(runner.params().bpf.center_frequency, 100.0);
    }

    #[test]
    fn reference_frequency_change_triggers_hard_reset() {
        let mut p = EngineParams::default();
        p.engine.ring_capacity = 200;
        p.engine.snapshot_points = 50;
        let mut runner = ChainRunner::new(p).unwrap();
        for _ in 0..100 {
            runner.step();
        }
        assert!(runner.sample_count() > 0);
        let count_before = runner.sample_count();
        let phase_before = runner.dut.reference_phase();
        let diff = ParamsDiff {
            reference_frequency: Some(200.0),
            ..Default::default()
        };
        runner.update_params(&diff).unwrap();
        // `time` (driven by sample_count) must keep increasing across a
        // filter/reference reconfiguration (§6); only the rings/accumulator
        // reset, and the reference oscillator keeps running rather than
        // snapping back to phase 0.
        assert_eq!(runner.sample_count(), count_before);
        assert_eq!(runner.dut.reference_phase(), phase_before);
        assert_eq!(runner.rings[Channel::Reference as usize].len(), 0);
    }

    #[test]
    fn interferer_amplitude_only_update_does_not_reset() {
        let mut p = EngineParams::default();
        p.engine.ring_capacity = 200;
        p.engine.snapshot_points = 50;
        p.signal.interferers = vec![crate::interferer::InterfererSpec {
            id: 1,
            frequency: 30.0,
            amplitude: 0.1,
        }];
        let mut runner = ChainRunner::new(p).unwrap();
        for _ in 0..100 {
            runner.step();
        }
        let before_count = runner.sample_count();
        let diff = ParamsDiff {
            interferers: Some(vec![crate::interferer::InterfererSpec {
                id: 1,
                frequency: 30.0,
                amplitude: 0.5,
            }]),
            ..Default::default()
        };
        runner.update_params(&diff).unwrap();
        assert_eq!(runner.sample_count(), before_count);
    }
}
