//! Oscillator - the fundamental signal source.
//!
//! Generates sine, triangle, saw, or pulse waves at a live-modulatable
//! frequency. Phase lives in [0, 1) as an `f64` accumulator. The
//! `phase_offset` parameter is an instantaneous phase nudge: the oscillator
//! tracks the *delta* of the parameter between samples and adds that delta
//! directly to the phase, so a constant offset bends the waveform once
//! rather than shifting it permanently.
//!
//! For `|frequency| >= 1` the three fixed-shape waves are read from a
//! precomputed one-second wavetable at 1 Hz (index `phase * sample_rate`),
//! which is behaviorally equivalent to direct evaluation. The pulse wave is
//! always evaluated analytically because its duty cycle is a live parameter.

use std::any::Any;
use std::f64::consts::TAU;

use crate::error::PatchError;
use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const FREQUENCY: usize = 0;
pub const PHASE_OFFSET: usize = 1;
pub const PULSE_WIDTH: usize = 2;
pub const RANGE_LOW: usize = 3;
pub const RANGE_HIGH: usize = 4;

/// Waveform shapes. Pulse duty cycle comes from the `pulse_width` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Pulse,
}

impl Waveform {
    pub fn tag(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Saw => "saw",
            Waveform::Pulse => "pulse",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "sine" => Waveform::Sine,
            "triangle" => Waveform::Triangle,
            "saw" => Waveform::Saw,
            "pulse" => Waveform::Pulse,
            _ => return None,
        })
    }
}

/// One-second tables at 1 Hz for the fixed-shape waves.
struct Wavetables {
    sine: Vec<f32>,
    triangle: Vec<f32>,
    saw: Vec<f32>,
}

impl Wavetables {
    fn new(sample_rate: f32) -> Self {
        let len = sample_rate as usize;
        let mut sine = Vec::with_capacity(len);
        let mut triangle = Vec::with_capacity(len);
        let mut saw = Vec::with_capacity(len);
        for j in 0..len {
            let phase = j as f64 / len as f64;
            sine.push((TAU * phase).sin() as f32);
            triangle.push(triangle_wave(phase) as f32);
            saw.push((2.0 * phase - 1.0) as f32);
        }
        Self {
            sine,
            triangle,
            saw,
        }
    }

    #[inline]
    fn lookup(&self, waveform: Waveform, phase: f64) -> f32 {
        let table = match waveform {
            Waveform::Sine => &self.sine,
            Waveform::Triangle => &self.triangle,
            Waveform::Saw => &self.saw,
            // Pulse is never table-driven
            Waveform::Pulse => &self.sine,
        };
        let index = (phase * table.len() as f64).round() as usize % table.len();
        table[index]
    }
}

/// Linear ramp 0 -> 1 -> 0 -> -1 -> 0 across quarters of the period.
#[inline]
fn triangle_wave(phase: f64) -> f64 {
    if phase < 0.25 {
        4.0 * phase
    } else if phase < 0.75 {
        2.0 - 4.0 * phase
    } else {
        4.0 * phase - 4.0
    }
}

pub struct OscillatorDsp {
    waveform: Waveform,
    phase: f64,
    previous_phase_offset: f64,
    tables: Wavetables,
}

impl OscillatorDsp {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            waveform: Waveform::Sine,
            phase: 0.0,
            previous_phase_offset: 0.0,
            tables: Wavetables::new(sample_rate),
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f64 {
        self.phase
    }

    #[inline]
    fn evaluate(&self, phase: f64, pulse_width: f32) -> f32 {
        match self.waveform {
            Waveform::Sine => (TAU * phase).sin() as f32,
            Waveform::Triangle => triangle_wave(phase) as f32,
            Waveform::Saw => (2.0 * phase - 1.0) as f32,
            Waveform::Pulse => {
                if (phase as f32) < pulse_width {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

impl Dsp for OscillatorDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        let sample_rate = block.sample_rate as f64;
        for i in 0..block.len() {
            block.update_input_vals(i);
            let frequency = block.params[FREQUENCY].value() as f64;
            let phase_offset = block.params[PHASE_OFFSET].value() as f64;
            let pulse_width = block.params[PULSE_WIDTH].value();
            let low = block.params[RANGE_LOW].value();
            let high = block.params[RANGE_HIGH].value();

            let sample = if self.waveform != Waveform::Pulse && frequency.abs() >= 1.0 {
                self.tables.lookup(self.waveform, self.phase)
            } else {
                self.evaluate(self.phase, pulse_width)
            };
            block.out[i] = if low != -1.0 || high != 1.0 {
                low + (sample + 1.0) * 0.5 * (high - low)
            } else {
                sample
            };

            // Advance by frequency, plus the phase-offset delta since the
            // previous sample.
            self.phase += frequency / sample_rate + (phase_offset - self.previous_phase_offset);
            self.previous_phase_offset = phase_offset;
            while self.phase >= 1.0 {
                self.phase -= 1.0;
            }
            while self.phase < 0.0 {
                self.phase += 1.0;
            }
        }
    }

    fn write_state(&self, out: &mut Vec<String>) {
        out.push(format!("waveform {}", self.waveform.tag()));
        out.push(format!("phase {}", self.phase));
        // Without this a reloaded nonzero phase_offset constant would be
        // re-applied as a fresh delta on the first restored sample.
        out.push(format!(
            "previous_phase_offset {}",
            self.previous_phase_offset
        ));
    }

    fn read_state(&mut self, lines: &[String]) -> Result<(), PatchError> {
        for line in lines {
            match line.split_once(' ') {
                Some(("waveform", tag)) => {
                    self.waveform = Waveform::from_tag(tag)
                        .ok_or_else(|| PatchError::BadState(line.clone()))?;
                }
                Some(("phase", value)) => {
                    self.phase = value
                        .parse()
                        .map_err(|_| PatchError::BadNumber(value.to_string()))?;
                }
                Some(("previous_phase_offset", value)) => {
                    self.previous_phase_offset = value
                        .parse()
                        .map_err(|_| PatchError::BadNumber(value.to_string()))?;
                }
                _ => return Err(PatchError::BadState(line.clone())),
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) fn default_params() -> Vec<Param> {
    vec![
        Param::constant(440.0), // frequency (Hz)
        Param::constant(0.0),   // phase_offset
        Param::constant(0.5),   // pulse_width
        Param::constant(-1.0),  // range_low
        Param::constant(1.0),   // range_high
    ]
}

pub(crate) fn build(name: &str, sample_rate: f32, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Oscillator,
        default_params(),
        Box::new(OscillatorDsp::new(sample_rate)),
        block_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceView;
    use std::f32::consts::TAU as TAU32;

    const SR: f32 = 44100.0;

    fn render(dsp: &mut OscillatorDsp, params: &mut [Param], samples: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; samples];
        let mut block = Block {
            params,
            out: &mut out,
            sources: SourceView::empty(),
            sample_rate: SR,
        };
        dsp.render(&mut block);
        out
    }

    #[test]
    fn test_sine_440_matches_analytic() {
        let mut dsp = OscillatorDsp::new(SR);
        let mut params = default_params();
        let out = render(&mut dsp, &mut params, 512);

        for (i, &sample) in out.iter().enumerate() {
            let expected = (TAU32 * 440.0 * i as f32 / SR).sin();
            assert!(
                (sample - expected).abs() < 1e-5,
                "sample {i}: got {sample}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_sub_hertz_frequency_evaluated_analytically() {
        // Below 1 Hz the wavetable cannot resolve the phase; direct
        // evaluation takes over.
        let mut dsp = OscillatorDsp::new(SR);
        let mut params = default_params();
        params[FREQUENCY].set_constant(0.5);
        let out = render(&mut dsp, &mut params, 64);

        for (i, &sample) in out.iter().enumerate() {
            let expected = (TAU32 * 0.5 * i as f32 / SR).sin();
            assert!((sample - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_periodicity_returns_to_starting_phase() {
        // frequency f: after sample_rate / f samples the phase is back at 0
        let mut dsp = OscillatorDsp::new(SR);
        let mut params = default_params();
        params[FREQUENCY].set_constant(100.0);
        render(&mut dsp, &mut params, 441);
        let wrapped = dsp.phase().min(1.0 - dsp.phase());
        assert!(wrapped < 1e-9, "phase did not return: {}", dsp.phase());
    }

    #[test]
    fn test_triangle_shape() {
        let mut dsp = OscillatorDsp::new(SR);
        dsp.set_waveform(Waveform::Triangle);
        let mut params = default_params();
        // 1 Hz exercises the analytic path with an easily checked shape...
        params[FREQUENCY].set_constant(0.9);
        let out = render(&mut dsp, &mut params, 512);
        // ...rising through the first quarter period
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
        assert!(out[0].abs() < 1e-6);
    }

    #[test]
    fn test_pulse_width_duty_cycle() {
        let mut dsp = OscillatorDsp::new(SR);
        dsp.set_waveform(Waveform::Pulse);
        let mut params = default_params();
        params[FREQUENCY].set_constant(100.0);
        params[PULSE_WIDTH].set_constant(0.25);
        let out = render(&mut dsp, &mut params, 441);

        let high = out.iter().filter(|&&s| s > 0.0).count();
        // One full period at 100 Hz is 441 samples; a quarter of them high
        assert!(
            (high as f32 - 441.0 * 0.25).abs() <= 2.0,
            "duty cycle off: {high} high samples"
        );
        assert!(out.iter().all(|&s| s == 1.0 || s == -1.0));
    }

    #[test]
    fn test_rescale_to_unipolar_range() {
        let mut dsp = OscillatorDsp::new(SR);
        let mut params = default_params();
        params[RANGE_LOW].set_constant(0.0);
        params[RANGE_HIGH].set_constant(1.0);
        let out = render(&mut dsp, &mut params, 512);
        for &sample in &out {
            assert!((0.0..=1.0).contains(&sample), "out of range: {sample}");
        }
    }

    #[test]
    fn test_phase_offset_delta_nudges_once() {
        // A constant phase_offset adds its delta exactly once, then the
        // delta is zero and the wave continues undisturbed.
        let mut nudged = OscillatorDsp::new(SR);
        let mut reference = OscillatorDsp::new(SR);

        let mut params = default_params();
        params[PHASE_OFFSET].set_constant(0.25);
        render(&mut nudged, &mut params, 100);

        let mut ref_params = default_params();
        render(&mut reference, &mut ref_params, 100);

        let diff = (nudged.phase() - reference.phase() + 1.0) % 1.0;
        assert!((diff - 0.25).abs() < 1e-9, "phase delta was {diff}");
    }

    #[test]
    fn test_state_round_trip() {
        let mut dsp = OscillatorDsp::new(SR);
        dsp.set_waveform(Waveform::Saw);
        dsp.phase = 0.125;
        dsp.previous_phase_offset = 0.25;

        let mut lines = Vec::new();
        dsp.write_state(&mut lines);

        let mut restored = OscillatorDsp::new(SR);
        restored.read_state(&lines).unwrap();
        assert_eq!(restored.waveform(), Waveform::Saw);
        assert_eq!(restored.phase(), 0.125);
        assert_eq!(restored.previous_phase_offset, 0.25);
    }

    #[test]
    fn test_restored_state_does_not_reapply_phase_offset() {
        // A nonzero phase_offset constant was already applied before the
        // save; the restored oscillator must not nudge the phase again.
        let mut dsp = OscillatorDsp::new(SR);
        let mut params = default_params();
        params[PHASE_OFFSET].set_constant(0.25);
        render(&mut dsp, &mut params, 100);

        let mut lines = Vec::new();
        dsp.write_state(&mut lines);
        let mut restored = OscillatorDsp::new(SR);
        restored.read_state(&lines).unwrap();

        let original_out = render(&mut dsp, &mut params, 100);
        let mut restored_params = default_params();
        restored_params[PHASE_OFFSET].set_constant(0.25);
        let restored_out = render(&mut restored, &mut restored_params, 100);
        assert_eq!(original_out, restored_out);
        assert_eq!(dsp.phase(), restored.phase());
    }
}
