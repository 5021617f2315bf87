//! Biquad filter - RBJ Audio EQ Cookbook lowpass / bandpass / highpass.
//!
//! Coefficients are recomputed once per buffer from the cutoff and Q
//! parameter values at the start of the quantum:
//! `w0 = 2pi * cutoff / sample_rate`, `alpha = sin(w0) / (2Q)`, then the
//! standard cookbook sets per mode. Per sample the direct-form-I difference
//! equation runs over a two-sample input/output history:
//! `y = (b0/a0)x + (b1/a0)x1 + (b2/a0)x2 - (a1/a0)y1 - (a2/a0)y2`.

use std::any::Any;
use std::f32::consts::TAU;

use crate::error::PatchError;
use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const SIGNAL: usize = 0;
pub const CUTOFF: usize = 1;
pub const Q: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Bandpass,
    Highpass,
}

impl FilterMode {
    pub fn tag(self) -> &'static str {
        match self {
            FilterMode::Lowpass => "lowpass",
            FilterMode::Bandpass => "bandpass",
            FilterMode::Highpass => "highpass",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "lowpass" => FilterMode::Lowpass,
            "bandpass" => FilterMode::Bandpass,
            "highpass" => FilterMode::Highpass,
            _ => return None,
        })
    }
}

pub struct FilterDsp {
    mode: FilterMode,
    // two-sample input/output history
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl FilterDsp {
    pub fn new() -> Self {
        Self {
            mode: FilterMode::Lowpass,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    /// Clear the filter history.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for FilterDsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Dsp for FilterDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        // Coefficients once per buffer, from the quantum's first values.
        block.update_input_vals(0);
        let cutoff = block.params[CUTOFF].value().clamp(1.0, block.sample_rate * 0.45);
        let q = block.params[Q].value().max(0.01);

        let w0 = TAU * cutoff / block.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2) = match self.mode {
            FilterMode::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterMode::Bandpass => (q * alpha, 0.0, -q * alpha),
            FilterMode::Highpass => {
                let b1 = -(1.0 + cos_w0);
                (-b1 / 2.0, b1, -b1 / 2.0)
            }
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        for i in 0..block.len() {
            block.update_input_vals(i);
            let x = block.params[SIGNAL].value();
            let y = (b0 / a0) * x + (b1 / a0) * self.x1 + (b2 / a0) * self.x2
                - (a1 / a0) * self.y1
                - (a2 / a0) * self.y2;
            block.out[i] = y;
            self.x2 = self.x1;
            self.x1 = x;
            self.y2 = self.y1;
            self.y1 = y;
        }
    }

    fn write_state(&self, out: &mut Vec<String>) {
        out.push(format!("mode {}", self.mode.tag()));
    }

    fn read_state(&mut self, lines: &[String]) -> Result<(), PatchError> {
        for line in lines {
            match line.split_once(' ') {
                Some(("mode", tag)) => {
                    self.mode = FilterMode::from_tag(tag)
                        .ok_or_else(|| PatchError::BadState(line.clone()))?;
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
        Param::constant(0.0),    // signal
        Param::constant(1000.0), // cutoff (Hz)
        Param::constant(0.707),  // Q (Butterworth)
    ]
}

pub(crate) fn build(name: &str, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Filter,
        default_params(),
        Box::new(FilterDsp::new()),
        block_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceView;

    const SR: f32 = 44100.0;

    fn render(dsp: &mut FilterDsp, params: &mut [Param], samples: usize) -> Vec<f32> {
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
    fn test_lowpass_passes_dc() {
        let mut dsp = FilterDsp::new();
        let mut params = default_params();
        params[SIGNAL].set_constant(1.0);
        // Let the filter settle, then check unity gain at DC
        let out = render(&mut dsp, &mut params, 4096);
        let settled = *out.last().unwrap();
        assert!(
            (settled - 1.0).abs() < 1e-3,
            "DC gain should be 1, got {settled}"
        );
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut dsp = FilterDsp::new();
        dsp.set_mode(FilterMode::Highpass);
        let mut params = default_params();
        params[SIGNAL].set_constant(1.0);
        let out = render(&mut dsp, &mut params, 4096);
        let settled = *out.last().unwrap();
        assert!(settled.abs() < 1e-3, "DC should be blocked, got {settled}");
    }

    #[test]
    fn test_bandpass_blocks_dc() {
        let mut dsp = FilterDsp::new();
        dsp.set_mode(FilterMode::Bandpass);
        let mut params = default_params();
        params[SIGNAL].set_constant(1.0);
        let out = render(&mut dsp, &mut params, 4096);
        assert!(out.last().unwrap().abs() < 1e-3);
    }

    #[test]
    fn test_lowpass_attenuates_above_cutoff() {
        // 100 Hz cutoff vs an 8 kHz input tone: heavy attenuation expected
        let mut dsp = FilterDsp::new();
        let mut params = default_params();
        params[CUTOFF].set_constant(100.0);

        let mut peak = 0.0f32;
        for block_index in 0..8 {
            let mut out = vec![0.0f32; 512];
            let mut input = vec![0.0f32; 512];
            for (i, sample) in input.iter_mut().enumerate() {
                let n = (block_index * 512 + i) as f32;
                *sample = (std::f32::consts::TAU * 8000.0 * n / SR).sin();
            }
            for i in 0..512 {
                params[SIGNAL].set_constant(input[i]);
                let mut block = Block {
                    params: &mut params,
                    out: &mut out[i..i + 1],
                    sources: SourceView::empty(),
                    sample_rate: SR,
                };
                dsp.render(&mut block);
            }
            if block_index > 2 {
                peak = peak.max(out.iter().fold(0.0f32, |a, &b| a.max(b.abs())));
            }
        }
        assert!(peak < 0.01, "8 kHz leaked through 100 Hz lowpass: {peak}");
    }

    #[test]
    fn test_filter_stays_stable() {
        let mut dsp = FilterDsp::new();
        let mut params = default_params();
        params[Q].set_constant(20.0);
        params[SIGNAL].set_constant(1.0);
        let out = render(&mut dsp, &mut params, 8192);
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut dsp = FilterDsp::new();
        let mut params = default_params();
        params[SIGNAL].set_constant(1.0);
        render(&mut dsp, &mut params, 64);
        dsp.reset();
        assert_eq!((dsp.x1, dsp.x2, dsp.y1, dsp.y2), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_state_round_trip() {
        let mut dsp = FilterDsp::new();
        dsp.set_mode(FilterMode::Bandpass);
        let mut lines = Vec::new();
        dsp.write_state(&mut lines);

        let mut restored = FilterDsp::new();
        restored.read_state(&lines).unwrap();
        assert_eq!(restored.mode(), FilterMode::Bandpass);
    }
}
