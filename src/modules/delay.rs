//! Delay - interpolated circular-buffer delay line with feedback.
//!
//! The line is sized from the `max_delay_ms` parameter and is resized (and
//! zero-filled) from the control thread when that parameter is set; the
//! render path never allocates. The read head sits a fractional
//! `delay_samples` behind the write cursor and is linearly interpolated, so
//! live delay-time modulation stays smooth.
//!
//! Guard: a delay time beyond the configured maximum skips processing for
//! that buffer and logs a warning - the previous output stays in place until
//! the configuration is corrected.

use std::any::Any;

use tracing::warn;

use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const SIGNAL: usize = 0;
pub const DELAY_TIME_MS: usize = 1;
pub const MAX_DELAY_MS: usize = 2;
pub const FEEDBACK: usize = 3;
pub const WET_DRY: usize = 4;

const DEFAULT_MAX_DELAY_MS: f32 = 1000.0;

pub struct DelayDsp {
    buffer: Vec<f32>,
    write_cursor: usize,
    sample_rate: f32,
}

impl DelayDsp {
    pub fn new(sample_rate: f32) -> Self {
        let mut dsp = Self {
            buffer: Vec::new(),
            write_cursor: 0,
            sample_rate,
        };
        dsp.resize(DEFAULT_MAX_DELAY_MS);
        dsp
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Size the line for `max_delay_ms`, clearing any held audio.
    fn resize(&mut self, max_delay_ms: f32) {
        let samples = (max_delay_ms.max(1.0) / 1000.0 * self.sample_rate).ceil() as usize;
        self.buffer.clear();
        self.buffer.resize(samples.max(1), 0.0);
        self.write_cursor = 0;
    }

    /// Linearly interpolated read at a fractional offset behind the cursor.
    #[inline]
    fn read(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let mut position = self.write_cursor as f32 - delay_samples;
        while position < 0.0 {
            position += len as f32;
        }
        let base = position.floor();
        let frac = position - base;
        let i0 = base as usize % len;
        let i1 = (i0 + 1) % len;
        self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac
    }
}

impl Dsp for DelayDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        // Configuration guard, checked against the quantum's first values.
        block.update_input_vals(0);
        let delay_ms = block.params[DELAY_TIME_MS].value();
        let max_ms = block.params[MAX_DELAY_MS].value();
        if delay_ms > max_ms {
            warn!(
                delay_ms,
                max_ms, "delay time exceeds max delay time; skipping buffer"
            );
            return;
        }

        let len = self.buffer.len();
        for i in 0..block.len() {
            block.update_input_vals(i);
            let dry = block.params[SIGNAL].value();
            let delay_samples = block.params[DELAY_TIME_MS].value() / 1000.0 * self.sample_rate;
            let feedback = block.params[FEEDBACK].value();
            let wet_dry = block.params[WET_DRY].value();

            let wet = self.read(delay_samples);
            block.out[i] = (1.0 - wet_dry) * dry + wet_dry * wet;
            self.buffer[self.write_cursor] = feedback * wet + dry;
            self.write_cursor = (self.write_cursor + 1) % len;
        }
    }

    fn control_changed(&mut self, index: usize, value: f32) {
        if index == MAX_DELAY_MS {
            self.resize(value);
        }
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
        Param::constant(0.0),                  // signal
        Param::constant(250.0),                // delay_time_ms
        Param::constant(DEFAULT_MAX_DELAY_MS), // max_delay_ms
        Param::constant(0.3),                  // feedback
        Param::constant(0.5),                  // wet_dry
    ]
}

pub(crate) fn build(name: &str, sample_rate: f32, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Delay,
        default_params(),
        Box::new(DelayDsp::new(sample_rate)),
        block_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceView;

    const SR: f32 = 44100.0;

    fn render_sample(dsp: &mut DelayDsp, params: &mut [Param], input: f32) -> f32 {
        params[SIGNAL].set_constant(input);
        let mut out = [0.0f32];
        let mut block = Block {
            params,
            out: &mut out,
            sources: SourceView::empty(),
            sample_rate: SR,
        };
        dsp.render(&mut block);
        out[0]
    }

    #[test]
    fn test_fully_dry_is_bit_exact_passthrough() {
        let mut dsp = DelayDsp::new(SR);
        let mut params = default_params();
        params[WET_DRY].set_constant(0.0);

        for n in 0..1000 {
            let input = ((n * 37) % 100) as f32 / 100.0 - 0.5;
            let out = render_sample(&mut dsp, &mut params, input);
            assert_eq!(out, input, "sample {n} not passed through dry");
        }
    }

    #[test]
    fn test_fully_wet_no_feedback_is_pure_delay() {
        let mut dsp = DelayDsp::new(SR);
        let mut params = default_params();
        params[WET_DRY].set_constant(1.0);
        params[FEEDBACK].set_constant(0.0);
        // Integral delay keeps the interpolation exact: 100 samples
        let delay_ms = 100.0 * 1000.0 / SR;
        params[DELAY_TIME_MS].set_constant(delay_ms);

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for n in 0..300 {
            let input = (n as f32 * 0.013).sin();
            inputs.push(input);
            outputs.push(render_sample(&mut dsp, &mut params, input));
        }
        // The first 100 outputs read silence from the fresh line
        assert!(outputs[..100].iter().all(|&s| s == 0.0));
        for n in 100..300 {
            assert!(
                (outputs[n] - inputs[n - 100]).abs() < 1e-6,
                "sample {n} is not the 100-sample-old input"
            );
        }
    }

    #[test]
    fn test_feedback_produces_repeats() {
        let mut dsp = DelayDsp::new(SR);
        let mut params = default_params();
        params[WET_DRY].set_constant(1.0);
        params[FEEDBACK].set_constant(0.5);
        params[DELAY_TIME_MS].set_constant(10.0 * 1000.0 / SR); // 10 samples

        // A single unit impulse...
        let mut outputs = Vec::new();
        outputs.push(render_sample(&mut dsp, &mut params, 1.0));
        for _ in 1..40 {
            outputs.push(render_sample(&mut dsp, &mut params, 0.0));
        }
        // ...echoes at 10-sample intervals with halving amplitude
        assert!((outputs[10] - 1.0).abs() < 1e-6);
        assert!((outputs[20] - 0.5).abs() < 1e-6);
        assert!((outputs[30] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_delay_beyond_max_skips_buffer_and_keeps_stale_output() {
        let mut dsp = DelayDsp::new(SR);
        let mut params = default_params();
        params[DELAY_TIME_MS].set_constant(2000.0); // beyond the 1000 ms max

        let mut out = vec![0.125f32; 64];
        let mut block = Block {
            params: &mut params,
            out: &mut out,
            sources: SourceView::empty(),
            sample_rate: SR,
        };
        dsp.render(&mut block);
        // Untouched: the stale buffer contents survive the skipped quantum
        assert!(out.iter().all(|&s| s == 0.125));
        assert_eq!(dsp.write_cursor, 0);
    }

    #[test]
    fn test_max_delay_change_resizes_and_clears() {
        let mut dsp = DelayDsp::new(SR);
        let mut params = default_params();
        render_sample(&mut dsp, &mut params, 1.0);
        assert!(dsp.buffer.iter().any(|&s| s != 0.0));

        dsp.control_changed(MAX_DELAY_MS, 500.0);
        assert_eq!(dsp.buffer_len(), (0.5 * SR).ceil() as usize);
        assert!(dsp.buffer.iter().all(|&s| s == 0.0));
        assert_eq!(dsp.write_cursor, 0);
    }

    #[test]
    fn test_fractional_delay_interpolates() {
        let mut dsp = DelayDsp::new(SR);
        let mut params = default_params();
        params[WET_DRY].set_constant(1.0);
        params[FEEDBACK].set_constant(0.0);
        // 10.5 samples of delay
        params[DELAY_TIME_MS].set_constant(10.5 * 1000.0 / SR);

        let mut outputs = Vec::new();
        outputs.push(render_sample(&mut dsp, &mut params, 1.0));
        for _ in 1..16 {
            outputs.push(render_sample(&mut dsp, &mut params, 0.0));
        }
        // The impulse lands split across the two neighboring samples
        assert!((outputs[10] - 0.5).abs() < 1e-5);
        assert!((outputs[11] - 0.5).abs() < 1e-5);
    }
}
