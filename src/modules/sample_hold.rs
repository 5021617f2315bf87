//! Sample-and-hold - periodic capture of an input signal.
//!
//! Every `hold_time_ms` the module samples its input and holds that value on
//! its output until the next capture. The countdown starts expired, so the
//! first rendered sample always captures. Changing the hold time while a
//! countdown is running does not cut the current hold short; the new period
//! applies from the next capture on.

use std::any::Any;

use crate::error::PatchError;
use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const SIGNAL: usize = 0;
pub const HOLD_TIME_MS: usize = 1;

pub struct SampleHoldDsp {
    held: f32,
    countdown_ms: f32,
}

impl SampleHoldDsp {
    pub fn new() -> Self {
        Self {
            held: 0.0,
            countdown_ms: 0.0,
        }
    }

    pub fn held(&self) -> f32 {
        self.held
    }
}

impl Default for SampleHoldDsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Dsp for SampleHoldDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        let ms_per_sample = 1000.0 / block.sample_rate;
        for i in 0..block.len() {
            block.update_input_vals(i);
            if self.countdown_ms <= 0.0 {
                self.held = block.params[SIGNAL].value();
                self.countdown_ms = block.params[HOLD_TIME_MS].value().max(ms_per_sample);
            }
            block.out[i] = self.held;
            self.countdown_ms -= ms_per_sample;
        }
    }

    fn write_state(&self, out: &mut Vec<String>) {
        out.push(format!("held {}", self.held));
        out.push(format!("countdown_ms {}", self.countdown_ms));
    }

    fn read_state(&mut self, lines: &[String]) -> Result<(), PatchError> {
        for line in lines {
            match line.split_once(' ') {
                Some(("held", value)) => {
                    self.held = value
                        .parse()
                        .map_err(|_| PatchError::BadNumber(value.to_string()))?;
                }
                Some(("countdown_ms", value)) => {
                    self.countdown_ms = value
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
        Param::constant(0.0),   // signal
        Param::constant(100.0), // hold_time_ms
    ]
}

pub(crate) fn build(name: &str, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::SampleHold,
        default_params(),
        Box::new(SampleHoldDsp::new()),
        block_size,
    )
}
