//! Multiplier - signal times control voltage, with a dry/wet amount.
//!
//! `out = (1 - amount) * signal + amount * signal * cv`. At `amount = 1`
//! this is a ring modulator (or a VCA when the cv is a unipolar envelope);
//! at `amount = 0` the signal passes through untouched.

use std::any::Any;

use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const SIGNAL: usize = 0;
pub const CV: usize = 1;
pub const AMOUNT: usize = 2;

pub struct MultiplierDsp;

impl Dsp for MultiplierDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        for i in 0..block.len() {
            block.update_input_vals(i);
            let signal = block.params[SIGNAL].value();
            let cv = block.params[CV].value();
            let amount = block.params[AMOUNT].value();
            block.out[i] = (1.0 - amount) * signal + amount * signal * cv;
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
        Param::constant(0.0), // signal
        Param::constant(1.0), // cv
        Param::constant(1.0), // amount
    ]
}

pub(crate) fn build(name: &str, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Multiplier,
        default_params(),
        Box::new(MultiplierDsp),
        block_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceView;

    const SR: f32 = 44100.0;

    fn render(params: &mut [Param], samples: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; samples];
        let mut block = Block {
            params,
            out: &mut out,
            sources: SourceView::empty(),
            sample_rate: SR,
        };
        MultiplierDsp.render(&mut block);
        out
    }

    #[test]
    fn test_full_amount_multiplies() {
        let mut params = default_params();
        params[SIGNAL].set_constant(0.5);
        params[CV].set_constant(-0.5);
        let out = render(&mut params, 16);
        assert!(out.iter().all(|&s| s == -0.25));
    }

    #[test]
    fn test_zero_amount_passes_signal() {
        let mut params = default_params();
        params[SIGNAL].set_constant(0.5);
        params[CV].set_constant(-0.5);
        params[AMOUNT].set_constant(0.0);
        let out = render(&mut params, 16);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_half_amount_blends() {
        let mut params = default_params();
        params[SIGNAL].set_constant(1.0);
        params[CV].set_constant(0.0);
        params[AMOUNT].set_constant(0.5);
        // Half dry (1.0) plus half wet (1.0 * 0.0)
        let out = render(&mut params, 16);
        assert!(out.iter().all(|&s| s == 0.5));
    }
}
