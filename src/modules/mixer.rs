//! Mixer - eight signal/multiplier channel pairs summed to one output.
//!
//! Only channels whose signal input is live contribute; an unpatched
//! channel is silent no matter what constant its parameters hold. Each
//! live channel is `signal * multiplier`; the multiplier defaults to 1 and
//! is itself patchable, so a channel can be amplitude-modulated without an
//! extra module. With `auto_attenuate` enabled the sum is divided by the
//! live-channel count, which keeps unity-level sources from clipping as
//! channels are patched in. The live set is fixed for the quantum;
//! connections cannot change mid-buffer.

use std::any::Any;

use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const CHANNELS: usize = 8;
pub const AUTO_ATTENUATE: usize = 2 * CHANNELS;

/// Parameter index of channel `pair`'s signal input.
#[inline]
pub const fn signal(pair: usize) -> usize {
    2 * pair
}

/// Parameter index of channel `pair`'s multiplier input.
#[inline]
pub const fn multiplier(pair: usize) -> usize {
    2 * pair + 1
}

pub struct MixerDsp;

impl Dsp for MixerDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        let mut live = [false; CHANNELS];
        let mut live_count = 0usize;
        for (pair, flag) in live.iter_mut().enumerate() {
            if block.params[signal(pair)].is_live() {
                *flag = true;
                live_count += 1;
            }
        }
        // The switch is any non-zero value
        let attenuate = block.params[AUTO_ATTENUATE].value() != 0.0 && live_count > 0;

        for i in 0..block.len() {
            block.update_input_vals(i);
            let mut sum = 0.0;
            for pair in 0..CHANNELS {
                if live[pair] {
                    sum += block.params[signal(pair)].value()
                        * block.params[multiplier(pair)].value();
                }
            }
            block.out[i] = if attenuate {
                sum / live_count as f32
            } else {
                sum
            };
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
    let mut params = Vec::with_capacity(2 * CHANNELS + 1);
    for _ in 0..CHANNELS {
        params.push(Param::constant(0.0)); // signal
        params.push(Param::constant(1.0)); // multiplier
    }
    params.push(Param::constant(0.0)); // auto_attenuate
    params
}

pub(crate) fn build(name: &str, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Mixer,
        default_params(),
        Box::new(MixerDsp),
        block_size,
    )
}
