//! Output - the graph sink.
//!
//! Two inputs, left and right, and no signal processing of its own. The
//! registry creates exactly one Output module at slot 0; rendering always
//! starts here, and [`Registry::channel_into`](crate::registry::Registry::channel_into)
//! reads the stereo channels straight from these parameters. Rendering
//! refreshes the parameters once per sample so cancelling or removing a
//! source leaves the last observed value behind, same as any other module.

use std::any::Any;

use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;

pub struct OutputDsp;

impl Dsp for OutputDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        for i in 0..block.len() {
            block.update_input_vals(i);
        }
        // The sink's own output buffer is never read by anyone.
        block.out.fill(0.0);
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
        Param::constant(0.0), // left
        Param::constant(0.0), // right
    ]
}

pub(crate) fn build(name: &str, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Output,
        default_params(),
        Box::new(OutputDsp),
        block_size,
    )
}
