//! White noise source.
//!
//! Uniformly distributed samples rescaled into `[range_low, range_high]`.
//! The generator is a seeded [`StdRng`] so a patch reloaded with the same
//! seed replays the same sequence.

use std::any::Any;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::PatchError;
use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const RANGE_LOW: usize = 0;
pub const RANGE_HIGH: usize = 1;

pub struct NoiseDsp {
    seed: u64,
    rng: StdRng,
}

impl NoiseDsp {
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().gen())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for NoiseDsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Dsp for NoiseDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        for i in 0..block.len() {
            block.update_input_vals(i);
            let low = block.params[RANGE_LOW].value();
            let high = block.params[RANGE_HIGH].value();
            let unit: f32 = self.rng.gen(); // [0, 1)
            block.out[i] = low + unit * (high - low);
        }
    }

    fn write_state(&self, out: &mut Vec<String>) {
        out.push(format!("seed {}", self.seed));
    }

    fn read_state(&mut self, lines: &[String]) -> Result<(), PatchError> {
        for line in lines {
            match line.split_once(' ') {
                Some(("seed", value)) => {
                    let seed = value
                        .parse()
                        .map_err(|_| PatchError::BadNumber(value.to_string()))?;
                    *self = NoiseDsp::with_seed(seed);
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
        Param::constant(-1.0), // range_low
        Param::constant(1.0),  // range_high
    ]
}

pub(crate) fn build(name: &str, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Noise,
        default_params(),
        Box::new(NoiseDsp::new()),
        block_size,
    )
}
