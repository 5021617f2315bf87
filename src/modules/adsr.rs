//! ADSR envelope generator.
//!
//! A five-stage state machine (Attack, Decay, Sustain, Release, Idle) driven
//! by a boolean `note` input: the parameter reading 1 means note-on. The
//! output sample is the current amplitude written *before* the stage's
//! transition logic runs for that sample, so the stage update lags the
//! output by one sample.
//!
//! Stage steps are linear: attack climbs by `1 / (attack_s * sample_rate)`
//! per sample, decay falls toward the sustain level, and release falls by
//! `sustain / (release_s * sample_rate)` regardless of the level release
//! started from.

use std::any::Any;

use crate::error::PatchError;
use crate::module::{Block, Dsp, Module, ModuleType};
use crate::param::Param;

pub const NOTE: usize = 0;
pub const ATTACK_MS: usize = 1;
pub const DECAY_MS: usize = 2;
pub const SUSTAIN_LEVEL: usize = 3;
pub const RELEASE_MS: usize = 4;

/// Shortest usable stage time. Avoids division blowups at zero.
const MIN_STAGE_MS: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
    Idle,
}

impl Stage {
    pub fn tag(self) -> &'static str {
        match self {
            Stage::Attack => "attack",
            Stage::Decay => "decay",
            Stage::Sustain => "sustain",
            Stage::Release => "release",
            Stage::Idle => "idle",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "attack" => Stage::Attack,
            "decay" => Stage::Decay,
            "sustain" => Stage::Sustain,
            "release" => Stage::Release,
            "idle" => Stage::Idle,
            _ => return None,
        })
    }
}

pub struct AdsrDsp {
    stage: Stage,
    amplitude: f32,
}

impl AdsrDsp {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            amplitude: 0.0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Force amplitude to 0 and the stage to Attack.
    pub fn reset(&mut self) {
        self.amplitude = 0.0;
        self.stage = Stage::Attack;
    }
}

impl Default for AdsrDsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Dsp for AdsrDsp {
    fn render(&mut self, block: &mut Block<'_>) {
        let sample_rate = block.sample_rate;
        for i in 0..block.len() {
            block.update_input_vals(i);
            let note_on = block.params[NOTE].value() >= 1.0;
            let attack_s = block.params[ATTACK_MS].value().max(MIN_STAGE_MS) / 1000.0;
            let decay_s = block.params[DECAY_MS].value().max(MIN_STAGE_MS) / 1000.0;
            let sustain = block.params[SUSTAIN_LEVEL].value().clamp(0.0, 1.0);
            let release_s = block.params[RELEASE_MS].value().max(MIN_STAGE_MS) / 1000.0;

            // Output first; the transition below lags by one sample.
            block.out[i] = self.amplitude;

            match self.stage {
                Stage::Attack => {
                    if note_on {
                        self.amplitude += 1.0 / (attack_s * sample_rate);
                        if self.amplitude >= 1.0 {
                            self.amplitude = 1.0;
                            self.stage = Stage::Decay;
                        }
                    } else {
                        self.stage = Stage::Release;
                    }
                }
                Stage::Decay => {
                    if note_on {
                        self.amplitude -= (1.0 - sustain) / (decay_s * sample_rate);
                        if self.amplitude <= sustain {
                            self.amplitude = sustain;
                            self.stage = Stage::Sustain;
                        }
                    } else {
                        self.stage = Stage::Release;
                    }
                }
                Stage::Sustain => {
                    self.amplitude = sustain;
                    if !note_on {
                        self.stage = Stage::Release;
                    }
                }
                Stage::Release => {
                    if note_on {
                        self.stage = Stage::Attack;
                    } else {
                        self.amplitude -= sustain / (release_s * sample_rate);
                        if self.amplitude <= 0.0 {
                            self.amplitude = 0.0;
                            self.stage = Stage::Idle;
                        }
                    }
                }
                Stage::Idle => {
                    self.amplitude = 0.0;
                    if note_on {
                        self.stage = Stage::Attack;
                    }
                }
            }
        }
    }

    fn write_state(&self, out: &mut Vec<String>) {
        out.push(format!("amplitude {}", self.amplitude));
        out.push(format!("stage {}", self.stage.tag()));
    }

    fn read_state(&mut self, lines: &[String]) -> Result<(), PatchError> {
        for line in lines {
            match line.split_once(' ') {
                Some(("amplitude", value)) => {
                    self.amplitude = value
                        .parse()
                        .map_err(|_| PatchError::BadNumber(value.to_string()))?;
                }
                Some(("stage", tag)) => {
                    self.stage = Stage::from_tag(tag)
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
        Param::constant(0.0),   // note
        Param::constant(10.0),  // attack_ms
        Param::constant(100.0), // decay_ms
        Param::constant(0.7),   // sustain_level
        Param::constant(200.0), // release_ms
    ]
}

pub(crate) fn build(name: &str, block_size: usize) -> Module {
    Module::new(
        name,
        ModuleType::Adsr,
        default_params(),
        Box::new(AdsrDsp::new()),
        block_size,
    )
}
