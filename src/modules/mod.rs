//! Concrete DSP modules.
//!
//! One file per module kind, each exporting its symbolic parameter indices,
//! its `Dsp` implementation, and a `build` factory wired into
//! [`ModuleType`](crate::module::ModuleType):
//!
//! - [`oscillator`] - sine / triangle / saw / pulse source with wavetable
//!   acceleration, phase-offset nudging, and output rescaling
//! - [`adsr`] - gate-driven attack / decay / sustain / release envelope
//! - [`filter`] - RBJ cookbook biquad (lowpass, bandpass, highpass)
//! - [`delay`] - interpolated circular-buffer delay with feedback and
//!   wet/dry mix
//! - [`sample_hold`] - periodic capture-and-hold of an input signal
//! - [`noise`] - uniform white noise with range rescaling
//! - [`mixer`] - eight signal/multiplier pairs with optional auto-attenuation
//! - [`multiplier`] - ring-modulator style signal x cv with dry/wet amount
//! - [`output`] - the graph sink; two inputs (left, right), no DSP of its own

pub mod adsr;
pub mod delay;
pub mod filter;
pub mod mixer;
pub mod multiplier;
pub mod noise;
pub mod oscillator;
pub mod output;
pub mod sample_hold;
