//! # Patchcord - a modular synthesizer core
//!
//! Signal-generating and signal-processing modules wired into an arbitrary
//! directed graph, re-evaluated once per audio buffer to produce a stereo
//! output stream. The crate is the core only: GUI, window and audio-device
//! bootstrap live in the embedding application, which talks to the core
//! through [`Engine`].
//!
//! ## Architecture
//!
//! - **[`Param`](param::Param)**: a module input, either a constant scalar
//!   or a live feed from another module's output.
//! - **[`Module`](module::Module)**: a named graph node with positional
//!   parameters, an output buffer, and boxed [`Dsp`](module::Dsp) behavior.
//! - **[`Registry`](registry::Registry)**: the slot table of all modules;
//!   graph mutation with validation (self-patch, cycles, stale handles)
//!   and memoized dependency-ordered evaluation.
//! - **[`Engine`]**: the thread-safe context the UI and the audio device
//!   layer share; one coarse lock around the registry.
//! - **[`modules`]**: the concrete DSP modules - oscillator, ADSR, filter,
//!   delay, sample-and-hold, noise, mixer, multiplier, and the output sink.
//!
//! ## Quick start
//!
//! ```rust
//! use patchcord::engine::{Engine, EngineConfig};
//! use patchcord::module::ModuleType;
//! use patchcord::modules::{multiplier, output};
//!
//! let engine = Engine::new(EngineConfig::default());
//! let osc = engine.create_module(ModuleType::Oscillator, "osc").unwrap();
//! let env = engine.create_module(ModuleType::Adsr, "env").unwrap();
//! let vca = engine.create_module(ModuleType::Multiplier, "vca").unwrap();
//!
//! engine.connect_parameter(vca, multiplier::SIGNAL, osc).unwrap();
//! engine.connect_parameter(vca, multiplier::CV, env).unwrap();
//! engine
//!     .connect_parameter(engine.output_module(), output::LEFT, vca)
//!     .unwrap();
//!
//! let mut buffer = vec![0.0f32; 2 * engine.config().block_size];
//! engine.render(&mut buffer);
//! ```

pub mod engine;
pub mod error;
pub mod module;
pub mod modules;
pub mod param;
pub mod patch;
pub mod registry;

pub use engine::{Engine, EngineConfig};
pub use error::{GraphError, PatchError};
pub use module::{ModuleId, ModuleType};
pub use registry::Registry;

/// Default audio sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Default render quantum in samples.
pub const DEFAULT_BLOCK_SIZE: usize = 512;
