//! Engine - the top-level context tying the graph to its two callers.
//!
//! An [`Engine`] owns the [`Registry`] behind one coarse mutex. The audio
//! device layer calls [`Engine::render`] once per buffer; the UI layer calls
//! the control methods (create/remove/set/connect/cancel and the typed
//! module-specific accessors). Every operation takes the lock for its full
//! duration, so the audio callback always sees a consistent graph and a
//! mid-mutation graph is never rendered.
//!
//! There is no global state; anything that needs the synthesizer holds an
//! `Arc<Engine>`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::info;

use crate::error::{GraphError, PatchError};
use crate::module::{ModuleId, ModuleType};
use crate::modules::adsr::AdsrDsp;
use crate::modules::filter::{FilterDsp, FilterMode};
use crate::modules::oscillator::{OscillatorDsp, Waveform};
use crate::modules::output;
use crate::patch;
use crate::registry::Registry;

/// Fixed audio configuration, established at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            block_size: crate::DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Registry plus render scratch, guarded together so the render path never
/// allocates.
struct Inner {
    registry: Registry,
    left: Vec<f32>,
    right: Vec<f32>,
}

pub struct Engine {
    config: EngineConfig,
    inner: Mutex<Inner>,
    audio_on: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        info!(
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            "engine created"
        );
        Self {
            config,
            inner: Mutex::new(Inner {
                registry: Registry::new(config.sample_rate, config.block_size),
                left: vec![0.0; config.block_size],
                right: vec![0.0; config.block_size],
            }),
            audio_on: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Handle of the permanent Output module.
    pub fn output_module(&self) -> ModuleId {
        Registry::OUTPUT
    }

    // A panic while holding the lock leaves the registry in whatever state
    // the panicking operation reached, which is still structurally valid;
    // recover the guard rather than poisoning the audio callback forever.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- control surface -------------------------------------------------

    pub fn create_module(&self, kind: ModuleType, name: &str) -> Result<ModuleId, GraphError> {
        self.lock().registry.insert(kind, name)
    }

    pub fn remove_module(&self, id: ModuleId) -> Result<(), GraphError> {
        self.lock().registry.remove(id)
    }

    pub fn set_parameter(&self, id: ModuleId, index: usize, value: f32) -> Result<(), GraphError> {
        self.lock().registry.set_value(id, index, value)
    }

    pub fn connect_parameter(
        &self,
        target: ModuleId,
        index: usize,
        source: ModuleId,
    ) -> Result<(), GraphError> {
        self.lock().registry.connect(target, index, source)
    }

    pub fn cancel_parameter(&self, id: ModuleId, index: usize) -> Result<(), GraphError> {
        self.lock().registry.cancel_input(id, index)
    }

    pub fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.lock().registry.find(name)
    }

    /// A copy of the module's last rendered output buffer (for scopes and
    /// meters). Copied, never aliased into the graph.
    pub fn output_copy(&self, id: ModuleId) -> Option<Vec<f32>> {
        self.lock().registry.module(id).map(|m| m.output().to_vec())
    }

    // --- module-specific controls ----------------------------------------

    pub fn set_waveform(&self, id: ModuleId, waveform: Waveform) -> Result<(), GraphError> {
        self.with_dsp::<OscillatorDsp, _>(id, "an oscillator", |dsp| dsp.set_waveform(waveform))
    }

    pub fn set_filter_mode(&self, id: ModuleId, mode: FilterMode) -> Result<(), GraphError> {
        self.with_dsp::<FilterDsp, _>(id, "a filter", |dsp| {
            dsp.set_mode(mode);
            dsp.reset();
        })
    }

    /// Force an ADSR back to the start of its attack.
    pub fn reset_envelope(&self, id: ModuleId) -> Result<(), GraphError> {
        self.with_dsp::<AdsrDsp, _>(id, "an envelope", AdsrDsp::reset)
    }

    fn with_dsp<T: 'static, F: FnOnce(&mut T)>(
        &self,
        id: ModuleId,
        expected: &'static str,
        apply: F,
    ) -> Result<(), GraphError> {
        let mut inner = self.lock();
        let module = inner
            .registry
            .module_mut(id)
            .ok_or(GraphError::StaleHandle(id.index()))?;
        let name = module.name().to_string();
        match module.dsp_mut::<T>() {
            Some(dsp) => {
                apply(dsp);
                Ok(())
            }
            None => Err(GraphError::WrongKind {
                module: name,
                expected,
            }),
        }
    }

    // --- patch persistence ------------------------------------------------

    pub fn patch_text(&self) -> String {
        patch::write_patch(&self.lock().registry)
    }

    pub fn apply_patch_text(&self, text: &str) -> Result<(), PatchError> {
        patch::read_patch(&mut self.lock().registry, text)
    }

    pub fn save_patch(&self, path: impl AsRef<Path>) -> Result<(), PatchError> {
        std::fs::write(path, self.patch_text())?;
        Ok(())
    }

    pub fn load_patch(&self, path: impl AsRef<Path>) -> Result<(), PatchError> {
        let text = std::fs::read_to_string(path)?;
        self.apply_patch_text(&text)
    }

    // --- audio surface ----------------------------------------------------

    pub fn audio_on(&self) -> bool {
        self.audio_on.load(Ordering::Relaxed)
    }

    /// Flip the audio toggle. When off, [`Engine::render`] emits silence
    /// without touching the graph.
    pub fn set_audio_on(&self, on: bool) {
        self.audio_on.store(on, Ordering::Relaxed);
    }

    /// Evaluate one render quantum into an interleaved stereo buffer of
    /// `2 * block_size` samples.
    pub fn render(&self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), 2 * self.config.block_size);
        if !self.audio_on() {
            out.fill(0.0);
            return;
        }
        let mut inner = self.lock();
        let inner = &mut *inner;
        inner.registry.render_block();
        inner.registry.channel_into(output::LEFT, &mut inner.left);
        inner.registry.channel_into(output::RIGHT, &mut inner.right);
        for (i, frame) in out.chunks_exact_mut(2).enumerate() {
            frame[0] = inner.left[i];
            frame[1] = inner.right[i];
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
