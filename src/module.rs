//! Module - a node in the signal graph.
//!
//! A [`Module`] owns a name, an ordered list of [`Param`] inputs, an output
//! buffer one render quantum long, a per-quantum `processed` flag, and a
//! boxed [`Dsp`] implementation holding module-specific state (oscillator
//! phase, envelope stage, delay line, filter history...). The registry walks
//! modules by [`ModuleId`] handle; DSP code sees only a [`Block`] view of its
//! own parameters, its own output buffer, and read access to the already
//! rendered outputs of its sources.

use std::any::Any;

use crate::error::PatchError;
use crate::modules;
use crate::param::Param;
use crate::registry::SourceView;

/// Non-owning, generational handle to a module slot in the registry.
///
/// Removal bumps the slot's generation, so handles held by the UI layer (or
/// by other modules' parameters) go stale instead of dangling; every
/// dereference validates the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ModuleId {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index, for diagnostics only.
    pub fn index(&self) -> u32 {
        self.index
    }

    #[cfg(test)]
    pub(crate) fn for_test(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Closed set of module kinds. Doubles as the patch-format type tag and the
/// factory the UI layer creates modules through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Output,
    Oscillator,
    Adsr,
    Filter,
    Delay,
    SampleHold,
    Noise,
    Mixer,
    Multiplier,
}

impl ModuleType {
    /// Stable text tag used by the patch format.
    pub fn tag(self) -> &'static str {
        match self {
            ModuleType::Output => "output",
            ModuleType::Oscillator => "oscillator",
            ModuleType::Adsr => "adsr",
            ModuleType::Filter => "filter",
            ModuleType::Delay => "delay",
            ModuleType::SampleHold => "sample_hold",
            ModuleType::Noise => "noise",
            ModuleType::Mixer => "mixer",
            ModuleType::Multiplier => "multiplier",
        }
    }

    /// Inverse of [`ModuleType::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "output" => ModuleType::Output,
            "oscillator" => ModuleType::Oscillator,
            "adsr" => ModuleType::Adsr,
            "filter" => ModuleType::Filter,
            "delay" => ModuleType::Delay,
            "sample_hold" => ModuleType::SampleHold,
            "noise" => ModuleType::Noise,
            "mixer" => ModuleType::Mixer,
            "multiplier" => ModuleType::Multiplier,
            _ => return None,
        })
    }

    /// Build a module of this kind with its default parameters.
    pub(crate) fn build(self, name: &str, sample_rate: f32, block_size: usize) -> Module {
        match self {
            ModuleType::Output => modules::output::build(name, block_size),
            ModuleType::Oscillator => modules::oscillator::build(name, sample_rate, block_size),
            ModuleType::Adsr => modules::adsr::build(name, block_size),
            ModuleType::Filter => modules::filter::build(name, block_size),
            ModuleType::Delay => modules::delay::build(name, sample_rate, block_size),
            ModuleType::SampleHold => modules::sample_hold::build(name, block_size),
            ModuleType::Noise => modules::noise::build(name, block_size),
            ModuleType::Mixer => modules::mixer::build(name, block_size),
            ModuleType::Multiplier => modules::multiplier::build(name, block_size),
        }
    }
}

/// Per-quantum view handed to a module's DSP code.
///
/// Borrows the module's own parameters and output buffer mutably, plus read
/// access to every other module's already rendered output for this quantum.
pub struct Block<'a> {
    pub params: &'a mut [Param],
    pub out: &'a mut [f32],
    pub sources: SourceView<'a>,
    pub sample_rate: f32,
}

impl Block<'_> {
    /// Samples in this render quantum.
    #[inline]
    pub fn len(&self) -> usize {
        self.out.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Refresh every live parameter from its source's output at `index`.
    ///
    /// Called once per sample inside each DSP loop, not once per buffer:
    /// live sources are allowed to change value within a single quantum.
    #[inline]
    pub fn update_input_vals(&mut self, index: usize) {
        for param in self.params.iter_mut() {
            if let Some(source) = param.source() {
                if let Some(buffer) = self.sources.output(source) {
                    param.refresh(buffer[index]);
                }
            }
        }
    }
}

/// Behavior of one module kind: fill the output buffer once per quantum.
///
/// Implementations must complete in time proportional to the buffer length
/// and must not allocate, block, or perform I/O inside [`Dsp::render`]; they
/// run on the real-time audio callback.
pub trait Dsp: Send {
    /// Fill `block.out` for one render quantum. All live sources have
    /// already been rendered for this quantum.
    fn render(&mut self, block: &mut Block<'_>);

    /// Control-thread notification that a parameter was set to a constant.
    /// Runs under the registry lock, off the render path, so resizing and
    /// allocation are allowed here (the delay line uses this).
    fn control_changed(&mut self, _index: usize, _value: f32) {}

    /// Append module-specific patch state lines (`key value` per line).
    fn write_state(&self, _out: &mut Vec<String>) {}

    /// Restore module-specific patch state written by [`Dsp::write_state`].
    fn read_state(&mut self, _lines: &[String]) -> Result<(), PatchError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A named node in the signal graph.
pub struct Module {
    name: String,
    kind: ModuleType,
    params: Vec<Param>,
    output: Vec<f32>,
    pub(crate) processed: bool,
    dsp: Box<dyn Dsp>,
}

impl Module {
    pub(crate) fn new(
        name: &str,
        kind: ModuleType,
        params: Vec<Param>,
        dsp: Box<dyn Dsp>,
        block_size: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            params,
            output: vec![0.0; block_size],
            processed: false,
            dsp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleType {
        self.kind
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&Param> {
        self.params.get(index)
    }

    pub(crate) fn param_mut(&mut self, index: usize) -> Option<&mut Param> {
        self.params.get_mut(index)
    }

    /// The module's output buffer as rendered by the last quantum.
    pub fn output(&self) -> &[f32] {
        &self.output
    }

    /// Ids of all modules currently feeding this module's live parameters.
    pub(crate) fn live_sources(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.params.iter().filter_map(|p| p.source())
    }

    /// Set a parameter constant and notify the DSP state.
    pub(crate) fn set_constant(&mut self, index: usize, value: f32) {
        self.params[index].set_constant(value);
        self.dsp.control_changed(index, value);
    }

    /// Run this module's DSP over one quantum and mark it processed.
    pub(crate) fn render(&mut self, sources: SourceView<'_>, sample_rate: f32) {
        let mut block = Block {
            params: &mut self.params,
            out: &mut self.output,
            sources,
            sample_rate,
        };
        self.dsp.render(&mut block);
        self.processed = true;
    }

    /// Module-specific patch state lines.
    pub(crate) fn write_state(&self, out: &mut Vec<String>) {
        self.dsp.write_state(out);
    }

    pub(crate) fn read_state(&mut self, lines: &[String]) -> Result<(), PatchError> {
        self.dsp.read_state(lines)
    }

    /// Downcast access to the concrete DSP state, for module-specific
    /// controls (oscillator waveform, filter mode, envelope reset).
    pub fn dsp<T: 'static>(&self) -> Option<&T> {
        self.dsp.as_any().downcast_ref::<T>()
    }

    pub fn dsp_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.dsp.as_any_mut().downcast_mut::<T>()
    }
}
