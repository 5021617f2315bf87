//! Module registry - the live, ordered collection of all modules.
//!
//! Slot 0 permanently holds the single Output module (the graph sink); it is
//! created with the registry and can never be removed or used as a source.
//! Other slots are allocated on insert and recycled on removal with a bumped
//! generation, so stale [`ModuleId`] handles are detected instead of
//! dangling.
//!
//! Rendering is a memoized recursive pull: [`Registry::render_block`] clears
//! every module's `processed` flag, then processes the Output module, which
//! transitively processes every live dependency exactly once per quantum.
//! Cycle-forming connections are rejected at [`Registry::connect`] time, so
//! the recursion is always bounded by the module count.

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use tracing::debug;

use crate::error::GraphError;
use crate::module::{Module, ModuleId, ModuleType};

pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) module: Option<Module>,
}

/// Read access to already rendered module outputs, handed to DSP code while
/// the rendering module itself is temporarily out of its slot.
#[derive(Clone, Copy)]
pub struct SourceView<'a> {
    slots: &'a [Slot],
}

impl<'a> SourceView<'a> {
    /// The source's output buffer, or `None` for a stale handle.
    #[inline]
    pub fn output(&self, id: ModuleId) -> Option<&'a [f32]> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.module.as_ref().map(|m| m.output())
    }

    /// A view over no modules, for driving a single module's DSP directly.
    pub fn empty() -> SourceView<'static> {
        SourceView { slots: &[] }
    }
}

/// Ordered collection of modules plus safe graph mutation.
///
/// All mutation and all rendering go through `&mut self`; the engine
/// serializes the audio callback against control-thread mutation with one
/// coarse lock around the whole registry.
pub struct Registry {
    slots: Vec<Slot>,
    sample_rate: f32,
    block_size: usize,
}

impl Registry {
    /// Handle of the Output module, valid for the registry's lifetime.
    pub const OUTPUT: ModuleId = ModuleId {
        index: 0,
        generation: 0,
    };

    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        let output = ModuleType::Output.build("output", sample_rate, block_size);
        Self {
            slots: vec![Slot {
                generation: 0,
                module: Some(output),
            }],
            sample_rate,
            block_size,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Look up a module, validating the handle's generation.
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.module.as_ref()
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.module.as_mut()
    }

    /// Find a live module by its unique name.
    pub fn find(&self, name: &str) -> Option<ModuleId> {
        self.ids().find(|&id| {
            self.module(id)
                .map(|m| m.name() == name)
                .unwrap_or(false)
        })
    }

    /// Handles of all live modules, in slot order (Output first).
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.module
                .as_ref()
                .map(|_| ModuleId::new(index as u32, slot.generation))
        })
    }

    /// Number of live modules, the Output module included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.module.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        false // the Output module always exists
    }

    /// Create a module and append it to the registry.
    ///
    /// Names are unique; the patch format wires connections by name.
    pub fn insert(&mut self, kind: ModuleType, name: &str) -> Result<ModuleId, GraphError> {
        if kind == ModuleType::Output {
            return Err(GraphError::OutputExists);
        }
        let module = kind.build(name, self.sample_rate, self.block_size);
        self.insert_raw(module)
    }

    pub(crate) fn insert_raw(&mut self, module: Module) -> Result<ModuleId, GraphError> {
        let name = module.name();
        // Names are written verbatim into the patch text: one line each,
        // with `-` reserved as the no-source sentinel.
        if name.is_empty() || name == "-" || name.contains('\n') || name.contains('\r') {
            return Err(GraphError::InvalidName(name.to_string()));
        }
        if self.find(name).is_some() {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
        // Reuse a freed slot if one exists; its generation was already
        // bumped at removal time.
        let index = self
            .slots
            .iter()
            .position(|s| s.module.is_none())
            .unwrap_or_else(|| {
                self.slots.push(Slot {
                    generation: 0,
                    module: None,
                });
                self.slots.len() - 1
            });
        debug!(name = module.name(), slot = index, "module inserted");
        self.slots[index].module = Some(module);
        Ok(ModuleId::new(index as u32, self.slots[index].generation))
    }

    /// Remove a module, detaching every parameter anywhere that points at it.
    ///
    /// Detached parameters revert to constants holding their last observed
    /// numeric value. The Output module is never removable.
    pub fn remove(&mut self, id: ModuleId) -> Result<(), GraphError> {
        if id.index == 0 {
            return Err(GraphError::RemoveOutput);
        }
        if self.module(id).is_none() {
            return Err(GraphError::StaleHandle(id.index));
        }
        for slot in &mut self.slots {
            if let Some(module) = slot.module.as_mut() {
                for index in 0..module.params().len() {
                    if module.param(index).and_then(|p| p.source()) == Some(id) {
                        if let Some(param) = module.param_mut(index) {
                            param.cancel();
                        }
                    }
                }
            }
        }
        let slot = &mut self.slots[id.index as usize];
        if let Some(module) = slot.module.take() {
            debug!(name = module.name(), slot = id.index, "module removed");
        }
        slot.generation = slot.generation.wrapping_add(1);
        Ok(())
    }

    /// Set a parameter to a constant, detaching any live source.
    pub fn set_value(
        &mut self,
        id: ModuleId,
        param_index: usize,
        value: f32,
    ) -> Result<(), GraphError> {
        let module = self
            .module_mut(id)
            .ok_or(GraphError::StaleHandle(id.index))?;
        if param_index >= module.params().len() {
            return Err(GraphError::BadParamIndex {
                module: module.name().to_string(),
                index: param_index,
            });
        }
        module.set_constant(param_index, value);
        Ok(())
    }

    /// Attach `source`'s output to `target`'s parameter.
    ///
    /// Rejected without state change if the source is the Output module, the
    /// target itself, a stale handle, or if the new edge would close a
    /// feedback loop.
    pub fn connect(
        &mut self,
        target: ModuleId,
        param_index: usize,
        source: ModuleId,
    ) -> Result<(), GraphError> {
        let target_name = self
            .module(target)
            .ok_or(GraphError::StaleHandle(target.index))?
            .name()
            .to_string();
        let source_name = self
            .module(source)
            .ok_or(GraphError::StaleHandle(source.index))?
            .name()
            .to_string();
        if source.index == 0 {
            return Err(GraphError::OutputAsSource);
        }
        if source == target {
            return Err(GraphError::SelfPatch(target_name));
        }
        let param_count = self.module(target).map(|m| m.params().len()).unwrap_or(0);
        if param_index >= param_count {
            return Err(GraphError::BadParamIndex {
                module: target_name,
                index: param_index,
            });
        }
        if self.would_cycle(source, target) {
            return Err(GraphError::WouldCycle {
                from: source_name,
                target: target_name,
            });
        }
        if let Some(module) = self.module_mut(target) {
            if let Some(param) = module.param_mut(param_index) {
                param.attach(source);
            }
        }
        Ok(())
    }

    /// Detach a live source, retaining the last observed value.
    pub fn cancel_input(&mut self, id: ModuleId, param_index: usize) -> Result<(), GraphError> {
        let module = self
            .module_mut(id)
            .ok_or(GraphError::StaleHandle(id.index))?;
        match module.param_mut(param_index) {
            Some(param) => {
                param.cancel();
                Ok(())
            }
            None => Err(GraphError::BadParamIndex {
                module: module.name().to_string(),
                index: param_index,
            }),
        }
    }

    /// Would adding the edge `source -> target` close a feedback loop?
    ///
    /// Builds the dependency digraph over live connections plus the
    /// candidate edge and runs a topological sort; a sort failure means the
    /// candidate edge closes a cycle.
    fn would_cycle(&self, source: ModuleId, target: ModuleId) -> bool {
        let mut graph = DiGraph::<u32, ()>::new();
        let indices: Vec<_> = (0..self.slots.len())
            .map(|i| graph.add_node(i as u32))
            .collect();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(module) = slot.module.as_ref() {
                for dep in module.live_sources() {
                    graph.add_edge(indices[dep.index as usize], indices[index], ());
                }
            }
        }
        graph.add_edge(
            indices[source.index as usize],
            indices[target.index as usize],
            (),
        );
        toposort(&graph, None).is_err()
    }

    /// Remove every module except Output and reset Output's inputs.
    /// Used when a loaded patch replaces the current one.
    pub fn clear(&mut self) {
        for slot in self.slots[1..].iter_mut() {
            if slot.module.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        if let Some(output) = self.slots[0].module.as_mut() {
            for index in 0..output.params().len() {
                output.set_constant(index, 0.0);
            }
        }
    }

    /// Evaluate the whole graph for one render quantum.
    ///
    /// Clears every module's `processed` flag, then pulls the Output module,
    /// which recursively pulls its live dependencies. Each module's DSP runs
    /// exactly once per quantum no matter how many dependents pull it.
    pub fn render_block(&mut self) {
        for slot in &mut self.slots {
            if let Some(module) = slot.module.as_mut() {
                module.processed = false;
            }
        }
        self.process(Self::OUTPUT);
    }

    /// Memoized recursive pull of one module.
    fn process(&mut self, id: ModuleId) {
        let deps: Vec<ModuleId> = match self.module(id) {
            Some(module) if !module.processed => module.live_sources().collect(),
            _ => return,
        };
        for dep in deps {
            let pending = self.module(dep).map(|m| !m.processed).unwrap_or(false);
            if pending {
                self.process(dep);
            }
        }
        // Take the module out of its slot so its DSP can read every other
        // module's output while writing its own.
        let index = id.index as usize;
        let Some(mut module) = self.slots[index].module.take() else {
            return;
        };
        module.render(SourceView { slots: &self.slots }, self.sample_rate);
        self.slots[index].module = Some(module);
    }

    /// Fill `out` with one channel of the Output module's input.
    ///
    /// `param_index` is [`modules::output::LEFT`](crate::modules::output::LEFT)
    /// or [`RIGHT`](crate::modules::output::RIGHT). Live inputs copy the
    /// source's rendered buffer; constant inputs fill with the constant.
    pub fn channel_into(&self, param_index: usize, out: &mut [f32]) {
        let view = SourceView { slots: &self.slots };
        let param = self
            .module(Self::OUTPUT)
            .and_then(|m| m.param(param_index).copied());
        match param {
            Some(param) => match param.source().and_then(|s| view.output(s)) {
                Some(buffer) => out.copy_from_slice(&buffer[..out.len()]),
                None => out.fill(param.value()),
            },
            None => out.fill(0.0),
        }
    }
}
