//! Parameters - the unit of connectivity in the module graph.
//!
//! Every named input of a module is a [`Param`]: either a constant scalar or
//! a live feed from another module's output buffer. A parameter is live
//! exactly when it has a source; there is no separate flag to fall out of
//! sync. When live, the value is refreshed from the source once per sample
//! (see [`Block::update_input_vals`](crate::module::Block::update_input_vals));
//! when constant, it holds whatever was last set or last observed.

use crate::module::ModuleId;

/// A single module input: constant scalar or live feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    value: f32,
    source: Option<ModuleId>,
}

impl Param {
    /// A constant parameter holding `value`.
    pub fn constant(value: f32) -> Self {
        Self {
            value,
            source: None,
        }
    }

    /// Current scalar value. For live parameters this is the most recently
    /// observed source sample.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// The feeding module, if any.
    #[inline]
    pub fn source(&self) -> Option<ModuleId> {
        self.source
    }

    /// True iff this parameter is currently fed from another module.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.source.is_some()
    }

    /// Detach any source and hold `value` constant.
    pub(crate) fn set_constant(&mut self, value: f32) {
        self.source = None;
        self.value = value;
    }

    /// Attach a live source. Validation happens in the registry.
    pub(crate) fn attach(&mut self, source: ModuleId) {
        self.source = Some(source);
    }

    /// Detach the source, retaining the last observed numeric value as the
    /// new constant (not the stale constant from before the connection).
    pub(crate) fn cancel(&mut self) {
        self.source = None;
    }

    /// Per-sample refresh from the source's output buffer.
    #[inline]
    pub(crate) fn refresh(&mut self, sample: f32) {
        self.value = sample;
    }
}
