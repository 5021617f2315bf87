//! Error taxonomy for graph operations and patch text I/O.
//!
//! Graph errors are always local: the offending operation is rejected,
//! reported to the caller, and no state changes. Nothing here is fatal.

use thiserror::Error;

/// Rejected graph operations (connections, removals, stale handles).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A module cannot be fed from its own output.
    #[error("module `{0}` cannot be patched into itself")]
    SelfPatch(String),

    /// The output module is a sink; it can never act as a source.
    #[error("the output module cannot be used as a source")]
    OutputAsSource,

    /// Connecting `from` into `target` would close a feedback loop.
    /// `from`, not `source`: thiserror treats a field named `source` as
    /// the error's cause.
    #[error("patching `{from}` into `{target}` would create a cycle")]
    WouldCycle { from: String, target: String },

    /// The handle points at a removed (or never-existing) module.
    #[error("stale module handle (slot {0})")]
    StaleHandle(u32),

    /// Parameter index outside the module's parameter list.
    #[error("parameter index {index} out of range for `{module}`")]
    BadParamIndex { module: String, index: usize },

    /// The output module lives for the whole session.
    #[error("the output module cannot be removed")]
    RemoveOutput,

    /// Exactly one output module exists; it is created with the registry.
    #[error("an output module already exists")]
    OutputExists,

    /// Module names are unique so patches can wire sources by name.
    #[error("a module named `{0}` already exists")]
    DuplicateName(String),

    /// Names appear verbatim in the patch text: no empty names, no
    /// newlines, and `-` is the format's no-source sentinel.
    #[error("invalid module name `{0}`")]
    InvalidName(String),

    /// A module-specific control was applied to the wrong kind of module.
    #[error("module `{module}` is not {expected}")]
    WrongKind {
        module: String,
        expected: &'static str,
    },
}

/// Failures while reading the persisted patch text format.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("unexpected end of patch text")]
    Truncated,

    #[error("unknown module type tag `{0}`")]
    UnknownType(String),

    #[error("patch references unknown source module `{0}`")]
    UnknownSource(String),

    #[error("invalid number `{0}` in patch text")]
    BadNumber(String),

    #[error("invalid module state line `{0}`")]
    BadState(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("patch file error: {0}")]
    Io(#[from] std::io::Error),
}
