//! Patch persistence - the plain-text save format.
//!
//! A patch is a sequence of blank-line-separated blocks, one per module, in
//! registry order (the Output module first). Each block is:
//!
//! ```text
//! <type tag>
//! <module name>
//! <one value line per parameter>
//! <one source-name line per parameter, `-` when the parameter is constant>
//! <zero or more module-specific `key value` state lines>
//! ```
//!
//! Loading replaces the current patch in two passes: first every module is
//! created with its constant values and module state, then sources are wired
//! up by name. Wiring by name is what makes blocks order-independent with
//! respect to their connections.

use tracing::info;

use crate::error::PatchError;
use crate::module::{ModuleId, ModuleType};
use crate::registry::Registry;

/// No-source sentinel in the source-name lines.
const NO_SOURCE: &str = "-";

/// Serialize the whole registry to patch text.
pub fn write_patch(registry: &Registry) -> String {
    let mut text = String::new();
    for id in registry.ids() {
        let module = match registry.module(id) {
            Some(module) => module,
            None => continue,
        };
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(module.kind().tag());
        text.push('\n');
        text.push_str(module.name());
        text.push('\n');
        for param in module.params() {
            text.push_str(&param.value().to_string());
            text.push('\n');
        }
        for param in module.params() {
            let source_name = param
                .source()
                .and_then(|source| registry.module(source))
                .map(|m| m.name())
                .unwrap_or(NO_SOURCE);
            text.push_str(source_name);
            text.push('\n');
        }
        let mut state = Vec::new();
        module.write_state(&mut state);
        for line in state {
            text.push_str(&line);
            text.push('\n');
        }
    }
    text
}

/// Replace the registry's contents with the patch described by `text`.
///
/// The registry is cleared first; on error it is left cleared rather than
/// half-wired, so a failed load never mixes two patches.
pub fn read_patch(registry: &mut Registry, text: &str) -> Result<(), PatchError> {
    registry.clear();

    // Pass one: create modules, restore constants and module state; collect
    // the connections for pass two.
    let mut connections: Vec<(ModuleId, usize, String)> = Vec::new();
    let mut modules = 0usize;
    for block in text.split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }
        modules += 1;
        connections.extend(read_block(registry, &lines)?);
    }

    // Pass two: wire sources by name.
    for (target, param_index, source_name) in connections {
        let source = registry
            .find(&source_name)
            .ok_or_else(|| PatchError::UnknownSource(source_name.clone()))?;
        registry.connect(target, param_index, source)?;
    }
    info!(modules, "patch loaded");
    Ok(())
}

/// Read one module block; returns the connections it declares.
fn read_block(
    registry: &mut Registry,
    lines: &[&str],
) -> Result<Vec<(ModuleId, usize, String)>, PatchError> {
    let mut cursor = lines.iter();
    let tag = cursor.next().ok_or(PatchError::Truncated)?;
    let kind = ModuleType::from_tag(tag).ok_or_else(|| PatchError::UnknownType(tag.to_string()))?;
    let name = cursor.next().ok_or(PatchError::Truncated)?;

    // The Output module always exists; every other kind is created fresh.
    let id = if kind == ModuleType::Output {
        Registry::OUTPUT
    } else {
        registry.insert(kind, name)?
    };
    let param_count = registry
        .module(id)
        .map(|m| m.params().len())
        .unwrap_or(0);

    for index in 0..param_count {
        let line = cursor.next().ok_or(PatchError::Truncated)?;
        let value: f32 = line
            .parse()
            .map_err(|_| PatchError::BadNumber(line.to_string()))?;
        registry.set_value(id, index, value)?;
    }

    let mut connections = Vec::new();
    for index in 0..param_count {
        let line = cursor.next().ok_or(PatchError::Truncated)?;
        if *line != NO_SOURCE {
            connections.push((id, index, line.to_string()));
        }
    }

    let state: Vec<String> = cursor.map(|l| l.to_string()).collect();
    if !state.is_empty() {
        if let Some(module) = registry.module_mut(id) {
            module.read_state(&state)?;
        }
    }
    Ok(connections)
}
