//! Patch save/load round trips through real files.

use patchcord::engine::{Engine, EngineConfig};
use patchcord::error::PatchError;
use patchcord::module::ModuleType;
use patchcord::modules::oscillator::Waveform;
use patchcord::modules::{adsr, multiplier, oscillator, output};

fn engine() -> Engine {
    Engine::new(EngineConfig {
        sample_rate: 44100.0,
        block_size: 64,
    })
}

fn build_patch(engine: &Engine) {
    let osc = engine.create_module(ModuleType::Oscillator, "osc").unwrap();
    let env = engine.create_module(ModuleType::Adsr, "env").unwrap();
    let vca = engine.create_module(ModuleType::Multiplier, "vca").unwrap();
    engine.set_parameter(osc, oscillator::FREQUENCY, 220.0).unwrap();
    // Nonzero constant offset: applied once before the save, and must not
    // be re-applied as a fresh delta after a load
    engine
        .set_parameter(osc, oscillator::PHASE_OFFSET, 0.25)
        .unwrap();
    engine.set_waveform(osc, Waveform::Triangle).unwrap();
    engine.set_parameter(env, adsr::NOTE, 1.0).unwrap();
    engine.connect_parameter(vca, multiplier::SIGNAL, osc).unwrap();
    engine.connect_parameter(vca, multiplier::CV, env).unwrap();
    engine
        .connect_parameter(engine.output_module(), output::LEFT, vca)
        .unwrap();
    engine
        .connect_parameter(engine.output_module(), output::RIGHT, vca)
        .unwrap();
}

#[test]
fn test_save_load_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.patch");

    let original = engine();
    build_patch(&original);
    original.save_patch(&path).unwrap();

    let restored = engine();
    restored.load_patch(&path).unwrap();
    assert_eq!(original.patch_text(), restored.patch_text());
}

#[test]
fn test_restored_patch_resumes_mid_note() {
    // Render a few quanta, save, restore into a fresh engine: the persisted
    // oscillator phase and envelope state make the next quantum identical.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.patch");

    let original = engine();
    build_patch(&original);
    let mut buffer = vec![0.0f32; 128];
    for _ in 0..8 {
        original.render(&mut buffer);
    }
    original.save_patch(&path).unwrap();

    let restored = engine();
    restored.load_patch(&path).unwrap();

    let mut original_out = vec![0.0f32; 128];
    let mut restored_out = vec![0.0f32; 128];
    original.render(&mut original_out);
    restored.render(&mut restored_out);
    assert_eq!(original_out, restored_out);
}

#[test]
fn test_load_missing_file_reports_io_error() {
    let engine = engine();
    let err = engine.load_patch("/nonexistent/session.patch");
    assert!(matches!(err, Err(PatchError::Io(_))));
}

#[test]
fn test_failed_load_leaves_engine_usable() {
    let engine = engine();
    build_patch(&engine);
    let err = engine.apply_patch_text("theremin\ntheremin 1\n");
    assert!(matches!(err, Err(PatchError::UnknownType(_))));

    // The old patch is gone (the load replaced it before failing), but the
    // engine still renders silence cleanly.
    assert!(engine.find_module("osc").is_none());
    let mut buffer = vec![0.0f32; 128];
    engine.render(&mut buffer);
    assert!(buffer.iter().all(|&s| s == 0.0));
}
