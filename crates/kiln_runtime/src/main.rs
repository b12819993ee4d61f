//! Kiln Engine Runtime
//!
//! Boots logging and settings, builds a small scene and drives its behaviors
//! for the configured number of frames.

mod player_controller;

use anyhow::Result;
use kiln_core::time::SimulationTime;
use kiln_core::{EntityId, Scene};
use kiln_script::{InternalCall, ScriptEngine, ScriptRuntime, SharedCalls};
use kiln_services::Settings;
use player_controller::PlayerController;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Script class attached to the scripted entity.
const SCRIPT_CONTROLLER: &str = "PlayerController";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Kiln Engine v{}", kiln_core::VERSION);

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("kiln.json"));
    let settings = Settings::load_or_default(&settings_path)?;
    let scripting = &settings.scripting;

    let scene = Rc::new(RefCell::new(Scene::new()));
    let mut engine = ScriptEngine::new(scripting.into());

    let world = scene.borrow_mut().create_entity("World");
    let player = scene.borrow_mut().create_entity("Player");
    scene.borrow_mut().set_parent(player, Some(world))?;
    engine.attach(player, Box::new(PlayerController::default()));

    // Kept alive for as long as script behaviors run.
    let mut script_runtime = None;
    let mut scripted = None;
    if !scripting.scripts.is_empty() {
        let shared: SharedCalls = scene.clone();
        let runtime = Rc::new(ScriptRuntime::with_tracing(
            shared,
            scripting.engine.trace_internal_calls,
        )?);
        for path in scripting.resolved_scripts(&settings_path) {
            runtime.execute_file(&path)?;
        }
        ScriptRuntime::register_class(&runtime, engine.registry_mut(), SCRIPT_CONTROLLER);

        let id = scene.borrow_mut().create_entity("ScriptedPlayer");
        scene.borrow_mut().set_parent(id, Some(world))?;
        engine.instantiate(id, SCRIPT_CONTROLLER)?;
        scripted = Some(id);
        script_runtime = Some(runtime);
    }

    tracing::info!(
        frames = scripting.frames,
        tick_rate_hz = scripting.tick_rate_hz,
        entities = scene.borrow().len(),
        "simulation starting"
    );

    let mut time = SimulationTime::with_tick_rate(scripting.tick_rate_hz);
    let mut calls = scene.clone();
    let mut failures = 0;
    for _ in 0..scripting.frames {
        let dt = time.advance_tick();
        let report = engine.update(&mut calls, dt)?;
        failures += report.failures.len();
    }

    log_transform(&scene.borrow(), player);
    if let Some(id) = scripted {
        log_transform(&scene.borrow(), id);
    }

    let teardown = engine.shutdown(&mut calls);
    failures += teardown.failures.len();

    tracing::info!(
        ticks = time.tick_count(),
        simulated = ?time.total_time(),
        failures,
        "simulation finished"
    );
    for (call, count) in engine.total_calls().iter() {
        tracing::info!(call = call.name(), count, "native crossings");
    }
    if let Some(runtime) = &script_runtime {
        for call in InternalCall::ALL {
            let count = runtime.call_count(call);
            if count > 0 {
                tracing::info!(call = call.name(), count, "script crossings");
            }
        }
    }

    Ok(())
}

fn log_transform(scene: &Scene, id: EntityId) {
    match (scene.name(id), scene.transform(id)) {
        (Ok(name), Ok(transform)) => tracing::info!(
            entity = id.raw(),
            name,
            position = ?transform.position,
            rotation = ?transform.rotation,
            "final transform"
        ),
        (Err(e), _) | (_, Err(e)) => tracing::warn!(entity = id.raw(), error = %e, "entity vanished"),
    }
}
