//! Movement controller: slides along X and yaws at a steady rate

use kiln_core::Vector3;
use kiln_script::{Behavior, ScriptContext};

/// Yaw rate in radians per second.
const TURN_RATE: f32 = 1.0;

pub struct PlayerController {
    /// Units per second along X
    pub speed: f32,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self { speed: 5.0 }
    }
}

impl Behavior for PlayerController {
    fn on_start(&mut self, ctx: &mut ScriptContext<'_>) -> kiln_script::Result<()> {
        let name = ctx.name()?;
        tracing::info!(entity = ctx.entity().id().raw(), %name, "player controller started");

        let transform = ctx.transform();
        transform.set_position(ctx.calls_mut(), Vector3::ZERO)
    }

    fn on_update(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) -> kiln_script::Result<()> {
        let transform = ctx.transform();

        // Re-read every frame: other systems may have moved us.
        let mut position = transform.position(ctx.calls())?;
        position.x += self.speed * dt;
        transform.set_position(ctx.calls_mut(), position)?;

        let mut rotation = transform.rotation(ctx.calls())?;
        rotation.y += TURN_RATE * dt;
        transform.set_rotation(ctx.calls_mut(), rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::EntityId;
    use kiln_script::testing::InMemoryCalls;
    use kiln_script::{EngineConfig, InternalCall, InternalCalls, ScriptEngine};

    #[test]
    fn one_frame_moves_and_turns() {
        let mut calls = InMemoryCalls::new().with_entity(7, "Player");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(EntityId::from_raw(7), Box::new(PlayerController::default()));

        engine.update(&mut calls, 0.1).unwrap();

        let id = EntityId::from_raw(7);
        assert_eq!(calls.transform_get_position(id).unwrap(), Vector3::new(0.5, 0.0, 0.0));
        assert_eq!(calls.transform_get_rotation(id).unwrap(), Vector3::new(0.0, 0.1, 0.0));
    }

    #[test]
    fn update_picks_up_external_moves() {
        let mut calls = InMemoryCalls::new().with_entity(1, "Player");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(EntityId::from_raw(1), Box::new(PlayerController { speed: 2.0 }));
        engine.update(&mut calls, 0.5).unwrap();

        // Another system teleports the player between frames.
        calls.transform_mut(1).unwrap().position = Vector3::new(10.0, 1.0, 0.0);
        engine.update(&mut calls, 0.5).unwrap();

        let position = calls.transform_get_position(EntityId::from_raw(1)).unwrap();
        assert_eq!(position, Vector3::new(11.0, 1.0, 0.0));
    }

    #[test]
    fn each_property_is_read_and_written_once_per_frame() {
        let mut calls = InMemoryCalls::new().with_entity(2, "Player");
        let mut engine = ScriptEngine::new(EngineConfig::default());
        engine.attach(EntityId::from_raw(2), Box::new(PlayerController::default()));
        engine.start(&mut calls).unwrap();
        calls.clear_log();

        engine.update(&mut calls, 1.0 / 60.0).unwrap();

        assert_eq!(calls.count(InternalCall::TransformGetPosition), 1);
        assert_eq!(calls.count(InternalCall::TransformSetPosition), 1);
        assert_eq!(calls.count(InternalCall::TransformGetRotation), 1);
        assert_eq!(calls.count(InternalCall::TransformSetRotation), 1);
        assert_eq!(calls.log().len(), 4);
    }
}
