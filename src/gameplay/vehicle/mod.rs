pub mod body;
pub mod grip;
pub mod locomotion;
pub mod rig;
pub mod state;

mod runtime;
mod scene;

use crate::config::{GroundProbe, RideConfig, VehicleConfig};
use crate::gameplay::camera::{ActiveFollowTarget, ChaseCameraSnapEvent};
use crate::gameplay::RideSystems;
use crate::states::GameState;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use body::{BodyCommands, JointRole, Pose, RapierBody, RapierJoint, VehicleBody};
use grip::GripStabilizer;
use locomotion::LocomotionController;
use rig::{RigRole, VisualAnimationRig};
use state::{InputState, VehicleRuntimeState};

pub struct VehicleGameplayPlugin;

impl Plugin for VehicleGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<VehicleInputBindings>()
            .init_resource::<VehicleTelemetry>()
            .add_systems(OnEnter(GameState::Riding), scene::spawn_ride_scene)
            .add_systems(
                Update,
                runtime::sync_rapier_gravity_from_config
                    .run_if(resource_exists_and_changed::<RideConfig>),
            )
            .add_systems(
                Update,
                (
                    runtime::read_vehicle_input,
                    runtime::cycle_follow_target,
                    runtime::respawn_vehicles_on_request,
                    runtime::apply_vehicle_locomotion,
                )
                    .chain()
                    .in_set(RideSystems::Control),
            )
            .add_systems(
                PostUpdate,
                (
                    runtime::update_ground_contact,
                    runtime::animate_vehicle_rigs,
                    runtime::write_rig_nodes,
                    runtime::update_vehicle_telemetry,
                )
                    .chain()
                    .in_set(RideSystems::Present),
            );
    }
}

/// Root of one vehicle: the chassis rigid body.
#[derive(Component, Debug, Clone, Copy)]
pub struct Vehicle {
    /// Position in the spawn lineup; stable across respawns.
    pub slot: usize,
}

#[derive(Component, Debug, Clone)]
pub struct VehicleController(pub LocomotionController);

impl VehicleController {
    pub fn config(&self) -> &VehicleConfig {
        self.0.config()
    }
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct VehicleInput(pub InputState);

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct VehicleRuntime(pub VehicleRuntimeState);

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct GroundContact {
    pub grounded: bool,
}

/// Extra rigid body (wheel, steering knuckle) owned by a vehicle.
#[derive(Component, Debug, Clone, Copy)]
pub struct VehiclePart {
    pub vehicle: Entity,
}

/// Motorized joint of an articulated vehicle; lives on the child body.
#[derive(Component, Debug, Clone, Copy)]
pub struct VehicleJoint {
    pub vehicle: Entity,
    pub role: JointRole,
}

/// Scene-graph node whose rotation is rewritten every frame from the rig state.
#[derive(Component, Debug, Clone, Copy)]
pub struct RigNode {
    pub vehicle: Entity,
    pub role: RigRole,
    pub base_rotation: Quat,
}

#[derive(Resource, Debug, Clone)]
pub struct VehicleInputBindings {
    pub forward: Vec<KeyCode>,
    pub backward: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub right: Vec<KeyCode>,
    pub jump: Vec<KeyCode>,
    pub cycle_target: KeyCode,
    pub respawn: KeyCode,
}

impl Default for VehicleInputBindings {
    fn default() -> Self {
        Self {
            forward: vec![KeyCode::KeyW, KeyCode::ArrowUp],
            backward: vec![KeyCode::KeyS, KeyCode::ArrowDown],
            left: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
            right: vec![KeyCode::KeyD, KeyCode::ArrowRight],
            jump: vec![KeyCode::Space],
            cycle_target: KeyCode::Tab,
            respawn: KeyCode::KeyR,
        }
    }
}

impl VehicleInputBindings {
    pub fn resolve(&self, keyboard: &ButtonInput<KeyCode>) -> InputState {
        let held = |keys: &[KeyCode]| keys.iter().any(|key| keyboard.pressed(*key));
        InputState {
            forward: held(&self.forward),
            backward: held(&self.backward),
            left: held(&self.left),
            right: held(&self.right),
            jump: held(&self.jump),
        }
    }
}

/// Snapshot of the followed vehicle for the debug overlay.
#[derive(Resource, Debug, Clone, Default)]
pub struct VehicleTelemetry {
    pub vehicle_id: String,
    pub position: Vec3,
    pub speed_mps: f32,
    pub forward_speed_mps: f32,
    pub grounded: bool,
    pub input: InputState,
    pub state: VehicleRuntimeState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_resolve_held_keys_only() {
        let bindings = VehicleInputBindings::default();
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::ArrowUp);
        keyboard.press(KeyCode::KeyA);
        keyboard.press(KeyCode::KeyD);

        let input = bindings.resolve(&keyboard);

        assert!(input.forward);
        assert!(!input.backward);
        assert!(input.left && input.right);
        assert_eq!(input.steer_sign(), 0.0);
        assert!(!input.jump);

        keyboard.release(KeyCode::ArrowUp);
        assert!(!bindings.resolve(&keyboard).forward);
    }
}
