pub mod camera;
pub mod vehicle;

use crate::config::RideConfig;
use crate::states::GameState;
use bevy::prelude::*;
use bevy::transform::TransformSystems;
use bevy_rapier3d::prelude::PhysicsSet;
use camera::ChaseCameraPlugin;
use vehicle::VehicleGameplayPlugin;

/// Ordering for ride systems around the physics step.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RideSystems {
    /// Input and force planning, before Rapier steps.
    Control,
    /// Rig animation and camera, after Rapier writes poses back.
    Present,
}

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            RideSystems::Control
                .run_if(in_state(GameState::Riding))
                .run_if(resource_exists::<RideConfig>),
        )
        .configure_sets(
            PostUpdate,
            RideSystems::Present
                .after(PhysicsSet::Writeback)
                .before(TransformSystems::Propagate)
                .run_if(in_state(GameState::Riding))
                .run_if(resource_exists::<RideConfig>),
        )
        .add_plugins(VehicleGameplayPlugin)
        .add_plugins(ChaseCameraPlugin);
    }
}
