pub mod chase;

use crate::config::RideConfig;
use crate::gameplay::vehicle::body::Pose;
use crate::gameplay::vehicle::Vehicle;
use crate::gameplay::RideSystems;
use crate::states::GameState;
use bevy::prelude::*;
use bevy_rapier3d::prelude::Velocity;
pub use chase::{CameraRigState, ChaseCamera};

pub struct ChaseCameraPlugin;

impl Plugin for ChaseCameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ActiveFollowTarget>()
            .add_message::<ChaseCameraSnapEvent>()
            .add_systems(OnEnter(GameState::Riding), spawn_chase_camera)
            .add_systems(
                Update,
                refresh_chase_camera_config.run_if(resource_exists_and_changed::<RideConfig>),
            )
            .add_systems(
                PostUpdate,
                (snap_chase_camera, follow_active_vehicle)
                    .chain()
                    .in_set(RideSystems::Present),
            );
    }
}

/// The single vehicle that owns the camera and the keyboard.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveFollowTarget(pub Option<Entity>);

/// Teleport the camera to the ideal pose behind `vehicle`, if it is followed.
#[derive(Message, Debug, Clone, Copy)]
pub struct ChaseCameraSnapEvent {
    pub vehicle: Entity,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct ChaseCameraRig {
    pub camera: ChaseCamera,
    pub state: CameraRigState,
}

fn spawn_chase_camera(
    mut commands: Commands,
    config: Option<Res<RideConfig>>,
    existing: Query<(), With<ChaseCameraRig>>,
) {
    if !existing.is_empty() {
        return;
    }

    let camera_config = config
        .map(|config| config.game.camera)
        .unwrap_or_default();
    let camera = match ChaseCamera::new(camera_config) {
        Ok(camera) => camera,
        Err(error) => {
            error!("Chase camera not spawned: {error}");
            return;
        }
    };
    let state = CameraRigState::default();

    commands.spawn((
        Name::new("ChaseCamera"),
        Camera3d::default(),
        ChaseCameraRig { camera, state },
        state.look_transform().unwrap_or_default(),
    ));
    info!("Spawned chase camera.");
}

fn refresh_chase_camera_config(
    config: Res<RideConfig>,
    mut rig_query: Query<&mut ChaseCameraRig>,
) {
    let Ok(mut rig) = rig_query.single_mut() else {
        return;
    };
    if *rig.camera.config() == config.game.camera {
        return;
    }

    match ChaseCamera::new(config.game.camera) {
        Ok(camera) => {
            rig.camera = camera;
            info!("Chase camera tuning updated.");
        }
        Err(error) => warn!("Ignoring chase camera tuning: {error}"),
    }
}

fn snap_chase_camera(
    mut snap_events: MessageReader<ChaseCameraSnapEvent>,
    active_target: Res<ActiveFollowTarget>,
    vehicle_query: Query<(&Transform, Option<&Velocity>), With<Vehicle>>,
    mut rig_query: Query<(&mut ChaseCameraRig, &mut Transform), Without<Vehicle>>,
) {
    let Some(vehicle) = snap_events
        .read()
        .filter(|event| Some(event.vehicle) == active_target.0)
        .last()
        .map(|event| event.vehicle)
    else {
        return;
    };
    let Ok((mut rig, mut camera_transform)) = rig_query.single_mut() else {
        return;
    };

    // Freshly spawned vehicles only exist once the spawn commands are applied.
    let Ok((transform, velocity)) = vehicle_query.get(vehicle) else {
        debug!("Snap target is not spawned yet; camera keeps smoothing.");
        return;
    };

    let pose = Pose::from_rapier(transform, velocity);
    let Some(state) = rig.camera.snap(&pose) else {
        return;
    };
    rig.state = state;
    if let Some(look) = state.look_transform() {
        *camera_transform = look;
    }
}

fn follow_active_vehicle(
    time: Res<Time>,
    active_target: Res<ActiveFollowTarget>,
    vehicle_query: Query<(&Transform, Option<&Velocity>), With<Vehicle>>,
    mut rig_query: Query<(&mut ChaseCameraRig, &mut Transform), Without<Vehicle>>,
) {
    let Ok((mut rig, mut camera_transform)) = rig_query.single_mut() else {
        return;
    };
    let pose = active_target
        .0
        .and_then(|entity| vehicle_query.get(entity).ok())
        .map(|(transform, velocity)| Pose::from_rapier(transform, velocity));

    let Some(next) = rig.camera.update(&rig.state, pose.as_ref(), time.delta_secs()) else {
        return;
    };
    rig.state = next;
    if let Some(look) = next.look_transform() {
        *camera_transform = look;
    }
}
