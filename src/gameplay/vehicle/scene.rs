use super::*;
use crate::config::{Articulation, ColliderShape, JointDriveConfig};
use std::f32::consts::FRAC_PI_2;

const SPAWN_DROP_M: f32 = 0.3;
const SINGLE_BODY_FRICTION: f32 = 0.05;
const ROLLER_FRICTION: f32 = 1.2;
const KNUCKLE_MASS_RATIO: f32 = 0.25;
const KNUCKLE_INERTIA: f32 = 0.05;
const RAMP_HALF_EXTENTS: Vec3 = Vec3::new(4.0, 0.5, 6.0);
const RAMP_CENTER: Vec3 = Vec3::new(0.0, 0.9, 30.0);
const RAMP_INCLINE_RAD: f32 = 0.26;
const WHEEL_VISUAL_WIDTH_M: f32 = 0.12;
const WHEEL_BASE_RATIO: f32 = 0.8;

const VEHICLE_COLORS: [Color; 4] = [
    Color::srgb(0.93, 0.34, 0.24),
    Color::srgb(0.24, 0.62, 0.93),
    Color::srgb(0.95, 0.78, 0.22),
    Color::srgb(0.42, 0.82, 0.45),
];

#[derive(Component)]
pub(super) struct RideScenery;

#[allow(clippy::too_many_arguments)]
pub(super) fn spawn_ride_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Option<Res<RideConfig>>,
    mut active_target: ResMut<ActiveFollowTarget>,
    mut snap_events: MessageWriter<ChaseCameraSnapEvent>,
    existing_vehicles: Query<(), With<Vehicle>>,
    existing_scenery: Query<(), With<RideScenery>>,
) {
    let Some(config) = config else {
        warn!("Ride scene requested before `RideConfig` was loaded.");
        return;
    };

    if existing_scenery.is_empty() {
        spawn_scenery(&mut commands, &mut meshes, &mut materials, &config);
    }

    // Resuming from pause keeps the vehicles where they are.
    if !existing_vehicles.is_empty() {
        return;
    }

    let roster = spawn_vehicle_roster(&mut commands, &mut meshes, &mut materials, &config);
    active_target.0 = default_follow_target(&config, &roster);
    if let Some(vehicle) = active_target.0 {
        snap_events.write(ChaseCameraSnapEvent { vehicle });
    }
}

fn spawn_scenery(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    config: &RideConfig,
) {
    let half_size = config.game.world.ground_half_size_m;

    commands.spawn((
        Name::new("Ground"),
        RideScenery,
        RigidBody::Fixed,
        Collider::cuboid(half_size, 0.5, half_size),
        Friction::coefficient(0.9),
        Restitution::coefficient(0.0),
        Mesh3d(meshes.add(Cuboid::new(half_size * 2.0, 1.0, half_size * 2.0))),
        MeshMaterial3d(materials.add(StandardMaterial::from(Color::srgb(0.28, 0.33, 0.39)))),
        Transform::from_xyz(0.0, -0.5, 0.0),
    ));

    // Low edge sits under the ground so wheels roll straight onto the incline.
    commands.spawn((
        Name::new("Ramp"),
        RideScenery,
        RigidBody::Fixed,
        Collider::cuboid(RAMP_HALF_EXTENTS.x, RAMP_HALF_EXTENTS.y, RAMP_HALF_EXTENTS.z),
        Friction::coefficient(0.9),
        Mesh3d(meshes.add(Cuboid::from_size(RAMP_HALF_EXTENTS * 2.0))),
        MeshMaterial3d(materials.add(StandardMaterial::from(Color::srgb(0.62, 0.52, 0.40)))),
        Transform::from_translation(RAMP_CENTER)
            .with_rotation(Quat::from_rotation_x(-RAMP_INCLINE_RAD)),
    ));

    commands.spawn((
        Name::new("Sun"),
        RideScenery,
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(20.0, 40.0, -10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    info!("Spawned ride scenery: ground {}m wide and one ramp.", half_size * 2.0);
}

/// Spawns every vehicle of the configured lineup side by side, facing +Z.
///
/// The returned entities are ordered by spawn slot.
pub(super) fn spawn_vehicle_roster(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    config: &RideConfig,
) -> Vec<Entity> {
    let lineup: Vec<&VehicleConfig> = config.spawn_roster().collect();
    let center_offset = (lineup.len() as f32 - 1.0) * 0.5;

    lineup
        .into_iter()
        .enumerate()
        .filter_map(|(slot, vehicle)| {
            let x = (slot as f32 - center_offset) * config.game.app.spawn_spacing_m;
            let position = Vec3::new(x, vehicle.ground.rest_height + SPAWN_DROP_M, 0.0);
            spawn_vehicle(commands, meshes, materials, vehicle, slot, position)
        })
        .collect()
}

pub(super) fn default_follow_target(config: &RideConfig, roster: &[Entity]) -> Option<Entity> {
    config
        .default_vehicle()
        .and_then(|default| {
            config
                .spawn_roster()
                .position(|vehicle| vehicle.id == default.id)
        })
        .and_then(|slot| roster.get(slot).copied())
        .or_else(|| roster.first().copied())
}

fn spawn_vehicle(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    vehicle: &VehicleConfig,
    slot: usize,
    position: Vec3,
) -> Option<Entity> {
    let controller = match LocomotionController::new(vehicle.clone()) {
        Ok(controller) => controller,
        Err(error) => {
            error!("Cannot spawn vehicle `{}`: {error}", vehicle.id);
            return None;
        }
    };

    let vehicle_entity = commands
        .spawn((
            Name::new(format!("Vehicle {}", vehicle.id)),
            Vehicle { slot },
            VehicleController(controller),
            VehicleInput::default(),
            VehicleRuntime(VehicleRuntimeState::at_spawn()),
            GroundContact::default(),
            Transform::from_translation(position),
            Visibility::default(),
        ))
        .insert((
            RigidBody::Dynamic,
            collider_for(&vehicle.collider),
            ColliderMassProperties::Mass(vehicle.mass),
            Restitution::coefficient(0.0),
            Damping {
                linear_damping: vehicle.linear_damping,
                angular_damping: vehicle.angular_damping,
            },
            Velocity::zero(),
            ExternalImpulse::default(),
            Ccd::enabled(),
            Sleeping::disabled(),
        ))
        .id();

    let color = VEHICLE_COLORS[slot % VEHICLE_COLORS.len()];
    match &vehicle.articulation {
        Articulation::SingleBody => {
            commands.entity(vehicle_entity).insert(Friction {
                coefficient: SINGLE_BODY_FRICTION,
                combine_rule: CoefficientCombineRule::Min,
            });
            spawn_rig(commands, meshes, materials, vehicle_entity, vehicle, color, true);
        }
        Articulation::MultiJoint(joints) => {
            commands.entity(vehicle_entity).insert(CollisionGroups::new(
                Group::GROUP_3,
                Group::ALL.difference(Group::GROUP_2),
            ));
            spawn_rig(commands, meshes, materials, vehicle_entity, vehicle, color, false);
            spawn_joint_bodies(
                commands,
                meshes,
                materials,
                vehicle_entity,
                vehicle,
                joints,
                position,
            );
        }
    }

    info!(
        "Spawned vehicle `{}` in slot {slot} at ({:.1}, {:.1}, {:.1}).",
        vehicle.id, position.x, position.y, position.z
    );
    Some(vehicle_entity)
}

fn collider_for(shape: &ColliderShape) -> Collider {
    match *shape {
        ColliderShape::Cuboid { half_extents } => {
            Collider::cuboid(half_extents[0], half_extents[1], half_extents[2])
        }
        ColliderShape::Capsule {
            half_height,
            radius,
        } => Collider::capsule_z(half_height, radius),
        ColliderShape::Ball { radius } => Collider::ball(radius),
    }
}

/// Visual mesh matching the collider, plus the rotation it needs to line up.
fn body_mesh_for(shape: &ColliderShape) -> (Mesh, Quat) {
    match *shape {
        ColliderShape::Cuboid { half_extents } => (
            Cuboid::from_size(Vec3::from_array(half_extents) * 2.0).into(),
            Quat::IDENTITY,
        ),
        ColliderShape::Capsule {
            half_height,
            radius,
        } => (
            Capsule3d::new(radius, half_height * 2.0).into(),
            Quat::from_rotation_x(FRAC_PI_2),
        ),
        ColliderShape::Ball { radius } => (Sphere::new(radius).into(), Quat::IDENTITY),
    }
}

fn body_half_length(shape: &ColliderShape) -> f32 {
    match *shape {
        ColliderShape::Cuboid { half_extents } => half_extents[2],
        ColliderShape::Capsule {
            half_height,
            radius,
        } => half_height + radius,
        ColliderShape::Ball { radius } => radius,
    }
}

/// Lean pivot -> pitch pivot (offset behind the center) -> model, with steer
/// column and wheel nodes under the model when the wheels are not bodies.
fn spawn_rig(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    vehicle_entity: Entity,
    vehicle: &VehicleConfig,
    color: Color,
    with_wheels: bool,
) {
    let rig = vehicle.rig;
    let (body_mesh, body_rotation) = body_mesh_for(&vehicle.collider);
    let body_mesh = meshes.add(body_mesh);
    let body_material = materials.add(StandardMaterial::from(color));
    let wheel_mesh = meshes.add(Cylinder::new(rig.wheel_radius, WHEEL_VISUAL_WIDTH_M));
    let wheel_material = materials.add(StandardMaterial::from(Color::srgb(0.12, 0.12, 0.14)));

    let wheel_z = body_half_length(&vehicle.collider) * WHEEL_BASE_RATIO;
    let hub_y = -vehicle.ground.rest_height + rig.wheel_radius;
    let node = |role: RigRole| RigNode {
        vehicle: vehicle_entity,
        role,
        base_rotation: Quat::IDENTITY,
    };
    let wheel_visual = (
        Mesh3d(wheel_mesh),
        MeshMaterial3d(wheel_material),
        Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2)),
    );

    commands.entity(vehicle_entity).with_children(|parent| {
        parent
            .spawn((
                Name::new("LeanPivot"),
                node(RigRole::LeanPivot),
                Transform::default(),
                Visibility::default(),
            ))
            .with_children(|lean| {
                lean.spawn((
                    Name::new("PitchOffset"),
                    Transform::from_xyz(0.0, 0.0, -rig.pitch_pivot_offset),
                    Visibility::default(),
                ))
                .with_children(|offset| {
                    offset
                        .spawn((
                            Name::new("PitchPivot"),
                            node(RigRole::PitchPivot),
                            Transform::default(),
                            Visibility::default(),
                        ))
                        .with_children(|pitch| {
                            pitch
                                .spawn((
                                    Name::new("Model"),
                                    Transform::from_xyz(0.0, 0.0, rig.pitch_pivot_offset),
                                    Visibility::default(),
                                ))
                                .with_children(|model| {
                                    model.spawn((
                                        Name::new("Body"),
                                        Mesh3d(body_mesh),
                                        MeshMaterial3d(body_material),
                                        Transform::from_rotation(body_rotation),
                                    ));

                                    if !with_wheels {
                                        return;
                                    }

                                    model
                                        .spawn((
                                            Name::new("SteerColumn"),
                                            node(RigRole::SteerColumn),
                                            Transform::from_xyz(0.0, hub_y, wheel_z),
                                            Visibility::default(),
                                        ))
                                        .with_children(|column| {
                                            column
                                                .spawn((
                                                    Name::new("FrontWheel"),
                                                    node(RigRole::Wheel),
                                                    Transform::default(),
                                                    Visibility::default(),
                                                ))
                                                .with_child(wheel_visual.clone());
                                        });

                                    model
                                        .spawn((
                                            Name::new("RearWheel"),
                                            node(RigRole::Wheel),
                                            Transform::from_xyz(0.0, hub_y, -wheel_z),
                                            Visibility::default(),
                                        ))
                                        .with_child(wheel_visual.clone());
                                });
                        });
                });
            });
    });
}

/// Driven rear roller, steering knuckle and free-rolling front roller.
fn spawn_joint_bodies(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    vehicle_entity: Entity,
    vehicle: &VehicleConfig,
    joints: &JointDriveConfig,
    position: Vec3,
) {
    let roller_mesh = meshes.add(Cylinder::new(joints.wheel_radius, joints.axle_half_width * 2.0));
    let roller_material = materials.add(StandardMaterial::from(Color::srgb(0.12, 0.12, 0.14)));
    let roller = (
        Collider::cylinder(joints.axle_half_width, joints.wheel_radius),
        ColliderMassProperties::Mass(joints.wheel_mass),
        Friction::coefficient(ROLLER_FRICTION),
        CollisionGroups::new(Group::GROUP_2, Group::ALL.difference(Group::GROUP_3)),
        Mesh3d(roller_mesh),
        MeshMaterial3d(roller_material),
        Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2)),
    );

    let drive_anchor = Vec3::from_array(joints.drive_anchor);
    let drive_joint = RevoluteJointBuilder::new(Vec3::X)
        .local_anchor1(drive_anchor)
        .local_anchor2(Vec3::ZERO)
        .motor_velocity(0.0, 1.0)
        .motor_max_force(joints.coast_max_force);
    commands
        .spawn((
            Name::new(format!("DriveRoller {}", vehicle.id)),
            VehiclePart {
                vehicle: vehicle_entity,
            },
            VehicleJoint {
                vehicle: vehicle_entity,
                role: JointRole::Drive,
            },
            RigidBody::Dynamic,
            ImpulseJoint::new(vehicle_entity, drive_joint),
            Transform::from_translation(position + drive_anchor),
            Visibility::default(),
            Velocity::zero(),
            Sleeping::disabled(),
        ))
        .with_child(roller.clone());

    let steer_anchor = Vec3::from_array(joints.steer_anchor);
    let max_steer = vehicle.rig.max_steer_angle;
    let steer_joint = RevoluteJointBuilder::new(Vec3::Y)
        .local_anchor1(steer_anchor)
        .local_anchor2(Vec3::ZERO)
        .limits([-max_steer, max_steer])
        .motor_position(0.0, joints.steer_stiffness, joints.steer_damping);
    let knuckle = commands
        .spawn((
            Name::new(format!("SteerKnuckle {}", vehicle.id)),
            VehiclePart {
                vehicle: vehicle_entity,
            },
            VehicleJoint {
                vehicle: vehicle_entity,
                role: JointRole::Steer,
            },
            RigidBody::Dynamic,
            AdditionalMassProperties::MassProperties(MassProperties {
                local_center_of_mass: Vec3::ZERO,
                mass: joints.wheel_mass * KNUCKLE_MASS_RATIO,
                principal_inertia: Vec3::splat(KNUCKLE_INERTIA),
                ..default()
            }),
            ImpulseJoint::new(vehicle_entity, steer_joint),
            Transform::from_translation(position + steer_anchor),
            Visibility::default(),
            Velocity::zero(),
            Sleeping::disabled(),
        ))
        .id();

    let roll_joint = RevoluteJointBuilder::new(Vec3::X)
        .local_anchor1(Vec3::ZERO)
        .local_anchor2(Vec3::ZERO);
    commands
        .spawn((
            Name::new(format!("FrontRoller {}", vehicle.id)),
            VehiclePart {
                vehicle: vehicle_entity,
            },
            RigidBody::Dynamic,
            ImpulseJoint::new(knuckle, roll_joint),
            Transform::from_translation(position + steer_anchor),
            Visibility::default(),
            Velocity::zero(),
            Sleeping::disabled(),
        ))
        .with_child(roller);
}
