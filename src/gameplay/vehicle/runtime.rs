use super::*;
use std::collections::HashMap;

pub(super) fn sync_rapier_gravity_from_config(
    config: Res<RideConfig>,
    mut rapier_config_query: Query<&mut RapierConfiguration, With<DefaultRapierContext>>,
) {
    if let Ok(mut rapier_config) = rapier_config_query.single_mut() {
        rapier_config.gravity = Vec3::new(0.0, -config.game.world.gravity.max(0.0), 0.0);
    }
}

pub(super) fn read_vehicle_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<VehicleInputBindings>,
    active_target: Res<ActiveFollowTarget>,
    mut vehicle_query: Query<(Entity, &mut VehicleInput), With<Vehicle>>,
) {
    let resolved = bindings.resolve(&keyboard);
    for (entity, mut input) in &mut vehicle_query {
        input.0 = if active_target.0 == Some(entity) {
            resolved
        } else {
            InputState::default()
        };
    }
}

pub(super) fn cycle_follow_target(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<VehicleInputBindings>,
    mut active_target: ResMut<ActiveFollowTarget>,
    vehicle_query: Query<(Entity, &Vehicle, &VehicleController)>,
) {
    if !keyboard.just_pressed(bindings.cycle_target) {
        return;
    }

    let mut roster: Vec<_> = vehicle_query.iter().collect();
    roster.sort_by_key(|(_, vehicle, _)| vehicle.slot);
    let entities: Vec<Entity> = roster.iter().map(|(entity, _, _)| *entity).collect();

    active_target.0 = next_in_roster(&entities, active_target.0);
    if let Some((_, _, controller)) = roster
        .iter()
        .find(|(entity, _, _)| Some(*entity) == active_target.0)
    {
        info!("Following vehicle `{}`.", controller.config().id);
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn respawn_vehicles_on_request(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<VehicleInputBindings>,
    config: Res<RideConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut active_target: ResMut<ActiveFollowTarget>,
    mut snap_events: MessageWriter<ChaseCameraSnapEvent>,
    vehicle_query: Query<(Entity, &Vehicle)>,
    part_query: Query<Entity, With<VehiclePart>>,
) {
    if !keyboard.just_pressed(bindings.respawn) {
        return;
    }

    let active_slot = active_target
        .0
        .and_then(|entity| vehicle_query.get(entity).ok())
        .map(|(_, vehicle)| vehicle.slot);

    for (entity, _) in &vehicle_query {
        commands.entity(entity).try_despawn();
    }
    for entity in &part_query {
        commands.entity(entity).try_despawn();
    }

    let roster = scene::spawn_vehicle_roster(&mut commands, &mut meshes, &mut materials, &config);
    active_target.0 = active_slot
        .and_then(|slot| roster.get(slot).copied())
        .or_else(|| scene::default_follow_target(&config, &roster));
    if let Some(vehicle) = active_target.0 {
        snap_events.write(ChaseCameraSnapEvent { vehicle });
    }

    info!("Respawned {} vehicles from current config.", roster.len());
}

#[allow(clippy::type_complexity)]
pub(super) fn apply_vehicle_locomotion(
    time: Res<Time>,
    mut vehicle_query: Query<
        (
            Entity,
            &VehicleController,
            &VehicleInput,
            &GroundContact,
            &mut VehicleRuntime,
            &Transform,
            &mut Velocity,
            &mut ExternalImpulse,
            Option<&mut Sleeping>,
        ),
        With<Vehicle>,
    >,
    mut joint_query: Query<(&VehicleJoint, &mut ImpulseJoint)>,
) {
    let dt = time.delta_secs();
    let mut motor_commands: HashMap<Entity, BodyCommands> = HashMap::new();

    for (
        entity,
        controller,
        input,
        contact,
        mut runtime,
        transform,
        mut velocity,
        mut external_impulse,
        sleeping,
    ) in &mut vehicle_query
    {
        let mut body = RapierBody {
            transform,
            velocity: &mut *velocity,
            external_impulse: &mut *external_impulse,
            sleeping: sleeping.map(Mut::into_inner),
        };
        let pose = body.pose();

        let Some(step) =
            controller
                .0
                .plan(&runtime.0, &input.0, Some(&pose), contact.grounded, dt)
        else {
            debug!("Skipped locomotion frame for `{}`.", controller.config().id);
            continue;
        };
        let corrections =
            GripStabilizer.stabilize(controller.config(), &input.0, Some(&pose), dt);

        step.commands.apply_to_body(&mut body);
        corrections.apply_to_body(&mut body);
        runtime.0 = step.state;
        if let Some(impulse) = step.jump_impulse {
            info!("`{}` jumped with {impulse:.0} N·s.", controller.config().id);
        }

        if controller.config().is_articulated() {
            motor_commands.insert(entity, step.commands);
        }
    }

    for (joint, mut impulse_joint) in &mut joint_query {
        if let Some(commands) = motor_commands.get(&joint.vehicle) {
            commands.apply_to_joint(joint.role, &mut RapierJoint(&mut *impulse_joint));
        }
    }
}

pub(super) fn update_ground_contact(
    rapier_context: ReadRapierContext,
    mut vehicle_query: Query<(&VehicleController, &Transform, &mut GroundContact), With<Vehicle>>,
) {
    let rapier_context = rapier_context.single().ok();

    for (controller, transform, mut contact) in &mut vehicle_query {
        let ground = controller.config().ground;
        let grounded = match (ground.probe, rapier_context.as_ref()) {
            (GroundProbe::Raycast, Some(rapier_context)) => rapier_context
                .cast_ray(
                    transform.translation,
                    Vec3::NEG_Y,
                    ground.rest_height + ground.probe_length,
                    true,
                    QueryFilter::only_fixed().exclude_sensors(),
                )
                .is_some(),
            _ => controller.0.is_grounded(&Pose::from_rapier(transform, None)),
        };

        if grounded != contact.grounded {
            debug!(
                "`{}` is now {}.",
                controller.config().id,
                if grounded { "grounded" } else { "airborne" }
            );
            contact.grounded = grounded;
        }
    }
}

pub(super) fn animate_vehicle_rigs(
    time: Res<Time>,
    mut vehicle_query: Query<
        (
            &VehicleController,
            &VehicleInput,
            &GroundContact,
            &Transform,
            Option<&Velocity>,
            &mut VehicleRuntime,
        ),
        With<Vehicle>,
    >,
) {
    let dt = time.delta_secs();
    for (controller, input, contact, transform, velocity, mut runtime) in &mut vehicle_query {
        let pose = Pose::from_rapier(transform, velocity);
        if let Some(next) = VisualAnimationRig.animate(
            controller.config(),
            &runtime.0,
            &input.0,
            Some(&pose),
            contact.grounded,
            dt,
        ) {
            runtime.0 = next;
        }
    }
}

pub(super) fn write_rig_nodes(
    runtime_query: Query<&VehicleRuntime>,
    mut node_query: Query<(&RigNode, &mut Transform)>,
) {
    for (node, mut transform) in &mut node_query {
        let Ok(runtime) = runtime_query.get(node.vehicle) else {
            continue;
        };
        transform.rotation = node.role.rotation(node.base_rotation, &runtime.0);
    }
}

pub(super) fn update_vehicle_telemetry(
    active_target: Res<ActiveFollowTarget>,
    mut telemetry: ResMut<VehicleTelemetry>,
    vehicle_query: Query<(
        &VehicleController,
        &VehicleInput,
        &VehicleRuntime,
        &GroundContact,
        &Transform,
        Option<&Velocity>,
    )>,
) {
    let Some(entity) = active_target.0 else {
        return;
    };
    let Ok((controller, input, runtime, contact, transform, velocity)) = vehicle_query.get(entity)
    else {
        return;
    };

    let pose = Pose::from_rapier(transform, velocity);
    if telemetry.vehicle_id != controller.config().id {
        telemetry.vehicle_id = controller.config().id.clone();
    }
    telemetry.position = pose.position;
    telemetry.speed_mps = pose.linear_velocity.length();
    telemetry.forward_speed_mps = pose.forward_speed();
    telemetry.grounded = contact.grounded;
    telemetry.input = input.0;
    telemetry.state = runtime.0;
}

/// Entry after `current`, wrapping; the first entry when `current` is not listed.
fn next_in_roster<T: Copy + PartialEq>(roster: &[T], current: Option<T>) -> Option<T> {
    let first = *roster.first()?;
    let Some(index) = current.and_then(|current| roster.iter().position(|item| *item == current))
    else {
        return Some(first);
    };
    roster.get((index + 1) % roster.len()).copied()
}
