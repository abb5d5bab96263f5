use super::body::{BodyCommand, BodyCommands, JointRole, Pose};
use super::state::{InputState, VehicleRuntimeState};
use crate::config::{Articulation, ConfigError, JointDriveConfig, VehicleConfig};
use bevy::prelude::*;

/// Output of one planning pass: the state to keep and the commands to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct LocomotionStep {
    pub state: VehicleRuntimeState,
    pub commands: BodyCommands,
    /// Jump impulse magnitude applied this frame, if any.
    pub jump_impulse: Option<f32>,
}

/// Turns resolved input flags into impulses, torques and motor targets.
#[derive(Debug, Clone)]
pub struct LocomotionController {
    config: VehicleConfig,
}

impl LocomotionController {
    pub fn new(config: VehicleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    /// Height-threshold ground test against the configured rest height.
    pub fn is_grounded(&self, pose: &Pose) -> bool {
        self.config.ground.is_grounded_at_height(pose.position.y)
    }

    /// Plans one frame.
    ///
    /// Returns `None` when there is no body to read or `dt` is unusable; the
    /// caller then keeps its previous state and applies nothing.
    pub fn plan(
        &self,
        state: &VehicleRuntimeState,
        input: &InputState,
        pose: Option<&Pose>,
        grounded: bool,
        dt: f32,
    ) -> Option<LocomotionStep> {
        let pose = pose.filter(|pose| pose.is_finite())?;
        if !dt.is_finite() || dt <= 0.0 {
            return None;
        }

        let mut next = *state;
        let released_charge = next.advance_timers(input, dt);
        let mut commands = BodyCommands::default();

        match &self.config.articulation {
            Articulation::SingleBody => self.plan_single_body(&next, input, pose, dt, &mut commands),
            Articulation::MultiJoint(joints) => self.plan_joint_motors(joints, input, &mut commands),
        }

        let jump_impulse = released_charge
            .filter(|_| grounded)
            .and_then(|charge| self.plan_jump(charge, pose, &mut commands));

        Some(LocomotionStep {
            state: next,
            commands,
            jump_impulse,
        })
    }

    /// Base engine force plus the sustained-throttle bonus.
    pub fn engine_force(&self, accel_hold_s: f32) -> f32 {
        let bonus = self.config.ramp_up.map_or(0.0, |ramp_up| {
            accel_hold_s.clamp(0.0, ramp_up.cap_s).powf(ramp_up.exponent) * ramp_up.scale
        });
        self.config.engine_force + bonus
    }

    fn plan_single_body(
        &self,
        state: &VehicleRuntimeState,
        input: &InputState,
        pose: &Pose,
        dt: f32,
        commands: &mut BodyCommands,
    ) {
        let config = &self.config;
        let forward = pose.forward();
        let forward_speed = pose.forward_speed();

        if input.forward && forward_speed < config.max_forward_speed {
            commands.impulse(forward * self.engine_force(state.accel_hold_s) * dt);
        }

        let brake_suppressed = input.forward && config.suppress_brake_with_throttle;
        if input.backward && !brake_suppressed && -forward_speed < config.max_reverse_speed {
            commands.impulse(-forward * config.engine_force * config.reverse_force_ratio * dt);
        }

        let steer_sign = input.steer_sign();
        if steer_sign == 0.0 || forward_speed.abs() < config.min_steer_speed {
            return;
        }
        let multiplier = turn_multiplier(forward_speed, config.steer_speed_norm);
        if multiplier != 0.0 {
            commands.torque_impulse(
                pose.up() * steer_sign * multiplier * config.steering_torque * dt,
            );
        }
    }

    fn plan_joint_motors(
        &self,
        joints: &JointDriveConfig,
        input: &InputState,
        commands: &mut BodyCommands,
    ) {
        let drive = if input.is_coasting() {
            BodyCommand::MotorVelocity {
                joint: JointRole::Drive,
                target: 0.0,
                max_force: joints.coast_max_force,
            }
        } else {
            BodyCommand::MotorVelocity {
                joint: JointRole::Drive,
                target: input.drive_sign() * joints.drive_speed,
                max_force: joints.drive_max_force,
            }
        };
        commands.push(drive);
        commands.push(BodyCommand::MotorPosition {
            joint: JointRole::Steer,
            target: input.steer_sign() * self.config.rig.max_steer_angle,
            stiffness: joints.steer_stiffness,
            damping: joints.steer_damping,
        });
    }

    fn plan_jump(&self, charge: f32, pose: &Pose, commands: &mut BodyCommands) -> Option<f32> {
        let jump = self.config.jump?;
        let magnitude = jump.base_impulse + jump.charge_impulse * charge;
        commands.impulse(Vec3::Y * magnitude);

        if pose.forward_speed() > jump.pump_min_speed {
            commands.impulse(pose.forward() * jump.forward_bias * charge);
        }

        debug!(
            "Jump released `{}` with charge {charge:.2}s, impulse {magnitude:.1}.",
            self.config.id
        );
        Some(magnitude)
    }
}

/// Signed steering authority in [-1, 1]; flips when rolling backwards.
pub fn turn_multiplier(forward_speed: f32, speed_norm: f32) -> f32 {
    if forward_speed.abs() <= f32::EPSILON || speed_norm <= 0.0 {
        return 0.0;
    }
    (forward_speed.abs() / speed_norm).min(1.0) * forward_speed.signum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{sample_vehicle_config, RampUpConfig};
    use crate::gameplay::vehicle::body::{SimBody, SimMotor, VehicleBody};

    const DT: f32 = 1.0 / 60.0;

    fn controller() -> LocomotionController {
        LocomotionController::new(sample_vehicle_config()).expect("sample config is valid")
    }

    fn moving_pose(forward_speed: f32) -> Pose {
        Pose {
            linear_velocity: Vec3::Z * forward_speed,
            ..Pose::at_rest(Vec3::Y * 0.6, Quat::IDENTITY)
        }
    }

    fn input(configure: impl FnOnce(&mut InputState)) -> InputState {
        let mut input = InputState::default();
        configure(&mut input);
        input
    }

    fn drive(
        controller: &LocomotionController,
        body: &mut SimBody,
        state: &mut VehicleRuntimeState,
        input: &InputState,
        frames: usize,
    ) {
        for _ in 0..frames {
            let pose = body.pose();
            let grounded = controller.is_grounded(&pose);
            let step = controller
                .plan(state, input, Some(&pose), grounded, DT)
                .expect("pose is available");
            step.commands.apply_to_body(body);
            *state = step.state;
            body.step(DT);
        }
    }

    #[test]
    fn one_second_of_throttle_follows_constant_acceleration() {
        let controller = controller();
        let mut body = SimBody::new(60.0).with_floor(0.6, 18.0);
        let mut state = VehicleRuntimeState::at_spawn();
        let forward = input(|input| input.forward = true);

        drive(&controller, &mut body, &mut state, &forward, 60);

        // 600 N on 60 kg.
        let expected = 0.5 * 10.0 * 1.0_f32.powi(2);
        assert!((body.position.z - expected).abs() / expected < 0.03);
        assert_eq!(body.position.x, 0.0);
        assert!((state.accel_hold_s - 1.0).abs() < 1e-3);
    }

    #[test]
    fn forward_speed_stays_under_cap_plus_one_frame() {
        let controller = controller();
        let mut body = SimBody::new(60.0).with_floor(0.6, 18.0);
        let mut state = VehicleRuntimeState::at_spawn();
        let forward = input(|input| input.forward = true);
        let one_frame = 600.0 / 60.0 * DT;

        for _ in 0..600 {
            drive(&controller, &mut body, &mut state, &forward, 1);
            assert!(body.pose().forward_speed() <= 20.0 + one_frame + 1e-4);
        }
        assert!(body.pose().forward_speed() > 19.0);
    }

    #[test]
    fn steering_torque_follows_input_sign() {
        let controller = controller();
        let state = VehicleRuntimeState::at_spawn();
        let pose = moving_pose(5.0);
        let torque_for = |input: InputState| {
            controller
                .plan(&state, &input, Some(&pose), true, DT)
                .expect("pose is available")
                .commands
                .total_torque_impulse()
        };

        assert!(torque_for(input(|input| input.left = true)).y > 0.0);
        assert!(torque_for(input(|input| input.right = true)).y < 0.0);
        assert_eq!(
            torque_for(input(|input| {
                input.left = true;
                input.right = true;
            })),
            Vec3::ZERO
        );
    }

    #[test]
    fn steering_flips_when_rolling_backwards() {
        let controller = controller();
        let state = VehicleRuntimeState::at_spawn();
        let pose = moving_pose(-3.0);
        let step = controller
            .plan(&state, &input(|input| input.left = true), Some(&pose), true, DT)
            .expect("pose is available");

        assert!(step.commands.total_torque_impulse().y < 0.0);
    }

    #[test]
    fn steering_is_ignored_below_minimum_speed() {
        let mut config = sample_vehicle_config();
        config.min_steer_speed = 0.5;
        let controller = LocomotionController::new(config).expect("valid config");
        let step = controller
            .plan(
                &VehicleRuntimeState::at_spawn(),
                &input(|input| input.left = true),
                Some(&moving_pose(0.2)),
                true,
                DT,
            )
            .expect("pose is available");

        assert!(step.commands.is_empty());
    }

    #[test]
    fn throttle_suppresses_brake_when_configured() {
        let both = input(|input| {
            input.forward = true;
            input.backward = true;
        });
        let pose = moving_pose(4.0);

        let braking = controller()
            .plan(&VehicleRuntimeState::at_spawn(), &both, Some(&pose), true, DT)
            .expect("pose is available");
        // Throttle and half-strength brake both apply.
        assert!((braking.commands.total_impulse().z - 5.0).abs() < 1e-4);

        let mut config = sample_vehicle_config();
        config.suppress_brake_with_throttle = true;
        let coasting = LocomotionController::new(config)
            .expect("valid config")
            .plan(&VehicleRuntimeState::at_spawn(), &both, Some(&pose), true, DT)
            .expect("pose is available");
        assert!((coasting.commands.total_impulse().z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn reverse_is_capped_at_max_reverse_speed() {
        let controller = controller();
        let backward = input(|input| input.backward = true);
        let at_cap = controller
            .plan(
                &VehicleRuntimeState::at_spawn(),
                &backward,
                Some(&moving_pose(-6.5)),
                true,
                DT,
            )
            .expect("pose is available");
        assert!(at_cap.commands.is_empty());

        let below_cap = controller
            .plan(
                &VehicleRuntimeState::at_spawn(),
                &backward,
                Some(&moving_pose(-1.0)),
                true,
                DT,
            )
            .expect("pose is available");
        assert!((below_cap.commands.total_impulse().z + 600.0 * 0.5 * DT).abs() < 1e-4);
    }

    #[test]
    fn ramp_up_grows_engine_force_until_cap() {
        let mut config = sample_vehicle_config();
        config.ramp_up = Some(RampUpConfig {
            cap_s: 2.0,
            exponent: 2.0,
            scale: 100.0,
        });
        let controller = LocomotionController::new(config).expect("valid config");

        assert!((controller.engine_force(0.0) - 600.0).abs() < 1e-3);
        assert!((controller.engine_force(1.0) - 700.0).abs() < 1e-3);
        assert!((controller.engine_force(2.0) - 1000.0).abs() < 1e-3);
        assert!((controller.engine_force(5.0) - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn grounded_jump_scales_with_charge_and_resets() {
        let controller = controller();
        let pose = moving_pose(0.0);
        let hold = input(|input| input.jump = true);
        let mut state = VehicleRuntimeState::at_spawn();

        for _ in 0..30 {
            let step = controller
                .plan(&state, &hold, Some(&pose), true, DT)
                .expect("pose is available");
            assert!(step.commands.is_empty());
            state = step.state;
        }

        let release = controller
            .plan(&state, &InputState::default(), Some(&pose), true, DT)
            .expect("pose is available");
        let expected = 300.0 + 240.0 * 0.5;

        assert!((release.commands.total_impulse().y - expected).abs() < 0.1);
        assert!(release.jump_impulse.is_some());
        assert_eq!(release.state.jump_charge_s, 0.0);
    }

    #[test]
    fn airborne_jump_release_is_a_no_op_but_clears_charge() {
        let controller = controller();
        let pose = moving_pose(0.0);
        let mut state = VehicleRuntimeState::at_spawn();
        state = controller
            .plan(&state, &input(|input| input.jump = true), Some(&pose), false, DT)
            .expect("pose is available")
            .state;

        let release = controller
            .plan(&state, &InputState::default(), Some(&pose), false, DT)
            .expect("pose is available");

        assert!(release.commands.is_empty());
        assert_eq!(release.jump_impulse, None);
        assert_eq!(release.state.jump_charge_s, 0.0);
    }

    #[test]
    fn pumped_jump_adds_forward_bias() {
        let controller = controller();
        let pose = moving_pose(5.0);
        let mut state = VehicleRuntimeState::at_spawn();
        state.jump_charge_s = 1.0;
        state.jump_was_held = true;

        let release = controller
            .plan(&state, &InputState::default(), Some(&pose), true, DT)
            .expect("pose is available");
        let impulse = release.commands.total_impulse();

        assert!((impulse.y - 540.0).abs() < 1e-3);
        assert!((impulse.z - 60.0).abs() < 1e-3);
    }

    #[test]
    fn zero_input_at_rest_is_idempotent() {
        let controller = controller();
        let pose = Pose::at_rest(Vec3::Y * 0.6, Quat::IDENTITY);
        let state = VehicleRuntimeState::at_spawn();

        let step = controller
            .plan(&state, &InputState::default(), Some(&pose), true, DT)
            .expect("pose is available");

        assert_eq!(step.state, state);
        assert!(step.commands.is_empty());
    }

    #[test]
    fn missing_pose_or_bad_dt_skips_the_frame() {
        let controller = controller();
        let state = VehicleRuntimeState::at_spawn();
        let forward = input(|input| input.forward = true);
        let pose = moving_pose(0.0);

        assert!(controller.plan(&state, &forward, None, true, DT).is_none());
        assert!(controller.plan(&state, &forward, Some(&pose), true, 0.0).is_none());
        assert!(controller
            .plan(&state, &forward, Some(&pose), true, f32::NAN)
            .is_none());
    }

    #[test]
    fn articulated_vehicle_drives_joint_motors() {
        let mut config = sample_vehicle_config();
        config.articulation = Articulation::MultiJoint(JointDriveConfig {
            drive_speed: 30.0,
            drive_max_force: 400.0,
            coast_max_force: 20.0,
            steer_stiffness: 800.0,
            steer_damping: 60.0,
            wheel_radius: 0.45,
            axle_half_width: 0.8,
            wheel_mass: 10.0,
            drive_anchor: [0.0, -0.3, -1.1],
            steer_anchor: [0.0, -0.3, 1.1],
        });
        let controller = LocomotionController::new(config).expect("valid config");
        let pose = moving_pose(0.0);
        let state = VehicleRuntimeState::at_spawn();

        let step = controller
            .plan(
                &state,
                &input(|input| {
                    input.forward = true;
                    input.left = true;
                }),
                Some(&pose),
                true,
                DT,
            )
            .expect("pose is available");
        let mut drive = SimMotor::default();
        let mut steer = SimMotor::default();
        step.commands.apply_to_joint(JointRole::Drive, &mut drive);
        step.commands.apply_to_joint(JointRole::Steer, &mut steer);

        assert_eq!(drive.velocity, Some((30.0, 400.0)));
        assert_eq!(steer.position, Some((0.8, 800.0, 60.0)));
        assert_eq!(step.commands.total_impulse(), Vec3::ZERO);

        let idle = controller
            .plan(&state, &InputState::default(), Some(&pose), true, DT)
            .expect("pose is available");
        assert_eq!(
            idle.commands.motor_command(JointRole::Drive),
            Some(&BodyCommand::MotorVelocity {
                joint: JointRole::Drive,
                target: 0.0,
                max_force: 20.0,
            })
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = sample_vehicle_config();
        config.mass = 0.0;
        assert!(LocomotionController::new(config).is_err());
    }

    #[test]
    fn turn_multiplier_saturates_and_carries_sign() {
        assert_eq!(turn_multiplier(0.0, 5.0), 0.0);
        assert_eq!(turn_multiplier(2.5, 5.0), 0.5);
        assert_eq!(turn_multiplier(12.0, 5.0), 1.0);
        assert_eq!(turn_multiplier(-12.0, 5.0), -1.0);
    }
}
