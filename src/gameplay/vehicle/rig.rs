use super::body::Pose;
use super::locomotion::turn_multiplier;
use super::state::{InputState, VehicleRuntimeState};
use crate::config::VehicleConfig;
use bevy::prelude::*;
use std::f32::consts::TAU;

/// Frame-rate independent exponential approach; never overshoots `target`.
pub fn smooth_towards(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    let blend = (rate * dt).clamp(0.0, 1.0);
    current + (target - current) * blend
}

/// Wraps into `[0, 2π)`. `rem_euclid` of a tiny negative angle rounds up to exactly `TAU` in f32.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Which rotation channel a rig node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigRole {
    /// Rolls the whole model about local Z.
    LeanPivot,
    /// Tilts about local X; spawned behind the body center so it pivots on the rear wheel.
    PitchPivot,
    SteerColumn,
    Wheel,
}

impl RigRole {
    pub fn rotation(&self, base_rotation: Quat, state: &VehicleRuntimeState) -> Quat {
        let channel = match self {
            Self::LeanPivot => Quat::from_rotation_z(-state.lean_angle),
            Self::PitchPivot => Quat::from_rotation_x(state.pitch_angle),
            Self::SteerColumn => Quat::from_rotation_y(state.steer_angle),
            Self::Wheel => Quat::from_rotation_x(state.wheel_spin),
        };
        base_rotation * channel
    }
}

/// Derives steering, lean, pitch and wheel spin from the post-step motion.
///
/// Purely presentational: nothing here feeds back into the physics body.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisualAnimationRig;

impl VisualAnimationRig {
    pub fn animate(
        &self,
        config: &VehicleConfig,
        state: &VehicleRuntimeState,
        input: &InputState,
        pose: Option<&Pose>,
        grounded: bool,
        dt: f32,
    ) -> Option<VehicleRuntimeState> {
        let pose = pose.filter(|pose| pose.is_finite())?;
        if !dt.is_finite() || dt <= 0.0 {
            return None;
        }

        let rig = &config.rig;
        let steer_sign = input.steer_sign();
        let forward_speed = pose.forward_speed();
        let mut next = *state;

        next.steer_angle = smooth_towards(
            state.steer_angle,
            steer_sign * rig.max_steer_angle,
            rig.steer_rate,
            dt,
        );

        let lean_target = steer_sign
            * rig.lean_coefficient
            * turn_multiplier(forward_speed, config.steer_speed_norm);
        next.lean_angle = smooth_towards(state.lean_angle, lean_target, rig.lean_rate, dt);

        let pitch_target = self.pitch_target(config, state, input, pose, grounded);
        next.pitch_angle = smooth_towards(state.pitch_angle, pitch_target, rig.pitch_rate, dt);

        next.wheel_spin = wrap_angle(state.wheel_spin + forward_speed / rig.wheel_radius * dt);

        Some(next)
    }

    /// Airborne beats charging, charging beats the braking wheelie.
    fn pitch_target(
        &self,
        config: &VehicleConfig,
        state: &VehicleRuntimeState,
        input: &InputState,
        pose: &Pose,
        grounded: bool,
    ) -> f32 {
        let rig = &config.rig;
        if !grounded {
            return -(pose.linear_velocity.y * rig.air_pitch_gain)
                .clamp(-rig.air_pitch_max, rig.air_pitch_max);
        }
        if state.is_charging_jump() {
            return rig.charge_pitch * state.jump_charge_s;
        }
        let braking = input.backward && !(input.forward && config.suppress_brake_with_throttle);
        if braking {
            return rig.wheelie_pitch;
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sample_vehicle_config;
    use std::f32::consts::PI;

    const DT: f32 = 1.0 / 60.0;

    fn cruising(forward_speed: f32) -> Pose {
        Pose {
            linear_velocity: Vec3::Z * forward_speed,
            ..Pose::at_rest(Vec3::Y * 0.6, Quat::IDENTITY)
        }
    }

    fn animate(
        state: &VehicleRuntimeState,
        input: &InputState,
        pose: &Pose,
        grounded: bool,
    ) -> VehicleRuntimeState {
        VisualAnimationRig
            .animate(&sample_vehicle_config(), state, input, Some(pose), grounded, DT)
            .expect("pose is available")
    }

    #[test]
    fn smoothing_converges_without_overshoot() {
        let mut value = 0.0;
        let mut previous = value;
        for _ in 0..600 {
            value = smooth_towards(value, 0.8, 10.0, DT);
            assert!(value >= previous);
            assert!(value <= 0.8);
            previous = value;
        }
        assert!((value - 0.8).abs() < 1e-4);

        // A huge step saturates to the target instead of passing it.
        assert_eq!(smooth_towards(0.0, 0.8, 10.0, 1.0), 0.8);
    }

    #[test]
    fn steering_angle_approaches_max_steer() {
        let left = InputState {
            left: true,
            ..InputState::default()
        };
        let pose = cruising(5.0);
        let mut state = VehicleRuntimeState::at_spawn();

        for _ in 0..120 {
            let next = animate(&state, &left, &pose, true);
            assert!(next.steer_angle >= state.steer_angle);
            assert!(next.steer_angle <= 0.8);
            state = next;
        }
        assert!((state.steer_angle - 0.8).abs() < 1e-3);
    }

    #[test]
    fn lean_rises_then_decays_without_changing_sign() {
        let left = InputState {
            left: true,
            ..InputState::default()
        };
        let pose = cruising(10.0);
        let mut state = VehicleRuntimeState::at_spawn();

        for _ in 0..30 {
            let next = animate(&state, &left, &pose, true);
            assert!(next.lean_angle > state.lean_angle);
            state = next;
        }
        let peak = state.lean_angle;
        assert!(peak > 0.0 && peak <= 0.15);

        for _ in 0..120 {
            let next = animate(&state, &InputState::default(), &pose, true);
            assert!(next.lean_angle < state.lean_angle);
            assert!(next.lean_angle >= 0.0);
            state = next;
        }
        assert!(state.lean_angle < peak * 0.01);
    }

    #[test]
    fn pitch_target_precedence() {
        let braking = InputState {
            backward: true,
            ..InputState::default()
        };
        let config = sample_vehicle_config();
        let rig = VisualAnimationRig;
        let rising = Pose {
            linear_velocity: Vec3::Y * 4.0,
            ..cruising(0.0)
        };
        let mut charging = VehicleRuntimeState::at_spawn();
        charging.jump_charge_s = 0.5;
        charging.jump_was_held = true;

        // Airborne wins over charging and braking.
        let airborne = rig.pitch_target(&config, &charging, &braking, &rising, false);
        assert!((airborne - -0.2).abs() < 1e-5);

        let charged = rig.pitch_target(&config, &charging, &braking, &cruising(0.0), true);
        assert!((charged - 0.06).abs() < 1e-5);

        let wheelie = rig.pitch_target(
            &config,
            &VehicleRuntimeState::at_spawn(),
            &braking,
            &cruising(2.0),
            true,
        );
        assert!((wheelie - -PI / 5.0).abs() < 1e-5);

        let level = rig.pitch_target(
            &config,
            &VehicleRuntimeState::at_spawn(),
            &InputState::default(),
            &cruising(2.0),
            true,
        );
        assert_eq!(level, 0.0);
    }

    #[test]
    fn airborne_pitch_is_clamped() {
        let config = sample_vehicle_config();
        let falling_fast = Pose {
            linear_velocity: Vec3::NEG_Y * 100.0,
            ..cruising(0.0)
        };
        let target = VisualAnimationRig.pitch_target(
            &config,
            &VehicleRuntimeState::at_spawn(),
            &InputState::default(),
            &falling_fast,
            false,
        );

        assert_eq!(target, config.rig.air_pitch_max);
    }

    #[test]
    fn wheel_spin_tracks_forward_speed_and_wraps() {
        let pose = cruising(5.5);
        let state = VehicleRuntimeState::at_spawn();

        let next = animate(&state, &InputState::default(), &pose, true);
        assert!((next.wheel_spin - 5.5 / 0.55 * DT).abs() < 1e-5);

        let mut spinning = state;
        for _ in 0..600 {
            spinning = animate(&spinning, &InputState::default(), &pose, true);
            assert!((0.0..TAU).contains(&spinning.wheel_spin));
        }
    }

    #[test]
    fn wheel_spin_stays_below_full_turn_when_creeping_backwards() {
        assert_eq!(wrap_angle(-1.0e-9), 0.0);
        assert_eq!(wrap_angle(TAU), 0.0);
        assert!((wrap_angle(-0.5) - (TAU - 0.5)).abs() < 1e-6);

        let creeping = cruising(-1.0e-7);
        let next = animate(
            &VehicleRuntimeState::at_spawn(),
            &InputState::default(),
            &creeping,
            true,
        );
        assert!((0.0..TAU).contains(&next.wheel_spin));
    }

    #[test]
    fn zero_input_at_rest_is_idempotent() {
        let state = VehicleRuntimeState::at_spawn();
        let rest = cruising(0.0);

        assert_eq!(animate(&state, &InputState::default(), &rest, true), state);
    }

    #[test]
    fn roles_rotate_about_their_axis_after_base() {
        let state = VehicleRuntimeState {
            lean_angle: 0.1,
            steer_angle: 0.3,
            ..VehicleRuntimeState::at_spawn()
        };
        let base = Quat::from_rotation_y(PI);

        let lean = RigRole::LeanPivot.rotation(Quat::IDENTITY, &state);
        assert!(lean.abs_diff_eq(Quat::from_rotation_z(-0.1), 1e-6));

        let steer = RigRole::SteerColumn.rotation(base, &state);
        assert!(steer.abs_diff_eq(base * Quat::from_rotation_y(0.3), 1e-6));
    }
}
