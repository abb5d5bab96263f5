use super::body::{BodyCommands, Pose, DIRECTION_EPSILON_SQ};
use super::state::InputState;
use crate::config::VehicleConfig;

/// Planar speeds under this are treated as standing still, m/s.
const IDLE_SPEED_EPSILON: f32 = 0.01;
const LATERAL_SPEED_EPSILON: f32 = 1.0e-4;

/// Corrective impulses that keep an arcade vehicle on its line: sideways slip
/// cancellation, pitch auto-leveling and idle deceleration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GripStabilizer;

impl GripStabilizer {
    pub fn stabilize(
        &self,
        config: &VehicleConfig,
        input: &InputState,
        pose: Option<&Pose>,
        dt: f32,
    ) -> BodyCommands {
        let mut commands = BodyCommands::default();
        let Some(pose) = pose.filter(|pose| pose.is_finite()) else {
            return commands;
        };
        if !dt.is_finite() || dt <= 0.0 {
            return commands;
        }

        cancel_lateral_slip(config, pose, dt, &mut commands);
        level_pitch(config, pose, dt, &mut commands);
        if input.is_coasting() {
            apply_idle_drag(config, pose, dt, &mut commands);
        }

        commands
    }
}

fn cancel_lateral_slip(config: &VehicleConfig, pose: &Pose, dt: f32, commands: &mut BodyCommands) {
    let right = pose.right();
    if right.length_squared() <= DIRECTION_EPSILON_SQ {
        return;
    }
    let lateral_speed = pose.lateral_speed();
    if lateral_speed.abs() <= LATERAL_SPEED_EPSILON {
        return;
    }

    let correction = (config.grip * dt).min(1.0);
    commands.impulse(-right * lateral_speed * config.mass * correction);
}

fn level_pitch(config: &VehicleConfig, pose: &Pose, dt: f32, commands: &mut BodyCommands) {
    let Some(leveling) = config.pitch_leveling else {
        return;
    };
    let pitch = pose.pitch();
    if pitch.abs() <= leveling.threshold_rad {
        return;
    }

    commands.torque_impulse(pose.right() * (-pitch * leveling.gain * dt));
}

fn apply_idle_drag(config: &VehicleConfig, pose: &Pose, dt: f32, commands: &mut BodyCommands) {
    let planar = pose.planar_velocity();
    let speed = planar.length();
    if speed <= IDLE_SPEED_EPSILON {
        return;
    }
    let Some(direction) = planar.try_normalize() else {
        return;
    };

    // Never more than the momentum left, so drag cannot reverse the vehicle.
    let magnitude = (config.idle_drag * dt).min(config.mass * speed);
    commands.impulse(-direction * magnitude);
}
