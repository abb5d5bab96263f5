use crate::config::{CameraConfig, ConfigError};
use crate::gameplay::vehicle::body::Pose;
use bevy::prelude::*;

const DEGENERATE_LOOK_DISTANCE_SQ: f32 = 1.0e-6;

/// Smoothed camera position and look-at target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRigState {
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for CameraRigState {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 25.0, 15.0),
            target: Vec3::ZERO,
        }
    }
}

impl CameraRigState {
    /// World transform looking from `position` at `target`, unless they coincide.
    pub fn look_transform(&self) -> Option<Transform> {
        if self.position.distance_squared(self.target) <= DEGENERATE_LOOK_DISTANCE_SQ {
            return None;
        }
        Some(Transform::from_translation(self.position).looking_at(self.target, Vec3::Y))
    }
}

/// Third-person follow camera that trails behind and above a vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseCamera {
    config: CameraConfig,
}

impl ChaseCamera {
    pub fn new(config: CameraConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn ideal(&self, pose: &Pose) -> CameraRigState {
        let forward = pose.forward();
        CameraRigState {
            position: pose.position + forward * -self.config.follow_distance
                + Vec3::Y * self.config.follow_height,
            target: pose.position
                + forward * self.config.look_ahead
                + Vec3::Y * self.config.target_height,
        }
    }

    /// Jump straight to the ideal pose; used when the followed vehicle (re)spawns.
    pub fn snap(&self, pose: &Pose) -> Option<CameraRigState> {
        pose.is_finite().then(|| self.ideal(pose))
    }

    /// Returns `None` when the frame should be skipped and the camera left as is.
    pub fn update(
        &self,
        state: &CameraRigState,
        pose: Option<&Pose>,
        dt: f32,
    ) -> Option<CameraRigState> {
        let pose = pose.filter(|pose| pose.is_finite())?;
        if !dt.is_finite() || dt <= 0.0 {
            return None;
        }

        let ideal = self.ideal(pose);
        Some(CameraRigState {
            position: state
                .position
                .lerp(ideal.position, (self.config.position_rate * dt).min(1.0)),
            target: state
                .target
                .lerp(ideal.target, (self.config.target_rate * dt).min(1.0)),
        })
    }
}
