use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

/// Below this squared length a vector has no usable direction.
pub const DIRECTION_EPSILON_SQ: f32 = 1.0e-8;

const MOTOR_VELOCITY_FACTOR: f32 = 1.0;

/// Kinematic snapshot of a rigid body, taken once per frame and never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Pose {
    pub fn at_rest(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    /// Reads a rapier body's written-back state; a body without `Velocity` is at rest.
    pub fn from_rapier(transform: &Transform, velocity: Option<&Velocity>) -> Self {
        let velocity = velocity.copied().unwrap_or_else(Velocity::zero);
        Self {
            position: transform.translation,
            rotation: transform.rotation,
            linear_velocity: velocity.linvel,
            angular_velocity: velocity.angvel,
        }
    }

    /// Body-local +Z in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Body-local -X in world space.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::NEG_X
    }

    pub fn forward_speed(&self) -> f32 {
        self.forward().dot(self.linear_velocity)
    }

    pub fn lateral_speed(&self) -> f32 {
        self.right().dot(self.linear_velocity)
    }

    /// Velocity with the world vertical component removed.
    pub fn planar_velocity(&self) -> Vec3 {
        Vec3::new(self.linear_velocity.x, 0.0, self.linear_velocity.z)
    }

    /// Rotation about the body's right axis, positive when the nose is up.
    pub fn pitch(&self) -> f32 {
        let (_, about_x, _) = self.rotation.to_euler(EulerRot::YXZ);
        -about_x
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}

/// The physics body a vehicle steers. Impulses are in N·s, torque impulses in N·m·s.
pub trait VehicleBody {
    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;
    fn linear_velocity(&self) -> Vec3;
    fn angular_velocity(&self) -> Vec3;
    fn apply_impulse(&mut self, impulse: Vec3, wake: bool);
    fn apply_torque_impulse(&mut self, torque_impulse: Vec3, wake: bool);
    fn set_angular_velocity(&mut self, angular_velocity: Vec3);

    fn pose(&self) -> Pose {
        Pose {
            position: self.position(),
            rotation: self.rotation(),
            linear_velocity: self.linear_velocity(),
            angular_velocity: self.angular_velocity(),
        }
    }
}

/// A single-axis joint motor.
pub trait JointMotor {
    fn set_motor_velocity(&mut self, target: f32, max_force: f32);
    fn set_motor_position(&mut self, target: f32, stiffness: f32, damping: f32);
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointRole {
    Drive,
    Steer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyCommand {
    Impulse(Vec3),
    TorqueImpulse(Vec3),
    MotorVelocity {
        joint: JointRole,
        target: f32,
        max_force: f32,
    },
    MotorPosition {
        joint: JointRole,
        target: f32,
        stiffness: f32,
        damping: f32,
    },
}

impl BodyCommand {
    fn is_finite(&self) -> bool {
        match *self {
            Self::Impulse(value) | Self::TorqueImpulse(value) => value.is_finite(),
            Self::MotorVelocity {
                target, max_force, ..
            } => target.is_finite() && max_force.is_finite(),
            Self::MotorPosition {
                target,
                stiffness,
                damping,
                ..
            } => target.is_finite() && stiffness.is_finite() && damping.is_finite(),
        }
    }
}

/// Commands planned for one frame, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyCommands {
    commands: Vec<BodyCommand>,
}

impl BodyCommands {
    pub fn push(&mut self, command: BodyCommand) {
        if command.is_finite() {
            self.commands.push(command);
        } else {
            warn!("Dropping non-finite vehicle body command {command:?}.");
        }
    }

    pub fn impulse(&mut self, impulse: Vec3) {
        self.push(BodyCommand::Impulse(impulse));
    }

    pub fn torque_impulse(&mut self, torque_impulse: Vec3) {
        self.push(BodyCommand::TorqueImpulse(torque_impulse));
    }

    pub fn iter(&self) -> impl Iterator<Item = &BodyCommand> {
        self.commands.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn total_impulse(&self) -> Vec3 {
        self.iter()
            .filter_map(|command| match command {
                BodyCommand::Impulse(value) => Some(*value),
                _ => None,
            })
            .sum()
    }

    pub fn total_torque_impulse(&self) -> Vec3 {
        self.iter()
            .filter_map(|command| match command {
                BodyCommand::TorqueImpulse(value) => Some(*value),
                _ => None,
            })
            .sum()
    }

    pub fn motor_command(&self, role: JointRole) -> Option<&BodyCommand> {
        self.iter().find(|command| match command {
            BodyCommand::MotorVelocity { joint, .. } | BodyCommand::MotorPosition { joint, .. } => {
                *joint == role
            }
            _ => false,
        })
    }

    /// Forwards the body-level commands; joint motor commands are skipped.
    pub fn apply_to_body<B: VehicleBody + ?Sized>(&self, body: &mut B) {
        for command in &self.commands {
            match *command {
                BodyCommand::Impulse(impulse) => body.apply_impulse(impulse, true),
                BodyCommand::TorqueImpulse(torque) => body.apply_torque_impulse(torque, true),
                BodyCommand::MotorVelocity { .. } | BodyCommand::MotorPosition { .. } => {}
            }
        }
    }

    /// Forwards the motor commands addressed to `role`.
    pub fn apply_to_joint<J: JointMotor + ?Sized>(&self, role: JointRole, joint: &mut J) {
        for command in &self.commands {
            match *command {
                BodyCommand::MotorVelocity {
                    joint: target_role,
                    target,
                    max_force,
                } if target_role == role => joint.set_motor_velocity(target, max_force),
                BodyCommand::MotorPosition {
                    joint: target_role,
                    target,
                    stiffness,
                    damping,
                } if target_role == role => joint.set_motor_position(target, stiffness, damping),
                _ => {}
            }
        }
    }
}

/// Rapier-backed body built from the components of one vehicle entity.
pub struct RapierBody<'a> {
    pub transform: &'a Transform,
    pub velocity: &'a mut Velocity,
    pub external_impulse: &'a mut ExternalImpulse,
    pub sleeping: Option<&'a mut Sleeping>,
}

impl RapierBody<'_> {
    fn wake(&mut self) {
        if let Some(sleeping) = self.sleeping.as_deref_mut() {
            sleeping.sleeping = false;
        }
    }
}

impl VehicleBody for RapierBody<'_> {
    fn position(&self) -> Vec3 {
        self.transform.translation
    }

    fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    fn linear_velocity(&self) -> Vec3 {
        self.velocity.linvel
    }

    fn angular_velocity(&self) -> Vec3 {
        self.velocity.angvel
    }

    fn apply_impulse(&mut self, impulse: Vec3, wake: bool) {
        self.external_impulse.impulse += impulse;
        if wake {
            self.wake();
        }
    }

    fn apply_torque_impulse(&mut self, torque_impulse: Vec3, wake: bool) {
        self.external_impulse.torque_impulse += torque_impulse;
        if wake {
            self.wake();
        }
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.velocity.angvel = angular_velocity;
    }
}

/// Revolute joint whose free axis is driven by the motor.
pub struct RapierJoint<'a>(pub &'a mut ImpulseJoint);

impl JointMotor for RapierJoint<'_> {
    fn set_motor_velocity(&mut self, target: f32, max_force: f32) {
        self.0
            .data
            .as_mut()
            .set_motor_velocity(JointAxis::AngX, target, MOTOR_VELOCITY_FACTOR)
            .set_motor_max_force(JointAxis::AngX, max_force);
    }

    fn set_motor_position(&mut self, target: f32, stiffness: f32, damping: f32) {
        self.0
            .data
            .as_mut()
            .set_motor_position(JointAxis::AngX, target, stiffness, damping);
    }
}

/// Semi-implicit Euler stand-in for a rapier body, with an optional flat floor.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct SimBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
    pub principal_inertia: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity: f32,
    pub floor_height: Option<f32>,
}

#[cfg(test)]
impl SimBody {
    pub fn new(mass: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass,
            principal_inertia: Vec3::splat(mass * 0.5),
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity: 0.0,
            floor_height: None,
        }
    }

    pub fn with_floor(mut self, height: f32, gravity: f32) -> Self {
        self.position.y = height;
        self.floor_height = Some(height);
        self.gravity = gravity;
        self
    }

    pub fn step(&mut self, dt: f32) {
        self.linear_velocity.y -= self.gravity * dt;
        self.linear_velocity *= 1.0 / (1.0 + dt * self.linear_damping);
        self.angular_velocity *= 1.0 / (1.0 + dt * self.angular_damping);

        self.position += self.linear_velocity * dt;
        self.rotation =
            (Quat::from_scaled_axis(self.angular_velocity * dt) * self.rotation).normalize();

        if let Some(floor) = self.floor_height {
            if self.position.y < floor {
                self.position.y = floor;
                self.linear_velocity.y = self.linear_velocity.y.max(0.0);
            }
        }
    }
}

#[cfg(test)]
impl VehicleBody for SimBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn apply_impulse(&mut self, impulse: Vec3, _wake: bool) {
        self.linear_velocity += impulse / self.mass;
    }

    fn apply_torque_impulse(&mut self, torque_impulse: Vec3, _wake: bool) {
        let local = self.rotation.inverse() * torque_impulse;
        let delta_local = local / self.principal_inertia;
        self.angular_velocity += self.rotation * delta_local;
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.angular_velocity = angular_velocity;
    }
}

/// Records the last motor command it received.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct SimMotor {
    pub velocity: Option<(f32, f32)>,
    pub position: Option<(f32, f32, f32)>,
}

#[cfg(test)]
impl JointMotor for SimMotor {
    fn set_motor_velocity(&mut self, target: f32, max_force: f32) {
        self.velocity = Some((target, max_force));
    }

    fn set_motor_position(&mut self, target: f32, stiffness: f32, damping: f32) {
        self.position = Some((target, stiffness, damping));
    }
}
