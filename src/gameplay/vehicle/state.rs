use serde::Serialize;

/// Jump charge saturates after this many seconds of holding the button.
pub const MAX_JUMP_CHARGE_S: f32 = 1.0;

/// Resolved per-frame action flags. Anything the host does not set is `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl InputState {
    /// +1 for left, -1 for right, 0 for neither or both.
    pub fn steer_sign(&self) -> f32 {
        (self.left as i8 - self.right as i8) as f32
    }

    /// +1 for forward, -1 for backward, 0 for neither or both.
    pub fn drive_sign(&self) -> f32 {
        (self.forward as i8 - self.backward as i8) as f32
    }

    pub fn is_coasting(&self) -> bool {
        !self.forward && !self.backward
    }
}

/// Everything a vehicle remembers between frames.
///
/// Angles are in radians. The steering, lean and pitch channels only ever move
/// through [`smooth_towards`](super::rig::smooth_towards) after spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VehicleRuntimeState {
    pub steer_angle: f32,
    pub lean_angle: f32,
    pub pitch_angle: f32,
    pub wheel_spin: f32,
    pub accel_hold_s: f32,
    pub jump_charge_s: f32,
    pub jump_was_held: bool,
}

impl VehicleRuntimeState {
    /// State of a freshly (re)spawned vehicle.
    pub fn at_spawn() -> Self {
        Self::default()
    }

    /// Advances the acceleration-hold and jump-charge timers for one frame.
    ///
    /// Returns the charge that was released this frame, if jump went from held
    /// to not held. The charge is cleared on release whether or not the caller
    /// ends up consuming it.
    pub(crate) fn advance_timers(&mut self, input: &InputState, dt: f32) -> Option<f32> {
        if input.forward {
            self.accel_hold_s += dt;
        } else {
            self.accel_hold_s = 0.0;
        }

        let released = if input.jump {
            self.jump_charge_s = (self.jump_charge_s + dt).clamp(0.0, MAX_JUMP_CHARGE_S);
            None
        } else if self.jump_was_held {
            let charge = self.jump_charge_s;
            self.jump_charge_s = 0.0;
            Some(charge)
        } else {
            self.jump_charge_s = 0.0;
            None
        };

        self.jump_was_held = input.jump;
        released
    }

    pub fn is_charging_jump(&self) -> bool {
        self.jump_was_held && self.jump_charge_s > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn steer_sign_cancels_when_both_held() {
        let input = InputState {
            left: true,
            right: true,
            ..default_input()
        };
        assert_eq!(input.steer_sign(), 0.0);
        assert_eq!(
            InputState {
                left: true,
                ..default_input()
            }
            .steer_sign(),
            1.0
        );
        assert_eq!(
            InputState {
                right: true,
                ..default_input()
            }
            .steer_sign(),
            -1.0
        );
    }

    #[test]
    fn accel_timer_grows_while_held_and_resets_exactly() {
        let mut state = VehicleRuntimeState::at_spawn();
        let forward = InputState {
            forward: true,
            ..default_input()
        };

        let mut previous = 0.0;
        for _ in 0..30 {
            state.advance_timers(&forward, DT);
            assert!(state.accel_hold_s >= previous);
            previous = state.accel_hold_s;
        }
        assert!((state.accel_hold_s - 0.5).abs() < 1e-4);

        state.advance_timers(&default_input(), DT);
        assert_eq!(state.accel_hold_s, 0.0);
    }

    #[test]
    fn jump_charge_clamps_and_is_released_once() {
        let mut state = VehicleRuntimeState::at_spawn();
        let hold = InputState {
            jump: true,
            ..default_input()
        };

        for _ in 0..120 {
            assert_eq!(state.advance_timers(&hold, DT), None);
        }
        assert_eq!(state.jump_charge_s, MAX_JUMP_CHARGE_S);
        assert!(state.is_charging_jump());

        let released = state.advance_timers(&default_input(), DT);
        assert_eq!(released, Some(MAX_JUMP_CHARGE_S));
        assert_eq!(state.jump_charge_s, 0.0);

        assert_eq!(state.advance_timers(&default_input(), DT), None);
    }

    fn default_input() -> InputState {
        InputState::default()
    }
}
