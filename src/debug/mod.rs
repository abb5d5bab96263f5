use crate::config::RideConfig;
use crate::gameplay::vehicle::VehicleTelemetry;
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugOverlayState>()
            .add_systems(
                Update,
                (
                    init_debug_overlay_from_config.run_if(resource_added::<RideConfig>),
                    toggle_debug_overlay,
                )
                    .chain(),
            )
            .add_systems(
                EguiPrimaryContextPass,
                debug_overlay_ui.run_if(not(in_state(GameState::Boot))),
            );
    }
}

#[derive(Resource, Debug, Clone, Default)]
struct DebugOverlayState {
    visible: bool,
}

fn init_debug_overlay_from_config(
    config: Res<RideConfig>,
    mut overlay_state: ResMut<DebugOverlayState>,
) {
    overlay_state.visible = config.game.app.debug_overlay;
}

fn toggle_debug_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut overlay_state: ResMut<DebugOverlayState>,
) {
    if !keyboard.just_pressed(KeyCode::F3) {
        return;
    }

    overlay_state.visible = !overlay_state.visible;
    if overlay_state.visible {
        info!("Debug overlay shown.");
    } else {
        info!("Debug overlay hidden.");
    }
}

fn debug_overlay_ui(
    mut egui_contexts: EguiContexts,
    mut overlay_state: ResMut<DebugOverlayState>,
    diagnostics: Res<DiagnosticsStore>,
    telemetry: Res<VehicleTelemetry>,
) {
    if !overlay_state.visible {
        return;
    }

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);
    let state = telemetry.state;
    let input = telemetry.input;
    let mut window_open = overlay_state.visible;
    let mut dump_clicked = false;

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Ride Debug")
        .open(&mut window_open)
        .resizable(false)
        .default_width(300.0)
        .show(ctx, |ui| {
            ui.label(format!("FPS: {fps:.0}"));
            ui.label(format!("Vehicle: {}", telemetry.vehicle_id));
            ui.separator();
            ui.label(format!(
                "Position: ({:.1}, {:.1}, {:.1})",
                telemetry.position.x, telemetry.position.y, telemetry.position.z
            ));
            ui.label(format!(
                "Speed: {:.2} m/s (forward {:.2})",
                telemetry.speed_mps, telemetry.forward_speed_mps
            ));
            ui.label(format!(
                "Grounded: {}",
                if telemetry.grounded { "yes" } else { "no" }
            ));
            ui.separator();

            ui.collapsing("Rig", |ui| {
                ui.label(format!("steer: {:+.3} rad", state.steer_angle));
                ui.label(format!("lean: {:+.3} rad", state.lean_angle));
                ui.label(format!("pitch: {:+.3} rad", state.pitch_angle));
                ui.label(format!("wheel spin: {:.3} rad", state.wheel_spin));
            });
            ui.collapsing("Timers", |ui| {
                ui.label(format!("throttle hold: {:.2} s", state.accel_hold_s));
                ui.label(format!("jump charge: {:.2} s", state.jump_charge_s));
            });
            ui.label(format!(
                "Input: {}{}{}{}{}",
                if input.forward { "W" } else { "-" },
                if input.backward { "S" } else { "-" },
                if input.left { "A" } else { "-" },
                if input.right { "D" } else { "-" },
                if input.jump { " JUMP" } else { "" },
            ));
            ui.separator();
            dump_clicked = ui.button("Log runtime state as JSON").clicked();
            ui.small("F3 toggle | F5 reload config | R respawn | Tab next vehicle");
        });

    overlay_state.visible = window_open;
    if dump_clicked {
        match (
            serde_json::to_string(&state),
            serde_json::to_string(&input),
        ) {
            (Ok(state_json), Ok(input_json)) => info!(
                "`{}` runtime state: {state_json} input: {input_json}",
                telemetry.vehicle_id
            ),
            (Err(error), _) | (_, Err(error)) => {
                warn!("Failed to serialize runtime state: {error}")
            }
        }
    }
}
