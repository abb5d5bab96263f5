use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_rapier3d::prelude::*;
use ramp_rider::config::ConfigPlugin;
use ramp_rider::debug::DebugOverlayPlugin;
use ramp_rider::gameplay::GameplayPlugin;
use ramp_rider::states::{GameState, GameStatePlugin};

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Ramp Rider".to_string(),
                resolution: (1280, 720).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(ConfigPlugin)
        .add_plugins(DebugOverlayPlugin)
        .add_plugins(GameplayPlugin)
        .init_state::<GameState>()
        .add_plugins(GameStatePlugin)
        .run();
}
