use crate::config::RideConfig;
use bevy::prelude::*;
use bevy_rapier3d::prelude::{DefaultRapierContext, RapierConfiguration};

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Riding,
    Paused,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(
                Update,
                boot_to_riding
                    .run_if(in_state(GameState::Boot))
                    .run_if(resource_exists::<RideConfig>),
            )
            .add_systems(OnEnter(GameState::Riding), enter_riding)
            .add_systems(Update, riding_controls.run_if(in_state(GameState::Riding)))
            .add_systems(OnEnter(GameState::Paused), enter_paused)
            .add_systems(OnExit(GameState::Paused), exit_paused)
            .add_systems(Update, pause_controls.run_if(in_state(GameState::Paused)));
    }
}

const PAUSE_KEYS: [KeyCode; 2] = [KeyCode::Escape, KeyCode::KeyP];

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_riding(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::Riding);
}

fn enter_riding() {
    info!("Entered state: Riding");
}

fn riding_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.any_just_pressed(PAUSE_KEYS) {
        next_state.set(GameState::Paused);
    }
}

fn enter_paused(mut rapier_config_query: Query<&mut RapierConfiguration, With<DefaultRapierContext>>) {
    set_physics_active(&mut rapier_config_query, false);
    info!("Entered state: Paused");
}

fn exit_paused(mut rapier_config_query: Query<&mut RapierConfiguration, With<DefaultRapierContext>>) {
    set_physics_active(&mut rapier_config_query, true);
}

fn pause_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.any_just_pressed(PAUSE_KEYS) {
        next_state.set(GameState::Riding);
    }
}

fn set_physics_active(
    rapier_config_query: &mut Query<&mut RapierConfiguration, With<DefaultRapierContext>>,
    active: bool,
) {
    match rapier_config_query.single_mut() {
        Ok(mut rapier_config) => rapier_config.physics_pipeline_active = active,
        Err(error) => warn!("Cannot toggle physics pipeline: {error}"),
    }
}
