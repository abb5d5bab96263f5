use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::f32::consts::PI;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_ride_config)
            .add_systems(Update, reload_ride_config_hotkey);
    }
}

fn load_ride_config(mut commands: Commands) {
    let config = RideConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`; respawn (R) applies them.");

    commands.insert_resource(config);
}

fn reload_ride_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    ride_config: Option<ResMut<RideConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = ride_config else {
        warn!("Config hot-reload requested, but `RideConfig` resource is not initialized yet.");
        return;
    };

    match RideConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &RideConfig) {
    info!(
        "{prefix} config: {} vehicle archetypes, default `{}`, {} spawned.",
        config.vehicles_by_id.len(),
        config.game.app.default_vehicle,
        config.spawn_roster().count()
    );
}

#[derive(Resource, Debug, Clone)]
pub struct RideConfig {
    pub game: GameFile,
    pub vehicles: VehiclesFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
}

impl RideConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;
        Self::from_files(game, vehicles)
    }

    pub fn from_files(game: GameFile, vehicles: VehiclesFile) -> Result<Self, ConfigError> {
        let config = Self {
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            game,
            vehicles,
        };

        config.validate_references()?;
        Ok(config)
    }

    pub fn default_vehicle(&self) -> Option<&VehicleConfig> {
        self.vehicles_by_id.get(&self.game.app.default_vehicle)
    }

    /// Vehicles spawned side by side when a ride starts, in lineup order.
    ///
    /// Falls back to the default vehicle alone when no lineup is configured.
    pub fn spawn_roster(&self) -> impl Iterator<Item = &VehicleConfig> + '_ {
        let ids: Vec<&String> = if self.game.app.spawn_vehicles.is_empty() {
            vec![&self.game.app.default_vehicle]
        } else {
            self.game.app.spawn_vehicles.iter().collect()
        };
        ids.into_iter()
            .filter_map(|id| self.vehicles_by_id.get(id.as_str()))
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if !self
            .vehicles_by_id
            .contains_key(&self.game.app.default_vehicle)
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.default_vehicle references unknown vehicle id `{}`",
                self.game.app.default_vehicle
            )));
        }

        for (index, vehicle_id) in self.game.app.spawn_vehicles.iter().enumerate() {
            if !self.vehicles_by_id.contains_key(vehicle_id) {
                return Err(ConfigError::Validation(format!(
                    "game.toml::app.spawn_vehicles[{index}] references unknown vehicle id `{vehicle_id}`"
                )));
            }
        }

        if !(self.game.app.spawn_spacing_m > 0.0 && self.game.app.spawn_spacing_m.is_finite()) {
            return Err(ConfigError::Validation(
                "game.toml::app.spawn_spacing_m must be > 0".to_string(),
            ));
        }
        if !(self.game.world.gravity >= 0.0 && self.game.world.gravity.is_finite()) {
            return Err(ConfigError::Validation(
                "game.toml::world.gravity must be >= 0".to_string(),
            ));
        }
        if !(self.game.world.ground_half_size_m > 0.0
            && self.game.world.ground_half_size_m.is_finite())
        {
            return Err(ConfigError::Validation(
                "game.toml::world.ground_half_size_m must be > 0".to_string(),
            ));
        }

        self.game.camera.validate()?;

        for vehicle in &self.vehicles.vehicles {
            vehicle.validate()?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub default_vehicle: String,
    #[serde(default)]
    pub spawn_vehicles: Vec<String>,
    #[serde(default = "default_spawn_spacing_m")]
    pub spawn_spacing_m: f32,
    #[serde(default)]
    pub debug_overlay: bool,
}

fn default_spawn_spacing_m() -> f32 {
    6.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    pub gravity: f32,
    pub ground_half_size_m: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: 18.0,
            ground_half_size_m: 250.0,
        }
    }
}

/// Chase camera tuning. Distances in meters, rates in 1/s.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub follow_distance: f32,
    pub follow_height: f32,
    pub look_ahead: f32,
    pub target_height: f32,
    pub position_rate: f32,
    pub target_rate: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_distance: 18.0,
            follow_height: 15.0,
            look_ahead: 10.0,
            target_height: 0.0,
            position_rate: 5.0,
            target_rate: 15.0,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("follow_distance", self.follow_distance),
            ("follow_height", self.follow_height),
            ("look_ahead", self.look_ahead),
            ("target_height", self.target_height),
            ("position_rate", self.position_rate),
            ("target_rate", self.target_rate),
        ];
        if let Some((name, _)) = values.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConfigError::Validation(format!(
                "game.toml::camera.{name} must be finite"
            )));
        }
        if self.position_rate <= 0.0 || self.target_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera smoothing rates must be > 0".to_string(),
            ));
        }
        // The camera must sit somewhere other than the point it looks at.
        if self.follow_distance + self.look_ahead <= 0.0
            && (self.follow_height - self.target_height).abs() <= f32::EPSILON
        {
            return Err(ConfigError::Validation(
                "game.toml::camera ideal position coincides with its look-at target".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

/// Immutable tuning record for one vehicle archetype.
///
/// Forces in newtons, speeds in m/s, torques in N·m, angles in radians.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub mass: f32,
    pub engine_force: f32,
    #[serde(default = "default_reverse_force_ratio")]
    pub reverse_force_ratio: f32,
    pub max_forward_speed: f32,
    pub max_reverse_speed: f32,
    pub steering_torque: f32,
    #[serde(default = "default_steer_speed_norm")]
    pub steer_speed_norm: f32,
    #[serde(default)]
    pub min_steer_speed: f32,
    pub grip: f32,
    #[serde(default)]
    pub idle_drag: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Holding forward and backward together keeps momentum instead of braking.
    #[serde(default)]
    pub suppress_brake_with_throttle: bool,
    #[serde(default)]
    pub ramp_up: Option<RampUpConfig>,
    #[serde(default)]
    pub jump: Option<JumpConfig>,
    #[serde(default)]
    pub pitch_leveling: Option<PitchLevelingConfig>,
    #[serde(default)]
    pub articulation: Articulation,
    pub collider: ColliderShape,
    pub ground: GroundConfig,
    #[serde(default)]
    pub rig: RigConfig,
}

fn default_reverse_force_ratio() -> f32 {
    0.5
}

fn default_steer_speed_norm() -> f32 {
    5.0
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

impl VehicleConfig {
    /// Rejects records that would feed NaN or infinities into the physics state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let id = &self.id;
        let fail = |message: &str| {
            Err(ConfigError::Validation(format!(
                "vehicles.toml::vehicles `{id}`: {message}"
            )))
        };

        if let Some(name) = self.first_non_finite_field() {
            return fail(&format!("{name} must be finite"));
        }
        if self.mass <= 0.0 {
            return fail("mass must be > 0");
        }
        if self.engine_force < 0.0 {
            return fail("engine_force must be >= 0");
        }
        if matches!(self.articulation, Articulation::SingleBody) && self.engine_force <= 0.0 {
            return fail("single_body vehicles need engine_force > 0");
        }
        if !(0.0..=1.0).contains(&self.reverse_force_ratio) {
            return fail("reverse_force_ratio must be in [0, 1]");
        }
        if self.max_forward_speed <= 0.0 {
            return fail("max_forward_speed must be > 0");
        }
        if self.max_reverse_speed <= 0.0 {
            return fail("max_reverse_speed must be > 0");
        }
        if self.steering_torque < 0.0 {
            return fail("steering_torque must be >= 0");
        }
        if self.steer_speed_norm <= 0.0 {
            return fail("steer_speed_norm must be > 0");
        }
        if self.min_steer_speed < 0.0 {
            return fail("min_steer_speed must be >= 0");
        }
        if self.grip < 0.0 {
            return fail("grip must be >= 0");
        }
        if self.idle_drag < 0.0 {
            return fail("idle_drag must be >= 0");
        }
        if self.linear_damping < 0.0 || self.angular_damping < 0.0 {
            return fail("damping must be >= 0");
        }
        if let Some(ramp_up) = &self.ramp_up {
            if ramp_up.cap_s <= 0.0 || ramp_up.exponent <= 0.0 || ramp_up.scale < 0.0 {
                return fail("ramp_up needs cap_s > 0, exponent > 0 and scale >= 0");
            }
        }
        if let Some(jump) = &self.jump {
            if jump.base_impulse < 0.0 || jump.charge_impulse < 0.0 || jump.forward_bias < 0.0 {
                return fail("jump impulses must be >= 0");
            }
        }
        if let Some(leveling) = &self.pitch_leveling {
            if leveling.threshold_rad < 0.0 || leveling.gain <= 0.0 {
                return fail("pitch_leveling needs threshold_rad >= 0 and gain > 0");
            }
        }
        if let Articulation::MultiJoint(joints) = &self.articulation {
            if joints.wheel_radius <= 0.0 || joints.axle_half_width <= 0.0 {
                return fail("articulation.wheel_radius and axle_half_width must be > 0");
            }
            if joints.wheel_mass <= 0.0 {
                return fail("articulation.wheel_mass must be > 0");
            }
            if joints.drive_max_force <= 0.0 || joints.coast_max_force < 0.0 {
                return fail("articulation motor forces must be positive");
            }
            if joints.steer_stiffness <= 0.0 || joints.steer_damping < 0.0 {
                return fail("articulation steering motor needs stiffness > 0 and damping >= 0");
            }
        }
        if !self.collider.is_valid() {
            return fail("collider dimensions must be > 0");
        }
        if self.ground.rest_height <= 0.0 {
            return fail("ground.rest_height must be > 0");
        }
        if self.ground.tolerance < 0.0 || self.ground.probe_length <= 0.0 {
            return fail("ground needs tolerance >= 0 and probe_length > 0");
        }
        self.rig.validate().or_else(|message| fail(message))
    }

    fn first_non_finite_field(&self) -> Option<&'static str> {
        let mut fields = vec![
            ("mass", self.mass),
            ("engine_force", self.engine_force),
            ("reverse_force_ratio", self.reverse_force_ratio),
            ("max_forward_speed", self.max_forward_speed),
            ("max_reverse_speed", self.max_reverse_speed),
            ("steering_torque", self.steering_torque),
            ("steer_speed_norm", self.steer_speed_norm),
            ("min_steer_speed", self.min_steer_speed),
            ("grip", self.grip),
            ("idle_drag", self.idle_drag),
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
            ("ground.rest_height", self.ground.rest_height),
            ("ground.tolerance", self.ground.tolerance),
            ("ground.probe_length", self.ground.probe_length),
            ("rig.wheel_radius", self.rig.wheel_radius),
            ("rig.max_steer_angle", self.rig.max_steer_angle),
            ("rig.lean_coefficient", self.rig.lean_coefficient),
            ("rig.steer_rate", self.rig.steer_rate),
            ("rig.lean_rate", self.rig.lean_rate),
            ("rig.pitch_rate", self.rig.pitch_rate),
            ("rig.wheelie_pitch", self.rig.wheelie_pitch),
            ("rig.air_pitch_gain", self.rig.air_pitch_gain),
            ("rig.air_pitch_max", self.rig.air_pitch_max),
            ("rig.charge_pitch", self.rig.charge_pitch),
            ("rig.pitch_pivot_offset", self.rig.pitch_pivot_offset),
        ];
        if let Some(ramp_up) = &self.ramp_up {
            fields.extend([
                ("ramp_up.cap_s", ramp_up.cap_s),
                ("ramp_up.exponent", ramp_up.exponent),
                ("ramp_up.scale", ramp_up.scale),
            ]);
        }
        if let Some(jump) = &self.jump {
            fields.extend([
                ("jump.base_impulse", jump.base_impulse),
                ("jump.charge_impulse", jump.charge_impulse),
                ("jump.forward_bias", jump.forward_bias),
                ("jump.pump_min_speed", jump.pump_min_speed),
            ]);
        }
        if let Some(leveling) = &self.pitch_leveling {
            fields.extend([
                ("pitch_leveling.threshold_rad", leveling.threshold_rad),
                ("pitch_leveling.gain", leveling.gain),
            ]);
        }
        if let Articulation::MultiJoint(joints) = &self.articulation {
            fields.extend([
                ("articulation.drive_speed", joints.drive_speed),
                ("articulation.drive_max_force", joints.drive_max_force),
                ("articulation.coast_max_force", joints.coast_max_force),
                ("articulation.steer_stiffness", joints.steer_stiffness),
                ("articulation.steer_damping", joints.steer_damping),
                ("articulation.wheel_radius", joints.wheel_radius),
                ("articulation.axle_half_width", joints.axle_half_width),
                ("articulation.wheel_mass", joints.wheel_mass),
            ]);
            fields.extend(
                joints
                    .drive_anchor
                    .iter()
                    .map(|value| ("articulation.drive_anchor", *value)),
            );
            fields.extend(
                joints
                    .steer_anchor
                    .iter()
                    .map(|value| ("articulation.steer_anchor", *value)),
            );
        }
        match &self.collider {
            ColliderShape::Cuboid { half_extents } => fields.extend(
                half_extents
                    .iter()
                    .map(|value| ("collider.half_extents", *value)),
            ),
            ColliderShape::Capsule {
                half_height,
                radius,
            } => fields.extend([
                ("collider.half_height", *half_height),
                ("collider.radius", *radius),
            ]),
            ColliderShape::Ball { radius } => fields.push(("collider.radius", *radius)),
        }

        fields
            .into_iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| name)
    }

    pub fn is_articulated(&self) -> bool {
        matches!(self.articulation, Articulation::MultiJoint(_))
    }
}

/// Engine force bonus for sustained throttle: `min(hold, cap_s)^exponent * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RampUpConfig {
    pub cap_s: f32,
    pub exponent: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct JumpConfig {
    pub base_impulse: f32,
    pub charge_impulse: f32,
    #[serde(default)]
    pub forward_bias: f32,
    #[serde(default = "default_pump_min_speed")]
    pub pump_min_speed: f32,
}

fn default_pump_min_speed() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PitchLevelingConfig {
    pub threshold_rad: f32,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Articulation {
    #[default]
    SingleBody,
    MultiJoint(JointDriveConfig),
}

/// Motor tuning for vehicles whose wheels are separate bodies on revolute joints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointDriveConfig {
    /// Drive wheel target angular speed, rad/s.
    pub drive_speed: f32,
    pub drive_max_force: f32,
    pub coast_max_force: f32,
    pub steer_stiffness: f32,
    pub steer_damping: f32,
    pub wheel_radius: f32,
    /// Half the width of each axle roller.
    pub axle_half_width: f32,
    pub wheel_mass: f32,
    /// Chassis-local anchor of the driven axle.
    pub drive_anchor: [f32; 3],
    /// Chassis-local anchor of the steering pivot.
    pub steer_anchor: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ColliderShape {
    Cuboid { half_extents: [f32; 3] },
    Capsule { half_height: f32, radius: f32 },
    Ball { radius: f32 },
}

impl ColliderShape {
    fn is_valid(&self) -> bool {
        match self {
            Self::Cuboid { half_extents } => half_extents.iter().all(|extent| *extent > 0.0),
            Self::Capsule {
                half_height,
                radius,
            } => *half_height >= 0.0 && *radius > 0.0,
            Self::Ball { radius } => *radius > 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundProbe {
    #[default]
    HeightThreshold,
    Raycast,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GroundConfig {
    /// Body center height above flat ground when resting on it.
    pub rest_height: f32,
    #[serde(default = "default_ground_tolerance")]
    pub tolerance: f32,
    #[serde(default)]
    pub probe: GroundProbe,
    /// Extra ray length below the resting contact when `probe = "raycast"`.
    #[serde(default = "default_probe_length")]
    pub probe_length: f32,
}

fn default_ground_tolerance() -> f32 {
    0.15
}

fn default_probe_length() -> f32 {
    0.3
}

impl GroundConfig {
    pub fn is_grounded_at_height(&self, height: f32) -> bool {
        height <= self.rest_height + self.tolerance
    }
}

/// Presentation-only tuning for the animation rig.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub wheel_radius: f32,
    pub max_steer_angle: f32,
    pub lean_coefficient: f32,
    pub steer_rate: f32,
    pub lean_rate: f32,
    pub pitch_rate: f32,
    pub wheelie_pitch: f32,
    pub air_pitch_gain: f32,
    pub air_pitch_max: f32,
    pub charge_pitch: f32,
    /// Distance behind the body center of the point the pitch pivot rotates about.
    pub pitch_pivot_offset: f32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 0.55,
            max_steer_angle: 0.8,
            lean_coefficient: 0.15,
            steer_rate: 10.0,
            lean_rate: 8.0,
            pitch_rate: 6.0,
            wheelie_pitch: -PI / 5.0,
            air_pitch_gain: 0.05,
            air_pitch_max: 0.5,
            charge_pitch: 0.12,
            pitch_pivot_offset: 1.0,
        }
    }
}

impl RigConfig {
    fn validate(&self) -> Result<(), &'static str> {
        if self.wheel_radius <= 0.0 {
            return Err("rig.wheel_radius must be > 0");
        }
        if self.steer_rate <= 0.0 || self.lean_rate <= 0.0 || self.pitch_rate <= 0.0 {
            return Err("rig smoothing rates must be > 0");
        }
        if self.max_steer_angle < 0.0 || self.air_pitch_max < 0.0 || self.air_pitch_gain < 0.0 {
            return Err("rig steer and air pitch limits must be >= 0");
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_vehicle_config() -> VehicleConfig {
    VehicleConfig {
        id: "test_bmx".to_string(),
        mass: 60.0,
        engine_force: 600.0,
        reverse_force_ratio: 0.5,
        max_forward_speed: 20.0,
        max_reverse_speed: 6.0,
        steering_torque: 90.0,
        steer_speed_norm: 5.0,
        min_steer_speed: 0.0,
        grip: 8.0,
        idle_drag: 60.0,
        linear_damping: 0.0,
        angular_damping: 0.0,
        suppress_brake_with_throttle: false,
        ramp_up: None,
        jump: Some(JumpConfig {
            base_impulse: 300.0,
            charge_impulse: 240.0,
            forward_bias: 60.0,
            pump_min_speed: 2.0,
        }),
        pitch_leveling: Some(PitchLevelingConfig {
            threshold_rad: 0.15,
            gain: 120.0,
        }),
        articulation: Articulation::SingleBody,
        collider: ColliderShape::Cuboid {
            half_extents: [0.3, 0.6, 1.0],
        },
        ground: GroundConfig {
            rest_height: 0.6,
            tolerance: 0.15,
            probe: GroundProbe::HeightThreshold,
            probe_length: 0.3,
        },
        rig: RigConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_game_file(default_vehicle: &str) -> GameFile {
        GameFile {
            app: AppConfig {
                default_vehicle: default_vehicle.to_string(),
                spawn_vehicles: Vec::new(),
                spawn_spacing_m: 6.0,
                debug_overlay: true,
            },
            world: WorldConfig::default(),
            camera: CameraConfig::default(),
        }
    }

    #[test]
    fn shipped_config_directory_is_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_DIR);
        let config = RideConfig::load_from_dir(&dir).expect("shipped config should load");

        assert!(config.default_vehicle().is_some());
        assert!(config.spawn_roster().count() >= 1);
        assert!(config
            .vehicles
            .vehicles
            .iter()
            .any(VehicleConfig::is_articulated));
    }

    #[test]
    fn validation_fails_for_missing_default_vehicle() {
        let error = RideConfig::from_files(
            sample_game_file("missing_bike"),
            VehiclesFile {
                vehicles: vec![sample_vehicle_config()],
            },
        )
        .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("default_vehicle"));
        assert!(message.contains("missing_bike"));
    }

    #[test]
    fn duplicate_vehicle_ids_are_rejected() {
        let error = RideConfig::from_files(
            sample_game_file("test_bmx"),
            VehiclesFile {
                vehicles: vec![sample_vehicle_config(), sample_vehicle_config()],
            },
        )
        .expect_err("duplicate ids should fail");

        assert!(error.to_string().contains("duplicate id `test_bmx`"));
    }

    #[test]
    fn non_positive_mass_fails_fast() {
        let mut vehicle = sample_vehicle_config();
        vehicle.mass = 0.0;
        let message = vehicle.validate().expect_err("zero mass").to_string();
        assert!(message.contains("mass"));

        vehicle.mass = -3.0;
        assert!(vehicle.validate().is_err());
    }

    #[test]
    fn non_finite_tuning_values_fail_fast() {
        let cases: [(&str, fn(&mut VehicleConfig)); 6] = [
            ("rig.steer_rate", |vehicle| vehicle.rig.steer_rate = f32::NAN),
            ("max_forward_speed", |vehicle| {
                vehicle.max_forward_speed = f32::NAN
            }),
            ("grip", |vehicle| vehicle.grip = f32::INFINITY),
            ("ground.rest_height", |vehicle| {
                vehicle.ground.rest_height = f32::NAN
            }),
            ("jump.charge_impulse", |vehicle| {
                if let Some(jump) = vehicle.jump.as_mut() {
                    jump.charge_impulse = f32::NAN;
                }
            }),
            ("collider.half_extents", |vehicle| {
                vehicle.collider = ColliderShape::Cuboid {
                    half_extents: [0.3, f32::NAN, 1.0],
                }
            }),
        ];

        for (field, corrupt) in cases {
            let mut vehicle = sample_vehicle_config();
            corrupt(&mut vehicle);
            let message = vehicle
                .validate()
                .expect_err("non-finite value should be rejected")
                .to_string();
            assert!(message.contains(field), "{field}: {message}");
        }
    }

    #[test]
    fn nan_literals_in_toml_are_rejected() {
        let raw = r#"
            [[vehicles]]
            id = "broken"
            mass = 60.0
            engine_force = 600.0
            max_forward_speed = nan
            max_reverse_speed = 5.0
            steering_torque = 90.0
            grip = 8.0
            linear_damping = 0.0
            angular_damping = 0.0
            collider = { shape = "ball", radius = 0.5 }
            ground = { rest_height = 0.5 }
        "#;
        let file: VehiclesFile = toml::from_str(raw).expect("toml should parse");

        let error = RideConfig::from_files(sample_game_file("broken"), file)
            .expect_err("nan speed should be rejected");
        assert!(error.to_string().contains("max_forward_speed"));
    }

    #[test]
    fn zero_rest_height_is_rejected() {
        let mut vehicle = sample_vehicle_config();
        vehicle.ground.rest_height = 0.0;
        let message = vehicle.validate().expect_err("zero rest height").to_string();
        assert!(message.contains("rest_height"));
    }

    #[test]
    fn non_positive_wheel_radius_fails_fast() {
        let mut vehicle = sample_vehicle_config();
        vehicle.rig.wheel_radius = 0.0;
        let message = vehicle.validate().expect_err("zero radius").to_string();
        assert!(message.contains("wheel_radius"));
        assert!(message.contains("test_bmx"));
    }

    #[test]
    fn degenerate_camera_is_rejected() {
        let camera = CameraConfig {
            follow_distance: 0.0,
            look_ahead: 0.0,
            follow_height: 2.0,
            target_height: 2.0,
            ..CameraConfig::default()
        };
        assert!(camera.validate().is_err());
        assert!(CameraConfig::default().validate().is_ok());
    }

    #[test]
    fn articulated_vehicle_parses_from_toml() {
        let raw = r#"
            [[vehicles]]
            id = "buggy"
            mass = 120.0
            engine_force = 0.0
            max_forward_speed = 16.0
            max_reverse_speed = 5.0
            steering_torque = 0.0
            grip = 6.0
            linear_damping = 0.1
            angular_damping = 1.0

            [vehicles.articulation]
            mode = "multi_joint"
            drive_speed = 30.0
            drive_max_force = 400.0
            coast_max_force = 20.0
            steer_stiffness = 800.0
            steer_damping = 60.0
            wheel_radius = 0.45
            axle_half_width = 0.8
            wheel_mass = 10.0
            drive_anchor = [0.0, -0.3, -1.1]
            steer_anchor = [0.0, -0.3, 1.1]

            [vehicles.collider]
            shape = "cuboid"
            half_extents = [0.8, 0.35, 1.3]

            [vehicles.ground]
            rest_height = 0.75
            probe = "raycast"
        "#;

        let file: VehiclesFile = toml::from_str(raw).expect("toml should parse");
        let buggy = &file.vehicles[0];

        assert!(buggy.is_articulated());
        assert_eq!(buggy.ground.probe, GroundProbe::Raycast);
        assert_eq!(buggy.ground.tolerance, default_ground_tolerance());
        assert_eq!(buggy.rig, RigConfig::default());
        assert!(buggy.validate().is_ok());
    }
}
