//! Configuration models and loaders for the impulsive maneuver planner.
//!
//! Files ending in `.toml` are read as TOML, everything else as YAML. A directory
//! loads every `*.toml` record inside it in sorted order. Angles are degrees here and
//! are converted to radians only by [`OrbitConfig::elements_rad`].

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Tolerance and iteration cap for the universal-variable propagator.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PropagatorConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-13,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LambertConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LambertConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-11,
            max_iterations: 35,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RootFinderConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Optional wall-clock budget per root solve.
    pub time_budget_ms: Option<u64>,
}

impl Default for RootFinderConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_iterations: 100,
            time_budget_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowSearchConfig {
    pub scan_subdivisions: usize,
    pub immediate_window_deg: f64,
}

impl Default for WindowSearchConfig {
    fn default() -> Self {
        Self {
            scan_subdivisions: 100,
            immediate_window_deg: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CourseCorrectionConfig {
    pub samples: usize,
    pub latest_burn_fraction: f64,
}

impl Default for CourseCorrectionConfig {
    fn default() -> Self {
        Self {
            samples: 20,
            latest_burn_fraction: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    pub cost_tolerance: f64,
    pub step_tolerance: f64,
    pub infeasible_cost: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            cost_tolerance: 1e-10,
            step_tolerance: 1e-10,
            infeasible_cost: 1e6,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub min_temperature: f64,
    pub max_iterations: usize,
    /// Seed for reproducible runs; the CLI draws one from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 5.0,
            cooling_rate: 0.95,
            min_temperature: 1e-3,
            max_iterations: 500,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PatchesConfig {
    pub max_patches: usize,
    pub samples_per_orbit: usize,
    pub max_samples: usize,
}

impl Default for PatchesConfig {
    fn default() -> Self {
        Self {
            max_patches: 8,
            samples_per_orbit: 72,
            max_samples: 4000,
        }
    }
}

/// Numerical settings of every planner stage. All sections are optional.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PlannerConfig {
    pub propagator: PropagatorConfig,
    pub lambert: LambertConfig,
    pub root_finder: RootFinderConfig,
    pub window_search: WindowSearchConfig,
    pub course_correction: CourseCorrectionConfig,
    pub optimizer: OptimizerConfig,
    pub annealing: AnnealingConfig,
    pub patches: PatchesConfig,
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("propagator.tolerance", self.propagator.tolerance)?;
        positive("lambert.tolerance", self.lambert.tolerance)?;
        positive("root_finder.tolerance", self.root_finder.tolerance)?;
        positive("optimizer.infeasible_cost", self.optimizer.infeasible_cost)?;
        positive("annealing.initial_temperature", self.annealing.initial_temperature)?;
        positive("annealing.min_temperature", self.annealing.min_temperature)?;
        if !(self.annealing.cooling_rate > 0.0 && self.annealing.cooling_rate < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "annealing.cooling_rate must lie in (0, 1), got {}",
                self.annealing.cooling_rate
            )));
        }
        if !(self.course_correction.latest_burn_fraction > 0.0 && self.course_correction.latest_burn_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "course_correction.latest_burn_fraction must lie in (0, 1], got {}",
                self.course_correction.latest_burn_fraction
            )));
        }
        if self.window_search.scan_subdivisions < 2 {
            return Err(ConfigError::Invalid("window_search.scan_subdivisions must be at least 2".into()));
        }
        if self.patches.max_patches == 0 {
            return Err(ConfigError::Invalid("patches.max_patches must be at least 1".into()));
        }
        Ok(())
    }
}

/// Classical elements in kilometres and degrees.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OrbitConfig {
    pub semi_major_axis_km: f64,
    #[serde(default)]
    pub eccentricity: f64,
    #[serde(default)]
    pub inclination_deg: f64,
    #[serde(default)]
    pub longitude_of_ascending_node_deg: f64,
    #[serde(default)]
    pub argument_of_periapsis_deg: f64,
    #[serde(default)]
    pub true_anomaly_deg: f64,
    /// Epoch of the elements in seconds; defaults to the scenario epoch.
    #[serde(default)]
    pub epoch: Option<f64>,
}

/// Elements with angles in radians, in the field order
/// `(a, e, i, Ω, ω, ν)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementsRad {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub longitude_of_ascending_node: f64,
    pub argument_of_periapsis: f64,
    pub true_anomaly: f64,
}

impl OrbitConfig {
    pub fn elements_rad(&self) -> ElementsRad {
        ElementsRad {
            semi_major_axis: self.semi_major_axis_km,
            eccentricity: self.eccentricity,
            inclination: self.inclination_deg.to_radians(),
            longitude_of_ascending_node: self.longitude_of_ascending_node_deg.to_radians(),
            argument_of_periapsis: self.argument_of_periapsis_deg.to_radians(),
            true_anomaly: self.true_anomaly_deg.to_radians(),
        }
    }

    fn validate(&self, context: &str) -> Result<(), ConfigError> {
        if !(self.eccentricity >= 0.0) {
            return Err(ConfigError::Invalid(format!("{context}: eccentricity must be non-negative")));
        }
        if (self.eccentricity - 1.0).abs() < 1e-12 {
            return Err(ConfigError::Invalid(format!(
                "{context}: parabolic orbits cannot be given as elements"
            )));
        }
        let elliptic = self.eccentricity < 1.0;
        if elliptic != (self.semi_major_axis_km > 0.0) || self.semi_major_axis_km == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{context}: semi-major axis {} is inconsistent with eccentricity {}",
                self.semi_major_axis_km, self.eccentricity
            )));
        }
        Ok(())
    }
}

/// Celestial body catalog entry.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BodyConfig {
    pub name: String,
    pub mu_km3_s2: f64,
    pub radius_km: f64,
    /// Explicit sphere of influence; derived from the orbit when absent.
    #[serde(default)]
    pub soi_radius_km: Option<f64>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub orbit: Option<OrbitConfig>,
}

/// An orbit about a named body.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TrajectoryConfig {
    pub body: String,
    pub orbit: OrbitConfig,
}

/// A complete planning scenario: bodies, the maneuvering vessel and its target.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub bodies: Vec<BodyConfig>,
    pub vessel: TrajectoryConfig,
    pub target: TrajectoryConfig,
    #[serde(default)]
    pub epoch: f64,
    #[serde(default)]
    pub planner: PlannerConfig,
}

impl ScenarioConfig {
    /// Check references between entries and physical plausibility of every value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bodies.is_empty() {
            return Err(ConfigError::Invalid("scenario lists no bodies".into()));
        }
        let mut roots = 0;
        for body in &self.bodies {
            positive(&format!("{}.mu_km3_s2", body.name), body.mu_km3_s2)?;
            positive(&format!("{}.radius_km", body.name), body.radius_km)?;
            match &body.parent {
                None => roots += 1,
                Some(parent) => {
                    if self.body(parent).is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "body '{}' names unknown parent '{parent}'",
                            body.name
                        )));
                    }
                    let Some(orbit) = &body.orbit else {
                        return Err(ConfigError::Invalid(format!("body '{}' has a parent but no orbit", body.name)));
                    };
                    orbit.validate(&body.name)?;
                }
            }
        }
        if roots != 1 {
            return Err(ConfigError::Invalid(format!("expected exactly one root body, found {roots}")));
        }
        for (label, trajectory) in [("vessel", &self.vessel), ("target", &self.target)] {
            if self.body(&trajectory.body).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{label} orbits unknown body '{}'",
                    trajectory.body
                )));
            }
            trajectory.orbit.validate(label)?;
        }
        self.planner.validate()
    }

    pub fn body(&self, name: &str) -> Option<&BodyConfig> {
        self.bodies.iter().find(|body| body.name.eq_ignore_ascii_case(name))
    }
}

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load and validate a scenario from a YAML or TOML file.
pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<ScenarioConfig, ConfigError> {
    let scenario: ScenarioConfig = load_record(path)?;
    scenario.validate()?;
    Ok(scenario)
}

/// Load and validate planner settings from a YAML or TOML file.
pub fn load_planner<P: AsRef<Path>>(path: P) -> Result<PlannerConfig, ConfigError> {
    let planner: PlannerConfig = load_record(path)?;
    planner.validate()?;
    Ok(planner)
}

/// Load a body catalog from a YAML list, a TOML file or a directory of TOML files.
pub fn load_bodies<P: AsRef<Path>>(path: P) -> Result<Vec<BodyConfig>, ConfigError> {
    let bodies: Vec<BodyConfig> = load_records(path)?;
    for body in &bodies {
        positive(&format!("{}.mu_km3_s2", body.name), body.mu_km3_s2)?;
    }
    Ok(bodies)
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be positive, got {value}")))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "toml").unwrap_or(false)
}

fn load_record<T, P>(path: P) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if is_toml(path) {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

fn load_records<T, P>(path: P) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.is_dir() {
        read_dir_records(path)
    } else if is_toml(path) {
        Ok(vec![load_record(path)?])
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

fn read_dir_records<T>(dir: &Path) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_toml(path))
        .collect();
    entries.sort();
    entries.into_iter().map(load_record).collect()
}
