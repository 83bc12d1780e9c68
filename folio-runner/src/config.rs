//! Runner settings and workspace layout.
//!
//! Settings live in an optional `folio.toml` at the workspace root:
//!
//! ```toml
//! [simulation]
//! initial_capital = 10000.0
//! transaction_cost_bps = 0.0
//! slippage_bps = 0.0
//!
//! [paths]
//! prices = "data/market/prices.csv"
//! ```
//!
//! Every field is optional. Relative paths resolve against the workspace root.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "folio.toml";
pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
/// Combined costs at or above 100% of traded notional are rejected.
pub const MAX_TOTAL_COST_BPS: f64 = 10_000.0;

/// Errors reading runner settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid mode '{0}'. Allowed: [\"capital\", \"research\"]")]
    InvalidMode(String),
    #[error("invalid simulation setting: {0}")]
    Invalid(String),
}

/// Which system a run belongs to. Each mode has its own engine config and
/// output tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMode {
    #[default]
    Capital,
    Research,
}

impl SystemMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemMode::Capital => "capital",
            SystemMode::Research => "research",
        }
    }
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capital" => Ok(SystemMode::Capital),
            "research" => Ok(SystemMode::Research),
            other => Err(SettingsError::InvalidMode(other.to_string())),
        }
    }
}

/// Cash and cost assumptions for the simulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub initial_capital: f64,
    pub transaction_cost_bps: f64,
    pub slippage_bps: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            transaction_cost_bps: 0.0,
            slippage_bps: 0.0,
        }
    }
}

impl SimulationSettings {
    /// Fraction of traded notional charged to cash.
    pub fn cost_rate(&self) -> f64 {
        (self.transaction_cost_bps + self.slippage_bps) / 10_000.0
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.initial_capital.is_finite() || self.initial_capital < 0.0 {
            return Err(SettingsError::Invalid(format!(
                "initial_capital must be a non-negative number, got {}",
                self.initial_capital
            )));
        }
        if self.transaction_cost_bps < 0.0 || self.slippage_bps < 0.0 {
            return Err(SettingsError::Invalid(
                "transaction_cost_bps and slippage_bps must be >= 0".into(),
            ));
        }
        let total_bps = self.transaction_cost_bps + self.slippage_bps;
        if total_bps.is_nan() || total_bps >= MAX_TOTAL_COST_BPS {
            return Err(SettingsError::Invalid(format!(
                "transaction_cost_bps + slippage_bps must be below {MAX_TOTAL_COST_BPS}"
            )));
        }
        Ok(())
    }
}

/// Optional overrides for input and output locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub prices: Option<PathBuf>,
    pub portfolios: Option<PathBuf>,
    pub inputs: Option<PathBuf>,
    pub systems: Option<PathBuf>,
    pub outputs: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub simulation: SimulationSettings,
    pub paths: PathSettings,
}

impl RunnerSettings {
    pub fn from_toml(content: &str, path: &str) -> Result<Self, SettingsError> {
        let settings: RunnerSettings =
            toml::from_str(content).map_err(|source| SettingsError::Parse {
                path: path.to_string(),
                source,
            })?;
        settings.simulation.validate()?;
        Ok(settings)
    }

    /// Read `folio.toml` under `root`; defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self, SettingsError> {
        let path = root.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_toml(&content, &display)
    }
}

/// A workspace root plus its settings; resolves every file the runner touches.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    settings: RunnerSettings,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, settings: RunnerSettings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    /// Open `root`, reading `folio.toml` if present.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let root = root.into();
        let settings = RunnerSettings::load(&root)?;
        Ok(Self::new(root, settings))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn simulation(&self) -> &SimulationSettings {
        &self.settings.simulation
    }

    fn resolve(&self, configured: &Option<PathBuf>, default: &[&str]) -> PathBuf {
        match configured {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.root.join(p),
            None => default.iter().fold(self.root.clone(), |acc, part| acc.join(part)),
        }
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.resolve(&self.settings.paths.inputs, &["inputs"])
    }

    pub fn portfolios_dir(&self) -> PathBuf {
        match &self.settings.paths.portfolios {
            Some(_) => self.resolve(&self.settings.paths.portfolios, &[]),
            None => self.inputs_dir().join("portfolios"),
        }
    }

    pub fn prices_path(&self) -> PathBuf {
        self.resolve(&self.settings.paths.prices, &["data", "market", "prices.csv"])
    }

    pub fn systems_dir(&self) -> PathBuf {
        self.resolve(&self.settings.paths.systems, &["systems"])
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.resolve(&self.settings.paths.outputs, &["outputs"])
    }

    /// `systems/<mode>/config.yaml`
    pub fn engine_config_path(&self, mode: SystemMode) -> PathBuf {
        self.systems_dir().join(mode.as_str()).join("config.yaml")
    }

    /// `outputs/<mode>/runs`
    pub fn runs_dir(&self, mode: SystemMode) -> PathBuf {
        self.outputs_dir().join(mode.as_str()).join("runs")
    }

    /// `outputs/<mode>/runtime`
    pub fn runtime_dir(&self, mode: SystemMode) -> PathBuf {
        self.outputs_dir().join(mode.as_str()).join("runtime")
    }

    pub fn node_hierarchy_path(&self) -> PathBuf {
        self.inputs_dir().join("asset_class_hierarchy.csv")
    }

    pub fn instrument_hierarchy_path(&self) -> PathBuf {
        self.inputs_dir().join("instrument_hierarchy.csv")
    }

    pub fn definitions_path(&self) -> PathBuf {
        self.inputs_dir().join("portfolio_definitions.csv")
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.inputs_dir().join("instrument_mapping.csv")
    }
}
