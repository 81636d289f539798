use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use validator::Validate;

use crate::error::{PairingError, Result};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Key under `attrs` used for the main round
    pub scenario: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_category_col")]
    pub category_col: String,
    #[serde(default)]
    pub non_attr_cols: Vec<String>,
    pub attrs: BTreeMap<String, Vec<String>>,
    pub pars: ParsSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsSettings {
    pub general: GeneralPars,
    #[serde(default)]
    pub gower: Option<MethodPars>,
    #[serde(default)]
    pub urf: Option<MethodPars>,
}

/// Donor-constraint parameters shared by both methods
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GeneralPars {
    #[serde(alias = "maxSpaDist", alias = "maxspadist")]
    #[validate(range(min = 0.0))]
    pub max_spa_dist: f64,
    #[serde(default, alias = "regulationCol", alias = "regulationcol")]
    pub regulation_col: Option<String>,
    #[serde(default, alias = "areaCol", alias = "areacol")]
    pub area_col: Option<String>,
    #[serde(default, alias = "maxAreaRatio", alias = "maxarearatio")]
    #[validate(range(min = 1.0))]
    pub max_area_ratio: Option<f64>,
    #[serde(default, alias = "excludeDonors", alias = "excludedonors")]
    pub exclude_donors: Vec<String>,
}

/// Search parameters of one distance method (`pars.gower` / `pars.urf`)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MethodPars {
    #[serde(default, alias = "minSpaDist", alias = "minspadist")]
    #[validate(range(min = 0.0))]
    pub min_spa_dist: f64,
    #[serde(default, alias = "zeroSpaDist", alias = "zerospadist")]
    #[validate(range(min = 0.0))]
    pub zero_spa_dist: f64,
    #[serde(alias = "maxAttrDist", alias = "maxattrdist")]
    #[validate(range(min = 0.0))]
    pub max_attr_dist: f64,
    #[serde(alias = "minAttrDist", alias = "minattrdist")]
    #[validate(range(min = 0.0))]
    pub min_attr_dist: f64,
    #[serde(alias = "nDonorMax", alias = "ndonormax")]
    #[validate(range(min = 1))]
    pub n_donor_max: usize,
    #[serde(default = "default_spa_dist_step", alias = "spaDistStep", alias = "spadiststep")]
    #[validate(range(exclusive_min = 0.0))]
    pub spa_dist_step: f64,
    #[serde(default = "default_n_trees", alias = "nTrees", alias = "ntrees")]
    #[validate(range(min = 1))]
    pub n_trees: usize,
    #[serde(default = "default_max_depth", alias = "maxDepth", alias = "maxdepth")]
    #[validate(range(min = 1))]
    pub max_depth: usize,
    /// Worker threads for the ensemble; zero or negative uses every core
    #[serde(default, alias = "njobs", alias = "nJobs")]
    pub n_jobs: i64,
    #[serde(default)]
    pub seed: u64,
}

fn default_method() -> String { "gower".to_string() }
fn default_category_col() -> String { "snowy".to_string() }
fn default_spa_dist_step() -> f64 { 100.0 }
fn default_n_trees() -> usize { 100 }
fn default_max_depth() -> usize { 10 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputSettings {
    /// JSON array of unit records
    #[serde(default)]
    pub units: Option<String>,
    /// JSON square spatial-distance matrix
    #[serde(default)]
    pub spatial: Option<String>,
    /// Coordinate columns used when no spatial matrix is given
    #[serde(default)]
    pub lat_col: Option<String>,
    #[serde(default)]
    pub lon_col: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_pairs_path")]
    pub pairs: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            pairs: default_pairs_path(),
            summary: None,
        }
    }
}

fn default_pairs_path() -> String { "output/pairs.csv".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Configuration file (config/default.toml)
    /// 2. Local config file (config/local.toml)
    /// 3. The explicit `path`, if given
    /// 4. Environment variables (prefixed with DONOR__)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        // e.g., DONOR__PARS__GOWER__MAXATTRDIST -> pars.gower.maxattrdist
        let settings = builder
            .add_source(
                Environment::with_prefix("DONOR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse settings from a TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Attribute distance strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMethod {
    /// Weighted range-normalised distance over principal components
    Gower,
    /// Unsupervised random forest proximity
    Urf,
}

impl DistanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMethod::Gower => "gower",
            DistanceMethod::Urf => "urf",
        }
    }
}

impl FromStr for DistanceMethod {
    type Err = PairingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gower" => Ok(DistanceMethod::Gower),
            "urf" => Ok(DistanceMethod::Urf),
            other => Err(PairingError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for DistanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved, validated parameters for one pairing run
#[derive(Debug, Clone)]
pub struct PairingConfig {
    pub scenario: String,
    pub method: DistanceMethod,
    pub main_attrs: Vec<String>,
    pub base_attrs: Vec<String>,
    pub general: GeneralPars,
    pub search: MethodPars,
}

impl PairingConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let method: DistanceMethod = settings.method.parse()?;

        let main_attrs = settings
            .attrs
            .get(&settings.scenario)
            .cloned()
            .ok_or_else(|| PairingError::MissingAttributeSet(settings.scenario.clone()))?;
        let base_attrs = settings
            .attrs
            .get("base")
            .cloned()
            .ok_or_else(|| PairingError::MissingAttributeSet("base".to_string()))?;

        for attr in main_attrs.iter().chain(base_attrs.iter()) {
            if settings.non_attr_cols.contains(attr) {
                return Err(PairingError::InvalidConfig(format!(
                    "column '{}' is listed both as an attribute and in non_attr_cols",
                    attr
                )));
            }
        }
        if main_attrs.is_empty() || base_attrs.is_empty() {
            return Err(PairingError::InvalidConfig(
                "attribute sets must not be empty".to_string(),
            ));
        }

        let search = match method {
            DistanceMethod::Gower => settings.pars.gower.clone(),
            DistanceMethod::Urf => settings.pars.urf.clone(),
        }
        .ok_or_else(|| {
            PairingError::InvalidConfig(format!("missing parameters section pars.{}", method))
        })?;

        settings.pars.general.validate()?;
        search.validate()?;

        Ok(Self {
            scenario: settings.scenario.clone(),
            method,
            main_attrs,
            base_attrs,
            general: settings.pars.general.clone(),
            search,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        scenario = "hlr"
        method = "gower"
        non_attr_cols = ["id", "tag", "snowy", "area"]

        [attrs]
        hlr = ["elev", "slope", "aridity"]
        base = ["elev", "slope"]

        [pars.general]
        maxSpaDist = 1000
        areaCol = "area"
        maxAreaRatio = 10.0

        [pars.gower]
        minSpaDist = 100
        zeroSpaDist = 5
        maxAttrDist = 0.5
        minAttrDist = 0.05
        nDonorMax = 5

        [pars.urf]
        maxAttrDist = 0.8
        minAttrDist = 0.2
        nDonorMax = 3
        nTrees = 50
        maxDepth = 6
        njobs = 2
    "#;

    #[test]
    fn test_parse_sample() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.scenario, "hlr");
        assert_eq!(settings.category_col, "snowy");
        assert_eq!(settings.pars.general.max_spa_dist, 1000.0);

        let gower = settings.pars.gower.as_ref().unwrap();
        assert_eq!(gower.min_spa_dist, 100.0);
        assert_eq!(gower.n_donor_max, 5);
        assert_eq!(gower.spa_dist_step, 100.0);

        let urf = settings.pars.urf.as_ref().unwrap();
        assert_eq!(urf.n_trees, 50);
        assert_eq!(urf.max_depth, 6);
        assert_eq!(urf.n_jobs, 2);
    }

    #[test]
    fn test_pairing_config_resolves_method_pars() {
        let mut settings = Settings::from_toml_str(SAMPLE).unwrap();
        let config = PairingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.method, DistanceMethod::Gower);
        assert_eq!(config.main_attrs, vec!["elev", "slope", "aridity"]);
        assert_eq!(config.base_attrs, vec!["elev", "slope"]);
        assert_eq!(config.search.max_attr_dist, 0.5);

        settings.method = "urf".to_string();
        let config = PairingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.search.n_trees, 50);
    }

    #[test]
    fn test_unsupported_method_is_fatal() {
        let mut settings = Settings::from_toml_str(SAMPLE).unwrap();
        settings.method = "random_forest".to_string();
        let err = PairingConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, PairingError::UnsupportedMethod(m) if m == "random_forest"));
    }

    #[test]
    fn test_missing_scenario_attrs() {
        let mut settings = Settings::from_toml_str(SAMPLE).unwrap();
        settings.scenario = "nope".to_string();
        assert!(matches!(
            PairingConfig::from_settings(&settings),
            Err(PairingError::MissingAttributeSet(_))
        ));
    }

    #[test]
    fn test_attribute_in_non_attr_cols_rejected() {
        let mut settings = Settings::from_toml_str(SAMPLE).unwrap();
        settings.attrs.insert("base".to_string(), vec!["area".to_string()]);
        assert!(matches!(
            PairingConfig::from_settings(&settings),
            Err(PairingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_donor_max() {
        let mut settings = Settings::from_toml_str(SAMPLE).unwrap();
        if let Some(gower) = settings.pars.gower.as_mut() {
            gower.n_donor_max = 0;
        }
        assert!(matches!(
            PairingConfig::from_settings(&settings),
            Err(PairingError::Validation(_))
        ));
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "pretty");
    }
}
