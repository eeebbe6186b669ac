//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{FusionError, Result};

/// Tolerance when checking that weight groups sum to 1.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Full fusion-engine configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub fusion: FusionWeights,
    pub strategy: StrategyWeights,
    pub journal: JournalConfig,
    pub enrichment: EnrichmentConfig,
    pub paths: PathsConfig,
}

/// Risk/profitability balance for the Weighted strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionWeights {
    pub risk_weight: f64,
    pub profitability_weight: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            risk_weight: 0.6,
            profitability_weight: 0.4,
        }
    }
}

/// Meta-fusion voting weights across the three strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyWeights {
    pub weighted: f64,
    pub dst: f64,
    pub bayesian: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            weighted: 0.30,
            dst: 0.40,
            bayesian: 0.30,
        }
    }
}

impl StrategyWeights {
    /// Sum of the three weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.weighted + self.dst + self.bayesian
    }

    /// Conflict-recovery weights: DST zeroed, remainder renormalized to 1.
    ///
    /// Fails if the Weighted and Bayesian weights are both zero, since no
    /// voting mass would remain.
    pub fn without_dst(&self) -> Result<Self> {
        let remaining = self.weighted + self.bayesian;
        if remaining <= WEIGHT_SUM_EPSILON {
            return Err(FusionError::InvalidConfig {
                details: format!(
                    "cannot drop DST strategy: weighted ({}) + bayesian ({}) leave no voting mass",
                    self.weighted, self.bayesian
                ),
            });
        }
        Ok(Self {
            weighted: self.weighted / remaining,
            dst: 0.0,
            bayesian: self.bayesian / remaining,
        })
    }
}

/// Named risk/profitability presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Crisis,
    Conservative,
    Balanced,
    Aggressive,
}

impl Preset {
    /// All presets in fixed display order.
    pub const ALL: [Self; 4] = [
        Self::Crisis,
        Self::Conservative,
        Self::Balanced,
        Self::Aggressive,
    ];

    /// The risk/profitability pair this preset stands for.
    #[must_use]
    pub const fn weights(self) -> FusionWeights {
        let (risk_weight, profitability_weight) = match self {
            Self::Crisis => (0.9, 0.1),
            Self::Conservative => (0.8, 0.2),
            Self::Balanced => (0.5, 0.5),
            Self::Aggressive => (0.3, 0.7),
        };
        FusionWeights {
            risk_weight,
            profitability_weight,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crisis => write!(f, "crisis"),
            Self::Conservative => write!(f, "conservative"),
            Self::Balanced => write!(f, "balanced"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for Preset {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "crisis" => Ok(Self::Crisis),
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(FusionError::InvalidConfig {
                details: format!(
                    "unknown preset `{other}` (expected crisis|conservative|balanced|aggressive)"
                ),
            }),
        }
    }
}

/// Synthesis journal (JSONL) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 5,
        }
    }
}

/// Optional narrative enrichment step settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    /// Hard deadline for the external narrative step; on expiry the
    /// template explanation stands.
    pub timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: 2_000,
        }
    }
}

/// Filesystem paths used by ffe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub journal_file: PathBuf,
    pub journal_fallback: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[FFE-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("ffe").join("config.toml");
        let data = home_dir.join(".local").join("share").join("ffe");
        Self {
            config_file: cfg,
            journal_file: data.join("synthesis.jsonl"),
            journal_fallback: Some(PathBuf::from("/dev/shm/ffe-synthesis.jsonl")),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FusionError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(FusionError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Replace the risk/profitability pair with a named preset.
    pub fn apply_preset(&mut self, preset: Preset) {
        self.fusion = preset.weights();
    }

    /// Deterministic hash of the effective config for journaling.
    ///
    /// Uses FNV-1a for cross-process-stable hashing (no `DefaultHasher`
    /// whose seed may vary across Rust releases).
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // fusion
        set_env_f64("FFE_RISK_WEIGHT", &mut self.fusion.risk_weight)?;
        set_env_f64(
            "FFE_PROFITABILITY_WEIGHT",
            &mut self.fusion.profitability_weight,
        )?;

        // strategy
        set_env_f64("FFE_STRATEGY_WEIGHT_WEIGHTED", &mut self.strategy.weighted)?;
        set_env_f64("FFE_STRATEGY_WEIGHT_DST", &mut self.strategy.dst)?;
        set_env_f64("FFE_STRATEGY_WEIGHT_BAYESIAN", &mut self.strategy.bayesian)?;

        // journal
        set_env_bool("FFE_JOURNAL_ENABLED", &mut self.journal.enabled)?;
        set_env_u64("FFE_JOURNAL_MAX_SIZE_BYTES", &mut self.journal.max_size_bytes)?;
        if let Some(path) = env::var_os("FFE_JOURNAL_PATH") {
            self.paths.journal_file = PathBuf::from(path);
        }

        // enrichment
        set_env_bool("FFE_ENRICHMENT_ENABLED", &mut self.enrichment.enabled)?;
        set_env_u64("FFE_ENRICHMENT_TIMEOUT_MS", &mut self.enrichment.timeout_ms)?;

        Ok(())
    }

    /// Validate weight groups and journal knobs.
    ///
    /// Runs at configuration-construction time, before any `synthesize()`
    /// call can observe a malformed weight set.
    pub fn validate(&self) -> Result<()> {
        validate_weight("fusion.risk_weight", self.fusion.risk_weight)?;
        validate_weight(
            "fusion.profitability_weight",
            self.fusion.profitability_weight,
        )?;
        let fusion_total = self.fusion.risk_weight + self.fusion.profitability_weight;
        if (fusion_total - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(FusionError::InvalidConfig {
                details: format!(
                    "risk_weight + profitability_weight must sum to 1.0, got {fusion_total}"
                ),
            });
        }

        validate_weight("strategy.weighted", self.strategy.weighted)?;
        validate_weight("strategy.dst", self.strategy.dst)?;
        validate_weight("strategy.bayesian", self.strategy.bayesian)?;
        let strategy_total = self.strategy.total();
        if (strategy_total - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(FusionError::InvalidConfig {
                details: format!("strategy weights must sum to 1.0, got {strategy_total}"),
            });
        }

        if self.journal.max_size_bytes == 0 {
            return Err(FusionError::InvalidConfig {
                details: "journal.max_size_bytes must be positive".to_string(),
            });
        }
        if self.enrichment.enabled && self.enrichment.timeout_ms == 0 {
            return Err(FusionError::InvalidConfig {
                details: "enrichment.timeout_ms must be positive when enrichment is enabled"
                    .to_string(),
            });
        }
        Ok(())
    }
}

fn validate_weight(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(FusionError::InvalidConfig {
            details: format!("{name} must be a finite non-negative number, got {value}"),
        });
    }
    Ok(())
}

fn set_env_f64(key: &str, target: &mut f64) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| FusionError::ConfigParse {
            context: "env",
            details: format!("{key}={raw} is not a valid float"),
        })?;
    }
    Ok(())
}

fn set_env_u64(key: &str, target: &mut u64) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| FusionError::ConfigParse {
            context: "env",
            details: format!("{key}={raw} is not a valid integer"),
        })?;
    }
    Ok(())
}

fn set_env_bool(key: &str, target: &mut bool) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(FusionError::ConfigParse {
                    context: "env",
                    details: format!("{key}={raw} is not a valid boolean"),
                });
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        cfg.validate().expect("defaults must validate");
        assert!((cfg.fusion.risk_weight - 0.6).abs() < f64::EPSILON);
        assert!((cfg.strategy.total() - 1.0).abs() < WEIGHT_SUM_EPSILON);
    }

    #[test]
    fn weights_not_summing_to_one_are_rejected() {
        let mut cfg = Config::default();
        cfg.fusion.risk_weight = 0.7;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code(), "FFE-1001");
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut cfg = Config::default();
        cfg.strategy.dst = -0.1;
        cfg.strategy.weighted = 0.55;
        cfg.strategy.bayesian = 0.55;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code(), "FFE-1001");
    }

    #[test]
    fn presets_sum_to_one() {
        for preset in Preset::ALL {
            let w = preset.weights();
            assert!(
                (w.risk_weight + w.profitability_weight - 1.0).abs() < WEIGHT_SUM_EPSILON,
                "preset {preset} weights must sum to 1"
            );
        }
    }

    #[test]
    fn preset_parses_case_insensitively() {
        assert_eq!("CRISIS".parse::<Preset>().unwrap(), Preset::Crisis);
        assert_eq!("balanced".parse::<Preset>().unwrap(), Preset::Balanced);
        assert!("panic".parse::<Preset>().is_err());
    }

    #[test]
    fn apply_preset_overwrites_fusion_weights() {
        let mut cfg = Config::default();
        cfg.apply_preset(Preset::Crisis);
        assert!((cfg.fusion.risk_weight - 0.9).abs() < f64::EPSILON);
        cfg.validate().expect("preset config must validate");
    }

    #[test]
    fn without_dst_renormalizes() {
        let weights = StrategyWeights::default();
        let fallback = weights.without_dst().unwrap();
        assert!(fallback.dst.abs() < f64::EPSILON);
        assert!((fallback.total() - 1.0).abs() < WEIGHT_SUM_EPSILON);
        assert!((fallback.weighted - 0.5).abs() < 1e-12);
        assert!((fallback.bayesian - 0.5).abs() < 1e-12);
    }

    #[test]
    fn without_dst_fails_when_no_mass_remains() {
        let weights = StrategyWeights {
            weighted: 0.0,
            dst: 1.0,
            bayesian: 0.0,
        };
        assert!(weights.without_dst().is_err());
    }

    #[test]
    fn load_explicit_missing_path_errors() {
        let err = Config::load(Some(Path::new("/nonexistent_ffe_test/config.toml"))).unwrap_err();
        assert_eq!(err.code(), "FFE-1002");
    }

    #[test]
    fn load_parses_toml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[fusion]\nrisk_weight = 0.8\nprofitability_weight = 0.2\n\n\
[strategy]\nweighted = 0.2\ndst = 0.5\nbayesian = 0.3\n"
        )
        .unwrap();
        drop(file);

        let cfg = Config::load(Some(&path)).unwrap();
        assert!((cfg.fusion.risk_weight - 0.8).abs() < f64::EPSILON);
        assert!((cfg.strategy.dst - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stable_hash_is_deterministic() {
        let a = Config::default().stable_hash().unwrap();
        let b = Config::default().stable_hash().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
