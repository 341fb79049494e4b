//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, StaleRankError};

/// Sum every point budget must reach in the additive score.
pub const TOTAL_POINT_BUDGET: f64 = 1000.0;

/// Full stalerank configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub scoring: ScoringConfig,
    pub types: TypesConfig,
    pub folders: FoldersConfig,
    pub input: InputConfig,
    pub export: ExportConfig,
    pub runtime: RuntimeConfig,
}

/// Filesystem locations used by stalerank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Serialized `FileRecord` array consumed by `score`.
    pub input_path: PathBuf,
    /// Ranked `{path, score}` array produced by `score`.
    pub output_path: PathBuf,
    pub activity_log: PathBuf,
    pub activity_log_fallback: Option<PathBuf>,
}

/// Point budget per heuristic for the additive score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub type_points: f64,
    pub freshness_points: f64,
    pub filename_points: f64,
    pub size_points: f64,
    pub depth_points: f64,
    pub folder_points: f64,
}

/// Extension → type weight table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TypesConfig {
    /// Keys are lowercase extensions without the leading dot.
    pub weights: BTreeMap<String, f64>,
    pub default_weight: f64,
}

/// Ordered glob lists for the folder-category heuristic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FoldersConfig {
    pub high_priority_globs: Vec<String>,
    pub low_priority_globs: Vec<String>,
    pub case_insensitive: bool,
}

/// Input validation behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct InputConfig {
    /// Fail the whole batch on the first malformed record instead of skipping it.
    pub strict: bool,
}

/// Index database export settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    pub db_path: PathBuf,
    pub connector_tables: Vec<String>,
    pub output_dir: PathBuf,
    /// Also write `<output_dir>/<table>.json` for every exported table.
    pub write_per_table: bool,
}

/// Batch execution knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub parallelism: usize,
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[SRK-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home = home_dir();
        let data = home.join(".local").join("share").join("stalerank");
        Self {
            config_file: home.join(".config").join("stalerank").join("config.toml"),
            input_path: PathBuf::from("output").join("items.json"),
            output_path: PathBuf::from("output").join("items_scores.json"),
            activity_log: data.join("activity.jsonl"),
            activity_log_fallback: Some(env::temp_dir().join("stalerank-activity.jsonl")),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            type_points: 200.0,
            freshness_points: 125.0,
            filename_points: 125.0,
            size_points: 150.0,
            depth_points: 100.0,
            folder_points: 300.0,
        }
    }
}

impl ScoringConfig {
    /// Named budgets in combination order.
    #[must_use]
    pub fn budgets(&self) -> [(&'static str, f64); 6] {
        [
            ("type_points", self.type_points),
            ("freshness_points", self.freshness_points),
            ("filename_points", self.filename_points),
            ("size_points", self.size_points),
            ("depth_points", self.depth_points),
            ("folder_points", self.folder_points),
        ]
    }
}

impl Default for TypesConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                ("pdf".to_string(), 1.0),
                ("txt".to_string(), 0.5),
                ("html".to_string(), 0.4),
            ]),
            default_weight: 0.9,
        }
    }
}

impl Default for FoldersConfig {
    fn default() -> Self {
        let high = [
            "**/OneDrive/**",
            "**/WeChat Files/**",
            "**/FileRecv/**",
            "**/Tencent Files/**",
            "**/*Downloads/**",
            "**/*Download/**",
            "**/文档/**",
            "**/Documents/**",
            "**/Desktop/**",
            "**/Downloads/**",
            "**/Public/**",
        ];
        let low = [
            "**/logs/**",
            "**/tmp/**",
            "**/cache/**",
            "**/temp/**",
            "**/scoop/**",
        ];
        Self {
            high_priority_globs: high.iter().map(ToString::to_string).collect(),
            low_priority_globs: low.iter().map(ToString::to_string).collect(),
            case_insensitive: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        let roaming = env::var_os("APPDATA").map_or_else(
            || home_dir().join("AppData").join("Roaming"),
            PathBuf::from,
        );
        Self {
            db_path: roaming.join("ai.gety").join("user_data").join("tabular.db"),
            connector_tables: Vec::new(),
            output_dir: PathBuf::from("output"),
            write_per_table: true,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { parallelism: 1 }
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
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| StaleRankError::io(&path_buf, source))?;
            Self::from_toml_str(&raw)?
        } else if is_explicit_path {
            return Err(StaleRankError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment or validating.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes and releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // paths
        if let Some(raw) = lookup("STALERANK_INPUT_PATH") {
            self.paths.input_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("STALERANK_OUTPUT_PATH") {
            self.paths.output_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("STALERANK_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        // scoring
        for (name, slot) in [
            ("STALERANK_SCORING_TYPE_POINTS", &mut self.scoring.type_points),
            (
                "STALERANK_SCORING_FRESHNESS_POINTS",
                &mut self.scoring.freshness_points,
            ),
            (
                "STALERANK_SCORING_FILENAME_POINTS",
                &mut self.scoring.filename_points,
            ),
            ("STALERANK_SCORING_SIZE_POINTS", &mut self.scoring.size_points),
            ("STALERANK_SCORING_DEPTH_POINTS", &mut self.scoring.depth_points),
            (
                "STALERANK_SCORING_FOLDER_POINTS",
                &mut self.scoring.folder_points,
            ),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = parse_env_f64(name, &raw)?;
            }
        }

        // types / folders / input
        if let Some(raw) = lookup("STALERANK_TYPES_DEFAULT_WEIGHT") {
            self.types.default_weight = parse_env_f64("STALERANK_TYPES_DEFAULT_WEIGHT", &raw)?;
        }
        if let Some(raw) = lookup("STALERANK_FOLDERS_CASE_INSENSITIVE") {
            self.folders.case_insensitive =
                parse_env_bool("STALERANK_FOLDERS_CASE_INSENSITIVE", &raw)?;
        }
        if let Some(raw) = lookup("STALERANK_INPUT_STRICT") {
            self.input.strict = parse_env_bool("STALERANK_INPUT_STRICT", &raw)?;
        }

        // export
        if let Some(raw) = lookup("STALERANK_EXPORT_DB_PATH") {
            self.export.db_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("STALERANK_EXPORT_TABLES") {
            self.export.connector_tables = raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(raw) = lookup("STALERANK_EXPORT_OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(raw);
        }

        // runtime
        if let Some(raw) = lookup("STALERANK_RUNTIME_PARALLELISM") {
            self.runtime.parallelism = parse_env_usize("STALERANK_RUNTIME_PARALLELISM", &raw)?;
        }

        Ok(())
    }

    /// Lowercase extension keys and drop a leading dot so `.PDF` and `pdf` agree.
    ///
    /// Two keys that land on the same extension are rejected rather than one
    /// weight silently replacing the other.
    fn normalize(&mut self) -> Result<()> {
        let weights = std::mem::take(&mut self.types.weights);
        let mut sources: BTreeMap<String, String> = BTreeMap::new();
        for (ext, weight) in weights {
            let key = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if let Some(previous) = sources.get(&key) {
                return Err(StaleRankError::InvalidConfig {
                    details: format!(
                        "types.weights has duplicate entries for extension `{key}`: \
                         `{previous}` and `{ext}`"
                    ),
                });
            }
            sources.insert(key.clone(), ext);
            self.types.weights.insert(key, weight);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, val) in self.scoring.budgets() {
            if !val.is_finite() || val < 0.0 {
                return Err(StaleRankError::InvalidConfig {
                    details: format!("scoring.{name} must be a finite value >= 0.0, got {val}"),
                });
            }
        }

        let sum: f64 = self.scoring.budgets().iter().map(|(_, val)| val).sum();
        if (sum - TOTAL_POINT_BUDGET).abs() > 1e-6 {
            return Err(StaleRankError::InvalidConfig {
                details: format!("scoring point budgets must sum to 1000; got {sum:.3}"),
            });
        }

        for (ext, weight) in &self.types.weights {
            if ext.is_empty() {
                return Err(StaleRankError::InvalidConfig {
                    details: "types.weights contains an empty extension key".to_string(),
                });
            }
            validate_weight(&format!("types.weights.{ext}"), *weight)?;
        }
        validate_weight("types.default_weight", self.types.default_weight)?;

        for pattern in self
            .folders
            .high_priority_globs
            .iter()
            .chain(&self.folders.low_priority_globs)
        {
            crate::scorer::folders::validate_glob_pattern(pattern)?;
        }

        for table in &self.export.connector_tables {
            validate_table_name(table)?;
        }

        if self.runtime.parallelism == 0 {
            return Err(StaleRankError::InvalidConfig {
                details: "runtime.parallelism must be >= 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Connector table names are spliced into SQL as identifiers; only `[A-Za-z0-9_]` is allowed.
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StaleRankError::InvalidConfig {
            details: format!("connector table name {name:?} must match [A-Za-z0-9_]+"),
        });
    }
    Ok(())
}

fn validate_weight(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(StaleRankError::InvalidConfig {
            details: format!("{name} must be a finite value >= 0.0, got {value}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_f64(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|error| StaleRankError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|error| StaleRankError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| StaleRankError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
