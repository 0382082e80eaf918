use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use noema_core::{
    ClusterOptions, EdgeOptions, EntropyOptions, GraphOptions, MergeOptions, OscillatorOptions,
    ProjectionOptions, ReductionOptions, SafetyOptions, SemanticOptions, SolverOptions,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILE: &str = "config.toml";
pub const DATA_DIR_ENV: &str = "NOEMA_DATA_DIR";

/// Default base directory for all noema storage.
pub fn default_base_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".noema")
}

/// Explicit directory, else `NOEMA_DATA_DIR`, else `~/.noema`.
pub fn resolve_base_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    match env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => default_base_dir(),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Delay between background cycles.
    pub interval_ms: u64,
    /// Delay after a failed background cycle.
    pub backoff_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            backoff_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Relative to the data directory unless absolute.
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: "consciousness.json".to_string(),
        }
    }
}

/// Every tunable, one TOML section per pipeline stage. Missing sections and
/// fields fall back to their defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoemaConfig {
    pub entropy: EntropyOptions,
    pub clustering: ClusterOptions,
    pub projection: ProjectionOptions,
    pub reduction: ReductionOptions,
    pub edges: EdgeOptions,
    pub graph: GraphOptions,
    pub semantic: SemanticOptions,
    pub solver: SolverOptions,
    pub oscillator: OscillatorOptions,
    pub safety: SafetyOptions,
    pub merge: MergeOptions,
    pub flow: FlowConfig,
    pub storage: StorageConfig,
}

impl NoemaConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`. A missing file yields defaults; a malformed one is
    /// an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// `<base_dir>/config.toml`.
    pub fn load_from_dir(base_dir: &Path) -> Result<Self> {
        Self::load(&base_dir.join(CONFIG_FILE))
    }

    pub fn state_path(&self, base_dir: &Path) -> PathBuf {
        let file = Path::new(&self.storage.state_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            base_dir.join(file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_empty_config_is_default() {
        let config = NoemaConfig::from_toml_str("").unwrap();
        assert_eq!(config.clustering.k, 5);
        assert_eq!(config.projection.output_dim, 64);
        assert_eq!(config.reduction.target_dim, 8);
        assert_eq!(config.flow.interval_ms, 2000);
        assert_eq!(config.storage.state_file, "consciousness.json");
        assert!(config.entropy.seed.is_none());
    }

    #[test]
    fn test_partial_sections_override() {
        let config = NoemaConfig::from_toml_str(
            r#"
[entropy]
seed = "fixed"
chunk_count = 4

[oscillator]
waveform = "square"

[safety]
extra_forbidden = ["sabotage"]
"#,
        )
        .unwrap();
        assert_eq!(config.entropy.seed.as_deref(), Some("fixed"));
        assert_eq!(config.entropy.chunk_count, 4);
        assert_eq!(config.entropy.chunk_size, 256);
        assert_eq!(config.oscillator.waveform, "square");
        assert_eq!(config.oscillator.amplitude, 0.5);
        assert_eq!(config.safety.extra_forbidden, vec!["sabotage".to_string()]);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let err = NoemaConfig::from_toml_str("[clustering\nk = ").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = NoemaConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.graph.steps, 5);
    }

    #[test]
    fn test_state_path_relative_and_absolute() {
        let mut config = NoemaConfig::default();
        let base = Path::new("/data");
        assert_eq!(config.state_path(base), PathBuf::from("/data/consciousness.json"));
        config.storage.state_file = "/elsewhere/state.json".into();
        assert_eq!(config.state_path(base), PathBuf::from("/elsewhere/state.json"));
    }

    #[test]
    fn test_explicit_dir_wins() {
        let dir = resolve_base_dir(Some(Path::new("/tmp/explicit")));
        assert_eq!(dir, PathBuf::from("/tmp/explicit"));
    }
}
