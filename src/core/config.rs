use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "olapcube.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CubeConfig {
    pub query: QueryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Remove rows zeroed by filters before decoding the result
    pub drop_zero_rows: bool,
    /// Records sampled when inferring CSV column types
    pub infer_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub mapping_file: String,
    pub witness_file: String,
    /// Prefix of the result file name, prepended to the input file name
    pub result_prefix: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            drop_zero_rows: true,
            infer_rows: 100,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
            mapping_file: "cat_map.json".to_string(),
            witness_file: "input.json".to_string(),
            result_prefix: "mod_".to_string(),
        }
    }
}

impl CubeConfig {
    /// Loads `olapcube.toml` from the working directory, or defaults.
    pub fn load() -> Self {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!(
                    "Failed to parse {}: {}. Using defaults.",
                    path.display(),
                    e
                ),
            }
        }
        Self::default()
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.mapping_file)
    }

    pub fn witness_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.witness_file)
    }

    /// Default location of the decoded result for a given input file.
    pub fn result_path(&self, input: &Path) -> PathBuf {
        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("result.csv");
        self.output
            .dir
            .join(format!("{}{}", self.output.result_prefix, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: CubeConfig = toml::from_str("[query]\ndrop_zero_rows = false\n").unwrap();
        assert!(!config.query.drop_zero_rows);
        assert_eq!(config.query.infer_rows, 100);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_missing_or_broken_file_falls_back() {
        assert_eq!(CubeConfig::load_from("/no/such/olapcube.toml"), CubeConfig::default());

        let path = std::env::temp_dir().join(format!("olapcube_cfg_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "query = [").unwrap();
        assert_eq!(CubeConfig::load_from(&path), CubeConfig::default());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_result_path_uses_prefix() {
        let config = CubeConfig::default();
        let path = config.result_path(Path::new("data/uploaded/GHGe1.csv"));
        assert_eq!(path, PathBuf::from("./output/mod_GHGe1.csv"));
    }
}
