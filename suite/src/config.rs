// config.rs — Suite configuration: data directories, limits, family rules.
//
// Loaded from a JSON file when present, otherwise built from defaults. The
// benchmark family table drives filename-based classification in the
// instance importer.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default per-run wall-clock budget, seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5000;
/// Default per-run memory ceiling, MiB.
pub const DEFAULT_MEMORY_LIMIT_MIB: u64 = 8192;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for everything the suite writes.
    pub data_dir: PathBuf,
    pub default_timeout_seconds: u64,
    pub default_memory_limit_mib: u64,
    /// Filename patterns used to classify instances into families.
    pub families: Vec<FamilyRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyRule {
    pub name: String,
    /// Case-insensitive regex matched against the lowercased filename.
    pub pattern: String,
    pub description: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            default_memory_limit_mib: DEFAULT_MEMORY_LIMIT_MIB,
            families: default_families(),
        }
    }
}

impl Config {
    /// Load from a JSON file, or fall back to defaults when the file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: p.to_path_buf(),
                    source,
                })
            }
            None => Ok(Config::default()),
        }
    }

    pub fn solvers_dir(&self) -> PathBuf {
        self.data_dir.join("solvers")
    }

    pub fn benchmarks_dir(&self) -> PathBuf {
        self.data_dir.join("benchmarks")
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    pub fn generated_cnf_dir(&self) -> PathBuf {
        self.data_dir.join("generated_cnf")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid config: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The stock family table. Patterns follow common benchmark naming in the
/// SAT competition archives.
fn default_families() -> Vec<FamilyRule> {
    let table: &[(&str, &str, &str)] = &[
        (
            "circuit",
            "(circuit|lec|mult|add|barrel)",
            "Hardware verification and circuit problems",
        ),
        (
            "crypto",
            "(crypto|aes|des|md5|sha|hash)",
            "Cryptographic problems",
        ),
        (
            "planning",
            "(planning|block|gripper|hanoi)",
            "AI planning problems",
        ),
        (
            "graph",
            "(graph|color|clique|ramsey)",
            "Graph theory problems",
        ),
        (
            "scheduling",
            "(schedule|job|task|timetable)",
            "Scheduling and resource allocation",
        ),
        (
            "random",
            "(random|rnd|uniform)",
            "Randomly generated instances",
        ),
        (
            "crafted",
            "(pigeon|php|parity|queen)",
            "Crafted hard instances",
        ),
        (
            "industrial",
            "(bmcbonus|velev|ibm|intel)",
            "Industrial verification problems",
        ),
        (
            "verification",
            "(verify|bmc|safety|reach)",
            "Software and hardware verification",
        ),
    ];
    table
        .iter()
        .map(|(name, pattern, description)| FamilyRule {
            name: (*name).to_string(),
            pattern: (*pattern).to_string(),
            description: (*description).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.default_timeout_seconds, 5000);
        assert_eq!(cfg.default_memory_limit_mib, 8192);
        assert!(cfg.families.iter().any(|f| f.name == "crafted"));
    }

    #[test]
    fn load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = Config::default();
        std::fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.families.len(), cfg.families.len());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/config.json"))).is_err());
    }
}
