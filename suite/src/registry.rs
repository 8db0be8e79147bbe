// registry.rs — Solver adapter catalogue.
//
// Built once at bootstrap from the built-in adapter list. Assigns stable
// numeric ids honouring a reserved legacy table so historical run rows keep
// resolving; newly added adapters get sequential ids after the reserved
// block, in alphabetical key order. Read-only after construction apart from
// install/uninstall, which serialise over the adapters themselves.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::adapter::{InstallOutcome, SolverAdapter, SolverInfo, SolverStatus};

/// Historical id reservations. Never reassign these.
const LEGACY_IDS: &[(&str, u32)] = &[
    ("kissat", 1),
    ("minisat", 2),
    ("cadical", 3),
    ("cryptominisat", 4),
];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown solver key '{0}'")]
    UnknownKey(String),
    #[error("unknown solver id {0}")]
    UnknownId(u32),
    #[error("duplicate solver key '{0}' during discovery")]
    DuplicateKey(String),
    #[error("uninstall of '{key}' failed: {source}")]
    Uninstall {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct SolverRegistry {
    adapters: Vec<Box<dyn SolverAdapter>>,
    key_to_index: HashMap<&'static str, usize>,
    key_to_id: HashMap<&'static str, u32>,
    id_to_index: HashMap<u32, usize>,
    solvers_root: PathBuf,
}

impl fmt::Debug for SolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverRegistry")
            .field("keys", &self.keys())
            .field("solvers_root", &self.solvers_root)
            .finish()
    }
}

impl SolverRegistry {
    /// Discover the built-in adapters and assign stable ids.
    pub fn bootstrap(solvers_root: PathBuf) -> Result<Self, RegistryError> {
        Self::with_adapters(crate::plugins::builtin_adapters(), solvers_root)
    }

    pub fn with_adapters(
        adapters: Vec<Box<dyn SolverAdapter>>,
        solvers_root: PathBuf,
    ) -> Result<Self, RegistryError> {
        let mut key_to_index = HashMap::new();
        for (idx, adapter) in adapters.iter().enumerate() {
            if key_to_index.insert(adapter.key(), idx).is_some() {
                return Err(RegistryError::DuplicateKey(adapter.key().to_string()));
            }
        }

        // Legacy ids first, then alphabetical sequential assignment.
        let legacy: HashMap<&str, u32> = LEGACY_IDS.iter().copied().collect();
        let mut key_to_id: HashMap<&'static str, u32> = HashMap::new();
        let mut used: Vec<u32> = Vec::new();
        for adapter in &adapters {
            if let Some(&id) = legacy.get(adapter.key()) {
                key_to_id.insert(adapter.key(), id);
                used.push(id);
            }
        }
        let mut next = used.iter().copied().max().unwrap_or(0) + 1;
        let mut fresh_keys: Vec<&'static str> = adapters
            .iter()
            .map(|a| a.key())
            .filter(|k| !key_to_id.contains_key(k))
            .collect();
        fresh_keys.sort_unstable();
        for key in fresh_keys {
            while used.contains(&next) {
                next += 1;
            }
            key_to_id.insert(key, next);
            used.push(next);
            next += 1;
        }

        let id_to_index = key_to_id
            .iter()
            .map(|(key, &id)| (id, key_to_index[key]))
            .collect();

        info!(
            count = adapters.len(),
            root = %solvers_root.display(),
            "solver registry loaded"
        );

        Ok(SolverRegistry {
            adapters,
            key_to_index,
            key_to_id,
            id_to_index,
            solvers_root,
        })
    }

    pub fn solvers_root(&self) -> &Path {
        &self.solvers_root
    }

    // ── lookup ──────────────────────────────────────────────────────────

    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = self.key_to_index.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn id_of(&self, key: &str) -> Option<u32> {
        self.key_to_id.get(key).copied()
    }

    pub fn by_key(&self, key: &str) -> Result<&dyn SolverAdapter, RegistryError> {
        self.key_to_index
            .get(key)
            .map(|&idx| self.adapters[idx].as_ref())
            .ok_or_else(|| RegistryError::UnknownKey(key.to_string()))
    }

    pub fn by_id(&self, id: u32) -> Result<&dyn SolverAdapter, RegistryError> {
        self.id_to_index
            .get(&id)
            .map(|&idx| self.adapters[idx].as_ref())
            .ok_or(RegistryError::UnknownId(id))
    }

    // ── listings ────────────────────────────────────────────────────────

    /// SolverInfo for every adapter, sorted by key.
    pub fn list(&self) -> Vec<SolverInfo> {
        let mut infos: Vec<SolverInfo> = self
            .key_to_id
            .iter()
            .map(|(key, &id)| {
                let adapter = &self.adapters[self.key_to_index[key]];
                adapter.info(id, &self.solvers_root)
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Only adapters whose binary is present and runnable.
    pub fn ready(&self) -> Vec<SolverInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.status == SolverStatus::Ready)
            .collect()
    }

    pub fn info_by_id(&self, id: u32) -> Result<SolverInfo, RegistryError> {
        let adapter = self.by_id(id)?;
        Ok(adapter.info(id, &self.solvers_root))
    }

    // ── install / uninstall ─────────────────────────────────────────────

    pub fn install(&self, key: &str) -> Result<InstallOutcome, RegistryError> {
        let adapter = self.by_key(key)?;
        info!(solver = key, "installing");
        let outcome = adapter.install(&self.solvers_root);
        adapter.version_cache().clear();
        Ok(outcome)
    }

    pub fn uninstall(&self, key: &str) -> Result<(), RegistryError> {
        let adapter = self.by_key(key)?;
        info!(solver = key, "uninstalling");
        adapter
            .uninstall(&self.solvers_root)
            .map_err(|source| RegistryError::Uninstall {
                key: key.to_string(),
                source,
            })
    }

    // ── comparison matrix ───────────────────────────────────────────────

    /// Derived mechanically from adapter metadata; the registry keeps no
    /// feature tables of its own.
    pub fn comparison_matrix(&self) -> ComparisonMatrix {
        let infos = self.list();
        let features_comparison = infos
            .iter()
            .map(|info| (info.name.clone(), feature_flags(info)))
            .collect();
        ComparisonMatrix {
            solvers: infos,
            features_comparison,
            legend: legend(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ComparisonMatrix {
    pub solvers: Vec<SolverInfo>,
    pub features_comparison: BTreeMap<String, BTreeMap<&'static str, bool>>,
    pub legend: BTreeMap<&'static str, &'static str>,
}

/// Boolean feature map derived from the free-form feature list plus the
/// capability flags.
fn feature_flags(info: &SolverInfo) -> BTreeMap<&'static str, bool> {
    let lower: Vec<String> = info.features.iter().map(|f| f.to_lowercase()).collect();
    let any = |needles: &[&str]| {
        lower
            .iter()
            .any(|f| needles.iter().any(|needle| f.contains(needle)))
    };
    let mut flags = BTreeMap::new();
    flags.insert("cdcl", any(&["cdcl"]));
    flags.insert("vsids", any(&["vsids", "activity"]));
    flags.insert(
        "learned_clause_minimization",
        any(&["minim", "learned", "learnt"]),
    );
    // Every CDCL solver restarts.
    flags.insert("restarts", any(&["restart"]) || any(&["cdcl"]));
    flags.insert("preprocessing", info.capabilities.preprocessing);
    flags.insert("inprocessing", info.capabilities.inprocessing);
    flags.insert("bounded_variable_elimination", any(&["elimination", "bve"]));
    flags.insert("blocked_clause_elimination", any(&["blocked", "bce"]));
    flags.insert("vivification", any(&["vivif"]));
    flags.insert("probing", any(&["probe", "probing"]));
    flags.insert("xor_reasoning", any(&["xor", "gaussian"]));
    flags
}

fn legend() -> BTreeMap<&'static str, &'static str> {
    let mut legend = BTreeMap::new();
    legend.insert("CDCL", "Conflict-Driven Clause Learning");
    legend.insert("CDCL + XOR", "CDCL with native XOR / Gaussian reasoning");
    legend.insert("preprocessing", "Simplification before solving");
    legend.insert("inprocessing", "Simplification during solving");
    legend.insert("parallel", "Multi-threaded solving");
    legend.insert("incremental", "Supports adding clauses incrementally");
    legend
}

// ── Tests ───────────────────────────────────────────────────────────────
