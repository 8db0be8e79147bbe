// store.rs — Durable catalogue of solvers, instances, experiments, and runs.
//
// In-memory tables behind a single writer lock, snapshotted to JSON after
// every mutation (written to a temp file and renamed, so a crash never
// leaves a torn catalogue). The scheduler is the only writer for a running
// experiment's rows; everything else reads snapshots.
//
// Uniqueness: instance filename, experiment name, and
// (experiment, solver, instance) for runs — run upserts overwrite.
// Deleting an experiment or instance cascades to its runs.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::executor::{Outcome, RunRecord};
use crate::instance::{Difficulty, InstanceMeta};

// ── Rows ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverRow {
    pub id: u32,
    pub key: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRow {
    pub id: u32,
    pub meta: InstanceMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Pending,
    Running,
    Completed,
    Stopped,
    Error,
}

impl ExperimentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExperimentStatus::Completed | ExperimentStatus::Stopped | ExperimentStatus::Error
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
    pub timeout_seconds: u64,
    pub memory_limit_mib: u64,
    pub parallelism: u32,
    pub status: ExperimentStatus,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub solver_ids: Vec<u32>,
    pub instance_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRow {
    pub id: u64,
    pub experiment_id: u32,
    pub solver_id: u32,
    pub instance_id: u32,
    pub record: RunRecord,
    /// Snapshot of the penalised score at write time. Recomputed on read by
    /// the metric engine; kept for external consumers of raw rows.
    pub par2: f64,
}

/// A run joined with the names analysis code keys on.
#[derive(Debug, Clone, Serialize)]
pub struct RunDetails {
    pub run_id: u64,
    pub experiment_id: u32,
    pub solver_id: u32,
    pub instance_id: u32,
    pub solver_name: String,
    pub instance_name: String,
    pub family: String,
    pub record: RunRecord,
}

// ── Filters ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub family: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunFilter {
    pub experiment_id: Option<u32>,
    pub solver_id: Option<u32>,
    pub instance_id: Option<u32>,
}

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("experiment name '{0}' already exists")]
    DuplicateExperimentName(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },
    #[error("catalogue I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalogue snapshot corrupt: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

// ── Tables ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    solvers: Vec<SolverRow>,
    instances: Vec<InstanceRow>,
    experiments: Vec<Experiment>,
    runs: Vec<RunRow>,
    next_instance_id: u32,
    next_experiment_id: u32,
    next_run_id: u64,
}

impl Tables {
    fn fresh() -> Self {
        Tables {
            next_instance_id: 1,
            next_experiment_id: 1,
            next_run_id: 1,
            ..Tables::default()
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────────

pub struct CatalogStore {
    tables: RwLock<Tables>,
    /// Snapshot target; `None` keeps the catalogue memory-only (tests).
    path: Option<PathBuf>,
}

impl CatalogStore {
    /// Open a catalogue, loading the snapshot when one exists.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let tables = if path.is_file() {
            let text = std::fs::read_to_string(&path)?;
            let tables: Tables = serde_json::from_str(&text)?;
            info!(
                solvers = tables.solvers.len(),
                instances = tables.instances.len(),
                experiments = tables.experiments.len(),
                runs = tables.runs.len(),
                "catalogue loaded"
            );
            tables
        } else {
            Tables::fresh()
        };
        Ok(CatalogStore {
            tables: RwLock::new(tables),
            path: Some(path),
        })
    }

    /// Memory-only catalogue.
    pub fn in_memory() -> Self {
        CatalogStore {
            tables: RwLock::new(Tables::fresh()),
            path: None,
        }
    }

    fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        let path = match &self.path {
            Some(p) => p,
            None => return Ok(()),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(tables)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let guard = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&guard))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let value = f(&mut guard)?;
        self.persist(&guard)?;
        Ok(value)
    }

    // ── solvers ─────────────────────────────────────────────────────────

    /// Insert or refresh a solver row (keyed by id).
    pub fn upsert_solver(
        &self,
        id: u32,
        key: &str,
        name: &str,
        version: &str,
    ) -> Result<(), StoreError> {
        self.write(|t| {
            match t.solvers.iter_mut().find(|s| s.id == id) {
                Some(row) => {
                    row.key = key.to_string();
                    row.name = name.to_string();
                    row.version = version.to_string();
                }
                None => t.solvers.push(SolverRow {
                    id,
                    key: key.to_string(),
                    name: name.to_string(),
                    version: version.to_string(),
                }),
            }
            Ok(())
        })
    }

    pub fn solver(&self, id: u32) -> Result<SolverRow, StoreError> {
        self.read(|t| t.solvers.iter().find(|s| s.id == id).cloned())?
            .ok_or(StoreError::NotFound { kind: "solver", id })
    }

    pub fn solver_by_key(&self, key: &str) -> Result<Option<SolverRow>, StoreError> {
        self.read(|t| t.solvers.iter().find(|s| s.key == key).cloned())
    }

    pub fn list_solvers(&self) -> Result<Vec<SolverRow>, StoreError> {
        self.read(|t| {
            let mut rows = t.solvers.clone();
            rows.sort_by(|a, b| a.key.cmp(&b.key));
            rows
        })
    }

    // ── instances ───────────────────────────────────────────────────────

    /// Add an instance; the filename is the uniqueness key and a conflict
    /// returns the existing id.
    pub fn add_instance(&self, meta: InstanceMeta) -> Result<u32, StoreError> {
        self.write(|t| {
            if let Some(existing) = t.instances.iter().find(|i| i.meta.filename == meta.filename)
            {
                debug!(filename = %meta.filename, id = existing.id, "instance already catalogued");
                return Ok(existing.id);
            }
            let id = t.next_instance_id;
            t.next_instance_id += 1;
            t.instances.push(InstanceRow { id, meta });
            Ok(id)
        })
    }

    pub fn instance(&self, id: u32) -> Result<InstanceRow, StoreError> {
        self.read(|t| t.instances.iter().find(|i| i.id == id).cloned())?
            .ok_or(StoreError::NotFound {
                kind: "instance",
                id,
            })
    }

    pub fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRow>, StoreError> {
        self.read(|t| {
            let mut rows: Vec<InstanceRow> = t
                .instances
                .iter()
                .filter(|row| {
                    filter
                        .family
                        .as_ref()
                        .map_or(true, |f| &row.meta.family == f)
                        && filter.difficulty.map_or(true, |d| row.meta.difficulty == d)
                        && filter
                            .search
                            .as_ref()
                            .map_or(true, |s| row.meta.filename.contains(s.as_str()))
                })
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.meta.filename.cmp(&b.meta.filename));
            rows
        })
    }

    pub fn delete_instance(&self, id: u32) -> Result<(), StoreError> {
        self.write(|t| {
            let before = t.instances.len();
            t.instances.retain(|i| i.id != id);
            if t.instances.len() == before {
                return Err(StoreError::NotFound {
                    kind: "instance",
                    id,
                });
            }
            t.runs.retain(|r| r.instance_id != id);
            Ok(())
        })
    }

    // ── experiments ─────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn create_experiment(
        &self,
        name: &str,
        description: Option<String>,
        timeout_seconds: u64,
        memory_limit_mib: u64,
        parallelism: u32,
        solver_ids: Vec<u32>,
        instance_ids: Vec<u32>,
    ) -> Result<u32, StoreError> {
        self.write(|t| {
            if t.experiments.iter().any(|e| e.name == name) {
                return Err(StoreError::DuplicateExperimentName(name.to_string()));
            }
            for &iid in &instance_ids {
                if !t.instances.iter().any(|i| i.id == iid) {
                    return Err(StoreError::NotFound {
                        kind: "instance",
                        id: iid,
                    });
                }
            }
            for &sid in &solver_ids {
                if !t.solvers.iter().any(|s| s.id == sid) {
                    return Err(StoreError::NotFound {
                        kind: "solver",
                        id: sid,
                    });
                }
            }
            let id = t.next_experiment_id;
            t.next_experiment_id += 1;
            let total = (solver_ids.len() * instance_ids.len()) as u64;
            t.experiments.push(Experiment {
                id,
                name: name.to_string(),
                description,
                timeout_seconds,
                memory_limit_mib,
                parallelism,
                status: ExperimentStatus::Pending,
                total,
                completed: 0,
                failed: 0,
                created_at: chrono::Utc::now().to_rfc3339(),
                started_at: None,
                completed_at: None,
                solver_ids,
                instance_ids,
            });
            info!(experiment = id, name, total, "experiment created");
            Ok(id)
        })
    }

    pub fn experiment(&self, id: u32) -> Result<Experiment, StoreError> {
        self.read(|t| t.experiments.iter().find(|e| e.id == id).cloned())?
            .ok_or(StoreError::NotFound {
                kind: "experiment",
                id,
            })
    }

    pub fn list_experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<Experiment>, StoreError> {
        self.read(|t| {
            let mut rows: Vec<Experiment> = t
                .experiments
                .iter()
                .filter(|e| status.map_or(true, |s| e.status == s))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rows
        })
    }

    /// Transition to `running`, stamping `started_at` on the first start.
    pub fn mark_running(&self, id: u32) -> Result<(), StoreError> {
        self.write(|t| {
            let exp = t
                .experiments
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(StoreError::NotFound {
                    kind: "experiment",
                    id,
                })?;
            exp.status = ExperimentStatus::Running;
            if exp.started_at.is_none() {
                exp.started_at = Some(chrono::Utc::now().to_rfc3339());
            }
            exp.completed_at = None;
            Ok(())
        })
    }

    /// Transition to a terminal state, stamping `completed_at`.
    pub fn mark_terminal(&self, id: u32, status: ExperimentStatus) -> Result<(), StoreError> {
        debug_assert!(status.is_terminal());
        self.write(|t| {
            let exp = t
                .experiments
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(StoreError::NotFound {
                    kind: "experiment",
                    id,
                })?;
            exp.status = status;
            exp.completed_at = Some(chrono::Utc::now().to_rfc3339());
            Ok(())
        })
    }

    pub fn delete_experiment(&self, id: u32) -> Result<(), StoreError> {
        self.write(|t| {
            let before = t.experiments.len();
            t.experiments.retain(|e| e.id != id);
            if t.experiments.len() == before {
                return Err(StoreError::NotFound {
                    kind: "experiment",
                    id,
                });
            }
            t.runs.retain(|r| r.experiment_id != id);
            info!(experiment = id, "experiment deleted (runs cascaded)");
            Ok(())
        })
    }

    // ── runs ────────────────────────────────────────────────────────────

    /// Upsert a run row and bump the experiment's progress counter in one
    /// write, so readers never observe a counter ahead of the rows.
    pub fn commit_run(
        &self,
        experiment_id: u32,
        solver_id: u32,
        instance_id: u32,
        record: RunRecord,
        count_as_failed: bool,
    ) -> Result<u64, StoreError> {
        self.write(|t| {
            let timeout = t
                .experiments
                .iter()
                .find(|e| e.id == experiment_id)
                .ok_or(StoreError::NotFound {
                    kind: "experiment",
                    id: experiment_id,
                })?
                .timeout_seconds;
            let par2 = record.par2(timeout as f64);
            let run_id = upsert_run_row(t, experiment_id, solver_id, instance_id, record, par2);

            let exp = t
                .experiments
                .iter_mut()
                .find(|e| e.id == experiment_id)
                .ok_or(StoreError::NotFound {
                    kind: "experiment",
                    id: experiment_id,
                })?;
            if count_as_failed {
                exp.failed += 1;
            } else {
                exp.completed += 1;
            }
            debug_assert!(exp.completed + exp.failed <= exp.total);
            Ok(run_id)
        })
    }

    /// Upsert without touching counters (explicit rerun of a single pair).
    pub fn upsert_run(
        &self,
        experiment_id: u32,
        solver_id: u32,
        instance_id: u32,
        record: RunRecord,
    ) -> Result<u64, StoreError> {
        self.write(|t| {
            let timeout = t
                .experiments
                .iter()
                .find(|e| e.id == experiment_id)
                .ok_or(StoreError::NotFound {
                    kind: "experiment",
                    id: experiment_id,
                })?
                .timeout_seconds;
            let par2 = record.par2(timeout as f64);
            Ok(upsert_run_row(
                t,
                experiment_id,
                solver_id,
                instance_id,
                record,
                par2,
            ))
        })
    }

    /// `(solver, instance)` pairs already recorded for an experiment.
    pub fn existing_pairs(&self, experiment_id: u32) -> Result<HashSet<(u32, u32)>, StoreError> {
        self.read(|t| {
            t.runs
                .iter()
                .filter(|r| r.experiment_id == experiment_id)
                .map(|r| (r.solver_id, r.instance_id))
                .collect()
        })
    }

    /// Joined run rows, newest first.
    pub fn runs(&self, filter: &RunFilter) -> Result<Vec<RunDetails>, StoreError> {
        self.read(|t| {
            let mut rows: Vec<RunDetails> = t
                .runs
                .iter()
                .filter(|r| {
                    filter.experiment_id.map_or(true, |id| r.experiment_id == id)
                        && filter.solver_id.map_or(true, |id| r.solver_id == id)
                        && filter.instance_id.map_or(true, |id| r.instance_id == id)
                })
                .map(|r| {
                    let solver_name = t
                        .solvers
                        .iter()
                        .find(|s| s.id == r.solver_id)
                        .map(|s| s.name.clone())
                        .unwrap_or_else(|| format!("solver-{}", r.solver_id));
                    let (instance_name, family) = t
                        .instances
                        .iter()
                        .find(|i| i.id == r.instance_id)
                        .map(|i| (i.meta.filename.clone(), i.meta.family.clone()))
                        .unwrap_or_else(|| (format!("instance-{}", r.instance_id), String::new()));
                    RunDetails {
                        run_id: r.id,
                        experiment_id: r.experiment_id,
                        solver_id: r.solver_id,
                        instance_id: r.instance_id,
                        solver_name,
                        instance_name,
                        family,
                        record: r.record.clone(),
                    }
                })
                .collect();
            rows.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));
            rows
        })
    }

    // ── dashboard ───────────────────────────────────────────────────────

    pub fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        self.read(|t| {
            let outcome_count = |outcome: Outcome| {
                t.runs
                    .iter()
                    .filter(|r| r.record.outcome == outcome)
                    .count() as u64
            };
            let mut recent: Vec<&Experiment> = t.experiments.iter().collect();
            recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            DashboardStats {
                total_solvers: t.solvers.len() as u64,
                total_instances: t.instances.len() as u64,
                total_experiments: t.experiments.len() as u64,
                completed_experiments: t
                    .experiments
                    .iter()
                    .filter(|e| e.status == ExperimentStatus::Completed)
                    .count() as u64,
                running_experiments: t
                    .experiments
                    .iter()
                    .filter(|e| e.status == ExperimentStatus::Running)
                    .count() as u64,
                total_runs: t.runs.len() as u64,
                sat_results: outcome_count(Outcome::Sat),
                unsat_results: outcome_count(Outcome::Unsat),
                timeout_results: outcome_count(Outcome::Timeout),
                error_results: outcome_count(Outcome::Error),
                recent_experiments: recent.into_iter().take(5).cloned().collect(),
            }
        })
    }
}

fn upsert_run_row(
    t: &mut Tables,
    experiment_id: u32,
    solver_id: u32,
    instance_id: u32,
    record: RunRecord,
    par2: f64,
) -> u64 {
    match t.runs.iter_mut().find(|r| {
        r.experiment_id == experiment_id && r.solver_id == solver_id && r.instance_id == instance_id
    }) {
        Some(row) => {
            row.record = record;
            row.par2 = par2;
            row.id
        }
        None => {
            let id = t.next_run_id;
            t.next_run_id += 1;
            t.runs.push(RunRow {
                id,
                experiment_id,
                solver_id,
                instance_id,
                record,
                par2,
            });
            id
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_solvers: u64,
    pub total_instances: u64,
    pub total_experiments: u64,
    pub completed_experiments: u64,
    pub running_experiments: u64,
    pub total_runs: u64,
    pub sat_results: u64,
    pub unsat_results: u64,
    pub timeout_results: u64,
    pub error_results: u64,
    pub recent_experiments: Vec<Experiment>,
}

// ── Tests ───────────────────────────────────────────────────────────────
