// facade.rs — Read-side API for transports.
//
// Thin composition of the catalogue store, the solver registry, and the
// pure analysis engines. Queries only: every mutation goes through the
// scheduler's explicit operations.

use std::sync::Arc;

use crate::bootstrap::{BootstrapEngine, BootstrapReport};
use crate::metrics::{compute_metrics, paired_times, time_matrix, MetricsResult};
use crate::registry::{ComparisonMatrix, RegistryError, SolverRegistry};
use crate::report::{
    all_scatters, cactus, critical_difference_diagram, ecdf, heatmap, par2_bars,
    performance_profile, scatter, survival, CactusSeries, CriticalDifferenceDiagram,
    HeatmapData, Par2Bar, ProfileSeries, ScatterData, StepSeries,
};
use crate::stats::{
    multi_solver_analysis, normality_report, pairwise_analysis, MultiSolverAnalysis,
    NormalityReport, PairwiseAnalysis,
};
use crate::store::{
    CatalogStore, DashboardStats, Experiment, ExperimentStatus, InstanceFilter, InstanceRow,
    RunDetails, RunFilter, StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("solver '{0}' has no runs in this experiment")]
    UnknownSolverInExperiment(String),
}

pub struct AccessFacade {
    store: Arc<CatalogStore>,
    registry: Arc<SolverRegistry>,
}

impl AccessFacade {
    pub fn new(store: Arc<CatalogStore>, registry: Arc<SolverRegistry>) -> Self {
        AccessFacade { store, registry }
    }

    // ── catalogue queries ───────────────────────────────────────────────

    pub fn solvers(&self) -> Vec<crate::adapter::SolverInfo> {
        self.registry.list()
    }

    pub fn ready_solvers(&self) -> Vec<crate::adapter::SolverInfo> {
        self.registry.ready()
    }

    pub fn comparison_matrix(&self) -> ComparisonMatrix {
        self.registry.comparison_matrix()
    }

    pub fn instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRow>, FacadeError> {
        Ok(self.store.list_instances(filter)?)
    }

    pub fn experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<Experiment>, FacadeError> {
        Ok(self.store.list_experiments(status)?)
    }

    pub fn experiment(&self, id: u32) -> Result<Experiment, FacadeError> {
        Ok(self.store.experiment(id)?)
    }

    pub fn runs(&self, filter: &RunFilter) -> Result<Vec<RunDetails>, FacadeError> {
        Ok(self.store.runs(filter)?)
    }

    pub fn dashboard(&self) -> Result<DashboardStats, FacadeError> {
        Ok(self.store.dashboard_stats()?)
    }

    /// Run rows plus the timeout for one experiment — the common input of
    /// every analysis below.
    fn experiment_runs(&self, id: u32) -> Result<(Vec<RunDetails>, f64), FacadeError> {
        let experiment = self.store.experiment(id)?;
        let runs = self.store.runs(&RunFilter {
            experiment_id: Some(id),
            ..Default::default()
        })?;
        Ok((runs, experiment.timeout_seconds as f64))
    }

    // ── metric and statistics queries ───────────────────────────────────

    pub fn metrics(&self, experiment_id: u32) -> Result<MetricsResult, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(compute_metrics(&runs, timeout))
    }

    pub fn pairwise(
        &self,
        experiment_id: u32,
        solver1: &str,
        solver2: &str,
    ) -> Result<PairwiseAnalysis, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        for name in [solver1, solver2] {
            if !runs.iter().any(|r| r.solver_name == name) {
                return Err(FacadeError::UnknownSolverInExperiment(name.to_string()));
            }
        }
        let (t1, t2, _) = paired_times(&runs, solver1, solver2, timeout);
        Ok(pairwise_analysis(&t1, &t2, solver1, solver2))
    }

    pub fn multi_solver(
        &self,
        experiment_id: u32,
        alpha: f64,
    ) -> Result<MultiSolverAnalysis, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        let (matrix, names, _) = time_matrix(&runs, timeout);
        Ok(multi_solver_analysis(&matrix, &names, alpha))
    }

    pub fn normality(
        &self,
        experiment_id: u32,
        solver: &str,
    ) -> Result<NormalityReport, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        let penalty = 2.0 * timeout;
        let times: Vec<f64> = runs
            .iter()
            .filter(|r| r.solver_name == solver)
            .map(|r| {
                if r.record.outcome.solved() {
                    r.record.wall_seconds
                } else {
                    penalty
                }
            })
            .collect();
        if times.is_empty() {
            return Err(FacadeError::UnknownSolverInExperiment(solver.to_string()));
        }
        Ok(normality_report(&times))
    }

    pub fn bootstrap(
        &self,
        experiment_id: u32,
        replicates: usize,
        seed: u64,
        confidence: f64,
    ) -> Result<BootstrapReport, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(BootstrapEngine::new(replicates, seed).solver_report(&runs, timeout, confidence))
    }

    // ── plot series ─────────────────────────────────────────────────────

    pub fn cactus(&self, experiment_id: u32) -> Result<Vec<CactusSeries>, FacadeError> {
        let (runs, _) = self.experiment_runs(experiment_id)?;
        Ok(cactus(&runs))
    }

    pub fn ecdf(&self, experiment_id: u32) -> Result<Vec<StepSeries>, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(ecdf(&runs, timeout))
    }

    pub fn survival(&self, experiment_id: u32) -> Result<Vec<StepSeries>, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(survival(&runs, timeout))
    }

    pub fn performance_profile(
        &self,
        experiment_id: u32,
        tau_max: f64,
    ) -> Result<Vec<ProfileSeries>, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(performance_profile(&runs, timeout, tau_max))
    }

    pub fn scatter(
        &self,
        experiment_id: u32,
        solver1: &str,
        solver2: &str,
    ) -> Result<ScatterData, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(scatter(&runs, solver1, solver2, timeout))
    }

    pub fn all_scatters(&self, experiment_id: u32) -> Result<Vec<ScatterData>, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(all_scatters(&runs, timeout))
    }

    pub fn heatmap(&self, experiment_id: u32) -> Result<HeatmapData, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(heatmap(&runs, timeout))
    }

    pub fn par2_bars(&self, experiment_id: u32) -> Result<Vec<Par2Bar>, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(par2_bars(&runs, timeout))
    }

    pub fn critical_difference(
        &self,
        experiment_id: u32,
        alpha: f64,
    ) -> Result<Option<CriticalDifferenceDiagram>, FacadeError> {
        let (runs, timeout) = self.experiment_runs(experiment_id)?;
        Ok(critical_difference_diagram(&runs, timeout, alpha))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SolverStats;
    use crate::executor::{Outcome, RunRecord};
    use crate::instance::{Difficulty, InstanceMeta};

    fn record(outcome: Outcome, wall: f64) -> RunRecord {
        RunRecord {
            outcome,
            exit_code: 0,
            wall_seconds: wall,
            cpu_seconds: wall,
            user_seconds: wall,
            system_seconds: 0.0,
            max_mem_kib: 0,
            avg_mem_kib: 0,
            ctx_switches_voluntary: None,
            ctx_switches_involuntary: None,
            page_faults: None,
            stats: SolverStats::default(),
            stdout_prefix: String::new(),
            error_message: String::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn facade_with_runs() -> (AccessFacade, u32) {
        let store = Arc::new(CatalogStore::in_memory());
        store.upsert_solver(1, "kissat", "Kissat", "3.1.1").unwrap();
        store.upsert_solver(2, "minisat", "MiniSat", "2.2.0").unwrap();
        let mut ids = Vec::new();
        for name in ["i1.cnf", "i2.cnf", "i3.cnf"] {
            ids.push(
                store
                    .add_instance(InstanceMeta {
                        filename: name.to_string(),
                        path: std::path::PathBuf::from(name),
                        family: "crafted".to_string(),
                        difficulty: Difficulty::Easy,
                        size_bytes: 1,
                        header: None,
                        checksum: String::new(),
                    })
                    .unwrap(),
            );
        }
        let exp = store
            .create_experiment("facade", None, 5, 1024, 1, vec![1, 2], ids.clone())
            .unwrap();
        let walls = [(0.1, 0.1), (2.0, 5.0), (0.5, 1.0)];
        for (idx, &iid) in ids.iter().enumerate() {
            let (a, b) = walls[idx];
            store
                .commit_run(exp, 1, iid, record(Outcome::Sat, a), false)
                .unwrap();
            let outcome_b = if idx == 1 { Outcome::Timeout } else { Outcome::Sat };
            store
                .commit_run(exp, 2, iid, record(outcome_b, b), false)
                .unwrap();
        }

        let registry = Arc::new(
            SolverRegistry::bootstrap(std::env::temp_dir().join("satbench-facade-tests")).unwrap(),
        );
        (AccessFacade::new(store, registry), exp)
    }

    #[test]
    fn metrics_through_facade() {
        let (facade, exp) = facade_with_runs();
        match facade.metrics(exp).unwrap() {
            MetricsResult::Report(report) => {
                assert_eq!(report.num_solvers, 2);
                assert_eq!(report.ranking[0].solver, "Kissat");
            }
            MetricsResult::Empty => panic!("expected data"),
        }
    }

    #[test]
    fn pairwise_through_facade() {
        let (facade, exp) = facade_with_runs();
        let analysis = facade.pairwise(exp, "Kissat", "MiniSat").unwrap();
        assert_eq!(analysis.n_instances, 3);
        assert!(facade.pairwise(exp, "Kissat", "Ghost").is_err());
    }

    #[test]
    fn plots_through_facade() {
        let (facade, exp) = facade_with_runs();
        assert_eq!(facade.cactus(exp).unwrap().len(), 2);
        assert_eq!(facade.heatmap(exp).unwrap().instances.len(), 3);
        assert_eq!(facade.par2_bars(exp).unwrap()[0].solver, "Kissat");
        assert_eq!(facade.all_scatters(exp).unwrap().len(), 1);
        assert!(facade.critical_difference(exp, 0.05).unwrap().is_some());
    }

    #[test]
    fn dashboard_through_facade() {
        let (facade, _) = facade_with_runs();
        let stats = facade.dashboard().unwrap();
        assert_eq!(stats.total_runs, 6);
        assert_eq!(stats.sat_results, 5);
    }

    #[test]
    fn missing_experiment_propagates_not_found() {
        let (facade, _) = facade_with_runs();
        assert!(matches!(
            facade.metrics(999),
            Err(FacadeError::Store(StoreError::NotFound { .. }))
        ));
    }
}
