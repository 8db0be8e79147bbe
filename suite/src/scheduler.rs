// scheduler.rs — Experiment lifecycle and execution driver.
//
// Owns one worker thread per running experiment. The worker enumerates the
// pending (solver, instance) product in deterministic solver-major order,
// executes each pair through the run executor, persists the record together
// with the progress counter bump, and streams events to the experiment's
// progress bus. Cancellation is cooperative: `stop` signals the token, the
// in-flight run is killed by the executor's watchdog, its record is
// discarded (the pair stays pending for resume), and the status transitions
// to `stopped` only after the worker has joined.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{DEFAULT_MEMORY_LIMIT_MIB, DEFAULT_TIMEOUT_SECONDS};
use crate::executor::{execute, CancelToken, Limits};
use crate::progress::{ProgressBus, ProgressEvent, ProgressKind, Subscription};
use crate::registry::{RegistryError, SolverRegistry};
use crate::store::{CatalogStore, ExperimentStatus, StoreError};

/// Retry budget for a failing run-record write before the experiment is
/// declared broken.
const WRITE_RETRIES: u32 = 3;

// ── Specification ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_memory")]
    pub memory_limit_mib: u64,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    pub solver_ids: Vec<u32>,
    pub instance_ids: Vec<u32>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_memory() -> u64 {
    DEFAULT_MEMORY_LIMIT_MIB
}

fn default_parallelism() -> u32 {
    1
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid experiment specification: {0}")]
    InvalidSpec(String),
    #[error("experiment {0} is already running")]
    AlreadyRunning(u32),
    #[error("experiment {0} is not running")]
    NotRunning(u32),
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Point-in-time view for `progress` queries.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub status: ExperimentStatus,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_solver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

// ── Scheduler ───────────────────────────────────────────────────────────

struct ActiveTask {
    cancel: CancelToken,
    handle: JoinHandle<()>,
    current: Arc<Mutex<Option<(String, String)>>>,
}

pub struct ExperimentScheduler {
    store: Arc<CatalogStore>,
    registry: Arc<SolverRegistry>,
    active: Mutex<HashMap<u32, ActiveTask>>,
    buses: Mutex<HashMap<u32, Arc<ProgressBus>>>,
}

impl ExperimentScheduler {
    pub fn new(store: Arc<CatalogStore>, registry: Arc<SolverRegistry>) -> Self {
        ExperimentScheduler {
            store,
            registry,
            active: Mutex::new(HashMap::new()),
            buses: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SolverRegistry> {
        &self.registry
    }

    // ── create ──────────────────────────────────────────────────────────

    /// Validate the spec, sync the referenced solvers into the catalogue,
    /// and persist the experiment with `total = |solvers| · |instances|`.
    pub fn create(&self, spec: &ExperimentSpec) -> Result<u32, SchedulerError> {
        if spec.name.trim().is_empty() {
            return Err(SchedulerError::InvalidSpec("name must not be empty".into()));
        }
        if spec.timeout_seconds == 0 {
            return Err(SchedulerError::InvalidSpec(
                "timeoutSeconds must be positive".into(),
            ));
        }
        if spec.memory_limit_mib == 0 {
            return Err(SchedulerError::InvalidSpec(
                "memoryLimitMiB must be positive".into(),
            ));
        }
        if spec.parallelism == 0 {
            return Err(SchedulerError::InvalidSpec(
                "parallelism must be at least 1".into(),
            ));
        }
        if spec.solver_ids.is_empty() {
            return Err(SchedulerError::InvalidSpec("no solvers selected".into()));
        }
        if spec.instance_ids.is_empty() {
            return Err(SchedulerError::InvalidSpec("no instances selected".into()));
        }

        // Resolve every solver id against the registry and mirror it into
        // the catalogue so run rows stay resolvable.
        for &sid in &spec.solver_ids {
            let adapter = self.registry.by_id(sid)?;
            let version = adapter.detect_version(self.registry.solvers_root());
            self.store
                .upsert_solver(sid, adapter.key(), adapter.name(), &version)?;
        }
        for &iid in &spec.instance_ids {
            self.store.instance(iid)?;
        }

        let id = self.store.create_experiment(
            &spec.name,
            spec.description.clone(),
            spec.timeout_seconds,
            spec.memory_limit_mib,
            spec.parallelism,
            spec.solver_ids.clone(),
            spec.instance_ids.clone(),
        )?;
        Ok(id)
    }

    // ── start / stop / delete ───────────────────────────────────────────

    /// Transition to `running` and spawn the owned worker thread.
    pub fn start(&self, experiment_id: u32) -> Result<(), SchedulerError> {
        let experiment = self.store.experiment(experiment_id)?;

        let mut active = self.active.lock().expect("scheduler lock");
        // Reap workers that already finished naturally.
        active.retain(|_, task| !task.handle.is_finished());
        if active.contains_key(&experiment_id) {
            return Err(SchedulerError::AlreadyRunning(experiment_id));
        }

        self.store.mark_running(experiment_id)?;

        let cancel = CancelToken::new();
        let current = Arc::new(Mutex::new(None));
        let bus = self.bus(experiment_id);
        let worker = Worker {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            bus,
            cancel: cancel.clone(),
            current: Arc::clone(&current),
            experiment_id,
        };
        info!(experiment = experiment_id, name = %experiment.name, "starting");
        let handle = std::thread::Builder::new()
            .name(format!("experiment-{experiment_id}"))
            .spawn(move || worker.drive())
            .map_err(|e| SchedulerError::WorkerSpawn(e.to_string()))?;

        active.insert(
            experiment_id,
            ActiveTask {
                cancel,
                handle,
                current,
            },
        );
        Ok(())
    }

    /// Request cooperative cancellation and wait for the worker to join.
    /// The in-flight run is killed by the executor within its grace period.
    pub fn stop(&self, experiment_id: u32) -> Result<(), SchedulerError> {
        let task = {
            let mut active = self.active.lock().expect("scheduler lock");
            active
                .remove(&experiment_id)
                .ok_or(SchedulerError::NotRunning(experiment_id))?
        };
        info!(experiment = experiment_id, "stop requested");
        task.cancel.cancel();
        if task.handle.join().is_err() {
            error!(experiment = experiment_id, "worker panicked during stop");
            self.store
                .mark_terminal(experiment_id, ExperimentStatus::Error)?;
        }
        Ok(())
    }

    /// Stop if running, then cascade-delete the experiment and its runs.
    pub fn delete(&self, experiment_id: u32) -> Result<(), SchedulerError> {
        match self.stop(experiment_id) {
            Ok(()) | Err(SchedulerError::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        self.store.delete_experiment(experiment_id)?;
        self.buses
            .lock()
            .expect("scheduler lock")
            .remove(&experiment_id);
        Ok(())
    }

    // ── observation ─────────────────────────────────────────────────────

    pub fn progress(&self, experiment_id: u32) -> Result<ProgressSnapshot, SchedulerError> {
        let experiment = self.store.experiment(experiment_id)?;
        let (current_solver, current_instance) = {
            let active = self.active.lock().expect("scheduler lock");
            match active.get(&experiment_id) {
                Some(task) => match task.current.lock() {
                    Ok(cur) => match cur.clone() {
                        Some((s, i)) => (Some(s), Some(i)),
                        None => (None, None),
                    },
                    Err(_) => (None, None),
                },
                None => (None, None),
            }
        };
        Ok(ProgressSnapshot {
            status: experiment.status,
            total: experiment.total,
            completed: experiment.completed,
            failed: experiment.failed,
            current_solver,
            current_instance,
            started_at: experiment.started_at,
        })
    }

    /// Bounded event stream for one experiment. Slow consumers lose old
    /// events but always see the terminal one.
    pub fn subscribe(&self, experiment_id: u32) -> Subscription {
        self.bus(experiment_id).subscribe()
    }

    fn bus(&self, experiment_id: u32) -> Arc<ProgressBus> {
        let mut buses = self.buses.lock().expect("scheduler lock");
        Arc::clone(
            buses
                .entry(experiment_id)
                .or_insert_with(|| Arc::new(ProgressBus::new())),
        )
    }

    /// Block until the experiment reaches a terminal status. Test and CLI
    /// convenience; polls the store.
    pub fn wait_terminal(
        &self,
        experiment_id: u32,
        timeout: Duration,
    ) -> Result<ExperimentStatus, SchedulerError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let status = self.store.experiment(experiment_id)?.status;
            if status.is_terminal() {
                return Ok(status);
            }
            if std::time::Instant::now() >= deadline {
                return Ok(status);
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }
}

// ── Worker ──────────────────────────────────────────────────────────────

struct Worker {
    store: Arc<CatalogStore>,
    registry: Arc<SolverRegistry>,
    bus: Arc<ProgressBus>,
    cancel: CancelToken,
    current: Arc<Mutex<Option<(String, String)>>>,
    experiment_id: u32,
}

impl Worker {
    fn drive(self) {
        let id = self.experiment_id;
        let experiment = match self.store.experiment(id) {
            Ok(e) => e,
            Err(e) => {
                error!(experiment = id, "worker could not load experiment: {e}");
                return;
            }
        };
        let limits = Limits {
            timeout_seconds: experiment.timeout_seconds,
            memory_limit_mib: experiment.memory_limit_mib,
        };

        // Pending set: solver-major product minus already-recorded pairs.
        let done = match self.store.existing_pairs(id) {
            Ok(pairs) => pairs,
            Err(e) => {
                error!(experiment = id, "worker could not enumerate runs: {e}");
                let _ = self.store.mark_terminal(id, ExperimentStatus::Error);
                return;
            }
        };
        let pending: Vec<(u32, u32)> = experiment
            .solver_ids
            .iter()
            .flat_map(|&sid| experiment.instance_ids.iter().map(move |&iid| (sid, iid)))
            .filter(|pair| !done.contains(pair))
            .collect();

        info!(
            experiment = id,
            pending = pending.len(),
            resumed = done.len(),
            "experiment run loop starting"
        );
        self.publish(
            ProgressKind::Started,
            experiment.completed + experiment.failed,
            experiment.total,
            None,
        );

        let mut progressed = experiment.completed + experiment.failed;
        let mut stopped = false;
        let mut consecutive_write_failures = 0u32;

        for (solver_id, instance_id) in pending {
            if self.cancel.is_cancelled() {
                stopped = true;
                break;
            }

            let adapter = match self.registry.by_id(solver_id) {
                Ok(a) => a,
                Err(e) => {
                    warn!(experiment = id, solver = solver_id, "skipping run: {e}");
                    if self.record_failure(solver_id, instance_id, &e.to_string(), &mut progressed)
                    {
                        return;
                    }
                    continue;
                }
            };
            let instance = match self.store.instance(instance_id) {
                Ok(row) => row,
                Err(e) => {
                    warn!(experiment = id, instance = instance_id, "skipping run: {e}");
                    if self.record_failure(solver_id, instance_id, &e.to_string(), &mut progressed)
                    {
                        return;
                    }
                    continue;
                }
            };

            if let Ok(mut cur) = self.current.lock() {
                *cur = Some((
                    adapter.name().to_string(),
                    instance.meta.filename.clone(),
                ));
            }
            self.publish(
                ProgressKind::Progress,
                progressed,
                experiment.total,
                Some((adapter.name(), &instance.meta.filename)),
            );

            let record = execute(
                adapter,
                self.registry.solvers_root(),
                &instance.meta.path,
                &limits,
                &self.cancel,
            );

            if self.cancel.is_cancelled() {
                // Cancelled mid-run: discard the record so the pair stays
                // pending and a later start re-executes it.
                stopped = true;
                break;
            }

            let mut committed = false;
            for attempt in 1..=WRITE_RETRIES {
                match self
                    .store
                    .commit_run(id, solver_id, instance_id, record.clone(), false)
                {
                    Ok(_) => {
                        committed = true;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            experiment = id,
                            solver = solver_id,
                            instance = instance_id,
                            attempt,
                            "run write failed: {e}"
                        );
                    }
                }
            }
            if !committed {
                // One lost record is logged and skipped; persistent store
                // trouble flips the experiment to the error state.
                consecutive_write_failures += 1;
                warn!(
                    experiment = id,
                    solver = solver_id,
                    instance = instance_id,
                    "record lost after {WRITE_RETRIES} write attempts"
                );
                if consecutive_write_failures >= 2 {
                    error!(experiment = id, "run writes keep failing; marking experiment broken");
                    let _ = self.store.mark_terminal(id, ExperimentStatus::Error);
                    self.publish(ProgressKind::Error, progressed, experiment.total, None);
                    return;
                }
                continue;
            }
            consecutive_write_failures = 0;

            progressed += 1;
            info!(
                experiment = id,
                solver = adapter.key(),
                instance = %instance.meta.filename,
                outcome = %record.outcome,
                wall = record.wall_seconds,
                progressed,
                total = experiment.total,
                "run recorded"
            );
            self.publish(
                ProgressKind::RunCompleted,
                progressed,
                experiment.total,
                Some((adapter.name(), &instance.meta.filename)),
            );
        }

        if let Ok(mut cur) = self.current.lock() {
            *cur = None;
        }

        let (status, kind) = if stopped || self.cancel.is_cancelled() {
            (ExperimentStatus::Stopped, ProgressKind::Stopped)
        } else {
            (ExperimentStatus::Completed, ProgressKind::Finished)
        };
        if let Err(e) = self.store.mark_terminal(id, status) {
            error!(experiment = id, "terminal transition failed: {e}");
        }
        info!(experiment = id, ?status, "experiment finished");
        self.publish(kind, progressed, experiment.total, None);
    }

    /// Persist an ERROR record for a pair whose referents vanished at run
    /// time. Returns true when the experiment had to be declared broken.
    fn record_failure(
        &self,
        solver_id: u32,
        instance_id: u32,
        message: &str,
        progressed: &mut u64,
    ) -> bool {
        let record = crate::executor::RunRecord::error(message);
        match self
            .store
            .commit_run(self.experiment_id, solver_id, instance_id, record, true)
        {
            Ok(_) => {
                *progressed += 1;
                false
            }
            Err(e) => {
                error!(experiment = self.experiment_id, "failure record write failed: {e}");
                let _ = self
                    .store
                    .mark_terminal(self.experiment_id, ExperimentStatus::Error);
                true
            }
        }
    }

    fn publish(
        &self,
        kind: ProgressKind,
        completed: u64,
        total: u64,
        current: Option<(&str, &str)>,
    ) {
        let mut event = ProgressEvent::now(kind, self.experiment_id, completed, total);
        if let Some((solver, instance)) = current {
            event = event.with_current(solver, instance);
        }
        self.bus.publish(&event);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{InstallOutcome, SolverAdapter, VersionCache};
    use crate::instance::{Difficulty, InstanceMeta};
    use crate::progress::ProgressKind;
    use crate::store::RunFilter;
    use std::path::{Path, PathBuf};

    struct ScriptAdapter {
        key: &'static str,
        name: &'static str,
        script: &'static str,
        cache: VersionCache,
    }

    impl ScriptAdapter {
        fn boxed(key: &'static str, name: &'static str, script: &'static str) -> Box<dyn SolverAdapter> {
            Box::new(ScriptAdapter {
                key,
                name,
                script,
                cache: VersionCache::default(),
            })
        }
    }

    impl SolverAdapter for ScriptAdapter {
        fn key(&self) -> &'static str {
            self.key
        }
        fn name(&self) -> &'static str {
            self.name
        }
        fn default_version(&self) -> &'static str {
            "0.0.0"
        }
        fn description(&self) -> &'static str {
            "test adapter"
        }
        fn website(&self) -> &'static str {
            ""
        }
        fn features(&self) -> &'static [&'static str] {
            &[]
        }
        fn executable_path(&self, solvers_root: &Path) -> PathBuf {
            solvers_root.join(self.script)
        }
        fn version_cache(&self) -> &VersionCache {
            &self.cache
        }
        fn detect_version(&self, _solvers_root: &Path) -> String {
            "0.0.0".to_string()
        }
        fn install(&self, _solvers_root: &Path) -> InstallOutcome {
            InstallOutcome::failure("not supported in tests", "")
        }
    }

    fn write_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn instance_meta(dir: &Path, filename: &str) -> InstanceMeta {
        let path = dir.join(filename);
        std::fs::write(&path, "p cnf 1 1\n1 0\n").unwrap();
        InstanceMeta {
            filename: filename.to_string(),
            path,
            family: "crafted".to_string(),
            difficulty: Difficulty::Easy,
            size_bytes: 12,
            header: None,
            checksum: String::new(),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        scheduler: ExperimentScheduler,
        instance_ids: Vec<u32>,
    }

    /// Two stub solvers (SAT and UNSAT) over `n` instances.
    fn fixture(n: usize, sat_body: &'static str, unsat_body: &'static str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "fast-sat.sh", sat_body);
        write_script(dir.path(), "fast-unsat.sh", unsat_body);

        let adapters = vec![
            ScriptAdapter::boxed("stub_a", "StubA", "fast-sat.sh"),
            ScriptAdapter::boxed("stub_b", "StubB", "fast-unsat.sh"),
        ];
        let registry = Arc::new(
            SolverRegistry::with_adapters(adapters, dir.path().to_path_buf()).unwrap(),
        );
        let store = Arc::new(CatalogStore::in_memory());
        let mut instance_ids = Vec::new();
        for i in 0..n {
            let meta = instance_meta(dir.path(), &format!("inst-{i}.cnf"));
            instance_ids.push(store.add_instance(meta).unwrap());
        }
        Fixture {
            _dir: dir,
            scheduler: ExperimentScheduler::new(store, registry),
            instance_ids,
        }
    }

    fn spec(name: &str, instance_ids: &[u32]) -> ExperimentSpec {
        ExperimentSpec {
            name: name.to_string(),
            description: None,
            timeout_seconds: 30,
            memory_limit_mib: 1024,
            parallelism: 1,
            // No legacy keys among the stubs, so ids are assigned
            // alphabetically from 1: stub_a → 1, stub_b → 2.
            solver_ids: vec![1, 2],
            instance_ids: instance_ids.to_vec(),
        }
    }

    #[test]
    fn create_validates_spec() {
        let fx = fixture(1, "exit 10", "exit 20");
        let mut bad = spec("x", &fx.instance_ids);
        bad.timeout_seconds = 0;
        assert!(matches!(
            fx.scheduler.create(&bad),
            Err(SchedulerError::InvalidSpec(_))
        ));

        let mut bad = spec("x", &fx.instance_ids);
        bad.solver_ids = vec![];
        assert!(matches!(
            fx.scheduler.create(&bad),
            Err(SchedulerError::InvalidSpec(_))
        ));

        let mut bad = spec("x", &fx.instance_ids);
        bad.solver_ids = vec![99];
        assert!(matches!(
            fx.scheduler.create(&bad),
            Err(SchedulerError::Registry(_))
        ));

        let mut bad = spec("x", &[]);
        bad.instance_ids = vec![];
        assert!(matches!(
            fx.scheduler.create(&bad),
            Err(SchedulerError::InvalidSpec(_))
        ));
    }

    #[test]
    fn full_experiment_completes_every_pair() {
        let fx = fixture(
            2,
            "echo 's SATISFIABLE'\nexit 10",
            "echo 's UNSATISFIABLE'\nexit 20",
        );
        let id = fx.scheduler.create(&spec("full", &fx.instance_ids)).unwrap();
        let sub = fx.scheduler.subscribe(id);
        fx.scheduler.start(id).unwrap();

        let status = fx
            .scheduler
            .wait_terminal(id, Duration::from_secs(30))
            .unwrap();
        assert_eq!(status, ExperimentStatus::Completed);

        let exp = fx.scheduler.store().experiment(id).unwrap();
        assert_eq!(exp.completed, 4);
        assert_eq!(exp.failed, 0);
        assert!(exp.completed_at.is_some());

        let runs = fx
            .scheduler
            .store()
            .runs(&RunFilter {
                experiment_id: Some(id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(runs.len(), 4);

        // The stream must deliver a terminal event.
        let mut terminal = None;
        while let Some(event) = sub.recv_timeout(Duration::from_secs(2)) {
            if event.kind.is_terminal() {
                terminal = Some(event);
                break;
            }
        }
        assert_eq!(terminal.unwrap().kind, ProgressKind::Finished);
    }

    #[test]
    fn stop_mid_run_discards_in_flight_pair() {
        // First instance is instant, later ones hang.
        let fx = fixture(
            3,
            "case \"$1\" in *inst-0*) exit 10;; *) sleep 30; exit 10;; esac",
            "case \"$1\" in *inst-0*) exit 20;; *) sleep 30; exit 20;; esac",
        );
        let id = fx.scheduler.create(&spec("stoppable", &fx.instance_ids)).unwrap();
        let sub = fx.scheduler.subscribe(id);
        fx.scheduler.start(id).unwrap();

        // Wait for the first pair to land.
        let mut first_done = false;
        while let Some(event) = sub.recv_timeout(Duration::from_secs(10)) {
            if event.kind == ProgressKind::RunCompleted {
                first_done = true;
                break;
            }
        }
        assert!(first_done, "first run never completed");

        fx.scheduler.stop(id).unwrap();

        let exp = fx.scheduler.store().experiment(id).unwrap();
        assert_eq!(exp.status, ExperimentStatus::Stopped);
        assert!(exp.completed_at.is_some());

        // Exactly the completed pair is recorded; the killed one stayed pending.
        let runs = fx
            .scheduler
            .store()
            .runs(&RunFilter {
                experiment_id: Some(id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(runs.len(), 1);

        // Terminal stopped event reaches the subscriber.
        let mut saw_stopped = false;
        while let Some(event) = sub.recv_timeout(Duration::from_secs(2)) {
            if event.kind == ProgressKind::Stopped {
                saw_stopped = true;
                break;
            }
        }
        assert!(saw_stopped);
    }

    #[test]
    fn resume_completes_remaining_pairs_exactly_once() {
        let fx = fixture(
            2,
            "case \"$1\" in *inst-0*) exit 10;; *) sleep 20; exit 10;; esac",
            "case \"$1\" in *inst-0*) exit 20;; *) sleep 20; exit 20;; esac",
        );
        let id = fx.scheduler.create(&spec("resume", &fx.instance_ids)).unwrap();
        let sub = fx.scheduler.subscribe(id);
        fx.scheduler.start(id).unwrap();
        while let Some(event) = sub.recv_timeout(Duration::from_secs(10)) {
            if event.kind == ProgressKind::RunCompleted {
                break;
            }
        }
        fx.scheduler.stop(id).unwrap();
        let recorded = fx.scheduler.store().existing_pairs(id).unwrap().len();
        assert!(recorded >= 1 && recorded < 4);

        // Replace the slow scripts with fast ones and resume.
        let root = fx.scheduler.registry().solvers_root().to_path_buf();
        write_script(&root, "fast-sat.sh", "exit 10");
        write_script(&root, "fast-unsat.sh", "exit 20");

        fx.scheduler.start(id).unwrap();
        let status = fx
            .scheduler
            .wait_terminal(id, Duration::from_secs(30))
            .unwrap();
        assert_eq!(status, ExperimentStatus::Completed);

        let runs = fx
            .scheduler
            .store()
            .runs(&RunFilter {
                experiment_id: Some(id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(runs.len(), 4, "every pair recorded exactly once");
        let exp = fx.scheduler.store().experiment(id).unwrap();
        assert_eq!(exp.completed + exp.failed, 4);
    }

    #[test]
    fn start_twice_is_rejected() {
        let fx = fixture(1, "sleep 10; exit 10", "sleep 10; exit 20");
        let id = fx.scheduler.create(&spec("dup", &fx.instance_ids)).unwrap();
        fx.scheduler.start(id).unwrap();
        assert!(matches!(
            fx.scheduler.start(id),
            Err(SchedulerError::AlreadyRunning(_))
        ));
        fx.scheduler.stop(id).unwrap();
    }

    #[test]
    fn stop_when_not_running_errors() {
        let fx = fixture(1, "exit 10", "exit 20");
        let id = fx.scheduler.create(&spec("idle", &fx.instance_ids)).unwrap();
        assert!(matches!(
            fx.scheduler.stop(id),
            Err(SchedulerError::NotRunning(_))
        ));
    }

    #[test]
    fn delete_stops_and_cascades() {
        let fx = fixture(1, "sleep 10; exit 10", "sleep 10; exit 20");
        let id = fx.scheduler.create(&spec("doomed", &fx.instance_ids)).unwrap();
        fx.scheduler.start(id).unwrap();
        fx.scheduler.delete(id).unwrap();
        assert!(fx.scheduler.store().experiment(id).is_err());
        assert!(fx
            .scheduler
            .store()
            .runs(&RunFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn progress_snapshot_reflects_current_pair() {
        let fx = fixture(1, "sleep 5; exit 10", "sleep 5; exit 20");
        let id = fx.scheduler.create(&spec("progress", &fx.instance_ids)).unwrap();
        fx.scheduler.start(id).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        let snapshot = fx.scheduler.progress(id).unwrap();
        assert_eq!(snapshot.status, ExperimentStatus::Running);
        assert_eq!(snapshot.total, 2);
        assert!(snapshot.current_solver.is_some());
        fx.scheduler.stop(id).unwrap();
    }
}
