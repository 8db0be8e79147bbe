// executor.rs — Bounded execution of one solver on one CNF instance.
//
// Spawns the solver in its own process group, samples memory and CPU from
// procfs on a 100 ms watchdog tick, enforces the wall-time and memory
// budgets by killing the whole group, captures bounded stdout/stderr
// prefixes, and classifies the outcome. All failure modes map to an outcome
// code inside the returned record; the executor never propagates errors to
// the caller.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::adapter::{SolverAdapter, SolverStats};

/// Watchdog sampling period (≥ 5 Hz required; we tick at 10 Hz).
const TICK: Duration = Duration::from_millis(100);
/// Grace period between killing the group and giving up on reaping it.
const KILL_GRACE: Duration = Duration::from_secs(2);
/// Captured stdout prefix bound.
const STDOUT_LIMIT: usize = 10 * 1024;
/// Captured stderr prefix bound.
const STDERR_LIMIT: usize = 5 * 1024;

// ── Outcome and record ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Sat,
    Unsat,
    Timeout,
    Memout,
    Error,
    Unknown,
}

impl Outcome {
    /// SAT and UNSAT count as solved; everything else is penalised.
    pub fn solved(self) -> bool {
        matches!(self, Outcome::Sat | Outcome::Unsat)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Sat => "SAT",
            Outcome::Unsat => "UNSAT",
            Outcome::Timeout => "TIMEOUT",
            Outcome::Memout => "MEMOUT",
            Outcome::Error => "ERROR",
            Outcome::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Canonical result of one (solver, instance) execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub outcome: Outcome,
    pub exit_code: i32,
    pub wall_seconds: f64,
    pub cpu_seconds: f64,
    pub user_seconds: f64,
    pub system_seconds: f64,
    pub max_mem_kib: u64,
    pub avg_mem_kib: u64,
    pub ctx_switches_voluntary: Option<u64>,
    pub ctx_switches_involuntary: Option<u64>,
    pub page_faults: Option<u64>,
    pub stats: SolverStats,
    pub stdout_prefix: String,
    pub error_message: String,
    /// ISO-8601 creation time.
    pub timestamp: String,
}

impl RunRecord {
    /// A zeroed record carrying only an ERROR outcome and a message.
    pub(crate) fn error(message: impl Into<String>) -> Self {
        RunRecord {
            outcome: Outcome::Error,
            exit_code: -1,
            wall_seconds: 0.0,
            cpu_seconds: 0.0,
            user_seconds: 0.0,
            system_seconds: 0.0,
            max_mem_kib: 0,
            avg_mem_kib: 0,
            ctx_switches_voluntary: None,
            ctx_switches_involuntary: None,
            page_faults: None,
            stats: SolverStats::default(),
            stdout_prefix: String::new(),
            error_message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// PAR-2 under the given wall budget: the wall time when solved,
    /// twice the budget otherwise. Derived, never authoritative in storage.
    pub fn par2(&self, timeout_seconds: f64) -> f64 {
        if self.outcome.solved() {
            self.wall_seconds
        } else {
            2.0 * timeout_seconds
        }
    }
}

/// Per-run resource budgets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limits {
    pub timeout_seconds: u64,
    pub memory_limit_mib: u64,
}

impl Limits {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn memory_limit_kib(&self) -> u64 {
        self.memory_limit_mib * 1024
    }
}

/// Cooperative cancellation token shared between scheduler and executor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Watchdog verdict ────────────────────────────────────────────────────

/// What the watchdog decided before process exit, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Timeout,
    Memout,
    Cancelled,
}

// ── Public entry point ──────────────────────────────────────────────────

/// Run `adapter` on `cnf_path` under `limits`. Always returns a fully
/// populated record; spawn failures, timeouts, memory breaches, and
/// cancellation all become outcome codes.
pub fn execute(
    adapter: &dyn SolverAdapter,
    solvers_root: &Path,
    cnf_path: &Path,
    limits: &Limits,
    cancel: &CancelToken,
) -> RunRecord {
    if !adapter.is_installed(solvers_root) {
        return RunRecord::error(format!("solver {} is not installed", adapter.name()));
    }
    if !cnf_path.is_file() {
        return RunRecord::error(format!("instance not found: {}", cnf_path.display()));
    }

    let argv = adapter.build_command(solvers_root, cnf_path);
    debug!(solver = adapter.key(), cnf = %cnf_path.display(), "spawning");

    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Own process group so the whole solver subtree can be terminated.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return RunRecord::error(format!("failed to spawn {}: {e}", argv[0])),
    };

    let stdout_handle = child.stdout.take().map(|s| capture_prefix(s, STDOUT_LIMIT));
    let stderr_handle = child.stderr.take().map(|s| capture_prefix(s, STDERR_LIMIT));

    let start = Instant::now();
    let pid = child.id();
    let mut sampler = ResourceSampler::new(pid);
    let mut verdict: Option<Verdict> = None;

    let status = loop {
        match child.wait_timeout(TICK) {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!(solver = adapter.key(), "wait failed: {e}");
                kill_group(pid);
                break None;
            }
        }

        sampler.sample();

        if verdict.is_none() {
            if cancel.is_cancelled() {
                verdict = Some(Verdict::Cancelled);
            } else if start.elapsed() >= limits.timeout() {
                verdict = Some(Verdict::Timeout);
            } else if sampler.peak_kib > limits.memory_limit_kib() {
                verdict = Some(Verdict::Memout);
            }
            if let Some(v) = verdict {
                debug!(solver = adapter.key(), ?v, "killing process group");
                kill_group(pid);
            }
        } else if start.elapsed() >= limits.timeout() + KILL_GRACE + KILL_GRACE {
            // The group ignored SIGKILL long past the grace period; give up
            // sampling and block on the reap below.
            break child.wait().ok();
        }
    };

    let wall_elapsed = start.elapsed().as_secs_f64();

    // An exit racing the deadline inside one watchdog tick still counts as
    // a timeout; solved outcomes must sit strictly inside the budget.
    if verdict.is_none() && wall_elapsed >= limits.timeout_seconds as f64 {
        verdict = Some(Verdict::Timeout);
    }

    let stdout_prefix = stdout_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr_prefix = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    let exit_code = match &status {
        Some(status) => exit_code_of(status),
        None => -1,
    };

    let outcome = classify(exit_code, &stdout_prefix, verdict);

    // Wall time: the budget exactly on timeout, measured time otherwise.
    let wall_seconds = match outcome {
        Outcome::Timeout => limits.timeout_seconds as f64,
        _ => wall_elapsed,
    };

    let mut error_message = match verdict {
        Some(Verdict::Cancelled) => "cancelled".to_string(),
        Some(Verdict::Timeout) => format!("timeout ({}s) exceeded", limits.timeout_seconds),
        Some(Verdict::Memout) => format!(
            "memory limit ({} MiB) exceeded",
            limits.memory_limit_mib
        ),
        None => String::new(),
    };
    if error_message.is_empty() && !stderr_prefix.trim().is_empty() {
        error_message = stderr_prefix;
    }

    let stats = adapter.parse_stats(&stdout_prefix);

    let (user_seconds, system_seconds) = sampler.cpu_seconds();
    let cpu_seconds = if user_seconds + system_seconds > 0.0 {
        user_seconds + system_seconds
    } else {
        stats.cpu_seconds.unwrap_or(0.0)
    };

    RunRecord {
        outcome,
        exit_code,
        wall_seconds,
        cpu_seconds,
        user_seconds,
        system_seconds,
        max_mem_kib: sampler.peak_kib,
        avg_mem_kib: sampler.avg_kib(),
        ctx_switches_voluntary: sampler.ctx_voluntary,
        ctx_switches_involuntary: sampler.ctx_involuntary,
        page_faults: sampler.major_faults,
        stats,
        stdout_prefix,
        error_message,
        timestamp: Utc::now().to_rfc3339(),
    }
}

// ── Classification ──────────────────────────────────────────────────────

/// Outcome from `(exitCode, stdout, watchdog verdict)`.
///
/// The watchdog verdict wins: a record killed at the deadline is TIMEOUT
/// even if a result line made it out, which keeps the wall-time invariants
/// of solved outcomes intact. Otherwise the `s`-line is authoritative and
/// the 10/20 exit-code convention is only a tiebreaker; an unclassifiable
/// nonzero exit is ERROR, never silently SAT.
pub fn classify(exit_code: i32, stdout: &str, verdict: Option<Verdict>) -> Outcome {
    match verdict {
        Some(Verdict::Timeout) => return Outcome::Timeout,
        Some(Verdict::Memout) => return Outcome::Memout,
        Some(Verdict::Cancelled) => return Outcome::Error,
        None => {}
    }

    let upper = stdout.to_uppercase();
    if upper.contains("UNSATISFIABLE") {
        return Outcome::Unsat;
    }
    if upper.contains("SATISFIABLE") {
        return Outcome::Sat;
    }
    match exit_code {
        10 => Outcome::Sat,
        20 => Outcome::Unsat,
        0 => Outcome::Unknown,
        _ => Outcome::Error,
    }
}

// ── Output capture ──────────────────────────────────────────────────────

/// Collect up to `limit` bytes from a stream on a helper thread, then drain
/// the rest so the child never blocks on a full pipe.
fn capture_prefix<R: Read + Send + 'static>(
    mut stream: R,
    limit: usize,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut prefix: Vec<u8> = Vec::with_capacity(limit.min(8192));
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if prefix.len() < limit {
                        let take = (limit - prefix.len()).min(n);
                        prefix.extend_from_slice(&buf[..take]);
                    }
                }
            }
        }
        String::from_utf8_lossy(&prefix).into_owned()
    })
}

// ── Process control ─────────────────────────────────────────────────────

#[cfg(unix)]
fn kill_group(pid: u32) {
    // The child was spawned with process_group(0), so its pgid equals its pid.
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

#[cfg(unix)]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(not(unix))]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

// ── Procfs sampling ─────────────────────────────────────────────────────

/// Accumulates RSS/CPU/context-switch samples for one pid. Fields stay at
/// their defaults on platforms without procfs.
struct ResourceSampler {
    pid: u32,
    peak_kib: u64,
    sum_kib: u128,
    samples: u64,
    utime_ticks: u64,
    stime_ticks: u64,
    ctx_voluntary: Option<u64>,
    ctx_involuntary: Option<u64>,
    major_faults: Option<u64>,
}

impl ResourceSampler {
    fn new(pid: u32) -> Self {
        ResourceSampler {
            pid,
            peak_kib: 0,
            sum_kib: 0,
            samples: 0,
            utime_ticks: 0,
            stime_ticks: 0,
            ctx_voluntary: None,
            ctx_involuntary: None,
            major_faults: None,
        }
    }

    fn sample(&mut self) {
        if let Some(status) = read_proc_status(self.pid) {
            self.peak_kib = self.peak_kib.max(status.vm_rss_kib);
            self.sum_kib += u128::from(status.vm_rss_kib);
            self.samples += 1;
            self.ctx_voluntary = status.ctx_voluntary.or(self.ctx_voluntary);
            self.ctx_involuntary = status.ctx_involuntary.or(self.ctx_involuntary);
        }
        if let Some(stat) = read_proc_stat(self.pid) {
            self.utime_ticks = stat.utime_ticks;
            self.stime_ticks = stat.stime_ticks;
            self.major_faults = Some(stat.major_faults);
        }
    }

    fn avg_kib(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            (self.sum_kib / u128::from(self.samples)) as u64
        }
    }

    fn cpu_seconds(&self) -> (f64, f64) {
        let tick_hz = clock_ticks_per_second();
        (
            self.utime_ticks as f64 / tick_hz,
            self.stime_ticks as f64 / tick_hz,
        )
    }
}

#[cfg(unix)]
fn clock_ticks_per_second() -> f64 {
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz > 0 {
        hz as f64
    } else {
        100.0
    }
}

#[cfg(not(unix))]
fn clock_ticks_per_second() -> f64 {
    100.0
}

struct ProcStatus {
    vm_rss_kib: u64,
    ctx_voluntary: Option<u64>,
    ctx_involuntary: Option<u64>,
}

fn read_proc_status(pid: u32) -> Option<ProcStatus> {
    let text = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let mut vm_rss_kib = None;
    let mut ctx_voluntary = None;
    let mut ctx_involuntary = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            vm_rss_kib = rest
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok());
        } else if let Some(rest) = line.strip_prefix("voluntary_ctxt_switches:") {
            ctx_voluntary = rest.trim().parse().ok();
        } else if let Some(rest) = line.strip_prefix("nonvoluntary_ctxt_switches:") {
            ctx_involuntary = rest.trim().parse().ok();
        }
    }
    Some(ProcStatus {
        vm_rss_kib: vm_rss_kib?,
        ctx_voluntary,
        ctx_involuntary,
    })
}

struct ProcStat {
    utime_ticks: u64,
    stime_ticks: u64,
    major_faults: u64,
}

fn read_proc_stat(pid: u32) -> Option<ProcStat> {
    let text = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Fields after the parenthesised comm, which may itself contain spaces.
    let rest = &text[text.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // 1-based stat fields: majflt = 12, utime = 14, stime = 15.
    // `fields[0]` is field 3 (state).
    Some(ProcStat {
        major_faults: fields.get(9)?.parse().ok()?,
        utime_ticks: fields.get(11)?.parse().ok()?,
        stime_ticks: fields.get(12)?.parse().ok()?,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::VersionCache;
    use std::path::PathBuf;

    /// Adapter whose "binary" is a shell script written by the test.
    struct StubAdapter {
        script_name: &'static str,
        cache: VersionCache,
    }

    impl StubAdapter {
        fn new(script_name: &'static str) -> Self {
            StubAdapter {
                script_name,
                cache: VersionCache::default(),
            }
        }
    }

    impl SolverAdapter for StubAdapter {
        fn key(&self) -> &'static str {
            "stub"
        }
        fn name(&self) -> &'static str {
            "Stub"
        }
        fn default_version(&self) -> &'static str {
            "0.0.0"
        }
        fn description(&self) -> &'static str {
            "test stub"
        }
        fn website(&self) -> &'static str {
            ""
        }
        fn features(&self) -> &'static [&'static str] {
            &[]
        }
        fn executable_path(&self, solvers_root: &Path) -> PathBuf {
            solvers_root.join(self.script_name)
        }
        fn version_cache(&self) -> &VersionCache {
            &self.cache
        }
        fn install(&self, _solvers_root: &Path) -> crate::adapter::InstallOutcome {
            crate::adapter::InstallOutcome::failure("stub", "")
        }
    }

    fn write_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn write_cnf(dir: &Path) -> PathBuf {
        let path = dir.join("t.cnf");
        std::fs::write(&path, "p cnf 1 1\n1 0\n").unwrap();
        path
    }

    fn limits(timeout: u64) -> Limits {
        Limits {
            timeout_seconds: timeout,
            memory_limit_mib: 1024,
        }
    }

    // ── classify ────────────────────────────────────────────────────────

    #[test]
    fn classify_stdout_beats_exit_code() {
        assert_eq!(classify(0, "s SATISFIABLE\nv 1 0\n", None), Outcome::Sat);
        assert_eq!(classify(10, "s UNSATISFIABLE\n", None), Outcome::Unsat);
    }

    #[test]
    fn classify_exit_codes_as_tiebreak() {
        assert_eq!(classify(10, "", None), Outcome::Sat);
        assert_eq!(classify(20, "", None), Outcome::Unsat);
    }

    #[test]
    fn classify_unknown_and_error() {
        assert_eq!(classify(0, "no verdict here", None), Outcome::Unknown);
        assert_eq!(classify(1, "", None), Outcome::Error);
    }

    #[test]
    fn classify_watchdog_wins() {
        assert_eq!(
            classify(10, "s SATISFIABLE", Some(Verdict::Timeout)),
            Outcome::Timeout
        );
        assert_eq!(classify(0, "", Some(Verdict::Memout)), Outcome::Memout);
        assert_eq!(classify(0, "", Some(Verdict::Cancelled)), Outcome::Error);
    }

    #[test]
    fn unsatisfiable_substring_not_misread_as_sat() {
        assert_eq!(classify(0, "c ... UNSATISFIABLE core\n", None), Outcome::Unsat);
    }

    // ── end-to-end with stub scripts ────────────────────────────────────

    #[test]
    fn sat_run_records_output_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "sat.sh",
            "echo 'c conflicts : 42'\necho 's SATISFIABLE'\necho 'v 1 0'\nexit 10",
        );
        let cnf = write_cnf(dir.path());
        let adapter = StubAdapter::new("sat.sh");
        let record = execute(
            &adapter,
            dir.path(),
            &cnf,
            &limits(10),
            &CancelToken::new(),
        );
        assert_eq!(record.outcome, Outcome::Sat);
        assert_eq!(record.exit_code, 10);
        assert!(record.stdout_prefix.contains("v 1 0"));
        assert_eq!(record.stats.conflicts, Some(42));
        assert!(record.wall_seconds < 10.0);
        assert!((record.par2(10.0) - record.wall_seconds).abs() < 1e-9);
    }

    #[test]
    fn timeout_kills_and_pins_wall_to_budget() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "slow.sh", "sleep 30\necho 's SATISFIABLE'");
        let cnf = write_cnf(dir.path());
        let adapter = StubAdapter::new("slow.sh");
        let start = Instant::now();
        let record = execute(
            &adapter,
            dir.path(),
            &cnf,
            &limits(1),
            &CancelToken::new(),
        );
        assert_eq!(record.outcome, Outcome::Timeout);
        assert!((record.wall_seconds - 1.0).abs() < 1e-9);
        assert_ne!(record.exit_code, 0);
        assert!((record.par2(1.0) - 2.0).abs() < 1e-9);
        // Killed well before the script would have finished.
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn cancellation_yields_error_record() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "slow.sh", "sleep 30");
        let cnf = write_cnf(dir.path());
        let adapter = StubAdapter::new("slow.sh");
        let cancel = CancelToken::new();
        cancel.cancel();
        let start = Instant::now();
        let record = execute(&adapter, dir.path(), &cnf, &limits(60), &cancel);
        assert_eq!(record.outcome, Outcome::Error);
        assert_eq!(record.error_message, "cancelled");
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_binary_is_error_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let cnf = write_cnf(dir.path());
        let adapter = StubAdapter::new("ghost.sh");
        let record = execute(
            &adapter,
            dir.path(),
            &cnf,
            &limits(5),
            &CancelToken::new(),
        );
        assert_eq!(record.outcome, Outcome::Error);
        assert!(record.error_message.contains("not installed"));
    }

    #[test]
    fn missing_instance_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "sat.sh", "exit 10");
        let adapter = StubAdapter::new("sat.sh");
        let record = execute(
            &adapter,
            dir.path(),
            Path::new("/nonexistent/x.cnf"),
            &limits(5),
            &CancelToken::new(),
        );
        assert_eq!(record.outcome, Outcome::Error);
        assert!(record.error_message.contains("instance not found"));
    }

    #[test]
    fn stdout_prefix_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        // ~40 KiB of output, then a verdict.
        write_script(
            dir.path(),
            "chatty.sh",
            "i=0\nwhile [ $i -lt 1000 ]; do echo 'c 0123456789012345678901234567890123456789'; i=$((i+1)); done\necho 's UNSATISFIABLE'\nexit 20",
        );
        let cnf = write_cnf(dir.path());
        let adapter = StubAdapter::new("chatty.sh");
        let record = execute(
            &adapter,
            dir.path(),
            &cnf,
            &limits(30),
            &CancelToken::new(),
        );
        assert!(record.stdout_prefix.len() <= STDOUT_LIMIT);
        // Verdict line was past the bound, so the exit code decides.
        assert_eq!(record.outcome, Outcome::Unsat);
    }

    #[test]
    fn nonzero_exit_with_stderr_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "bad.sh", "echo 'parse error' >&2\nexit 3");
        let cnf = write_cnf(dir.path());
        let adapter = StubAdapter::new("bad.sh");
        let record = execute(
            &adapter,
            dir.path(),
            &cnf,
            &limits(5),
            &CancelToken::new(),
        );
        assert_eq!(record.outcome, Outcome::Error);
        assert!(record.error_message.contains("parse error"));
    }
}
