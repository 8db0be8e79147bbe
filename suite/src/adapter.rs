// adapter.rs — Solver adapter contract.
//
// Each SAT solver is described by an adapter: static metadata, the location
// of its binary under the solvers directory, how to invoke it on a CNF file,
// how to probe its version, and how to mine statistics out of its stdout.
// Installation clones and builds from source; it is idempotent and never
// leaves the binary path in a falsely-ready state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wait_timeout::ChildExt;

// ── Metadata types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverCategory {
    Competition,
    Educational,
    Specialised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// Binary exists and is executable.
    Ready,
    /// Source directory exists but the binary is missing.
    Error,
    NotInstalled,
}

/// Capability flags surfaced in the comparison matrix.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub solver_type: &'static str,
    pub preprocessing: bool,
    pub inprocessing: bool,
    pub parallel: bool,
    pub incremental: bool,
    pub best_for: &'static [&'static str],
    pub performance_class: &'static str,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            solver_type: "CDCL",
            preprocessing: false,
            inprocessing: false,
            parallel: false,
            incremental: false,
            best_for: &[],
            performance_class: "Unknown",
        }
    }
}

/// Serialisable snapshot of one adapter's state.
#[derive(Debug, Clone, Serialize)]
pub struct SolverInfo {
    pub id: u32,
    pub key: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub website: String,
    pub category: SolverCategory,
    pub features: Vec<String>,
    pub executable_path: PathBuf,
    pub status: SolverStatus,
    pub capabilities: Capabilities,
}

/// Result of an installation attempt.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub success: bool,
    pub message: String,
    pub detected_version: Option<String>,
    /// Tail of the build log for diagnostics.
    pub log: String,
}

impl InstallOutcome {
    pub fn failure(message: impl Into<String>, log: impl Into<String>) -> Self {
        InstallOutcome {
            success: false,
            message: message.into(),
            detected_version: None,
            log: log.into(),
        }
    }
}

// ── Parsed solver statistics ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Real(f64),
}

/// Counters mined from solver stdout. Adapter-specific scalars that do not
/// fit the common set go into `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverStats {
    pub conflicts: Option<i64>,
    pub decisions: Option<i64>,
    pub propagations: Option<i64>,
    pub restarts: Option<i64>,
    pub learnt_clauses: Option<i64>,
    pub deleted_clauses: Option<i64>,
    pub cpu_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, StatValue>,
}

// ── Adapter trait ───────────────────────────────────────────────────────

/// Thread-safe memo for the detected version string. All writers produce the
/// same value, so last-write-wins is harmless.
#[derive(Debug, Default)]
pub struct VersionCache(Mutex<Option<String>>);

impl VersionCache {
    pub fn get(&self) -> Option<String> {
        self.0.lock().ok().and_then(|g| g.clone())
    }

    pub fn set(&self, version: String) {
        if let Ok(mut g) = self.0.lock() {
            *g = Some(version);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut g) = self.0.lock() {
            *g = None;
        }
    }
}

pub trait SolverAdapter: Send + Sync {
    // ── metadata ──
    fn key(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn default_version(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn website(&self) -> &'static str;
    fn features(&self) -> &'static [&'static str];

    fn category(&self) -> SolverCategory {
        SolverCategory::Competition
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    // ── paths ──

    /// This solver's source/build directory under the solvers root.
    fn solver_dir(&self, solvers_root: &Path) -> PathBuf {
        solvers_root.join(self.key())
    }

    /// Absolute path of the solver binary.
    fn executable_path(&self, solvers_root: &Path) -> PathBuf;

    // ── status ──

    fn is_installed(&self, solvers_root: &Path) -> bool {
        is_executable(&self.executable_path(solvers_root))
    }

    fn status(&self, solvers_root: &Path) -> SolverStatus {
        if self.is_installed(solvers_root) {
            SolverStatus::Ready
        } else if self.solver_dir(solvers_root).exists() {
            SolverStatus::Error
        } else {
            SolverStatus::NotInstalled
        }
    }

    // ── version detection ──

    fn version_cache(&self) -> &VersionCache;

    fn version_flags(&self) -> &'static [&'static str] {
        &["--version"]
    }

    /// Extract a dotted version from probe output. Override for solvers with
    /// unusual banners.
    fn parse_version(&self, output: &str) -> Option<String> {
        static DOTTED: OnceLock<Regex> = OnceLock::new();
        let re = DOTTED.get_or_init(|| Regex::new(r"(\d+\.\d+(?:\.\d+)?)").unwrap());
        re.captures(output).map(|c| c[1].to_string())
    }

    /// Probe the installed binary for its version, trying each flag in
    /// order. The first successful parse is memoised for process lifetime;
    /// the declared default is returned when nothing works.
    fn detect_version(&self, solvers_root: &Path) -> String {
        if let Some(v) = self.version_cache().get() {
            return v;
        }
        if !self.is_installed(solvers_root) {
            return self.default_version().to_string();
        }
        let exe = self.executable_path(solvers_root);
        for flag in self.version_flags() {
            match probe_output(&exe, flag) {
                Some(output) => {
                    if let Some(version) = self.parse_version(&output) {
                        self.version_cache().set(version.clone());
                        return version;
                    }
                }
                None => debug!(solver = self.key(), flag, "version probe failed"),
            }
        }
        self.default_version().to_string()
    }

    // ── execution contract ──

    /// Argv for one run: `[exe, cnf_path, …adapter flags]`.
    fn build_command(&self, solvers_root: &Path, cnf_path: &Path) -> Vec<String> {
        vec![
            self.executable_path(solvers_root).display().to_string(),
            cnf_path.display().to_string(),
        ]
    }

    /// Mine statistics from stdout. The default covers the common
    /// `name : value` patterns; adapters add solver-specific extras.
    fn parse_stats(&self, stdout: &str) -> SolverStats {
        generic_stats(stdout)
    }

    // ── installation ──

    /// Fetch and build this solver under the solvers root. Idempotent.
    fn install(&self, solvers_root: &Path) -> InstallOutcome;

    /// Remove the solver directory and forget the cached version.
    fn uninstall(&self, solvers_root: &Path) -> std::io::Result<()> {
        let dir = self.solver_dir(solvers_root);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        self.version_cache().clear();
        Ok(())
    }

    /// Snapshot for listings and the comparison matrix.
    fn info(&self, id: u32, solvers_root: &Path) -> SolverInfo {
        SolverInfo {
            id,
            key: self.key().to_string(),
            name: self.name().to_string(),
            version: self.detect_version(solvers_root),
            description: self.description().to_string(),
            website: self.website().to_string(),
            category: self.category(),
            features: self.features().iter().map(|f| f.to_string()).collect(),
            executable_path: self.executable_path(solvers_root),
            status: self.status(solvers_root),
            capabilities: self.capabilities(),
        }
    }
}

// ── Shared helpers ──────────────────────────────────────────────────────

pub(crate) fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(path) {
            Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn probe_output(exe: &Path, flag: &str) -> Option<String> {
    let mut child = Command::new(exe)
        .arg(flag)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .stdin(std::process::Stdio::null())
        .spawn()
        .ok()?;
    match child.wait_timeout(Duration::from_secs(10)).ok()? {
        Some(_status) => {
            let output = child.wait_with_output().ok()?;
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            let text = text.trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            None
        }
    }
}

/// Common statistics patterns across CDCL solvers (`conflicts : 123`,
/// `c decisions: 456`, …).
pub fn generic_stats(stdout: &str) -> SolverStats {
    struct Patterns {
        int_fields: Vec<(&'static str, Regex)>,
        cpu: Regex,
    }
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        let re = ci_regex;
        Patterns {
            int_fields: vec![
                ("conflicts", re(r"conflicts\s*[:\s]+(\d+)")),
                ("decisions", re(r"decisions\s*[:\s]+(\d+)")),
                ("propagations", re(r"propagations\s*[:\s]+(\d+)")),
                ("restarts", re(r"restarts\s*[:\s]+(\d+)")),
                (
                    "learnt_clauses",
                    re(r"(?:learnt|learned)\s*(?:clauses|literals)?\s*[:\s]+(\d+)"),
                ),
                (
                    "deleted_clauses",
                    re(r"(?:deleted|removed)\s*(?:clauses)?\s*[:\s]+(\d+)"),
                ),
            ],
            cpu: re(r"(?:CPU|process)[- ]time[:\s]+(\d+\.?\d*)\s*(?:s|seconds)"),
        }
    });

    let mut stats = SolverStats::default();
    for (field, re) in &patterns.int_fields {
        let value = re
            .captures(stdout)
            .and_then(|c| c[1].parse::<i64>().ok());
        match *field {
            "conflicts" => stats.conflicts = value,
            "decisions" => stats.decisions = value,
            "propagations" => stats.propagations = value,
            "restarts" => stats.restarts = value,
            "learnt_clauses" => stats.learnt_clauses = value,
            "deleted_clauses" => stats.deleted_clauses = value,
            _ => {}
        }
    }
    stats.cpu_seconds = patterns
        .cpu
        .captures(stdout)
        .and_then(|c| c[1].parse::<f64>().ok());
    stats
}

/// Compile a case-insensitive pattern known to be valid at compile time.
pub(crate) fn ci_regex(pattern: &str) -> Regex {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("static pattern")
}

/// Run a shell command with a timeout, capturing output. Used by install
/// recipes for clone/configure/make steps.
pub fn run_shell(cmd: &str, cwd: Option<&Path>, timeout: Duration) -> (i32, String, String) {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(cmd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => return (-1, String::new(), format!("failed to spawn: {e}")),
    };
    match child.wait_timeout(timeout) {
        Ok(Some(_)) => match child.wait_with_output() {
            Ok(output) => (
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ),
            Err(e) => (-1, String::new(), format!("failed to collect output: {e}")),
        },
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            (
                -1,
                String::new(),
                format!("command timed out after {}s: {cmd}", timeout.as_secs()),
            )
        }
        Err(e) => (-1, String::new(), format!("wait failed: {e}")),
    }
}

/// Which of the given commands are missing from PATH.
pub fn missing_system_deps(commands: &[&str]) -> Vec<String> {
    commands
        .iter()
        .filter(|cmd| {
            Command::new("which")
                .arg(cmd)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .map(|s| !s.success())
                .unwrap_or(true)
        })
        .map(|c| (*c).to_string())
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────
