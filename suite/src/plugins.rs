// plugins.rs — Built-in solver adapters.
//
// One adapter per supported solver: kissat, MiniSat, CaDiCaL, CryptoMiniSat.
// Each bundles real metadata, a build recipe, and solver-specific output
// parsing on top of the generic patterns.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::adapter::{
    ci_regex, generic_stats, missing_system_deps, run_shell, Capabilities, InstallOutcome,
    SolverAdapter, SolverCategory, SolverStats, StatValue, VersionCache,
};

const CLONE_TIMEOUT: Duration = Duration::from_secs(180);
const BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// All adapters known to this build, in registration order.
pub fn builtin_adapters() -> Vec<Box<dyn SolverAdapter>> {
    vec![
        Box::new(Kissat::default()),
        Box::new(Minisat::default()),
        Box::new(Cadical::default()),
        Box::new(CryptoMinisat::default()),
    ]
}

// ── Install helpers ─────────────────────────────────────────────────────

struct BuildLog(Vec<String>);

impl BuildLog {
    fn new() -> Self {
        BuildLog(Vec::new())
    }

    fn step(&mut self, label: &str, rc: i32, stdout: &str, stderr: &str) {
        self.0
            .push(format!("[{label}] rc={rc}\n{stdout}\n{stderr}"));
    }

    fn text(&self) -> String {
        self.0.join("\n")
    }
}

fn clone_if_missing(url: &str, dir: &Path, log: &mut BuildLog) -> Result<(), InstallOutcome> {
    if dir.exists() {
        return Ok(());
    }
    let (rc, out, err) = run_shell(
        &format!("git clone --depth 1 {url} {}", dir.display()),
        None,
        CLONE_TIMEOUT,
    );
    log.step("clone", rc, &out, &err);
    if rc != 0 {
        return Err(InstallOutcome::failure("git clone failed", log.text()));
    }
    Ok(())
}

fn require_deps(deps: &[&str]) -> Result<(), InstallOutcome> {
    let missing = missing_system_deps(deps);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InstallOutcome::failure(
            format!("missing system dependencies: {}", missing.join(", ")),
            String::new(),
        ))
    }
}

fn finish<A: SolverAdapter>(
    adapter: &A,
    solvers_root: &Path,
    log: BuildLog,
) -> InstallOutcome {
    if !adapter.is_installed(solvers_root) {
        return InstallOutcome::failure(
            format!("{} build completed but binary is missing", adapter.name()),
            log.text(),
        );
    }
    adapter.version_cache().clear();
    let version = adapter.detect_version(solvers_root);
    InstallOutcome {
        success: true,
        message: format!("{} {} installed", adapter.name(), version),
        detected_version: Some(version),
        log: log.text(),
    }
}

// ── Kissat ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Kissat {
    version_cache: VersionCache,
}

impl SolverAdapter for Kissat {
    fn key(&self) -> &'static str {
        "kissat"
    }

    fn name(&self) -> &'static str {
        "Kissat"
    }

    fn default_version(&self) -> &'static str {
        "3.1.1"
    }

    fn description(&self) -> &'static str {
        "Kissat — a condensed and improved reimplementation of CaDiCaL in C. \
         Winner of multiple SAT Competition tracks; the performance baseline \
         for sequential CDCL solvers."
    }

    fn website(&self) -> &'static str {
        "https://github.com/arminbiere/kissat"
    }

    fn features(&self) -> &'static [&'static str] {
        &[
            "CDCL",
            "Inprocessing",
            "Vivification",
            "Bounded variable elimination",
            "Target phases",
            "Clause minimization",
        ]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            preprocessing: true,
            inprocessing: true,
            best_for: &["Industrial instances", "Competition benchmarks"],
            performance_class: "State of the art",
            ..Capabilities::default()
        }
    }

    fn executable_path(&self, solvers_root: &Path) -> PathBuf {
        self.solver_dir(solvers_root).join("build").join("kissat")
    }

    fn version_cache(&self) -> &VersionCache {
        &self.version_cache
    }

    fn parse_stats(&self, stdout: &str) -> SolverStats {
        let mut stats = generic_stats(stdout);
        static REDUCTIONS: OnceLock<Regex> = OnceLock::new();
        let re = REDUCTIONS.get_or_init(|| ci_regex(r"c\s+reductions:?\s+(\d+)"));
        if let Some(c) = re.captures(stdout) {
            if let Ok(v) = c[1].parse() {
                stats.extra.insert("reductions".to_string(), StatValue::Int(v));
            }
        }
        stats
    }

    fn install(&self, solvers_root: &Path) -> InstallOutcome {
        let mut log = BuildLog::new();
        if let Err(out) = require_deps(&["git", "make", "gcc"]) {
            return out;
        }
        let dir = self.solver_dir(solvers_root);
        if let Err(out) = clone_if_missing("https://github.com/arminbiere/kissat.git", &dir, &mut log)
        {
            return out;
        }
        let (rc, out, err) = run_shell("./configure && make", Some(&dir), BUILD_TIMEOUT);
        log.step("configure+make", rc, &out, &err);
        finish(self, solvers_root, log)
    }
}

// ── MiniSat ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Minisat {
    version_cache: VersionCache,
}

impl SolverAdapter for Minisat {
    fn key(&self) -> &'static str {
        "minisat"
    }

    fn name(&self) -> &'static str {
        "MiniSat"
    }

    fn default_version(&self) -> &'static str {
        "2.2.0"
    }

    fn description(&self) -> &'static str {
        "MiniSat — minimalistic, open-source SAT solver. The reference \
         implementation of CDCL with two-watched literals, widely used in \
         teaching and as the base of derived solvers."
    }

    fn website(&self) -> &'static str {
        "http://minisat.se/"
    }

    fn features(&self) -> &'static [&'static str] {
        &[
            "CDCL",
            "Conflict clause learning",
            "Variable activity (VSIDS)",
            "Two-watched literals",
            "Phase saving",
        ]
    }

    fn category(&self) -> SolverCategory {
        SolverCategory::Educational
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            incremental: true,
            best_for: &["Educational", "Research", "Small instances"],
            performance_class: "Reference implementation",
            ..Capabilities::default()
        }
    }

    /// Prefer the core build; fall back to the simp build.
    fn executable_path(&self, solvers_root: &Path) -> PathBuf {
        let dir = self.solver_dir(solvers_root);
        let core = dir.join("core").join("minisat");
        if core.is_file() {
            return core;
        }
        let simp = dir.join("simp").join("minisat");
        if simp.is_file() {
            return simp;
        }
        core
    }

    fn version_cache(&self) -> &VersionCache {
        &self.version_cache
    }

    fn version_flags(&self) -> &'static [&'static str] {
        &["--help"]
    }

    fn parse_version(&self, output: &str) -> Option<String> {
        static BANNER: OnceLock<Regex> = OnceLock::new();
        let re = BANNER.get_or_init(|| ci_regex(r"MiniSat\s+([\d.]+)"));
        match re.captures(output) {
            Some(c) => Some(c[1].trim_end_matches('.').to_string()),
            None => {
                static DOTTED: OnceLock<Regex> = OnceLock::new();
                let re = DOTTED.get_or_init(|| ci_regex(r"(\d+\.\d+(?:\.\d+)?)"));
                re.captures(output).map(|c| c[1].to_string())
            }
        }
    }

    fn parse_stats(&self, stdout: &str) -> SolverStats {
        let mut stats = generic_stats(stdout);
        static CONFLICT_LITERALS: OnceLock<Regex> = OnceLock::new();
        let re =
            CONFLICT_LITERALS.get_or_init(|| ci_regex(r"conflict\s*literals\s*[:\s]+(\d+)"));
        if let Some(c) = re.captures(stdout) {
            if let Ok(v) = c[1].parse() {
                stats
                    .extra
                    .insert("conflict_literals".to_string(), StatValue::Int(v));
            }
        }
        static DELETED_PCT: OnceLock<Regex> = OnceLock::new();
        let re = DELETED_PCT.get_or_init(|| ci_regex(r"(\d+(?:\.\d+)?)\s*%\s*deleted"));
        if let Some(c) = re.captures(stdout) {
            if let Ok(v) = c[1].parse() {
                stats
                    .extra
                    .insert("literals_deleted_pct".to_string(), StatValue::Real(v));
            }
        }
        stats
    }

    fn install(&self, solvers_root: &Path) -> InstallOutcome {
        let mut log = BuildLog::new();
        if let Err(out) = require_deps(&["git", "make", "g++"]) {
            return out;
        }
        let dir = self.solver_dir(solvers_root);
        if let Err(out) =
            clone_if_missing("https://github.com/niklasso/minisat.git", &dir, &mut log)
        {
            return out;
        }

        // Release build first, debug build as fallback, then the simp variant.
        let (rc, out, err) = run_shell("make -C core rs", Some(&dir), BUILD_TIMEOUT);
        log.step("make core rs", rc, &out, &err);
        if rc != 0 {
            let (rc, out, err) = run_shell("make -C core", Some(&dir), BUILD_TIMEOUT);
            log.step("make core", rc, &out, &err);
        }
        if !self.is_installed(solvers_root) {
            let (rc, out, err) = run_shell("make -C simp rs", Some(&dir), BUILD_TIMEOUT);
            log.step("make simp rs", rc, &out, &err);
        }
        finish(self, solvers_root, log)
    }
}

// ── CaDiCaL ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Cadical {
    version_cache: VersionCache,
}

impl SolverAdapter for Cadical {
    fn key(&self) -> &'static str {
        "cadical"
    }

    fn name(&self) -> &'static str {
        "CaDiCaL"
    }

    fn default_version(&self) -> &'static str {
        "1.9.5"
    }

    fn description(&self) -> &'static str {
        "CaDiCaL — a clean, documented CDCL solver in C++ designed to be \
         easy to understand and modify while staying competitive."
    }

    fn website(&self) -> &'static str {
        "https://github.com/arminbiere/cadical"
    }

    fn features(&self) -> &'static [&'static str] {
        &[
            "CDCL",
            "Inprocessing",
            "Bounded variable elimination",
            "Blocked clause elimination",
            "Probing",
            "Incremental solving",
        ]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            preprocessing: true,
            inprocessing: true,
            incremental: true,
            best_for: &["Incremental use", "Model checking"],
            performance_class: "State of the art",
            ..Capabilities::default()
        }
    }

    fn executable_path(&self, solvers_root: &Path) -> PathBuf {
        self.solver_dir(solvers_root).join("build").join("cadical")
    }

    fn version_cache(&self) -> &VersionCache {
        &self.version_cache
    }

    fn install(&self, solvers_root: &Path) -> InstallOutcome {
        let mut log = BuildLog::new();
        if let Err(out) = require_deps(&["git", "make", "g++"]) {
            return out;
        }
        let dir = self.solver_dir(solvers_root);
        if let Err(out) =
            clone_if_missing("https://github.com/arminbiere/cadical.git", &dir, &mut log)
        {
            return out;
        }
        let (rc, out, err) = run_shell("./configure && make", Some(&dir), BUILD_TIMEOUT);
        log.step("configure+make", rc, &out, &err);
        finish(self, solvers_root, log)
    }
}

// ── CryptoMiniSat ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct CryptoMinisat {
    version_cache: VersionCache,
}

impl SolverAdapter for CryptoMinisat {
    fn key(&self) -> &'static str {
        "cryptominisat"
    }

    fn name(&self) -> &'static str {
        "CryptoMiniSat"
    }

    fn default_version(&self) -> &'static str {
        "5.11.4"
    }

    fn description(&self) -> &'static str {
        "CryptoMiniSat — CDCL solver with native XOR reasoning and Gaussian \
         elimination, aimed at cryptographic problem encodings."
    }

    fn website(&self) -> &'static str {
        "https://github.com/msoos/cryptominisat"
    }

    fn features(&self) -> &'static [&'static str] {
        &[
            "CDCL + XOR",
            "Gaussian elimination",
            "Inprocessing",
            "Parallel solving",
            "Incremental solving",
        ]
    }

    fn category(&self) -> SolverCategory {
        SolverCategory::Specialised
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            solver_type: "CDCL + XOR",
            preprocessing: true,
            inprocessing: true,
            parallel: true,
            incremental: true,
            best_for: &["Cryptographic instances", "XOR-heavy encodings"],
            performance_class: "Specialised",
            ..Capabilities::default()
        }
    }

    fn executable_path(&self, solvers_root: &Path) -> PathBuf {
        self.solver_dir(solvers_root)
            .join("build")
            .join("cryptominisat5")
    }

    fn version_cache(&self) -> &VersionCache {
        &self.version_cache
    }

    fn parse_stats(&self, stdout: &str) -> SolverStats {
        let mut stats = generic_stats(stdout);
        static XOR_CLAUSES: OnceLock<Regex> = OnceLock::new();
        let re = XOR_CLAUSES.get_or_init(|| ci_regex(r"xor\s*clauses\s*[:\s]+(\d+)"));
        if let Some(c) = re.captures(stdout) {
            if let Ok(v) = c[1].parse() {
                stats
                    .extra
                    .insert("xor_clauses".to_string(), StatValue::Int(v));
            }
        }
        stats
    }

    fn install(&self, solvers_root: &Path) -> InstallOutcome {
        let mut log = BuildLog::new();
        if let Err(out) = require_deps(&["git", "make", "g++", "cmake"]) {
            return out;
        }
        let dir = self.solver_dir(solvers_root);
        if let Err(out) =
            clone_if_missing("https://github.com/msoos/cryptominisat.git", &dir, &mut log)
        {
            return out;
        }
        let (rc, out, err) = run_shell(
            "mkdir -p build && cd build && cmake -DCMAKE_BUILD_TYPE=Release .. && make",
            Some(&dir),
            BUILD_TIMEOUT,
        );
        log.step("cmake+make", rc, &out, &err);
        finish(self, solvers_root, log)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
