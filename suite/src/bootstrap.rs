// bootstrap.rs — Percentile and BCa bootstrap confidence intervals.
//
// Seeded, so every run of the same analysis reproduces the same intervals.
// Each public interval method draws from a fresh RNG seeded with the
// engine's seed, which makes individual intervals independent of call
// order. The engine is pure: callers feed it plain arrays (a thin adapter
// turns run rows into those arrays).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::numeric::{mean, median, normal_cdf, normal_quantile, percentile, std_dev};
use crate::store::RunDetails;

pub const DEFAULT_REPLICATES: usize = 10_000;
pub const DEFAULT_SEED: u64 = 42;

/// Clamp for the bias-correction proportion.
const Z0_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapResult {
    pub statistic: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub confidence_level: f64,
    pub n_bootstrap: usize,
    pub std_error: f64,
    pub bias: f64,
    pub method: &'static str,
}

impl BootstrapResult {
    pub fn ci_width(&self) -> f64 {
        self.ci_upper - self.ci_lower
    }

    /// The interval excludes zero.
    pub fn excludes_zero(&self) -> bool {
        !(self.ci_lower <= 0.0 && 0.0 <= self.ci_upper)
    }
}

pub struct BootstrapEngine {
    n_bootstrap: usize,
    seed: u64,
}

impl Default for BootstrapEngine {
    fn default() -> Self {
        BootstrapEngine {
            n_bootstrap: DEFAULT_REPLICATES,
            seed: DEFAULT_SEED,
        }
    }
}

impl BootstrapEngine {
    pub fn new(n_bootstrap: usize, seed: u64) -> Self {
        BootstrapEngine {
            n_bootstrap: n_bootstrap.max(1),
            seed,
        }
    }

    fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// Statistics of `n_bootstrap` resamples of `data`.
    fn resample_statistics(&self, data: &[f64], statistic: &dyn Fn(&[f64]) -> f64) -> Vec<f64> {
        let n = data.len();
        let mut rng = self.rng();
        let mut sample = vec![0.0; n];
        let mut stats = Vec::with_capacity(self.n_bootstrap);
        for _ in 0..self.n_bootstrap {
            for slot in sample.iter_mut() {
                *slot = data[rng.gen_range(0..n)];
            }
            stats.push(statistic(&sample));
        }
        stats
    }

    // ── Percentile interval ─────────────────────────────────────────────

    pub fn percentile_ci(
        &self,
        data: &[f64],
        statistic: &dyn Fn(&[f64]) -> f64,
        confidence: f64,
    ) -> BootstrapResult {
        let observed = statistic(data);
        let boot = self.resample_statistics(data, statistic);
        let alpha = (1.0 - confidence) / 2.0;
        BootstrapResult {
            statistic: observed,
            ci_lower: percentile(&boot, alpha * 100.0),
            ci_upper: percentile(&boot, (1.0 - alpha) * 100.0),
            confidence_level: confidence,
            n_bootstrap: self.n_bootstrap,
            std_error: std_dev(&boot),
            bias: mean(&boot) - observed,
            method: "percentile",
        }
    }

    // ── BCa interval ────────────────────────────────────────────────────

    /// Bias-corrected and accelerated interval. Falls back to the plain
    /// percentile quantiles when the adjustment is numerically unusable.
    pub fn bca_ci(
        &self,
        data: &[f64],
        statistic: &dyn Fn(&[f64]) -> f64,
        confidence: f64,
    ) -> BootstrapResult {
        let n = data.len();
        let observed = statistic(data);
        let boot = self.resample_statistics(data, statistic);

        // Bias correction from the proportion of resamples below the
        // observed statistic.
        let below = boot.iter().filter(|b| **b < observed).count() as f64;
        let prop = (below / boot.len() as f64).clamp(Z0_EPSILON, 1.0 - Z0_EPSILON);
        let z0 = normal_quantile(prop);

        // Acceleration from the leave-one-out jackknife.
        let mut jackknife = Vec::with_capacity(n);
        let mut held_out = Vec::with_capacity(n - 1);
        for i in 0..n {
            held_out.clear();
            held_out.extend(data.iter().take(i).chain(data.iter().skip(i + 1)));
            jackknife.push(statistic(&held_out));
        }
        let jack_mean = mean(&jackknife);
        let cubes: f64 = jackknife.iter().map(|j| (jack_mean - j).powi(3)).sum();
        let squares: f64 = jackknife.iter().map(|j| (jack_mean - j).powi(2)).sum();
        let denom = 6.0 * squares.powf(1.5);
        let accel = if denom.abs() < 1e-10 { 0.0 } else { cubes / denom };

        let alpha = (1.0 - confidence) / 2.0;
        let adjust = |z_alpha: f64| -> f64 {
            let num = z0 + z_alpha;
            normal_cdf(z0 + num / (1.0 - accel * num))
        };
        let q_lower = adjust(normal_quantile(alpha));
        let q_upper = adjust(normal_quantile(1.0 - alpha));

        let (lower_pct, upper_pct) = if q_lower.is_finite() && q_upper.is_finite() {
            (
                q_lower.clamp(0.001, 0.999) * 100.0,
                q_upper.clamp(0.001, 0.999) * 100.0,
            )
        } else {
            (alpha * 100.0, (1.0 - alpha) * 100.0)
        };

        BootstrapResult {
            statistic: observed,
            ci_lower: percentile(&boot, lower_pct),
            ci_upper: percentile(&boot, upper_pct),
            confidence_level: confidence,
            n_bootstrap: self.n_bootstrap,
            std_error: std_dev(&boot),
            bias: mean(&boot) - observed,
            method: "bca",
        }
    }

    // ── Named intervals ─────────────────────────────────────────────────

    pub fn ci_mean(&self, data: &[f64], confidence: f64) -> BootstrapResult {
        self.bca_ci(data, &mean, confidence)
    }

    pub fn ci_median(&self, data: &[f64], confidence: f64) -> BootstrapResult {
        self.bca_ci(data, &median, confidence)
    }

    /// PAR-2 interval: resamples (wall, solved) pairs and recomputes the
    /// penalised mean per resample.
    pub fn ci_par2(
        &self,
        walls: &[f64],
        solved: &[bool],
        timeout: f64,
        confidence: f64,
    ) -> BootstrapResult {
        debug_assert_eq!(walls.len(), solved.len());
        let penalty = 2.0 * timeout;
        let penalised: Vec<f64> = walls
            .iter()
            .zip(solved)
            .map(|(w, s)| if *s { *w } else { penalty })
            .collect();
        let mut result = self.percentile_ci(&penalised, &mean, confidence);
        result.method = "percentile_par2";
        result
    }

    /// Interval for the mean paired difference (solver1 − solver2).
    /// Significance at the confidence level is `excludes_zero()`.
    pub fn ci_difference(&self, data1: &[f64], data2: &[f64], confidence: f64) -> BootstrapResult {
        debug_assert_eq!(data1.len(), data2.len());
        let diffs: Vec<f64> = data1.iter().zip(data2).map(|(a, b)| a - b).collect();
        let mut result = self.percentile_ci(&diffs, &mean, confidence);
        result.method = "paired_difference";
        result
    }

    /// Binomial proportion interval via a 0/1 resample.
    pub fn ci_solve_rate(&self, solved: usize, total: usize, confidence: f64) -> BootstrapResult {
        let data: Vec<f64> = (0..total)
            .map(|i| if i < solved { 1.0 } else { 0.0 })
            .collect();
        let mut result = self.percentile_ci(&data, &mean, confidence);
        result.method = "solve_rate";
        result
    }

    // ── Full per-solver report ──────────────────────────────────────────

    pub fn solver_report(
        &self,
        runs: &[RunDetails],
        timeout: f64,
        confidence: f64,
    ) -> BootstrapReport {
        let solvers = crate::metrics::solver_names(runs);
        let mut per_solver = BTreeMap::new();
        for solver in &solvers {
            let mine: Vec<&RunDetails> =
                runs.iter().filter(|r| &r.solver_name == solver).collect();
            let solved_times: Vec<f64> = mine
                .iter()
                .filter(|r| r.record.outcome.solved())
                .map(|r| r.record.wall_seconds)
                .collect();
            let walls: Vec<f64> = mine.iter().map(|r| r.record.wall_seconds).collect();
            let solved_flags: Vec<bool> =
                mine.iter().map(|r| r.record.outcome.solved()).collect();

            per_solver.insert(
                solver.clone(),
                SolverBootstrap {
                    mean_time: (solved_times.len() >= 3)
                        .then(|| self.ci_mean(&solved_times, confidence)),
                    median_time: (solved_times.len() >= 3)
                        .then(|| self.ci_median(&solved_times, confidence)),
                    par2: self.ci_par2(&walls, &solved_flags, timeout, confidence),
                    solve_rate: self.ci_solve_rate(solved_times.len(), mine.len(), confidence),
                },
            );
        }

        let mut pairwise = BTreeMap::new();
        for i in 0..solvers.len() {
            for j in i + 1..solvers.len() {
                let (t1, t2, common) =
                    crate::metrics::paired_times(runs, &solvers[i], &solvers[j], timeout);
                if common.len() < 3 {
                    continue;
                }
                let interval = self.ci_difference(&t1, &t2, confidence);
                pairwise.insert(
                    format!("{}_vs_{}", solvers[i], solvers[j]),
                    PairedDifference {
                        significant: interval.excludes_zero(),
                        faster_solver: if interval.statistic < 0.0 {
                            solvers[i].clone()
                        } else {
                            solvers[j].clone()
                        },
                        n_common: common.len(),
                        interval,
                    },
                );
            }
        }

        BootstrapReport {
            per_solver,
            pairwise_differences: pairwise,
            confidence_level: confidence,
            n_bootstrap: self.n_bootstrap,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SolverBootstrap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_time: Option<BootstrapResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_time: Option<BootstrapResult>,
    pub par2: BootstrapResult,
    pub solve_rate: BootstrapResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairedDifference {
    pub interval: BootstrapResult,
    pub significant: bool,
    pub faster_solver: String,
    pub n_common: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub per_solver: BTreeMap<String, SolverBootstrap>,
    pub pairwise_differences: BTreeMap<String, PairedDifference>,
    pub confidence_level: f64,
    pub n_bootstrap: usize,
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> BootstrapEngine {
        BootstrapEngine::new(2000, DEFAULT_SEED)
    }

    /// Deterministic, roughly normal sample from evenly spaced quantiles.
    fn normalish(n: usize, loc: f64, scale: f64) -> Vec<f64> {
        (1..=n)
            .map(|i| loc + scale * normal_quantile(i as f64 / (n as f64 + 1.0)))
            .collect()
    }

    #[test]
    fn constant_data_gives_zero_width() {
        let data = vec![3.0; 20];
        let result = engine().percentile_ci(&data, &mean, 0.95);
        assert_eq!(result.statistic, 3.0);
        assert_eq!(result.ci_lower, 3.0);
        assert_eq!(result.ci_upper, 3.0);
        assert!(result.ci_width() == 0.0);
    }

    #[test]
    fn interval_brackets_the_observed_mean() {
        let data = normalish(50, 10.0, 2.0);
        for result in [
            engine().percentile_ci(&data, &mean, 0.95),
            engine().ci_mean(&data, 0.95),
        ] {
            assert!(result.ci_lower <= result.statistic);
            assert!(result.statistic <= result.ci_upper);
            assert!(result.ci_width() > 0.0);
        }
    }

    #[test]
    fn same_seed_reproduces_interval() {
        let data = normalish(30, 5.0, 1.0);
        let a = BootstrapEngine::new(1000, 7).ci_mean(&data, 0.95);
        let b = BootstrapEngine::new(1000, 7).ci_mean(&data, 0.95);
        assert_eq!(a.ci_lower, b.ci_lower);
        assert_eq!(a.ci_upper, b.ci_upper);
        let c = BootstrapEngine::new(1000, 8).ci_mean(&data, 0.95);
        assert_ne!(a.ci_lower, c.ci_lower);
    }

    #[test]
    fn bca_close_to_parametric_on_gaussian_data() {
        // On symmetric data the BCa interval converges to the parametric
        // normal CI; a 20% band is generous at B = 2000.
        let data = normalish(200, 0.0, 1.0);
        let result = BootstrapEngine::new(2000, DEFAULT_SEED).ci_mean(&data, 0.95);
        let parametric = 2.0 * 1.959964 * std_dev(&data) / (data.len() as f64).sqrt();
        let relative = (result.ci_width() - parametric).abs() / parametric;
        assert!(relative < 0.2, "width {} vs parametric {parametric}", result.ci_width());
    }

    #[test]
    fn clear_difference_is_significant() {
        let t1 = normalish(20, 1.0, 0.2);
        let t2 = normalish(20, 5.0, 0.2);
        let result = engine().ci_difference(&t1, &t2, 0.95);
        assert!(result.statistic < 0.0);
        assert!(result.excludes_zero());
    }

    #[test]
    fn no_difference_is_insignificant() {
        let t = normalish(20, 2.0, 1.0);
        let result = engine().ci_difference(&t, &t, 0.95);
        assert_eq!(result.statistic, 0.0);
        assert!(!result.excludes_zero());
    }

    #[test]
    fn par2_interval_reflects_penalties() {
        let walls = vec![1.0, 2.0, 5.0, 5.0];
        let solved = vec![true, true, false, false];
        let result = engine().ci_par2(&walls, &solved, 5.0, 0.95);
        // Observed PAR-2: (1 + 2 + 10 + 10)/4 = 5.75.
        assert!((result.statistic - 5.75).abs() < 1e-9);
        assert_eq!(result.method, "percentile_par2");
        assert!(result.ci_upper <= 10.0);
    }

    #[test]
    fn solve_rate_stays_in_unit_interval() {
        let result = engine().ci_solve_rate(7, 10, 0.95);
        assert!((result.statistic - 0.7).abs() < 1e-9);
        assert!(result.ci_lower >= 0.0);
        assert!(result.ci_upper <= 1.0);
        assert!(result.ci_lower <= 0.7 && 0.7 <= result.ci_upper);
    }

    #[test]
    fn solver_report_covers_all_solvers_and_pairs() {
        use crate::adapter::SolverStats;
        use crate::executor::{Outcome, RunRecord};
        use crate::store::RunDetails;

        let run = |solver: &str, instance: &str, outcome: Outcome, wall: f64| RunDetails {
            run_id: 0,
            experiment_id: 1,
            solver_id: 0,
            instance_id: 0,
            solver_name: solver.to_string(),
            instance_name: instance.to_string(),
            family: "x".to_string(),
            record: RunRecord {
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
                timestamp: String::new(),
            },
        };

        let mut runs = Vec::new();
        for i in 0..6 {
            runs.push(run("A", &format!("i{i}"), Outcome::Sat, 1.0 + i as f64 * 0.1));
            runs.push(run("B", &format!("i{i}"), Outcome::Sat, 3.0 + i as f64 * 0.1));
        }
        let report = BootstrapEngine::new(500, DEFAULT_SEED).solver_report(&runs, 5.0, 0.95);
        assert_eq!(report.per_solver.len(), 2);
        assert!(report.per_solver["A"].mean_time.is_some());
        let pair = &report.pairwise_differences["A_vs_B"];
        assert_eq!(pair.faster_solver, "A");
        assert!(pair.significant);
        assert_eq!(pair.n_common, 6);
    }
}
