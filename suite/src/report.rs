// report.rs — Labelled data series for presentation layers.
//
// Every builder is a pure function of run rows plus the experiment timeout;
// rendering the series into images is a downstream concern. Series cover
// the standard SAT-competition plots: cactus, ECDF, survival, Dolan-Moré
// performance profile, pairwise scatter, heatmap, PAR-2 bars, and the
// critical-difference diagram.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::metrics::{solver_names, time_matrix};
use crate::numeric::nemenyi_critical_value;
use crate::store::RunDetails;

// ── Cactus ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CactusSeries {
    pub solver: String,
    /// Sorted wall times of solved runs; index+1 is "instances solved".
    pub times: Vec<f64>,
}

pub fn cactus(runs: &[RunDetails]) -> Vec<CactusSeries> {
    solver_names(runs)
        .into_iter()
        .map(|solver| {
            let mut times: Vec<f64> = runs
                .iter()
                .filter(|r| r.solver_name == solver && r.record.outcome.solved())
                .map(|r| r.record.wall_seconds)
                .collect();
            times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            CactusSeries { solver, times }
        })
        .collect()
}

// ── ECDF and survival ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StepSeries {
    pub solver: String,
    /// Step points (t, fraction); step function is right-continuous.
    pub points: Vec<(f64, f64)>,
    pub solved: usize,
    pub total: usize,
}

/// Fraction of a solver's runs finished within t, anchored at (0, 0) and
/// (T, solved/total). Unsolved runs never contribute a step.
pub fn ecdf(runs: &[RunDetails], timeout: f64) -> Vec<StepSeries> {
    solver_names(runs)
        .into_iter()
        .map(|solver| {
            let total = runs.iter().filter(|r| r.solver_name == solver).count();
            let mut times: Vec<f64> = runs
                .iter()
                .filter(|r| r.solver_name == solver && r.record.outcome.solved())
                .map(|r| r.record.wall_seconds)
                .collect();
            times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let mut points = vec![(0.0, 0.0)];
            for (i, t) in times.iter().enumerate() {
                points.push((*t, (i + 1) as f64 / total.max(1) as f64));
            }
            let solved = times.len();
            points.push((timeout, solved as f64 / total.max(1) as f64));
            StepSeries {
                solver,
                points,
                solved,
                total,
            }
        })
        .collect()
}

/// 1 − ECDF.
pub fn survival(runs: &[RunDetails], timeout: f64) -> Vec<StepSeries> {
    ecdf(runs, timeout)
        .into_iter()
        .map(|mut series| {
            for point in &mut series.points {
                point.1 = 1.0 - point.1;
            }
            series
        })
        .collect()
}

// ── Performance profile (Dolan-Moré) ────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSeries {
    pub solver: String,
    /// (τ, ρ_s(τ)) over a log-spaced τ grid.
    pub points: Vec<(f64, f64)>,
}

/// ρ_s(τ) = fraction of instances where solver s is within factor τ of the
/// per-instance best (penalised) time. Only instances with a run for every
/// solver participate.
pub fn performance_profile(
    runs: &[RunDetails],
    timeout: f64,
    tau_max: f64,
) -> Vec<ProfileSeries> {
    let (matrix, solvers, _) = time_matrix(runs, timeout);
    if matrix.is_empty() {
        return Vec::new();
    }

    let ratios: Vec<Vec<f64>> = matrix
        .iter()
        .map(|row| {
            let best = row.iter().cloned().fold(f64::INFINITY, f64::min).max(1e-9);
            row.iter().map(|t| t / best).collect()
        })
        .collect();

    let grid = log_grid(1.0, tau_max.max(1.0 + 1e-9), 100);
    solvers
        .into_iter()
        .enumerate()
        .map(|(s, solver)| {
            let points = grid
                .iter()
                .map(|&tau| {
                    let within = ratios.iter().filter(|row| row[s] <= tau).count();
                    (tau, within as f64 / ratios.len() as f64)
                })
                .collect();
            ProfileSeries { solver, points }
        })
        .collect()
}

fn log_grid(lo: f64, hi: f64, steps: usize) -> Vec<f64> {
    let (ln_lo, ln_hi) = (lo.ln(), hi.ln());
    (0..steps)
        .map(|i| (ln_lo + (ln_hi - ln_lo) * i as f64 / (steps - 1) as f64).exp())
        .collect()
}

// ── Scatter ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ScatterData {
    pub solver1: String,
    pub solver2: String,
    /// (t1, t2) penalised times on common instances.
    pub points: Vec<(f64, f64)>,
    pub instances: Vec<String>,
    pub solver1_wins: usize,
    pub solver2_wins: usize,
}

pub fn scatter(
    runs: &[RunDetails],
    solver1: &str,
    solver2: &str,
    timeout: f64,
) -> ScatterData {
    let (t1, t2, instances) = crate::metrics::paired_times(runs, solver1, solver2, timeout);
    let solver1_wins = t1.iter().zip(&t2).filter(|(a, b)| a < b).count();
    let solver2_wins = t1.iter().zip(&t2).filter(|(a, b)| a > b).count();
    ScatterData {
        solver1: solver1.to_string(),
        solver2: solver2.to_string(),
        points: t1.into_iter().zip(t2).collect(),
        instances,
        solver1_wins,
        solver2_wins,
    }
}

/// Every unordered solver pair.
pub fn all_scatters(runs: &[RunDetails], timeout: f64) -> Vec<ScatterData> {
    let solvers = solver_names(runs);
    let mut out = Vec::new();
    for i in 0..solvers.len() {
        for j in i + 1..solvers.len() {
            out.push(scatter(runs, &solvers[i], &solvers[j], timeout));
        }
    }
    out
}

// ── Heatmap ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapData {
    pub solvers: Vec<String>,
    pub instances: Vec<String>,
    /// `values[instance][solver]` penalised wall time.
    pub values: Vec<Vec<f64>>,
}

pub fn heatmap(runs: &[RunDetails], timeout: f64) -> HeatmapData {
    let solvers = solver_names(runs);
    let penalty = 2.0 * timeout;
    let instances: Vec<String> = runs
        .iter()
        .map(|r| r.instance_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let values = instances
        .iter()
        .map(|instance| {
            solvers
                .iter()
                .map(|solver| {
                    runs.iter()
                        .find(|r| &r.solver_name == solver && &r.instance_name == instance)
                        .map(|r| {
                            if r.record.outcome.solved() {
                                r.record.wall_seconds
                            } else {
                                penalty
                            }
                        })
                        .unwrap_or(penalty)
                })
                .collect()
        })
        .collect();

    HeatmapData {
        solvers,
        instances,
        values,
    }
}

// ── PAR-2 bars ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Par2Bar {
    pub solver: String,
    pub par2: f64,
}

pub fn par2_bars(runs: &[RunDetails], timeout: f64) -> Vec<Par2Bar> {
    let penalty = 2.0 * timeout;
    let mut bars: Vec<Par2Bar> = solver_names(runs)
        .into_iter()
        .map(|solver| {
            let mine: Vec<&RunDetails> =
                runs.iter().filter(|r| r.solver_name == solver).collect();
            let total: f64 = mine
                .iter()
                .map(|r| {
                    if r.record.outcome.solved() {
                        r.record.wall_seconds
                    } else {
                        penalty
                    }
                })
                .sum();
            Par2Bar {
                solver,
                par2: if mine.is_empty() {
                    0.0
                } else {
                    total / mine.len() as f64
                },
            }
        })
        .collect();
    bars.sort_by(|a, b| a.par2.partial_cmp(&b.par2).unwrap_or(std::cmp::Ordering::Equal));
    bars
}

// ── Critical-difference diagram ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CriticalDifferenceDiagram {
    pub alpha: f64,
    pub critical_difference: f64,
    /// (solver, average rank), best rank first.
    pub average_ranks: Vec<(String, f64)>,
    /// Maximal groups of solvers whose ranks all lie within CD of each
    /// other (the connecting bars of the diagram).
    pub cliques: Vec<Vec<String>>,
}

pub fn critical_difference_diagram(
    runs: &[RunDetails],
    timeout: f64,
    alpha: f64,
) -> Option<CriticalDifferenceDiagram> {
    let (matrix, solvers, _) = time_matrix(runs, timeout);
    let n = matrix.len();
    let k = solvers.len();
    if n == 0 || k < 2 {
        return None;
    }
    let q = nemenyi_critical_value(k, alpha)?;
    let cd = q * (k as f64 * (k as f64 + 1.0) / (6.0 * n as f64)).sqrt();

    let mut rank_sums = vec![0.0; k];
    for row in &matrix {
        let ranks = crate::numeric::average_ranks(row);
        for (sum, r) in rank_sums.iter_mut().zip(&ranks) {
            *sum += r;
        }
    }
    let mut ordered: Vec<(String, f64)> = solvers
        .into_iter()
        .zip(rank_sums.iter().map(|s| s / n as f64))
        .collect();
    ordered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    Some(CriticalDifferenceDiagram {
        alpha,
        critical_difference: cd,
        cliques: maximal_cliques(&ordered, cd),
        average_ranks: ordered,
    })
}

/// With ranks sorted ascending, the groups-within-CD form intervals; emit
/// each maximal interval of length ≥ 2.
fn maximal_cliques(ordered: &[(String, f64)], cd: f64) -> Vec<Vec<String>> {
    let k = ordered.len();
    let mut intervals: Vec<(usize, usize)> = Vec::new();
    for i in 0..k {
        let mut j = i;
        while j + 1 < k && ordered[j + 1].1 - ordered[i].1 <= cd {
            j += 1;
        }
        if j > i {
            intervals.push((i, j));
        }
    }
    // Drop intervals contained in an earlier, wider one.
    let mut cliques = Vec::new();
    let mut covered_until = 0usize;
    for (i, j) in intervals {
        if j + 1 > covered_until {
            cliques.push(
                ordered[i..=j]
                    .iter()
                    .map(|(name, _)| name.clone())
                    .collect(),
            );
            covered_until = j + 1;
        }
    }
    cliques
}

// ── Tests ───────────────────────────────────────────────────────────────
