// metrics.rs — Competition-standard benchmark metrics.
//
// Pure functions over joined run rows for one experiment: per-solver
// summaries, PAR-k scores, Virtual Best Solver analysis, the solve matrix,
// per-family breakdowns, and the overall ranking (lexicographic by solved
// count, then PAR-2). Penalised scores are recomputed here from outcomes and
// the experiment timeout; stored values are never trusted.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::executor::Outcome;
use crate::numeric::{mean, median, percentile, std_dev};
use crate::store::RunDetails;

/// Floor for VBS ratio denominators.
const VBS_EPSILON: f64 = 1e-3;

// ── Report types ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TimeStats {
    pub mean: f64,
    pub median: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    pub q1: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolverSummary {
    pub solver: String,
    pub solved: usize,
    pub total: usize,
    pub sat: usize,
    pub unsat: usize,
    pub timeout: usize,
    pub memout: usize,
    pub error: usize,
    pub unknown: usize,
    /// Percentage of runs solved.
    pub solve_rate: f64,
    /// Statistics over solved runs only; absent when nothing was solved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub times: Option<TimeStats>,
    pub par2: f64,
    pub par10: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParRankEntry {
    pub rank: usize,
    pub solver: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParScores {
    pub par2: BTreeMap<String, f64>,
    pub par10: BTreeMap<String, f64>,
    pub par2_ranking: Vec<ParRankEntry>,
    pub par10_ranking: Vec<ParRankEntry>,
    pub best_par2: Option<String>,
    pub best_par10: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VbsContribution {
    pub solver: String,
    /// Instances where this solver is strictly fastest.
    pub unique_wins: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VbsAnalysis {
    /// Instances solved by at least one solver.
    pub vbs_solved: usize,
    pub vbs_par2: f64,
    pub total_instances: usize,
    pub individual_solved: BTreeMap<String, usize>,
    pub contributions: Vec<VbsContribution>,
    /// Median over instances of solver time / VBS time.
    pub gap_to_vbs: BTreeMap<String, f64>,
    /// Instances the portfolio solves beyond the best single solver.
    pub marginal_value: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveMatrix {
    pub unique_solved: BTreeMap<String, usize>,
    pub all_solved: usize,
    pub none_solved: usize,
    pub total_instances: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilySolverStats {
    pub solved: usize,
    pub total: usize,
    pub solve_rate: f64,
    pub par2: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyBreakdown {
    pub num_instances: usize,
    pub solvers: BTreeMap<String, FamilySolverStats>,
    pub best_solver: String,
    pub best_par2: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub solver: String,
    pub solved: usize,
    pub par2: f64,
    pub par10: f64,
    pub solve_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub summary_per_solver: BTreeMap<String, SolverSummary>,
    pub par_scores: ParScores,
    pub vbs: VbsAnalysis,
    pub solve_matrix: SolveMatrix,
    pub family_breakdown: BTreeMap<String, FamilyBreakdown>,
    pub ranking: Vec<RankingEntry>,
    pub timeout_seconds: f64,
    pub num_solvers: usize,
    pub num_instances: usize,
    pub total_runs: usize,
}

/// Explicit sentinel so "no data" is distinguishable from an all-zero report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricsResult {
    Empty,
    Report(Box<MetricsReport>),
}

// ── Entry point ─────────────────────────────────────────────────────────

pub fn compute_metrics(runs: &[RunDetails], timeout_seconds: f64) -> MetricsResult {
    if runs.is_empty() {
        return MetricsResult::Empty;
    }

    let solvers = solver_names(runs);
    let instances: BTreeSet<&str> = runs.iter().map(|r| r.instance_name.as_str()).collect();

    let mut summaries = BTreeMap::new();
    for solver in &solvers {
        summaries.insert(solver.clone(), summarise(runs, solver, timeout_seconds));
    }

    MetricsResult::Report(Box::new(MetricsReport {
        par_scores: par_scores(&summaries),
        vbs: vbs_analysis(runs, &solvers, timeout_seconds),
        solve_matrix: solve_matrix(runs, &solvers),
        family_breakdown: family_breakdown(runs, timeout_seconds),
        ranking: ranking(&summaries),
        timeout_seconds,
        num_solvers: solvers.len(),
        num_instances: instances.len(),
        total_runs: runs.len(),
        summary_per_solver: summaries,
    }))
}

pub fn solver_names(runs: &[RunDetails]) -> Vec<String> {
    let mut names: Vec<String> = runs
        .iter()
        .map(|r| r.solver_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    names.sort();
    names
}

// ── Per-solver summaries ────────────────────────────────────────────────

fn summarise(runs: &[RunDetails], solver: &str, timeout: f64) -> SolverSummary {
    let mine: Vec<&RunDetails> = runs.iter().filter(|r| r.solver_name == solver).collect();
    let count = |o: Outcome| mine.iter().filter(|r| r.record.outcome == o).count();

    let solved_times: Vec<f64> = mine
        .iter()
        .filter(|r| r.record.outcome.solved())
        .map(|r| r.record.wall_seconds)
        .collect();

    let times = if solved_times.is_empty() {
        None
    } else {
        Some(TimeStats {
            mean: mean(&solved_times),
            median: median(&solved_times),
            std: if solved_times.len() > 1 {
                Some(std_dev(&solved_times))
            } else {
                None
            },
            q1: percentile(&solved_times, 25.0),
            q3: percentile(&solved_times, 75.0),
            min: solved_times.iter().cloned().fold(f64::INFINITY, f64::min),
            max: solved_times.iter().cloned().fold(0.0, f64::max),
            sum: solved_times.iter().sum(),
        })
    };

    let total = mine.len();
    let solved = solved_times.len();
    SolverSummary {
        solver: solver.to_string(),
        solved,
        total,
        sat: count(Outcome::Sat),
        unsat: count(Outcome::Unsat),
        timeout: count(Outcome::Timeout),
        memout: count(Outcome::Memout),
        error: count(Outcome::Error),
        unknown: count(Outcome::Unknown),
        solve_rate: if total > 0 {
            solved as f64 / total as f64 * 100.0
        } else {
            0.0
        },
        times,
        par2: par_k(&mine, 2.0, timeout),
        par10: par_k(&mine, 10.0, timeout),
    }
}

/// PAR-k: mean over runs of (wall if solved, k·T otherwise).
fn par_k(runs: &[&RunDetails], k: f64, timeout: f64) -> f64 {
    if runs.is_empty() {
        return 0.0;
    }
    let total: f64 = runs
        .iter()
        .map(|r| {
            if r.record.outcome.solved() {
                r.record.wall_seconds
            } else {
                k * timeout
            }
        })
        .sum();
    total / runs.len() as f64
}

fn par_scores(summaries: &BTreeMap<String, SolverSummary>) -> ParScores {
    let rank_by = |score: fn(&SolverSummary) -> f64| -> Vec<ParRankEntry> {
        let mut entries: Vec<(&String, f64)> =
            summaries.iter().map(|(name, s)| (name, score(s))).collect();
        entries.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (solver, score))| ParRankEntry {
                rank: i + 1,
                solver: solver.clone(),
                score,
            })
            .collect()
    };

    let par2_ranking = rank_by(|s| s.par2);
    let par10_ranking = rank_by(|s| s.par10);
    ParScores {
        par2: summaries.iter().map(|(n, s)| (n.clone(), s.par2)).collect(),
        par10: summaries
            .iter()
            .map(|(n, s)| (n.clone(), s.par10))
            .collect(),
        best_par2: par2_ranking.first().map(|e| e.solver.clone()),
        best_par10: par10_ranking.first().map(|e| e.solver.clone()),
        par2_ranking,
        par10_ranking,
    }
}

// ── Virtual Best Solver ─────────────────────────────────────────────────

/// Penalised time of one solver on one instance; missing runs are treated
/// as unsolved.
fn penalised_table(
    runs: &[RunDetails],
    solvers: &[String],
    timeout: f64,
) -> BTreeMap<String, Vec<(f64, bool)>> {
    let penalty = 2.0 * timeout;
    let instances: Vec<&str> = {
        let set: BTreeSet<&str> = runs.iter().map(|r| r.instance_name.as_str()).collect();
        set.into_iter().collect()
    };
    let mut table = BTreeMap::new();
    for instance in &instances {
        let row: Vec<(f64, bool)> = solvers
            .iter()
            .map(|solver| {
                runs.iter()
                    .find(|r| &r.solver_name == solver && r.instance_name == *instance)
                    .map(|r| {
                        if r.record.outcome.solved() {
                            (r.record.wall_seconds, true)
                        } else {
                            (penalty, false)
                        }
                    })
                    .unwrap_or((penalty, false))
            })
            .collect();
        table.insert((*instance).to_string(), row);
    }
    table
}

fn vbs_analysis(runs: &[RunDetails], solvers: &[String], timeout: f64) -> VbsAnalysis {
    let table = penalised_table(runs, solvers, timeout);
    let total_instances = table.len();

    let mut vbs_times = Vec::with_capacity(total_instances);
    let mut unique_wins: BTreeMap<String, usize> = BTreeMap::new();
    let mut vbs_solved = 0;
    let mut ratios: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for row in table.values() {
        let best = row
            .iter()
            .map(|(t, _)| *t)
            .fold(f64::INFINITY, f64::min);
        vbs_times.push(best);
        if row.iter().any(|(_, solved)| *solved) {
            vbs_solved += 1;
        }
        // Strictly-unique fastest solver gets the win.
        let winners: Vec<usize> = row
            .iter()
            .enumerate()
            .filter(|(_, (t, _))| *t == best)
            .map(|(i, _)| i)
            .collect();
        if winners.len() == 1 {
            *unique_wins.entry(solvers[winners[0]].clone()).or_insert(0) += 1;
        }
        for (i, (t, _)) in row.iter().enumerate() {
            ratios
                .entry(solvers[i].clone())
                .or_default()
                .push(t / best.max(VBS_EPSILON));
        }
    }

    let individual_solved: BTreeMap<String, usize> = solvers
        .iter()
        .map(|solver| {
            let solved = runs
                .iter()
                .filter(|r| &r.solver_name == solver && r.record.outcome.solved())
                .count();
            (solver.clone(), solved)
        })
        .collect();

    let total_wins: usize = unique_wins.values().sum();
    let mut contributions: Vec<VbsContribution> = solvers
        .iter()
        .map(|solver| {
            let wins = unique_wins.get(solver).copied().unwrap_or(0);
            VbsContribution {
                solver: solver.clone(),
                unique_wins: wins,
                percentage: if total_wins > 0 {
                    wins as f64 / total_wins as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();
    contributions.sort_by(|a, b| b.unique_wins.cmp(&a.unique_wins));

    let best_individual = individual_solved.values().copied().max().unwrap_or(0);
    VbsAnalysis {
        vbs_solved,
        vbs_par2: mean(&vbs_times),
        total_instances,
        gap_to_vbs: ratios
            .into_iter()
            .map(|(solver, rs)| (solver, median(&rs)))
            .collect(),
        individual_solved,
        contributions,
        marginal_value: vbs_solved.saturating_sub(best_individual),
    }
}

// ── Solve matrix ────────────────────────────────────────────────────────

fn solve_matrix(runs: &[RunDetails], solvers: &[String]) -> SolveMatrix {
    let instances: BTreeSet<&str> = runs.iter().map(|r| r.instance_name.as_str()).collect();
    let solved_by = |solver: &str, instance: &str| {
        runs.iter().any(|r| {
            r.solver_name == solver && r.instance_name == instance && r.record.outcome.solved()
        })
    };

    let mut unique_solved: BTreeMap<String, usize> =
        solvers.iter().map(|s| (s.clone(), 0)).collect();
    let mut all_solved = 0;
    let mut none_solved = 0;

    for instance in &instances {
        let flags: Vec<bool> = solvers.iter().map(|s| solved_by(s, instance)).collect();
        let solved_count = flags.iter().filter(|f| **f).count();
        if solved_count == solvers.len() {
            all_solved += 1;
        }
        if solved_count == 0 {
            none_solved += 1;
        }
        if solved_count == 1 {
            let idx = flags.iter().position(|f| *f).unwrap_or(0);
            *unique_solved.get_mut(&solvers[idx]).unwrap() += 1;
        }
    }

    SolveMatrix {
        unique_solved,
        all_solved,
        none_solved,
        total_instances: instances.len(),
    }
}

// ── Family breakdown ────────────────────────────────────────────────────

fn family_breakdown(runs: &[RunDetails], timeout: f64) -> BTreeMap<String, FamilyBreakdown> {
    let families: BTreeSet<&str> = runs
        .iter()
        .map(|r| r.family.as_str())
        .filter(|f| !f.is_empty())
        .collect();

    let mut out = BTreeMap::new();
    for family in families {
        let fruns: Vec<&RunDetails> = runs.iter().filter(|r| r.family == family).collect();
        let instances: BTreeSet<&str> = fruns.iter().map(|r| r.instance_name.as_str()).collect();

        let mut solver_stats = BTreeMap::new();
        for solver in solver_names(runs) {
            let mine: Vec<&RunDetails> = fruns
                .iter()
                .filter(|r| r.solver_name == solver)
                .copied()
                .collect();
            if mine.is_empty() {
                continue;
            }
            let solved_times: Vec<f64> = mine
                .iter()
                .filter(|r| r.record.outcome.solved())
                .map(|r| r.record.wall_seconds)
                .collect();
            solver_stats.insert(
                solver.clone(),
                FamilySolverStats {
                    solved: solved_times.len(),
                    total: mine.len(),
                    solve_rate: solved_times.len() as f64 / mine.len() as f64 * 100.0,
                    par2: par_k(&mine, 2.0, timeout),
                    avg_time: if solved_times.is_empty() {
                        None
                    } else {
                        Some(mean(&solved_times))
                    },
                },
            );
        }

        let (best_solver, best_par2) = solver_stats
            .iter()
            .min_by(|a, b| {
                a.1.par2
                    .partial_cmp(&b.1.par2)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(name, s)| (name.clone(), s.par2))
            .unwrap_or_default();

        out.insert(
            family.to_string(),
            FamilyBreakdown {
                num_instances: instances.len(),
                solvers: solver_stats,
                best_solver,
                best_par2,
            },
        );
    }
    out
}

// ── Ranking ─────────────────────────────────────────────────────────────

/// Lexicographic: most solved first, PAR-2 as tiebreaker. Stable for equal
/// pairs (BTreeMap iteration is name-ordered).
fn ranking(summaries: &BTreeMap<String, SolverSummary>) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = summaries
        .values()
        .map(|s| RankingEntry {
            rank: 0,
            solver: s.solver.clone(),
            solved: s.solved,
            par2: s.par2,
            par10: s.par10,
            solve_rate: s.solve_rate,
            avg_time: s.times.as_ref().map(|t| t.mean),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.solved.cmp(&a.solved).then(
            a.par2
                .partial_cmp(&b.par2)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

// ── Adapters for the statistics pipeline ────────────────────────────────

/// Paired penalised times of two solvers on their common instances.
/// Returns `(times1, times2, instance_names)`.
pub fn paired_times(
    runs: &[RunDetails],
    solver1: &str,
    solver2: &str,
    timeout: f64,
) -> (Vec<f64>, Vec<f64>, Vec<String>) {
    let penalty = 2.0 * timeout;
    let pick = |solver: &str, instance: &str| {
        runs.iter()
            .find(|r| r.solver_name == solver && r.instance_name == instance)
            .map(|r| {
                if r.record.outcome.solved() {
                    r.record.wall_seconds
                } else {
                    penalty
                }
            })
    };

    let instances: BTreeSet<&str> = runs
        .iter()
        .filter(|r| r.solver_name == solver1)
        .map(|r| r.instance_name.as_str())
        .collect();

    let mut t1 = Vec::new();
    let mut t2 = Vec::new();
    let mut names = Vec::new();
    for instance in instances {
        if let (Some(a), Some(b)) = (pick(solver1, instance), pick(solver2, instance)) {
            t1.push(a);
            t2.push(b);
            names.push(instance.to_string());
        }
    }
    (t1, t2, names)
}

/// Instance × solver matrix of penalised times over instances every solver
/// ran on. Returns `(matrix, solver_names, instance_names)`.
pub fn time_matrix(
    runs: &[RunDetails],
    timeout: f64,
) -> (Vec<Vec<f64>>, Vec<String>, Vec<String>) {
    let solvers = solver_names(runs);
    let penalty = 2.0 * timeout;
    let instances: BTreeSet<&str> = runs.iter().map(|r| r.instance_name.as_str()).collect();

    let mut matrix = Vec::new();
    let mut kept = Vec::new();
    for instance in instances {
        let row: Option<Vec<f64>> = solvers
            .iter()
            .map(|solver| {
                runs.iter()
                    .find(|r| &r.solver_name == solver && r.instance_name == instance)
                    .map(|r| {
                        if r.record.outcome.solved() {
                            r.record.wall_seconds
                        } else {
                            penalty
                        }
                    })
            })
            .collect();
        if let Some(row) = row {
            matrix.push(row);
            kept.push(instance.to_string());
        }
    }
    (matrix, solvers, kept)
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SolverStats;
    use crate::executor::RunRecord;

    fn run(solver: &str, instance: &str, family: &str, outcome: Outcome, wall: f64) -> RunDetails {
        RunDetails {
            run_id: 0,
            experiment_id: 1,
            solver_id: 0,
            instance_id: 0,
            solver_name: solver.to_string(),
            instance_name: instance.to_string(),
            family: family.to_string(),
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
        }
    }

    /// The two-solver scenario from the acceptance checklist: A solves
    /// everything, B times out on the second instance (T = 5).
    fn two_solver_runs() -> Vec<RunDetails> {
        vec![
            run("A", "i1", "crafted", Outcome::Sat, 0.1),
            run("A", "i2", "crafted", Outcome::Sat, 2.0),
            run("A", "i3", "random", Outcome::Unsat, 0.5),
            run("B", "i1", "crafted", Outcome::Sat, 0.1),
            run("B", "i2", "crafted", Outcome::Timeout, 5.0),
            run("B", "i3", "random", Outcome::Unsat, 1.0),
        ]
    }

    fn report(runs: &[RunDetails], timeout: f64) -> MetricsReport {
        match compute_metrics(runs, timeout) {
            MetricsResult::Report(r) => *r,
            MetricsResult::Empty => panic!("expected a report"),
        }
    }

    #[test]
    fn empty_runs_yield_sentinel() {
        assert!(matches!(compute_metrics(&[], 5.0), MetricsResult::Empty));
    }

    #[test]
    fn deterministic_two_solver_scores() {
        let r = report(&two_solver_runs(), 5.0);
        let a = &r.summary_per_solver["A"];
        let b = &r.summary_per_solver["B"];

        assert!((a.par2 - (0.1 + 2.0 + 0.5) / 3.0).abs() < 1e-9);
        assert!((b.par2 - (0.1 + 10.0 + 1.0) / 3.0).abs() < 1e-9);
        assert_eq!(a.solved, 3);
        assert_eq!(b.solved, 2);
        assert_eq!(b.timeout, 1);

        // Ranking: A first by solved count.
        assert_eq!(r.ranking[0].solver, "A");
        assert_eq!(r.ranking[0].rank, 1);
        assert_eq!(r.ranking[1].solver, "B");

        // VBS picks the best per instance: same as A here.
        assert!((r.vbs.vbs_par2 - (0.1 + 2.0 + 0.5) / 3.0).abs() < 1e-9);
        assert_eq!(r.vbs.vbs_solved, 3);
        assert_eq!(r.vbs.marginal_value, 0);
    }

    #[test]
    fn par_scores_and_rankings() {
        let r = report(&two_solver_runs(), 5.0);
        assert_eq!(r.par_scores.best_par2.as_deref(), Some("A"));
        assert_eq!(r.par_scores.par2_ranking[0].solver, "A");
        // PAR-10 penalty: B = (0.1 + 50 + 1.0)/3 = 17.033…
        assert!((r.par_scores.par10["B"] - 51.1 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn par2_shift_when_outcome_degrades() {
        // Flipping one UNSAT (0.5s) to TIMEOUT raises PAR-2 by (2T − wall)/N.
        let t = 5.0;
        let before = report(&two_solver_runs(), t).summary_per_solver["A"].par2;
        let mut degraded = two_solver_runs();
        degraded[2].record.outcome = Outcome::Timeout;
        let after = report(&degraded, t).summary_per_solver["A"].par2;
        let expected_shift = (2.0 * t - 0.5) / 3.0;
        assert!((after - before - expected_shift).abs() < 1e-9);
    }

    #[test]
    fn unsolved_solver_has_no_time_stats_but_valid_park() {
        let runs = vec![
            run("A", "i1", "x", Outcome::Timeout, 5.0),
            run("A", "i2", "x", Outcome::Error, 0.0),
        ];
        let r = report(&runs, 5.0);
        let a = &r.summary_per_solver["A"];
        assert!(a.times.is_none());
        assert_eq!(a.solved, 0);
        assert!((a.par2 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn vbs_contributions_count_strict_wins() {
        let runs = vec![
            // A strictly fastest on i1; tie on i2; B strictly fastest on i3.
            run("A", "i1", "x", Outcome::Sat, 0.5),
            run("B", "i1", "x", Outcome::Sat, 1.0),
            run("A", "i2", "x", Outcome::Sat, 2.0),
            run("B", "i2", "x", Outcome::Sat, 2.0),
            run("A", "i3", "x", Outcome::Timeout, 5.0),
            run("B", "i3", "x", Outcome::Sat, 3.0),
        ];
        let r = report(&runs, 5.0);
        let wins: BTreeMap<&str, usize> = r
            .vbs
            .contributions
            .iter()
            .map(|c| (c.solver.as_str(), c.unique_wins))
            .collect();
        assert_eq!(wins["A"], 1);
        assert_eq!(wins["B"], 1);
        // Portfolio solves i3 which A alone misses; B solves all three.
        assert_eq!(r.vbs.marginal_value, 0);
        assert_eq!(r.vbs.individual_solved["B"], 3);
    }

    #[test]
    fn solve_matrix_partitions() {
        let runs = vec![
            run("A", "common", "x", Outcome::Sat, 1.0),
            run("B", "common", "x", Outcome::Sat, 1.0),
            run("A", "only_a", "x", Outcome::Sat, 1.0),
            run("B", "only_a", "x", Outcome::Timeout, 5.0),
            run("A", "nobody", "x", Outcome::Timeout, 5.0),
            run("B", "nobody", "x", Outcome::Timeout, 5.0),
        ];
        let r = report(&runs, 5.0);
        assert_eq!(r.solve_matrix.all_solved, 1);
        assert_eq!(r.solve_matrix.none_solved, 1);
        assert_eq!(r.solve_matrix.unique_solved["A"], 1);
        assert_eq!(r.solve_matrix.unique_solved["B"], 0);
    }

    #[test]
    fn family_breakdown_finds_best_solver() {
        let r = report(&two_solver_runs(), 5.0);
        let crafted = &r.family_breakdown["crafted"];
        assert_eq!(crafted.num_instances, 2);
        assert_eq!(crafted.best_solver, "A");
        let random = &r.family_breakdown["random"];
        assert_eq!(random.best_solver, "A");
        assert!((random.solvers["B"].par2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_breaks_ties_by_par2() {
        let runs = vec![
            run("A", "i1", "x", Outcome::Sat, 3.0),
            run("B", "i1", "x", Outcome::Sat, 1.0),
        ];
        let r = report(&runs, 5.0);
        assert_eq!(r.ranking[0].solver, "B");
        assert_eq!(r.ranking[1].solver, "A");
    }

    #[test]
    fn paired_times_penalises_unsolved() {
        let (t1, t2, names) = paired_times(&two_solver_runs(), "A", "B", 5.0);
        assert_eq!(names.len(), 3);
        let idx = names.iter().position(|n| n == "i2").unwrap();
        assert!((t1[idx] - 2.0).abs() < 1e-9);
        assert!((t2[idx] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn time_matrix_shape_and_penalty() {
        let (matrix, solvers, instances) = time_matrix(&two_solver_runs(), 5.0);
        assert_eq!(solvers, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(matrix.len(), 3);
        assert_eq!(instances.len(), 3);
        let i2 = instances.iter().position(|n| n == "i2").unwrap();
        assert_eq!(matrix[i2], vec![2.0, 10.0]);
    }

    #[test]
    fn time_matrix_drops_incomplete_rows() {
        let mut runs = two_solver_runs();
        runs.push(run("A", "extra", "x", Outcome::Sat, 1.0));
        let (matrix, _, instances) = time_matrix(&runs, 5.0);
        assert_eq!(matrix.len(), 3);
        assert!(!instances.contains(&"extra".to_string()));
    }
}
