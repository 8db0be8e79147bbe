// stats.rs — Non-parametric statistical comparison of solvers.
//
// Implements the Demšar (2006) workflow: Wilcoxon signed-rank for two
// paired solvers, Friedman over k ≥ 3 with Nemenyi and Conover post-hocs,
// multiple-comparison corrections, effect sizes, and normality diagnostics.
// Input arrays are penalised times (unsolved → 2T) unless stated otherwise.
// Functions never fail on valid numeric input; degenerate inputs produce
// explicit sentinel reports.

use serde::Serialize;

use crate::numeric::{
    average_ranks, chi_square_sf, ln_gamma, mean, median, nemenyi_critical_value, normal_cdf,
    normal_quantile, percentile, std_dev, student_t_quantile, student_t_two_sided_p,
};

// ── Report types ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub test_name: &'static str,
    pub statistic: f64,
    pub p_value: f64,
    pub significant_005: bool,
    pub significant_001: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_interpretation: Option<&'static str>,
    pub description: String,
    pub recommendation: &'static str,
}

impl TestReport {
    fn sentinel(test_name: &'static str, description: String, recommendation: &'static str) -> Self {
        TestReport {
            test_name,
            statistic: 0.0,
            p_value: 1.0,
            significant_005: false,
            significant_001: false,
            effect_size: None,
            effect_interpretation: None,
            description,
            recommendation,
        }
    }

    fn with_p(test_name: &'static str, statistic: f64, p_value: f64) -> Self {
        TestReport {
            test_name,
            statistic,
            p_value,
            significant_005: p_value < 0.05,
            significant_001: p_value < 0.01,
            effect_size: None,
            effect_interpretation: None,
            description: String::new(),
            recommendation: "",
        }
    }
}

// ── Two-solver tests ────────────────────────────────────────────────────

/// Wilcoxon signed-rank test on paired times. Needs at least six non-zero
/// differences; fewer yields a sentinel. The statistic is min(W+, W−) with
/// a tie-corrected normal approximation, two-sided. Effect size is the
/// signed rank-biserial correlation (W+ − W−)/(W+ + W−); its sign flips
/// when the arguments swap.
pub fn wilcoxon_signed_rank(times1: &[f64], times2: &[f64]) -> TestReport {
    debug_assert_eq!(times1.len(), times2.len());
    let diffs: Vec<f64> = times1
        .iter()
        .zip(times2)
        .map(|(a, b)| a - b)
        .filter(|d| *d != 0.0)
        .collect();
    let n = diffs.len();
    if n < 6 {
        return TestReport::sentinel(
            "Wilcoxon Signed-Rank",
            format!("insufficient non-tied pairs ({n}; need >= 6)"),
            "collect more data or use the sign test",
        );
    }

    let abs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let ranks = average_ranks(&abs);
    let w_plus: f64 = ranks
        .iter()
        .zip(&diffs)
        .filter(|(_, d)| **d > 0.0)
        .map(|(r, _)| r)
        .sum();
    let total = n as f64 * (n as f64 + 1.0) / 2.0;
    let w_minus = total - w_plus;
    let w = w_plus.min(w_minus);

    let nf = n as f64;
    let mu = total / 2.0;
    let tie_term: f64 = tie_counts(&abs).iter().map(|&t| t * t * t - t).sum::<f64>() / 48.0;
    let sigma = (nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_term).sqrt();
    let p = if sigma > 0.0 {
        let z = (w - mu) / sigma;
        (2.0 * (1.0 - normal_cdf(z.abs()))).min(1.0)
    } else {
        1.0
    };

    let r = (w_plus - w_minus) / total;
    let mut report = TestReport::with_p("Wilcoxon Signed-Rank", w, p);
    report.effect_size = Some(r);
    report.effect_interpretation = Some(interpret_r(r.abs()));
    report.description =
        "non-parametric paired test; H0: differences symmetric around zero".to_string();
    report.recommendation = "preferred test for two solvers on the same instance set";
    report
}

/// Mann-Whitney U for unpaired samples. U counts pairs where the first
/// sample is smaller (ties half), so U/(n1·n2) is the Vargha-Delaney A.
pub fn mann_whitney_u(times1: &[f64], times2: &[f64]) -> TestReport {
    let n1 = times1.len();
    let n2 = times2.len();
    if n1 == 0 || n2 == 0 {
        return TestReport::sentinel(
            "Mann-Whitney U",
            "empty sample".to_string(),
            "collect data for both solvers",
        );
    }
    let mut combined: Vec<f64> = Vec::with_capacity(n1 + n2);
    combined.extend_from_slice(times1);
    combined.extend_from_slice(times2);
    let ranks = average_ranks(&combined);
    let r1: f64 = ranks[..n1].iter().sum();
    let n1f = n1 as f64;
    let n2f = n2 as f64;
    // U counting (t1 < t2) pairs with ties at half weight.
    let u = n1f * n2f + n1f * (n1f + 1.0) / 2.0 - r1;

    let nf = n1f + n2f;
    let mu = n1f * n2f / 2.0;
    let tie_term: f64 = tie_counts(&combined)
        .iter()
        .map(|&t| t * t * t - t)
        .sum::<f64>()
        / (nf * (nf - 1.0));
    let sigma = (n1f * n2f / 12.0 * (nf + 1.0 - tie_term)).sqrt();
    let p = if sigma > 0.0 {
        let z = (u - mu) / sigma;
        (2.0 * (1.0 - normal_cdf(z.abs()))).min(1.0)
    } else {
        1.0
    };

    let a = u / (n1f * n2f);
    let mut report = TestReport::with_p("Mann-Whitney U", u, p);
    report.effect_size = Some(a);
    report.effect_interpretation = Some(interpret_a(a));
    report.description = "non-parametric test for independent samples".to_string();
    report.recommendation = "use when solvers ran on different instance subsets";
    report
}

/// Sign test: positive differences against Binomial(n, ½), exact and
/// two-sided. The most robust check when outliers dominate.
pub fn sign_test(times1: &[f64], times2: &[f64]) -> TestReport {
    debug_assert_eq!(times1.len(), times2.len());
    let mut positive = 0u64;
    let mut negative = 0u64;
    for (a, b) in times1.iter().zip(times2) {
        if a > b {
            positive += 1;
        } else if a < b {
            negative += 1;
        }
    }
    let n = positive + negative;
    if n == 0 {
        return TestReport::sentinel(
            "Sign Test",
            "no non-zero differences".to_string(),
            "the solvers behave identically on this set",
        );
    }
    let k = positive.max(negative);
    let p = (2.0 * binomial_upper_tail(n, k)).min(1.0);
    let mut report = TestReport::with_p("Sign Test", k as f64, p);
    report.description = format!(
        "solver1 slower on {positive} instances, faster on {negative}"
    );
    report.recommendation = "robust fallback when differences have extreme outliers";
    report
}

/// P(X >= k) for X ~ Binomial(n, 1/2), summed in log space.
fn binomial_upper_tail(n: u64, k: u64) -> f64 {
    let nf = n as f64;
    let ln_half_n = nf * 0.5f64.ln();
    let mut p = 0.0;
    for i in k..=n {
        let ln_c = ln_gamma(nf + 1.0) - ln_gamma(i as f64 + 1.0) - ln_gamma((n - i) as f64 + 1.0);
        p += (ln_c + ln_half_n).exp();
    }
    p.min(1.0)
}

// ── k-solver tests ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FriedmanReport {
    pub report: TestReport,
    /// Mean rank per solver (columns of the input matrix).
    pub average_ranks: Vec<f64>,
    pub n_solvers: usize,
    pub n_instances: usize,
}

/// Friedman test over a matrix with one row per instance and one column
/// per solver. Tie-corrected χ² against chi-square with k−1 df; Kendall's W
/// as effect size.
pub fn friedman(matrix: &[Vec<f64>]) -> FriedmanReport {
    let n = matrix.len();
    let k = matrix.first().map_or(0, |row| row.len());
    let sentinel = |msg: &str| FriedmanReport {
        report: TestReport::sentinel("Friedman", msg.to_string(), "collect more data"),
        average_ranks: vec![],
        n_solvers: k,
        n_instances: n,
    };
    if k < 3 {
        return sentinel("need >= 3 solvers");
    }
    if n < 3 {
        return sentinel("need >= 3 instances");
    }

    let mut rank_sums = vec![0.0; k];
    let mut tie_correction = 0.0;
    for row in matrix {
        let ranks = average_ranks(row);
        for (sum, r) in rank_sums.iter_mut().zip(&ranks) {
            *sum += r;
        }
        tie_correction += tie_counts(row).iter().map(|&t| t * t * t - t).sum::<f64>();
    }

    let nf = n as f64;
    let kf = k as f64;
    let ssbn: f64 = rank_sums.iter().map(|r| r * r).sum();
    let correction = 1.0 - tie_correction / (nf * kf * (kf * kf - 1.0));
    let raw = 12.0 * ssbn / (nf * kf * (kf + 1.0)) - 3.0 * nf * (kf + 1.0);
    let chi2 = if correction > 0.0 { raw / correction } else { 0.0 };
    let p = chi_square_sf(chi2, kf - 1.0);
    let kendall_w = chi2 / (nf * (kf - 1.0));

    let average_ranks: Vec<f64> = rank_sums.iter().map(|r| r / nf).collect();
    let mut report = TestReport::with_p("Friedman", chi2, p);
    report.effect_size = Some(kendall_w);
    report.effect_interpretation = Some(interpret_w(kendall_w));
    report.description = format!(
        "non-parametric ANOVA for {k} solvers over {n} instances"
    );
    report.recommendation = "if significant, proceed with a post-hoc test";
    FriedmanReport {
        report,
        average_ranks,
        n_solvers: k,
        n_instances: n,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairComparison {
    pub solver1: String,
    pub solver2: String,
    pub rank1: f64,
    pub rank2: f64,
    pub rank_difference: f64,
    pub significant: bool,
    pub better_solver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostHocReport {
    pub test_name: &'static str,
    pub alpha: f64,
    pub critical_difference: f64,
    pub average_ranks: Vec<(String, f64)>,
    pub comparisons: Vec<PairComparison>,
    pub description: String,
}

/// Nemenyi post-hoc after a significant Friedman test. Two solvers differ
/// at level α iff their average ranks differ by more than
/// CD = q_α · √(k(k+1)/(6n)).
pub fn nemenyi(matrix: &[Vec<f64>], names: &[String], alpha: f64) -> Option<PostHocReport> {
    let n = matrix.len();
    let k = names.len();
    if k < 2 || n == 0 {
        return None;
    }
    let q = nemenyi_critical_value(k, alpha)?;
    let cd = q * (k as f64 * (k as f64 + 1.0) / (6.0 * n as f64)).sqrt();
    let ranks = column_average_ranks(matrix, k);

    let mut comparisons = Vec::new();
    for i in 0..k {
        for j in i + 1..k {
            let diff = (ranks[i] - ranks[j]).abs();
            comparisons.push(PairComparison {
                solver1: names[i].clone(),
                solver2: names[j].clone(),
                rank1: ranks[i],
                rank2: ranks[j],
                rank_difference: diff,
                significant: diff > cd,
                better_solver: if ranks[i] <= ranks[j] {
                    names[i].clone()
                } else {
                    names[j].clone()
                },
                p_value: None,
            });
        }
    }

    Some(PostHocReport {
        test_name: "Nemenyi Post-Hoc",
        alpha,
        critical_difference: cd,
        average_ranks: ranked_names(names, &ranks),
        comparisons,
        description: format!(
            "pairs with |Ri - Rj| > CD = {cd:.3} are significantly different"
        ),
    })
}

/// Conover post-hoc (more powerful than Nemenyi). Compares rank sums with a
/// t statistic on (n−1)(k−1) degrees of freedom, following Conover (1999).
pub fn conover(matrix: &[Vec<f64>], names: &[String], alpha: f64) -> Option<PostHocReport> {
    let n = matrix.len();
    let k = names.len();
    if k < 2 || n < 2 {
        return None;
    }

    let mut rank_sums = vec![0.0; k];
    let mut a1 = 0.0; // sum of squared ranks
    for row in matrix {
        let ranks = average_ranks(row);
        for (sum, r) in rank_sums.iter_mut().zip(&ranks) {
            *sum += r;
        }
        a1 += ranks.iter().map(|r| r * r).sum::<f64>();
    }

    let nf = n as f64;
    let kf = k as f64;
    let c1 = nf * kf * (kf + 1.0) * (kf + 1.0) / 4.0;
    let spread = a1 - c1;
    if spread <= 0.0 {
        return None;
    }
    let t1 = (kf - 1.0)
        * rank_sums
            .iter()
            .map(|r| (r - nf * (kf + 1.0) / 2.0).powi(2))
            .sum::<f64>()
        / spread;
    let df = (nf - 1.0) * (kf - 1.0);
    // Variance factor shrinks as the Friedman statistic approaches its
    // ceiling; clamp for perfectly separated matrices.
    let shrink = (1.0 - t1 / (nf * (kf - 1.0))).max(1e-12);
    let variance = 2.0 * nf * spread * shrink / df;
    let t_crit = student_t_quantile(1.0 - alpha / 2.0, df);
    let cd = t_crit * variance.sqrt();

    let avg_ranks: Vec<f64> = rank_sums.iter().map(|r| r / nf).collect();
    let mut comparisons = Vec::new();
    for i in 0..k {
        for j in i + 1..k {
            let diff = (rank_sums[i] - rank_sums[j]).abs();
            let stat = diff / variance.sqrt();
            let p = student_t_two_sided_p(stat, df);
            comparisons.push(PairComparison {
                solver1: names[i].clone(),
                solver2: names[j].clone(),
                rank1: avg_ranks[i],
                rank2: avg_ranks[j],
                rank_difference: diff / nf,
                significant: diff > cd,
                better_solver: if rank_sums[i] <= rank_sums[j] {
                    names[i].clone()
                } else {
                    names[j].clone()
                },
                p_value: Some(p),
            });
        }
    }

    Some(PostHocReport {
        test_name: "Conover Post-Hoc",
        alpha,
        critical_difference: cd / nf,
        average_ranks: ranked_names(names, &avg_ranks),
        comparisons,
        description: format!(
            "t-based pairwise comparison of rank sums with {df:.0} degrees of freedom"
        ),
    })
}

fn column_average_ranks(matrix: &[Vec<f64>], k: usize) -> Vec<f64> {
    let n = matrix.len().max(1);
    let mut sums = vec![0.0; k];
    for row in matrix {
        let ranks = average_ranks(row);
        for (sum, r) in sums.iter_mut().zip(&ranks) {
            *sum += r;
        }
    }
    sums.iter_mut().for_each(|s| *s /= n as f64);
    sums
}

fn ranked_names(names: &[String], ranks: &[f64]) -> Vec<(String, f64)> {
    let mut out: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(ranks.iter().copied())
        .collect();
    out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    out
}

// ── Multiple-comparison corrections ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    Bonferroni,
    Holm,
    BenjaminiHochberg,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionReport {
    pub method: CorrectionMethod,
    pub original_pvalues: Vec<f64>,
    pub adjusted_pvalues: Vec<f64>,
    pub significant_005: Vec<bool>,
    pub significant_001: Vec<bool>,
}

/// Adjust a vector of p-values for multiple comparisons.
pub fn correct_pvalues(p_values: &[f64], method: CorrectionMethod) -> CorrectionReport {
    let m = p_values.len();
    let mut adjusted = vec![0.0; m];

    match method {
        CorrectionMethod::Bonferroni => {
            for (out, &p) in adjusted.iter_mut().zip(p_values) {
                *out = (p * m as f64).min(1.0);
            }
        }
        CorrectionMethod::Holm => {
            let order = sorted_order(p_values);
            // Step-down: multiply by (m − position), clamp, then enforce
            // monotonicity from the smallest p upward.
            for (pos, &idx) in order.iter().enumerate() {
                adjusted[idx] = (p_values[idx] * (m - pos) as f64).min(1.0);
            }
            for pos in 1..m {
                let prev = adjusted[order[pos - 1]];
                let cur = &mut adjusted[order[pos]];
                if *cur < prev {
                    *cur = prev;
                }
            }
        }
        CorrectionMethod::BenjaminiHochberg => {
            let order = sorted_order(p_values);
            for (pos, &idx) in order.iter().enumerate() {
                adjusted[idx] = (p_values[idx] * m as f64 / (pos + 1) as f64).min(1.0);
            }
            // Enforce monotonicity from the largest p downward.
            for pos in (0..m.saturating_sub(1)).rev() {
                let next = adjusted[order[pos + 1]];
                let cur = &mut adjusted[order[pos]];
                if *cur > next {
                    *cur = next;
                }
            }
        }
    }

    CorrectionReport {
        method,
        original_pvalues: p_values.to_vec(),
        significant_005: adjusted.iter().map(|&p| p < 0.05).collect(),
        significant_001: adjusted.iter().map(|&p| p < 0.01).collect(),
        adjusted_pvalues: adjusted,
    }
}

fn sorted_order(p_values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..p_values.len()).collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

// ── Effect sizes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CohensD {
    pub d: f64,
    pub interpretation: &'static str,
    pub direction: &'static str,
}

/// Cohen's d for paired samples: mean(diff)/sd(diff); zero when the
/// differences are constant.
pub fn cohens_d(times1: &[f64], times2: &[f64]) -> CohensD {
    let diffs: Vec<f64> = times1.iter().zip(times2).map(|(a, b)| a - b).collect();
    let sd = std_dev(&diffs);
    let d = if sd.is_finite() && sd > 0.0 {
        mean(&diffs) / sd
    } else {
        0.0
    };
    CohensD {
        d,
        interpretation: interpret_d(d.abs()),
        direction: if d < 0.0 {
            "solver1 faster"
        } else if d > 0.0 {
            "solver2 faster"
        } else {
            "no difference"
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VarghaDelaney {
    pub a: f64,
    pub interpretation: &'static str,
    pub direction: &'static str,
}

/// Vargha-Delaney A: probability that a solver1 time is below a solver2
/// time, ties at half weight.
pub fn vargha_delaney(times1: &[f64], times2: &[f64]) -> VarghaDelaney {
    let n1 = times1.len();
    let n2 = times2.len();
    if n1 == 0 || n2 == 0 {
        return VarghaDelaney {
            a: 0.5,
            interpretation: "negligible",
            direction: "equal",
        };
    }
    let mut wins = 0.0;
    for &t1 in times1 {
        for &t2 in times2 {
            if t1 < t2 {
                wins += 1.0;
            } else if t1 == t2 {
                wins += 0.5;
            }
        }
    }
    let a = wins / (n1 as f64 * n2 as f64);
    VarghaDelaney {
        a,
        interpretation: interpret_a(a),
        direction: if a > 0.5 {
            "solver1 better"
        } else if a < 0.5 {
            "solver2 better"
        } else {
            "equal"
        },
    }
}

// ── Normality diagnostics ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct NormalityCheck {
    pub statistic: f64,
    pub p_value: f64,
    pub is_normal: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalityReport {
    pub n: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shapiro_wilk: Option<NormalityCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dagostino_pearson: Option<NormalityCheck>,
    pub skewness: f64,
    pub kurtosis: f64,
    pub recommendation: &'static str,
}

/// Shapiro-Wilk for n < 50, D'Agostino-Pearson for n ≥ 20, plus moment
/// diagnostics. Reported, never gating: the suite stays non-parametric.
pub fn normality_report(data: &[f64]) -> NormalityReport {
    let n = data.len();
    let shapiro = if (3..50).contains(&n) {
        shapiro_wilk(data)
    } else if n >= 50 {
        shapiro_wilk(&data[..50])
    } else {
        None
    };
    let dagostino = if n >= 20 { dagostino_pearson(data) } else { None };

    let looks_normal = shapiro.as_ref().map(|c| c.is_normal).unwrap_or(false);
    NormalityReport {
        n,
        skewness: skewness(data),
        kurtosis: excess_kurtosis(data),
        recommendation: if looks_normal {
            "data looks normally distributed; parametric tests are defensible"
        } else {
            "use non-parametric tests (Wilcoxon, Friedman)"
        },
        shapiro_wilk: shapiro,
        dagostino_pearson: dagostino,
    }
}

/// Moment skewness (biased, matching the usual reference implementation).
pub fn skewness(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(data);
    let m2 = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n as f64;
    let m3 = data.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n as f64;
    if m2 <= 0.0 {
        0.0
    } else {
        m3 / m2.powf(1.5)
    }
}

/// Excess kurtosis (Fisher definition, biased).
pub fn excess_kurtosis(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(data);
    let m2 = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n as f64;
    let m4 = data.iter().map(|x| (x - m).powi(4)).sum::<f64>() / n as f64;
    if m2 <= 0.0 {
        0.0
    } else {
        m4 / (m2 * m2) - 3.0
    }
}

/// Shapiro-Wilk W and p-value (Royston's AS R94 approximation, 3 ≤ n ≤ 50).
pub fn shapiro_wilk(data: &[f64]) -> Option<NormalityCheck> {
    let n = data.len();
    if !(3..=50).contains(&n) {
        return None;
    }
    let mut x = data.to_vec();
    x.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let range = x[n - 1] - x[0];
    if range <= 0.0 {
        return None; // constant sample
    }

    let nf = n as f64;
    // Expected normal order statistics.
    let m: Vec<f64> = (1..=n)
        .map(|i| normal_quantile((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let m_sq: f64 = m.iter().map(|v| v * v).sum();
    let rsn = 1.0 / nf.sqrt();

    // Weight vector: Royston's polynomial corrections to c = m/‖m‖ at the
    // extreme positions.
    let c: Vec<f64> = m.iter().map(|v| v / m_sq.sqrt()).collect();
    let mut a = vec![0.0; n];
    if n > 5 {
        let a_n = -2.706056 * rsn.powi(5) + 4.434685 * rsn.powi(4) - 2.071190 * rsn.powi(3)
            - 0.147981 * rsn.powi(2)
            + 0.221157 * rsn
            + c[n - 1];
        let a_n1 = -3.582633 * rsn.powi(5) + 5.682633 * rsn.powi(4) - 1.752461 * rsn.powi(3)
            - 0.293762 * rsn.powi(2)
            + 0.042981 * rsn
            + c[n - 2];
        let phi = (m_sq - 2.0 * m[n - 1] * m[n - 1] - 2.0 * m[n - 2] * m[n - 2])
            / (1.0 - 2.0 * a_n * a_n - 2.0 * a_n1 * a_n1);
        a[n - 1] = a_n;
        a[n - 2] = a_n1;
        a[0] = -a_n;
        a[1] = -a_n1;
        for i in 2..n - 2 {
            a[i] = m[i] / phi.sqrt();
        }
    } else if n == 3 {
        // Closed form: weights are (−1/√2, 0, 1/√2).
        a[2] = std::f64::consts::FRAC_1_SQRT_2;
        a[0] = -a[2];
    } else {
        let a_n = -2.706056 * rsn.powi(5) + 4.434685 * rsn.powi(4) - 2.071190 * rsn.powi(3)
            - 0.147981 * rsn.powi(2)
            + 0.221157 * rsn
            + c[n - 1];
        let phi = (m_sq - 2.0 * m[n - 1] * m[n - 1]) / (1.0 - 2.0 * a_n * a_n);
        a[n - 1] = a_n;
        a[0] = -a_n;
        for i in 1..n - 1 {
            a[i] = m[i] / phi.sqrt();
        }
    }

    let xbar = mean(&x);
    let numerator: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum::<f64>().powi(2);
    let denominator: f64 = x.iter().map(|xi| (xi - xbar).powi(2)).sum();
    let w = (numerator / denominator).clamp(0.0, 1.0);

    // Normalising transform for the p-value.
    let p = if n == 3 {
        let pi = std::f64::consts::PI;
        ((6.0 / pi) * (w.sqrt().asin() - 0.75f64.sqrt().asin())).clamp(0.0, 1.0)
    } else if n <= 11 {
        let gamma = -2.273 + 0.459 * nf;
        let wt = -(gamma - (1.0 - w).ln()).ln();
        let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf * nf - 0.0006714 * nf * nf * nf;
        let sigma = (1.3822 - 0.77857 * nf + 0.062767 * nf * nf - 0.0020322 * nf * nf * nf).exp();
        1.0 - normal_cdf((wt - mu) / sigma)
    } else {
        let ln_n = nf.ln();
        let wt = (1.0 - w).ln();
        let mu = -1.5861 - 0.31082 * ln_n - 0.083751 * ln_n * ln_n + 0.0038915 * ln_n.powi(3);
        let sigma = (-0.4803 - 0.082676 * ln_n + 0.0030302 * ln_n * ln_n).exp();
        1.0 - normal_cdf((wt - mu) / sigma)
    };

    Some(NormalityCheck {
        statistic: w,
        p_value: p,
        is_normal: p > 0.05,
    })
}

/// D'Agostino-Pearson K² omnibus test (skewness + kurtosis z-scores).
pub fn dagostino_pearson(data: &[f64]) -> Option<NormalityCheck> {
    let n = data.len();
    if n < 20 {
        return None;
    }
    let nf = n as f64;

    // Skewness z (D'Agostino 1970).
    let b1 = skewness(data);
    let y = b1 * ((nf + 1.0) * (nf + 3.0) / (6.0 * (nf - 2.0))).sqrt();
    let beta2 = 3.0 * (nf * nf + 27.0 * nf - 70.0) * (nf + 1.0) * (nf + 3.0)
        / ((nf - 2.0) * (nf + 5.0) * (nf + 7.0) * (nf + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let ya = y / alpha;
    let z_skew = delta * (ya + (ya * ya + 1.0).sqrt()).ln();

    // Kurtosis z (Anscombe-Glynn 1983).
    let b2 = excess_kurtosis(data) + 3.0;
    let e = 3.0 * (nf - 1.0) / (nf + 1.0);
    let var = 24.0 * nf * (nf - 2.0) * (nf - 3.0) / ((nf + 1.0).powi(2) * (nf + 3.0) * (nf + 5.0));
    let xk = (b2 - e) / var.sqrt();
    let beta1 = 6.0 * (nf * nf - 5.0 * nf + 2.0) / ((nf + 7.0) * (nf + 9.0))
        * (6.0 * (nf + 3.0) * (nf + 5.0) / (nf * (nf - 2.0) * (nf - 3.0))).sqrt();
    let a = 6.0 + 8.0 / beta1 * (2.0 / beta1 + (1.0 + 4.0 / (beta1 * beta1)).sqrt());
    let z_kurt = ((1.0 - 2.0 / (9.0 * a))
        - ((1.0 - 2.0 / a) / (1.0 + xk * (2.0 / (a - 4.0)).sqrt())).cbrt())
        / (2.0 / (9.0 * a)).sqrt();

    if !z_skew.is_finite() || !z_kurt.is_finite() {
        return None;
    }
    let k2 = z_skew * z_skew + z_kurt * z_kurt;
    let p = chi_square_sf(k2, 2.0);
    Some(NormalityCheck {
        statistic: k2,
        p_value: p,
        is_normal: p > 0.05,
    })
}

// ── Composite analyses ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Descriptive {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub q1: f64,
    pub q3: f64,
}

fn descriptive(times: &[f64]) -> Descriptive {
    Descriptive {
        mean: mean(times),
        median: median(times),
        std: std_dev(times),
        q1: percentile(times, 25.0),
        q3: percentile(times, 75.0),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WinCounts {
    pub solver1_wins: usize,
    pub solver2_wins: usize,
    pub ties: usize,
    /// Geometric-mean speedup of solver1 over solver2.
    pub speedup_geometric: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairwiseAnalysis {
    pub solver1: String,
    pub solver2: String,
    pub n_instances: usize,
    pub normality_of_differences: NormalityReport,
    pub wilcoxon: TestReport,
    pub mann_whitney: TestReport,
    pub sign: TestReport,
    pub cohens_d: CohensD,
    pub vargha_delaney: VarghaDelaney,
    pub descriptive1: Descriptive,
    pub descriptive2: Descriptive,
    pub wins: WinCounts,
    pub summary: String,
}

/// Full two-solver comparison on paired (penalised) times.
pub fn pairwise_analysis(
    times1: &[f64],
    times2: &[f64],
    solver1: &str,
    solver2: &str,
) -> PairwiseAnalysis {
    let diffs: Vec<f64> = times1.iter().zip(times2).map(|(a, b)| a - b).collect();
    let wilcoxon = wilcoxon_signed_rank(times1, times2);
    let vd = vargha_delaney(times1, times2);

    let solver1_wins = times1
        .iter()
        .zip(times2)
        .filter(|(a, b)| a < b)
        .count();
    let solver2_wins = times1
        .iter()
        .zip(times2)
        .filter(|(a, b)| a > b)
        .count();
    let ties = times1.len() - solver1_wins - solver2_wins;
    let speedup_geometric = {
        let logs: Vec<f64> = times1
            .iter()
            .zip(times2)
            .map(|(a, b)| (b / a.max(1e-9)).ln())
            .collect();
        mean(&logs).exp()
    };

    let faster = if mean(times1) <= mean(times2) {
        solver1
    } else {
        solver2
    };
    let significance = if wilcoxon.p_value < 0.01 {
        "highly significant (p < 0.01)"
    } else if wilcoxon.p_value < 0.05 {
        "significant (p < 0.05)"
    } else {
        "not significant (p >= 0.05)"
    };
    let summary = format!(
        "the difference is {significance} with a {} effect; {faster} is faster on average",
        vd.interpretation
    );

    PairwiseAnalysis {
        solver1: solver1.to_string(),
        solver2: solver2.to_string(),
        n_instances: times1.len(),
        normality_of_differences: normality_report(&diffs),
        wilcoxon,
        mann_whitney: mann_whitney_u(times1, times2),
        sign: sign_test(times1, times2),
        cohens_d: cohens_d(times1, times2),
        vargha_delaney: vd,
        descriptive1: descriptive(times1),
        descriptive2: descriptive(times2),
        wins: WinCounts {
            solver1_wins,
            solver2_wins,
            ties,
            speedup_geometric,
        },
        summary,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankEntry {
    pub rank: usize,
    pub solver: String,
    pub avg_rank: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiSolverAnalysis {
    pub n_solvers: usize,
    pub n_instances: usize,
    pub solvers: Vec<String>,
    pub friedman: FriedmanReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nemenyi: Option<PostHocReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conover: Option<PostHocReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairwise_corrections: Option<PairwiseCorrections>,
    pub ranking: Vec<RankEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairwiseCorrections {
    pub labels: Vec<String>,
    pub bonferroni: CorrectionReport,
    pub holm: CorrectionReport,
    pub benjamini_hochberg: CorrectionReport,
}

/// Friedman, then (when significant at 0.05) Nemenyi + Conover post-hocs
/// and Wilcoxon pairwise p-values under every correction.
pub fn multi_solver_analysis(
    matrix: &[Vec<f64>],
    names: &[String],
    alpha: f64,
) -> MultiSolverAnalysis {
    let friedman_report = friedman(matrix);
    let significant = friedman_report.report.significant_005;

    let (nemenyi_report, conover_report, corrections) = if significant {
        let mut labels = Vec::new();
        let mut pvals = Vec::new();
        for i in 0..names.len() {
            for j in i + 1..names.len() {
                let t1: Vec<f64> = matrix.iter().map(|row| row[i]).collect();
                let t2: Vec<f64> = matrix.iter().map(|row| row[j]).collect();
                labels.push(format!("{} vs {}", names[i], names[j]));
                pvals.push(wilcoxon_signed_rank(&t1, &t2).p_value);
            }
        }
        (
            nemenyi(matrix, names, alpha),
            conover(matrix, names, alpha),
            Some(PairwiseCorrections {
                labels,
                bonferroni: correct_pvalues(&pvals, CorrectionMethod::Bonferroni),
                holm: correct_pvalues(&pvals, CorrectionMethod::Holm),
                benjamini_hochberg: correct_pvalues(&pvals, CorrectionMethod::BenjaminiHochberg),
            }),
        )
    } else {
        (None, None, None)
    };

    let mut ranking: Vec<RankEntry> = names
        .iter()
        .zip(&friedman_report.average_ranks)
        .map(|(name, &avg)| RankEntry {
            rank: 0,
            solver: name.clone(),
            avg_rank: avg,
        })
        .collect();
    ranking.sort_by(|a, b| {
        a.avg_rank
            .partial_cmp(&b.avg_rank)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (i, entry) in ranking.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    MultiSolverAnalysis {
        n_solvers: names.len(),
        n_instances: matrix.len(),
        solvers: names.to_vec(),
        friedman: friedman_report,
        nemenyi: nemenyi_report,
        conover: conover_report,
        pairwise_corrections: corrections,
        ranking,
    }
}

// ── Interpretation bands ────────────────────────────────────────────────

fn interpret_d(d: f64) -> &'static str {
    if d < 0.2 {
        "negligible"
    } else if d < 0.5 {
        "small"
    } else if d < 0.8 {
        "medium"
    } else {
        "large"
    }
}

fn interpret_r(r: f64) -> &'static str {
    if r < 0.1 {
        "negligible"
    } else if r < 0.3 {
        "small"
    } else if r < 0.5 {
        "medium"
    } else {
        "large"
    }
}

fn interpret_a(a: f64) -> &'static str {
    let d = (a - 0.5).abs();
    if d < 0.06 {
        "negligible"
    } else if d < 0.14 {
        "small"
    } else if d < 0.21 {
        "medium"
    } else {
        "large"
    }
}

fn interpret_w(w: f64) -> &'static str {
    if w < 0.1 {
        "negligible"
    } else if w < 0.3 {
        "small"
    } else if w < 0.5 {
        "medium"
    } else {
        "large"
    }
}

/// Sizes of tie groups in a sample (groups of equal values).
fn tie_counts(xs: &[f64]) -> Vec<f64> {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut counts = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1] == sorted[i] {
            j += 1;
        }
        if j > i {
            counts.push((j - i + 1) as f64);
        }
        i = j + 1;
    }
    counts
}

// ── Tests ───────────────────────────────────────────────────────────────
