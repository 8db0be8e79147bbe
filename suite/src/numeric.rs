// numeric.rs — Special functions backing the statistical test suite.
//
// Lanczos log-gamma, regularized incomplete gamma/beta, the normal CDF and
// quantile, chi-square and Student-t tails, and the studentized-range
// critical values used by the Nemenyi post-hoc test. Accuracy targets are
// the usual double-precision approximations from the numerical literature
// (Lanczos g=7, Acklam's inverse normal, Lentz continued fractions), which
// is far tighter than anything the benchmarking statistics need.

/// ln Γ(x) via the Lanczos approximation (g = 7, 9 coefficients).
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula keeps the approximation on x ≥ 0.5.
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut acc = COEF[0];
    for (i, &c) in COEF.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

// ── Incomplete gamma ────────────────────────────────────────────────────

/// Regularized lower incomplete gamma P(a, x).
pub fn reg_lower_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 || a <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        gamma_series(a, x)
    } else {
        1.0 - gamma_cont_fraction(a, x)
    }
}

/// Series expansion, converges fast for x < a + 1.
fn gamma_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut term = sum;
    for _ in 0..500 {
        ap += 1.0;
        term *= x / ap;
        sum += term;
        if term.abs() < sum.abs() * 1e-15 {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Continued fraction for Q(a, x), converges fast for x ≥ a + 1.
fn gamma_cont_fraction(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..500 {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-15 {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

// ── Incomplete beta ─────────────────────────────────────────────────────

/// Regularized incomplete beta I_x(a, b).
pub fn reg_inc_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front =
        (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_cont_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_cont_fraction(b, a, 1.0 - x) / b
    }
}

/// Lentz's continued fraction for the incomplete beta.
fn beta_cont_fraction(a: f64, b: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..300 {
        let m = m as f64;
        let m2 = 2.0 * m;
        // Even step.
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;
        // Odd step.
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-15 {
            break;
        }
    }
    h
}

// ── Normal distribution ─────────────────────────────────────────────────

/// Error function via the regularized incomplete gamma: erf(x) = P(½, x²).
pub fn erf(x: f64) -> f64 {
    let p = reg_lower_gamma(0.5, x * x);
    if x >= 0.0 {
        p
    } else {
        -p
    }
}

/// Standard normal CDF Φ(z).
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Standard normal quantile Φ⁻¹(p) (Acklam's rational approximation,
/// |relative error| < 1.15e-9). Returns ±∞ at the boundaries.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_690e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

// ── Chi-square and Student t ────────────────────────────────────────────

/// Chi-square survival function P(X > x) with `df` degrees of freedom.
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    (1.0 - reg_lower_gamma(df / 2.0, x / 2.0)).clamp(0.0, 1.0)
}

/// Student-t CDF with `df` degrees of freedom.
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    let tail = 0.5 * reg_inc_beta(df / 2.0, 0.5, x);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Two-sided p-value for a t statistic.
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    reg_inc_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Student-t quantile via bisection on the CDF (monotone, 1e-10 wide).
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    let mut lo = -1e3;
    let mut hi = 1e3;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if student_t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-10 {
            break;
        }
    }
    0.5 * (lo + hi)
}

// ── Studentized range critical values ───────────────────────────────────

/// Critical values q_α(k, ∞)/√2 for the Nemenyi test, k = 2..=20 at
/// α = 0.05 and k = 2..=10 at α = 0.10 / 0.01 (Demšar 2006 and the
/// standard studentized-range tables). `None` for unsupported (k, α).
pub fn nemenyi_critical_value(k: usize, alpha: f64) -> Option<f64> {
    const Q_005: [f64; 19] = [
        1.960, 2.344, 2.569, 2.728, 2.850, 2.949, 3.031, 3.102, 3.164, 3.219, 3.268, 3.313,
        3.354, 3.391, 3.426, 3.458, 3.489, 3.517, 3.544,
    ];
    const Q_010: [f64; 9] = [1.645, 2.052, 2.291, 2.460, 2.589, 2.693, 2.780, 2.855, 2.920];
    const Q_001: [f64; 9] = [2.576, 2.913, 3.113, 3.255, 3.364, 3.452, 3.526, 3.590, 3.646];

    if k < 2 {
        return None;
    }
    let idx = k - 2;
    if (alpha - 0.05).abs() < 1e-9 {
        Q_005.get(idx).copied()
    } else if (alpha - 0.10).abs() < 1e-9 {
        Q_010.get(idx).copied()
    } else if (alpha - 0.01).abs() < 1e-9 {
        Q_001.get(idx).copied()
    } else {
        None
    }
}

// ── Basic descriptive helpers ───────────────────────────────────────────

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (ddof = 1).
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64).sqrt()
}

pub fn median(xs: &[f64]) -> f64 {
    percentile(xs, 50.0)
}

/// Linear-interpolation percentile over a copy of the data, matching the
/// numpy default.
pub fn percentile(xs: &[f64], p: f64) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let w = rank - lo as f64;
        sorted[lo] * (1.0 - w) + sorted[hi] * w
    }
}

/// Average ranks (1-based) with ties sharing their mean rank.
pub fn average_ranks(xs: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| xs[a].partial_cmp(&xs[b]).unwrap_or(std::cmp::Ordering::Equal));
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && xs[order[j + 1]] == xs[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} !≈ {b} (tol {tol})");
    }

    #[test]
    fn ln_gamma_matches_factorials() {
        close(ln_gamma(1.0), 0.0, 1e-12);
        close(ln_gamma(5.0), 24.0f64.ln(), 1e-10);
        close(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), 1e-10);
    }

    #[test]
    fn normal_cdf_reference_points() {
        close(normal_cdf(0.0), 0.5, 1e-12);
        close(normal_cdf(1.959964), 0.975, 1e-6);
        close(normal_cdf(-1.644854), 0.05, 1e-6);
    }

    #[test]
    fn normal_quantile_inverts_cdf() {
        for &p in &[0.001, 0.025, 0.31, 0.5, 0.77, 0.975, 0.999] {
            close(normal_cdf(normal_quantile(p)), p, 1e-8);
        }
    }

    #[test]
    fn chi_square_reference_points() {
        // 95th percentile of chi2(1) is 3.841; of chi2(3) is 7.815.
        close(chi_square_sf(3.841, 1.0), 0.05, 1e-3);
        close(chi_square_sf(7.815, 3.0), 0.05, 1e-3);
        close(chi_square_sf(0.0, 2.0), 1.0, 1e-12);
    }

    #[test]
    fn student_t_reference_points() {
        // Two-sided critical values: t(5, 0.05) = 2.571, t(30, 0.05) = 2.042.
        close(student_t_two_sided_p(2.571, 5.0), 0.05, 1e-3);
        close(student_t_two_sided_p(2.042, 30.0), 0.05, 1e-3);
        close(student_t_cdf(0.0, 10.0), 0.5, 1e-12);
    }

    #[test]
    fn student_t_quantile_inverts_cdf() {
        for &df in &[3.0, 10.0, 60.0] {
            for &p in &[0.05, 0.5, 0.975] {
                close(student_t_cdf(student_t_quantile(p, df), df), p, 1e-7);
            }
        }
    }

    #[test]
    fn incomplete_beta_symmetry() {
        // I_x(a,b) = 1 - I_{1-x}(b,a)
        let (a, b, x) = (2.5, 4.0, 0.3);
        close(reg_inc_beta(a, b, x), 1.0 - reg_inc_beta(b, a, 1.0 - x), 1e-12);
    }

    #[test]
    fn nemenyi_table_anchors() {
        // k = 2 degenerates to the two-sided normal critical value.
        close(nemenyi_critical_value(2, 0.05).unwrap(), 1.960, 1e-9);
        close(nemenyi_critical_value(2, 0.01).unwrap(), 2.576, 1e-9);
        close(nemenyi_critical_value(4, 0.05).unwrap(), 2.569, 1e-9);
        assert!(nemenyi_critical_value(1, 0.05).is_none());
        assert!(nemenyi_critical_value(30, 0.01).is_none());
        assert!(nemenyi_critical_value(3, 0.2).is_none());
    }

    #[test]
    fn descriptive_helpers() {
        let xs = [4.0, 1.0, 3.0, 2.0];
        close(mean(&xs), 2.5, 1e-12);
        close(median(&xs), 2.5, 1e-12);
        close(percentile(&xs, 25.0), 1.75, 1e-12);
        close(std_dev(&xs), (5.0f64 / 3.0).sqrt(), 1e-12);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn ranks_with_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }
}
