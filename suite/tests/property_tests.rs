// Property tests for the tokeniser and the statistics plumbing.

use proptest::prelude::*;

use satbench::lexer::{lex, stringify, Token};
use satbench::numeric::percentile;
use satbench::stats::{correct_pvalues, wilcoxon_signed_rank, CorrectionMethod};

/// Fixed vocabulary the lexer accepts: keywords, operators, punctuation.
const VOCABULARY: &[&str] = &[
    "var", "bool", "constraint", "solve", "satisfy", "not", "true", "false", "xor", "atmost",
    "atleast", "exactly", "<->", "->", r"\/", r"/\", "~", "!", "(", ")", "[", "]", ":", ",", ";",
];

/// Any word the lexer accepts: vocabulary entries, identifiers, and
/// integer literals.
fn lexable_word() -> impl Strategy<Value = String> {
    prop_oneof![
        proptest::sample::select(VOCABULARY).prop_map(str::to_string),
        "[a-z][a-z0-9_]{0,6}",
        (0u32..10_000).prop_map(|n| n.to_string()),
    ]
}

proptest! {
    /// Tokenise ∘ stringify is the identity on token streams (modulo
    /// whitespace, which stringify normalises).
    #[test]
    fn lex_stringify_roundtrip(words in proptest::collection::vec(lexable_word(), 0..40)) {
        let source = words.join(" ");
        let first = lex(&source);
        prop_assert!(first.errors.is_empty(), "lex errors in {source:?}");

        let rendered = stringify(&source, &first.tokens);
        let second = lex(&rendered);
        prop_assert!(second.errors.is_empty(), "lex errors in rendered {rendered:?}");

        let a: Vec<Token> = first.tokens.iter().map(|(t, _)| t.clone()).collect();
        let b: Vec<Token> = second.tokens.iter().map(|(t, _)| t.clone()).collect();
        prop_assert_eq!(a, b);
    }

    /// Corrections never shrink a p-value, never leave [0, 1], and are
    /// monotone along the sorted order of the input.
    #[test]
    fn corrections_bound_and_order(ps in proptest::collection::vec(0.0f64..=1.0, 1..20)) {
        for method in [
            CorrectionMethod::Bonferroni,
            CorrectionMethod::Holm,
            CorrectionMethod::BenjaminiHochberg,
        ] {
            let adjusted = correct_pvalues(&ps, method).adjusted_pvalues;
            prop_assert_eq!(adjusted.len(), ps.len());
            for (orig, adj) in ps.iter().zip(&adjusted) {
                prop_assert!(*adj >= *orig - 1e-12, "{method:?} shrank {orig} to {adj}");
                prop_assert!((0.0..=1.0 + 1e-12).contains(adj));
            }
            let mut order: Vec<usize> = (0..ps.len()).collect();
            order.sort_by(|&a, &b| ps[a].partial_cmp(&ps[b]).unwrap());
            for pair in order.windows(2) {
                prop_assert!(
                    adjusted[pair[0]] <= adjusted[pair[1]] + 1e-12,
                    "{method:?} broke monotonicity"
                );
            }
        }
    }

    /// Swapping the paired samples leaves the Wilcoxon p-value unchanged
    /// and flips the effect-size sign.
    #[test]
    fn wilcoxon_symmetry(
        pairs in proptest::collection::vec((0.0f64..100.0, 0.0f64..100.0), 8..30)
    ) {
        let (a, b): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let ab = wilcoxon_signed_rank(&a, &b);
        let ba = wilcoxon_signed_rank(&b, &a);
        prop_assert!((ab.p_value - ba.p_value).abs() < 1e-9);
        if let (Some(r1), Some(r2)) = (ab.effect_size, ba.effect_size) {
            prop_assert!((r1 + r2).abs() < 1e-9);
        }
    }

    /// Percentiles stay within the sample range and are monotone in p.
    #[test]
    fn percentile_bounds(
        data in proptest::collection::vec(-1e6f64..1e6, 1..50),
        p1 in 0.0f64..=100.0,
        p2 in 0.0f64..=100.0,
    ) {
        let lo = data.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let v1 = percentile(&data, p1);
        prop_assert!(v1 >= lo - 1e-9 && v1 <= hi + 1e-9);
        let (small, large) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        prop_assert!(percentile(&data, small) <= percentile(&data, large) + 1e-9);
    }
}
