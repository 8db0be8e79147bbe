// Modelling-language round trips: compile models to CNF and check the
// result with a small test-only DPLL procedure, then decode assignments
// back onto declared variables.

use std::collections::BTreeMap;

use satbench::encode::{compile, CompiledModel};
use satbench::parser::parse;

// ── Test-only DPLL ──────────────────────────────────────────────────────

/// Plain DPLL with unit propagation; plenty for the toy formulas here.
/// Returns a total assignment (1-based) when satisfiable.
fn dpll(num_vars: u32, clauses: &[Vec<i32>]) -> Option<Vec<bool>> {
    fn go(assignment: &mut Vec<Option<bool>>, clauses: &[Vec<i32>]) -> bool {
        // Unit propagation to fixpoint.
        let mut trail = Vec::new();
        loop {
            let mut propagated = false;
            for clause in clauses {
                let mut unassigned = None;
                let mut satisfied = false;
                let mut unassigned_count = 0;
                for &lit in clause {
                    let var = lit.unsigned_abs() as usize;
                    match assignment[var] {
                        Some(value) if value == (lit > 0) => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            unassigned_count += 1;
                            unassigned = Some(lit);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match unassigned_count {
                    0 => {
                        for var in trail {
                            assignment[var] = None;
                        }
                        return false;
                    }
                    1 => {
                        let lit = unassigned.unwrap();
                        let var = lit.unsigned_abs() as usize;
                        assignment[var] = Some(lit > 0);
                        trail.push(var);
                        propagated = true;
                    }
                    _ => {}
                }
            }
            if !propagated {
                break;
            }
        }

        match assignment.iter().skip(1).position(|slot| slot.is_none()) {
            None => true,
            Some(offset) => {
                let var = offset + 1;
                for value in [true, false] {
                    assignment[var] = Some(value);
                    if go(assignment, clauses) {
                        return true;
                    }
                    assignment[var] = None;
                }
                for var in trail {
                    assignment[var] = None;
                }
                false
            }
        }
    }

    let mut assignment: Vec<Option<bool>> = vec![None; num_vars as usize + 1];
    if go(&mut assignment, clauses) {
        Some(
            assignment
                .into_iter()
                .skip(1)
                .map(|slot| slot.unwrap_or(false))
                .collect(),
        )
    } else {
        None
    }
}

fn compile_source(source: &str) -> CompiledModel {
    let result = parse(source);
    assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
    compile(&result.model.expect("no model")).expect("compile failed")
}

fn solve(compiled: &CompiledModel) -> Option<Vec<bool>> {
    dpll(compiled.cnf.num_vars, &compiled.cnf.clauses)
}

/// Render a satisfying assignment the way a solver's `v` lines would.
fn v_lines(model: &[bool]) -> String {
    let mut line = String::from("v");
    for (i, &value) in model.iter().enumerate() {
        let lit = i as i64 + 1;
        line.push_str(&format!(" {}", if value { lit } else { -lit }));
    }
    line.push_str(" 0\n");
    format!("s SATISFIABLE\n{line}")
}

fn decoded(compiled: &CompiledModel, model: &[bool]) -> BTreeMap<String, bool> {
    compiled.decode_assignment(&v_lines(model))
}

// ── Pigeonhole ──────────────────────────────────────────────────────────

#[test]
fn pigeonhole_three_pigeons_two_holes_is_unsat() {
    let source = "\
% three pigeons, two holes
var bool: p1_1, p1_2, p2_1, p2_2, p3_1, p3_2;
constraint p1_1 \\/ p1_2;
constraint p2_1 \\/ p2_2;
constraint p3_1 \\/ p3_2;
constraint atmost(1, [p1_1, p2_1, p3_1]);
constraint atmost(1, [p1_2, p2_2, p3_2]);
solve satisfy;
";
    let compiled = compile_source(source);
    assert_eq!(compiled.num_user_vars, 6);
    assert!(solve(&compiled).is_none(), "pigeonhole must be UNSAT");
}

#[test]
fn pigeonhole_two_pigeons_two_holes_is_sat() {
    let source = "\
var bool: p1_1, p1_2, p2_1, p2_2;
constraint p1_1 \\/ p1_2;
constraint p2_1 \\/ p2_2;
constraint atmost(1, [p1_1, p2_1]);
constraint atmost(1, [p1_2, p2_2]);
";
    let compiled = compile_source(source);
    let model = solve(&compiled).expect("should be SAT");
    let assignment = decoded(&compiled, &model);
    // Each pigeon sits somewhere, no hole is shared.
    assert!(assignment["p1_1"] || assignment["p1_2"]);
    assert!(assignment["p2_1"] || assignment["p2_2"]);
    assert!(!(assignment["p1_1"] && assignment["p2_1"]));
    assert!(!(assignment["p1_2"] && assignment["p2_2"]));
}

// ── Four queens ─────────────────────────────────────────────────────────

fn queens_model(n: usize) -> String {
    let mut vars = Vec::new();
    for r in 1..=n {
        for c in 1..=n {
            vars.push(format!("q{r}_{c}"));
        }
    }
    let mut out = format!("var bool: {};\n", vars.join(", "));

    let cell = |r: usize, c: usize| format!("q{r}_{c}");
    for r in 1..=n {
        let row: Vec<String> = (1..=n).map(|c| cell(r, c)).collect();
        out.push_str(&format!("constraint exactly(1, [{}]);\n", row.join(", ")));
    }
    for c in 1..=n {
        let col: Vec<String> = (1..=n).map(|r| cell(r, c)).collect();
        out.push_str(&format!("constraint exactly(1, [{}]);\n", col.join(", ")));
    }
    // Diagonals of length >= 2, both directions.
    for d in -(n as i32 - 2)..=(n as i32 - 2) {
        let diag: Vec<String> = (1..=n as i32)
            .filter_map(|r| {
                let c = r + d;
                (1..=n as i32).contains(&c).then(|| cell(r as usize, c as usize))
            })
            .collect();
        if diag.len() >= 2 {
            out.push_str(&format!("constraint atmost(1, [{}]);\n", diag.join(", ")));
        }
    }
    for s in 3..=(2 * n - 1) {
        let anti: Vec<String> = (1..=n)
            .filter_map(|r| {
                let c = s as i32 - r as i32;
                (1..=n as i32).contains(&c).then(|| cell(r, c as usize))
            })
            .collect();
        if anti.len() >= 2 {
            out.push_str(&format!("constraint atmost(1, [{}]);\n", anti.join(", ")));
        }
    }
    out.push_str("solve satisfy;\n");
    out
}

#[test]
fn four_queens_round_trip() {
    let compiled = compile_source(&queens_model(4));
    assert_eq!(compiled.num_user_vars, 16);
    let model = solve(&compiled).expect("4-queens is satisfiable");
    let assignment = decoded(&compiled, &model);

    let queen = |r: usize, c: usize| assignment[&format!("q{r}_{c}")];
    // Exactly one queen per row and per column.
    for i in 1..=4 {
        assert_eq!((1..=4).filter(|&c| queen(i, c)).count(), 1, "row {i}");
        assert_eq!((1..=4).filter(|&r| queen(r, i)).count(), 1, "column {i}");
    }
    // No two share a diagonal.
    let positions: Vec<(i32, i32)> = (1..=4)
        .flat_map(|r| (1..=4).map(move |c| (r, c)))
        .filter(|&(r, c)| queen(r as usize, c as usize))
        .map(|(r, c)| (r as i32, c as i32))
        .collect();
    for (i, &(r1, c1)) in positions.iter().enumerate() {
        for &(r2, c2) in &positions[i + 1..] {
            assert_ne!((r1 - r2).abs(), (c1 - c2).abs(), "diagonal clash");
        }
    }
}

#[test]
fn three_queens_is_unsat() {
    let compiled = compile_source(&queens_model(3));
    assert!(solve(&compiled).is_none());
}

// ── Cardinality soundness ───────────────────────────────────────────────

fn count_true(assignment: &BTreeMap<String, bool>, prefix: &str) -> usize {
    assignment
        .iter()
        .filter(|(name, &value)| name.starts_with(prefix) && value)
        .count()
}

#[test]
fn atmost_sequential_counter_is_sound() {
    // 12 variables forces the sequential-counter encoding; require many
    // true via implications and cap at 3.
    let vars: Vec<String> = (0..12).map(|i| format!("x{i:02}")).collect();
    let source = format!(
        "var bool: {};\nconstraint atmost(3, [{}]);\nconstraint x00 /\\ x05 /\\ x11;\n",
        vars.join(", "),
        vars.join(", ")
    );
    let compiled = compile_source(&source);
    let model = solve(&compiled).expect("3 of 12 fits the bound");
    let assignment = decoded(&compiled, &model);
    assert!(count_true(&assignment, "x") <= 3);
    assert!(assignment["x00"] && assignment["x05"] && assignment["x11"]);
}

#[test]
fn atmost_bound_violation_is_unsat() {
    let vars: Vec<String> = (0..12).map(|i| format!("x{i:02}")).collect();
    let source = format!(
        "var bool: {};\nconstraint atmost(2, [{}]);\nconstraint x00 /\\ x04 /\\ x08;\n",
        vars.join(", "),
        vars.join(", ")
    );
    let compiled = compile_source(&source);
    assert!(solve(&compiled).is_none());
}

#[test]
fn atleast_is_sound() {
    let vars: Vec<String> = (0..5).map(|i| format!("y{i}")).collect();
    let source = format!(
        "var bool: {};\nconstraint atleast(3, [{}]);\n",
        vars.join(", "),
        vars.join(", ")
    );
    let compiled = compile_source(&source);
    let model = solve(&compiled).expect("atleast(3 of 5) is satisfiable");
    let assignment = decoded(&compiled, &model);
    assert!(count_true(&assignment, "y") >= 3);
}

#[test]
fn exactly_is_sound() {
    let vars: Vec<String> = (0..6).map(|i| format!("z{i}")).collect();
    let source = format!(
        "var bool: {};\nconstraint exactly(2, [{}]);\n",
        vars.join(", "),
        vars.join(", ")
    );
    let compiled = compile_source(&source);
    let model = solve(&compiled).expect("exactly(2 of 6) is satisfiable");
    let assignment = decoded(&compiled, &model);
    assert_eq!(count_true(&assignment, "z"), 2);
}

#[test]
fn contradictory_cardinality_is_unsat() {
    let source = "\
var bool: a, b, c, d;
constraint atmost(1, [a, b, c, d]);
constraint atleast(2, [a, b, c, d]);
";
    let compiled = compile_source(source);
    assert!(solve(&compiled).is_none());
}

// ── Connective semantics ────────────────────────────────────────────────

#[test]
fn xor_semantics() {
    let sat = compile_source("var bool: a, b;\nconstraint xor(a, b);\nconstraint a;");
    let model = solve(&sat).expect("a=true, b=false satisfies xor");
    let assignment = decoded(&sat, &model);
    assert!(assignment["a"]);
    assert!(!assignment["b"]);

    let unsat = compile_source("var bool: a, b;\nconstraint xor(a, b);\nconstraint a /\\ b;");
    assert!(solve(&unsat).is_none());
}

#[test]
fn implication_and_iff_semantics() {
    let forced = compile_source("var bool: a, b;\nconstraint a -> b;\nconstraint a;");
    let model = solve(&forced).expect("satisfiable");
    assert!(decoded(&forced, &model)["b"], "modus ponens must force b");

    let broken = compile_source("var bool: a, b;\nconstraint a <-> b;\nconstraint a /\\ not b;");
    assert!(solve(&broken).is_none());
}

#[test]
fn constants_behave() {
    assert!(solve(&compile_source("constraint true;")).is_some());
    assert!(solve(&compile_source("constraint false;")).is_none());
    assert!(solve(&compile_source("var bool: a;\nconstraint false -> a;")).is_some());
}

// ── DIMACS shape ────────────────────────────────────────────────────────

#[test]
fn dimacs_header_agrees_with_body() {
    let compiled = compile_source(&queens_model(4));
    let dimacs = compiled.cnf.to_dimacs();
    let mut lines = dimacs.lines();
    let header = lines.next().unwrap();
    let parts: Vec<&str> = header.split_whitespace().collect();
    assert_eq!(parts[0], "p");
    assert_eq!(parts[1], "cnf");
    let n: u32 = parts[2].parse().unwrap();
    let m: usize = parts[3].parse().unwrap();

    let mut max_lit = 0u32;
    let mut clause_count = 0usize;
    for line in lines {
        clause_count += 1;
        for tok in line.split_whitespace() {
            let lit: i64 = tok.parse().unwrap();
            max_lit = max_lit.max(lit.unsigned_abs() as u32);
        }
        assert!(line.trim_end().ends_with('0'));
    }
    assert_eq!(m, clause_count);
    assert_eq!(n, max_lit);
}
