// encode.rs — Tseitin translation of models to DIMACS CNF.
//
// Compiles a validated `Model` into an equisatisfiable CNF: each declared
// variable occupies one DIMACS index, auxiliaries are allocated sequentially
// for non-atom subexpressions, and every top-level constraint becomes a unit
// clause over its Tseitin literal. Cardinality constraints compile to direct
// clause encodings (pairwise or sequential counter) and are therefore only
// accepted in positive top-level positions.
//
// Preconditions: `model` comes from `parser::parse`.
// Postconditions: on success the output is fully populated; on failure no
//   partial CNF escapes (compile returns only the diagnostics).
// Failure modes: semantic errors (undeclared / re-declared variables,
//   cardinality under an operator).
// Side effects: none.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;

use crate::ast::{CardExpr, CardKind, Expr, Ident, Model};
use crate::diag::Diagnostic;

// ── CNF formula ─────────────────────────────────────────────────────────

/// A CNF formula in DIMACS conventions: variables are 1-based, literals are
/// signed, clauses are implicit disjunctions.
#[derive(Debug, Clone, Serialize)]
pub struct Cnf {
    pub num_vars: u32,
    pub clauses: Vec<Vec<i32>>,
}

impl Cnf {
    /// Render as DIMACS text: `p cnf N M` then one `0`-terminated clause per line.
    pub fn to_dimacs(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("p cnf {} {}\n", self.num_vars, self.clauses.len()));
        for clause in &self.clauses {
            for lit in clause {
                out.push_str(&format!("{lit} "));
            }
            out.push_str("0\n");
        }
        out
    }
}

/// A compiled model: the CNF plus the mapping from declared identifiers to
/// DIMACS indices. Auxiliary indices are not exposed.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledModel {
    pub cnf: Cnf,
    pub var_map: BTreeMap<String, u32>,
    pub num_user_vars: u32,
    pub num_aux_vars: u32,
}

impl CompiledModel {
    /// Decode a solver's `v` lines into an assignment over declared variables.
    ///
    /// Variables not mentioned in the assignment default to false. Literals
    /// referring to auxiliary indices are ignored.
    pub fn decode_assignment(&self, solver_stdout: &str) -> BTreeMap<String, bool> {
        let mut by_index: HashMap<u32, &str> = HashMap::new();
        for (name, idx) in &self.var_map {
            by_index.insert(*idx, name.as_str());
        }

        let mut assignment: BTreeMap<String, bool> =
            self.var_map.keys().map(|k| (k.clone(), false)).collect();

        for line in solver_stdout.lines() {
            let rest = match line.trim_start().strip_prefix('v') {
                Some(r) => r,
                None => continue,
            };
            for tok in rest.split_whitespace() {
                let lit: i64 = match tok.parse() {
                    Ok(l) => l,
                    Err(_) => continue,
                };
                if lit == 0 {
                    continue;
                }
                let idx = lit.unsigned_abs() as u32;
                if let Some(name) = by_index.get(&idx) {
                    assignment.insert((*name).to_string(), lit > 0);
                }
            }
        }

        assignment
    }
}

// ── Compilation entry point ─────────────────────────────────────────────

/// Compile a model to CNF. All semantic errors are collected before any
/// encoding happens, so a failed compile produces no output at all.
pub fn compile(model: &Model) -> Result<CompiledModel, Vec<Diagnostic>> {
    // Pass 1: declaration table, catching re-declarations.
    let mut diags = Vec::new();
    let mut table: HashMap<&str, u32> = HashMap::new();
    let mut order: Vec<&Ident> = Vec::new();
    for ident in model.declared_vars() {
        if table.contains_key(ident.name.as_str()) {
            diags.push(
                Diagnostic::error(
                    ident.span,
                    format!("variable '{}' is declared twice", ident.name),
                )
                .with_hint("remove the duplicate declaration"),
            );
        } else {
            let idx = order.len() as u32 + 1;
            table.insert(ident.name.as_str(), idx);
            order.push(ident);
        }
    }

    // Pass 2: reference validation over every constraint.
    for constraint in model.constraints() {
        check_expr(&constraint.expr, &table, true, &mut diags);
    }
    if !diags.is_empty() {
        return Err(diags);
    }

    // Pass 3: encoding (infallible after validation).
    let mut enc = Encoder::new(&table, order.len() as u32);
    for constraint in model.constraints() {
        enc.top_level(&constraint.expr);
    }

    let num_user_vars = order.len() as u32;
    let num_aux_vars = enc.next_var - 1 - num_user_vars;
    let var_map = order
        .iter()
        .map(|id| (id.name.clone(), table[id.name.as_str()]))
        .collect();

    Ok(CompiledModel {
        cnf: Cnf {
            num_vars: enc.next_var - 1,
            clauses: enc.clauses,
        },
        var_map,
        num_user_vars,
        num_aux_vars,
    })
}

// ── Validation ──────────────────────────────────────────────────────────

/// `top` is true only along paths where a cardinality constraint keeps its
/// asserted polarity: the constraint root and the branches of a top-level
/// conjunction.
fn check_expr(expr: &Expr, table: &HashMap<&str, u32>, top: bool, diags: &mut Vec<Diagnostic>) {
    match expr {
        Expr::Var(id) => {
            if !table.contains_key(id.name.as_str()) {
                diags.push(
                    Diagnostic::error(id.span, format!("undeclared variable '{}'", id.name))
                        .with_hint(format!("declare it with 'var bool: {};'", id.name)),
                );
            }
        }
        Expr::Const(_, _) => {}
        Expr::Not(inner, _) => check_expr(inner, table, false, diags),
        Expr::And(terms, _) => {
            for t in terms {
                check_expr(t, table, top, diags);
            }
        }
        Expr::Or(terms, _) => {
            for t in terms {
                check_expr(t, table, false, diags);
            }
        }
        Expr::Implies(a, b, _) => {
            check_expr(a, table, false, diags);
            check_expr(b, table, false, diags);
        }
        Expr::Iff(a, b, _) | Expr::Xor(a, b, _) => {
            check_expr(a, table, false, diags);
            check_expr(b, table, false, diags);
        }
        Expr::Card(card) => {
            if !top {
                diags.push(
                    Diagnostic::error(
                        card.span,
                        format!(
                            "'{}' must appear at the top level of a constraint",
                            card.kind.keyword()
                        ),
                    )
                    .with_hint("cardinality constraints cannot be nested under operators"),
                );
            }
            for id in &card.vars {
                if !table.contains_key(id.name.as_str()) {
                    diags.push(
                        Diagnostic::error(id.span, format!("undeclared variable '{}'", id.name))
                            .with_hint(format!("declare it with 'var bool: {};'", id.name)),
                    );
                }
            }
        }
    }
}

// ── Encoder ─────────────────────────────────────────────────────────────

/// Pairwise encoding threshold: below this many variables (or for k = 1) the
/// binomial encoding beats the sequential counter's auxiliary overhead.
const PAIRWISE_LIMIT: usize = 10;

struct Encoder<'a> {
    table: &'a HashMap<&'a str, u32>,
    next_var: u32,
    clauses: Vec<Vec<i32>>,
    /// Memoised literal for the constant `true`.
    true_lit: Option<i32>,
}

impl<'a> Encoder<'a> {
    fn new(table: &'a HashMap<&'a str, u32>, num_user_vars: u32) -> Self {
        Encoder {
            table,
            next_var: num_user_vars + 1,
            clauses: Vec::new(),
            true_lit: None,
        }
    }

    fn fresh(&mut self) -> i32 {
        let v = self.next_var as i32;
        self.next_var += 1;
        v
    }

    fn emit(&mut self, clause: Vec<i32>) {
        self.clauses.push(clause);
    }

    fn var_lit(&self, id: &Ident) -> i32 {
        self.table[id.name.as_str()] as i32
    }

    /// Compile a top-level constraint: flatten conjunctions, encode
    /// cardinality atoms directly, and assert everything else via a unit
    /// clause over its Tseitin literal.
    fn top_level(&mut self, expr: &Expr) {
        match expr {
            Expr::And(terms, _) => {
                for t in terms {
                    self.top_level(t);
                }
            }
            Expr::Card(card) => self.cardinality(card),
            other => {
                let lit = self.tseitin(other);
                self.emit(vec![lit]);
            }
        }
    }

    /// Translate an expression to a literal, emitting defining clauses for
    /// every non-atom subexpression.
    fn tseitin(&mut self, expr: &Expr) -> i32 {
        match expr {
            Expr::Var(id) => self.var_lit(id),
            Expr::Const(value, _) => {
                let t = self.constant_true();
                if *value {
                    t
                } else {
                    -t
                }
            }
            Expr::Not(inner, _) => -self.tseitin(inner),
            Expr::And(terms, _) => {
                let lits: Vec<i32> = terms.iter().map(|t| self.tseitin(t)).collect();
                let y = self.fresh();
                for &l in &lits {
                    self.emit(vec![-y, l]);
                }
                let mut long = vec![y];
                long.extend(lits.iter().map(|&l| -l));
                self.emit(long);
                y
            }
            Expr::Or(terms, _) => {
                let lits: Vec<i32> = terms.iter().map(|t| self.tseitin(t)).collect();
                let y = self.fresh();
                let mut long = vec![-y];
                long.extend(&lits);
                self.emit(long);
                for &l in &lits {
                    self.emit(vec![y, -l]);
                }
                y
            }
            Expr::Implies(a, b, _) => {
                let la = self.tseitin(a);
                let lb = self.tseitin(b);
                let y = self.fresh();
                self.emit(vec![-y, -la, lb]);
                self.emit(vec![y, la]);
                self.emit(vec![y, -lb]);
                y
            }
            Expr::Iff(a, b, _) => {
                let la = self.tseitin(a);
                let lb = self.tseitin(b);
                let y = self.fresh();
                self.emit(vec![-y, -la, lb]);
                self.emit(vec![-y, la, -lb]);
                self.emit(vec![y, la, lb]);
                self.emit(vec![y, -la, -lb]);
                y
            }
            Expr::Xor(a, b, _) => {
                let la = self.tseitin(a);
                let lb = self.tseitin(b);
                let y = self.fresh();
                self.emit(vec![-y, la, lb]);
                self.emit(vec![-y, -la, -lb]);
                self.emit(vec![y, -la, lb]);
                self.emit(vec![y, la, -lb]);
                y
            }
            // Rejected during validation.
            Expr::Card(card) => {
                debug_assert!(false, "nested cardinality survived validation");
                let _ = card;
                self.constant_true()
            }
        }
    }

    fn constant_true(&mut self) -> i32 {
        if let Some(t) = self.true_lit {
            return t;
        }
        let t = self.fresh();
        self.emit(vec![t]);
        self.true_lit = Some(t);
        t
    }

    // ── Cardinality encodings ───────────────────────────────────────────

    fn cardinality(&mut self, card: &CardExpr) {
        let lits: Vec<i32> = card.vars.iter().map(|id| self.var_lit(id)).collect();
        let k = card.bound as usize;
        match card.kind {
            CardKind::AtMost => self.at_most(k, &lits),
            CardKind::AtLeast => self.at_least(k, &lits),
            CardKind::Exactly => {
                self.at_most(k, &lits);
                self.at_least(k, &lits);
            }
        }
    }

    /// `atmost(k, lits)`: trivial for k ≥ n; unit negations for k = 0;
    /// pairwise for small n or k = 1; sequential counter otherwise.
    fn at_most(&mut self, k: usize, lits: &[i32]) {
        let n = lits.len();
        if k >= n {
            return;
        }
        if k == 0 {
            for &l in lits {
                self.emit(vec![-l]);
            }
            return;
        }
        if n <= PAIRWISE_LIMIT || k == 1 {
            self.at_most_pairwise(k, lits);
        } else {
            self.at_most_sequential(k, lits);
        }
    }

    /// Binomial encoding: forbid every (k+1)-subset from being all true.
    fn at_most_pairwise(&mut self, k: usize, lits: &[i32]) {
        let n = lits.len();
        let m = k + 1;
        let mut idx: Vec<usize> = (0..m).collect();
        loop {
            self.emit(idx.iter().map(|&i| -lits[i]).collect());

            // Advance to the next m-combination of 0..n in lexicographic order.
            let mut i = m;
            loop {
                i -= 1;
                if idx[i] != i + n - m {
                    break;
                }
                if i == 0 {
                    return;
                }
            }
            idx[i] += 1;
            for j in i + 1..m {
                idx[j] = idx[j - 1] + 1;
            }
        }
    }

    /// Sequential counter (Sinz 2005): registers `s[i][j]` assert that at
    /// least j+1 of the first i+1 literals are true; the forbid clause blocks
    /// literal i+1 when the first i already reached the bound.
    fn at_most_sequential(&mut self, k: usize, lits: &[i32]) {
        let n = lits.len();
        // Registers for the first n-1 positions only.
        let mut s = vec![vec![0i32; k]; n - 1];
        for row in s.iter_mut() {
            for slot in row.iter_mut() {
                *slot = self.fresh();
            }
        }

        self.emit(vec![-lits[0], s[0][0]]);
        for j in 1..k {
            self.emit(vec![-s[0][j]]);
        }
        for i in 1..n - 1 {
            self.emit(vec![-lits[i], s[i][0]]);
            self.emit(vec![-s[i - 1][0], s[i][0]]);
            for j in 1..k {
                self.emit(vec![-lits[i], -s[i - 1][j - 1], s[i][j]]);
                self.emit(vec![-s[i - 1][j], s[i][j]]);
            }
            self.emit(vec![-lits[i], -s[i - 1][k - 1]]);
        }
        self.emit(vec![-lits[n - 1], -s[n - 2][k - 1]]);
    }

    /// `atleast(k, lits)` via dual auxiliaries: introduce d with d ↔ ¬v for
    /// each variable, then require atmost(n − k) of the duals.
    fn at_least(&mut self, k: usize, lits: &[i32]) {
        let n = lits.len();
        if k == 0 {
            return;
        }
        if k > n {
            // Unsatisfiable by construction.
            self.emit(Vec::new());
            return;
        }
        let duals: Vec<i32> = lits
            .iter()
            .map(|&l| {
                let d = self.fresh();
                self.emit(vec![d, l]);
                self.emit(vec![-d, -l]);
                d
            })
            .collect();
        self.at_most(n - k, &duals);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
