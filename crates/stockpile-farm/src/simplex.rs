//! Dense two-phase simplex solver for small minimization programs.
//!
//! The farm planner's programs are tiny (tens of variables, tens of
//! constraints), so a dense tableau with Bland's anti-cycling rule is both
//! simple and fast enough. Phase 1 minimizes the sum of artificial variables
//! to find a basic feasible point; phase 2 minimizes the caller's objective
//! from there.
//!
//! All structural variables are implicitly non-negative.

use std::time::Instant;

const EPS: f64 = 1e-9;

/// Iterations before the solve is abandoned even without a deadline.
/// Bland's rule guarantees termination, but a runaway program should
/// surface as a timeout rather than a hang.
const MAX_ITERATIONS: usize = 50_000;

/// Constraint sense. `Le` rows arise internally from sign normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Ge,
    Eq,
}

/// One linear constraint: `sum(coeff * var) relation rhs`.
/// Coefficients are sparse `(variable index, coefficient)` pairs.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub coeffs: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// A minimization program over `num_vars` non-negative variables.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    pub num_vars: usize,
    /// Objective coefficients, one per variable.
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
}

/// Result of a solve. Only `Optimal` carries a solution.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal { objective: f64, values: Vec<f64> },
    Infeasible,
    Unbounded,
    TimedOut,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Le,
    Ge,
    Eq,
}

/// Solve `lp`, giving up at `deadline` if one is set.
pub fn solve(lp: &LinearProgram, deadline: Option<Instant>) -> SolveOutcome {
    let n = lp.num_vars;
    let m = lp.constraints.len();

    // Normalize every row to rhs >= 0; flipping a Ge row's sign makes it Le.
    let mut rows: Vec<(Vec<f64>, RowKind, f64)> = Vec::with_capacity(m);
    for c in &lp.constraints {
        let mut dense = vec![0.0; n];
        for &(j, coeff) in &c.coeffs {
            dense[j] += coeff;
        }
        let mut kind = match c.relation {
            Relation::Ge => RowKind::Ge,
            Relation::Eq => RowKind::Eq,
        };
        let mut rhs = c.rhs;
        if rhs < 0.0 {
            rhs = -rhs;
            for v in &mut dense {
                *v = -*v;
            }
            kind = match kind {
                RowKind::Ge => RowKind::Le,
                RowKind::Le => RowKind::Ge,
                RowKind::Eq => RowKind::Eq,
            };
        }
        rows.push((dense, kind, rhs));
    }

    // Column layout: structural | slack/surplus | artificial.
    let num_slack = rows
        .iter()
        .filter(|(_, kind, _)| *kind != RowKind::Eq)
        .count();
    let num_artificial = rows
        .iter()
        .filter(|(_, kind, _)| *kind != RowKind::Le)
        .count();
    let total = n + num_slack + num_artificial;

    let mut tableau: Vec<Vec<f64>> = Vec::with_capacity(m);
    let mut basis: Vec<usize> = Vec::with_capacity(m);
    let mut slack_at = n;
    let mut art_at = n + num_slack;
    let artificial_start = n + num_slack;

    for (dense, kind, rhs) in &rows {
        let mut row = vec![0.0; total + 1];
        row[..n].copy_from_slice(dense);
        row[total] = *rhs;
        match kind {
            RowKind::Le => {
                row[slack_at] = 1.0;
                basis.push(slack_at);
                slack_at += 1;
            }
            RowKind::Ge => {
                row[slack_at] = -1.0;
                slack_at += 1;
                row[art_at] = 1.0;
                basis.push(art_at);
                art_at += 1;
            }
            RowKind::Eq => {
                row[art_at] = 1.0;
                basis.push(art_at);
                art_at += 1;
            }
        }
        tableau.push(row);
    }

    // Phase 1: minimize the sum of artificials.
    if num_artificial > 0 {
        let mut obj = vec![0.0; total + 1];
        for j in artificial_start..total {
            obj[j] = 1.0;
        }
        // Price out the basic artificials so reduced costs start consistent.
        for (i, &b) in basis.iter().enumerate() {
            if b >= artificial_start {
                for j in 0..=total {
                    obj[j] -= tableau[i][j];
                }
            }
        }
        match run_phase(&mut tableau, &mut basis, &mut obj, total, None, deadline) {
            PhaseEnd::Done => {}
            PhaseEnd::Unbounded => return SolveOutcome::Infeasible,
            PhaseEnd::TimedOut => return SolveOutcome::TimedOut,
        }
        if -obj[total] > EPS {
            return SolveOutcome::Infeasible;
        }
        // Pivot lingering artificials out of the basis where possible; rows
        // with no structural pivot are redundant and harmless.
        for i in 0..m {
            if basis[i] >= artificial_start {
                if let Some(j) = (0..artificial_start).find(|&j| tableau[i][j].abs() > EPS) {
                    pivot(&mut tableau, &mut basis, i, j, total);
                }
            }
        }
    }

    // Phase 2: minimize the real objective, artificials barred from entering.
    let mut obj = vec![0.0; total + 1];
    obj[..n].copy_from_slice(&lp.objective);
    for (i, &b) in basis.iter().enumerate() {
        if obj[b].abs() > EPS {
            let factor = obj[b];
            for j in 0..=total {
                obj[j] -= factor * tableau[i][j];
            }
        }
    }
    match run_phase(
        &mut tableau,
        &mut basis,
        &mut obj,
        total,
        Some(artificial_start),
        deadline,
    ) {
        PhaseEnd::Done => {}
        PhaseEnd::Unbounded => return SolveOutcome::Unbounded,
        PhaseEnd::TimedOut => return SolveOutcome::TimedOut,
    }

    let mut values = vec![0.0; n];
    for (i, &b) in basis.iter().enumerate() {
        if b < n {
            values[b] = tableau[i][total];
        }
    }
    SolveOutcome::Optimal {
        objective: -obj[total],
        values,
    }
}

enum PhaseEnd {
    Done,
    Unbounded,
    TimedOut,
}

/// Run simplex iterations until optimal. `barred_from` excludes columns at
/// or past that index from entering (phase 2 bars artificials).
fn run_phase(
    tableau: &mut [Vec<f64>],
    basis: &mut [usize],
    obj: &mut [f64],
    total: usize,
    barred_from: Option<usize>,
    deadline: Option<Instant>,
) -> PhaseEnd {
    let limit = barred_from.unwrap_or(total);
    for iteration in 0.. {
        if iteration >= MAX_ITERATIONS {
            return PhaseEnd::TimedOut;
        }
        // Checking the clock every iteration would dominate small solves.
        if iteration % 64 == 0 {
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return PhaseEnd::TimedOut;
                }
            }
        }

        // Bland's rule: smallest improving column index.
        let Some(entering) = (0..limit).find(|&j| obj[j] < -EPS) else {
            return PhaseEnd::Done;
        };

        // Ratio test; ties broken on the smallest basis index (Bland again).
        let mut leaving: Option<(usize, f64)> = None;
        for (i, row) in tableau.iter().enumerate() {
            let a = row[entering];
            if a > EPS {
                let ratio = row[total] / a;
                let better = match leaving {
                    None => true,
                    Some((li, lr)) => {
                        ratio < lr - EPS || (ratio < lr + EPS && basis[i] < basis[li])
                    }
                };
                if better {
                    leaving = Some((i, ratio));
                }
            }
        }
        let Some((leaving, _)) = leaving else {
            return PhaseEnd::Unbounded;
        };

        pivot_with_obj(tableau, basis, obj, leaving, entering, total);
    }
    PhaseEnd::Done
}

fn pivot(tableau: &mut [Vec<f64>], basis: &mut [usize], row: usize, col: usize, total: usize) {
    let factor = tableau[row][col];
    for v in &mut tableau[row] {
        *v /= factor;
    }
    let pivot_row = tableau[row].clone();
    for (i, r) in tableau.iter_mut().enumerate() {
        if i != row {
            let f = r[col];
            if f.abs() > EPS {
                for j in 0..=total {
                    r[j] -= f * pivot_row[j];
                }
            }
        }
    }
    basis[row] = col;
}

fn pivot_with_obj(
    tableau: &mut [Vec<f64>],
    basis: &mut [usize],
    obj: &mut [f64],
    row: usize,
    col: usize,
    total: usize,
) {
    pivot(tableau, basis, row, col, total);
    let f = obj[col];
    if f.abs() > EPS {
        for j in 0..=total {
            obj[j] -= f * tableau[row][j];
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
