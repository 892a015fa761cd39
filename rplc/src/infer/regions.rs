//! Region argument inference.
//!
//! Every flow `target ⊒ source` whose target slot is an inference variable
//! is a lower bound for that variable. Variables are solved to the least
//! upper bound of their lower bounds, iterating until nothing changes.
//! A variable nobody flows into gets a synthesized region of its own.

use tracing::{debug, trace, warn};

use crate::check::collect::Facts;
use crate::check::regions::RegionTable;
use crate::rpl::{lub, RegionScopes, RegionVarId, Rpl};

/// Rounds of the lower-bound fixed point before giving up.
const MAX_ROUNDS: usize = 256;

/// Outcome of [`solve_regions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSolution {
    pub solved: Vec<Rpl>,
    /// Regions synthesized for unconstrained variables.
    pub synthesized: usize,
    /// Some lower bounds had no common upper bound.
    pub best_effort: bool,
    /// Lower-bound rounds run, over all synthesis steps.
    pub rounds: usize,
}

impl RegionSolution {
    pub fn get(&self, var: RegionVarId) -> Option<&Rpl> {
        self.solved.get(var.0 as usize)
    }

    /// Replace a solved head variable, keeping the suffix.
    pub fn apply(&self, rpl: &Rpl) -> Rpl {
        match rpl.head_var().and_then(|var| self.get(var)) {
            Some(solution) => rpl.replace_head(solution),
            None => rpl.clone(),
        }
    }
}

/// Solve the inference variables of `table` and rewrite them away in both
/// the table and the collected facts.
pub fn solve_regions(table: &mut RegionTable, scopes: &mut RegionScopes, facts: &mut Facts) -> RegionSolution {
    let vars = table.vars().to_vec();
    if vars.is_empty() {
        return RegionSolution::default();
    }

    let mut lower: Vec<Vec<Rpl>> = vec![Vec::new(); vars.len()];
    for flow in &facts.flows {
        for (target, source) in flow.pairs() {
            if let Some(var) = target.head_var() {
                if target.tail().is_empty() && source != target {
                    lower[var.0 as usize].push(source.clone());
                }
            }
        }
    }

    let mut solution: Vec<Option<Rpl>> = vec![None; vars.len()];
    // Variables pinned to `Global` after a conflict. Never joined again.
    let mut conflicted = vec![false; vars.len()];
    let mut best_effort = false;
    let mut synthesized = 0;
    let mut total_rounds = 0;
    loop {
        let mut rounds = 0;
        let mut changed = true;
        while changed {
            if rounds == MAX_ROUNDS {
                warn!(rounds, "region inference did not converge; keeping the current solution");
                best_effort = true;
                break;
            }
            rounds += 1;
            changed = false;
            for (var, bounds) in lower.iter().enumerate() {
                for bound in bounds {
                    if conflicted[var] {
                        break;
                    }
                    let Some(bound) = resolve(bound, &solution) else {
                        continue;
                    };
                    let next = match &solution[var] {
                        None => bound,
                        Some(current) => match lub(current, &bound) {
                            Some(joined) => joined,
                            None => {
                                trace!(var, %current, %bound, "conflicting lower bounds; falling back to Global");
                                best_effort = true;
                                conflicted[var] = true;
                                Rpl::global()
                            }
                        },
                    };
                    if solution[var].as_ref() != Some(&next) {
                        solution[var] = Some(next);
                        changed = true;
                    }
                }
            }
        }
        total_rounds += rounds;

        // Synthesize one region at a time: it may bound other variables.
        let Some(var) = solution.iter().position(Option::is_none) else {
            break;
        };
        let origin = &vars[var];
        let region = scopes.synthesize(&origin.hint, origin.scope);
        trace!(var, region = %region.name, "synthesized region");
        solution[var] = Some(Rpl::region(region));
        synthesized += 1;
    }

    let solution = RegionSolution {
        solved: solution.into_iter().map(|s| s.unwrap_or_else(Rpl::global)).collect(),
        synthesized,
        best_effort,
        rounds: total_rounds,
    };
    let apply = |rpl: &Rpl| solution.apply(rpl);
    table.map_rpls(&apply);
    facts.map_rpls(&apply);
    debug!(
        vars = solution.solved.len(),
        synthesized,
        best_effort,
        rounds = solution.rounds,
        "solved region arguments"
    );
    solution
}

/// A lower bound with solved variables substituted; `None` while it still
/// depends on an unsolved one.
fn resolve(bound: &Rpl, solution: &[Option<Rpl>]) -> Option<Rpl> {
    match bound.head_var() {
        Some(var) => solution
            .get(var.0 as usize)
            .and_then(Option::as_ref)
            .map(|solved| bound.replace_head(solved)),
        None => Some(bound.clone()),
    }
}
