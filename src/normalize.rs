//! Normalization of the covering grammar.
//!
//! Two passes bring G′ to a Chomsky-like form while preserving minimum-cost
//! derivations: ε-production elimination folds the cost of deriving nothing
//! into the rules that relied on it, and unit-production elimination
//! distributes each unit target's rules into the unit's left-hand side. Both
//! passes propagate edit costs and provenance through [`Grammar::try_add`].

use crate::grammar::{Edits, Grammar, Production, Rhs, Stage};
use crate::symbol::{START, Symbol};
use log::debug;
use std::collections::HashSet;

/// Pass 1: removes every ε-production, folding its cost into the rules that
/// could derive it.
///
/// Returns the start symbol's minimum-cost ε record, taken before the index
/// is cleared. A `None` means the start symbol cannot reach ε even through
/// weighted deletions, i.e. the grammar derives no terminal string at all.
pub fn eliminate_epsilon_productions(grammar: &mut Grammar) -> Option<Production> {
    debug_assert_eq!(grammar.stage(), Stage::Covered);

    discover_nullable(grammar);
    propagate_nullable(grammar);

    let start_epsilon = grammar.nullable(START).cloned();
    let epsilon_rules: Vec<Production> = grammar.nullables().cloned().collect();
    for production in &epsilon_rules {
        grammar.remove_production(production);
    }

    grammar.advance_stage(Stage::EpsilonFree);
    debug!(
        "ε-elimination: dropped {} rules, {} remain",
        epsilon_rules.len(),
        grammar.len()
    );
    start_epsilon
}

/// Completes the nullable index by minimum-cost relaxation.
///
/// Direct ε-rules are already indexed by the store. A unit rule over a
/// nullable target proposes an ε-rule inheriting the target's cost and
/// deleted characters; a binary rule over two nullable children proposes
/// their sum. Proposals repeat until none improves the index, so cycles
/// starve instead of recursing and every entry ends at its minimum.
fn discover_nullable(grammar: &mut Grammar) {
    let mut changed = true;
    while changed {
        changed = false;

        let mut candidates: Vec<Production> = Vec::new();
        for production in grammar.unit_productions() {
            let Rhs::Unit(target) = production.rhs else {
                continue;
            };
            if let Some(null) = grammar.nullable(target) {
                candidates.push(Production::with_edits(
                    production.lhs,
                    Rhs::Epsilon,
                    production.errors + null.errors,
                    Edits {
                        prefix: null.edits.deleted(),
                        ..Edits::default()
                    },
                ));
            }
        }
        for production in grammar.binary_productions() {
            let Rhs::Pair(left, right) = production.rhs else {
                continue;
            };
            if let (Some(null_left), Some(null_right)) =
                (grammar.nullable(left), grammar.nullable(right))
            {
                candidates.push(Production::with_edits(
                    production.lhs,
                    Rhs::Epsilon,
                    production.errors + null_left.errors + null_right.errors,
                    Edits {
                        prefix: null_left.edits.deleted() + &null_right.edits.deleted(),
                        ..Edits::default()
                    },
                ));
            }
        }

        for candidate in candidates {
            changed |= grammar.try_add(candidate);
        }
    }
}

/// For every binary rule over a nullable child, introduces the unit rule
/// that derivation becomes once the child is folded away.
fn propagate_nullable(grammar: &mut Grammar) {
    let binaries: Vec<Production> = grammar.binary_productions().cloned().collect();
    for production in binaries {
        let Rhs::Pair(left, right) = production.rhs else {
            continue;
        };
        if let Some(null) = grammar.nullable(left).cloned() {
            grammar.try_add(Production::with_edits(
                production.lhs,
                Rhs::Unit(right),
                production.errors + null.errors,
                Edits {
                    prefix: null.edits.deleted() + &production.edits.prefix,
                    suffix: production.edits.suffix.clone(),
                    replaced: None,
                    inserted: false,
                },
            ));
        }
        if let Some(null) = grammar.nullable(right).cloned() {
            grammar.try_add(Production::with_edits(
                production.lhs,
                Rhs::Unit(left),
                production.errors + null.errors,
                Edits {
                    prefix: production.edits.prefix.clone(),
                    suffix: null.edits.deleted() + &production.edits.suffix,
                    replaced: None,
                    inserted: false,
                },
            ));
        }
    }
}

/// Pass 2: removes every unit production, distributing each target's rules
/// into the unit's left-hand side with summed cost and composed provenance.
pub fn eliminate_unit_productions(grammar: &mut Grammar) {
    debug_assert_eq!(grammar.stage(), Stage::EpsilonFree);

    let roots: Vec<Production> = grammar.unit_productions().cloned().collect();
    let mut visiting: HashSet<(Symbol, Rhs)> = HashSet::new();
    for root in &roots {
        let Rhs::Unit(target) = root.rhs else {
            continue;
        };
        debug_assert!(visiting.is_empty());
        distribute_unit(
            grammar,
            root.lhs,
            root.errors,
            &root.edits,
            target,
            &mut visiting,
        );
    }

    let units: Vec<Production> = grammar.unit_productions().cloned().collect();
    for production in &units {
        grammar.remove_production(production);
    }

    grammar.advance_stage(Stage::UnitFree);
    debug_assert!(
        grammar
            .all_productions()
            .all(|p| matches!(p.rhs, Rhs::Terminal(_) | Rhs::Pair(..))),
        "normalization must leave only terminal and binary rules"
    );
    debug!(
        "unit elimination: dropped {} rules, {} remain",
        units.len(),
        grammar.len()
    );
}

/// Folds the productions reachable from `target` into `top`, accumulating
/// the chain's cost and deleted characters.
///
/// Provenance composes as: prefix = chain prefix + inner prefix, suffix =
/// inner suffix + chain suffix, substitution and insertion marks from the
/// inner rule. Unit targets recurse; the visitation set is keyed by the unit
/// production's identity and unwound on frame exit, so separate roots
/// explore independently while cycles terminate.
fn distribute_unit(
    grammar: &mut Grammar,
    top: Symbol,
    errors: u32,
    edits: &Edits,
    target: Symbol,
    visiting: &mut HashSet<(Symbol, Rhs)>,
) {
    let productions: Vec<Production> = grammar.productions_of(target).cloned().collect();
    for production in productions {
        match production.rhs {
            Rhs::Epsilon => {}
            Rhs::Unit(next) => {
                let key = (production.lhs, production.rhs);
                if visiting.insert(key) {
                    let chained = Edits {
                        prefix: edits.prefix.clone() + &production.edits.prefix,
                        suffix: production.edits.suffix.clone() + &edits.suffix,
                        replaced: None,
                        inserted: false,
                    };
                    distribute_unit(
                        grammar,
                        top,
                        errors + production.errors,
                        &chained,
                        next,
                        visiting,
                    );
                    visiting.remove(&key);
                }
            }
            Rhs::Terminal(_) | Rhs::Pair(..) => {
                grammar.try_add(Production::with_edits(
                    top,
                    production.rhs,
                    errors + production.errors,
                    Edits {
                        prefix: edits.prefix.clone() + &production.edits.prefix,
                        suffix: production.edits.suffix.clone() + &edits.suffix,
                        replaced: production.edits.replaced,
                        inserted: production.edits.inserted,
                    },
                ));
            }
        }
    }
}
