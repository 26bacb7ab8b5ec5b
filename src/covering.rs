//! Covering-grammar construction.
//!
//! Derives from a grammar G a covering grammar G′ that parses every string,
//! with production costs arranged so that the minimum-cost derivation of an
//! input equals its edit distance to L(G). Insertions are modeled by the
//! reserved `H`/`I` subgrammar, deletions by weighted ε-rules, and
//! substitutions by weighted terminal rules carrying the replaced character.

use crate::grammar::{Edits, Grammar, Production, Rhs, Stage};
use crate::symbol::{INSERTION, INSERTION_BLOCK, Symbol};
use log::debug;

/// Builds the covering grammar G′ for `grammar`.
///
/// The order of additions matters: the seed copy first, then the insertion
/// machinery, then the per-terminal-rule error rules. Everything after the
/// seed goes through [`Grammar::try_add`] so that when the same (lhs, rhs)
/// arises more than one way the minimum cost wins.
pub fn construct_covering(grammar: &Grammar) -> Grammar {
    debug_assert_eq!(grammar.stage(), Stage::Building);
    let mut covering = grammar.clone();

    // H derives any nonempty block of characters at one error each
    covering.add_production(Production::new(
        INSERTION_BLOCK,
        Rhs::Pair(INSERTION_BLOCK, INSERTION),
        0,
    ));
    covering.add_production(Production::new(INSERTION_BLOCK, Rhs::Unit(INSERTION), 0));
    for &c in grammar.chars() {
        covering.add_production(Production::with_edits(
            INSERTION,
            Rhs::Terminal(c),
            1,
            Edits {
                inserted: true,
                ..Edits::default()
            },
        ));
    }

    // ε-rhs rules of the seed are skipped here: deleting or substituting a
    // character the rule never derives is meaningless
    let terminal_rules: Vec<(Symbol, char)> = grammar
        .terminal_productions()
        .filter_map(|p| match p.rhs {
            Rhs::Terminal(c) => Some((p.lhs, c)),
            _ => None,
        })
        .collect();

    for (lhs, c) in terminal_rules {
        // spurious characters before or after a real derivation of lhs
        covering.try_add(Production::new(lhs, Rhs::Pair(lhs, INSERTION_BLOCK), 0));
        covering.try_add(Production::new(lhs, Rhs::Pair(INSERTION_BLOCK, lhs), 0));
        // deletion of c from the derived string
        covering.try_add(Production::with_edits(
            lhs,
            Rhs::Epsilon,
            1,
            Edits {
                prefix: c.to_string(),
                ..Edits::default()
            },
        ));
        // substitution of c by any other alphabet character
        for &other in grammar.chars().iter().filter(|&&other| other != c) {
            covering.try_add(Production::with_edits(
                lhs,
                Rhs::Terminal(other),
                1,
                Edits {
                    replaced: Some(c),
                    ..Edits::default()
                },
            ));
        }
    }

    covering.advance_stage(Stage::Covered);
    debug!(
        "covering grammar: {} productions over {} characters",
        covering.len(),
        covering.chars().len()
    );
    covering
}
