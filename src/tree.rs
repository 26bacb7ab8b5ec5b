//! Witness-tree reconstruction and flattening.
//!
//! After CYK establishes the minimum distance, one derivation witnessing it
//! is rebuilt from the matrix, then flattened in order to the corrected
//! string: deleted characters reappear from the edit provenance, spurious
//! characters become gap markers, and substituted characters are replaced
//! by an in-language terminal.

use crate::cyk::Matrix;
use crate::error::{GrammarError, Result};
use crate::grammar::{Grammar, Production, Rhs};
use crate::symbol::{GAP, Symbol};
use log::debug;

/// A node of the witness derivation tree.
///
/// Leaves carry a terminal-producing production and cover one input
/// character; interior nodes carry a binary production and both children.
#[derive(Debug, Clone)]
pub struct Node {
    pub start: usize,
    pub end: usize,
    pub production: Production,
    pub left: Option<Box<Node>>,
    pub right: Option<Box<Node>>,
}

impl Node {
    fn leaf(start: usize, end: usize, production: Production) -> Self {
        Self {
            start,
            end,
            production,
            left: None,
            right: None,
        }
    }

    /// Recovers one derivation of `symbol` over span (start, end) at exactly
    /// the given cost.
    ///
    /// Fails with `TreeReconstruction` when the matrix holds the cost but no
    /// production decomposes it, which signals an inconsistency between the
    /// matrix and the grammar.
    pub fn reconstruct(
        matrix: &Matrix,
        grammar: &Grammar,
        symbol: Symbol,
        start: usize,
        end: usize,
        errors: u32,
        input: &[char],
    ) -> Result<Node> {
        if end == start + 1 {
            if matrix.get(start, end).get(&symbol) == Some(&errors) {
                if let Some(production) = leaf_production(grammar, symbol, input[start - 1], errors)
                {
                    return Ok(Node::leaf(start, end, production));
                }
            }
            return Err(GrammarError::TreeReconstruction {
                symbol,
                start,
                end,
                errors,
            });
        }

        let Some((production, split, left_errors, right_errors)) =
            split_point(matrix, grammar, symbol, start, end, errors)
        else {
            return Err(GrammarError::TreeReconstruction {
                symbol,
                start,
                end,
                errors,
            });
        };
        let Rhs::Pair(left_symbol, right_symbol) = production.rhs else {
            unreachable!("split_point only returns binary rules");
        };

        let left = Self::reconstruct(
            matrix,
            grammar,
            left_symbol,
            start,
            split,
            left_errors,
            input,
        )?;
        let right = Self::reconstruct(
            matrix,
            grammar,
            right_symbol,
            split,
            end,
            right_errors,
            input,
        )?;
        Ok(Self {
            start,
            end,
            production,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        })
    }
}

/// Finds the first split point and binary rule of `symbol` that reproduce
/// `errors` over the span. Early return stands in for the original's
/// thrown sentinel.
fn split_point(
    matrix: &Matrix,
    grammar: &Grammar,
    symbol: Symbol,
    start: usize,
    end: usize,
    errors: u32,
) -> Option<(Production, usize, u32, u32)> {
    for split in start + 1..end {
        for production in grammar.binary_productions() {
            if production.lhs != symbol {
                continue;
            }
            let Rhs::Pair(left, right) = production.rhs else {
                continue;
            };
            let (Some(&left_errors), Some(&right_errors)) = (
                matrix.get(start, split).get(&left),
                matrix.get(split, end).get(&right),
            ) else {
                continue;
            };
            if production.errors + left_errors + right_errors == errors {
                return Some((production.clone(), split, left_errors, right_errors));
            }
        }
    }
    None
}

/// The terminal production of `symbol` that matched `c` at this cost.
///
/// Exact character match first; a character outside the alphabet matched
/// through a spurious/wrong-character rule at its stored cost or through an
/// ordinary terminal rule one substitution dearer (mirroring the fill pass),
/// so the leaf keeps the provenance of whichever rule priced it.
fn leaf_production(grammar: &Grammar, symbol: Symbol, c: char, errors: u32) -> Option<Production> {
    if let Some(production) = grammar.get(symbol, Rhs::Terminal(c)) {
        if production.errors == errors {
            return Some(production.clone());
        }
    }
    if !grammar.chars().contains(&c) {
        return grammar
            .terminal_productions_of(symbol)
            .filter(|p| matches!(p.rhs, Rhs::Terminal(_)))
            .find(|p| {
                if p.edits.inserted || p.edits.replaced.is_some() {
                    p.errors == errors
                } else {
                    p.errors + 1 == errors
                }
            })
            .cloned();
    }
    None
}

/// Flattens a witness tree to the corrected string I′.
///
/// Inorder concatenation of leaf corrections, wrapped at every node in the
/// characters its production's provenance deleted before and after it.
pub fn flatten(node: &Node, grammar: &Grammar) -> String {
    let edits = &node.production.edits;
    let body = match (&node.left, &node.right) {
        (Some(left), Some(right)) => flatten(left, grammar) + &flatten(right, grammar),
        _ => leaf_correction(&node.production, grammar),
    };
    format!("{}{}{}", edits.prefix, body, edits.suffix)
}

/// The corrected character a leaf contributes.
///
/// A leaf keeps its character unless its rule is marked: spurious
/// characters become the gap marker, and substituted characters are
/// replaced by a zero-cost terminal of the same lhs, falling back to the
/// gap when the lhs has none.
fn leaf_correction(production: &Production, grammar: &Grammar) -> String {
    if production.edits.inserted {
        return GAP.to_string();
    }
    if production.edits.replaced.is_none() {
        if let Rhs::Terminal(c) = production.rhs {
            return c.to_string();
        }
    }
    match substitute(grammar, production.lhs) {
        Ok(c) => c.to_string(),
        Err(e) => {
            debug!("{}", e);
            GAP.to_string()
        }
    }
}

/// A zero-cost terminal character derivable from `lhs`.
fn substitute(grammar: &Grammar, lhs: Symbol) -> Result<char> {
    grammar
        .zero_cost_terminal(lhs)
        .ok_or(GrammarError::MissingZeroCostTerminal { symbol: lhs })
}
