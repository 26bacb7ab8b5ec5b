//! Error-correcting CYK parser.
//!
//! A weighted bottom-up parse over the normalized covering grammar: the
//! minimum cost at which the start symbol derives the whole input equals the
//! input's edit distance to the language of the original grammar.

use crate::covering::construct_covering;
use crate::error::{GrammarError, Result};
use crate::grammar::{Grammar, Production, Rhs};
use crate::normalize::{eliminate_epsilon_productions, eliminate_unit_productions};
use crate::symbol::{GAP, START, Symbol};
use crate::tree::{Node, flatten};
use log::debug;
use std::collections::HashMap;

/// Parse matrix: upper-triangular cells indexed by (i, j) with
/// 1 ≤ i < j ≤ n+1, each mapping a nonterminal to the best cost at which it
/// derives the input slice w[i..j−1].
pub struct Matrix {
    size: usize,
    cells: Vec<HashMap<Symbol, u32>>,
}

impl Matrix {
    fn new(input_len: usize) -> Self {
        let size = input_len + 2;
        Self {
            size,
            cells: vec![HashMap::new(); size * size],
        }
    }

    /// The cell covering span (i, j).
    pub fn get(&self, i: usize, j: usize) -> &HashMap<Symbol, u32> {
        &self.cells[i * self.size + j]
    }

    /// Records `symbol` over span (i, j), keeping the minimum cost.
    fn insert(&mut self, symbol: Symbol, i: usize, j: usize, errors: u32) {
        let cell = &mut self.cells[i * self.size + j];
        match cell.get(&symbol) {
            Some(&stored) if stored <= errors => {}
            _ => {
                cell.insert(symbol, errors);
            }
        }
    }
}

/// Span index mirroring the matrix but keyed by symbol, for enumerating all
/// spans a nonterminal covers during combination.
struct Lookup {
    entries: HashMap<Symbol, HashMap<(usize, usize), u32>>,
}

impl Lookup {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn insert(&mut self, symbol: Symbol, i: usize, j: usize, errors: u32) {
        let spans = self.entries.entry(symbol).or_default();
        match spans.get(&(i, j)) {
            Some(&stored) if stored <= errors => {}
            _ => {
                spans.insert((i, j), errors);
            }
        }
    }

    fn spans(&self, symbol: Symbol) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        self.entries
            .get(&symbol)
            .into_iter()
            .flat_map(|spans| spans.iter().map(|(&(i, j), &errors)| (i, j, errors)))
    }

    fn best(&self, symbol: Symbol, i: usize, j: usize) -> Option<u32> {
        self.entries.get(&symbol)?.get(&(i, j)).copied()
    }
}

/// Outcome of parsing one input string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    /// The original input
    pub input: String,
    /// The corrected string I′, with gap markers where input characters
    /// were dropped
    pub corrected: String,
    /// The minimum edit distance between the input and the language
    pub distance: u32,
}

impl Correction {
    /// The corrected string with gap markers removed (I″).
    pub fn stripped(&self) -> String {
        self.corrected.chars().filter(|&c| c != GAP).collect()
    }
}

/// Error-correcting parser: a frozen covering grammar and its CYK driver.
///
/// Building runs the whole transformation pipeline (covering construction,
/// ε-elimination, unit elimination); the result is immutable and may be
/// shared across concurrent parses, each of which owns its own matrix.
pub struct CykParser {
    grammar: Grammar,
    start_epsilon: Production,
}

impl CykParser {
    /// Transforms `grammar` into its normalized covering grammar and wraps
    /// it in a parser.
    ///
    /// Fails with `CycleWithoutBase` when the start symbol cannot derive any
    /// terminal string (every derivation loops through nonterminals with no
    /// terminal escape).
    pub fn build(grammar: &Grammar) -> Result<Self> {
        let mut covering = construct_covering(grammar);
        let start_epsilon = eliminate_epsilon_productions(&mut covering)
            .ok_or(GrammarError::CycleWithoutBase { symbol: START })?;
        eliminate_unit_productions(&mut covering);
        Ok(Self {
            grammar: covering,
            start_epsilon,
        })
    }

    /// The frozen covering grammar this parser runs against.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parses `input`, returning its minimum edit distance to the language
    /// together with a nearest corrected string.
    pub fn parse(&self, input: &str) -> Result<Correction> {
        let chars: Vec<char> = input.chars().collect();
        let n = chars.len();

        if n == 0 {
            // no spans to fill; the nearest string is the one the start
            // symbol's ε-derivation deleted
            return Ok(Correction {
                input: input.to_string(),
                corrected: self.start_epsilon.edits.deleted(),
                distance: self.start_epsilon.errors,
            });
        }

        let boundary = n + 1;
        let mut matrix = Matrix::new(n);
        let mut lookup = Lookup::new();

        // terminal fill
        for (idx, &c) in chars.iter().enumerate() {
            let i = idx + 1;
            let known = self.grammar.chars().contains(&c);
            for production in self.grammar.terminal_productions() {
                let Rhs::Terminal(rule_char) = production.rhs else {
                    continue;
                };
                // a character outside the alphabet matches spurious- and
                // wrong-character rules at their stored cost, and any other
                // terminal rule one substitution dearer
                let errors = if rule_char == c {
                    production.errors
                } else if !known {
                    if production.edits.inserted || production.edits.replaced.is_some() {
                        production.errors
                    } else {
                        production.errors + 1
                    }
                } else {
                    continue;
                };
                matrix.insert(production.lhs, i, i + 1, errors);
                lookup.insert(production.lhs, i, i + 1, errors);
            }
        }

        // binary combination, ascending span length so every smaller span is
        // final before it is consumed
        let binary_rules: Vec<(Symbol, Symbol, Symbol, u32)> = self
            .grammar
            .binary_productions()
            .filter_map(|p| match p.rhs {
                Rhs::Pair(left, right) => Some((p.lhs, left, right, p.errors)),
                _ => None,
            })
            .collect();

        for s in 2..=n {
            for &(lhs, left, right, rule_errors) in &binary_rules {
                let candidates: Vec<(usize, usize, u32)> = lookup
                    .spans(left)
                    .filter(|&(i, k, _)| k < i + s && i + s <= boundary)
                    .collect();
                for (i, k, left_errors) in candidates {
                    if let Some(&right_errors) = matrix.get(k, i + s).get(&right) {
                        let total = left_errors + right_errors + rule_errors;
                        matrix.insert(lhs, i, i + s, total);
                        lookup.insert(lhs, i, i + s, total);
                    }
                }
            }
        }

        let Some(best) = lookup.best(START, 1, boundary) else {
            return Err(GrammarError::NoDerivation {
                input: input.to_string(),
            });
        };
        debug!("parsed {:?} at distance {}", input, best);

        let tree = Node::reconstruct(&matrix, &self.grammar, START, 1, boundary, best, &chars)?;
        let corrected = flatten(&tree, &self.grammar);
        Ok(Correction {
            input: input.to_string(),
            corrected,
            distance: best,
        })
    }
}
