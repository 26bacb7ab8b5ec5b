//! Grammar model for error-correcting parsing.
//!
//! This module provides the production and grammar data structures shared by
//! the whole pipeline: the canonical production store with its per-shape
//! indices, minimum-cost insertion via [`Grammar::try_add`], and the reader
//! for the line-oriented grammar source format.

use crate::error::{GrammarError, Result};
use crate::symbol::{COMMENT, GAP, INSERTION, INSERTION_BLOCK, Symbol};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// Right-hand side of a production.
///
/// `Unit` only exists before normalization completes; afterwards every rule
/// is `Terminal` or `Pair`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rhs {
    /// A single terminal character
    Terminal(char),
    /// The empty string (ε)
    Epsilon,
    /// A single nonterminal (unit rule)
    Unit(Symbol),
    /// Two nonterminals
    Pair(Symbol, Symbol),
}

impl fmt::Display for Rhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rhs::Terminal(c) => write!(f, "{}", c),
            Rhs::Epsilon => write!(f, "ε"),
            Rhs::Unit(s) => write!(f, "{}", s),
            Rhs::Pair(a, b) => write!(f, "{} {}", a, b),
        }
    }
}

/// Record of the edit operations a production encodes, used to rebuild the
/// corrected string from a witness tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edits {
    /// Characters deleted in front of whatever this rule derives.
    pub prefix: String,
    /// Characters deleted after it.
    pub suffix: String,
    /// Character this rule's terminal substitutes, if it is a substitution.
    pub replaced: Option<char>,
    /// Whether this rule derives a spurious input character.
    pub inserted: bool,
}

impl Edits {
    /// All characters this record deletes, prefix first.
    pub fn deleted(&self) -> String {
        format!("{}{}", self.prefix, self.suffix)
    }
}

/// A production rule with an edit-cost annotation.
///
/// Two productions are identified by (lhs, rhs); the cost is not part of
/// identity. The grammar store keeps at most one production per identity,
/// the cheapest ever offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    /// Left-hand side (always a nonterminal)
    pub lhs: Symbol,
    /// Right-hand side
    pub rhs: Rhs,
    /// Number of edits this rule charges
    pub errors: u32,
    /// Which edits those are
    pub edits: Edits,
}

impl Production {
    /// Creates a production with no edit provenance.
    pub fn new(lhs: Symbol, rhs: Rhs, errors: u32) -> Self {
        Self {
            lhs,
            rhs,
            errors,
            edits: Edits::default(),
        }
    }

    /// Creates a production carrying edit provenance.
    pub fn with_edits(lhs: Symbol, rhs: Rhs, errors: u32, edits: Edits) -> Self {
        Self {
            lhs,
            rhs,
            errors,
            edits,
        }
    }

    /// Checks if the rhs is a terminal character or ε.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.rhs, Rhs::Terminal(_) | Rhs::Epsilon)
    }

    /// Checks if the rhs is one or two nonterminals.
    #[inline]
    pub const fn is_nonterminal(&self) -> bool {
        matches!(self.rhs, Rhs::Unit(_) | Rhs::Pair(..))
    }

    /// Checks if the rhs is a single nonterminal.
    #[inline]
    pub const fn is_unit(&self) -> bool {
        matches!(self.rhs, Rhs::Unit(_))
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors == 0 {
            write!(f, "{} -> {}", self.lhs, self.rhs)
        } else {
            write!(f, "{} ->{} {}", self.lhs, self.errors, self.rhs)
        }
    }
}

/// Lifecycle of a grammar. Transitions are one-way; parses only run against
/// a `UnitFree` (frozen) grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Built from source, untransformed
    Building,
    /// Covering construction applied
    Covered,
    /// ε-productions eliminated
    EpsilonFree,
    /// Unit productions eliminated (frozen, CNF-shaped)
    UnitFree,
}

/// A context-free grammar with edit-cost annotations.
///
/// The canonical store maps lhs → rhs → production; the remaining
/// collections are indices over the same identities, kept in sync by
/// [`Grammar::add_production`] and [`Grammar::remove_production`].
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Canonical store
    productions: HashMap<Symbol, HashMap<Rhs, Production>>,
    /// Identities whose rhs is a terminal character or ε
    terminals: HashMap<Symbol, HashSet<Rhs>>,
    /// Identities whose rhs is a single nonterminal
    nonterminal_units: HashMap<Symbol, HashSet<Rhs>>,
    /// Identities whose rhs is two nonterminals
    nonterminal_nonunits: HashMap<Symbol, HashSet<Rhs>>,
    /// Terminal characters appearing in the grammar
    chars: BTreeSet<char>,
    /// Minimum-cost ε-production per nonterminal
    nullable: HashMap<Symbol, Production>,
    stage: Stage,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// Creates an empty grammar in the `Building` stage.
    pub fn new() -> Self {
        Self {
            productions: HashMap::new(),
            terminals: HashMap::new(),
            nonterminal_units: HashMap::new(),
            nonterminal_nonunits: HashMap::new(),
            chars: BTreeSet::new(),
            nullable: HashMap::new(),
            stage: Stage::Building,
        }
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves the grammar forward in its lifecycle. Transitions are one-way.
    pub(crate) fn advance_stage(&mut self, to: Stage) {
        debug_assert!(self.stage < to, "stage may only move forward");
        self.stage = to;
    }

    /// Inserts a production into the store and every matching index.
    ///
    /// The caller guarantees no production with the same (lhs, rhs) exists;
    /// use [`Grammar::try_add`] when that is not known.
    pub fn add_production(&mut self, production: Production) {
        debug_assert!(
            self.get(production.lhs, production.rhs).is_none(),
            "duplicate production {}",
            production
        );
        match production.rhs {
            Rhs::Terminal(c) => {
                self.terminals
                    .entry(production.lhs)
                    .or_default()
                    .insert(production.rhs);
                self.chars.insert(c);
            }
            Rhs::Epsilon => {
                self.terminals
                    .entry(production.lhs)
                    .or_default()
                    .insert(production.rhs);
                self.nullable.insert(production.lhs, production.clone());
            }
            Rhs::Unit(_) => {
                self.nonterminal_units
                    .entry(production.lhs)
                    .or_default()
                    .insert(production.rhs);
            }
            Rhs::Pair(..) => {
                self.nonterminal_nonunits
                    .entry(production.lhs)
                    .or_default()
                    .insert(production.rhs);
            }
        }
        self.productions
            .entry(production.lhs)
            .or_default()
            .insert(production.rhs, production);
    }

    /// Deletes a production from the store and every index containing it.
    pub fn remove_production(&mut self, production: &Production) {
        let Some(by_rhs) = self.productions.get_mut(&production.lhs) else {
            return;
        };
        if by_rhs.remove(&production.rhs).is_none() {
            return;
        }
        match production.rhs {
            Rhs::Terminal(_) => {
                if let Some(set) = self.terminals.get_mut(&production.lhs) {
                    set.remove(&production.rhs);
                }
                // chars is not shrunk: other rules may share the character
            }
            Rhs::Epsilon => {
                if let Some(set) = self.terminals.get_mut(&production.lhs) {
                    set.remove(&production.rhs);
                }
                self.nullable.remove(&production.lhs);
            }
            Rhs::Unit(_) => {
                if let Some(set) = self.nonterminal_units.get_mut(&production.lhs) {
                    set.remove(&production.rhs);
                }
            }
            Rhs::Pair(..) => {
                if let Some(set) = self.nonterminal_nonunits.get_mut(&production.lhs) {
                    set.remove(&production.rhs);
                }
            }
        }
    }

    /// Offers a production to the store.
    ///
    /// Inserts it if the (lhs, rhs) slot is free, replaces the stored rule if
    /// the offered one is strictly cheaper, and rejects it otherwise. This is
    /// the only relaxation mechanism in the grammar transformations: every
    /// candidate rule they generate goes through here.
    pub fn try_add(&mut self, production: Production) -> bool {
        if let Some(existing) = self.get(production.lhs, production.rhs) {
            if production.errors < existing.errors {
                let old = existing.clone();
                self.remove_production(&old);
            } else {
                return false;
            }
        }
        self.add_production(production);
        true
    }

    /// Looks up the production stored under (lhs, rhs).
    pub fn get(&self, lhs: Symbol, rhs: Rhs) -> Option<&Production> {
        self.productions.get(&lhs)?.get(&rhs)
    }

    /// All productions of one nonterminal.
    pub fn productions_of(&self, lhs: Symbol) -> impl Iterator<Item = &Production> + '_ {
        self.productions.get(&lhs).into_iter().flat_map(|m| m.values())
    }

    /// Every production in the grammar.
    pub fn all_productions(&self) -> impl Iterator<Item = &Production> + '_ {
        self.productions.values().flat_map(|m| m.values())
    }

    fn indexed<'a>(
        &'a self,
        index: &'a HashMap<Symbol, HashSet<Rhs>>,
    ) -> impl Iterator<Item = &'a Production> + 'a {
        index.iter().flat_map(move |(lhs, set)| {
            set.iter().filter_map(move |rhs| self.get(*lhs, *rhs))
        })
    }

    /// Productions whose rhs is a terminal character or ε.
    pub fn terminal_productions(&self) -> impl Iterator<Item = &Production> + '_ {
        self.indexed(&self.terminals)
    }

    /// Terminal-side productions of one nonterminal.
    pub fn terminal_productions_of(&self, lhs: Symbol) -> impl Iterator<Item = &Production> + '_ {
        self.terminals
            .get(&lhs)
            .into_iter()
            .flat_map(move |set| set.iter().filter_map(move |rhs| self.get(lhs, *rhs)))
    }

    /// Productions whose rhs is a single nonterminal.
    pub fn unit_productions(&self) -> impl Iterator<Item = &Production> + '_ {
        self.indexed(&self.nonterminal_units)
    }

    /// Productions whose rhs is two nonterminals.
    pub fn binary_productions(&self) -> impl Iterator<Item = &Production> + '_ {
        self.indexed(&self.nonterminal_nonunits)
    }

    /// The terminal characters of the grammar.
    pub fn chars(&self) -> &BTreeSet<char> {
        &self.chars
    }

    /// The minimum-cost ε-production of a nonterminal, if one is known.
    pub fn nullable(&self, symbol: Symbol) -> Option<&Production> {
        self.nullable.get(&symbol)
    }

    /// The first zero-cost terminal character derivable from `lhs`, if any.
    ///
    /// Flattening uses this to pick the in-language substitute for an
    /// edited character.
    pub fn zero_cost_terminal(&self, lhs: Symbol) -> Option<char> {
        self.terminal_productions_of(lhs).find_map(|p| match p.rhs {
            Rhs::Terminal(c) if p.errors == 0 => Some(c),
            _ => None,
        })
    }

    /// All ε-productions currently indexed as nullable.
    pub fn nullables(&self) -> impl Iterator<Item = &Production> + '_ {
        self.nullable.values()
    }

    /// Number of productions in the grammar.
    pub fn len(&self) -> usize {
        self.productions.values().map(|m| m.len()).sum()
    }

    /// Checks if the grammar holds no productions.
    pub fn is_empty(&self) -> bool {
        self.productions.values().all(|m| m.is_empty())
    }

    /// Reads a grammar from a source file.
    pub fn from_file(path: &Path, epsilon: char) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(text.lines(), &path.display().to_string(), epsilon)
    }

    /// Parses a grammar from source lines.
    ///
    /// # Format
    /// One production per line:
    /// ```text
    /// LHS -> RHS
    /// LHS ->k RHS
    /// ```
    /// - `LHS` is a single nonterminal (uppercase ASCII letter).
    /// - `->` alone means cost 0; `->k` charges k ≥ 0 edits.
    /// - `RHS` is a single character, the epsilon marker, a single
    ///   nonterminal, or two nonterminals separated by a space.
    ///
    /// Blank lines and lines starting with `#` are ignored. The reserved
    /// symbols `H`, `I` (covering-only) and `-` (output gap) are rejected.
    pub fn parse<'a, L>(lines: L, source: &str, epsilon: char) -> Result<Self>
    where
        L: IntoIterator<Item = &'a str>,
    {
        let mut grammar = Grammar::new();
        for (idx, raw) in lines.into_iter().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(COMMENT) {
                continue;
            }
            let production = parse_production(line, source, idx + 1, epsilon)?;
            // duplicate source lines keep the cheapest rule
            grammar.try_add(production);
        }
        if grammar.is_empty() {
            return Err(GrammarError::MalformedGrammar {
                file: source.to_string(),
                line: 0,
                reason: "grammar has no productions".to_string(),
            });
        }
        Ok(grammar)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules: Vec<&Production> = self.all_productions().collect();
        rules.sort_by_key(|p| (p.lhs, p.rhs));
        for production in rules {
            writeln!(f, "{}", production)?;
        }
        Ok(())
    }
}

fn malformed(source: &str, line: usize, reason: impl Into<String>) -> GrammarError {
    GrammarError::MalformedGrammar {
        file: source.to_string(),
        line,
        reason: reason.into(),
    }
}

/// Checks a nonterminal against the covering-only reserved symbols.
fn check_reserved(symbol: Symbol, source: &str, line: usize) -> Result<Symbol> {
    if symbol == INSERTION_BLOCK || symbol == INSERTION {
        return Err(malformed(
            source,
            line,
            format!("{} is reserved for the covering construction", symbol),
        ));
    }
    Ok(symbol)
}

/// Parses one production line of the source format.
fn parse_production(line: &str, source: &str, lineno: usize, epsilon: char) -> Result<Production> {
    let Some((lhs_part, rest)) = line.split_once("->") else {
        return Err(malformed(source, lineno, "missing '->'"));
    };

    let lhs_part = lhs_part.trim();
    let mut lhs_chars = lhs_part.chars();
    let (Some(lhs_char), None) = (lhs_chars.next(), lhs_chars.next()) else {
        return Err(malformed(
            source,
            lineno,
            "left-hand side must be a single symbol",
        ));
    };
    let lhs = Symbol::from_char(lhs_char, epsilon);
    if !lhs.is_nonterminal() {
        return Err(malformed(
            source,
            lineno,
            "left-hand side must be a nonterminal (uppercase letter)",
        ));
    }
    let lhs = check_reserved(lhs, source, lineno)?;

    // an integer directly after the arrow is the edit cost
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let errors: u32 = if digits.is_empty() {
        0
    } else {
        digits
            .parse()
            .map_err(|e| malformed(source, lineno, format!("invalid cost: {}", e)))?
    };

    let tokens: Vec<&str> = rest[digits.len()..].split_whitespace().collect();
    let rhs = match tokens.as_slice() {
        [one] => {
            let mut chars = one.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(malformed(
                    source,
                    lineno,
                    "right-hand side symbols must be single characters",
                ));
            };
            match Symbol::from_char(c, epsilon) {
                Symbol::Epsilon => Rhs::Epsilon,
                symbol @ Symbol::Nonterminal(_) => {
                    Rhs::Unit(check_reserved(symbol, source, lineno)?)
                }
                Symbol::Terminal(GAP) => {
                    return Err(malformed(
                        source,
                        lineno,
                        format!("{} is reserved as the output gap character", GAP),
                    ));
                }
                Symbol::Terminal(t) => Rhs::Terminal(t),
            }
        }
        [first, second] => {
            let mut pair = Vec::with_capacity(2);
            for token in [first, second] {
                let mut chars = token.chars();
                let (Some(c), None) = (chars.next(), chars.next()) else {
                    return Err(malformed(
                        source,
                        lineno,
                        "right-hand side symbols must be single characters",
                    ));
                };
                let symbol = Symbol::from_char(c, epsilon);
                if !symbol.is_nonterminal() {
                    return Err(malformed(
                        source,
                        lineno,
                        "a two-symbol right-hand side must be two nonterminals",
                    ));
                }
                pair.push(check_reserved(symbol, source, lineno)?);
            }
            Rhs::Pair(pair[0], pair[1])
        }
        _ => {
            return Err(malformed(
                source,
                lineno,
                "right-hand side must be one symbol or two nonterminals",
            ));
        }
    };

    Ok(Production::new(lhs, rhs, errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_grammar() {
        let lines = ["S -> S A", "S -> A", "A -> a", "A -> b"];
        let grammar = Grammar::parse(lines, "test", 'e').unwrap();
        assert_eq!(grammar.len(), 4);
        assert!(grammar.chars().contains(&'a'));
        assert!(grammar.chars().contains(&'b'));
        assert_eq!(grammar.stage(), Stage::Building);
    }

    #[test]
    fn test_parse_cost_suffix() {
        let grammar = Grammar::parse(["A ->2 b"], "test", 'e').unwrap();
        let p = grammar
            .get(Symbol::Nonterminal('A'), Rhs::Terminal('b'))
            .unwrap();
        assert_eq!(p.errors, 2);
    }

    #[test]
    fn test_parse_epsilon() {
        let grammar = Grammar::parse(["A -> e"], "test", 'e').unwrap();
        let a = Symbol::Nonterminal('A');
        assert!(grammar.get(a, Rhs::Epsilon).is_some());
        assert!(grammar.nullable(a).is_some());
    }

    #[test]
    fn test_reserved_symbols_rejected() {
        assert!(Grammar::parse(["H -> a"], "test", 'e').is_err());
        assert!(Grammar::parse(["S -> H I"], "test", 'e').is_err());
        assert!(Grammar::parse(["S -> I"], "test", 'e').is_err());
        assert!(Grammar::parse(["S -> -"], "test", 'e').is_err());
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(Grammar::parse(["S = a"], "test", 'e').is_err());
        assert!(Grammar::parse(["s -> a"], "test", 'e').is_err());
        assert!(Grammar::parse(["S -> A B C"], "test", 'e').is_err());
        assert!(Grammar::parse(["S -> ab"], "test", 'e').is_err());
        assert!(Grammar::parse(["S -> A b"], "test", 'e').is_err());
        assert!(Grammar::parse([""], "test", 'e').is_err());
    }

    #[test]
    fn test_comments_and_blanks_ignored() {
        let lines = ["# grammar", "", "S -> a"];
        let grammar = Grammar::parse(lines, "test", 'e').unwrap();
        assert_eq!(grammar.len(), 1);
    }

    #[test]
    fn test_try_add_keeps_minimum() {
        let mut grammar = Grammar::new();
        let a = Symbol::Nonterminal('A');
        assert!(grammar.try_add(Production::new(a, Rhs::Terminal('x'), 2)));
        assert!(!grammar.try_add(Production::new(a, Rhs::Terminal('x'), 3)));
        assert!(!grammar.try_add(Production::new(a, Rhs::Terminal('x'), 2)));
        assert!(grammar.try_add(Production::new(a, Rhs::Terminal('x'), 1)));
        assert_eq!(grammar.get(a, Rhs::Terminal('x')).unwrap().errors, 1);
        assert_eq!(grammar.len(), 1);
    }

    #[test]
    fn test_zero_cost_terminal() {
        let grammar = Grammar::parse(["A -> a", "A ->2 b"], "test", 'e').unwrap();
        assert_eq!(
            grammar.zero_cost_terminal(Symbol::Nonterminal('A')),
            Some('a')
        );
        assert_eq!(grammar.zero_cost_terminal(Symbol::Nonterminal('B')), None);
    }

    #[test]
    fn test_remove_production_clears_indices() {
        let mut grammar = Grammar::new();
        let a = Symbol::Nonterminal('A');
        let p = Production::new(a, Rhs::Epsilon, 1);
        grammar.add_production(p.clone());
        assert!(grammar.nullable(a).is_some());
        grammar.remove_production(&p);
        assert!(grammar.nullable(a).is_none());
        assert!(grammar.get(a, Rhs::Epsilon).is_none());
        assert_eq!(grammar.terminal_productions().count(), 0);
    }

    #[test]
    fn test_display_roundtrip() {
        let p = Production::new(Symbol::Nonterminal('A'), Rhs::Terminal('b'), 1);
        assert_eq!(p.to_string(), "A ->1 b");
        let q = Production::new(
            Symbol::Nonterminal('S'),
            Rhs::Pair(Symbol::Nonterminal('S'), Symbol::Nonterminal('A')),
            0,
        );
        assert_eq!(q.to_string(), "S -> S A");
    }
}
