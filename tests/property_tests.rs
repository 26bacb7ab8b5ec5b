//! Property-style tests: sampled in-language strings parse at distance
//! zero, and k random edits never push the distance past k. Seeds are fixed
//! so the suite is deterministic.

use ec_parser::grammar::{Grammar, Rhs};
use ec_parser::symbol::{START, Symbol};
use ec_parser::CykParser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const SEED: u64 = 0x00ec_0ec0;
const SAMPLES: usize = 10;
const DEPTH_BUDGET: usize = 4;

fn grammar_pool() -> Vec<Grammar> {
    let sources: [&[&str]; 3] = [
        &["S -> S A", "S -> A", "A -> a", "A -> b"],
        &["S -> A B", "A -> a", "B -> b"],
        &[
            "S -> A B",
            "S -> A T",
            "T -> S B",
            "S -> S S",
            "A -> (",
            "B -> )",
        ],
    ];
    sources
        .iter()
        .map(|lines| Grammar::parse(lines.iter().copied(), "pool", 'e').unwrap())
        .collect()
}

/// Minimum derivation-tree height per nonterminal, by fixed point.
fn min_heights(grammar: &Grammar) -> HashMap<Symbol, usize> {
    let mut heights: HashMap<Symbol, usize> = HashMap::new();
    let mut changed = true;
    while changed {
        changed = false;
        for production in grammar.all_productions() {
            let candidate = match production.rhs {
                Rhs::Terminal(_) | Rhs::Epsilon => 1,
                Rhs::Unit(target) => match heights.get(&target) {
                    Some(&h) => h + 1,
                    None => continue,
                },
                Rhs::Pair(left, right) => match (heights.get(&left), heights.get(&right)) {
                    (Some(&l), Some(&r)) => l.max(r) + 1,
                    _ => continue,
                },
            };
            if heights.get(&production.lhs).is_none_or(|&h| candidate < h) {
                heights.insert(production.lhs, candidate);
                changed = true;
            }
        }
    }
    heights
}

fn rule_height(heights: &HashMap<Symbol, usize>, rhs: Rhs) -> usize {
    match rhs {
        Rhs::Terminal(_) | Rhs::Epsilon => 1,
        Rhs::Unit(target) => heights.get(&target).copied().unwrap_or(usize::MAX - 1) + 1,
        Rhs::Pair(left, right) => {
            let l = heights.get(&left).copied().unwrap_or(usize::MAX - 1);
            let r = heights.get(&right).copied().unwrap_or(usize::MAX - 1);
            l.max(r) + 1
        }
    }
}

/// Samples one member of L(G) by random derivation; the depth budget steers
/// expansion toward the shallowest rules once exhausted.
fn sample(grammar: &Grammar, heights: &HashMap<Symbol, usize>, rng: &mut StdRng) -> String {
    let mut out = String::new();
    expand(grammar, heights, START, DEPTH_BUDGET, rng, &mut out);
    out
}

fn expand(
    grammar: &Grammar,
    heights: &HashMap<Symbol, usize>,
    symbol: Symbol,
    budget: usize,
    rng: &mut StdRng,
    out: &mut String,
) {
    let options: Vec<Rhs> = grammar.productions_of(symbol).map(|p| p.rhs).collect();
    assert!(!options.is_empty(), "{} has no productions", symbol);

    let viable: Vec<Rhs> = options
        .iter()
        .copied()
        .filter(|&rhs| rule_height(heights, rhs) <= budget)
        .collect();
    let choice = if viable.is_empty() {
        options
            .into_iter()
            .min_by_key(|&rhs| rule_height(heights, rhs))
            .unwrap()
    } else {
        viable[rng.gen_range(0..viable.len())]
    };

    match choice {
        Rhs::Terminal(c) => out.push(c),
        Rhs::Epsilon => {}
        Rhs::Unit(target) => expand(grammar, heights, target, budget.saturating_sub(1), rng, out),
        Rhs::Pair(left, right) => {
            expand(grammar, heights, left, budget.saturating_sub(1), rng, out);
            expand(grammar, heights, right, budget.saturating_sub(1), rng, out);
        }
    }
}

/// Applies `edits` random single-character edits.
fn perturb(input: &str, edits: usize, alphabet: &[char], rng: &mut StdRng) -> String {
    let mut chars: Vec<char> = input.chars().collect();
    for _ in 0..edits {
        let op = rng.gen_range(0..3);
        match op {
            1 if !chars.is_empty() => {
                let at = rng.gen_range(0..chars.len());
                chars.remove(at);
            }
            2 if !chars.is_empty() => {
                let at = rng.gen_range(0..chars.len());
                chars[at] = alphabet[rng.gen_range(0..alphabet.len())];
            }
            _ => {
                let at = rng.gen_range(0..=chars.len());
                chars.insert(at, alphabet[rng.gen_range(0..alphabet.len())]);
            }
        }
    }
    chars.into_iter().collect()
}

#[test]
fn test_sampled_members_parse_at_distance_zero() {
    let mut rng = StdRng::seed_from_u64(SEED);
    for grammar in grammar_pool() {
        let parser = CykParser::build(&grammar).unwrap();
        let heights = min_heights(&grammar);
        for _ in 0..SAMPLES {
            let member = sample(&grammar, &heights, &mut rng);
            let correction = parser.parse(&member).unwrap();
            assert_eq!(
                correction.distance, 0,
                "sampled member {:?} should parse cleanly",
                member
            );
            assert_eq!(correction.stripped(), member);
        }
    }
}

#[test]
fn test_k_edits_cost_at_most_k() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 1);
    for grammar in grammar_pool() {
        let parser = CykParser::build(&grammar).unwrap();
        let heights = min_heights(&grammar);
        // edits drawn from the alphabet plus a character no grammar uses
        let mut alphabet: Vec<char> = grammar.chars().iter().copied().collect();
        alphabet.push('Z');

        for _ in 0..SAMPLES {
            let member = sample(&grammar, &heights, &mut rng);
            let edits = rng.gen_range(1..=3);
            let mutated = perturb(&member, edits, &alphabet, &mut rng);

            let correction = parser.parse(&mutated).unwrap();
            assert!(
                correction.distance <= edits as u32,
                "{:?} is {} edits from member {:?} but parsed at {}",
                mutated,
                edits,
                member,
                correction.distance
            );
        }
    }
}

#[test]
fn test_corrections_reparse_at_distance_zero() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 2);
    for grammar in grammar_pool() {
        let parser = CykParser::build(&grammar).unwrap();
        let heights = min_heights(&grammar);
        let mut alphabet: Vec<char> = grammar.chars().iter().copied().collect();
        alphabet.push('Z');

        for _ in 0..SAMPLES {
            let member = sample(&grammar, &heights, &mut rng);
            let mutated = perturb(&member, rng.gen_range(1..=3), &alphabet, &mut rng);

            let corrected = parser.parse(&mutated).unwrap().stripped();
            let reparse = parser.parse(&corrected).unwrap();
            assert_eq!(
                reparse.distance, 0,
                "correction {:?} of {:?} should be in the language",
                corrected, mutated
            );
        }
    }
}
