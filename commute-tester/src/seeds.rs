use anyhow::{Result, bail};
use std::collections::HashSet;

/// Seed used when the CLI supplies none.
pub const DEFAULT_SEED: u64 = 1337;

/// Split a comma-separated CLI argument into trimmed tokens.
#[must_use]
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// Resolve a list of CLI seed arguments into canonical numeric seeds.
///
/// Accepts literal integers, including negative ones, which are folded onto
/// the unsigned range. Duplicates are dropped while keeping first-seen order.
///
/// # Errors
///
/// Fails on any token that is not an integer.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds: Vec<u64> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        let seed = if let Ok(value) = token.parse::<i64>() {
            value.unsigned_abs()
        } else if let Ok(value) = token.parse::<u64>() {
            value
        } else {
            bail!("Unrecognized seed token: {token}");
        };

        if seen.insert(seed) {
            seeds.push(seed);
        }
    }

    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }

    Ok(seeds)
}
