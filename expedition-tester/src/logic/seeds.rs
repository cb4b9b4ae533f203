use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;

const DEFAULT_SEED: u64 = 1337;
const MAX_RANGE_LEN: u64 = 10_000;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Resolve CLI seed tokens into a de-duplicated, ordered seed list.
///
/// Accepts literal integers (negative values use their magnitude) and
/// inclusive ranges written `start..end`.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seen = BTreeSet::new();
    let mut seeds = Vec::new();

    for token in tokens {
        for seed in expand_token(token)? {
            if seen.insert(seed) {
                seeds.push(seed);
            }
        }
    }

    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }
    Ok(seeds)
}

fn expand_token(token: &str) -> Result<Vec<u64>> {
    if token.is_empty() {
        return Ok(Vec::new());
    }

    if let Some((start, end)) = token.split_once("..") {
        let start = parse_seed(start)?;
        let end = parse_seed(end)?;
        if end < start {
            bail!("Seed range {token} is reversed");
        }
        if end - start >= MAX_RANGE_LEN {
            bail!("Seed range {token} spans more than {MAX_RANGE_LEN} seeds");
        }
        return Ok((start..=end).collect());
    }

    Ok(vec![parse_seed(token)?])
}

fn parse_seed(token: &str) -> Result<u64> {
    let token = token.trim();
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }
    token
        .parse::<u64>()
        .with_context(|| format!("Unrecognized seed token: {token}"))
}
