//! Column balancing: split an ordered sequence of weights into contiguous groups.
//!
//! Bounds are returned as `columns + 1` boundary indices, so group `i` covers
//! `bounds[i]..bounds[i + 1]`. Groups past the end of the input are empty.

/// Result of [`partition`]: the tallest group and the start index of every
/// group after the first.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    pub max: f32,
    pub splits: Vec<usize>,
}

/// Split `weights` into `min(columns, len)` non-empty contiguous groups so the
/// largest group sum is as small as possible.
///
/// Among equally good splits the one with the latest first cut wins, which
/// keeps the left column the heavier one when a perfect balance is impossible.
pub fn partition(weights: &[f32], columns: usize) -> Partition {
    let n = weights.len();
    let k = columns.min(n);
    if k == 0 {
        return Partition {
            max: weights.iter().sum(),
            splits: Vec::new(),
        };
    }

    // best[c][s]: minimal max sum for weights[s..] in c + 1 groups.
    // next[c][s]: start of the second group in that optimum.
    let mut best = vec![vec![f32::INFINITY; n + 1]; k];
    let mut next = vec![vec![0usize; n + 1]; k];

    let mut suffix = 0.0;
    for s in (0..n).rev() {
        suffix += weights[s];
        best[0][s] = suffix;
    }

    for c in 1..k {
        let groups = c + 1;
        for s in 0..=(n - groups) {
            let mut current = 0.0;
            for idx in s..=(n - groups) {
                current += weights[idx];
                let candidate = f32::max(current, best[c - 1][idx + 1]);
                if candidate <= best[c][s] {
                    best[c][s] = candidate;
                    next[c][s] = idx + 1;
                }
            }
        }
    }

    let mut splits = Vec::with_capacity(k - 1);
    let mut s = 0;
    for c in (1..k).rev() {
        s = next[c][s];
        splits.push(s);
    }

    Partition {
        max: best[k - 1][0],
        splits,
    }
}

fn pad_bounds(mut bounds: Vec<usize>, columns: usize) -> Vec<usize> {
    let last = bounds.last().copied().unwrap_or(0);
    bounds.resize(columns + 1, last);
    bounds
}

/// Optimal boundaries `[0, splits.., len]`, padded to `columns + 1` entries.
pub fn column_bounds(weights: &[f32], columns: usize) -> Vec<usize> {
    if weights.is_empty() {
        return vec![0; columns + 1];
    }
    let split = partition(weights, columns);
    let mut bounds = Vec::with_capacity(columns + 1);
    bounds.push(0);
    bounds.extend(split.splits);
    bounds.push(weights.len());
    pad_bounds(bounds, columns)
}

/// Fill columns left to right, cutting once a column reaches
/// `ceil(total / columns)`. Linear, and stable as rows are appended.
pub fn fill_bounds(weights: &[f32], columns: usize) -> Vec<usize> {
    if weights.is_empty() || columns == 0 {
        return vec![0; columns + 1];
    }
    let total: f32 = weights.iter().sum();
    let target = (total / columns as f32).ceil().max(1.0);
    let mut bounds = vec![0];
    let mut acc = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        acc += weight;
        if acc >= target && bounds.len() < columns {
            bounds.push(idx + 1);
            acc = 0.0;
        }
    }
    bounds.push(weights.len());
    pad_bounds(bounds, columns)
}

/// Sum of each group described by `bounds`.
pub fn group_sums(weights: &[f32], bounds: &[usize]) -> Vec<f32> {
    bounds
        .windows(2)
        .map(|w| weights[w[0]..w[1]].iter().sum())
        .collect()
}
