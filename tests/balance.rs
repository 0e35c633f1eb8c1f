use scripture_typeset::balance::{column_bounds, fill_bounds, group_sums, partition};

/// Smallest achievable maximum group sum, by trying every split.
fn brute_force_max(weights: &[f32], columns: usize) -> f32 {
    fn go(weights: &[f32], columns: usize) -> f32 {
        if columns == 1 {
            return weights.iter().sum();
        }
        let mut best = f32::INFINITY;
        for cut in 1..=weights.len() - (columns - 1) {
            let head: f32 = weights[..cut].iter().sum();
            best = best.min(head.max(go(&weights[cut..], columns - 1)));
        }
        best
    }
    go(weights, columns.min(weights.len()))
}

/// Deterministic pseudo-random weights in 1..=9.
fn weights_for(seed: u64, len: usize) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) % 9 + 1) as f32
        })
        .collect()
}

#[test]
fn worked_example_splits_after_third_weight() {
    let weights = [5.0, 3.0, 4.0, 2.0, 6.0];
    let result = partition(&weights, 2);
    assert_eq!(result.max, 12.0);
    assert_eq!(result.splits, vec![3]);
    assert_eq!(column_bounds(&weights, 2), vec![0, 3, 5]);
}

#[test]
fn partition_matches_brute_force_on_small_inputs() {
    for len in 1..=12 {
        for columns in 1..=4 {
            for seed in 0..6 {
                let weights = weights_for(seed * 31 + len as u64, len);
                let result = partition(&weights, columns);
                let expected = brute_force_max(&weights, columns);
                assert_eq!(
                    result.max, expected,
                    "weights {weights:?} in {columns} columns"
                );

                let bounds = column_bounds(&weights, columns);
                let sums = group_sums(&weights, &bounds);
                let tallest = sums.iter().copied().fold(0.0, f32::max);
                assert_eq!(tallest, result.max);
            }
        }
    }
}

#[test]
fn groups_cover_everything_in_order() {
    for len in 1..=12 {
        for columns in 1..=4 {
            let weights = weights_for(len as u64 + 100, len);
            let bounds = column_bounds(&weights, columns);
            assert_eq!(bounds.len(), columns + 1);
            assert_eq!(bounds[0], 0);
            assert_eq!(*bounds.last().unwrap(), len);
            assert!(bounds.windows(2).all(|w| w[0] <= w[1]));

            let total: f32 = weights.iter().sum();
            let sums = group_sums(&weights, &bounds);
            assert_eq!(sums.iter().sum::<f32>(), total);
            if len >= columns {
                assert!(
                    bounds.windows(2).all(|w| w[0] < w[1]),
                    "empty group in {bounds:?}"
                );
            }
        }
    }
}

#[test]
fn short_input_pads_with_empty_groups() {
    assert_eq!(column_bounds(&[4.0], 3), vec![0, 1, 1, 1]);
    assert_eq!(column_bounds(&[], 2), vec![0, 0, 0]);
    assert_eq!(fill_bounds(&[], 3), vec![0, 0, 0, 0]);
}

#[test]
fn fill_cuts_once_target_is_reached() {
    // total 12, target 4
    let weights = [1.0, 2.0, 1.0, 3.0, 1.0, 4.0];
    let bounds = fill_bounds(&weights, 3);
    assert_eq!(bounds, vec![0, 3, 5, 6]);
    assert_eq!(group_sums(&weights, &bounds), vec![4.0, 4.0, 4.0]);
}

#[test]
fn fill_never_makes_more_cuts_than_columns() {
    let weights = [5.0; 7];
    let bounds = fill_bounds(&weights, 3);
    assert_eq!(bounds.len(), 4);
    assert_eq!(*bounds.last().unwrap(), 7);
    // target 12: three rows fill a column, the leftover lands in the last
    assert_eq!(bounds, vec![0, 3, 6, 7]);
}
