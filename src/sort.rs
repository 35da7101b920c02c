//! Reach identifier ordering.
//!
//! Geometry features and time series columns are both presented in ascending identifier order.
//! The permutation that produces this order must be applied identically to every array indexed
//! by the reach axis, otherwise values detach from their identifiers.

/// Returns the identifiers in ascending order together with the permutation that produced them.
///
/// `sorted[i] == ids[permutation[i]]`. The sort is stable, so equal identifiers keep their
/// source order.
///
/// # Arguments
///
/// * `ids`: Identifiers in storage order
pub fn sort_permutation<T: Ord + Copy>(ids: &[T]) -> (Vec<T>, Vec<usize>) {
    let mut permutation: Vec<usize> = (0..ids.len()).collect();
    // slice::sort_by_key is a stable merge sort.
    permutation.sort_by_key(|&index| ids[index]);
    let sorted = apply_permutation(&permutation, ids);
    (sorted, permutation)
}

/// Returns the inverse of a permutation.
///
/// Applying the inverse to the output of [apply_permutation] restores the original order.
pub fn invert_permutation(permutation: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; permutation.len()];
    for (position, &index) in permutation.iter().enumerate() {
        inverse[index] = position;
    }
    inverse
}

/// Returns `values` reordered so that element `i` is `values[permutation[i]]`.
pub fn apply_permutation<T: Copy>(permutation: &[usize], values: &[T]) -> Vec<T> {
    permutation.iter().map(|&index| values[index]).collect()
}

/// Returns each identifier that appears more than once in an ascending sequence.
pub fn duplicate_ids<T: PartialEq + Copy>(sorted: &[T]) -> Vec<T> {
    let mut duplicates: Vec<T> = sorted
        .windows(2)
        .filter(|pair| pair[0] == pair[1])
        .map(|pair| pair[0])
        .collect();
    duplicates.dedup();
    duplicates
}
