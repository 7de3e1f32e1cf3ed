//! Recursive coordinate bisection (k-d tree) over cell centroids.
//!
//! Each level splits the current set at its median along one axis, cycling
//! x, y, z with depth. Every split halves the number of leaves, so the leaf
//! count is always a power of two and sibling halves differ by at most one
//! cell. Ties on the split coordinate are broken by cell index, which makes
//! the assignment a pure function of the centroids.

use std::cmp::Ordering;

#[inline]
fn axis_order(centroids: &[[f64; 3]], axis: usize, a: usize, b: usize) -> Ordering {
    centroids[a][axis]
        .total_cmp(&centroids[b][axis])
        .then(a.cmp(&b))
}

fn bisect(
    ids: &mut [usize],
    centroids: &[[f64; 3]],
    depth: usize,
    leaves: usize,
    first_leaf: usize,
    out: &mut [usize],
) {
    if leaves <= 1 || ids.len() <= 1 {
        for &i in ids.iter() {
            out[i] = first_leaf;
        }
        return;
    }
    let axis = depth % 3;
    let mid = ids.len() / 2;
    ids.select_nth_unstable_by(mid, |&a, &b| axis_order(centroids, axis, a, b));
    let half = leaves / 2;
    let (lo, hi) = ids.split_at_mut(mid);
    bisect(lo, centroids, depth + 1, half, first_leaf, out);
    bisect(hi, centroids, depth + 1, half, first_leaf + half, out);
}

/// Assigns each centroid a leaf id in `[0, leaves)`.
///
/// `leaves` must be a power of two no larger than `centroids.len()`; callers
/// validate this (see [`super::partition_centroids`]).
pub fn kd_tree_partition(centroids: &[[f64; 3]], leaves: usize) -> Vec<usize> {
    debug_assert!(leaves.is_power_of_two());
    let mut ids: Vec<usize> = (0..centroids.len()).collect();
    let mut out = vec![0; centroids.len()];
    bisect(&mut ids, centroids, 0, leaves, 0, &mut out);
    out
}
