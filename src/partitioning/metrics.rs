//! Partitioning metrics utilities.
//!
//! Balance and replication measures over a `Core` assignment, intended for
//! logging, testing, and CI validation of partitioners.

use crate::data::mesh::Mesh;
use crate::topology::ownership::CoreMap;

/// Cell count per part id in `[0, parts)`. Ids `>= parts` are ignored.
pub fn partition_sizes(core: &[usize], parts: usize) -> Vec<usize> {
    let mut sizes = vec![0; parts];
    for &c in core {
        if let Some(s) = sizes.get_mut(c) {
            *s += 1;
        }
    }
    sizes
}

/// Difference between the largest and smallest part.
pub fn size_spread(sizes: &[usize]) -> usize {
    match (sizes.iter().max(), sizes.iter().min()) {
        (Some(max), Some(min)) => max - min,
        _ => 0,
    }
}

/// Largest part size over the mean part size (1.0 is perfect balance).
pub fn imbalance(sizes: &[usize]) -> f64 {
    let total: usize = sizes.iter().sum();
    if sizes.is_empty() || total == 0 {
        return 1.0;
    }
    let mean = total as f64 / sizes.len() as f64;
    sizes.iter().copied().max().unwrap_or(0) as f64 / mean
}

/// Average number of cores each point is present on.
///
/// Returns 0.0 for a mesh without points or without a `Core` array.
pub fn replication_factor(mesh: &Mesh) -> f64 {
    let Ok(map) = CoreMap::from_mesh(mesh) else {
        return 0.0;
    };
    let (sum, count) = (0..map.len())
        .map(|p| map.cores(p).len())
        .filter(|&n| n > 0)
        .fold((0usize, 0usize), |(s, c), n| (s + n, c + 1));
    if count == 0 { 0.0 } else { sum as f64 / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_spread() {
        let sizes = partition_sizes(&[0, 1, 1, 2, 2, 2, 9], 3);
        assert_eq!(sizes, vec![1, 2, 3]);
        assert_eq!(size_spread(&sizes), 2);
        assert!((imbalance(&sizes) - 1.5).abs() < 1e-12);
        assert_eq!(imbalance(&[]), 1.0);
    }

    #[test]
    fn unpartitioned_mesh_has_no_replication() {
        assert_eq!(replication_factor(&Mesh::new()), 0.0);
    }
}
