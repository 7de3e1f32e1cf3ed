//! `PointKey`: a stable, tolerance-quantized identity for mesh points
//!
//! Sequential point indices change every time the global mesh is rebuilt,
//! so anything that must survive a re-assembly (constraint dedup, interface
//! bookkeeping) keys on the quantized coordinates instead. Two points closer
//! than the merge tolerance normally quantize to the same key; the
//! occasional pair straddling a bucket edge is handled by callers that probe
//! the neighbouring buckets (see [`PointKey::neighbourhood`]).

use std::fmt;

/// Integer lattice coordinates of a point at a given tolerance.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PointKey([i64; 3]);

impl PointKey {
    /// Quantize `xyz` onto a lattice with spacing `tol`.
    ///
    /// `tol` must be strictly positive.
    #[inline]
    pub fn quantize(xyz: [f64; 3], tol: f64) -> Self {
        debug_assert!(tol > 0.0, "quantization step must be positive");
        PointKey([
            (xyz[0] / tol).floor() as i64,
            (xyz[1] / tol).floor() as i64,
            (xyz[2] / tol).floor() as i64,
        ])
    }

    /// Returns the raw lattice coordinates.
    #[inline]
    pub const fn get(self) -> [i64; 3] {
        self.0
    }

    /// The 27 keys of the surrounding 3×3×3 block, in lexicographic order.
    pub fn neighbourhood(self) -> impl Iterator<Item = PointKey> {
        let [i, j, k] = self.0;
        (-1..=1).flat_map(move |di| {
            (-1..=1).flat_map(move |dj| (-1..=1).map(move |dk| PointKey([i + di, j + dj, k + dk])))
        })
    }
}

impl fmt::Debug for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PointKey").field(&self.0).finish()
    }
}

/// Prints the lattice coordinates as `(i, j, k)`.
impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0[0], self.0[1], self.0[2])
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearby_points_share_a_key() {
        let a = PointKey::quantize([1.0001, 2.0, -3.0], 1e-2);
        let b = PointKey::quantize([1.0002, 2.0, -3.0], 1e-2);
        assert_eq!(a, b);
    }

    #[test]
    fn negative_coordinates_floor() {
        let k = PointKey::quantize([-0.5, 0.5, 0.0], 1.0);
        assert_eq!(k.get(), [-1, 0, 0]);
    }

    #[test]
    fn neighbourhood_is_27_keys_including_self() {
        let k = PointKey::quantize([0.0, 0.0, 0.0], 1.0);
        let n: Vec<_> = k.neighbourhood().collect();
        assert_eq!(n.len(), 27);
        assert!(n.contains(&k));
        assert_eq!(n[0].get(), [-1, -1, -1]);
    }

    #[test]
    fn display_prints_lattice_triple() {
        let k = PointKey::quantize([2.5, 0.0, -1.5], 1.0);
        assert_eq!(k.to_string(), "(2, 0, -2)");
    }
}
