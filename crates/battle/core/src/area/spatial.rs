//! Uniform grid over member positions in the ground plane.

use std::collections::BTreeMap;

use crate::member::{Camp, MemberRegistry};
use crate::types::{MemberId, Vec3};

#[derive(Clone, Debug, PartialEq)]
pub struct GridEntry {
    pub id: MemberId,
    pub camp: Camp,
    pub position: Vec3,
}

/// Circle queries over a per-frame copy of member positions.
///
/// Entries keep registry order and query results are reported in that
/// order, so hit processing is deterministic.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cell_size: f64,
    entries: Vec<GridEntry>,
    cells: BTreeMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        Self {
            cell_size,
            entries: Vec::new(),
            cells: BTreeMap::new(),
        }
    }

    pub fn from_registry(registry: &MemberRegistry, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        grid.rebuild(registry);
        grid
    }

    pub fn rebuild(&mut self, registry: &MemberRegistry) {
        self.entries.clear();
        self.cells.clear();
        for member in registry.iter() {
            let index = self.entries.len();
            let position = member.position();
            self.entries.push(GridEntry {
                id: member.id(),
                camp: member.camp().clone(),
                position,
            });
            self.cells.entry(self.cell_of(position)).or_default().push(index);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose planar distance to `center` is at most `radius`.
    pub fn query(&self, center: Vec3, radius: f64) -> Vec<&GridEntry> {
        let radius = radius.max(0.0);
        let (min_x, min_z) = self.cell_of(Vec3::new(center.x - radius, 0.0, center.z - radius));
        let (max_x, max_z) = self.cell_of(Vec3::new(center.x + radius, 0.0, center.z + radius));

        // Spans past the occupied cell count (or past i64) scan every entry.
        let width = max_x.checked_sub(min_x).and_then(|d| d.checked_add(1));
        let depth = max_z.checked_sub(min_z).and_then(|d| d.checked_add(1));
        let span = width.zip(depth).map(|(w, d)| w.saturating_mul(d));
        let mut hits: Vec<usize> = if span.is_none_or(|span| span > self.cells.len() as i64) {
            (0..self.entries.len()).collect()
        } else {
            let mut found = Vec::new();
            for cx in min_x..=max_x {
                for cz in min_z..=max_z {
                    if let Some(bucket) = self.cells.get(&(cx, cz)) {
                        found.extend_from_slice(bucket);
                    }
                }
            }
            found
        };

        hits.retain(|&i| self.entries[i].position.planar_distance(center) <= radius);
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.entries[i]).collect()
    }

    fn cell_of(&self, position: Vec3) -> (i64, i64) {
        (
            (position.x / self.cell_size).floor() as i64,
            (position.z / self.cell_size).floor() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MemberKind, MemberSpec};

    fn registry(points: &[(u32, f64, f64)]) -> MemberRegistry {
        let mut registry = MemberRegistry::new();
        for &(id, x, z) in points {
            registry.insert_spec(&MemberSpec::new(id, "red", MemberKind::Mob).at(Vec3::new(x, 0.0, z)));
        }
        registry
    }

    fn ids(hits: Vec<&GridEntry>) -> Vec<u32> {
        hits.into_iter().map(|e| e.id.0).collect()
    }

    #[test]
    fn query_matches_brute_force_in_registry_order() {
        let registry = registry(&[(9, 1.0, 1.0), (2, -3.0, 0.5), (5, 20.0, 0.0), (7, 0.0, -2.9)]);
        let grid = SpatialGrid::from_registry(&registry, 2.0);
        assert_eq!(ids(grid.query(Vec3::ZERO, 3.0)), vec![9, 7]);
        assert_eq!(ids(grid.query(Vec3::ZERO, 3.1)), vec![9, 2, 7]);
        assert_eq!(ids(grid.query(Vec3::new(20.0, 5.0, 0.0), 0.0)), vec![5]);
    }

    #[test]
    fn huge_radius_falls_back_to_scan() {
        let registry = registry(&[(1, 0.0, 0.0), (2, 500.0, 500.0)]);
        let grid = SpatialGrid::from_registry(&registry, 1.0);
        assert_eq!(ids(grid.query(Vec3::ZERO, 1000.0)), vec![1, 2]);
    }

    #[test]
    fn unbounded_radius_covers_everyone() {
        let registry = registry(&[(1, 0.0, 0.0), (2, -4.0e12, 7.5e9)]);
        let grid = SpatialGrid::from_registry(&registry, 1.0);
        assert_eq!(ids(grid.query(Vec3::ZERO, 1e30)), vec![1, 2]);
        assert_eq!(ids(grid.query(Vec3::new(3.0, 0.0, -2.0), f64::INFINITY)), vec![1, 2]);
    }
}
