//! Point-to-point spacing filter
//!
//! Thins a point cloud whose samples bunch up: every point's nearest
//! neighbour distance is measured, and points closer than
//! `mean - stdev` to an already kept point are dropped. Points are visited
//! in input order, so the first point of a close pair survives.

use glam::Vec3;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use impostor_common::{BakeError, Result};

type IndexedPoint = GeomWithData<[f32; 3], usize>;

/// Nearest-neighbour distance statistics of a point cloud
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacingStats {
    pub min_distance: f32,
    pub max_distance: f32,
    pub mean_distance: f32,
    pub mean_sq_distance: f32,
    pub stdev: f32,
}

impl SpacingStats {
    /// Points closer than this to a kept point are removed
    pub fn cutoff(&self) -> f32 {
        self.mean_distance - self.stdev
    }
}

/// Outcome of [`filter_close_points`]
#[derive(Debug, Clone)]
pub struct SpacingFilter {
    pub kept: Vec<Vec3>,
    pub removed: usize,
    pub stats: SpacingStats,
}

fn build_tree(points: &[Vec3]) -> RTree<IndexedPoint> {
    let entries = points
        .iter()
        .enumerate()
        .map(|(i, p)| GeomWithData::new(p.to_array(), i))
        .collect();
    RTree::bulk_load(entries)
}

fn check_count(points: &[Vec3]) -> Result<()> {
    if points.len() < 2 {
        return Err(BakeError::InvalidArgument(format!(
            "spacing needs at least 2 points, got {}",
            points.len()
        )));
    }
    Ok(())
}

fn spacing_stats(tree: &RTree<IndexedPoint>, points: &[Vec3]) -> SpacingStats {
    let mut min_sq = f64::INFINITY;
    let mut max_sq = 0.0_f64;
    let mut sum_sq = 0.0_f64;
    let mut sum = 0.0_f64;

    for (i, p) in points.iter().enumerate() {
        // The closest entry other than the point itself; duplicates count as 0
        let sq = tree
            .nearest_neighbor_iter(&p.to_array())
            .find(|entry| entry.data != i)
            .map_or(0.0, |entry| p.distance_squared(points[entry.data]) as f64);

        min_sq = min_sq.min(sq);
        max_sq = max_sq.max(sq);
        sum_sq += sq;
        sum += sq.sqrt();
    }

    let n = points.len() as f64;
    let mean_sq = sum_sq / n;
    let mean = sum / n;
    let variance = (mean_sq - mean * mean).max(0.0);

    SpacingStats {
        min_distance: min_sq.sqrt() as f32,
        max_distance: max_sq.sqrt() as f32,
        mean_distance: mean as f32,
        mean_sq_distance: mean_sq as f32,
        stdev: variance.sqrt() as f32,
    }
}

/// Drop points that sit closer than `mean - stdev` to an earlier kept point.
pub fn filter_close_points(points: &[Vec3]) -> Result<SpacingFilter> {
    check_count(points)?;
    let tree = build_tree(points);
    let stats = spacing_stats(&tree, points);
    let cutoff = stats.cutoff();

    tracing::info!(
        "Point spacing: min {}, max {}, mean {}, stdev {}",
        stats.min_distance,
        stats.max_distance,
        stats.mean_distance,
        stats.stdev
    );

    let mut deleted = vec![false; points.len()];
    if cutoff > 0.0 {
        for (i, p) in points.iter().enumerate() {
            if deleted[i] {
                continue;
            }
            for entry in tree.locate_within_distance(p.to_array(), cutoff * cutoff) {
                let j = entry.data;
                // Radius query is inclusive; the cutoff is strict
                if j != i && !deleted[j] && p.distance(points[j]) < cutoff {
                    deleted[j] = true;
                }
            }
        }
    }

    let kept: Vec<Vec3> = points
        .iter()
        .zip(&deleted)
        .filter(|(_, deleted)| !**deleted)
        .map(|(p, _)| *p)
        .collect();
    let removed = points.len() - kept.len();
    tracing::info!("Removed {} points closer than {}", removed, cutoff);

    Ok(SpacingFilter {
        kept,
        removed,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Vec3> {
        let mut points = Vec::new();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    points.push(Vec3::new(x as f32, y as f32, z as f32));
                }
            }
        }
        points
    }

    #[test]
    fn test_even_grid_is_untouched() {
        let points = grid(3);
        let filter = filter_close_points(&points).unwrap();
        assert_eq!(filter.removed, 0);
        assert_eq!(filter.kept, points);
        assert!((filter.stats.mean_distance - 1.0).abs() < 1e-6);
        assert!(filter.stats.stdev.abs() < 1e-3);
    }

    #[test]
    fn test_close_point_removed() {
        // 27 grid points one apart, plus an intruder 0.1 away from the origin
        let mut points = grid(3);
        points.push(Vec3::new(0.1, 0.0, 0.0));

        let filter = filter_close_points(&points).unwrap();
        let stats = filter.stats;
        assert!((stats.min_distance - 0.1).abs() < 1e-5);
        assert!((stats.max_distance - 1.0).abs() < 1e-5);
        // 25 points at 1, (1, 0, 0) at 0.9, the close pair at 0.1
        assert!((stats.mean_distance - 26.1 / 28.0).abs() < 1e-5);

        // mean 0.9321, stdev 0.2315
        let cutoff = stats.cutoff();
        assert!(cutoff > 0.1 && cutoff < 0.9, "cutoff {}", cutoff);
        assert!((cutoff - 0.7006).abs() < 1e-3, "cutoff {}", cutoff);

        assert_eq!(filter.removed, 1);
        assert_eq!(filter.kept, grid(3));
    }

    #[test]
    fn test_first_of_pair_survives() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(20.5, 0.0, 0.0),
        ];
        // Distances 10, 10, 0.5, 0.5: mean 5.25, stdev 4.75, cutoff 0.5 (strict)
        let filter = filter_close_points(&points).unwrap();
        assert_eq!(filter.removed, 0);

        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(20.4, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
        ];
        let filter = filter_close_points(&points).unwrap();
        assert_eq!(filter.removed, 1);
        assert_eq!(filter.kept[2], Vec3::new(20.0, 0.0, 0.0));
        assert!(!filter.kept.contains(&Vec3::new(20.4, 0.0, 0.0)));
    }

    #[test]
    fn test_needs_two_points() {
        assert!(matches!(
            filter_close_points(&[Vec3::ONE]),
            Err(BakeError::InvalidArgument(_))
        ));
        assert!(filter_close_points(&[]).is_err());
    }
}
