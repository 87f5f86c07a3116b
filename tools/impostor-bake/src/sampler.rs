//! Sphere sampling for impostor camera placement
//!
//! Two deterministic strategies produce the view directions an impostor is
//! baked from:
//! - octahedron: regular grid on an unfolded octahedron, optionally pushed
//!   onto the unit sphere (matches octahedral impostor atlas layouts)
//! - Fibonacci: quasi-uniform golden-angle spiral
//!
//! Math is done in f64 and narrowed to f32 on output.

use glam::{DVec3, Vec3};
use serde::Deserialize;
use std::f64::consts::TAU;

use impostor_common::{BakeError, Result};

/// (1 + √5) / 2
pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// Sampling strategy with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sampler {
    /// Subdivided octahedron, `2 × resolution²` points
    Octahedron {
        resolution: usize,
        #[serde(default = "default_spherize")]
        spherize: bool,
    },
    /// Fibonacci lattice, `count` points
    Fibonacci { count: usize },
}

fn default_spherize() -> bool {
    true
}

impl Sampler {
    pub fn sample(&self) -> Result<Vec<Vec3>> {
        match *self {
            Sampler::Octahedron {
                resolution,
                spherize,
            } => octahedron_points(resolution, spherize),
            Sampler::Fibonacci { count } => fibonacci_points(count),
        }
    }

    /// Number of points [`sample`](Self::sample) produces
    pub fn point_count(&self) -> usize {
        match *self {
            Sampler::Octahedron { resolution, .. } => 2 * resolution * resolution,
            Sampler::Fibonacci { count } => count,
        }
    }
}

fn check_resolution(n: usize) -> Result<()> {
    if n < 2 {
        return Err(BakeError::InvalidArgument(format!(
            "octahedron resolution must be at least 2, got {}",
            n
        )));
    }
    Ok(())
}

/// Grid coordinate on the unfolded octahedron for cell (i, j)
#[inline]
fn octahedron_xy(i: usize, j: usize, n: usize) -> (f64, f64) {
    let step = 1.0 / (n - 1) as f64;
    let u = i as f64 * step;
    let v = j as f64 * step;
    (u + v - 1.0, u - v)
}

/// Sample both hemispheres of a subdivided octahedron.
///
/// Order is hemisphere-major (z ≤ 0 first), then row-major over (i, j).
/// Before spherizing every point satisfies |x| + |y| + |z| = 1, so the L2
/// norm is never zero.
pub fn octahedron_points(n: usize, spherize: bool) -> Result<Vec<Vec3>> {
    check_resolution(n)?;
    let total = n
        .checked_mul(n)
        .and_then(|cells| cells.checked_mul(2))
        .ok_or_else(|| {
            BakeError::InvalidArgument(format!("octahedron resolution {} is too large", n))
        })?;

    let mut points = Vec::with_capacity(total);
    for eps in [-1.0f64, 1.0] {
        for i in 0..n {
            for j in 0..n {
                let (x, y) = octahedron_xy(i, j, n);
                let z = eps * (1.0 - (x.abs() + y.abs()));
                let mut p = DVec3::new(x, y, z);
                if spherize {
                    p = p.normalize();
                }
                points.push(p.as_vec3());
            }
        }
    }

    Ok(points)
}

/// Sample `n` directions on a Fibonacci sphere.
pub fn fibonacci_points(n: usize) -> Result<Vec<Vec3>> {
    if n == 0 {
        return Err(BakeError::InvalidArgument(
            "Fibonacci sample count must be at least 1".to_string(),
        ));
    }

    let count = n as f64;
    let points = (0..n)
        .map(|i| {
            let i = i as f64;
            let theta = TAU * i / GOLDEN_RATIO;
            let polar = (1.0 - 2.0 * (i + 0.5) / count).acos();
            let (sin_t, cos_t) = theta.sin_cos();
            let (sin_p, cos_p) = polar.sin_cos();
            DVec3::new(cos_t * sin_p, sin_t * sin_p, cos_p).as_vec3()
        })
        .collect();

    Ok(points)
}

/// Upper hemisphere of the subdivided octahedron with quad topology
#[derive(Debug, Clone)]
pub struct OctahedronMesh {
    /// `n²` vertices in row-major (i, j) order
    pub vertices: Vec<Vec3>,
    /// `(n-1)²` quads, 0-based vertex indices
    pub faces: Vec<[u32; 4]>,
}

/// Build the quad mesh of the upper octahedron hemisphere.
pub fn octahedron_mesh(n: usize, spherize: bool) -> Result<OctahedronMesh> {
    check_resolution(n)?;
    let cells = n
        .checked_mul(n)
        .filter(|&cells| cells <= u32::MAX as usize)
        .ok_or_else(|| {
            BakeError::InvalidArgument(format!("octahedron resolution {} is too large", n))
        })?;

    let mut vertices = Vec::with_capacity(cells);
    let mut faces = Vec::with_capacity((n - 1) * (n - 1));
    let index = |i: usize, j: usize| (i * n + j) as u32;

    for i in 0..n {
        for j in 0..n {
            let (x, y) = octahedron_xy(i, j, n);
            let mut p = DVec3::new(x, y, 1.0 - x.abs() - y.abs());
            if spherize {
                p = p.normalize();
            }
            vertices.push(p.as_vec3());

            if i > 0 && j > 0 {
                faces.push([
                    index(i - 1, j - 1),
                    index(i - 1, j),
                    index(i, j),
                    index(i, j - 1),
                ]);
            }
        }
    }

    Ok(OctahedronMesh { vertices, faces })
}
