//! Look-from camera basis
//!
//! Builds the view matrix of a camera placed at a sample point and aimed at a
//! target (the origin by default), with +Z as world up.

use glam::{DVec3, Mat4, Vec3, Vec4};

use impostor_common::{BakeError, Result};

/// World up used to orient every camera
pub const WORLD_UP: Vec3 = Vec3::Z;

/// Secondary up used when the view direction is parallel to [`WORLD_UP`]
pub const FALLBACK_UP: Vec3 = Vec3::X;

/// Below this length a direction is treated as degenerate
const DEGENERATE_EPSILON: f64 = 1e-6;

/// Rigid camera transform with an orthonormal basis.
///
/// The rotation rows are `right`, `up`, `forward`, where `forward` points from
/// the target towards the eye (the camera looks down -forward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    pub right: Vec3,
    pub up: Vec3,
    pub forward: Vec3,
    /// `-(R · eye)`, the translation column of the view matrix
    pub translation: Vec3,
    /// Camera position in world space
    pub eye: Vec3,
}

impl CameraTransform {
    /// Rotation rows in order
    pub fn rows(&self) -> [Vec3; 3] {
        [self.right, self.up, self.forward]
    }

    /// World-to-camera matrix:
    /// ```text
    /// [ right   | -right·eye   ]
    /// [ up      | -up·eye      ]
    /// [ forward | -forward·eye ]
    /// [ 0 0 0   | 1            ]
    /// ```
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_cols(
            Vec4::new(self.right.x, self.up.x, self.forward.x, 0.0),
            Vec4::new(self.right.y, self.up.y, self.forward.y, 0.0),
            Vec4::new(self.right.z, self.up.z, self.forward.z, 0.0),
            self.translation.extend(1.0),
        )
    }

    /// Camera-to-world matrix (inverse of [`view_matrix`](Self::view_matrix))
    pub fn pose(&self) -> Mat4 {
        Mat4::from_cols(
            self.right.extend(0.0),
            self.up.extend(0.0),
            self.forward.extend(0.0),
            self.eye.extend(1.0),
        )
    }
}

/// Camera at `eye` looking at `target`.
///
/// Fails with `InvalidArgument` if either point is not finite or the two
/// coincide. When the view direction is parallel to world up, the basis is
/// built from [`FALLBACK_UP`] instead.
pub fn look_from(eye: Vec3, target: Vec3) -> Result<CameraTransform> {
    if !eye.is_finite() || !target.is_finite() {
        return Err(BakeError::InvalidArgument(format!(
            "camera position {} and target {} must be finite",
            eye, target
        )));
    }

    let eye64 = eye.as_dvec3();
    let offset = eye64 - target.as_dvec3();
    let distance = offset.length();
    if distance < DEGENERATE_EPSILON {
        return Err(BakeError::InvalidArgument(format!(
            "camera position {} coincides with its target {}",
            eye, target
        )));
    }

    let forward = offset / distance;
    let mut side = WORLD_UP.as_dvec3().cross(forward);
    if side.length() < DEGENERATE_EPSILON {
        tracing::debug!("View direction {} is parallel to world up, using fallback up", eye);
        side = FALLBACK_UP.as_dvec3().cross(forward);
    }
    let right = side.normalize();
    let up = forward.cross(right).normalize();

    let translation = -DVec3::new(right.dot(eye64), up.dot(eye64), forward.dot(eye64));

    Ok(CameraTransform {
        right: right.as_vec3(),
        up: up.as_vec3(),
        forward: forward.as_vec3(),
        translation: translation.as_vec3(),
        eye,
    })
}

/// Camera at `eye` looking at the origin
pub fn look_from_origin(eye: Vec3) -> Result<CameraTransform> {
    look_from(eye, Vec3::ZERO)
}
