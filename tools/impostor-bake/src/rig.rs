//! Camera rig baking (.xyz -> .bin)
//!
//! Turns every point of an XYZ file into one camera matrix, in file order, so
//! that matrix `k` of the rig corresponds to line `k` of the point file.

use anyhow::{Context, Result};
use clap::ValueEnum;
use glam::{Mat4, Vec3};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use impostor_common::{BakeError, MatrixStreamWriter, XyzReader, read_matrix_stream};

use crate::camera::{CameraTransform, look_from};

/// Which matrix of each camera goes into the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RigMatrix {
    /// World-to-camera view matrix (what the renderer loads)
    #[default]
    View,
    /// Camera-to-world pose (for placing cameras in a content tool)
    Pose,
}

impl RigMatrix {
    pub fn of(self, camera: &CameraTransform) -> Mat4 {
        match self {
            RigMatrix::View => camera.view_matrix(),
            RigMatrix::Pose => camera.pose(),
        }
    }
}

/// Camera rig options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraRigOptions {
    /// Point every camera looks at
    pub target: Vec3,
    pub matrix: RigMatrix,
}

/// Bake a camera rig from an XYZ stream into a matrix stream.
///
/// Each line is parsed, turned into a camera and written before the next
/// line is read. A malformed line aborts the run with `InvalidInput` before
/// any byte for it is written; matrices of earlier lines stay in the sink.
pub fn write_camera_rig<R: BufRead, W: Write>(
    reader: R,
    writer: W,
    options: &CameraRigOptions,
) -> Result<usize, BakeError> {
    let mut points = XyzReader::new(reader);
    let mut stream = MatrixStreamWriter::new(writer);

    while let Some(point) = points.next() {
        let point = point?;
        let camera = look_from(point, options.target).map_err(|e| match e {
            BakeError::InvalidArgument(message) => BakeError::InvalidInput {
                line: points.line_number(),
                message,
            },
            other => other,
        })?;
        stream.write_matrix(&options.matrix.of(&camera))?;
    }

    stream.finish()
}

/// Bake a camera rig file.
///
/// The output is written in place; a run aborted by a bad line leaves a
/// partial file behind that must be regenerated, not resumed.
pub fn bake_camera_rig(input: &Path, output: &Path, options: &CameraRigOptions) -> Result<usize> {
    let file =
        File::open(input).with_context(|| format!("Failed to open point file: {:?}", input))?;
    let reader = BufReader::new(file);

    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    let writer = BufWriter::new(file);

    let count = write_camera_rig(reader, writer, options)
        .with_context(|| format!("Failed to bake camera rig from {:?}", input))?;

    tracing::info!(
        "Baked camera rig: {} {:?} matrices, target {}",
        count,
        options.matrix,
        options.target
    );

    Ok(count)
}

/// Summary of an existing camera rig file
#[derive(Debug, Clone)]
pub struct RigInfo {
    pub matrix_count: usize,
    /// Camera positions, assuming the rig holds view matrices
    pub eyes: Vec<Vec3>,
}

/// Read a camera rig file and recover the camera positions.
pub fn inspect_camera_rig(path: &Path) -> Result<RigInfo> {
    let file = File::open(path).with_context(|| format!("Failed to open rig: {:?}", path))?;
    let matrices = read_matrix_stream(BufReader::new(file))
        .with_context(|| format!("Failed to read camera rig: {:?}", path))?;

    let eyes = matrices
        .iter()
        .map(|view| view.inverse().transform_point3(Vec3::ZERO))
        .collect();

    Ok(RigInfo {
        matrix_count: matrices.len(),
        eyes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use impostor_common::{MATRIX_SIZE, write_xyz};

    const TOLERANCE: f32 = 1e-5;

    #[test]
    fn test_rig_one_matrix_per_line() {
        let points = crate::sampler::octahedron_points(3, true).unwrap();
        let mut text = Vec::new();
        write_xyz(&mut text, &points).unwrap();

        let mut out = Vec::new();
        let count =
            write_camera_rig(text.as_slice(), &mut out, &CameraRigOptions::default()).unwrap();
        assert_eq!(count, points.len());
        assert_eq!(out.len(), points.len() * MATRIX_SIZE);

        let matrices = read_matrix_stream(out.as_slice()).unwrap();
        for (p, view) in points.iter().zip(&matrices) {
            let expected = crate::camera::look_from_origin(*p).unwrap().view_matrix();
            assert!(view.abs_diff_eq(expected, TOLERANCE));
            assert!(view.is_finite());
        }
    }

    #[test]
    fn test_rig_pose_matrices() {
        let text = "0 0 2\n1 1 1\n";
        let options = CameraRigOptions {
            matrix: RigMatrix::Pose,
            ..Default::default()
        };

        let mut out = Vec::new();
        write_camera_rig(text.as_bytes(), &mut out, &options).unwrap();
        let poses = read_matrix_stream(out.as_slice()).unwrap();

        assert!((poses[0].w_axis.truncate() - Vec3::new(0.0, 0.0, 2.0)).length() < TOLERANCE);
        assert!((poses[1].w_axis.truncate() - Vec3::ONE).length() < TOLERANCE);
    }

    #[test]
    fn test_malformed_line_stops_before_writing() {
        let text = "0 0 1\n1 0 0\n1.0 2.0\n0 1 0\n";

        let mut out = Vec::new();
        let err = write_camera_rig(text.as_bytes(), &mut out, &CameraRigOptions::default())
            .unwrap_err();
        assert!(matches!(err, BakeError::InvalidInput { line: 3, .. }), "got {:?}", err);
        assert_eq!(out.len(), 2 * MATRIX_SIZE);
    }

    #[test]
    fn test_point_on_target_is_invalid_input() {
        let options = CameraRigOptions {
            target: Vec3::ONE,
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = write_camera_rig("0 0 1\n1 1 1\n".as_bytes(), &mut out, &options).unwrap_err();
        assert!(matches!(err, BakeError::InvalidInput { line: 2, .. }), "got {:?}", err);
    }

    #[test]
    fn test_bake_and_inspect_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fibonacci.xyz");
        let output = dir.path().join("fibonacci_camera.bin");

        let points = crate::sampler::fibonacci_points(16).unwrap();
        impostor_common::write_xyz_file(&input, &points).unwrap();

        let count = bake_camera_rig(&input, &output, &CameraRigOptions::default()).unwrap();
        assert_eq!(count, 16);

        let info = inspect_camera_rig(&output).unwrap();
        assert_eq!(info.matrix_count, 16);
        for (eye, p) in info.eyes.iter().zip(&points) {
            // XYZ text keeps six decimals
            assert!((*eye - *p).length() < 1e-4, "{} vs {}", eye, p);
        }
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = bake_camera_rig(
            &dir.path().join("missing.xyz"),
            &dir.path().join("out.bin"),
            &CameraRigOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to open point file"));
    }
}
