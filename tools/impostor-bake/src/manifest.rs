//! Manifest parsing and batch orchestration
//!
//! Parses bake.toml and runs every step it lists, in dependency order:
//! samplers, then camera rigs (which may consume sampler output), then
//! point-buffer conversions.
//!
//! ```toml
//! [output]
//! dir = "bake/"
//!
//! [samplers.octahedron]
//! kind = "octahedron"
//! resolution = 8
//!
//! [camera_rigs.octahedron]
//! sampler = "octahedron"
//!
//! [conversions.grains]
//! input = "grains.xyz"
//! bounds = { min = [-151, -1000, -151], max = [151, 1000, 151] }
//! spacing_filter = true
//! ```

use anyhow::{Context, Result, bail};
use glam::Vec3;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use impostor_common::{CAMERA_RIG_EXT, POINT_BUFFER_EXT, XYZ_EXT, write_xyz_file};

use crate::point_buffer::{Bounds, ConvertOptions, convert_xyz_to_point_buffer};
use crate::rig::{CameraRigOptions, RigMatrix, bake_camera_rig};
use crate::sampler::Sampler;

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub samplers: BTreeMap<String, Sampler>,
    #[serde(default)]
    pub camera_rigs: BTreeMap<String, CameraRigEntry>,
    #[serde(default)]
    pub conversions: BTreeMap<String, ConversionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("bake/")
}

/// Camera rig step. Points come from either a sampler of this manifest or
/// an existing `.xyz` file.
#[derive(Debug, Deserialize)]
pub struct CameraRigEntry {
    #[serde(default)]
    pub sampler: Option<String>,
    #[serde(default)]
    pub points: Option<PathBuf>,
    #[serde(default)]
    pub target: [f32; 3],
    #[serde(default)]
    pub matrix: RigMatrix,
}

impl CameraRigEntry {
    pub fn options(&self) -> CameraRigOptions {
        CameraRigOptions {
            target: Vec3::from_array(self.target),
            matrix: self.matrix,
        }
    }
}

/// XYZ -> single-frame point buffer step
#[derive(Debug, Deserialize)]
pub struct ConversionEntry {
    pub input: PathBuf,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub spacing_filter: bool,
}

impl ConversionEntry {
    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            bounds: self.bounds,
            spacing_filter: self.spacing_filter,
        }
    }
}

/// Output path of a sampler step
pub fn sampler_output(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", name, XYZ_EXT))
}

/// Output path of a camera rig step
pub fn camera_rig_output(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{}_camera.{}", name, CAMERA_RIG_EXT))
}

/// Output path of a conversion step
pub fn conversion_output(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", name, POINT_BUFFER_EXT))
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    Ok(manifest)
}

/// Validate a manifest without building
pub fn validate(manifest: &Manifest) -> Result<()> {
    for (name, sampler) in &manifest.samplers {
        match *sampler {
            Sampler::Octahedron { resolution, .. } if resolution < 2 => {
                bail!("Sampler '{}': octahedron resolution must be at least 2", name)
            }
            Sampler::Fibonacci { count } if count == 0 => {
                bail!("Sampler '{}': Fibonacci count must be at least 1", name)
            }
            _ => {}
        }
    }

    for (name, rig) in &manifest.camera_rigs {
        match (&rig.sampler, &rig.points) {
            (Some(sampler), None) => {
                if !manifest.samplers.contains_key(sampler) {
                    bail!("Camera rig '{}' references unknown sampler '{}'", name, sampler);
                }
            }
            (None, Some(points)) => {
                if !points.exists() {
                    bail!("Camera rig '{}' points not found: {:?}", name, points);
                }
            }
            _ => bail!(
                "Camera rig '{}' must set exactly one of 'sampler' or 'points'",
                name
            ),
        }
        if !Vec3::from_array(rig.target).is_finite() {
            bail!("Camera rig '{}' target must be finite", name);
        }
    }

    for (name, conversion) in &manifest.conversions {
        if !conversion.input.exists() {
            bail!("Conversion '{}' source not found: {:?}", name, conversion.input);
        }
        if let Some(bounds) = conversion.bounds {
            if (0..3).any(|axis| bounds.min[axis] >= bounds.max[axis]) {
                bail!("Conversion '{}' bounds are empty: {:?}", name, bounds);
            }
        }
    }

    Ok(())
}

/// Build every step of a manifest
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<()> {
    validate(manifest)?;

    let output_dir = output_override.unwrap_or(&manifest.output.dir);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    for (name, sampler) in &manifest.samplers {
        let output = sampler_output(output_dir, name);
        tracing::info!(
            "Sampling: {} ({} points) -> {:?}",
            name,
            sampler.point_count(),
            output
        );
        let points = sampler
            .sample()
            .with_context(|| format!("Sampler '{}' failed", name))?;
        write_xyz_file(&output, &points)
            .with_context(|| format!("Failed to write points: {:?}", output))?;
    }

    for (name, rig) in &manifest.camera_rigs {
        let input = match (&rig.sampler, &rig.points) {
            (Some(sampler), _) => sampler_output(output_dir, sampler),
            (None, Some(points)) => points.clone(),
            (None, None) => bail!("Camera rig '{}' has no point source", name),
        };
        let output = camera_rig_output(output_dir, name);
        tracing::info!("Baking camera rig: {} -> {:?}", name, output);
        bake_camera_rig(&input, &output, &rig.options())?;
    }

    for (name, conversion) in &manifest.conversions {
        let output = conversion_output(output_dir, name);
        tracing::info!("Converting point cloud: {} -> {:?}", name, output);
        convert_xyz_to_point_buffer(&conversion.input, &output, &conversion.options())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use impostor_common::{MATRIX_SIZE, read_xyz_file};

    const MANIFEST: &str = r#"
[samplers.octahedron]
kind = "octahedron"
resolution = 3

[samplers.sphere]
kind = "fibonacci"
count = 16

[camera_rigs.octahedron]
sampler = "octahedron"

[camera_rigs.sphere_poses]
sampler = "sphere"
matrix = "pose"
target = [0.0, 0.0, 0.5]
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest: Manifest = toml::from_str(MANIFEST).unwrap();
        assert_eq!(manifest.output.dir, PathBuf::from("bake/"));
        assert_eq!(
            manifest.samplers["octahedron"],
            Sampler::Octahedron {
                resolution: 3,
                spherize: true
            }
        );
        assert_eq!(manifest.samplers["sphere"], Sampler::Fibonacci { count: 16 });

        let rig = &manifest.camera_rigs["sphere_poses"];
        assert_eq!(rig.matrix, RigMatrix::Pose);
        assert_eq!(rig.options().target, Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(manifest.camera_rigs["octahedron"].matrix, RigMatrix::View);
        assert!(manifest.conversions.is_empty());
    }

    #[test]
    fn test_build_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest: Manifest = toml::from_str(MANIFEST).unwrap();
        build_all(&manifest, Some(dir.path())).unwrap();

        let points = read_xyz_file(&sampler_output(dir.path(), "octahedron")).unwrap();
        assert_eq!(points.len(), 18);

        let rig = std::fs::read(camera_rig_output(dir.path(), "octahedron")).unwrap();
        assert_eq!(rig.len(), 18 * MATRIX_SIZE);
        let rig = std::fs::read(camera_rig_output(dir.path(), "sphere_poses")).unwrap();
        assert_eq!(rig.len(), 16 * MATRIX_SIZE);
    }

    #[test]
    fn test_unknown_sampler_reference() {
        let manifest: Manifest = toml::from_str(
            r#"
[camera_rigs.broken]
sampler = "missing"
"#,
        )
        .unwrap();
        let err = validate(&manifest).unwrap_err();
        assert!(err.to_string().contains("unknown sampler"));
    }

    #[test]
    fn test_rig_needs_exactly_one_source() {
        let manifest: Manifest = toml::from_str("[camera_rigs.empty]\n").unwrap();
        assert!(validate(&manifest).is_err());
    }

    #[test]
    fn test_bad_sampler_parameters() {
        let manifest: Manifest = toml::from_str(
            r#"
[samplers.flat]
kind = "octahedron"
resolution = 1
spherize = false
"#,
        )
        .unwrap();
        assert!(validate(&manifest).is_err());
    }

    #[test]
    fn test_unknown_sampler_kind() {
        let result: Result<Manifest, _> = toml::from_str(
            r#"
[samplers.cube]
kind = "cube"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_conversion_step() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("grains.xyz");
        write_xyz_file(&input, &[Vec3::ZERO, Vec3::splat(200.0)]).unwrap();

        let text = format!(
            "[conversions.grains]\ninput = {:?}\n{}\n",
            input.to_str().unwrap(),
            "bounds = { min = [-151, -1000, -151], max = [151, 1000, 151] }"
        );
        let manifest: Manifest = toml::from_str(&text).unwrap();
        let out = dir.path().join("out");
        build_all(&manifest, Some(&out)).unwrap();

        let info =
            crate::point_buffer::inspect_point_buffer(&conversion_output(&out, "grains")).unwrap();
        assert_eq!(info.point_count, 1);
    }

    #[test]
    fn test_parse_spacing_filter() {
        let manifest: Manifest = toml::from_str(
            r#"
[conversions.thinned]
input = "grains.xyz"
spacing_filter = true

[conversions.plain]
input = "grains.xyz"
"#,
        )
        .unwrap();
        let options = manifest.conversions["thinned"].options();
        assert!(options.spacing_filter);
        assert_eq!(options.bounds, None);
        assert_eq!(manifest.conversions["plain"].options(), ConvertOptions::default());
    }
}
