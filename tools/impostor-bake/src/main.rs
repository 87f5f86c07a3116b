//! impostor-bake - impostor content preparation tool
//!
//! Samples view directions on the sphere, bakes them into camera rigs (.bin
//! matrix streams) and moves animated point clouds in and out of point
//! buffers (.bin)

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use glam::Vec3;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use impostor_bake::{
    Bounds, CameraRigOptions, CloudFormat, ConvertOptions, FrameSelection, FrameSource,
    PointCloudFileSink, RigMatrix, XyzDirectorySink, XyzSequenceSource, manifest, obj,
    point_buffer, rig, sampler,
};
use impostor_common::{CAMERA_RIG_EXT, POINT_BUFFER_EXT, write_xyz_file};

#[derive(Parser)]
#[command(name = "impostor-bake")]
#[command(about = "Impostor camera rig and point buffer tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample a subdivided octahedron (2 × resolution² points)
    Octahedron {
        /// Grid resolution per hemisphere (at least 2)
        #[arg(short, long, default_value_t = 8)]
        resolution: usize,

        /// Keep points on the octahedron instead of the unit sphere
        #[arg(long)]
        flat: bool,

        /// Output .xyz file
        #[arg(short, long, default_value = "octahedron.xyz")]
        output: PathBuf,
    },

    /// Sample a Fibonacci sphere
    Fibonacci {
        /// Number of points
        #[arg(short = 'n', long, default_value_t = 128)]
        count: usize,

        /// Output .xyz file
        #[arg(short, long, default_value = "fibonacci.xyz")]
        output: PathBuf,
    },

    /// Export the upper octahedron hemisphere as a quad mesh
    OctahedronMesh {
        /// Grid resolution (at least 2)
        #[arg(short, long, default_value_t = 8)]
        resolution: usize,

        /// Push vertices onto the unit sphere
        #[arg(long)]
        spherize: bool,

        /// Output .obj file
        #[arg(short, long, default_value = "octahedron.obj")]
        output: PathBuf,
    },

    /// Bake one camera matrix per point of an .xyz file
    CameraRig {
        /// Input .xyz file
        input: PathBuf,

        /// Output .bin file (default: <input>_camera.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Point the cameras look at (default: origin)
        #[arg(
            long,
            action = ArgAction::Set,
            num_args = 3,
            value_names = ["X", "Y", "Z"],
            allow_negative_numbers = true
        )]
        target: Option<Vec<f32>>,

        /// Matrix written per camera
        #[arg(long, value_enum, default_value_t = RigMatrix::View)]
        matrix: RigMatrix,
    },

    /// Export a directory of per-frame .xyz files as a point buffer
    PointBufferExport {
        /// Directory holding one .xyz file per frame
        frames: PathBuf,

        /// Output .bin file (default: <frames>.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Frame number of the first file
        #[arg(long, default_value_t = 1)]
        first_frame: u32,

        /// First frame to export (default: first available)
        #[arg(long)]
        start: Option<u32>,

        /// Last frame to export, inclusive (default: last available)
        #[arg(long)]
        end: Option<u32>,
    },

    /// Import frames of a point buffer as point clouds
    PointBufferImport {
        /// Input point buffer .bin file
        input: PathBuf,

        /// Output .obj/.xyz file, or a directory for one .xyz per frame
        #[arg(short, long)]
        output: PathBuf,

        /// Import every frame instead of the rest pose only
        #[arg(long, conflicts_with = "frame")]
        all_frames: bool,

        /// Import a single frame by index
        #[arg(long)]
        frame: Option<usize>,
    },

    /// Convert an .xyz point cloud into a single-frame point buffer
    Convert {
        /// Input .xyz file
        input: PathBuf,

        /// Output .bin file (default: <input>.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Lower corner of the kept box (inclusive)
        #[arg(
            long,
            action = ArgAction::Set,
            num_args = 3,
            value_names = ["X", "Y", "Z"],
            allow_negative_numbers = true,
            requires = "max"
        )]
        min: Option<Vec<f32>>,

        /// Upper corner of the kept box (exclusive)
        #[arg(
            long,
            action = ArgAction::Set,
            num_args = 3,
            value_names = ["X", "Y", "Z"],
            allow_negative_numbers = true,
            requires = "min"
        )]
        max: Option<Vec<f32>>,

        /// Drop points closer to a neighbour than mean - stdev of the spacing
        #[arg(long)]
        spacing_filter: bool,
    },

    /// Print a summary of a point buffer or camera rig
    Inspect {
        /// File to inspect
        path: PathBuf,

        /// Kind of .bin file
        #[arg(short, long, value_enum, default_value_t = BinKind::PointBuffer)]
        kind: BinKind,
    },

    /// Build everything listed in a manifest file
    Build {
        /// Path to bake.toml manifest
        #[arg(default_value = "bake.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to bake.toml manifest
        #[arg(default_value = "bake.toml")]
        manifest: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BinKind {
    PointBuffer,
    CameraRig,
}

fn vec3_arg(name: &str, values: Option<Vec<f32>>) -> Result<Option<Vec3>> {
    match values.as_deref() {
        None => Ok(None),
        Some(&[x, y, z]) => Ok(Some(Vec3::new(x, y, z))),
        Some(other) => anyhow::bail!("--{} takes 3 values, got {}", name, other.len()),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("points")
        .to_string()
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Octahedron {
            resolution,
            flat,
            output,
        } => {
            let points = sampler::octahedron_points(resolution, !flat)?;
            write_xyz_file(&output, &points)
                .with_context(|| format!("Failed to write points: {:?}", output))?;
            tracing::info!("Wrote {} octahedron points to {:?}", points.len(), output);
        }

        Commands::Fibonacci { count, output } => {
            let points = sampler::fibonacci_points(count)?;
            write_xyz_file(&output, &points)
                .with_context(|| format!("Failed to write points: {:?}", output))?;
            tracing::info!("Wrote {} Fibonacci points to {:?}", points.len(), output);
        }

        Commands::OctahedronMesh {
            resolution,
            spherize,
            output,
        } => {
            let mesh = sampler::octahedron_mesh(resolution, spherize)?;
            obj::write_obj_mesh_file(&output, "Octahedron", &mesh)?;
        }

        Commands::CameraRig {
            input,
            output,
            target,
            matrix,
        } => {
            let output = output.unwrap_or_else(|| {
                input.with_file_name(format!("{}_camera.{}", file_stem(&input), CAMERA_RIG_EXT))
            });
            let options = CameraRigOptions {
                target: vec3_arg("target", target)?.unwrap_or(Vec3::ZERO),
                matrix,
            };
            tracing::info!("Baking camera rig {:?} -> {:?}", input, output);
            rig::bake_camera_rig(&input, &output, &options)?;
            tracing::info!("Done!");
        }

        Commands::PointBufferExport {
            frames,
            output,
            first_frame,
            start,
            end,
        } => {
            let output = output.unwrap_or_else(|| frames.with_extension(POINT_BUFFER_EXT));
            let mut source = XyzSequenceSource::from_dir(&frames)
                .with_context(|| format!("Failed to collect frames from {:?}", frames))?
                .with_first_frame(first_frame);
            let available = source
                .frame_range()
                .with_context(|| format!("Too many frame files in {:?}", frames))?;
            let start = start.unwrap_or(*available.start());
            let end = end.unwrap_or(*available.end());

            tracing::info!("Exporting frames {}..={} of {:?} -> {:?}", start, end, frames, output);
            point_buffer::export_point_buffer_file(&mut source, start..=end, &output)?;
            tracing::info!("Done!");
        }

        Commands::PointBufferImport {
            input,
            output,
            all_frames,
            frame,
        } => {
            let selection = match (all_frames, frame) {
                (true, _) => FrameSelection::All,
                (false, Some(index)) => FrameSelection::Index(index),
                (false, None) => FrameSelection::First,
            };
            let name = file_stem(&input);

            let imported = match CloudFormat::from_path(&output) {
                Some(format) => {
                    let file = File::create(&output)
                        .with_context(|| format!("Failed to create output: {:?}", output))?;
                    let mut sink = PointCloudFileSink::new(BufWriter::new(file), format, name);
                    let imported =
                        point_buffer::import_point_buffer(&input, &mut sink, selection)?;
                    sink.finish()?;
                    imported
                }
                None => {
                    let mut sink = XyzDirectorySink::new(&output, name)
                        .with_context(|| format!("Failed to create directory: {:?}", output))?;
                    point_buffer::import_point_buffer(&input, &mut sink, selection)?
                }
            };
            tracing::info!("Imported {} frame(s) -> {:?}", imported, output);
        }

        Commands::Convert {
            input,
            output,
            min,
            max,
            spacing_filter,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(POINT_BUFFER_EXT));
            let bounds = match (vec3_arg("min", min)?, vec3_arg("max", max)?) {
                (Some(min), Some(max)) => Some(Bounds {
                    min: min.to_array(),
                    max: max.to_array(),
                }),
                _ => None,
            };
            let options = ConvertOptions {
                bounds,
                spacing_filter,
            };
            point_buffer::convert_xyz_to_point_buffer(&input, &output, &options)?;
        }

        Commands::Inspect { path, kind } => match kind {
            BinKind::PointBuffer => {
                let info = point_buffer::inspect_point_buffer(&path)?;
                tracing::info!("Point buffer {:?}:", path);
                tracing::info!("  points per frame: {}", info.point_count);
                tracing::info!(
                    "  frames: {} present, header says {:?}",
                    info.frames_present,
                    info.declared_frames
                );
                if let Some((lo, hi)) = info.first_frame_bounds {
                    tracing::info!("  frame 0 bounds: {} .. {}", lo, hi);
                }
            }
            BinKind::CameraRig => {
                let info = rig::inspect_camera_rig(&path)?;
                tracing::info!("Camera rig {:?}: {} matrices", path, info.matrix_count);
                for (i, eye) in info.eyes.iter().enumerate() {
                    tracing::info!("  [{}] eye {}", i, eye);
                }
            }
        },

        Commands::Build { manifest, output } => {
            tracing::info!("Building from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::build_all(&config, output.as_deref())?;
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid!");
        }
    }

    Ok(())
}
