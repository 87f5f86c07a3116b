//! impostor-bake library
//!
//! Content-preparation steps for baking camera impostors, usable from the CLI
//! or from other tools that host an animation system.

pub mod camera;
pub mod frames;
pub mod manifest;
pub mod obj;
pub mod point_buffer;
pub mod rig;
pub mod sampler;
pub mod spacing;

// Re-export the shared formats so callers need a single dependency
pub use impostor_common::{BakeError, PointBuffer, PointBufferHeader};

pub use camera::{CameraTransform, FALLBACK_UP, WORLD_UP, look_from, look_from_origin};
pub use frames::{
    CloudFormat, FrameSource, PointCloudFileSink, PointCloudSink, RecordedFrames,
    XyzDirectorySink, XyzSequenceSource,
};
pub use point_buffer::{
    Bounds, ConvertOptions, ExportSummary, FrameSelection, PointBufferInfo,
    convert_xyz_to_point_buffer, export_point_buffer, export_point_buffer_file,
    import_point_buffer, inspect_point_buffer,
};
pub use rig::{
    CameraRigOptions, RigInfo, RigMatrix, bake_camera_rig, inspect_camera_rig, write_camera_rig,
};
pub use sampler::{
    GOLDEN_RATIO, OctahedronMesh, Sampler, fibonacci_points, octahedron_mesh, octahedron_points,
};
pub use spacing::{SpacingFilter, SpacingStats, filter_close_points};
