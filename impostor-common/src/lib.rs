//! Shared formats for the impostor bake tools
//!
//! This crate holds everything that touches bytes on disk:
//! - camera-rig matrix streams (`.bin`, column-major f32)
//! - animated point buffers (`.bin`, f32 header + frame blocks)
//! - XYZ text point files (`.xyz`)
//!
//! # Modules
//!
//! - [`formats`] - Binary camera-rig and point-buffer formats
//! - [`xyz`] - Line-oriented XYZ text point files
//! - [`error`] - Error type shared by every format

pub mod error;
pub mod formats;
pub mod xyz;

pub use error::{BakeError, Result};

pub use formats::{
    CAMERA_RIG_EXT, MATRIX_FLOATS, MATRIX_SIZE, MAX_POINT_COUNT, MatrixStreamWriter,
    POINT_BUFFER_EXT, POINT_STRIDE, PointBuffer, PointBufferHeader, PointBufferReader,
    PointBufferWriter, decode_point_buffer, encode_point_buffer, read_matrix_stream,
    read_point_buffer_file, write_matrix_stream,
};

pub use xyz::{
    XYZ_EXT, XyzReader, parse_xyz_line, read_xyz, read_xyz_file, write_xyz, write_xyz_file,
};
