//! Binary formats produced and consumed by the bake tools
//!
//! Both formats are raw little-endian f32 streams with no magic bytes and no
//! version tag - the format is determined by context (which command wrote it,
//! which loader reads it). Existing files must stay readable, so neither
//! format gains a tag here.

pub mod matrix_stream;
pub mod point_buffer;

pub use matrix_stream::*;
pub use point_buffer::*;

use std::io::{self, ErrorKind, Read, Write};

/// Extension used by the renderer for camera-rig matrix streams
pub const CAMERA_RIG_EXT: &str = "bin";

/// Extension used by the renderer for point buffers
pub const POINT_BUFFER_EXT: &str = "bin";

/// Write f32 values as little-endian bytes.
pub(crate) fn write_f32s<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    #[cfg(target_endian = "little")]
    {
        w.write_all(bytemuck::cast_slice(values))
    }

    #[cfg(not(target_endian = "little"))]
    {
        for v in values {
            w.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }
}

/// Decode one little-endian f32 from a 4-byte chunk.
#[inline]
pub(crate) fn le_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Fill `buf` as far as the reader allows, returning the number of bytes read.
///
/// Unlike `read_exact`, a short read is reported instead of turned into an
/// error so callers can tell a clean end-of-stream (0) from a partial record.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
