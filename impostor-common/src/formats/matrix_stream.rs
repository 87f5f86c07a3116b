//! Camera-rig matrix stream (.bin)
//!
//! Sequence of 4×4 f32 matrices consumed by the renderer as per-frame view
//! matrices. No header and no count - the consumer derives the matrix count
//! from the file size (or from the line count of the paired `.xyz` file).
//!
//! # Layout
//! ```text
//! 0x00: matrix 0 (16 × f32 LE, column-major)
//! 0x40: matrix 1
//! ...
//! ```
//!
//! Each matrix is stored column by column: entry (row i, column j) lands at
//! float index `4·j + i`. This is the glm/glam convention the renderer loads
//! with `make_mat4`, so the order must never be switched to row-major.

use glam::Mat4;
use std::io::{Read, Write};

use super::{le_f32, write_f32s};
use crate::error::{BakeError, Result};

/// Floats per serialized matrix
pub const MATRIX_FLOATS: usize = 16;

/// Size of one serialized matrix in bytes (16 floats × 4 bytes = 64)
pub const MATRIX_SIZE: usize = MATRIX_FLOATS * 4;

/// Appends column-major matrices to a byte sink.
pub struct MatrixStreamWriter<W: Write> {
    writer: W,
    count: usize,
}

impl<W: Write> MatrixStreamWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    /// Append one matrix (64 bytes).
    pub fn write_matrix(&mut self, matrix: &Mat4) -> Result<()> {
        // glam stores columns contiguously, which is exactly the on-disk order
        write_f32s(&mut self.writer, &matrix.to_cols_array())?;
        self.count += 1;
        Ok(())
    }

    /// Flush the sink and return the number of matrices written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.count)
    }
}

/// Write a complete matrix stream
pub fn write_matrix_stream<W: Write>(writer: W, matrices: &[Mat4]) -> Result<usize> {
    let mut stream = MatrixStreamWriter::new(writer);
    for matrix in matrices {
        stream.write_matrix(matrix)?;
    }
    stream.finish()
}

/// Read a complete matrix stream.
///
/// The byte length must be a multiple of [`MATRIX_SIZE`].
pub fn read_matrix_stream<R: Read>(mut reader: R) -> Result<Vec<Mat4>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() % MATRIX_SIZE != 0 {
        return Err(BakeError::MalformedInput(format!(
            "matrix stream is {} bytes, not a multiple of {}",
            bytes.len(),
            MATRIX_SIZE
        )));
    }

    let matrices = bytes
        .chunks_exact(MATRIX_SIZE)
        .map(|chunk| {
            let mut cols = [0.0f32; MATRIX_FLOATS];
            for (value, raw) in cols.iter_mut().zip(chunk.chunks_exact(4)) {
                *value = le_f32(raw);
            }
            Mat4::from_cols_array(&cols)
        })
        .collect();

    Ok(matrices)
}
