//! Animated point buffer (.bin)
//!
//! Fixed number of points sampled over a range of frames. Written by the
//! point-buffer exporter, read back by the renderer and the importer.
//! POD format - no magic bytes, no version.
//!
//! # Layout
//! ```text
//! Header (8 bytes):
//! 0x00: point_count f32 LE   - integer value stored as a float
//! 0x04: frame_count f32 LE   - integer value stored as a float
//!
//! Frame Data (frame_count × point_count × 12 bytes):
//! Each point is stored as x, y, z (3 × f32 LE).
//! ```
//!
//! Frame data is stored sequentially: [frame0_point0, frame0_point1, ..., frame1_point0, ...]
//!
//! Counts are float-encoded because that is what existing files contain. The
//! header carries no magic number, so a camera-rig stream or any other blob
//! will parse as a point buffer as long as its first float looks like a sane
//! count. Readers only guard against counts that cannot describe the stream.

use glam::Vec3;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use super::{le_f32, read_full, write_f32s};
use crate::error::{BakeError, Result};

/// Size of one serialized point (3 floats × 4 bytes = 12)
pub const POINT_STRIDE: usize = 12;

/// Largest point count accepted in a header.
///
/// 2^24 is the last integer every f32 represents exactly; beyond it the
/// float-encoded count is no longer trustworthy.
pub const MAX_POINT_COUNT: usize = 1 << 24;

/// Point buffer header (8 bytes)
///
/// Keeps the raw floats so that readers can report exactly what the file
/// contains when validation fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointBufferHeader {
    /// Points per frame, float-encoded
    pub point_count: f32,
    /// Number of frames, float-encoded (informational for streaming readers)
    pub frame_count: f32,
}

impl PointBufferHeader {
    pub const SIZE: usize = 8;

    pub fn new(point_count: usize, frame_count: usize) -> Self {
        Self {
            point_count: point_count as f32,
            frame_count: frame_count as f32,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.point_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            point_count: le_f32(&bytes[0..4]),
            frame_count: le_f32(&bytes[4..8]),
        })
    }

    /// Validate the point count and return it as an integer.
    ///
    /// `remaining` is the number of bytes after the header, when known. A
    /// single frame must fit into it unless the buffer holds no frames at all.
    pub fn validate(&self, remaining: Option<u64>) -> Result<usize> {
        let raw = self.point_count;
        if !raw.is_finite() {
            return Err(BakeError::MalformedHeader(format!(
                "point count {} is not a finite number",
                raw
            )));
        }

        let count = raw.trunc();
        if count <= 0.0 {
            return Err(BakeError::MalformedHeader(format!(
                "point count {} must be positive",
                raw
            )));
        }
        if count > MAX_POINT_COUNT as f32 {
            return Err(BakeError::MalformedHeader(format!(
                "point count {} exceeds the limit of {} points",
                raw, MAX_POINT_COUNT
            )));
        }

        let count = count as usize;
        if let Some(remaining) = remaining {
            let frame_bytes = count as u64 * POINT_STRIDE as u64;
            if remaining > 0 && frame_bytes > remaining {
                return Err(BakeError::MalformedHeader(format!(
                    "point count {} needs {} bytes per frame but only {} bytes follow the header",
                    count, frame_bytes, remaining
                )));
            }
        }

        Ok(count)
    }

    /// Declared frame count, if the stored value is a usable integer
    pub fn frame_count_hint(&self) -> Option<usize> {
        let raw = self.frame_count;
        (raw.is_finite() && raw >= 0.0).then(|| raw.trunc() as usize)
    }

    /// Size of one frame block in bytes
    pub fn frame_size(point_count: usize) -> usize {
        point_count * POINT_STRIDE
    }
}

/// Incremental point buffer encoder.
///
/// Writes the header on construction, then one frame block per
/// [`write_frame`](Self::write_frame) call. Every frame must hold exactly
/// `point_count` points.
pub struct PointBufferWriter<W: Write> {
    writer: W,
    point_count: usize,
    frame_count: usize,
    frames_written: usize,
}

impl<W: Write> PointBufferWriter<W> {
    pub fn new(mut writer: W, point_count: usize, frame_count: usize) -> Result<Self> {
        if point_count == 0 || point_count > MAX_POINT_COUNT {
            return Err(BakeError::InvalidArgument(format!(
                "point count must be in 1..={}, got {}",
                MAX_POINT_COUNT, point_count
            )));
        }
        if frame_count > MAX_POINT_COUNT {
            return Err(BakeError::InvalidArgument(format!(
                "frame count {} cannot be stored exactly in the header",
                frame_count
            )));
        }

        writer.write_all(&PointBufferHeader::new(point_count, frame_count).to_bytes())?;

        Ok(Self {
            writer,
            point_count,
            frame_count,
            frames_written: 0,
        })
    }

    /// Append one frame block.
    ///
    /// A frame of the wrong length is rejected before any byte of it is written.
    pub fn write_frame(&mut self, points: &[Vec3]) -> Result<()> {
        if points.len() != self.point_count {
            return Err(BakeError::MalformedInput(format!(
                "frame {} has {} points, expected {}",
                self.frames_written,
                points.len(),
                self.point_count
            )));
        }
        if self.frames_written == self.frame_count {
            return Err(BakeError::MalformedInput(format!(
                "header declares {} frames, refusing to write more",
                self.frame_count
            )));
        }

        write_f32s(&mut self.writer, bytemuck::cast_slice(points))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Check the frame count against the header, flush, and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        if self.frames_written != self.frame_count {
            return Err(BakeError::MalformedInput(format!(
                "header declares {} frames but {} were written",
                self.frame_count, self.frames_written
            )));
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write a complete point buffer
///
/// # Arguments
/// * `writer` - Sink to write to
/// * `point_count` - Points per frame
/// * `frames` - Frames in order, each holding `point_count` points
pub fn encode_point_buffer<W: Write, F: AsRef<[Vec3]>>(
    writer: W,
    point_count: usize,
    frames: &[F],
) -> Result<W> {
    let mut encoder = PointBufferWriter::new(writer, point_count, frames.len())?;
    for frame in frames {
        encoder.write_frame(frame.as_ref())?;
    }
    encoder.finish()
}

/// Streaming point buffer decoder.
///
/// Yields one frame per iteration until the end of the stream. The declared
/// frame count is not needed and not trusted; a stream that stops inside a
/// frame yields [`BakeError::TruncatedStream`]. After the first error the
/// iterator is exhausted. To read again, reopen the source.
pub struct PointBufferReader<R: Read> {
    reader: R,
    header: PointBufferHeader,
    point_count: usize,
    frames_read: usize,
    done: bool,
}

impl<R: Read> PointBufferReader<R> {
    /// Read and validate the header.
    ///
    /// `stream_len` is the total stream length (header included) when known;
    /// it tightens the point-count sanity check.
    pub fn new(mut reader: R, stream_len: Option<u64>) -> Result<Self> {
        let mut bytes = [0u8; PointBufferHeader::SIZE];
        let n = read_full(&mut reader, &mut bytes)?;
        let header = PointBufferHeader::from_bytes(&bytes[..n]).ok_or_else(|| {
            BakeError::TruncatedStream(format!(
                "point buffer header needs {} bytes, found {}",
                PointBufferHeader::SIZE,
                n
            ))
        })?;

        let remaining = stream_len.map(|len| len.saturating_sub(PointBufferHeader::SIZE as u64));
        let point_count = header.validate(remaining)?;

        tracing::debug!(
            "Point buffer header: {} points, {:?} frames declared",
            point_count,
            header.frame_count_hint()
        );

        Ok(Self {
            reader,
            header,
            point_count,
            frames_read: 0,
            done: false,
        })
    }

    pub fn header(&self) -> PointBufferHeader {
        self.header
    }

    /// Points per frame
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Frames successfully decoded so far
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    fn read_frame(&mut self) -> Result<Option<Vec<Vec3>>> {
        let mut bytes = vec![0u8; PointBufferHeader::frame_size(self.point_count)];
        let n = read_full(&mut self.reader, &mut bytes)?;
        if n == 0 {
            return Ok(None);
        }
        if n < bytes.len() {
            return Err(BakeError::TruncatedStream(format!(
                "frame {} holds {} of {} bytes",
                self.frames_read,
                n,
                bytes.len()
            )));
        }

        let points = bytes
            .chunks_exact(POINT_STRIDE)
            .map(|p| Vec3::new(le_f32(&p[0..4]), le_f32(&p[4..8]), le_f32(&p[8..12])))
            .collect();
        Ok(Some(points))
    }
}

impl PointBufferReader<BufReader<File>> {
    /// Open a point buffer file, using its size for header validation.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Self::new(BufReader::new(file), Some(len))
    }
}

impl<R: Read> Iterator for PointBufferReader<R> {
    type Item = Result<Vec<Vec3>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => {
                self.frames_read += 1;
                Some(Ok(frame))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fully decoded point buffer
#[derive(Debug, Clone, PartialEq)]
pub struct PointBuffer {
    pub point_count: usize,
    pub frames: Vec<Vec<Vec3>>,
}

impl PointBuffer {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&[Vec3]> {
        self.frames.get(index).map(Vec::as_slice)
    }
}

/// Decode every frame of a point buffer stream
pub fn decode_point_buffer<R: Read>(reader: R, stream_len: Option<u64>) -> Result<PointBuffer> {
    let decoder = PointBufferReader::new(reader, stream_len)?;
    let point_count = decoder.point_count();
    let frames = decoder.collect::<Result<Vec<_>>>()?;
    Ok(PointBuffer {
        point_count,
        frames,
    })
}

/// Decode a point buffer file
pub fn read_point_buffer_file(path: &Path) -> Result<PointBuffer> {
    let decoder = PointBufferReader::open(path)?;
    let point_count = decoder.point_count();
    let frames = decoder.collect::<Result<Vec<_>>>()?;
    Ok(PointBuffer {
        point_count,
        frames,
    })
}
