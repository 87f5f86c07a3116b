//! Collaborator interfaces for animated point data
//!
//! The host animation system is represented by two traits:
//! - [`FrameSource`] yields the positions of a fixed set of points at a given
//!   frame (export direction)
//! - [`PointCloudSink`] receives decoded frames as vertex-only point clouds
//!   (import direction)
//!
//! The frame index is always an explicit argument; there is no "current
//! frame" state shared between calls.

use glam::Vec3;
use std::fs;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use impostor_common::{BakeError, Result, XYZ_EXT, read_xyz_file, write_xyz, write_xyz_file};

use crate::obj::write_obj_vertices;

/// Something that can report point positions per frame.
///
/// Frames are requested synchronously in increasing order. Every frame of a
/// single export must return the same number of points.
pub trait FrameSource {
    /// Positions of all points at `frame`, in a stable order
    fn sample_frame(&mut self, frame: u32) -> Result<Vec<Vec3>>;

    /// Frames this source can provide, if it knows
    fn frame_range(&self) -> Option<RangeInclusive<u32>> {
        None
    }
}

/// Something that can take a decoded point cloud.
pub trait PointCloudSink {
    /// Receive the points of buffer frame `frame` (0-based block index)
    fn add_point_cloud(&mut self, frame: usize, points: &[Vec3]) -> Result<()>;
}

/// Frames held in memory, starting at `first_frame`
#[derive(Debug, Clone, Default)]
pub struct RecordedFrames {
    pub first_frame: u32,
    pub frames: Vec<Vec<Vec3>>,
}

impl RecordedFrames {
    pub fn new(first_frame: u32, frames: Vec<Vec<Vec3>>) -> Self {
        Self {
            first_frame,
            frames,
        }
    }
}

fn range_from(first_frame: u32, len: usize) -> Option<RangeInclusive<u32>> {
    let last = first_frame.checked_add(u32::try_from(len.checked_sub(1)?).ok()?)?;
    Some(first_frame..=last)
}

fn out_of_range(frame: u32, range: Option<RangeInclusive<u32>>) -> BakeError {
    match range {
        Some(range) => BakeError::InvalidArgument(format!(
            "frame {} is outside the available frames {}..={}",
            frame,
            range.start(),
            range.end()
        )),
        None => {
            BakeError::InvalidArgument(format!("frame {} requested from an empty source", frame))
        }
    }
}

impl FrameSource for RecordedFrames {
    fn sample_frame(&mut self, frame: u32) -> Result<Vec<Vec3>> {
        frame
            .checked_sub(self.first_frame)
            .and_then(|index| self.frames.get(index as usize))
            .cloned()
            .ok_or_else(|| out_of_range(frame, self.frame_range()))
    }

    fn frame_range(&self) -> Option<RangeInclusive<u32>> {
        range_from(self.first_frame, self.frames.len())
    }
}

/// One `.xyz` file per frame, ordered by file name.
///
/// Stands in for the host animation system when exporting from the command
/// line: frame `first_frame + k` is the k-th file of the directory.
#[derive(Debug, Clone)]
pub struct XyzSequenceSource {
    files: Vec<PathBuf>,
    first_frame: u32,
}

impl XyzSequenceSource {
    /// Collect every `.xyz` file of `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_xyz = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(XYZ_EXT));
            if path.is_file() && is_xyz {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(BakeError::InvalidArgument(format!(
                "no .{} frames found in {:?}",
                XYZ_EXT, dir
            )));
        }
        files.sort();

        tracing::debug!("Found {} frame files in {:?}", files.len(), dir);

        Ok(Self {
            files,
            first_frame: 0,
        })
    }

    /// Number the first file as `first_frame`
    pub fn with_first_frame(mut self, first_frame: u32) -> Self {
        self.first_frame = first_frame;
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for XyzSequenceSource {
    fn sample_frame(&mut self, frame: u32) -> Result<Vec<Vec3>> {
        let path = frame
            .checked_sub(self.first_frame)
            .and_then(|index| self.files.get(index as usize))
            .ok_or_else(|| out_of_range(frame, self.frame_range()))?;

        read_xyz_file(path).map_err(|e| match e {
            BakeError::InvalidInput { line, message } => BakeError::InvalidInput {
                line,
                message: format!("{} ({:?})", message, path),
            },
            other => other,
        })
    }

    fn frame_range(&self) -> Option<RangeInclusive<u32>> {
        range_from(self.first_frame, self.files.len())
    }
}

/// Writes each received frame to `<dir>/<stem>_<frame>.xyz`
#[derive(Debug, Clone)]
pub struct XyzDirectorySink {
    dir: PathBuf,
    stem: String,
    written: Vec<PathBuf>,
}

impl XyzDirectorySink {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            stem: stem.into(),
            written: Vec::new(),
        })
    }

    /// Files written so far, in frame order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PointCloudSink for XyzDirectorySink {
    fn add_point_cloud(&mut self, frame: usize, points: &[Vec3]) -> Result<()> {
        let path = self
            .dir
            .join(format!("{}_{:04}.{}", self.stem, frame, XYZ_EXT));
        write_xyz_file(&path, points)?;
        self.written.push(path);
        Ok(())
    }
}

/// Text format of a [`PointCloudFileSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudFormat {
    /// Bare XYZ lines; frames are concatenated
    Xyz,
    /// Vertex-only Wavefront OBJ, one object per frame
    Obj,
}

impl CloudFormat {
    /// Pick a format from a file extension (`obj` or `xyz`)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "obj" => Some(CloudFormat::Obj),
            "xyz" => Some(CloudFormat::Xyz),
            _ => None,
        }
    }
}

/// Writes received frames as a polygon-free point cloud into one text sink
pub struct PointCloudFileSink<W: Write> {
    writer: W,
    format: CloudFormat,
    name: String,
}

impl<W: Write> PointCloudFileSink<W> {
    pub fn new(writer: W, format: CloudFormat, name: impl Into<String>) -> Self {
        Self {
            writer,
            format,
            name: name.into(),
        }
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> PointCloudSink for PointCloudFileSink<W> {
    fn add_point_cloud(&mut self, frame: usize, points: &[Vec3]) -> Result<()> {
        match self.format {
            CloudFormat::Xyz => write_xyz(&mut self.writer, points),
            CloudFormat::Obj => {
                writeln!(self.writer, "o {}_{:04}", self.name, frame)?;
                write_obj_vertices(&mut self.writer, points)?;
                Ok(())
            }
        }
    }
}
