//! Point buffer export, import and conversion
//!
//! Export drives a [`FrameSource`] over a frame range and streams every frame
//! into a point buffer. Import decodes a point buffer and hands frames to a
//! [`PointCloudSink`].

use anyhow::{Context, Result, bail};
use glam::Vec3;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::Path;

use impostor_common::{
    BakeError, PointBufferHeader, PointBufferReader, PointBufferWriter, read_xyz_file,
};

use crate::frames::{FrameSource, PointCloudSink};
use crate::spacing::filter_close_points;

/// What an export produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub point_count: usize,
    pub frame_count: usize,
}

/// Export `frames` of `source` into a point buffer.
///
/// The first frame fixes the point count; the header frame count is the
/// length of the range. Frames are sampled in increasing order.
pub fn export_point_buffer<S: FrameSource + ?Sized, W: Write>(
    source: &mut S,
    frames: RangeInclusive<u32>,
    writer: W,
) -> Result<ExportSummary, BakeError> {
    let (start, end) = (*frames.start(), *frames.end());
    if start > end {
        return Err(BakeError::InvalidArgument(format!(
            "frame range {}..={} is empty",
            start, end
        )));
    }
    let frame_count = (end - start) as usize + 1;

    let first = source.sample_frame(start)?;
    let point_count = first.len();
    tracing::info!(
        "Exporting point positions of {} points between frames {} and {}",
        point_count,
        start,
        end
    );

    let mut encoder = PointBufferWriter::new(writer, point_count, frame_count)?;
    encoder.write_frame(&first)?;

    for frame in frames.skip(1) {
        let points = source.sample_frame(frame)?;
        encoder.write_frame(&points).map_err(|e| match e {
            BakeError::MalformedInput(message) => {
                BakeError::MalformedInput(format!("source frame {}: {}", frame, message))
            }
            other => other,
        })?;
    }

    encoder.finish()?;

    Ok(ExportSummary {
        point_count,
        frame_count,
    })
}

/// Export a point buffer file
pub fn export_point_buffer_file<S: FrameSource + ?Sized>(
    source: &mut S,
    frames: RangeInclusive<u32>,
    output: &Path,
) -> Result<ExportSummary> {
    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    let summary = export_point_buffer(source, frames, BufWriter::new(file))
        .with_context(|| format!("Failed to export point buffer {:?}", output))?;

    tracing::info!(
        "Exported point buffer: {} points × {} frames",
        summary.point_count,
        summary.frame_count
    );
    Ok(summary)
}

/// Which frames of a point buffer to import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSelection {
    /// Only frame 0 (rest pose)
    #[default]
    First,
    /// Every frame
    All,
    /// A single frame by 0-based index
    Index(usize),
}

impl FrameSelection {
    fn includes(self, index: usize) -> bool {
        match self {
            FrameSelection::First => index == 0,
            FrameSelection::All => true,
            FrameSelection::Index(i) => index == i,
        }
    }

    /// True once no frame after `index` can be selected
    fn done_after(self, index: usize) -> bool {
        match self {
            FrameSelection::First => true,
            FrameSelection::All => false,
            FrameSelection::Index(i) => index >= i,
        }
    }
}

/// Decode a point buffer file and feed the selected frames to `sink`.
///
/// Returns the number of frames handed to the sink.
pub fn import_point_buffer<S: PointCloudSink + ?Sized>(
    input: &Path,
    sink: &mut S,
    selection: FrameSelection,
) -> Result<usize> {
    let reader = PointBufferReader::open(input)
        .with_context(|| format!("Failed to open point buffer: {:?}", input))?;
    tracing::info!(
        "Loading {} points per frame from {:?}",
        reader.point_count(),
        input
    );

    let mut imported = 0;
    let mut seen = 0;
    for (index, frame) in reader.enumerate() {
        let frame =
            frame.with_context(|| format!("Failed to read frame {} of {:?}", index, input))?;
        seen = index + 1;
        if selection.includes(index) {
            sink.add_point_cloud(index, &frame)?;
            imported += 1;
        }
        if selection.done_after(index) {
            break;
        }
    }

    if imported == 0 {
        bail!(
            "Frame selection {:?} matched nothing ({} frames read from {:?})",
            selection,
            seen,
            input
        );
    }

    Ok(imported)
}

/// Axis-aligned box filter, `min` inclusive and `max` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    pub fn contains(&self, p: Vec3) -> bool {
        let min = Vec3::from_array(self.min);
        let max = Vec3::from_array(self.max);
        p.cmpge(min).all() && p.cmplt(max).all()
    }
}

/// Filters applied by [`convert_xyz_to_point_buffer`], in field order
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct ConvertOptions {
    /// Keep only points inside this box
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Drop points closer than `mean - stdev` of the nearest-neighbour distances
    #[serde(default)]
    pub spacing_filter: bool,
}

/// Convert an XYZ file into a single-frame point buffer.
///
/// Returns the number of points kept after filtering.
pub fn convert_xyz_to_point_buffer(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<usize> {
    let mut points =
        read_xyz_file(input).with_context(|| format!("Failed to read point file: {:?}", input))?;
    let loaded = points.len();

    if let Some(bounds) = options.bounds {
        points.retain(|p| bounds.contains(*p));
        tracing::info!("Filtered point cloud down to {} of {} points", points.len(), loaded);
    }
    if options.spacing_filter {
        points = filter_close_points(&points)
            .with_context(|| format!("Failed to filter point spacing of {:?}", input))?
            .kept;
    }
    if points.is_empty() {
        bail!("No points to convert from {:?}", input);
    }

    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    let mut encoder = PointBufferWriter::new(BufWriter::new(file), points.len(), 1)?;
    encoder.write_frame(&points)?;
    encoder.finish()?;

    tracing::info!("Converted {} points {:?} -> {:?}", points.len(), input, output);
    Ok(points.len())
}

/// Summary of an existing point buffer file
#[derive(Debug, Clone)]
pub struct PointBufferInfo {
    pub header: PointBufferHeader,
    pub point_count: usize,
    /// Frame count stored in the header
    pub declared_frames: Option<usize>,
    /// Complete frames actually present in the file
    pub frames_present: usize,
    /// Bounding box of frame 0
    pub first_frame_bounds: Option<(Vec3, Vec3)>,
}

/// Decode a whole point buffer and summarize it
pub fn inspect_point_buffer(path: &Path) -> Result<PointBufferInfo> {
    let reader = PointBufferReader::open(path)
        .with_context(|| format!("Failed to open point buffer: {:?}", path))?;
    let header = reader.header();
    let point_count = reader.point_count();

    let mut frames_present = 0;
    let mut first_frame_bounds = None;
    for frame in reader {
        let frame = frame.with_context(|| format!("Failed to read point buffer: {:?}", path))?;
        if frames_present == 0 {
            first_frame_bounds = frame.iter().fold(None, |acc: Option<(Vec3, Vec3)>, p| {
                Some(match acc {
                    Some((lo, hi)) => (lo.min(*p), hi.max(*p)),
                    None => (*p, *p),
                })
            });
        }
        frames_present += 1;
    }

    let declared_frames = header.frame_count_hint();
    if declared_frames != Some(frames_present) {
        tracing::warn!(
            "Header declares {:?} frames but {} are present in {:?}",
            declared_frames,
            frames_present,
            path
        );
    }

    Ok(PointBufferInfo {
        header,
        point_count,
        declared_frames,
        frames_present,
        first_frame_bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{RecordedFrames, XyzDirectorySink};
    use impostor_common::{
        decode_point_buffer, read_point_buffer_file, read_xyz_file, write_xyz_file,
    };

    fn orbit(frames: u32, points: usize) -> RecordedFrames {
        let frames = (0..frames)
            .map(|f| {
                (0..points)
                    .map(|i| Vec3::new(i as f32, f as f32, (i * f as usize) as f32 * 0.5))
                    .collect()
            })
            .collect();
        RecordedFrames::new(1, frames)
    }

    #[test]
    fn test_export_frames_in_order() {
        let mut source = orbit(4, 3);
        let mut bytes = Vec::new();
        let summary = export_point_buffer(&mut source, 1..=4, &mut bytes).unwrap();
        assert_eq!(
            summary,
            ExportSummary {
                point_count: 3,
                frame_count: 4
            }
        );

        let decoded = decode_point_buffer(bytes.as_slice(), Some(bytes.len() as u64)).unwrap();
        assert_eq!(decoded.frames, source.frames);

        let header = PointBufferHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header, PointBufferHeader::new(3, 4));
    }

    #[test]
    fn test_export_partial_range() {
        let mut source = orbit(5, 2);
        let mut out = Vec::new();
        export_point_buffer(&mut source, 2..=3, &mut out).unwrap();

        let decoded = decode_point_buffer(out.as_slice(), None).unwrap();
        assert_eq!(decoded.frames, source.frames[1..3].to_vec());
    }

    #[test]
    fn test_export_rejects_changing_point_count() {
        let mut source = RecordedFrames::new(0, vec![vec![Vec3::X, Vec3::Y], vec![Vec3::Z]]);
        let mut out = Vec::new();
        let err = export_point_buffer(&mut source, 0..=1, &mut out).unwrap_err();
        assert!(matches!(err, BakeError::MalformedInput(_)), "got {:?}", err);
    }

    #[test]
    fn test_export_missing_frame() {
        let mut source = orbit(2, 2);
        let mut out = Vec::new();
        assert!(matches!(
            export_point_buffer(&mut source, 1..=3, &mut out),
            Err(BakeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_import_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.bin");
        let mut source = orbit(3, 2);
        export_point_buffer_file(&mut source, 1..=3, &path).unwrap();

        let mut sink = XyzDirectorySink::new(dir.path().join("all"), "anim").unwrap();
        assert_eq!(import_point_buffer(&path, &mut sink, FrameSelection::All).unwrap(), 3);
        assert_eq!(read_xyz_file(&sink.written()[2]).unwrap(), source.frames[2]);

        let mut sink = XyzDirectorySink::new(dir.path().join("first"), "anim").unwrap();
        assert_eq!(import_point_buffer(&path, &mut sink, FrameSelection::First).unwrap(), 1);
        assert_eq!(read_xyz_file(&sink.written()[0]).unwrap(), source.frames[0]);

        let mut sink = XyzDirectorySink::new(dir.path().join("one"), "anim").unwrap();
        assert_eq!(import_point_buffer(&path, &mut sink, FrameSelection::Index(1)).unwrap(), 1);
        assert!(sink.written()[0].ends_with("anim_0001.xyz"));

        let mut sink = XyzDirectorySink::new(dir.path().join("none"), "anim").unwrap();
        assert!(import_point_buffer(&path, &mut sink, FrameSelection::Index(7)).is_err());
    }

    #[test]
    fn test_import_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.bin");
        let mut source = orbit(2, 4);
        export_point_buffer_file(&mut source, 1..=2, &path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, &bytes).unwrap();

        let mut sink = XyzDirectorySink::new(dir.path().join("out"), "anim").unwrap();
        let err = import_point_buffer(&path, &mut sink, FrameSelection::All).unwrap_err();
        let cause = err.downcast_ref::<BakeError>().expect("BakeError in chain");
        assert!(matches!(cause, BakeError::TruncatedStream(_)), "got {:?}", cause);
    }

    #[test]
    fn test_convert_with_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("grains.xyz");
        let output = dir.path().join("grains.bin");
        write_xyz_file(
            &input,
            &[Vec3::new(0.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), Vec3::new(-1.0, 0.5, 0.5)],
        )
        .unwrap();

        let bounds = Bounds {
            min: [-1.0, -1.0, -1.0],
            max: [1.0, 1.0, 1.0],
        };
        let options = ConvertOptions {
            bounds: Some(bounds),
            ..Default::default()
        };
        assert_eq!(convert_xyz_to_point_buffer(&input, &output, &options).unwrap(), 2);

        let info = inspect_point_buffer(&output).unwrap();
        assert_eq!(info.point_count, 2);
        assert_eq!(info.declared_frames, Some(1));
        assert_eq!(info.frames_present, 1);
        assert_eq!(
            info.first_frame_bounds,
            Some((Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.5)))
        );
    }

    #[test]
    fn test_convert_everything_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("far.xyz");
        write_xyz_file(&input, &[Vec3::splat(10.0)]).unwrap();

        let bounds = Bounds {
            min: [0.0; 3],
            max: [1.0; 3],
        };
        let options = ConvertOptions {
            bounds: Some(bounds),
            ..Default::default()
        };
        let output = dir.path().join("far.bin");
        assert!(convert_xyz_to_point_buffer(&input, &output, &options).is_err());
    }

    #[test]
    fn test_convert_with_spacing_filter() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("grains.xyz");
        let output = dir.path().join("grains.bin");
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(20.25, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
            Vec3::new(500.0, 0.0, 0.0),
        ];
        write_xyz_file(&input, &points).unwrap();

        // Bounds run first, so the far point does not skew the spacing statistics
        let options = ConvertOptions {
            bounds: Some(Bounds {
                min: [-1.0; 3],
                max: [100.0; 3],
            }),
            spacing_filter: true,
        };
        assert_eq!(convert_xyz_to_point_buffer(&input, &output, &options).unwrap(), 4);

        let decoded = read_point_buffer_file(&output).unwrap();
        assert_eq!(
            decoded.frames[0],
            vec![points[0], points[1], points[2], points[4]]
        );
    }

    #[test]
    fn test_export_range_ending_at_last_frame() {
        let mut source = RecordedFrames::new(u32::MAX, vec![vec![Vec3::X]]);
        let mut out = Vec::new();
        let summary = export_point_buffer(&mut source, u32::MAX..=u32::MAX, &mut out).unwrap();
        assert_eq!(summary.frame_count, 1);

        let mut source = RecordedFrames::new(u32::MAX - 1, vec![vec![Vec3::X], vec![Vec3::Y]]);
        let mut out = Vec::new();
        export_point_buffer(&mut source, u32::MAX - 1..=u32::MAX, &mut out).unwrap();
        let decoded = decode_point_buffer(out.as_slice(), None).unwrap();
        assert_eq!(decoded.frames, vec![vec![Vec3::X], vec![Vec3::Y]]);
    }

    #[test]
    fn test_bounds_half_open() {
        let bounds = Bounds {
            min: [0.0; 3],
            max: [1.0; 3],
        };
        assert!(bounds.contains(Vec3::ZERO));
        assert!(!bounds.contains(Vec3::new(1.0, 0.5, 0.5)));
    }
}
