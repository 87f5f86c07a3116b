//! XYZ text point files (.xyz)
//!
//! ASCII, one point per non-empty line, exactly three whitespace-separated
//! decimal numbers. This is the interchange format between the samplers and
//! the camera-rig baker, so parsing is strict: any other token count is fatal.

use glam::Vec3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::error::{BakeError, Result};

/// Extension of XYZ text point files
pub const XYZ_EXT: &str = "xyz";

/// Parse a single non-empty line (1-based `line_number` is used for errors).
pub fn parse_xyz_line(line: &str, line_number: usize) -> Result<Vec3> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(BakeError::InvalidInput {
            line: line_number,
            message: format!(
                "expected 3 coordinates, found {} in {:?}",
                tokens.len(),
                line.trim()
            ),
        });
    }

    let mut coords = [0.0f32; 3];
    for (coord, token) in coords.iter_mut().zip(&tokens) {
        *coord = token.parse::<f32>().map_err(|_| BakeError::InvalidInput {
            line: line_number,
            message: format!("{:?} is not a number", token),
        })?;
        if !coord.is_finite() {
            return Err(BakeError::InvalidInput {
                line: line_number,
                message: format!("{:?} is not a finite coordinate", token),
            });
        }
    }

    Ok(Vec3::from_array(coords))
}

/// Line-by-line point reader.
///
/// Blank lines are skipped but still counted, so error line numbers match
/// what an editor shows.
pub struct XyzReader<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> XyzReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Line number of the most recently returned point
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for XyzReader<R> {
    type Item = Result<Vec3>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            match line {
                Err(e) => return Some(Err(e.into())),
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(parse_xyz_line(&line, self.line_number)),
            }
        }
    }
}

/// Read every point of an XYZ stream
pub fn read_xyz<R: BufRead>(reader: R) -> Result<Vec<Vec3>> {
    XyzReader::new(reader).collect()
}

/// Read every point of an XYZ file
pub fn read_xyz_file(path: &Path) -> Result<Vec<Vec3>> {
    let file = File::open(path)?;
    read_xyz(BufReader::new(file))
}

/// Write points as XYZ text, six fractional digits per coordinate
pub fn write_xyz<W: Write>(w: &mut W, points: &[Vec3]) -> Result<()> {
    for p in points {
        writeln!(w, "{:.6} {:.6} {:.6}", p.x, p.y, p.z)?;
    }
    Ok(())
}

/// Write points to an XYZ file
pub fn write_xyz_file(path: &Path, points: &[Vec3]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_xyz(&mut writer, points)?;
    writer.flush()?;
    Ok(())
}
