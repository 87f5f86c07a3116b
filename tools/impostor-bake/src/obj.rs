//! Wavefront OBJ output for sampled meshes and point clouds

use glam::Vec3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::sampler::OctahedronMesh;

/// Write `v` lines only (a polygon-free point cloud)
pub fn write_obj_vertices<W: Write>(w: &mut W, vertices: &[Vec3]) -> std::io::Result<()> {
    for v in vertices {
        writeln!(w, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
    }
    Ok(())
}

/// Write a quad mesh. OBJ indices are 1-based.
pub fn write_obj_mesh<W: Write>(
    w: &mut W,
    name: &str,
    mesh: &OctahedronMesh,
) -> std::io::Result<()> {
    writeln!(w, "o {}", name)?;
    write_obj_vertices(w, &mesh.vertices)?;
    for [a, b, c, d] in &mesh.faces {
        writeln!(w, "f {} {} {} {}", a + 1, b + 1, c + 1, d + 1)?;
    }
    Ok(())
}

/// Write a quad mesh to an OBJ file
pub fn write_obj_mesh_file(path: &Path, name: &str, mesh: &OctahedronMesh) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create output: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_obj_mesh(&mut writer, name, mesh)?;
    writer.flush()?;

    tracing::info!(
        "Wrote OBJ mesh: {} vertices, {} quads",
        mesh.vertices.len(),
        mesh.faces.len()
    );
    Ok(())
}
