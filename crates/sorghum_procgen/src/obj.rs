use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use sorghum_core::{Error, Mesh, Result};

/// Write `mesh` as a Wavefront OBJ. Vertex colors follow each position.
pub fn write_obj(path: impl AsRef<Path>, mesh: &Mesh, name: &str) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    write_obj_to(&mut out, mesh, name).map_err(|e| Error::io(path, e))?;
    out.flush().map_err(|e| Error::io(path, e))
}

pub fn write_obj_to<W: Write>(out: &mut W, mesh: &Mesh, name: &str) -> std::io::Result<()> {
    writeln!(out, "o {}", name)?;
    for v in &mesh.vertices {
        writeln!(
            out,
            "v {} {} {} {} {} {}",
            v.position[0], v.position[1], v.position[2], v.color[0], v.color[1], v.color[2]
        )?;
    }
    for v in &mesh.vertices {
        writeln!(out, "vn {} {} {}", v.normal[0], v.normal[1], v.normal[2])?;
    }
    for v in &mesh.vertices {
        writeln!(out, "vt {} {}", v.uv[0], v.uv[1])?;
    }
    for t in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (t[0] + 1, t[1] + 1, t[2] + 1);
        writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
    }
    Ok(())
}
