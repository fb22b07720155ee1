use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use sorghum_core::{Error, Result};

use crate::scanner::LabeledPointCloud;

/// Integer label elements, in file order
const LABEL_ELEMENTS: [&str; 5] = ["leafIndex", "leafPartIndex", "isMainPlant", "plantIndex", "isGround"];

/// Write `cloud` as binary little-endian PLY
pub fn write_ply(path: impl AsRef<Path>, cloud: &LabeledPointCloud) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    write_ply_to(&mut out, cloud)
        .and_then(|_| out.flush())
        .map_err(|e| Error::io(path, e))?;
    log::info!("Wrote {} points to {}", cloud.len(), path.display());
    Ok(())
}

pub fn write_ply_to<W: Write>(out: &mut W, cloud: &LabeledPointCloud) -> std::io::Result<()> {
    let n = cloud.len();
    writeln!(out, "ply")?;
    writeln!(out, "format binary_little_endian 1.0")?;
    writeln!(out, "element vertex {}", n)?;
    for axis in ["x", "y", "z"] {
        writeln!(out, "property double {}", axis)?;
    }
    writeln!(out, "element color {}", n)?;
    for channel in ["red", "green", "blue"] {
        writeln!(out, "property float {}", channel)?;
    }
    for name in LABEL_ELEMENTS {
        writeln!(out, "element {} {}", name, n)?;
        writeln!(out, "property int value")?;
    }
    writeln!(out, "end_header")?;

    for point in &cloud.points {
        for value in point.to_array() {
            out.write_all(&value.to_le_bytes())?;
        }
    }
    for color in &cloud.colors {
        for value in color.to_array() {
            out.write_all(&value.to_le_bytes())?;
        }
    }
    for labels in [
        &cloud.leaf_index,
        &cloud.leaf_part_index,
        &cloud.is_main_plant,
        &cloud.plant_index,
        &cloud.is_ground,
    ] {
        for value in labels {
            out.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}
