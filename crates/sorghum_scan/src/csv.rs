use std::fs;
use std::io::Write;
use std::path::Path;

use glam::Vec3;
use sorghum_core::{Error, Result};
use sorghum_procgen::LeafRecord;

pub const LEAF_CSV_HEADER: &str = "leaf_index,sheath_pos_x,sheath_pos_y,sheath_pos_z,tip_pos_x,tip_pos_y,tip_pos_z,branching_angle,roll_angle";

/// One row per leaf, sorted by leaf index
pub fn write_leaf_csv(path: impl AsRef<Path>, records: &[LeafRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut out = Vec::new();
    write_leaf_csv_to(&mut out, records).map_err(|e| Error::io(path, e))?;
    fs::write(path, out).map_err(|e| Error::io(path, e))
}

pub fn write_leaf_csv_to<W: Write>(out: &mut W, records: &[LeafRecord]) -> std::io::Result<()> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.leaf_index);

    writeln!(out, "{}", LEAF_CSV_HEADER)?;
    for r in &sorted {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            r.leaf_index,
            r.sheath.x,
            r.sheath.y,
            r.sheath.z,
            r.tip.x,
            r.tip.y,
            r.tip.z,
            r.branching_angle,
            r.roll_angle
        )?;
    }
    Ok(())
}

pub fn read_leaf_csv(path: impl AsRef<Path>) -> Result<Vec<LeafRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_leaf_csv(&text)
}

pub fn parse_leaf_csv(text: &str) -> Result<Vec<LeafRecord>> {
    let mut lines = text.lines();
    match lines.next() {
        Some(header) if header.trim() == LEAF_CSV_HEADER => {}
        _ => return Err(Error::config("leaf csv header mismatch")),
    }

    let mut records = Vec::new();
    for (number, line) in lines.enumerate().filter(|(_, l)| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 9 {
            return Err(Error::config(format!(
                "leaf csv row {} has {} fields",
                number + 2,
                fields.len()
            )));
        }
        let bad = |field: &str| Error::config(format!("leaf csv row {}: bad value {:?}", number + 2, field));
        let mut values = [0.0f32; 8];
        for (value, field) in values.iter_mut().zip(&fields[1..]) {
            *value = field.parse().map_err(|_| bad(field))?;
        }
        records.push(LeafRecord {
            leaf_index: fields[0].parse().map_err(|_| bad(fields[0]))?,
            sheath: Vec3::new(values[0], values[1], values[2]),
            tip: Vec3::new(values[3], values[4], values[5]),
            branching_angle: values[6],
            roll_angle: values[7],
        });
    }
    records.sort_by_key(|r| r.leaf_index);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u32) -> LeafRecord {
        LeafRecord {
            leaf_index: index,
            sheath: Vec3::new(0.0, 0.1 * index as f32, 0.0),
            tip: Vec3::new(0.3333333, 0.7 + index as f32, -1.0e-7),
            branching_angle: 47.25,
            roll_angle: if index % 2 == 0 { 0.0 } else { 180.0 },
        }
    }

    #[test]
    fn test_round_trip_sorted() {
        let records = vec![record(2), record(0), record(1)];
        let mut out = Vec::new();
        write_leaf_csv_to(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(LEAF_CSV_HEADER));

        let parsed = parse_leaf_csv(&text).unwrap();
        assert_eq!(parsed, vec![record(0), record(1), record(2)]);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("sorghum_leaf_csv_{}.csv", std::process::id()));
        write_leaf_csv(&path, &[record(1), record(0)]).unwrap();
        let parsed = read_leaf_csv(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(parsed, vec![record(0), record(1)]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(parse_leaf_csv("a,b\n"), Err(Error::Configuration(_))));
        let text = format!("{}\n0,1,2\n", LEAF_CSV_HEADER);
        assert!(matches!(parse_leaf_csv(&text), Err(Error::Configuration(_))));
        let text = format!("{}\n0,1,2,3,4,5,x,7,8\n", LEAF_CSV_HEADER);
        assert!(matches!(parse_leaf_csv(&text), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_records() {
        let mut out = Vec::new();
        write_leaf_csv_to(&mut out, &[]).unwrap();
        assert!(parse_leaf_csv(&String::from_utf8(out).unwrap()).unwrap().is_empty());
    }
}
