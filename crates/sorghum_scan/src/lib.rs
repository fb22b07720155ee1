//! Labelled point-cloud scanning and dataset export.

pub mod settings;
pub mod scanner;
pub mod ply;
pub mod csv;

pub use settings::PointCloudSampleSettings;
pub use scanner::{
    generate_scan_rays, label_samples, leaf_part_from_albedo, output_window,
    scan_point_cloud_labeled, HandleTables, LabeledPointCloud, OutputWindow, SurfaceLabel,
};
pub use ply::write_ply;
pub use csv::{read_leaf_csv, write_leaf_csv, LEAF_CSV_HEADER};
