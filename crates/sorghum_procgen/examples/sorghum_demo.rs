use sorghum_procgen::{
    Cascade, ProceduralDescriptor, SeededGaussian, SorghumPlant, SplineSettings,
};

fn main() {
    println!("=== Sorghum Factory - Plant Generation Demo ===\n");

    let presets = vec![
        ("Default detail", SplineSettings::default()),
        ("Low detail", SplineSettings::low_detail()),
    ];

    for (name, settings) in presets {
        println!("--- {} ---", name);
        println!("Unit length: {:.3}m", settings.unit_length);
        println!("Ring segments: {}", settings.ring_segments);

        let mut descriptor = ProceduralDescriptor::default();
        descriptor.pinnacle.has_pinnacle = true;
        if let Err(e) = descriptor.ready(&mut SeededGaussian::new(12345)) {
            println!("Descriptor rejected: {}", e);
            continue;
        }
        assert_eq!(descriptor.cascade, Cascade::L1);

        let plant = SorghumPlant::build(&descriptor, &settings, 12345);
        let mesh = plant.combined_mesh();
        println!("Generated {} leaves", plant.leaves.len());
        println!("Stem nodes: {}", plant.stem.spline.nodes.len());
        println!("Mesh: {} vertices, {} triangles", mesh.vertices.len(), mesh.triangle_count());

        let descriptor_size = descriptor.to_json().map(|s| s.len()).unwrap_or(0);
        let mesh_size = mesh.vertices.len() * std::mem::size_of::<sorghum_core::MeshVertex>()
            + mesh.indices.len() * std::mem::size_of::<u32>();
        println!("Descriptor size: ~{} bytes", descriptor_size);
        println!("Generated mesh size: ~{:.2} KB", mesh_size as f32 / 1024.0);
        println!();
    }

    println!("=== Seed Variation Demo ===");
    for seed in [111, 222, 333, 444, 555] {
        let mut descriptor = ProceduralDescriptor::default();
        descriptor.l1.leaf_length = descriptor.l1.leaf_length.clone().with_variance(0.2);
        descriptor.l1.branching_angle = descriptor.l1.branching_angle.clone().with_variance(5.0);
        if descriptor.ready(&mut SeededGaussian::new(seed)).is_err() {
            continue;
        }
        let plant = SorghumPlant::build(&descriptor, &SplineSettings::low_detail(), seed);
        let longest = plant
            .records
            .iter()
            .map(|r| r.tip.distance(r.sheath))
            .fold(0.0f32, f32::max);
        println!("Seed {}: {} leaves, longest sheath-to-tip {:.2}m", seed, plant.records.len(), longest);
    }

    println!("\n=== Canopy Extent ===");
    let mut descriptor = ProceduralDescriptor::default();
    if descriptor.ready(&mut SeededGaussian::new(99999)).is_ok() {
        let plant = SorghumPlant::build(&descriptor, &SplineSettings::default(), 99999);
        if let Some(bounds) = plant.combined_mesh().bounds() {
            let size = bounds.size();
            println!("Plant height: {:.2}m", bounds.max.y - bounds.min.y);
            println!("Canopy width: {:.2}m x {:.2}m", size.x, size.z);
        }
    }
}
