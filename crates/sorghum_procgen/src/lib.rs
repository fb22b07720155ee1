pub mod curve;
pub mod descriptor;
pub mod tropism;
pub mod spline;
pub mod leaf_segment;
pub mod tessellate;
pub mod pinnacle;
pub mod plant;
pub mod seed;
pub mod obj;

pub use curve::ResponseCurve;
pub use descriptor::{
    Cascade, CurveParameter, GaussianSource, L1Parameters, LeafDescriptor, PinnacleDescriptor,
    ProceduralDescriptor, SeededGaussian, StemDescriptor, VariedParameter,
};
pub use tropism::apply_tropism;
pub use spline::{build_leaf, build_stem, OrganKind, OrganSpline, SplineNode, SplineSettings};
pub use leaf_segment::LeafSegment;
pub use tessellate::tessellate_organ;
pub use plant::{
    spawn_plant, LeafPart, LeafRecord, PinnaclePart, PlantEntities, PlantTag, SorghumPlant, StemPart,
};
pub use seed::PlantSeed;
pub use obj::write_obj;
