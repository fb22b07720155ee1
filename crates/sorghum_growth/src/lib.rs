//! Resource-driven plant growth.
//!
//! Plants are skeletons of internodes held in one arena. Each tick collects
//! resource per plant, shares it among the buds, grows every bud that has
//! enough, prunes anything that ends inside an obstacle and then refreshes
//! the per-internode statistics.

pub mod resource;
pub mod internode;
pub mod parameters;
pub mod obstacle;
pub mod strategy;
pub mod geometry;
pub mod simulation;

pub use resource::ResourceParcel;
pub use internode::{
    Bud, Candidate, CollisionProxy, Illumination, Internode, InternodeArena, InternodeGrowth,
    InternodeId, InternodeInfo, InternodeStatistics, PlantId, PlantType,
};
pub use parameters::TreeParameters;
pub use obstacle::CubeVolume;
pub use geometry::generate_plant_mesh;
pub use simulation::{GrowthSettings, GrowthSimulation, PlantRecord};
