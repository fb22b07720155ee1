pub mod error;
pub mod bounds;
pub mod mesh;
pub mod scene;
pub mod raytrace;
pub mod cpu_tracer;

pub use error::{Error, Result};
pub use bounds::Aabb;
pub use mesh::{Mesh, MeshVertex};
pub use scene::{Entity, MeshRenderer, Scene, SceneGraph, Transform};
pub use raytrace::{
    IlluminationSettings, LightProbe, MeshInstance, PointCloudSample, RayTraceOracle, SurfaceHandle,
};
pub use cpu_tracer::CpuRayTracer;
