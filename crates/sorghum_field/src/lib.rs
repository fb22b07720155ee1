pub mod noise_util;
pub mod ground;
pub mod field;

pub use noise_util::{fbm, FbmSettings};
pub use ground::{spawn_ground, FieldGround, GroundTag, SOIL_COLOR};
pub use field::{FieldInstance, PositionsField};
