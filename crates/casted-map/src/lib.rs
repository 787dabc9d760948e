mod error;
mod key;
mod map;
mod options;
mod transform;
mod value;

pub use crate::error::{CastError, CastResult, TransformError};
pub use crate::key::KeyNormalization;
pub use crate::map::CastedMap;
pub use crate::options::MapOptions;
pub use crate::transform::Transform;
pub use crate::value::{CastStatus, CastValue, CellId, MapId};
