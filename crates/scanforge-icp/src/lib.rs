#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod odometry;
pub use odometry::*;

mod ops;

mod point_to_plane;
pub use point_to_plane::*;

mod point_to_point;
pub use point_to_point::*;
