//! Cell and point identity primitives.

pub mod cell_type;
pub mod ownership;
pub mod point;

pub use cell_type::CellType;
pub use ownership::CoreMap;
pub use point::PointKey;
