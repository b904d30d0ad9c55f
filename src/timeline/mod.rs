pub mod builder;
pub mod duration;
pub mod model;
