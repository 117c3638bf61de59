pub mod common;
pub mod dataset;
pub mod feedback;
pub mod filter;
pub mod geometry;
pub mod ml_model;
pub mod training;
pub mod user;

pub use common::*;
pub use dataset::*;
pub use feedback::*;
pub use filter::*;
pub use geometry::*;
pub use ml_model::*;
pub use training::*;
pub use user::*;
