pub mod common;
pub mod resource;

pub use common::common_routes;
pub use resource::{register, Blueprint, RouteMask};
