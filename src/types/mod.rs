//! Type definitions

pub mod job;
pub mod messages;
pub mod route;
pub mod subscription;

pub use job::*;
pub use messages::*;
pub use route::*;
pub use subscription::*;

use serde::{Deserialize, Serialize};

/// Geographic coordinates (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}
