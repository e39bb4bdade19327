//! Database queries

pub mod invoice;
pub mod job;
pub mod plan;
pub mod route;
pub mod subscription;
