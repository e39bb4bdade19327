//! Business logic services

pub mod billing;
pub mod calendar;
pub mod geo;
pub mod maps;
pub mod payments;
pub mod pricing;
pub mod proration;
pub mod route_optimizer;
