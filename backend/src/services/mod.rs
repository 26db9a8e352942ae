//! Engines behind the HTTP handlers. Each takes its store as `&dyn` so tests can
//! drive them without a server.

pub mod admin;
pub mod kpi;
pub mod leave;
