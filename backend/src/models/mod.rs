pub mod common;
pub mod kpi;
pub mod leave;
pub mod user;
