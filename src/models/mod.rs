pub mod cve;
pub mod entity;
