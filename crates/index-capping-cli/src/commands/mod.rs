pub mod capping;
pub mod regions;
