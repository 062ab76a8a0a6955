pub mod database;
pub mod error_handling;

pub use database::*;
pub use error_handling::storage_boundary;
