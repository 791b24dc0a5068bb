pub mod catchers;
pub mod config;
pub mod error;
pub mod polls;
pub mod queries;
pub mod rate_limiter;
pub mod routes;
pub mod store;
pub mod table;
pub mod utils;
pub use shared::{models::*, error::*, user_info::*, validation::*};

#[cfg(test)]
mod tests;
