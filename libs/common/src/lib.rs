//! Common library for the recipe application
//!
//! This crate provides shared functionality used across the recipe
//! services, including database connectivity, error handling and
//! logging setup.
//!
//! ```rust,no_run
//! use recipe_common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::default();
//!     let pool = init_pool(&config).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod telemetry;
