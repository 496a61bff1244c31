//! Recipe API service
//!
//! A REST API for user accounts, recipes and the tags and ingredients that
//! label them, with image uploads for recipes. Every resource except account
//! creation and token issuance is scoped to the user behind the bearer token.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod validation;

pub use routes::create_router;
pub use state::AppState;
