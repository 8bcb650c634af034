//! Chapter 7 Calculator backend client.
//!
//! Registers a site with the calculator backend, fetches the calculator
//! settings for that site (falling back to a built-in document) and forwards
//! completed calculations.
//!
//! # Modules
//!
//! - `backend`: Shared HTTP transport and response envelope decoding.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers for the host surface.
//! - `identity`: Persisted site identity and the registration lock.
//! - `lifecycle`: Lifecycle events dispatched by the host.
//! - `models`: Identity, settings and submission models.
//! - `option_store`: Key-value option storage.
//! - `registration`: Site registration client.
//! - `sanitize`: Widget form sanitation.
//! - `settings`: Calculator settings client.
//! - `submission`: Calculation submission client.

pub mod backend;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod option_store;
pub mod registration;
pub mod sanitize;
pub mod settings;
pub mod submission;
