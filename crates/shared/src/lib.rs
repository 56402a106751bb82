//! Shared types, errors, and configuration for Budgetry.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - The spend policy toggle shared by configuration and the funds engine
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::AppError;
