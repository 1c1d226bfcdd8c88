//! Real Estate CRM API Library
//!
//! REST backend for a real-estate CRM: OAuth login exchanged for session
//! tokens, role-gated property and lead management, and interaction tracking
//! that feeds a lead scoring heuristic.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components (handlers, routes).
//! - `core`: Domain logic (scoring, validation, models, errors).
//! - `data`: Postgres storage per aggregate.
//! - `integrations`: OAuth identity providers.
//! - `obs`: Observability and logging.
//! - `auth`: Session tokens and role extractors.
//! - `config`: Configuration management.
//! - `db`: Connection pool and embedded migrations.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and the server binary
pub mod admin_handler;
pub mod agent_handler;
pub mod auth;
pub mod auth_handler;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod routes;
pub mod scoring;
pub mod validation;
