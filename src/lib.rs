//! Leadscope: local business lead capture and qualification.
//!
//! Pulls business listings from a maps search source, audits each lead's
//! website, extracts social profiles, optionally enriches contact data via
//! Hunter.io, computes a 0-100 qualification score with a tier, and upserts
//! the results into Airtable.
//!
//! # Modules
//!
//! - `airtable`: Airtable sink (upsert by natural key).
//! - `cache`: cross-run seen-lead cache.
//! - `config`: configuration management.
//! - `errors`: error handling types.
//! - `maps_scraper`: free direct maps fallback source.
//! - `models`: core data models.
//! - `pipeline`: run orchestration, checkpointing and reporting.
//! - `scoring`: lead scoring and tier classification (the core).
//! - `services`: external service clients (SerpAPI, Hunter.io).
//! - `social`: social profile extraction and the Instagram finder.
//! - `website`: website auditing and contact scavenging.

pub mod airtable;
pub mod cache;
pub mod config;
pub mod errors;
pub mod maps_scraper;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod services;
pub mod social;
pub mod website;
