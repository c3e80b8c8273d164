//! Core types, config, errors, and itinerary parsing for Wayfarer.

pub mod config;
pub mod error;
pub mod itinerary;
pub mod transcript;
pub mod types;
