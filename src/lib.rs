pub mod api;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod models;
pub mod observability;
pub mod preferences;
pub mod pricing;
pub mod state;
pub mod tracker;
