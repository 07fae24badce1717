//! Sendtune — adaptive send-rate control core for bulk email campaigns.

pub mod alerts;
pub mod campaign;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod health;
pub mod metrics;
pub mod sendtime;
pub mod settings;
pub mod store;
pub mod throttle;
