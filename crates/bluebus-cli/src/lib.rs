//! `ble-connect`: discover a device advertising a service UUID and connect to it

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
