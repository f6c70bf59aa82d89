//! Codehive collaboration server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod rooms;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod vcs;
pub mod ws;
