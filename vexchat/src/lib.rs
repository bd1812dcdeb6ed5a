//! `VexChat`: terminal chat client with an integrated AI assistant.

pub mod app;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod seed;
pub mod store;
pub mod ui;
