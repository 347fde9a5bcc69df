// src/lib.rs

//! Sitemon: site-change watchdog library.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
