// src/services/mod.rs

pub mod progress;
pub mod scoring;
pub mod session;
pub mod submission;
