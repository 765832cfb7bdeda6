// src/handlers/mod.rs

pub mod exams;
pub mod progress;
pub mod review;
pub mod submission;
