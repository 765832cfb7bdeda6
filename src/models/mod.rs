// src/models/mod.rs

pub mod answer;
pub mod exam;
pub mod progress;
pub mod question;
pub mod session;
