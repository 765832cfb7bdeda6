// src/utils/mod.rs

pub mod deadline;
