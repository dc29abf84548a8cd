//! image-cate: classify a folder of images with a vision model, file them
//! into per-category directories of a GitHub repository, and serve random
//! image links per category from a published manifest.

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod retrieval;
pub mod store;
