pub mod capability;
pub mod correlation;
pub mod db;
pub mod error;
pub mod heuristics;
pub mod models;
pub mod service;
pub mod timeline;
pub mod transcription;
