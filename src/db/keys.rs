//! Recognized settings keys. The settings table itself is schemaless;
//! these constants are the only keys the rest of the crate reads.

pub const API_KEY: &str = "api_key";
pub const SELECTED_MODEL: &str = "selected_model";
pub const HIDE_FROM_CAPTURE: &str = "hide_from_capture";
pub const DEFAULT_LANGUAGE: &str = "default_language";
pub const CAPTURE_REGION: &str = "capture_region";
pub const DEFAULT_CERTIFICATION: &str = "default_certification";
