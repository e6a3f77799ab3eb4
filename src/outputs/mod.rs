//! Output generation for fetched items.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 600519.json
//! └── 000001.json
//! ```
//!
//! One file per identifier, rewritten on every run for that identifier.

pub mod json;
