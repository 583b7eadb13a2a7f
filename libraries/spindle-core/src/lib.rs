//! Spindle Core
//!
//! Platform-agnostic domain types and collaborator traits shared by every
//! Spindle crate.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `PlaybackState`, `AudioBuffer`
//! - **Collaborators**: the `Catalog` trait plus the in-process `MemoryCatalog`
//! - **Error Handling**: `CatalogError` and its `Result` alias
//!
//! # Example
//!
//! ```rust
//! use spindle_core::{Catalog, MemoryCatalog, Step, Track};
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! let first = Track::new("Intro", PathBuf::from("/music/01.flac"))
//!     .with_duration(Duration::from_secs(150));
//! let second = Track::new("Theme", PathBuf::from("/music/02.flac"));
//!
//! let catalog = MemoryCatalog::with_tracks(vec![first.clone(), second.clone()]);
//! assert_eq!(catalog.next(&first, Step::Next), Some(second));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod types;

pub use catalog::{Catalog, MemoryCatalog, Step};
pub use error::{CatalogError, Result};
pub use types::{AudioBuffer, AudioFormat, PlaybackState, SampleRate, Track, TrackId};
