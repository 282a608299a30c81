//! Reading the file index embedded in the Silent Hill 2 executable, and pulling
//! files out of the merge files it describes.
//!
//! Decoding goes through [`IndexResolver::read`] with a [`VersionProfile`], either
//! one of [`KNOWN_VERSIONS`] (see [`fingerprint::detect_version`]) or one loaded
//! from TOML. Extraction lives in [`extract`].

#![allow(clippy::uninlined_format_args)]

pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod format;
pub mod profile;
pub mod resolver;

pub use error::IndexError;
pub use extract::{plan, ExtractionPlan, ExtractionSummary, Extractor};
pub use profile::{KnownVersion, TableGap, VersionProfile, KNOWN_VERSIONS};
pub use resolver::{IndexResolver, IndexStats};
