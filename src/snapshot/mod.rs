//! Snapshot module - point-in-time records of installed package trees.
//!
//! - **Builder**: [`SnapshotBuilder`] walks a package directory and its
//!   nested dependency container
//! - **npm**: manifest reading, version-shape checks and source link
//!   normalization via [`NpmManifest`]
//! - **Digest**: SHA-256 file fingerprints via [`Sha256Digester`]
//! - **Codec**: JSON persistence via [`JsonCodec`]

pub mod builder;
pub mod codec;
pub mod digest;
pub mod npm;

pub use builder::SnapshotBuilder;
pub use codec::JsonCodec;
pub use digest::Sha256Digester;
pub use npm::{is_normalized_source_link, looks_like_version, normalize_source_link, NpmManifest};
