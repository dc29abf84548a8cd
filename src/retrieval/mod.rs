//! Category-indexed image URL lookup.
//!
//! - **manifest** — fetch + validate the category → URL-list document.
//! - **sampler** — distinct random picks from one category's list.
//! - **service** — `get_image_link` over the loaded manifest.
//! - **server** — JSON-RPC tool surface on stdio.

pub mod manifest;
pub mod sampler;
pub mod server;
pub mod service;

pub use manifest::{ImageManifest, ManifestError, ManifestSource};
pub use service::{RetrievalError, RetrievalRequest, RetrievalService};
