// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// MKS WiFi bridge: core types, errors, and the metadata store contract
// shared across all crates.

pub mod config;
pub mod error;
pub mod metadata;
pub mod types;

pub use config::AppConfig;
pub use error::MksError;
pub use metadata::{InMemoryMetadataStore, MetadataEdit, MetadataStore};
pub use types::*;
