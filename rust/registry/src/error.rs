// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for registry operations.

use std::fmt;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies which key of an entity an error refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// The opaque unique identity (guid).
    Guid(String),
    /// The human-readable display name.
    Name(String),
    /// The dense numeric id.
    NumericId(u32),
    /// A registry handle that no longer (or never did) resolve.
    Handle(String),
}

impl IdentityKey {
    pub(crate) fn handle(key: impl fmt::Debug) -> Self {
        IdentityKey::Handle(format!("{key:?}"))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Guid(g) => write!(f, "guid {g:?}"),
            IdentityKey::Name(n) => write!(f, "name {n:?}"),
            IdentityKey::NumericId(id) => write!(f, "numeric id {id}"),
            IdentityKey::Handle(h) => write!(f, "handle {h}"),
        }
    }
}

/// Errors that can occur during registry operations.
///
/// Every error is raised before any index is touched, so a failed call leaves
/// the registry exactly as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// An insert collided with a guid, name or numeric id already present.
    #[error("duplicate identity: {0} is already registered")]
    DuplicateIdentity(IdentityKey),

    /// An explicit lookup or removal matched nothing.
    #[error("entity not found: {0}")]
    NotFound(IdentityKey),

    /// A volume query was issued without any shape criterion.
    #[error("invalid volume query: {0}")]
    InvalidQuery(&'static str),

    /// A required name or id was missing, empty or zero.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// A tolerance, radius or extent was non-positive or not finite.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

/// Checks that `tolerance` is a usable distance threshold.
pub(crate) fn check_tolerance(tolerance: f64) -> Result<()> {
    if tolerance.is_finite() && tolerance > 0.0 {
        Ok(())
    } else {
        Err(Error::DegenerateInput(format!(
            "tolerance must be positive and finite, got {tolerance}"
        )))
    }
}
