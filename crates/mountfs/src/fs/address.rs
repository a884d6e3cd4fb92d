//! Address parsing and normalization.
//!
//! Addresses are URI-shaped strings such as `file:///a/b/c`. A store accepts
//! only addresses under its base prefix. Parsing happens once at the store
//! boundary; after that stores work on the segment list and only format back
//! to a string for error messages and flat-store keys.
//!
//! Normalization rules:
//! - bases always end with `/`
//! - lookup targets have their trailing `/` stripped, so `file:///a/` and
//!   `file:///a` name the same entry
//! - empty segments (`//`) are skipped

use std::fmt;

use crate::error::{Error, Result};

/// Default base accepted by every store.
pub const DEFAULT_BASE: &str = "file:///";

/// Append a trailing `/` unless one is already present.
pub fn ensure_trailing_slash(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// A parsed address: the store base plus the segments below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    base: String,
    segments: Vec<String>,
}

impl Address {
    /// Parse `address` relative to `base`.
    ///
    /// `base` must already be normalized with [`ensure_trailing_slash`].
    /// Fails with `EACCES` if the address is not under the base.
    pub fn parse(address: &str, base: &str) -> Result<Self> {
        let rest = match address.strip_prefix(base) {
            Some(rest) => rest,
            // The base itself written without its trailing slash
            None if format!("{address}/") == base => "",
            None => return Err(Error::AccessDenied(address.to_string())),
        };

        let segments = rest
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            base: base.to_string(),
            segments,
        })
    }

    /// The store base this address was parsed against.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path segments below the base.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True for the base itself.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Segments leading to the parent directory, plus the final name.
    ///
    /// Returns `None` for the root.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.segments
            .split_last()
            .map(|(name, parents)| (parents, name.as_str()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        f.write_str(&self.segments.join("/"))
    }
}
