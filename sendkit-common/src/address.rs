//! Address parsing and validation.
//!
//! `EmailJob::to`/`from` are required to parse as `local@domain` (spec
//! invariant i). We lean on `mailparse` for the actual grammar rather than
//! hand-rolling an RFC 5322 parser.

use std::fmt::{self, Display};

use mailparse::{addrparse, MailAddr};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::error::JobValidationError;

/// A validated email address, retaining both the original string and the
/// parsed domain so the limiter never has to re-parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    raw: String,
    domain: Domain,
}

impl Address {
    /// Parse and validate `s` as a single `local@domain` address.
    pub fn parse(s: &str) -> Result<Self, JobValidationError> {
        let parsed = addrparse(s).map_err(|_| JobValidationError::InvalidAddress {
            address: s.to_string(),
        })?;

        let single = parsed
            .into_inner()
            .into_iter()
            .next()
            .ok_or_else(|| JobValidationError::InvalidAddress {
                address: s.to_string(),
            })?;

        let domain = match &single {
            MailAddr::Single(info) => info
                .addr
                .rsplit_once('@')
                .map(|(_, d)| d.to_string())
                .ok_or_else(|| JobValidationError::InvalidAddress {
                    address: s.to_string(),
                })?,
            MailAddr::Group(_) => {
                return Err(JobValidationError::InvalidAddress {
                    address: s.to_string(),
                })
            }
        };

        Ok(Self {
            raw: s.to_string(),
            domain: Domain::new(domain),
        })
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_address() {
        let a = Address::parse("person@example.com").unwrap();
        assert_eq!(a.domain().as_str(), "example.com");
        assert_eq!(a.as_str(), "person@example.com");
    }

    #[test]
    fn rejects_address_without_at() {
        assert!(Address::parse("not-an-address").is_err());
    }

    #[test]
    fn rejects_empty_string() {
        assert!(Address::parse("").is_err());
    }
}
