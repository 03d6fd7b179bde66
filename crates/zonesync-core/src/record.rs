//! Canonical, provider-agnostic record model
//!
//! A [`Record`] is identified within a zone by its [`RecordKey`]
//! (`name`, `type`). Multi-value record sets are one `Record` with many
//! `values`, never several records sharing a key.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported DNS record types
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordType {
    A,
    AAAA,
    ALIAS,
    CAA,
    CNAME,
    DNAME,
    LOC,
    MX,
    NS,
    PTR,
    SPF,
    SRV,
    SSHFP,
    TLSA,
    TXT,
}

impl RecordType {
    /// Every supported type, in declaration order
    pub const ALL: [RecordType; 15] = [
        RecordType::A,
        RecordType::AAAA,
        RecordType::ALIAS,
        RecordType::CAA,
        RecordType::CNAME,
        RecordType::DNAME,
        RecordType::LOC,
        RecordType::MX,
        RecordType::NS,
        RecordType::PTR,
        RecordType::SPF,
        RecordType::SRV,
        RecordType::SSHFP,
        RecordType::TLSA,
        RecordType::TXT,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::ALIAS => "ALIAS",
            RecordType::CAA => "CAA",
            RecordType::CNAME => "CNAME",
            RecordType::DNAME => "DNAME",
            RecordType::LOC => "LOC",
            RecordType::MX => "MX",
            RecordType::NS => "NS",
            RecordType::PTR => "PTR",
            RecordType::SPF => "SPF",
            RecordType::SRV => "SRV",
            RecordType::SSHFP => "SSHFP",
            RecordType::TLSA => "TLSA",
            RecordType::TXT => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| Error::unsupported(s.trim()))
    }
}

impl TryFrom<String> for RecordType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

/// Identity of a record within a zone
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Canonical relative name (apex is the empty string)
    pub name: String,
    pub record_type: RecordType,
}

impl RecordKey {
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "@" } else { &self.name };
        write!(f, "{} {}", name, self.record_type)
    }
}

/// A DNS record set in canonical form
///
/// Equality ignores the order of `values` but not duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub ttl: u32,
    pub values: Vec<String>,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        ttl: u32,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.name.clone(), self.record_type)
    }

    /// Values sorted, for order-insensitive comparison
    pub fn sorted_values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self.values.iter().map(String::as_str).collect();
        values.sort_unstable();
        values
    }

    /// True when ttl and the multiset of values are equal
    pub fn same_content(&self, other: &Record) -> bool {
        self.ttl == other.ttl && self.sorted_values() == other.sorted_values()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.record_type == other.record_type
            && self.same_content(other)
    }
}

impl Eq for Record {}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.key(), self.ttl, self.values.join(", "))
    }
}

/// Fold a record name into its canonical relative form for `zone`.
///
/// `@`, the empty string and the zone's own FQDN all become the apex (`""`);
/// absolute names inside the zone lose the zone suffix; everything is
/// lower-cased.
pub fn canonical_name(name: &str, zone: &str) -> Result<String> {
    let name = name.trim().to_ascii_lowercase();
    let zone = zone.trim().trim_end_matches('.').to_ascii_lowercase();

    if name.is_empty() || name == "@" {
        return Ok(String::new());
    }

    let Some(absolute) = name.strip_suffix('.') else {
        return Ok(name);
    };

    if absolute == zone {
        return Ok(String::new());
    }

    absolute
        .strip_suffix(&format!(".{zone}"))
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_record(format!("{name} is outside zone {zone}")))
}
