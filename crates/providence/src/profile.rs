//! Static profile records and the read-only store that serves them.
//!
//! The store is built once at startup and never mutated. Records keep their
//! insertion order, which is the order `all()` reports them in.

use std::collections::HashMap;
use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Risk label attached to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RiskLevel {
    /// Nothing to flag.
    Low,
    /// Worth watching.
    Medium,
    /// Flagged.
    High,
    /// Flagged for immediate attention.
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

impl TryFrom<String> for RiskLevel {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whether the person was seen on time today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Arrived on time.
    #[default]
    OnTime,
    /// Arrived late.
    Late,
    /// Not seen.
    Absent,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnTime => write!(f, "On Time"),
            Self::Late => write!(f, "Late"),
            Self::Absent => write!(f, "Absent"),
        }
    }
}

/// A named numeric attribute, e.g. attendance percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeScore {
    /// Attribute name, matched case-insensitively.
    pub name: String,
    /// Attribute value.
    pub value: f64,
}

impl AttributeScore {
    /// Create a new attribute score.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A single mock profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Department.
    pub department: String,
    /// Attribute scores in declaration order.
    #[serde(default)]
    pub scores: Vec<AttributeScore>,
    /// Risk label.
    pub risk: RiskLevel,
    /// Free-form last-seen marker such as `09:05 AM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    /// Presence status.
    #[serde(default)]
    pub status: PresenceStatus,
}

impl ProfileRecord {
    /// Create a record with no scores, no last-seen marker and on-time status.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        department: impl Into<String>,
        risk: RiskLevel,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department: department.into(),
            scores: Vec::new(),
            risk,
            last_seen: None,
            status: PresenceStatus::OnTime,
        }
    }

    /// Append an attribute score.
    #[must_use]
    pub fn with_score(mut self, name: impl Into<String>, value: f64) -> Self {
        self.scores.push(AttributeScore::new(name, value));
        self
    }

    /// Set the last-seen marker and presence status.
    #[must_use]
    pub fn with_presence(mut self, last_seen: impl Into<String>, status: PresenceStatus) -> Self {
        self.last_seen = Some(last_seen.into());
        self.status = status;
        self
    }

    /// Look up an attribute score by name.
    #[must_use]
    pub fn score(&self, name: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.value)
    }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: Vec<ProfileRecord>,
}

/// Immutable, insertion-ordered table of profile records.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileStore {
    records: Vec<ProfileRecord>,
    index: HashMap<String, usize>,
}

impl ProfileStore {
    /// Build a store from records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateProfile`] if two records share an id.
    pub fn new(records: Vec<ProfileRecord>) -> Result<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if index.insert(record.id.clone(), position).is_some() {
                return Err(Error::DuplicateProfile {
                    id: record.id.clone(),
                });
            }
        }
        Ok(Self { records, index })
    }

    /// Load records from a TOML file with a `[[profiles]]` array.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or contains duplicate ids.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("profile file not found: {}", path.display()),
            )));
        }
        let file: ProfileFile = Figment::from(Toml::file(path)).extract()?;
        Self::new(file.profiles)
    }

    /// The built-in demo roster.
    #[must_use]
    pub fn demo() -> Self {
        let records = vec![
            ProfileRecord::new("12412824", "Rohan Sonwane", "Instrumentation", RiskLevel::Low)
                .with_score("attendance", 85.0)
                .with_presence("09:05 AM", PresenceStatus::OnTime),
            ProfileRecord::new("102", "Vihaan Rao", "Mech", RiskLevel::High)
                .with_score("attendance", 42.0)
                .with_presence("Absent", PresenceStatus::Late),
            ProfileRecord::new("103", "Diya Sharma", "CSE", RiskLevel::Low)
                .with_score("attendance", 91.0)
                .with_presence("08:55 AM", PresenceStatus::OnTime),
            ProfileRecord::new("104", "Ananya Gupta", "ENTC", RiskLevel::Medium)
                .with_score("attendance", 75.0)
                .with_presence("09:00 AM", PresenceStatus::Late),
            ProfileRecord::new("105", "Rohan Verma", "Civil", RiskLevel::High)
                .with_score("attendance", 60.0)
                .with_presence("09:30 AM", PresenceStatus::Absent),
        ];

        // Ids above are distinct literals.
        let index = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id.clone(), position))
            .collect();
        Self { records, index }
    }

    /// Look up a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileNotFound`] if no record has this id.
    pub fn lookup(&self, id: &str) -> Result<&ProfileRecord> {
        self.index
            .get(id)
            .map(|&position| &self.records[position])
            .ok_or_else(|| Error::profile_not_found(id))
    }

    /// All records in insertion order.
    #[must_use]
    pub fn all(&self) -> &[ProfileRecord] {
        &self.records
    }

    /// Check whether a record with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
