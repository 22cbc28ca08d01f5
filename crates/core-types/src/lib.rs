use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use uuid::Uuid;

mod states;

pub use states::state_abbreviation;

/// Well-known identity field names shared by workflow definitions and profiles.
pub mod fields {
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const EMAIL: &str = "email";
    pub const ZIP: &str = "zip";
    pub const PHONE: &str = "phone";
    pub const SSN: &str = "ssn";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const STATE_ABBREVIATION: &str = "state_abbreviation";

    /// Fields a run cannot start without.
    pub const REQUIRED: [&str; 4] = [FIRST_NAME, LAST_NAME, EMAIL, ZIP];
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("identifier `{0}` may only contain ASCII letters, digits, '-' and '_'")]
    InvalidChars(String),
}

fn validate_slug(raw: &str) -> Result<(), IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty);
    }
    if !raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(IdError::InvalidChars(raw.to_string()));
    }
    Ok(())
}

/// Stable slug identifying one opt-out target site.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Name of a persisted identity profile. Used as a file stem, so the
/// character set is restricted.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        validate_slug(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for one acquired browser session.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only bundle of personal fields used to fill forms.
///
/// Built once per run and shared behind an `Arc` by every concurrent workflow;
/// the only way to change it is [`IdentityBuilder`], which produces a new value.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IdentityData {
    values: BTreeMap<String, String>,
}

impl IdentityData {
    pub fn builder() -> IdentityBuilder {
        IdentityBuilder::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Required fields that are absent or blank.
    pub fn missing_required(&self) -> Vec<&'static str> {
        fields::REQUIRED
            .iter()
            .copied()
            .filter(|field| self.get(field).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.values
    }
}

impl FromIterator<(String, String)> for IdentityData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut builder = IdentityBuilder::default();
        for (key, value) in iter {
            builder = builder.set(key, value);
        }
        builder.build()
    }
}

/// Accumulates identity fields from several sources. Later `set` calls win;
/// `set_default` only fills gaps.
#[derive(Clone, Debug, Default)]
pub struct IdentityBuilder {
    values: BTreeMap<String, String>,
}

impl IdentityBuilder {
    pub fn set(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = value.trim();
        if !value.is_empty() {
            self.values.insert(field.into(), value.to_string());
        }
        self
    }

    pub fn set_opt(self, field: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.set(field, value),
            None => self,
        }
    }

    pub fn set_default(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            return self;
        }
        self.values.entry(field.into()).or_insert(value);
        self
    }

    /// Finalises the bundle, deriving `state_abbreviation` from `state` when
    /// it was not supplied explicitly.
    pub fn build(mut self) -> IdentityData {
        if !self.values.contains_key(fields::STATE_ABBREVIATION) {
            if let Some(abbr) = self
                .values
                .get(fields::STATE)
                .and_then(|state| state_abbreviation(state))
            {
                self.values
                    .insert(fields::STATE_ABBREVIATION.to_string(), abbr);
            }
        }
        IdentityData {
            values: self.values,
        }
    }
}
