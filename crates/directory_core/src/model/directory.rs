//! Directory records: buildings, organizations and phones.
//!
//! # Responsibility
//! - Define write drafts and their validation rules.
//! - Define the organization read model returned by directory queries.
//!
//! # Invariants
//! - Building coordinates stay within WGS84 latitude/longitude ranges.
//! - Names and addresses are trimmed and non-blank before persistence.
//! - Phone numbers keep the caller's formatting but must match
//!   `PHONE_NUMBER_RE` and carry at least `MIN_PHONE_DIGITS` digits.

use crate::model::activity::ActivityId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type BuildingId = Uuid;
pub type OrganizationId = Uuid;
pub type PhoneId = Uuid;

const MIN_PHONE_DIGITS: usize = 5;

static PHONE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9\- ()]*[0-9]$").expect("valid phone regex"));

/// Validation failures for directory drafts and query inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryValidationError {
    BlankAddress,
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
    BlankOrganizationName,
    InvalidPhoneNumber(String),
    /// Minimum bound is greater than maximum bound.
    InvertedBoundingBox,
    BlankSearchQuery,
}

impl Display for DirectoryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankAddress => write!(f, "building address must not be blank"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude must be between -90 and 90, got {value}")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude must be between -180 and 180, got {value}")
            }
            Self::BlankOrganizationName => write!(f, "organization name must not be blank"),
            Self::InvalidPhoneNumber(value) => write!(f, "invalid phone number `{value}`"),
            Self::InvertedBoundingBox => {
                write!(f, "bounding box minimum must not exceed maximum")
            }
            Self::BlankSearchQuery => write!(f, "search query must not be blank"),
        }
    }
}

impl Error for DirectoryValidationError {}

/// Persisted building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Input for creating one building.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingDraft {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl BuildingDraft {
    pub fn new(address: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            address: address.into(),
            latitude,
            longitude,
        }
    }

    /// Returns a trimmed copy after checking address and coordinate ranges.
    pub fn validate(&self) -> Result<Self, DirectoryValidationError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(DirectoryValidationError::BlankAddress);
        }
        validate_latitude(self.latitude)?;
        validate_longitude(self.longitude)?;
        Ok(Self {
            address: address.to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Input for creating one organization with its links and phones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationDraft {
    pub name: String,
    pub building_id: BuildingId,
    pub activity_ids: Vec<ActivityId>,
    pub phones: Vec<String>,
}

impl OrganizationDraft {
    pub fn new(name: impl Into<String>, building_id: BuildingId) -> Self {
        Self {
            name: name.into(),
            building_id,
            activity_ids: Vec::new(),
            phones: Vec::new(),
        }
    }

    pub fn with_activities(mut self, activity_ids: impl IntoIterator<Item = ActivityId>) -> Self {
        self.activity_ids.extend(activity_ids);
        self
    }

    pub fn with_phones<S: Into<String>>(mut self, phones: impl IntoIterator<Item = S>) -> Self {
        self.phones.extend(phones.into_iter().map(Into::into));
        self
    }

    /// Returns a normalized copy: trimmed name and phones, deduplicated
    /// activity ids in first-seen order.
    pub fn validate(&self) -> Result<Self, DirectoryValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DirectoryValidationError::BlankOrganizationName);
        }

        let mut activity_ids = Vec::with_capacity(self.activity_ids.len());
        for id in &self.activity_ids {
            if !activity_ids.contains(id) {
                activity_ids.push(*id);
            }
        }

        let phones = self
            .phones
            .iter()
            .map(|number| normalize_phone_number(number))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            building_id: self.building_id,
            activity_ids,
            phones,
        })
    }
}

/// Persisted phone number of one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub id: PhoneId,
    pub organization_id: OrganizationId,
    pub number: String,
}

/// Flat activity reference embedded in organization views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRef {
    pub id: ActivityId,
    pub name: String,
    pub parent_id: Option<ActivityId>,
}

/// Organization read model with building, flat activities and phones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationView {
    pub id: OrganizationId,
    pub name: String,
    pub building: Building,
    /// Linked activities ordered by name, then id.
    pub activities: Vec<ActivityRef>,
    /// Phones ordered by number, then id.
    pub phones: Vec<Phone>,
}

/// Inclusive latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn validate(&self) -> Result<(), DirectoryValidationError> {
        validate_latitude(self.min_lat)?;
        validate_latitude(self.max_lat)?;
        validate_longitude(self.min_lon)?;
        validate_longitude(self.max_lon)?;
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(DirectoryValidationError::InvertedBoundingBox);
        }
        Ok(())
    }
}

/// Trims a phone number and checks its shape.
pub fn normalize_phone_number(value: &str) -> Result<String, DirectoryValidationError> {
    let trimmed = value.trim();
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    if digits < MIN_PHONE_DIGITS || !PHONE_NUMBER_RE.is_match(trimmed) {
        return Err(DirectoryValidationError::InvalidPhoneNumber(
            trimmed.to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_latitude(value: f64) -> Result<(), DirectoryValidationError> {
    if !(-90.0..=90.0).contains(&value) {
        return Err(DirectoryValidationError::LatitudeOutOfRange(value));
    }
    Ok(())
}

fn validate_longitude(value: f64) -> Result<(), DirectoryValidationError> {
    if !(-180.0..=180.0).contains(&value) {
        return Err(DirectoryValidationError::LongitudeOutOfRange(value));
    }
    Ok(())
}
