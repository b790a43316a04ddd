//! Alert model: a notice shown in the public "Alerts & Notices" list.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Fields;
use crate::errors::AppError;

pub const REQUIRED_FIELDS_MESSAGE: &str =
    "Please fill in all required fields: Title, Message, and Type.";

/// Alert classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Maintenance,
    Emergency,
    Information,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Maintenance => "maintenance",
            AlertType::Emergency => "emergency",
            AlertType::Information => "information",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "maintenance" => Some(AlertType::Maintenance),
            "emergency" => Some(AlertType::Emergency),
            "information" => Some(AlertType::Information),
            _ => None,
        }
    }

    /// Human-readable label for badges.
    pub fn label(&self) -> &'static str {
        match self {
            AlertType::Maintenance => "Maintenance",
            AlertType::Emergency => "Emergency",
            AlertType::Information => "Information",
        }
    }
}

/// An alert as held in the local view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, deserialize_with = "optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Store write counter used as the toggle precondition
    #[serde(default)]
    pub version: i64,
}

/// Editable alert form state. Everything is raw user input until validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// Empty means "not selected yet"
    #[serde(default, rename = "type")]
    pub alert_type: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Default for AlertDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            message: String::new(),
            alert_type: String::new(),
            is_active: true,
            start_date: None,
            end_date: None,
        }
    }
}

impl From<&Alert> for AlertDraft {
    fn from(alert: &Alert) -> Self {
        Self {
            title: alert.title.clone(),
            message: alert.message.clone(),
            alert_type: alert.alert_type.as_str().to_string(),
            is_active: alert.is_active,
            start_date: alert.start_date.map(|d| d.to_string()),
            end_date: alert.end_date.map(|d| d.to_string()),
        }
    }
}

/// The validated, closed field set written to the store for an alert.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertFields {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AlertFields {
    pub fn into_fields(self) -> Result<Fields, AppError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(AppError::Internal(
                "Alert fields did not serialize to an object".to_string(),
            )),
        }
    }
}

impl AlertDraft {
    /// Check required fields and dates, producing the record to store.
    pub fn validate(&self) -> Result<AlertFields, AppError> {
        if self.title.trim().is_empty()
            || self.message.trim().is_empty()
            || self.alert_type.trim().is_empty()
        {
            return Err(AppError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()));
        }

        let alert_type = AlertType::from_str(self.alert_type.trim()).ok_or_else(|| {
            AppError::Validation(format!("Unknown alert type '{}'", self.alert_type))
        })?;

        let start_date = parse_form_date(self.start_date.as_deref(), "Start date")?;
        let end_date = parse_form_date(self.end_date.as_deref(), "End date")?;

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(AppError::Validation(
                    "End date cannot be before start date".to_string(),
                ));
            }
        }

        Ok(AlertFields {
            title: self.title.clone(),
            message: self.message.clone(),
            alert_type,
            is_active: self.is_active,
            start_date,
            end_date,
        })
    }
}

fn parse_form_date(raw: Option<&str>, label: &str) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::Validation(format!("{} must be a calendar date (YYYY-MM-DD)", label))
            }),
    }
}

/// Accepts a date string, an empty string, or null.
fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
