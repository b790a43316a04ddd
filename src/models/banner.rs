//! Banner model: the site-wide urgent message strip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Fields;
use crate::errors::AppError;

/// Well-known document id of the banner singleton.
pub const BANNER_ID: &str = "current";
pub const DEFAULT_FONT_SIZE: &str = "16px";
pub const DEFAULT_FONT_WEIGHT: &str = "500";

/// The banner as held in the local view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub font_size: Option<String>,
    #[serde(default)]
    pub font_weight: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: i64,
}

impl Banner {
    /// Font size with the default applied.
    pub fn font_size(&self) -> &str {
        non_empty_or(self.font_size.as_deref(), DEFAULT_FONT_SIZE)
    }

    /// Font weight with the default applied.
    pub fn font_weight(&self) -> &str {
        non_empty_or(self.font_weight.as_deref(), DEFAULT_FONT_WEIGHT)
    }
}

fn non_empty_or<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default,
    }
}

/// Editable banner form state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BannerDraft {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub font_size: Option<String>,
    #[serde(default)]
    pub font_weight: Option<String>,
}

impl Default for BannerDraft {
    fn default() -> Self {
        Self {
            message: String::new(),
            is_active: false,
            font_size: Some(DEFAULT_FONT_SIZE.to_string()),
            font_weight: Some(DEFAULT_FONT_WEIGHT.to_string()),
        }
    }
}

impl From<&Banner> for BannerDraft {
    fn from(banner: &Banner) -> Self {
        Self {
            message: banner.message.clone(),
            is_active: banner.is_active,
            font_size: Some(banner.font_size().to_string()),
            font_weight: Some(banner.font_weight().to_string()),
        }
    }
}

/// The validated field set written to the store for the banner.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BannerFields {
    pub message: String,
    pub is_active: bool,
    pub font_size: String,
    pub font_weight: String,
}

impl BannerFields {
    pub fn into_fields(self) -> Result<Fields, AppError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(AppError::Internal(
                "Banner fields did not serialize to an object".to_string(),
            )),
        }
    }
}

impl BannerDraft {
    pub fn validate(&self) -> Result<BannerFields, AppError> {
        if self.message.trim().is_empty() {
            return Err(AppError::Validation(
                "Please enter a banner message.".to_string(),
            ));
        }

        Ok(BannerFields {
            message: self.message.clone(),
            is_active: self.is_active,
            font_size: non_empty_or(self.font_size.as_deref(), DEFAULT_FONT_SIZE).to_string(),
            font_weight: non_empty_or(self.font_weight.as_deref(), DEFAULT_FONT_WEIGHT)
                .to_string(),
        })
    }
}
