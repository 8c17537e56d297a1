//! Monitoring configuration.
//!
//! Defaults reproduce the reference deployment. `from_env` overlays
//! `TRAITLENS_*` variables, reading a `.env` file first when one exists.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ValidationError;
use crate::storage::SortOrder;

const ENV_PREFIX: &str = "TRAITLENS_";

/// Settings shared by the evaluator, the population helpers and the attributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Cap on each list of the flat strategy.
    pub flat_page_size: usize,
    /// Cap on the measured attributes of the template strategy.
    pub template_page_size: usize,
    #[serde(with = "sort_order")]
    pub flat_sort: SortOrder,
    #[serde(with = "sort_order")]
    pub template_sort: SortOrder,
    /// Name of the measured attribute the template strategy evaluates.
    pub measured_attribute: String,
    /// Entity template holding the monitored population.
    pub asset_template: String,
    /// Event template whose events are explained.
    pub event_template: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            flat_page_size: 101,
            template_page_size: 200,
            flat_sort: SortOrder::Descending,
            template_sort: SortOrder::Ascending,
            measured_attribute: "Temperature".to_string(),
            asset_template: "Temperature_Simple".to_string(),
            event_template: "VeryHot".to_string(),
        }
    }
}

fn env_opt(key: &str) -> Option<(String, String)> {
    let full = format!("{ENV_PREFIX}{key}");
    env::var(&full)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| (full, v.trim().to_string()))
}

fn env_usize(key: &str, default: usize) -> Result<usize, ValidationError> {
    match env_opt(key) {
        None => Ok(default),
        Some((key, value)) => value
            .parse()
            .map_err(|_| ValidationError::InvalidEnv { key, value }),
    }
}

fn env_sort(key: &str, default: SortOrder) -> Result<SortOrder, ValidationError> {
    match env_opt(key) {
        None => Ok(default),
        Some((key, value)) => parse_sort(&value).ok_or(ValidationError::InvalidEnv { key, value }),
    }
}

fn env_string(key: &str, default: String) -> String {
    env_opt(key).map_or(default, |(_, v)| v)
}

fn parse_sort(raw: &str) -> Option<SortOrder> {
    match raw.to_ascii_lowercase().as_str() {
        "asc" | "ascending" => Some(SortOrder::Ascending),
        "desc" | "descending" => Some(SortOrder::Descending),
        _ => None,
    }
}

impl MonitorConfig {
    /// Builds the config from `TRAITLENS_*` variables over the defaults.
    ///
    /// A missing `.env` file is not an error.
    ///
    /// # Errors
    ///
    /// `InvalidEnv` for unparsable values, `InvalidPageSize` for a zero page size.
    pub fn from_env() -> Result<Self, ValidationError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            flat_page_size: env_usize("FLAT_PAGE_SIZE", defaults.flat_page_size)?,
            template_page_size: env_usize("TEMPLATE_PAGE_SIZE", defaults.template_page_size)?,
            flat_sort: env_sort("FLAT_SORT", defaults.flat_sort)?,
            template_sort: env_sort("TEMPLATE_SORT", defaults.template_sort)?,
            measured_attribute: env_string("MEASURED_ATTRIBUTE", defaults.measured_attribute),
            asset_template: env_string("ASSET_TEMPLATE", defaults.asset_template),
            event_template: env_string("EVENT_TEMPLATE", defaults.event_template),
        };
        config.validate()?;

        info!(
            flat_page_size = config.flat_page_size,
            template_page_size = config.template_page_size,
            asset_template = %config.asset_template,
            "monitor config loaded"
        );
        Ok(config)
    }

    /// Rejects page sizes of zero and blank names.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for value in [self.flat_page_size, self.template_page_size] {
            if value == 0 {
                return Err(ValidationError::InvalidPageSize { value });
            }
        }
        let names = [&self.measured_attribute, &self.asset_template, &self.event_template];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }

    #[must_use]
    pub fn with_flat_page_size(mut self, size: usize) -> Self {
        self.flat_page_size = size;
        self
    }

    #[must_use]
    pub fn with_template_page_size(mut self, size: usize) -> Self {
        self.template_page_size = size;
        self
    }

    #[must_use]
    pub fn with_asset_template(mut self, name: impl Into<String>) -> Self {
        self.asset_template = name.into();
        self
    }
}

mod sort_order {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::storage::SortOrder;

    pub fn serialize<S: Serializer>(sort: &SortOrder, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match sort {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SortOrder, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_sort(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown sort order '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = MonitorConfig::default();
        assert_eq!(c.flat_page_size, 101);
        assert_eq!(c.template_page_size, 200);
        assert_eq!(c.flat_sort, SortOrder::Descending);
        assert_eq!(c.template_sort, SortOrder::Ascending);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let c = MonitorConfig::default().with_template_page_size(0);
        assert!(matches!(
            c.validate(),
            Err(ValidationError::InvalidPageSize { value: 0 })
        ));
    }

    #[test]
    fn blank_names_are_rejected() {
        let c = MonitorConfig::default().with_asset_template("  ");
        assert!(matches!(c.validate(), Err(ValidationError::EmptyName)));
    }

    #[test]
    fn parse_sort_accepts_short_and_long_forms() {
        assert_eq!(parse_sort("ASC"), Some(SortOrder::Ascending));
        assert_eq!(parse_sort("descending"), Some(SortOrder::Descending));
        assert_eq!(parse_sort("random"), None);
    }

    #[test]
    fn serde_uses_short_sort_names() {
        let json = serde_json::to_value(MonitorConfig::default()).unwrap();
        assert_eq!(json["flat_sort"], "desc");
        let back: MonitorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, MonitorConfig::default());
    }
}
