//! The trait catalog.
//!
//! A closed set of trait kinds. Every kind carries a stable short code, which is
//! also the name given to the attribute that carries the trait, and a category
//! that decides where in the template tree the kind may be attached.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Where a trait kind may be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitCategory {
    /// Attached under a measured attribute template.
    AttributeTrait,
    /// Attached under an event template root.
    EventTrait,
}

impl fmt::Display for TraitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeTrait => write!(f, "attribute trait"),
            Self::EventTrait => write!(f, "event trait"),
        }
    }
}

/// Nominal shape of the value a trait attribute holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// A single number stored on the attribute.
    StaticScalar,
    /// A link to an external live series.
    LinkedSeries,
    /// Text produced by the detection engine.
    SymbolicText,
}

/// A trait kind from the closed catalog.
///
/// # Examples
///
/// ```
/// use traitlens::TraitKind;
///
/// assert_eq!(TraitKind::UpperLimit.code(), "LimitHi");
/// assert_eq!(TraitKind::from_code("LimitLo"), Some(TraitKind::LowerLimit));
/// assert!(TraitKind::CauseTriggerExpression.is_event_trait());
/// ```
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    UpperUpperLimit,
    UpperLimit,
    TargetLimit,
    LowerLimit,
    LowerLowerLimit,
    Forecast,
    CauseTriggerExpression,
    CauseTriggerName,
}

/// Every kind attached under measured attributes.
pub const ALL_ATTRIBUTE_TRAITS: [TraitKind; 6] = [
    TraitKind::UpperUpperLimit,
    TraitKind::UpperLimit,
    TraitKind::TargetLimit,
    TraitKind::LowerLimit,
    TraitKind::LowerLowerLimit,
    TraitKind::Forecast,
];

/// Every kind attached under event templates.
pub const ALL_EVENT_TRAITS: [TraitKind; 2] =
    [TraitKind::CauseTriggerExpression, TraitKind::CauseTriggerName];

impl TraitKind {
    /// Stable short code; also the provisioned attribute name.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UpperUpperLimit => "LimitHiHi",
            Self::UpperLimit => "LimitHi",
            Self::TargetLimit => "LimitTarget",
            Self::LowerLimit => "LimitLo",
            Self::LowerLowerLimit => "LimitLoLo",
            Self::Forecast => "Forecast",
            Self::CauseTriggerExpression => "TriggerExpression",
            Self::CauseTriggerName => "TriggerName",
        }
    }

    /// Looks a kind up by its code. Matching is exact.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        ALL_ATTRIBUTE_TRAITS
            .iter()
            .chain(ALL_EVENT_TRAITS.iter())
            .copied()
            .find(|k| k.code() == code)
    }

    /// Category deciding where the kind may be attached.
    #[must_use]
    pub const fn category(self) -> TraitCategory {
        match self {
            Self::CauseTriggerExpression | Self::CauseTriggerName => TraitCategory::EventTrait,
            _ => TraitCategory::AttributeTrait,
        }
    }

    /// Returns true for kinds attached under event templates.
    #[must_use]
    pub const fn is_event_trait(self) -> bool {
        matches!(self.category(), TraitCategory::EventTrait)
    }

    /// Nominal value shape for this kind.
    #[must_use]
    pub const fn value_kind(self) -> ValueKind {
        match self {
            Self::Forecast => ValueKind::LinkedSeries,
            Self::CauseTriggerExpression | Self::CauseTriggerName => ValueKind::SymbolicText,
            _ => ValueKind::StaticScalar,
        }
    }
}

impl FromStr for TraitKind {
    type Err = ValidationError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::from_code(code).ok_or_else(|| ValidationError::UnknownTraitCode {
            code: code.to_string(),
        })
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
