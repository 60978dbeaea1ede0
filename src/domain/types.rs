//! Shared domain enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Requested rendition of a stored photo.
///
/// Every class except [`SizeClass::Original`] names a resized derivative stored next to the
/// original under `<photo_id>-<class>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Original,
    #[serde(alias = "thumb")]
    Small,
    Medium,
    Large,
}

impl SizeClass {
    /// Derivatives produced for every upload, smallest first.
    pub const DERIVATIVES: [SizeClass; 3] = [SizeClass::Small, SizeClass::Medium, SizeClass::Large];

    pub fn as_str(self) -> &'static str {
        match self {
            SizeClass::Original => "original",
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
        }
    }

    /// Bounding box (in pixels) a derivative is resized to fit inside.
    pub fn max_dimension(self) -> Option<u32> {
        match self {
            SizeClass::Original => None,
            SizeClass::Small => Some(400),
            SizeClass::Medium => Some(800),
            SizeClass::Large => Some(1600),
        }
    }

    /// Storage key of this rendition for the given photo.
    pub fn storage_key(self, photo_id: &str) -> String {
        match self {
            SizeClass::Original => photo_id.to_string(),
            other => format!("{photo_id}-{}", other.as_str()),
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeClass {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(SizeClass::Original),
            "small" | "thumb" => Ok(SizeClass::Small),
            "medium" => Ok(SizeClass::Medium),
            "large" => Ok(SizeClass::Large),
            _ => Err(DomainError::UnknownSizeClass(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_keys_are_suffixed() {
        assert_eq!(SizeClass::Original.storage_key("p1"), "p1");
        assert_eq!(SizeClass::Medium.storage_key("p1"), "p1-medium");
        assert_eq!(SizeClass::Large.storage_key("p1"), "p1-large");
    }

    #[test]
    fn thumb_is_accepted_as_small() {
        assert_eq!("thumb".parse::<SizeClass>(), Ok(SizeClass::Small));
        assert_eq!(" Medium ".parse::<SizeClass>(), Ok(SizeClass::Medium));
        assert_eq!(
            "huge".parse::<SizeClass>(),
            Err(DomainError::UnknownSizeClass("huge".to_string()))
        );
    }

    #[test]
    fn original_has_no_bounding_box() {
        assert_eq!(SizeClass::Original.max_dimension(), None);
        assert_eq!(SizeClass::Small.max_dimension(), Some(400));
    }
}
