#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which photo table an embedding belongs to.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoType {
    /// A contestant-uploaded photo (checked against `user_photos`).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "USER"))]
    User,
    /// A contest reference photo (checked against `contest_model_photos`).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "MODEL"))]
    Model,
}

impl PhotoType {
    pub const ALL: &'static [PhotoType] = &[Self::User, Self::Model];

    /// Returns the canonical uppercase representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Model => "MODEL",
        }
    }
}

impl fmt::Display for PhotoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid photo type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePhotoTypeError {
    invalid: String,
}

impl fmt::Display for ParsePhotoTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid photo type '{}'. Valid values: USER, MODEL",
            self.invalid
        )
    }
}

impl std::error::Error for ParsePhotoTypeError {}

impl FromStr for PhotoType {
    type Err = ParsePhotoTypeError;

    /// Case-insensitive: payloads may carry `user` or `Model`; the canonical
    /// form is always uppercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "MODEL" => Ok(Self::Model),
            _ => Err(ParsePhotoTypeError {
                invalid: s.to_string(),
            }),
        }
    }
}
