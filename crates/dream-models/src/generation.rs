//! Video generation settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output resolution requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[default]
    #[serde(rename = "1080p")]
    FullHd1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Hd720 => "720p",
            Resolution::FullHd1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = GenerationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "720p" => Ok(Resolution::Hd720),
            "1080p" => Ok(Resolution::FullHd1080),
            other => Err(GenerationParseError::UnknownResolution(other.to_string())),
        }
    }
}

/// Aspect ratio specification, serialized as `"W:H"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Widescreen landscape (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Vertical portrait (9:16)
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Create a new aspect ratio.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = GenerationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(':')
            .ok_or_else(|| GenerationParseError::InvalidAspectFormat(s.to_string()))?;

        let width = width
            .trim()
            .parse()
            .map_err(|_| GenerationParseError::InvalidNumber(width.to_string()))?;
        let height = height
            .trim()
            .parse()
            .map_err(|_| GenerationParseError::InvalidNumber(height.to_string()))?;

        if width == 0 || height == 0 {
            return Err(GenerationParseError::ZeroValue);
        }

        Ok(AspectRatio { width, height })
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = GenerationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::LANDSCAPE
    }
}

#[derive(Debug, Error)]
pub enum GenerationParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidAspectFormat(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio values must be non-zero")]
    ZeroValue,
    #[error("Unknown resolution: {0}")]
    UnknownResolution(String),
}

/// Output settings for one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
}

impl GenerationConfig {
    /// 1080p widescreen, the setting every scene in a batch is rendered with.
    pub const SCENE_DEFAULT: GenerationConfig = GenerationConfig {
        resolution: Resolution::FullHd1080,
        aspect_ratio: AspectRatio::LANDSCAPE,
    };
}
