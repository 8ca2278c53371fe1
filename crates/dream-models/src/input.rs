//! Parsing of the `theme ; scene ; scene` dream description.

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Example description shown to new users.
pub const SAMPLE_INPUT: &str =
    "What does the future look like? ; Flying cars in neon skies ; Robots gardening ; A city made of crystal";

/// A parsed dream description: one shared theme and the ordered scene details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreamInput {
    pub theme: String,
    pub details: Vec<String>,
}

/// Split `text` on `;`, trimming segments and dropping empty ones.
///
/// The first segment is the theme, every following segment is one scene.
pub fn parse_input(text: &str) -> Result<DreamInput, InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }

    let mut parts = text
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string);

    let theme = parts.next().ok_or(InputError::Empty)?;
    let details: Vec<String> = parts.collect();

    if details.is_empty() {
        return Err(InputError::MissingScenes);
    }

    Ok(DreamInput { theme, details })
}
