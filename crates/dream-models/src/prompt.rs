//! Prompt templating.

/// Placeholder replaced by the batch theme.
pub const THEME_PLACEHOLDER: &str = "{QUESTION}";

/// Placeholder replaced by the scene detail.
pub const DETAIL_PLACEHOLDER: &str = "{ANSWER}";

/// Default template: a continuous forward dolly that starts and ends in a
/// neutral blur so consecutive clips can be looped back-to-back.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "(Cinematic visual style defined by: {QUESTION}): {ANSWER}.

CAMERA MOVEMENT: Continuous, slow-motion forward dolly (zoom in). The camera never stops moving forward.

START STATE: The video begins by emerging from a macro, extreme close-up of a neutral texture (mist/fog/blur) that matches the aesthetic of {QUESTION}.

MIDDLE STATE: As the camera moves forward, the scene reveals the representation of {ANSWER} in the center of the frame. The environment is immersive and fully detailed.

END STATE: The camera continues moving forward, eventually pushing extremely close into a texture within the scene until the screen is filled with a macro blur/mist, obscuring the details and returning to a neutral state.

AUDIO: Purely ambient and atmospheric soundscape. NO speech, NO dialogue, NO voices. Ethereal, abstract, deep textures that blend seamlessly.

TECHNICAL: 4k resolution, photorealistic, 10 seconds, temporal smoothing, consistent lighting.";

/// Render a prompt by substituting every theme and detail placeholder.
///
/// Placeholders missing from `template` are simply not substituted.
pub fn build_prompt(theme: &str, detail: &str, template: &str) -> String {
    template
        .replace(THEME_PLACEHOLDER, theme)
        .replace(DETAIL_PLACEHOLDER, detail)
}
