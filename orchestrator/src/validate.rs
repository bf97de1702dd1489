//! Request validation (§4.G steps 2–3): bounds on image count, the closed
//! aspect-ratio set, and prompt length/sanitization.

use imagegen_core::{CoreError, MAX_OUTPUTS};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_PROMPT_LEN: usize = 5;
pub const MAX_PROMPT_LEN: usize = 2000;

static CONTROL_OR_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]|<[^>]*>").expect("static regex"));

pub fn validate_number_of_images(n: u32) -> Result<(), CoreError> {
    if n == 0 || n > MAX_OUTPUTS {
        return Err(CoreError::Validation(format!(
            "numberOfImages must be between 1 and {MAX_OUTPUTS}, got {n}"
        )));
    }
    Ok(())
}

/// Strips control characters and script/markup tags, then checks the
/// resulting length falls in `[MIN_PROMPT_LEN, MAX_PROMPT_LEN]`.
pub fn sanitize_and_validate_prompt(raw: &str) -> Result<String, CoreError> {
    let sanitized = CONTROL_OR_MARKUP.replace_all(raw, "").trim().to_string();
    let len = sanitized.chars().count();
    if !(MIN_PROMPT_LEN..=MAX_PROMPT_LEN).contains(&len) {
        return Err(CoreError::Validation(format!(
            "prompt length must be between {MIN_PROMPT_LEN} and {MAX_PROMPT_LEN} characters, got {len}"
        )));
    }
    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_over_max_images() {
        assert!(validate_number_of_images(0).is_err());
        assert!(validate_number_of_images(MAX_OUTPUTS + 1).is_err());
        assert!(validate_number_of_images(1).is_ok());
        assert!(validate_number_of_images(MAX_OUTPUTS).is_ok());
    }

    #[test]
    fn strips_script_tags_and_control_chars() {
        let raw = "a cat<script>alert(1)</script>\u{0007}wearing a hat";
        let cleaned = sanitize_and_validate_prompt(raw).unwrap();
        assert!(!cleaned.contains('<'));
        assert!(!cleaned.contains('\u{0007}'));
    }

    #[test]
    fn rejects_too_short_or_too_long_prompt() {
        assert!(sanitize_and_validate_prompt("hi").is_err());
        let long = "a".repeat(MAX_PROMPT_LEN + 1);
        assert!(sanitize_and_validate_prompt(&long).is_err());
    }
}
