use tts_core::ParamValue;

use crate::error::ApiError;

/// Maximum text length for TTS requests
const MAX_TEXT_LENGTH: usize = 5000;
/// Maximum number of synthesis parameters per request
const MAX_PARAMS: usize = 16;

/// Validate TTS request
pub fn validate_tts_request<'a>(
    text: &str,
    voice: Option<&str>,
    params: impl IntoIterator<Item = (&'a String, &'a ParamValue)>,
) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    if let Some(voice) = voice {
        if !is_valid_voice_id(voice) {
            return Err(ApiError::InvalidInput(format!(
                "Invalid voice id: {}. Use letters, digits, '_', '-' or '.'",
                voice
            )));
        }
    }

    let mut count = 0;
    for (name, value) in params {
        count += 1;
        if count > MAX_PARAMS {
            return Err(ApiError::InvalidInput(format!(
                "Too many parameters (max {})",
                MAX_PARAMS
            )));
        }
        if name.is_empty() {
            return Err(ApiError::InvalidInput("Parameter names cannot be empty".to_string()));
        }
        if let ParamValue::Float(x) = value {
            if !x.is_finite() {
                return Err(ApiError::InvalidInput(format!(
                    "Parameter '{}' must be a finite number",
                    name
                )));
            }
        }
    }

    Ok(())
}

fn is_valid_voice_id(voice: &str) -> bool {
    !voice.is_empty()
        && voice.len() <= 64
        && voice
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_params() -> HashMap<String, ParamValue> {
        HashMap::new()
    }

    #[test]
    fn test_validate_tts_request_valid() {
        assert!(validate_tts_request("Hello", Some("de_DE"), &no_params()).is_ok());
        assert!(validate_tts_request("Test", None, &no_params()).is_ok());
    }

    #[test]
    fn test_validate_tts_request_empty_text() {
        let result = validate_tts_request("  ", Some("de_DE"), &no_params());
        assert!(matches!(result, Err(ApiError::InvalidInput(msg)) if msg.contains("empty")));
    }

    #[test]
    fn test_validate_tts_request_too_long() {
        let long_text = "a".repeat(6000);
        let result = validate_tts_request(&long_text, Some("de_DE"), &no_params());
        assert!(matches!(result, Err(ApiError::InvalidInput(msg)) if msg.contains("too long")));
    }

    #[test]
    fn test_validate_tts_request_invalid_voice() {
        assert!(validate_tts_request("Hello", Some("bad voice!"), &no_params()).is_err());
        assert!(validate_tts_request("Hello", Some(""), &no_params()).is_err());
        assert!(validate_tts_request("Hello", Some("en_US-lessac.medium"), &no_params()).is_ok());
    }

    #[test]
    fn test_validate_tts_request_params() {
        let mut params = no_params();
        params.insert("speed".into(), ParamValue::Float(f64::NAN));
        assert!(validate_tts_request("Hello", None, &params).is_err());

        let too_many: HashMap<String, ParamValue> = (0..20)
            .map(|i| (format!("p{i}"), ParamValue::Int(i)))
            .collect();
        assert!(validate_tts_request("Hello", None, &too_many).is_err());
    }
}
