//! Generation request payload and validation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const VALID_MODELS: &[&str] = &["sora-2", "sora-turbo", "veo-3"];
const VALID_SECONDS: &[u32] = &[4, 8, 12];
const VALID_SIZES: &[&str] = &["1280x720", "1920x1080", "720x1280", "1080x1920"];

/// A video generation request as submitted by the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_duration")]
    pub duration_seconds: u32,
    #[serde(default = "default_size")]
    pub size: String,
    /// Base64-encoded reference image, or a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
}

fn default_model() -> String {
    "sora-2".into()
}

fn default_duration() -> u32 {
    4
}

fn default_size() -> String {
    "1280x720".into()
}

impl GenerationRequest {
    /// Reject malformed input before anything touches the network.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::MissingPrompt);
        }
        if prompt.len() < 3 || prompt.len() > 1000 {
            return Err(ValidationError::PromptLength);
        }
        if !VALID_MODELS.contains(&self.model.as_str()) {
            return Err(ValidationError::UnknownModel(VALID_MODELS.join(", ")));
        }
        if !VALID_SECONDS.contains(&self.duration_seconds) {
            return Err(ValidationError::InvalidDuration);
        }
        if !VALID_SIZES.contains(&self.size.as_str()) {
            return Err(ValidationError::InvalidSize(VALID_SIZES.join(", ")));
        }
        if let Some(image) = &self.reference_image {
            if image.is_empty() {
                return Err(ValidationError::InvalidReferenceImage);
            }
        }
        Ok(())
    }

    /// The wire body the provider expects. Seconds travel as a string,
    /// and a data-URL reference image is stripped to its base64 payload.
    pub fn to_wire(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "prompt": self.prompt,
            "model": self.model,
            "seconds": self.duration_seconds.to_string(),
            "size": self.size,
        });
        if let Some(image) = &self.reference_image {
            let base64_data = match image.strip_prefix("data:") {
                Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
                None => image.as_str(),
            };
            body["input_reference"] = serde_json::Value::String(base64_data.to_string());
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "a hummingbird in slow motion".into(),
            model: "sora-2".into(),
            duration_seconds: 4,
            size: "1280x720".into(),
            reference_image: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_short_and_long_prompts() {
        let mut req = request();
        req.prompt = "hi".into();
        assert_eq!(req.validate(), Err(ValidationError::PromptLength));

        req.prompt = "x".repeat(1001);
        assert_eq!(req.validate(), Err(ValidationError::PromptLength));
    }

    #[test]
    fn rejects_blank_prompt() {
        let mut req = request();
        req.prompt = "   ".into();
        assert_eq!(req.validate(), Err(ValidationError::MissingPrompt));
    }

    #[test]
    fn rejects_unknown_model_duration_and_size() {
        let mut req = request();
        req.model = "dall-e".into();
        assert!(matches!(
            req.validate(),
            Err(ValidationError::UnknownModel(_))
        ));

        let mut req = request();
        req.duration_seconds = 7;
        assert_eq!(req.validate(), Err(ValidationError::InvalidDuration));

        let mut req = request();
        req.size = "640x480".into();
        assert!(matches!(req.validate(), Err(ValidationError::InvalidSize(_))));
    }

    #[test]
    fn wire_body_uses_string_seconds() {
        let body = request().to_wire();
        assert_eq!(body["seconds"], "4");
        assert_eq!(body["model"], "sora-2");
        assert!(body.get("input_reference").is_none());
    }

    #[test]
    fn wire_body_strips_data_url_prefix() {
        let mut req = request();
        req.reference_image = Some("data:image/jpeg;base64,QUJD".into());
        assert_eq!(req.to_wire()["input_reference"], "QUJD");

        req.reference_image = Some("QUJD".into());
        assert_eq!(req.to_wire()["input_reference"], "QUJD");
    }
}
