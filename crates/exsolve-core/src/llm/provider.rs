//! Vision service trait and request types.
//!
//! Defines the interface the generation client drives, plus the image and
//! prompt types shared by every implementation.

use crate::error::ApiError;
use async_trait::async_trait;
use base64::Engine;
use std::path::Path;

/// Fixed instruction template sent with every exercise image.
pub const BASE_PROMPT: &str = "Look at this exercise image from an English textbook and solve it completely.

IMPORTANT FORMATTING:
- Start your answer with the exercise name/title in BOLD (e.g., **Exercise A** or **Task 1** or whatever the exercise is called in the image)
- Format the exercise name as bold text at the very beginning of your response
- If you can see a page number in the image, include it in your answer (e.g., **Page 45, Exercise A** or **Exercise A (Page 45)**)

If this is asking for an essay, composition, or to write paragraphs:
- Write a complete, well-structured essay with introduction, body paragraphs, and conclusion
- Follow any length requirements specified
- Do NOT include numbers or bullet points
- Write in continuous prose
- Start with the bold exercise name (and page number if visible) first

If this is a regular exercise with questions:
- Start with the bold exercise name (and page number if visible) first
- Provide ALL numbered answers completely
- Answer EVERY question in the exercise
- Number each answer clearly (1., 2., 3., etc.)
- Do NOT stop after a few answers
- Output ONLY the final words. No explanations, no \"Answer:\" labels.

Please solve the exercise and provide your answer now, starting with the bold exercise name (and page number if you can see it in the image).";

/// Build the outbound prompt: the fixed template plus optional free text.
pub fn build_prompt(instructions: Option<&str>) -> String {
    match instructions.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => format!("{BASE_PROMPT}\n\nAdditional instructions:\n{extra}"),
        None => BASE_PROMPT.to_string(),
    }
}

/// Base64-encoded image ready to send to the service.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes and format string.
    ///
    /// The format is the image format identifier (e.g., "jpeg", "png", "webp").
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format.to_lowercase().as_str() {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            other => {
                tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Create an `ImageInput` using the file extension of `path` as format.
    pub fn from_path_bytes(bytes: &[u8], path: &Path) -> Self {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::from_bytes(bytes, format)
    }
}

/// A model advertised by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Fully qualified model id (e.g., "models/gemini-1.5-flash")
    pub name: String,
    /// Generation methods the model supports
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Whether this model can answer an image prompt.
    ///
    /// Requires `generateContent` support and a Gemini model from a
    /// vision-capable family (1.5+, 2.0+, flash or pro).
    pub fn is_vision_candidate(&self) -> bool {
        if !self
            .supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
        {
            return false;
        }
        let name = self.name.to_lowercase();
        name.contains("gemini")
            && ["1.5", "2.0", "flash", "pro"]
                .iter()
                .any(|family| name.contains(family))
    }
}

/// Remote vision-capable text generation service.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the client holds an `Arc<dyn VisionService>`).
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    /// List every model the credential can see.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError>;

    /// Run one image prompt against one model.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        image: &ImageInput,
    ) -> Result<String, ApiError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, methods: &[&str]) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_image_input_from_bytes_png() {
        let input = ImageInput::from_bytes(&[0x89, 0x50, 0x4E, 0x47], "png");
        assert_eq!(input.media_type, "image/png");
        assert!(!input.data.is_empty());
    }

    #[test]
    fn test_image_input_uses_path_extension() {
        let input = ImageInput::from_path_bytes(&[1, 2, 3], Path::new("page_45.JPG"));
        assert_eq!(input.media_type, "image/jpeg");
        assert_eq!(input.data, "AQID");
    }

    #[test]
    fn test_prompt_without_instructions_is_template() {
        assert_eq!(build_prompt(None), BASE_PROMPT);
        assert_eq!(build_prompt(Some("   ")), BASE_PROMPT);
    }

    #[test]
    fn test_prompt_appends_instructions() {
        let prompt = build_prompt(Some("Answer in British English."));
        assert!(prompt.starts_with(BASE_PROMPT));
        assert!(prompt.ends_with("\n\nAdditional instructions:\nAnswer in British English."));
    }

    #[test]
    fn test_vision_candidate_filter() {
        assert!(model("models/gemini-1.5-flash", &["generateContent"]).is_vision_candidate());
        assert!(model("models/gemini-2.0-pro-exp", &["generateContent"]).is_vision_candidate());
        assert!(!model("models/gemini-1.0-ultra", &["generateContent"]).is_vision_candidate());
        assert!(!model("models/text-bison-001", &["generateContent"]).is_vision_candidate());
        assert!(!model("models/gemini-1.5-flash", &["embedContent"]).is_vision_candidate());
    }

    #[test]
    fn test_resolve_env_var() {
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }
}
