//! Gemini REST client for concept text and image generation.
//!
//! Two image paths are supported, chosen by `generate.image_provider`:
//!
//! - `gemini`: `models/{model}:generateContent`, image returned as a base64
//!   `inlineData` part.
//! - `imagen`: `models/{model}:predict`, image returned as
//!   `predictions[0].bytesBase64Encoded`.

use super::{ConceptProvider, GenerateError, ImageProvider};
use crate::config::ImageProviderKind;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const SERVICE: &str = "gemini";

/// Instruction sent to the text model for a given style.
pub fn concept_prompt(art_style: &str) -> String {
    format!(
        "You are an expert art director. Write a detailed, evocative art concept \
         in the style of \"{art_style}\". Cover visual details (colors, textures, \
         composition, lighting), mood, the techniques characteristic of {art_style}, \
         fitting subject matter, and technical specifics such as perspective and medium. \
         Use 150-250 words in a single flowing paragraph with no headers or commentary, \
         starting directly with the description."
    )
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

impl<'a> GenerateContentRequest<'a> {
    fn text(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: None,
        }
    }

    fn image(prompt: &'a str) -> Self {
        Self {
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            }),
            ..Self::text(prompt)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
}

fn parts(response: &GenerateContentResponse) -> impl Iterator<Item = &ResponsePart> {
    response
        .candidates
        .iter()
        .take(1)
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter())
}

/// Concatenated text parts of the first candidate.
pub fn response_text(response: &GenerateContentResponse) -> Result<String, GenerateError> {
    let text: String = parts(response)
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerateError::EmptyResponse("gemini text"));
    }
    Ok(text.to_string())
}

/// Decoded bytes of the first inline data part of the first candidate.
pub fn response_image(response: &GenerateContentResponse) -> Result<Vec<u8>, GenerateError> {
    let inline = parts(response)
        .find_map(|p| p.inline_data.as_ref())
        .ok_or(GenerateError::EmptyResponse("gemini image"))?;
    if let Some(mime) = &inline.mime_type {
        log::debug!("inline image data: {mime}");
    }
    Ok(STANDARD.decode(inline.data.as_bytes())?)
}

/// Decoded bytes of the first prediction.
pub fn prediction_image(response: &PredictResponse) -> Result<Vec<u8>, GenerateError> {
    let encoded = response
        .predictions
        .iter()
        .find_map(|p| p.bytes_base64_encoded.as_deref())
        .ok_or(GenerateError::EmptyResponse("imagen"))?;
    Ok(STANDARD.decode(encoded.as_bytes())?)
}

// ============================================================================
// Client
// ============================================================================

pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerateError> {
        Ok(Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
        })
    }

    fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> Result<T, GenerateError> {
        let url = format!("{}/models/{}:{}", self.base_url, model, method);
        log::debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GenerateError::Api {
                service: SERVICE,
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }
        Ok(resp.json()?)
    }

    pub fn generate_text(&self, model: &str, prompt: &str) -> Result<String, GenerateError> {
        let response: GenerateContentResponse =
            self.call(model, "generateContent", &GenerateContentRequest::text(prompt))?;
        response_text(&response)
    }

    pub fn generate_image(
        &self,
        model: &str,
        kind: ImageProviderKind,
        prompt: &str,
    ) -> Result<Vec<u8>, GenerateError> {
        match kind {
            ImageProviderKind::Gemini => {
                let response: GenerateContentResponse =
                    self.call(model, "generateContent", &GenerateContentRequest::image(prompt))?;
                response_image(&response)
            }
            ImageProviderKind::Imagen => {
                let request = PredictRequest {
                    instances: vec![PredictInstance { prompt }],
                    parameters: PredictParameters { sample_count: 1 },
                };
                let response: PredictResponse = self.call(model, "predict", &request)?;
                prediction_image(&response)
            }
        }
    }
}

/// Concept writer backed by a Gemini text model.
#[derive(Debug)]
pub struct GeminiConcepts<'a> {
    pub client: &'a GeminiClient,
    pub model: String,
}

impl ConceptProvider for GeminiConcepts<'_> {
    fn generate_concept(&self, art_style: &str) -> Result<String, GenerateError> {
        log::info!("generating art concept for {art_style} with {}", self.model);
        self.client
            .generate_text(&self.model, &concept_prompt(art_style))
    }
}

/// Image renderer backed by a Gemini or Imagen model.
#[derive(Debug)]
pub struct GeminiImages<'a> {
    pub client: &'a GeminiClient,
    pub model: String,
    pub kind: ImageProviderKind,
}

impl ImageProvider for GeminiImages<'_> {
    fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, GenerateError> {
        log::info!("generating image with {} ({:?})", self.model, self.kind);
        self.client.generate_image(&self.model, self.kind, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_request_shape() {
        let json = serde_json::to_value(GenerateContentRequest::text("hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn image_request_asks_for_image_modality() {
        let json = serde_json::to_value(GenerateContentRequest::image("hello")).unwrap();
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn predict_request_shape() {
        let request = PredictRequest {
            instances: vec![PredictInstance { prompt: "p" }],
            parameters: PredictParameters { sample_count: 1 },
        };
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            serde_json::json!({"instances": [{"prompt": "p"}], "parameters": {"sampleCount": 1}})
        );
    }

    #[test]
    fn text_from_response() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": " A misty "}, {"text": "harbor. "}], "role": "model"}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(&response).unwrap(), "A misty harbor.");
    }

    #[test]
    fn empty_text_response() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            response_text(&response),
            Err(GenerateError::EmptyResponse(_))
        ));
    }

    #[test]
    fn inline_image_decoded() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "Here you go"},
                {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_image(&response).unwrap(), b"hello");
    }

    #[test]
    fn inline_image_missing() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "no image"}]}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            response_image(&response),
            Err(GenerateError::EmptyResponse(_))
        ));
    }

    #[test]
    fn bad_base64_is_error() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {"data": "***"}}]}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            response_image(&response),
            Err(GenerateError::Base64(_))
        ));
    }

    #[test]
    fn prediction_decoded() {
        let response: PredictResponse = serde_json::from_str(
            r#"{"predictions": [{"bytesBase64Encoded": "aGVsbG8=", "mimeType": "image/png"}]}"#,
        )
        .unwrap();
        assert_eq!(prediction_image(&response).unwrap(), b"hello");
    }

    #[test]
    fn prediction_missing() {
        let response: PredictResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(
            prediction_image(&response),
            Err(GenerateError::EmptyResponse(_))
        ));
    }

    #[test]
    fn concept_prompt_names_style() {
        let prompt = concept_prompt("Art Deco");
        assert!(prompt.contains("\"Art Deco\""));
        assert!(prompt.contains("150-250 words"));
    }
}
