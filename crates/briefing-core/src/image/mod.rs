//! Dual-mode hero-image generation client.
//!
//! `native` mode speaks a typed models-API shape with inline binary parts;
//! `proxy` mode speaks a chat-completions shape with base64 `data:` URLs,
//! mirroring the two LLM transport modes in [`crate::llm`].

use crate::error::{HttpError, ImageError};
use crate::http::{HostPolicy, HttpPool};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Output aspect ratio for a generated hero image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Landscape,
    Widescreen,
}

impl AspectRatio {
    fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Widescreen => "16:9",
        }
    }
}

/// Output pixel size for a generated hero image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Small,
    Medium,
    Large,
}

impl ImageSize {
    fn as_str(self) -> &'static str {
        match self {
            ImageSize::Small => "512x512",
            ImageSize::Medium => "1024x1024",
            ImageSize::Large => "1536x1536",
        }
    }
}

/// Trait abstracting the image-generation provider.
#[async_trait::async_trait]
pub trait ImageClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        reference_image: Option<&[u8]>,
        aspect_ratio: AspectRatio,
        size: ImageSize,
    ) -> Result<Vec<u8>, ImageError>;
}

/// Typed models-API style client, returning inline binary data.
pub struct NativeImageClient {
    http: Arc<HttpPool>,
    base_url: String,
    api_key: String,
    model: String,
}

impl NativeImageClient {
    pub fn new(http: Arc<HttpPool>, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url: "https://api.anthropic.com".to_string(),
            api_key,
            model,
        }
    }

    pub fn with_base_url(http: Arc<HttpPool>, api_key: String, model: String, base_url: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl ImageClient for NativeImageClient {
    async fn generate(
        &self,
        prompt: &str,
        reference_image: Option<&[u8]>,
        aspect_ratio: AspectRatio,
        size: ImageSize,
    ) -> Result<Vec<u8>, ImageError> {
        let request = NativeImageRequest {
            model: &self.model,
            prompt,
            image_config: NativeImageConfig {
                aspect_ratio: aspect_ratio.as_str(),
                size: size.as_str(),
            },
            reference_image: reference_image.map(|bytes| InlineImage {
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
                mime_type: "image/png",
            }),
        };

        let url = format!("{}/v1/images/generations", self.base_url);
        let host = reqwest::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.base_url.clone());

        let response = self
            .http
            .execute(&host, HostPolicy::default(), || {
                self.http
                    .client()
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .json(&request)
            })
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ImageError::Api { status, message });
        }

        let body: NativeImageResponse = response
            .json()
            .await
            .map_err(|_| ImageError::MissingImageData)?;

        let inline = body
            .content
            .into_iter()
            .find_map(|block| block.inline_data)
            .ok_or(ImageError::MissingImageData)?;

        let bytes = base64::engine::general_purpose::STANDARD.decode(inline.data)?;
        Ok(bytes)
    }
}

/// Chat-completions-shaped client, returning a base64 `data:` URL that must
/// be stripped of its prefix before decoding.
pub struct ProxyImageClient {
    http: Arc<HttpPool>,
    base_url: String,
    api_key: String,
    model: String,
}

impl ProxyImageClient {
    pub fn new(http: Arc<HttpPool>, api_key: String, model: String, base_url: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl ImageClient for ProxyImageClient {
    async fn generate(
        &self,
        prompt: &str,
        reference_image: Option<&[u8]>,
        _aspect_ratio: AspectRatio,
        _size: ImageSize,
    ) -> Result<Vec<u8>, ImageError> {
        let mut content = vec![ChatContentPart::Text { text: prompt.to_string() }];
        if let Some(bytes) = reference_image {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            content.push(ChatContentPart::ImageUrl {
                image_url: ChatImageUrl {
                    url: format!("data:image/png;base64,{encoded}"),
                },
            });
        }

        let request = ChatImageRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            modalities: vec!["image".to_string(), "text".to_string()],
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let host = reqwest::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.base_url.clone());

        let response = self
            .http
            .execute(&host, HostPolicy::default(), || {
                self.http.client().post(&url).bearer_auth(&self.api_key).json(&request)
            })
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ImageError::Api { status, message });
        }

        let body: ChatImageResponse = response
            .json()
            .await
            .map_err(|_| ImageError::MissingImageData)?;

        let data_url = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.images)
            .and_then(|mut images| if images.is_empty() { None } else { Some(images.remove(0)) })
            .map(|img| img.image_url.url)
            .ok_or(ImageError::MissingImageData)?;

        let base64_part = data_url
            .split_once(",")
            .map(|(_, rest)| rest)
            .unwrap_or(&data_url);
        let bytes = base64::engine::general_purpose::STANDARD.decode(base64_part)?;
        Ok(bytes)
    }
}

fn map_http_error(err: HttpError) -> ImageError {
    ImageError::Api {
        status: 0,
        message: err.to_string(),
    }
}

#[derive(Serialize)]
struct NativeImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    image_config: NativeImageConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_image: Option<InlineImage>,
}

#[derive(Serialize)]
struct NativeImageConfig {
    aspect_ratio: &'static str,
    size: &'static str,
}

#[derive(Serialize, Deserialize)]
struct InlineImage {
    data: String,
    mime_type: &'static str,
}

#[derive(Deserialize)]
struct NativeImageResponse {
    #[serde(default)]
    content: Vec<NativeContentBlock>,
}

#[derive(Deserialize)]
struct NativeContentBlock {
    #[serde(default, rename = "inlineData")]
    inline_data: Option<NativeInlineData>,
}

#[derive(Deserialize)]
struct NativeInlineData {
    data: String,
}

#[derive(Serialize)]
struct ChatImageRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    modalities: Vec<String>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Serialize)]
struct ChatImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatImageResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    images: Option<Vec<ChatResponseImage>>,
}

#[derive(Deserialize)]
struct ChatResponseImage {
    image_url: ChatImageUrl2,
}

#[derive(Deserialize)]
struct ChatImageUrl2 {
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn native_extracts_inline_binary_part() {
        let server = MockServer::start().await;
        let png_bytes = b"not-really-a-png";
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes);
        let body = serde_json::json!({
            "content": [{"inlineData": {"data": encoded}}]
        });

        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let http = Arc::new(HttpPool::new(8));
        let client = NativeImageClient::with_base_url(
            http,
            "key".into(),
            "model".into(),
            server.uri(),
        );

        let bytes = client
            .generate("a hero image", None, AspectRatio::Widescreen, ImageSize::Large)
            .await
            .expect("generate");
        assert_eq!(bytes, png_bytes);
    }

    #[tokio::test]
    async fn proxy_extracts_data_url_from_chat_completion_shape() {
        let server = MockServer::start().await;
        let png_bytes = b"proxy-image-bytes";
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes);
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "images": [{"image_url": {"url": format!("data:image/png;base64,{encoded}")}}]
                }
            }]
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let http = Arc::new(HttpPool::new(8));
        let client = ProxyImageClient::new(http, "key".into(), "model".into(), server.uri());

        let bytes = client
            .generate("a hero image", None, AspectRatio::Square, ImageSize::Medium)
            .await
            .expect("generate");
        assert_eq!(bytes, png_bytes);
    }

    #[tokio::test]
    async fn native_missing_content_maps_to_missing_image_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": []})))
            .mount(&server)
            .await;

        let http = Arc::new(HttpPool::new(8));
        let client = NativeImageClient::with_base_url(http, "key".into(), "model".into(), server.uri());

        let err = client
            .generate("prompt", None, AspectRatio::Square, ImageSize::Small)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::MissingImageData));
    }

    #[tokio::test]
    async fn api_error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let http = Arc::new(HttpPool::new(8));
        let client = NativeImageClient::with_base_url(http, "key".into(), "model".into(), server.uri());

        let err = client
            .generate("prompt", None, AspectRatio::Square, ImageSize::Small)
            .await
            .unwrap_err();
        match err {
            ImageError::Api { status, .. } => assert_eq!(status, 400),
            other => panic!("expected Api, got: {other}"),
        }
    }
}
