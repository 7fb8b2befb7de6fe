//! HTTP TTS Client - 调用 OpenAI 兼容的 TTS HTTP 服务
//!
//! 实现 TtsEnginePort trait
//!
//! 外部 TTS API:
//! POST {base_url}/audio/speech
//! Request: {"model": "tts-1", "input": "...", "voice": "alloy", "response_format": "wav", "speed": 1.0}
//! Response: 音频二进制

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{SynthesisRequest, SynthesisResponse, TtsEnginePort, TtsError};

/// TTS 请求体 (JSON)
#[derive(Debug, Serialize)]
struct SpeechHttpRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 服务基础 URL
    pub base_url: String,
    /// API Key，为空时不发送 Authorization
    pub api_key: String,
    pub model: String,
    pub voice: String,
    /// 音频格式；口型分析需要 wav
    pub response_format: String,
    pub speed: f32,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            response_format: "wav".to_string(),
            speed: 1.0,
            timeout_secs: 30,
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP TTS 客户端
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 获取合成 URL
    fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'))
    }

    /// 获取健康检查 URL
    fn models_url(&self) -> String {
        format!("{}/models", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.config.api_key)
        }
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse, TtsError> {
        let body = SpeechHttpRequest {
            model: &self.config.model,
            input: &request.text,
            voice: &self.config.voice,
            response_format: &self.config.response_format,
            speed: self.config.speed,
        };

        tracing::debug!(
            url = %self.speech_url(),
            turn_id = %request.turn_id,
            ordinal = request.ordinal,
            text_len = request.text.len(),
            voice = %self.config.voice,
            "Sending TTS speech request"
        );

        let response = self
            .authorize(self.client.post(self.speech_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout
                } else if e.is_connect() {
                    TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
                } else {
                    TtsError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?
            .to_vec();

        if audio_data.is_empty() {
            return Err(TtsError::InvalidResponse("Empty audio body".to_string()));
        }

        tracing::info!(
            turn_id = %request.turn_id,
            ordinal = request.ordinal,
            audio_size = audio_data.len(),
            "TTS synthesis completed"
        );

        Ok(SynthesisResponse {
            audio_data,
            duration_ms: None,
            sample_rate: None,
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .authorize(self.client.get(self.models_url()))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpTtsClientConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "tts-1");
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_config_builder() {
        let config = HttpTtsClientConfig::new("http://localhost:8880/v1/")
            .with_timeout(60);
        assert_eq!(config.timeout_secs, 60);

        let client = HttpTtsClient::new(config).unwrap();
        assert_eq!(client.speech_url(), "http://localhost:8880/v1/audio/speech");
    }

    #[test]
    fn test_request_body() {
        let body = SpeechHttpRequest {
            model: "tts-1",
            input: "Hello.",
            voice: "alloy",
            response_format: "wav",
            speed: 1.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"], "Hello.");
        assert_eq!(json["response_format"], "wav");
    }
}
