//! Fake TTS Client - 不访问网络的 TTS 客户端
//!
//! 按文本长度生成正弦音 WAV，可为指定文本设置延迟或失败，
//! 用于本地演示和测试

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{SynthesisRequest, SynthesisResponse, TtsEnginePort, TtsError};
use crate::infrastructure::adapters::audio::{encode_wav, tone};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 默认合成延迟
    pub latency: Duration,
    /// 每个字符对应的音频时长（毫秒）
    pub ms_per_char: u64,
    /// 采样率
    pub sample_rate: u32,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(200),
            ms_per_char: 60,
            sample_rate: 16000,
        }
    }
}

/// Fake TTS Client
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(
            latency_ms = config.latency.as_millis() as u64,
            sample_rate = config.sample_rate,
            "FakeTtsClient initialized"
        );
        Self {
            config,
            delays: HashMap::new(),
            failures: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    /// 为指定文本设置合成延迟
    pub fn with_delay(mut self, text: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(text.into(), delay);
        self
    }

    /// 指定文本合成失败
    pub fn with_failure(mut self, text: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(text.into(), reason.into());
        self
    }

    /// 同时进行中的合成数峰值
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 已收到的合成文本（按调用顺序）
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

/// 离开作用域时减少进行中计数（包括被取消的情况）
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse, TtsError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.text.clone());
        }

        tracing::debug!(
            turn_id = %request.turn_id,
            ordinal = request.ordinal,
            text_len = request.text.len(),
            "FakeTtsClient: generating tone"
        );

        let delay = self
            .delays
            .get(&request.text)
            .copied()
            .unwrap_or(self.config.latency);
        tokio::time::sleep(delay).await;

        if let Some(reason) = self.failures.get(&request.text) {
            return Err(TtsError::ServiceError(reason.clone()));
        }

        let duration_ms = request.text.chars().count() as u64 * self.config.ms_per_char;
        let samples = tone(duration_ms, self.config.sample_rate, 220.0, 0.5);

        Ok(SynthesisResponse {
            audio_data: encode_wav(&samples, self.config.sample_rate),
            duration_ms: Some(duration_ms),
            sample_rate: Some(self.config.sample_rate),
        })
    }
}
