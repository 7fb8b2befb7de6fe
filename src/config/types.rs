//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

use crate::domain::emotion::{
    EmotionError, EmotionModel, DEFAULT_KEYWORDS, DEFAULT_NEUTRAL, DEFAULT_VOCABULARY,
};
use crate::domain::SpeechFilterOptions;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 流水线配置
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// TTS 引擎配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 流水线配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub tags: TagConfig,

    #[serde(default)]
    pub emotion: EmotionConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub speech_filter: SpeechFilterOptions,

    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

/// 分句方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMethod {
    /// 规则分句
    Punctuation,
    /// 语言感知分句（缩写、首字母等）
    #[default]
    Statistical,
}

/// 分句配置
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default)]
    pub method: SegmentMethod,

    /// statistical 方式使用的语言: en, zh, ja
    #[serde(default = "default_language")]
    pub language: String,

    /// 首句在第一个子句边界处提前切出
    #[serde(default = "default_faster_first_response")]
    pub faster_first_response: bool,

    /// 缓冲区字符上限，超过后强制切分
    #[serde(default = "default_max_buffer_chars")]
    pub max_buffer_chars: usize,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_faster_first_response() -> bool {
    true
}

fn default_max_buffer_chars() -> usize {
    500
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            method: SegmentMethod::default(),
            language: default_language(),
            faster_first_response: default_faster_first_response(),
            max_buffer_chars: default_max_buffer_chars(),
        }
    }
}

/// 非朗读标签配置
#[derive(Debug, Clone, Deserialize)]
pub struct TagConfig {
    /// 识别的标签名，如 think 对应 `{think}...{/think}`
    #[serde(default = "default_recognized_tags")]
    pub recognized: Vec<String>,
}

fn default_recognized_tags() -> Vec<String> {
    vec!["think".to_string()]
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            recognized: default_recognized_tags(),
        }
    }
}

/// 词表条目
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmotionEntry {
    pub name: String,
    pub expression_id: i32,
}

/// 关键词类别
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordCategoryConfig {
    pub emotion: String,
    pub keywords: Vec<String>,
}

/// 表情配置
#[derive(Debug, Clone, Deserialize)]
pub struct EmotionConfig {
    /// 没有任何线索时使用的表情
    #[serde(default = "default_neutral")]
    pub neutral: String,

    #[serde(default = "default_vocabulary")]
    pub vocabulary: Vec<EmotionEntry>,

    /// 按优先级排列
    #[serde(default = "default_keyword_categories")]
    pub keyword_categories: Vec<KeywordCategoryConfig>,
}

fn default_neutral() -> String {
    DEFAULT_NEUTRAL.to_string()
}

fn default_vocabulary() -> Vec<EmotionEntry> {
    DEFAULT_VOCABULARY
        .iter()
        .map(|(name, id)| EmotionEntry {
            name: name.to_string(),
            expression_id: *id,
        })
        .collect()
}

fn default_keyword_categories() -> Vec<KeywordCategoryConfig> {
    DEFAULT_KEYWORDS
        .iter()
        .map(|(emotion, keywords)| KeywordCategoryConfig {
            emotion: emotion.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
        .collect()
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            neutral: default_neutral(),
            vocabulary: default_vocabulary(),
            keyword_categories: default_keyword_categories(),
        }
    }
}

impl EmotionConfig {
    /// 构建表情模型（同时完成校验）
    pub fn build_model(&self) -> Result<EmotionModel, EmotionError> {
        EmotionModel::new(
            self.vocabulary
                .iter()
                .map(|e| (e.name.clone(), e.expression_id))
                .collect(),
            self.keyword_categories
                .iter()
                .map(|c| (c.emotion.clone(), c.keywords.clone()))
                .collect(),
            &self.neutral,
        )
    }
}

/// 字幕配置
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// 标签开始处显示的符号
    #[serde(default = "default_open_marker")]
    pub open_marker: String,

    /// 标签结束处显示的符号
    #[serde(default = "default_close_marker")]
    pub close_marker: String,
}

fn default_open_marker() -> String {
    "(".to_string()
}

fn default_close_marker() -> String {
    ")".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            open_marker: default_open_marker(),
            close_marker: default_close_marker(),
        }
    }
}

/// 合成调度配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// 关闭后只输出文本和表情（外部音频模式）
    #[serde(default = "default_synthesis_enabled")]
    pub enabled: bool,

    /// 最大并发合成数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 单句合成超时（秒）
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// 口型音量切片时长（毫秒）
    #[serde(default = "default_slice_length")]
    pub slice_length_ms: u32,
}

fn default_synthesis_enabled() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    4
}

fn default_job_timeout() -> u64 {
    30
}

fn default_slice_length() -> u32 {
    20
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            enabled: default_synthesis_enabled(),
            max_concurrent: default_max_concurrent(),
            job_timeout_secs: default_job_timeout(),
            slice_length_ms: default_slice_length(),
        }
    }
}

/// TTS 提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    /// OpenAI 兼容 HTTP 服务
    #[default]
    Http,
    /// 本地生成的测试音频
    Fake,
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub provider: TtsProvider,

    /// TTS 服务基础 URL
    #[serde(default = "default_tts_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_tts_model")]
    pub model: String,

    #[serde(default = "default_tts_voice")]
    pub voice: String,

    /// 口型分析需要 wav
    #[serde(default = "default_response_format")]
    pub response_format: String,

    #[serde(default = "default_speed")]
    pub speed: f32,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// fake 提供方的模拟延迟（毫秒）
    #[serde(default = "default_fake_latency")]
    pub fake_latency_ms: u64,
}

fn default_tts_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_tts_voice() -> String {
    "alloy".to_string()
}

fn default_response_format() -> String {
    "wav".to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_fake_latency() -> u64 {
    200
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::default(),
            base_url: default_tts_url(),
            api_key: String::new(),
            model: default_tts_model(),
            voice: default_tts_voice(),
            response_format: default_response_format(),
            speed: default_speed(),
            timeout_secs: default_tts_timeout(),
            fake_latency_ms: default_fake_latency(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.segmentation.method, SegmentMethod::Statistical);
        assert_eq!(config.pipeline.segmentation.max_buffer_chars, 500);
        assert_eq!(config.pipeline.tags.recognized, vec!["think".to_string()]);
        assert_eq!(config.pipeline.synthesis.max_concurrent, 4);
        assert_eq!(config.tts.provider, TtsProvider::Http);
        assert_eq!(config.tts.voice, "alloy");
    }

    #[test]
    fn test_default_emotion_model_builds() {
        let model = EmotionConfig::default().build_model().unwrap();
        assert_eq!(model.neutral_id(), 0);
        assert_eq!(model.expression_id("SMIRK"), Some(3));
    }
}
