//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, PipelineConfig, SegmentMethod, TtsProvider};
use crate::domain::Language;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 分句缓冲区下限
const MIN_BUFFER_CHARS: usize = 16;

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `AVATAR_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `AVATAR_TTS__BASE_URL=http://localhost:8880/v1`
/// - `AVATAR_TTS__PROVIDER=fake`
/// - `AVATAR_PIPELINE__SYNTHESIS__MAX_CONCURRENT=8`
/// - `AVATAR_PIPELINE__SEGMENTATION__METHOD=punctuation`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("pipeline.segmentation.method", "statistical")?
        .set_default("pipeline.segmentation.language", "en")?
        .set_default("pipeline.segmentation.faster_first_response", true)?
        .set_default("pipeline.segmentation.max_buffer_chars", 500)?
        .set_default("pipeline.synthesis.enabled", true)?
        .set_default("pipeline.synthesis.max_concurrent", 4)?
        .set_default("pipeline.synthesis.job_timeout_secs", 30)?
        .set_default("pipeline.synthesis.slice_length_ms", 20)?
        .set_default("tts.provider", "http")?
        .set_default("tts.base_url", "https://api.openai.com/v1")?
        .set_default("tts.model", "tts-1")?
        .set_default("tts.voice", "alloy")?
        .set_default("tts.response_format", "wav")?
        .set_default("tts.timeout_secs", 30)?
        .set_default("log.level", "info")?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: AVATAR_
    // 层级分隔符: __ (双下划线)
    builder = builder.add_source(
        Environment::with_prefix("AVATAR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;

    if config.tts.provider == TtsProvider::Http && config.tts.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS base URL cannot be empty".to_string(),
        ));
    }

    if config.tts.speed <= 0.0 {
        return Err(ConfigError::ValidationError(
            "TTS speed must be positive".to_string(),
        ));
    }

    Ok(())
}

/// 验证流水线配置
pub fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    let segmentation = &config.segmentation;
    if segmentation.max_buffer_chars < MIN_BUFFER_CHARS {
        return Err(ConfigError::ValidationError(format!(
            "max_buffer_chars must be at least {}",
            MIN_BUFFER_CHARS
        )));
    }
    if segmentation.method == SegmentMethod::Statistical
        && Language::from_code(&segmentation.language).is_none()
    {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported segmentation language: {}",
            segmentation.language
        )));
    }

    let mut seen = HashSet::new();
    for name in &config.tags.recognized {
        if name.is_empty()
            || name
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '/'))
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid tag name: {:?}",
                name
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate tag name: {}",
                name
            )));
        }
    }

    config
        .emotion
        .build_model()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    let synthesis = &config.synthesis;
    if synthesis.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "max_concurrent cannot be 0".to_string(),
        ));
    }
    if synthesis.job_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "job_timeout_secs cannot be 0".to_string(),
        ));
    }
    if synthesis.slice_length_ms == 0 {
        return Err(ConfigError::ValidationError(
            "slice_length_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    let pipeline = &config.pipeline;
    tracing::info!("=== Application Configuration ===");
    tracing::info!(
        "Segmentation: {:?} ({}), faster first response: {}",
        pipeline.segmentation.method,
        pipeline.segmentation.language,
        pipeline.segmentation.faster_first_response
    );
    tracing::info!("Max Buffer Chars: {}", pipeline.segmentation.max_buffer_chars);
    tracing::info!("Recognized Tags: {:?}", pipeline.tags.recognized);
    tracing::info!(
        "Emotions: {} entries, neutral = {}",
        pipeline.emotion.vocabulary.len(),
        pipeline.emotion.neutral
    );
    tracing::info!("Synthesis Enabled: {}", pipeline.synthesis.enabled);
    if pipeline.synthesis.enabled {
        tracing::info!("Max Concurrent: {}", pipeline.synthesis.max_concurrent);
        tracing::info!("Job Timeout: {}s", pipeline.synthesis.job_timeout_secs);
    }
    tracing::info!("TTS Provider: {:?}", config.tts.provider);
    tracing::info!("TTS URL: {}", config.tts.base_url);
    tracing::info!("TTS Voice: {} ({})", config.tts.voice, config.tts.model);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
