//! Avatar Stream - 演示程序
//!
//! 从 stdin 读取文本，切成小片段模拟 LLM 流式输出，经流水线处理后
//! 把每条输出消息以 JSON 行打印到 stdout（音频只输出字节数）。

use std::sync::Arc;
use std::time::Duration;

use avatar_stream::application::ports::{TtsEnginePort, TurnManagerPort, UpstreamEvent};
use avatar_stream::config::{load_config, print_config, TtsConfig, TtsProvider};
use avatar_stream::infrastructure::adapters::{
    ChannelTokenSource, FakeTtsClient, FakeTtsClientConfig, HttpTtsClient, HttpTtsClientConfig,
    VolumeAnalyzer,
};
use avatar_stream::infrastructure::events::EventPublisher;
use avatar_stream::infrastructure::memory::InMemoryTurnManager;
use avatar_stream::StreamingPipeline;
use tokio::io::{AsyncBufReadExt, BufReader};

const CONNECTION_ID: &str = "stdin";

/// 每个模拟 fragment 的字符数
const FRAGMENT_CHARS: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志（输出到 stderr，stdout 留给 JSON 行）
    let log_filter = format!("{},avatar_stream={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Avatar Stream - streaming text pipeline");
    print_config(&config);

    // 创建 TTS 引擎
    let tts_engine = create_tts_engine(&config.tts)?;
    if !tts_engine.health_check().await {
        tracing::warn!("TTS engine health check failed, sentences may be delivered without audio");
    }

    let analyzer = Arc::new(VolumeAnalyzer::new(config.pipeline.synthesis.slice_length_ms));
    let pipeline = StreamingPipeline::new(&config.pipeline, tts_engine, analyzer)?;

    // 创建事件发布器与 Turn 管理器
    let publisher = EventPublisher::new().arc();
    let turn_manager = InMemoryTurnManager::new().arc();

    let mut messages = publisher.register(CONNECTION_ID);
    let printer = tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize output message"),
            }
        }
    });

    let turn = turn_manager.begin(CONNECTION_ID);
    let (upstream, source) = ChannelTokenSource::channel(64);

    // 模拟 LLM：逐行读取 stdin，切成小片段推送
    let feeder = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read stdin");
                    return;
                }
            };

            let chars: Vec<char> = line.chars().chain(std::iter::once('\n')).collect();
            for chunk in chars.chunks(FRAGMENT_CHARS) {
                let fragment: String = chunk.iter().collect();
                if upstream.send(UpstreamEvent::Delta(fragment.into())).await.is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
        let _ = upstream.send(UpstreamEvent::EndOfTurn).await;
    });

    let sink = Arc::new(publisher.sink_for(CONNECTION_ID));
    let result = pipeline
        .run_turn(Arc::clone(&turn), Box::new(source), sink)
        .await;
    turn_manager.end(&turn);
    feeder.abort();

    // 关闭输出通道，等待打印完成
    publisher.unregister(CONNECTION_ID);
    let _ = printer.await;

    let report = result?;
    tracing::info!(
        turn_id = %report.turn_id,
        state = ?report.state,
        delivered = report.delivered,
        failed = report.failed,
        errors = report.errors.len(),
        "Turn finished"
    );

    Ok(())
}

fn create_tts_engine(config: &TtsConfig) -> anyhow::Result<Arc<dyn TtsEnginePort>> {
    match config.provider {
        TtsProvider::Http => {
            let tts_config = HttpTtsClientConfig {
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                voice: config.voice.clone(),
                response_format: config.response_format.clone(),
                speed: config.speed,
                ..HttpTtsClientConfig::new(config.base_url.clone()).with_timeout(config.timeout_secs)
            };
            Ok(Arc::new(HttpTtsClient::new(tts_config)?))
        }
        TtsProvider::Fake => {
            let tts_config = FakeTtsClientConfig {
                latency: Duration::from_millis(config.fake_latency_ms),
                ..Default::default()
            };
            Ok(Arc::new(FakeTtsClient::new(tts_config)))
        }
    }
}
