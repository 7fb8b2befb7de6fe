//! Streaming Pipeline - 组装各阶段并驱动一个 Turn
//!
//! 构造时校验配置并建立共享的表情模型；每个 Turn 独立创建分句器、
//! 表情继承状态和合成调度器，Turn 之间不共享可变状态。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::stages::{
    render_stage, segment_stage, SegmentOutcome, SentenceRenderer, STAGE_CHANNEL_CAPACITY,
};
use crate::application::ports::{
    AudioAnalyzerPort, OutputMessage, OutputSinkPort, TokenSourcePort, TtsEnginePort,
};
use crate::application::PipelineError;
use crate::config::{validate_pipeline_config, PipelineConfig, SegmentMethod, SegmentationConfig};
use crate::domain::{
    AnnotationExtractor, BoundaryStrategy, DisplayRenderer, EmotionModel, Language,
    PunctuationStrategy, SentenceSegmenter, SpeechTextFilter, StatisticalStrategy,
    TagStateTracker, Turn,
};
use crate::infrastructure::worker::{SynthesisScheduler, SynthesisSchedulerConfig, TurnReport};

/// 流式处理流水线
pub struct StreamingPipeline {
    config: PipelineConfig,
    model: Arc<EmotionModel>,
    scheduler_config: SynthesisSchedulerConfig,
    tts_engine: Arc<dyn TtsEnginePort>,
    analyzer: Arc<dyn AudioAnalyzerPort>,
}

impl StreamingPipeline {
    pub fn new(
        config: &PipelineConfig,
        tts_engine: Arc<dyn TtsEnginePort>,
        analyzer: Arc<dyn AudioAnalyzerPort>,
    ) -> Result<Self, PipelineError> {
        validate_pipeline_config(config).map_err(|e| PipelineError::invalid_config(e.to_string()))?;

        let model = config
            .emotion
            .build_model()
            .map_err(|e| PipelineError::invalid_config(e.to_string()))?;

        let synthesis = &config.synthesis;
        let scheduler_config = SynthesisSchedulerConfig {
            max_concurrent: synthesis.max_concurrent,
            job_timeout: Duration::from_secs(synthesis.job_timeout_secs),
            enabled: synthesis.enabled,
            slice_length_ms: synthesis.slice_length_ms,
        };

        Ok(Self {
            config: config.clone(),
            model: Arc::new(model),
            scheduler_config,
            tts_engine,
            analyzer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 处理一个 Turn，直到全部句子投递完毕或 Turn 被取消
    ///
    /// 只有上游断开会以错误返回；此时客户端已收到 TurnCancelled
    pub async fn run_turn(
        &self,
        turn: Arc<Turn>,
        source: Box<dyn TokenSourcePort>,
        sink: Arc<dyn OutputSinkPort>,
    ) -> Result<TurnReport, PipelineError> {
        let segmenter = self.segmenter()?;

        tracing::info!(
            turn_id = %turn.id(),
            connection_id = %turn.connection_id(),
            strategy = segmenter.strategy_name(),
            "Turn started"
        );

        let started = OutputMessage::TurnStarted {
            turn_id: turn.id().to_string(),
            connection_id: turn.connection_id().to_string(),
        };
        if let Err(e) = sink.send(started).await {
            tracing::warn!(turn_id = %turn.id(), error = %e, "Output sink failed, cancelling turn");
            turn.cancel("output sink closed");
        }

        let (sentence_tx, sentence_rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let (rendered_tx, rendered_rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);

        let segment_handle = tokio::spawn(segment_stage(
            Arc::clone(&turn),
            source,
            segmenter,
            Arc::clone(&sink),
            sentence_tx,
        ));
        let render_handle = tokio::spawn(render_stage(
            Arc::clone(&turn),
            self.renderer(),
            sentence_rx,
            rendered_tx,
        ));

        let scheduler = SynthesisScheduler::new(
            self.scheduler_config.clone(),
            Arc::clone(&self.tts_engine),
            Arc::clone(&self.analyzer),
            Arc::clone(&sink),
        );
        let mut report = scheduler.run(Arc::clone(&turn), rendered_rx).await;

        let outcome = match segment_handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(turn_id = %turn.id(), error = %e, "Segment stage aborted");
                turn.cancel("segment stage aborted");
                SegmentOutcome::default()
            }
        };
        if let Err(e) = render_handle.await {
            tracing::error!(turn_id = %turn.id(), error = %e, "Render stage aborted");
        }

        let SegmentOutcome { errors, disconnect } = outcome;
        report.errors.extend(errors);
        self.finish_turn(&turn, sink.as_ref(), &mut report).await;

        match disconnect {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }

    async fn finish_turn(&self, turn: &Turn, sink: &dyn OutputSinkPort, report: &mut TurnReport) {
        let message = if turn.complete() {
            tracing::info!(
                turn_id = %turn.id(),
                delivered = report.delivered,
                failed = report.failed,
                "Turn completed"
            );
            OutputMessage::TurnEnded {
                turn_id: turn.id().to_string(),
                delivered: report.delivered,
            }
        } else {
            let reason = turn.cancel_reason().unwrap_or_default();
            tracing::info!(
                turn_id = %turn.id(),
                delivered = report.delivered,
                reason = %reason,
                "Turn finished as cancelled"
            );
            OutputMessage::TurnCancelled {
                turn_id: turn.id().to_string(),
                reason,
            }
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(turn_id = %turn.id(), error = %e, "Final message not delivered");
        }
        report.state = turn.state();
    }

    fn segmenter(&self) -> Result<SentenceSegmenter, PipelineError> {
        let segmentation = &self.config.segmentation;
        Ok(SentenceSegmenter::new(
            build_strategy(segmentation)?,
            TagStateTracker::new(self.config.tags.recognized.clone()),
            segmentation.faster_first_response,
            segmentation.max_buffer_chars,
        ))
    }

    fn renderer(&self) -> SentenceRenderer {
        let display = &self.config.display;
        SentenceRenderer::new(
            AnnotationExtractor::new(Arc::clone(&self.model)),
            DisplayRenderer::with_markers(
                Arc::clone(&self.model),
                display.open_marker.clone(),
                display.close_marker.clone(),
            ),
            SpeechTextFilter::new(self.config.speech_filter),
        )
    }
}

/// 按配置创建分句策略
pub fn build_strategy(
    config: &SegmentationConfig,
) -> Result<Box<dyn BoundaryStrategy>, PipelineError> {
    match config.method {
        SegmentMethod::Punctuation => Ok(Box::new(PunctuationStrategy::new())),
        SegmentMethod::Statistical => {
            let language = Language::from_code(&config.language).ok_or_else(|| {
                PipelineError::invalid_config(format!(
                    "Unsupported segmentation language: {}",
                    config.language
                ))
            })?;
            Ok(Box::new(StatisticalStrategy::new(language)))
        }
    }
}
