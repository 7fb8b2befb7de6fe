//! Pipeline Stages
//!
//! 每个阶段是一个独立的 tokio 任务，通过有界通道串联:
//! source -> segment -> render -> (scheduler)
//!
//! 上游阶段退出时丢弃发送端，下游随之结束；下游退出时上游的 send 失败，
//! 同样会停止。

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::ports::{OutputMessage, OutputSinkPort, TokenSourcePort, UpstreamEvent};
use crate::application::PipelineError;
use crate::domain::{
    AnnotationExtractor, DisplayRenderer, RenderedSentence, Sentence, SentenceSegmenter,
    SpeechTextFilter, Turn,
};

/// 阶段之间的通道容量
pub const STAGE_CHANNEL_CAPACITY: usize = 32;

/// 分句阶段的结果
#[derive(Debug, Default)]
pub struct SegmentOutcome {
    /// 非致命错误（溢出、标签未闭合）
    pub errors: Vec<PipelineError>,
    /// 上游在 end-of-turn 之前断开
    pub disconnect: Option<PipelineError>,
}

/// 读取上游增量并切分句子，直到 end-of-turn、断开或 Turn 取消
pub async fn segment_stage(
    turn: Arc<Turn>,
    mut source: Box<dyn TokenSourcePort>,
    mut segmenter: SentenceSegmenter,
    sink: Arc<dyn OutputSinkPort>,
    tx: mpsc::Sender<Sentence>,
) -> SegmentOutcome {
    let mut outcome = SegmentOutcome::default();
    let mut overflow_cuts = 0;

    loop {
        let event = tokio::select! {
            biased;
            _ = turn.cancelled() => None,
            event = source.next_event() => Some(event),
        };

        let Some(event) = event else {
            source.cancel().await;
            tracing::debug!(turn_id = %turn.id(), "Upstream cancelled");
            return outcome;
        };

        match event {
            Ok(UpstreamEvent::Delta(delta)) => {
                let sentences = segmenter.push(&turn, &delta);

                if segmenter.overflow_cuts() > overflow_cuts {
                    overflow_cuts = segmenter.overflow_cuts();
                    outcome.errors.push(PipelineError::SegmentationOverflow {
                        chars: segmenter.max_buffer_chars(),
                    });
                }

                if !forward(&tx, sentences).await {
                    source.cancel().await;
                    return outcome;
                }
            }
            Ok(UpstreamEvent::EndOfTurn) => break,
            Err(e) => {
                let error = PipelineError::UpstreamDisconnect(e.to_string());
                tracing::error!(turn_id = %turn.id(), error = %e, "Upstream disconnected");
                turn.cancel("upstream disconnected");
                outcome.disconnect = Some(error);
                return outcome;
            }
        }
    }

    if let Some(tag) = segmenter.open_tag().map(str::to_string) {
        tracing::warn!(turn_id = %turn.id(), tag = %tag, "Unterminated tag at end of turn, closing it");
        let error = PipelineError::UnterminatedTag(tag);
        let warning = OutputMessage::Warning {
            turn_id: turn.id().to_string(),
            ordinal: None,
            message: error.to_string(),
        };
        if let Err(e) = sink.send(warning).await {
            tracing::warn!(turn_id = %turn.id(), error = %e, "Output sink failed, cancelling turn");
            turn.cancel("output sink closed");
        }
        outcome.errors.push(error);
    }

    let sentences = segmenter.finish(&turn);
    forward(&tx, sentences).await;

    tracing::debug!(
        turn_id = %turn.id(),
        sentences = segmenter.emitted(),
        strategy = segmenter.strategy_name(),
        "Segmentation finished"
    );
    outcome
}

async fn forward(tx: &mpsc::Sender<Sentence>, sentences: Vec<Sentence>) -> bool {
    for sentence in sentences {
        if tx.send(sentence).await.is_err() {
            return false;
        }
    }
    true
}

/// 单句的表情、字幕、朗读文本生成；表情继承状态属于一个 Turn
pub struct SentenceRenderer {
    extractor: AnnotationExtractor,
    display: DisplayRenderer,
    filter: SpeechTextFilter,
}

impl SentenceRenderer {
    pub fn new(
        extractor: AnnotationExtractor,
        display: DisplayRenderer,
        filter: SpeechTextFilter,
    ) -> Self {
        Self {
            extractor,
            display,
            filter,
        }
    }

    pub fn render(&mut self, sentence: &Sentence) -> RenderedSentence {
        let annotation = self.extractor.annotate(sentence);
        let display_text = self.display.render(sentence);
        let speech_text = self.filter.filter(sentence, &display_text);

        RenderedSentence {
            ordinal: sentence.ordinal,
            display_text,
            speech_text,
            actions: annotation.actions,
            action_source: annotation.source,
        }
    }
}

/// 渲染阶段
pub async fn render_stage(
    turn: Arc<Turn>,
    mut renderer: SentenceRenderer,
    mut rx: mpsc::Receiver<Sentence>,
    tx: mpsc::Sender<RenderedSentence>,
) {
    while let Some(sentence) = rx.recv().await {
        if turn.is_cancelled() {
            break;
        }

        let rendered = renderer.render(&sentence);
        tracing::debug!(
            turn_id = %turn.id(),
            ordinal = rendered.ordinal,
            silent = rendered.is_silent(),
            source = ?rendered.action_source,
            "Sentence rendered"
        );

        if tx.send(rendered).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActionSource, EmotionModel, PunctuationStrategy, SpeechFilterOptions, TagStateTracker,
    };
    use crate::infrastructure::adapters::{ChannelTokenSource, StreamTokenSource};
    use crate::infrastructure::test_support::RecordingSink;

    fn segmenter() -> SentenceSegmenter {
        SentenceSegmenter::new(
            Box::new(PunctuationStrategy::new()),
            TagStateTracker::new(vec!["think".to_string()]),
            false,
            500,
        )
    }

    fn renderer() -> SentenceRenderer {
        let model = Arc::new(EmotionModel::default());
        SentenceRenderer::new(
            AnnotationExtractor::new(model.clone()),
            DisplayRenderer::new(model),
            SpeechTextFilter::new(SpeechFilterOptions::default()),
        )
    }

    async fn collect(mut rx: mpsc::Receiver<Sentence>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(s) = rx.recv().await {
            out.push(s.raw_text);
        }
        out
    }

    #[tokio::test]
    async fn test_segment_stage_until_end_of_turn() {
        let turn = Arc::new(Turn::new("conn-1"));
        let sink = Arc::new(RecordingSink::new());
        let (tx, rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let source = StreamTokenSource::from_fragments(["He", "llo wor", "ld. How", " are you?"]);

        let outcome = segment_stage(turn.clone(), Box::new(source), segmenter(), sink, tx).await;

        assert!(outcome.disconnect.is_none());
        assert_eq!(collect(rx).await, vec!["Hello world.", "How are you?"]);
        assert!(!turn.is_cancelled());
    }

    #[tokio::test]
    async fn test_segment_stage_disconnect_cancels_turn() {
        let turn = Arc::new(Turn::new("conn-1"));
        let sink = Arc::new(RecordingSink::new());
        let (tx, rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let (upstream, source) = ChannelTokenSource::channel(8);
        upstream
            .send(UpstreamEvent::Delta("Hi there. Half".into()))
            .await
            .unwrap();
        drop(upstream);

        let outcome = segment_stage(turn.clone(), Box::new(source), segmenter(), sink, tx).await;

        assert!(matches!(
            outcome.disconnect,
            Some(PipelineError::UpstreamDisconnect(_))
        ));
        assert!(turn.is_cancelled());
        // 已切出的句子保留，未完成的缓冲被丢弃
        assert_eq!(collect(rx).await, vec!["Hi there."]);
    }

    #[tokio::test]
    async fn test_segment_stage_reports_unterminated_tag() {
        let turn = Arc::new(Turn::new("conn-1"));
        let sink = Arc::new(RecordingSink::new());
        let (tx, rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let source = StreamTokenSource::from_fragments(["Ok. {think}never closed"]);

        let outcome =
            segment_stage(turn.clone(), Box::new(source), segmenter(), sink.clone(), tx).await;

        assert!(matches!(
            outcome.errors.as_slice(),
            [PipelineError::UnterminatedTag(tag)] if tag == "think"
        ));
        assert_eq!(sink.warnings().len(), 1);
        assert_eq!(collect(rx).await, vec!["Ok.", "{think}never closed{/think}"]);
    }

    #[tokio::test]
    async fn test_segment_stage_stops_on_cancel() {
        let turn = Arc::new(Turn::new("conn-1"));
        let sink = Arc::new(RecordingSink::new());
        let (tx, _rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let (upstream, source) = ChannelTokenSource::channel(8);

        let handle = tokio::spawn(segment_stage(
            turn.clone(),
            Box::new(source),
            segmenter(),
            sink,
            tx,
        ));
        turn.cancel("user interrupt");
        let outcome = handle.await.unwrap();

        assert!(outcome.disconnect.is_none());
        // source 被取消后上游无法继续推送
        assert!(upstream
            .send(UpstreamEvent::Delta("late".into()))
            .await
            .is_err());
    }

    #[test]
    fn test_renderer_think_sentence() {
        let mut renderer = renderer();
        let turn = Turn::new("conn-1");
        let mut seg = segmenter();
        let mut sentences = seg.push(
            &turn,
            &"[joy] Normal text {think}internal aside{/think} more text.".into(),
        );
        sentences.extend(seg.finish(&turn));

        let rendered: Vec<RenderedSentence> = sentences.iter().map(|s| renderer.render(s)).collect();
        assert_eq!(rendered.len(), 3);

        assert_eq!(rendered[0].display_text, "Normal text");
        assert_eq!(rendered[0].speech_text, "Normal text");
        assert_eq!(rendered[0].action_source, ActionSource::Explicit);

        assert_eq!(rendered[1].display_text, "(internal aside)");
        assert!(rendered[1].is_silent());
        assert_eq!(rendered[1].action_source, ActionSource::CarriedOver);
        assert_eq!(rendered[1].actions, rendered[0].actions);

        assert_eq!(rendered[2].display_text, "more text.");
        assert_eq!(rendered[2].action_source, ActionSource::Inherited);
        assert_eq!(rendered[2].actions, rendered[0].actions);
    }
}
