//! Synthesis Scheduler - 并发 TTS 合成与按序投递
//!
//! 每个需要朗读的句子一个合成任务，并发数由 semaphore 限制；
//! 完成顺序任意，投递严格按句子序号。合成失败的句子以无音频方式投递，
//! 不阻塞后续句子。Turn 取消后不再投递任何句子，迟到的结果直接丢弃。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::application::ports::{
    AudioAnalyzerPort, AudioEnvelope, OutputMessage, OutputSinkPort, SentenceOutput,
    SynthesisRequest, TtsEnginePort, TtsError,
};
use crate::application::PipelineError;
use crate::domain::{RenderedSentence, Turn, TurnId, TurnState};

/// Scheduler 配置
#[derive(Debug, Clone)]
pub struct SynthesisSchedulerConfig {
    /// 最大并发合成数
    pub max_concurrent: usize,
    /// 单句合成超时
    pub job_timeout: Duration,
    /// 关闭时所有句子都以无音频方式投递
    pub enabled: bool,
    /// 口型音量切片时长
    pub slice_length_ms: u32,
}

impl Default for SynthesisSchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            job_timeout: Duration::from_secs(30),
            enabled: true,
            slice_length_ms: 20,
        }
    }
}

/// 合成任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// 一句的合成任务，投递后销毁
#[derive(Debug)]
struct SynthesisJob {
    sentence: RenderedSentence,
    state: JobState,
}

struct SynthesisOutput {
    audio: Vec<u8>,
    envelope: AudioEnvelope,
}

enum JobEvent {
    Started(u64),
    Finished {
        ordinal: u64,
        result: Result<SynthesisOutput, TtsError>,
    },
}

/// 一个 Turn 的处理结果
#[derive(Debug)]
pub struct TurnReport {
    pub turn_id: TurnId,
    pub state: TurnState,
    pub delivered: u64,
    pub failed: u64,
    /// 取消时仍未完成的合成任务数
    pub cancelled_jobs: usize,
    /// 非致命错误
    pub errors: Vec<PipelineError>,
}

impl TurnReport {
    pub fn new(turn_id: TurnId) -> Self {
        Self {
            turn_id,
            state: TurnState::Active,
            delivered: 0,
            failed: 0,
            cancelled_jobs: 0,
            errors: Vec::new(),
        }
    }
}

/// 投递循环的内部状态
struct Delivery {
    jobs: BTreeMap<u64, SynthesisJob>,
    /// 已就绪但尚未轮到的句子
    ready: BTreeMap<u64, (RenderedSentence, SynthesisOutput)>,
    cursor: u64,
    in_flight: usize,
    report: TurnReport,
}

/// 合成调度器，每个 Turn 一次 `run`
pub struct SynthesisScheduler {
    config: SynthesisSchedulerConfig,
    tts_engine: Arc<dyn TtsEnginePort>,
    analyzer: Arc<dyn AudioAnalyzerPort>,
    sink: Arc<dyn OutputSinkPort>,
}

impl SynthesisScheduler {
    pub fn new(
        config: SynthesisSchedulerConfig,
        tts_engine: Arc<dyn TtsEnginePort>,
        analyzer: Arc<dyn AudioAnalyzerPort>,
        sink: Arc<dyn OutputSinkPort>,
    ) -> Self {
        Self {
            config,
            tts_engine,
            analyzer,
            sink,
        }
    }

    /// 消费渲染好的句子直到上游关闭并全部投递，或 Turn 被取消
    pub async fn run(
        &self,
        turn: Arc<Turn>,
        mut sentences: mpsc::Receiver<RenderedSentence>,
    ) -> TurnReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<JobEvent>();
        let mut upstream_open = true;
        let mut delivery = Delivery {
            jobs: BTreeMap::new(),
            ready: BTreeMap::new(),
            cursor: 0,
            in_flight: 0,
            report: TurnReport::new(turn.id()),
        };

        tracing::debug!(
            turn_id = %turn.id(),
            max_concurrent = self.config.max_concurrent,
            enabled = self.config.enabled,
            "Synthesis scheduler started"
        );

        loop {
            self.deliver_ready(&turn, &mut delivery).await;

            if turn.is_cancelled() {
                for job in delivery.jobs.values_mut() {
                    if !job.state.is_terminal() {
                        job.state = JobState::Cancelled;
                        delivery.report.cancelled_jobs += 1;
                    }
                }
                tracing::info!(
                    turn_id = %turn.id(),
                    delivered = delivery.report.delivered,
                    cancelled_jobs = delivery.report.cancelled_jobs,
                    "Synthesis stopped, outstanding jobs discarded"
                );
                return delivery.report;
            }

            if !upstream_open && delivery.in_flight == 0 {
                if !delivery.ready.is_empty() {
                    tracing::warn!(
                        turn_id = %turn.id(),
                        cursor = delivery.cursor,
                        undelivered = delivery.ready.len(),
                        "Ordinal gap, sentences after the gap were dropped"
                    );
                }
                break;
            }

            tokio::select! {
                biased;
                _ = turn.cancelled() => {}
                Some(event) = event_rx.recv(), if delivery.in_flight > 0 => {
                    self.on_job_event(&turn, &mut delivery, event).await;
                }
                received = sentences.recv(), if upstream_open => match received {
                    Some(sentence) => self.admit(&turn, &mut delivery, sentence, &semaphore, &event_tx),
                    None => upstream_open = false,
                },
            }
        }

        tracing::info!(
            turn_id = %turn.id(),
            delivered = delivery.report.delivered,
            failed = delivery.report.failed,
            "All sentences delivered"
        );
        delivery.report
    }

    /// 按序号投递所有连续就绪的句子
    async fn deliver_ready(&self, turn: &Turn, delivery: &mut Delivery) {
        while !turn.is_cancelled() {
            let Some((sentence, output)) = delivery.ready.remove(&delivery.cursor) else {
                break;
            };

            let message = OutputMessage::Sentence(self.sentence_output(turn, sentence, output));
            if let Err(e) = self.sink.send(message).await {
                tracing::warn!(
                    turn_id = %turn.id(),
                    ordinal = delivery.cursor,
                    error = %e,
                    "Output sink failed, cancelling turn"
                );
                turn.cancel("output sink closed");
                break;
            }

            delivery.jobs.remove(&delivery.cursor);
            delivery.cursor += 1;
            delivery.report.delivered += 1;
        }
    }

    fn admit(
        &self,
        turn: &Arc<Turn>,
        delivery: &mut Delivery,
        sentence: RenderedSentence,
        semaphore: &Arc<Semaphore>,
        event_tx: &mpsc::UnboundedSender<JobEvent>,
    ) {
        let ordinal = sentence.ordinal;

        if sentence.is_silent() || !self.config.enabled {
            tracing::debug!(turn_id = %turn.id(), ordinal, "Silent sentence, no synthesis");
            delivery.ready.insert(ordinal, (sentence, self.silence()));
            return;
        }

        self.dispatch(turn, ordinal, sentence.speech_text.clone(), semaphore, event_tx);
        delivery.jobs.insert(
            ordinal,
            SynthesisJob {
                sentence,
                state: JobState::Pending,
            },
        );
        delivery.in_flight += 1;
    }

    fn dispatch(
        &self,
        turn: &Arc<Turn>,
        ordinal: u64,
        text: String,
        semaphore: &Arc<Semaphore>,
        event_tx: &mpsc::UnboundedSender<JobEvent>,
    ) {
        let turn = Arc::clone(turn);
        let semaphore = Arc::clone(semaphore);
        let event_tx = event_tx.clone();
        let tts_engine = self.tts_engine.clone();
        let analyzer = self.analyzer.clone();
        let job_timeout = self.config.job_timeout;

        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = turn.cancelled() => return,
                permit = semaphore.acquire_owned() => permit,
            };
            let _permit = match permit {
                Ok(p) => p, // 持有 permit 直到任务完成
                Err(_) => {
                    let _ = event_tx.send(JobEvent::Finished {
                        ordinal,
                        result: Err(TtsError::ServiceError("Scheduler closed".to_string())),
                    });
                    return;
                }
            };
            let _ = event_tx.send(JobEvent::Started(ordinal));

            let request = SynthesisRequest {
                text,
                ordinal,
                turn_id: turn.id().to_string(),
            };
            let result = tokio::select! {
                biased;
                _ = turn.cancelled() => return,
                result = tokio::time::timeout(job_timeout, tts_engine.synthesize(request)) => {
                    result.unwrap_or(Err(TtsError::Timeout))
                }
            };

            let result = result.map(|response| {
                let envelope = match analyzer.analyze(&response.audio_data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!(ordinal, error = %e, "Volume analysis failed");
                        AudioEnvelope {
                            duration_ms: response.duration_ms.unwrap_or(0),
                            ..Default::default()
                        }
                    }
                };
                SynthesisOutput {
                    audio: response.audio_data,
                    envelope,
                }
            });

            let _ = event_tx.send(JobEvent::Finished { ordinal, result });
        });
    }

    async fn on_job_event(&self, turn: &Turn, delivery: &mut Delivery, event: JobEvent) {
        match event {
            JobEvent::Started(ordinal) => {
                if let Some(job) = delivery.jobs.get_mut(&ordinal) {
                    job.state = JobState::Running;
                }
            }
            JobEvent::Finished { ordinal, result } => {
                delivery.in_flight = delivery.in_flight.saturating_sub(1);
                let Some(job) = delivery.jobs.get_mut(&ordinal) else {
                    return;
                };
                if job.state.is_terminal() {
                    return;
                }

                match result {
                    Ok(output) => {
                        job.state = JobState::Succeeded;
                        tracing::debug!(
                            turn_id = %turn.id(),
                            ordinal,
                            audio_size = output.audio.len(),
                            duration_ms = output.envelope.duration_ms,
                            "Synthesis job succeeded"
                        );
                        delivery.ready.insert(ordinal, (job.sentence.clone(), output));
                    }
                    Err(e) => {
                        job.state = JobState::Failed;
                        let sentence = job.sentence.clone();
                        let error = PipelineError::SynthesisFailure {
                            ordinal,
                            reason: e.to_string(),
                        };
                        tracing::warn!(turn_id = %turn.id(), ordinal, error = %e, "Synthesis job failed");

                        let warning = OutputMessage::Warning {
                            turn_id: turn.id().to_string(),
                            ordinal: Some(ordinal),
                            message: error.to_string(),
                        };
                        if let Err(e) = self.sink.send(warning).await {
                            tracing::warn!(turn_id = %turn.id(), error = %e, "Output sink failed, cancelling turn");
                            turn.cancel("output sink closed");
                        }

                        delivery.report.failed += 1;
                        delivery.report.errors.push(error);
                        delivery.ready.insert(ordinal, (sentence, self.silence()));
                    }
                }
            }
        }
    }

    fn silence(&self) -> SynthesisOutput {
        SynthesisOutput {
            audio: Vec::new(),
            envelope: AudioEnvelope {
                slice_length_ms: self.config.slice_length_ms,
                ..Default::default()
            },
        }
    }

    fn sentence_output(
        &self,
        turn: &Turn,
        sentence: RenderedSentence,
        output: SynthesisOutput,
    ) -> SentenceOutput {
        SentenceOutput {
            turn_id: turn.id().to_string(),
            ordinal: sentence.ordinal,
            display_text: sentence.display_text,
            audio_bytes: output.audio.len(),
            audio: output.audio,
            actions: sentence.actions,
            volumes: output.envelope.volumes,
            slice_length_ms: output.envelope.slice_length_ms,
            duration_ms: output.envelope.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionSource, Actions};
    use crate::infrastructure::adapters::{FakeTtsClient, FakeTtsClientConfig, VolumeAnalyzer};
    use crate::infrastructure::test_support::RecordingSink;
    use rand::Rng;

    fn sentence(ordinal: u64, speech: &str) -> RenderedSentence {
        RenderedSentence {
            ordinal,
            display_text: format!("display {}", ordinal),
            speech_text: speech.to_string(),
            actions: Actions::single(0),
            action_source: ActionSource::Default,
        }
    }

    fn text(ordinal: u64) -> String {
        format!("Sentence number {}.", ordinal)
    }

    fn scheduler(
        config: SynthesisSchedulerConfig,
        tts: Arc<FakeTtsClient>,
        sink: Arc<RecordingSink>,
    ) -> SynthesisScheduler {
        SynthesisScheduler::new(config, tts, Arc::new(VolumeAnalyzer::default()), sink)
    }

    fn feed(sentences: Vec<RenderedSentence>) -> mpsc::Receiver<RenderedSentence> {
        let (tx, rx) = mpsc::channel(sentences.len().max(1));
        for s in sentences {
            tx.try_send(s).unwrap();
        }
        rx
    }

    fn fake_with_delays(delays: &[u64]) -> FakeTtsClient {
        delays
            .iter()
            .enumerate()
            .fold(FakeTtsClient::new(FakeTtsClientConfig::default()), |fake, (i, ms)| {
                fake.with_delay(text(i as u64), Duration::from_millis(*ms))
            })
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_follows_ordinals_not_completion() {
        let tts = Arc::new(fake_with_delays(&[500, 400, 300, 200, 100]));
        let sink = Arc::new(RecordingSink::new());
        let config = SynthesisSchedulerConfig {
            max_concurrent: 2,
            ..Default::default()
        };
        let turn = Arc::new(Turn::new("conn-1"));

        let rx = feed((0..5).map(|i| sentence(i, &text(i))).collect());
        let report = scheduler(config, tts.clone(), sink.clone()).run(turn, rx).await;

        assert_eq!(sink.ordinals(), vec![0, 1, 2, 3, 4]);
        assert_eq!(report.delivered, 5);
        assert_eq!(report.failed, 0);
        assert!(tts.max_in_flight() <= 2);
        assert!(sink.sentences().iter().all(|s| !s.audio.is_empty()));
        assert!(sink.sentences().iter().all(|s| !s.volumes.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_latencies_preserve_order() {
        for _ in 0..10 {
            let delays: Vec<u64> = {
                let mut rng = rand::thread_rng();
                (0..12).map(|_| rng.gen_range(1..300)).collect()
            };
            let tts = Arc::new(fake_with_delays(&delays));
            let sink = Arc::new(RecordingSink::new());
            let turn = Arc::new(Turn::new("conn-1"));

            let rx = feed((0..12).map(|i| sentence(i, &text(i))).collect());
            let report = scheduler(SynthesisSchedulerConfig::default(), tts, sink.clone())
                .run(turn, rx)
                .await;

            assert_eq!(sink.ordinals(), (0..12).collect::<Vec<_>>());
            assert_eq!(report.delivered, 12);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_is_delivered_without_audio() {
        let tts = Arc::new(
            FakeTtsClient::new(FakeTtsClientConfig::default()).with_failure(text(1), "scripted"),
        );
        let sink = Arc::new(RecordingSink::new());
        let turn = Arc::new(Turn::new("conn-1"));

        let rx = feed((0..3).map(|i| sentence(i, &text(i))).collect());
        let report = scheduler(SynthesisSchedulerConfig::default(), tts, sink.clone())
            .run(turn, rx)
            .await;

        assert_eq!(sink.ordinals(), vec![0, 1, 2]);
        let sentences = sink.sentences();
        assert!(sentences[1].audio.is_empty());
        assert!(!sentences[2].audio.is_empty());
        assert_eq!(report.failed, 1);
        assert!(matches!(
            report.errors[0],
            PipelineError::SynthesisFailure { ordinal: 1, .. }
        ));
        assert_eq!(sink.warnings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let tts = Arc::new(fake_with_delays(&[10, 5_000]));
        let sink = Arc::new(RecordingSink::new());
        let config = SynthesisSchedulerConfig {
            job_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let turn = Arc::new(Turn::new("conn-1"));

        let rx = feed((0..2).map(|i| sentence(i, &text(i))).collect());
        let report = scheduler(config, tts, sink.clone()).run(turn, rx).await;

        assert_eq!(sink.ordinals(), vec![0, 1]);
        assert_eq!(report.failed, 1);
        assert!(sink.warnings()[0].contains("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_sentences_skip_synthesis() {
        let tts = Arc::new(FakeTtsClient::with_defaults());
        let sink = Arc::new(RecordingSink::new());
        let turn = Arc::new(Turn::new("conn-1"));

        let rx = feed(vec![sentence(0, "Hello."), sentence(1, ""), sentence(2, "Bye.")]);
        scheduler(SynthesisSchedulerConfig::default(), tts.clone(), sink.clone())
            .run(turn, rx)
            .await;

        assert_eq!(sink.ordinals(), vec![0, 1, 2]);
        assert!(sink.sentences()[1].audio.is_empty());
        let mut calls = tts.calls();
        calls.sort();
        assert_eq!(calls, vec!["Bye.".to_string(), "Hello.".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_synthesis_delivers_text_only() {
        let tts = Arc::new(FakeTtsClient::with_defaults());
        let sink = Arc::new(RecordingSink::new());
        let config = SynthesisSchedulerConfig {
            enabled: false,
            ..Default::default()
        };
        let turn = Arc::new(Turn::new("conn-1"));

        let rx = feed(vec![sentence(0, "Hello."), sentence(1, "Bye.")]);
        let report = scheduler(config, tts.clone(), sink.clone()).run(turn, rx).await;

        assert_eq!(report.delivered, 2);
        assert!(tts.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_delivery() {
        let tts = Arc::new(fake_with_delays(&[10, 20, 30, 1_000, 1_000]));
        let turn = Arc::new(Turn::new("conn-1"));
        let sink = Arc::new(RecordingSink::cancelling_at(2, turn.clone()));

        let rx = feed((0..5).map(|i| sentence(i, &text(i))).collect());
        let report = scheduler(SynthesisSchedulerConfig::default(), tts, sink.clone())
            .run(turn.clone(), rx)
            .await;

        assert_eq!(sink.ordinals(), vec![0, 1, 2]);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.cancelled_jobs, 2);
        assert!(turn.is_cancelled());

        // 迟到的结果不会再被投递
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.ordinals(), vec![0, 1, 2]);
    }
}
