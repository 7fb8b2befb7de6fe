//! Sentence Segmenter - 流式分句器
//!
//! 把任意切分的 fragment 重新组装为完整句子，并与标签跟踪器协作：
//! - 结构化标签开始前的文本先切成独立句子
//! - 标签区域内第一句以开始标签文本开头，最后一句以结束标签文本结尾
//! - 首句快速响应：第一句可以在子句边界（逗号等）提前切出
//! - 缓冲区超过上限时强制切分

pub mod strategy;

pub use strategy::{
    BoundaryStrategy, Language, PunctuationStrategy, StatisticalStrategy, TerminalRun, Verdict,
};

use super::sentence::{Sentence, TagSpan, TokenDelta};
use super::tags::{OpenRegion, TagEvent, TagStateTracker};
use super::turn::Turn;

/// 分句器，每个 Turn 一个实例
pub struct SentenceSegmenter {
    strategy: Box<dyn BoundaryStrategy>,
    tracker: TagStateTracker,
    buffer: String,
    region: Option<OpenRegion>,
    faster_first_response: bool,
    max_buffer_chars: usize,
    emitted: u64,
    overflow_cuts: u64,
}

impl SentenceSegmenter {
    pub fn new(
        strategy: Box<dyn BoundaryStrategy>,
        tracker: TagStateTracker,
        faster_first_response: bool,
        max_buffer_chars: usize,
    ) -> Self {
        Self {
            strategy,
            tracker,
            buffer: String::new(),
            region: None,
            faster_first_response,
            max_buffer_chars,
            emitted: 0,
            overflow_cuts: 0,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// 已输出的句子数
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// 因缓冲区超限而强制切分的次数
    pub fn overflow_cuts(&self) -> u64 {
        self.overflow_cuts
    }

    pub fn max_buffer_chars(&self) -> usize {
        self.max_buffer_chars
    }

    /// 当前未闭合的标签
    pub fn open_tag(&self) -> Option<&str> {
        self.tracker.open_tag()
    }

    /// 输入一个 fragment，返回已经完整的句子
    pub fn push(&mut self, turn: &Turn, delta: &TokenDelta) -> Vec<Sentence> {
        let mut out = Vec::new();
        if delta.is_empty() {
            return out;
        }

        for event in self.tracker.feed(delta.as_str()) {
            self.apply(turn, event, &mut out);
        }
        out
    }

    /// 流结束：输出缓冲区中剩余的所有文本
    pub fn finish(&mut self, turn: &Turn) -> Vec<Sentence> {
        let mut out = Vec::new();
        for event in self.tracker.finish() {
            self.apply(turn, event, &mut out);
        }
        self.flush_remainder(turn, &mut out);
        out
    }

    fn apply(&mut self, turn: &Turn, event: TagEvent, out: &mut Vec<Sentence>) {
        match event {
            TagEvent::Text(text) => {
                self.buffer.push_str(&text);
                self.drain(turn, out);
            }
            TagEvent::Open { name, delimiter } => {
                self.flush_remainder(turn, out);
                self.region = Some(OpenRegion::new(name, delimiter));
            }
            TagEvent::Close {
                name,
                delimiter,
                forced,
            } => {
                let rest = std::mem::take(&mut self.buffer);
                let Some(region) = self.region.take() else {
                    // 跟踪器保证 Close 之前一定有 Open
                    tracing::warn!(tag = %name, "Close event without open region");
                    self.buffer = rest + &delimiter;
                    return;
                };
                let (prefix, spans) = region.close_spans();
                let raw_text = format!(
                    "{}{}{}",
                    prefix.unwrap_or_default(),
                    rest.trim(),
                    delimiter
                );
                tracing::debug!(tag = %name, forced, "Tag region closed");
                self.emit(turn, raw_text, spans, out);
            }
        }
    }

    /// 按边界切出所有完整句子
    fn drain(&mut self, turn: &Turn, out: &mut Vec<Sentence>) {
        loop {
            let cut = match self.next_cut() {
                Some(cut) => cut,
                None => match self.overflow_cut() {
                    Some(cut) => {
                        tracing::debug!(
                            buffered_chars = self.buffer.chars().count(),
                            limit = self.max_buffer_chars,
                            "Segmentation buffer overflow, forcing a cut"
                        );
                        self.overflow_cuts += 1;
                        cut
                    }
                    None => break,
                },
            };

            let head: String = self.buffer.drain(..cut).collect();
            let leading = self.buffer.len() - self.buffer.trim_start().len();
            self.buffer.drain(..leading);
            self.emit_text(turn, &head, out);
        }
    }

    fn next_cut(&self) -> Option<usize> {
        let terminal = self.strategy.find_boundary(&self.buffer);
        if self.faster_first_response && self.emitted == 0 {
            let clause = self.strategy.find_clause_boundary(&self.buffer);
            return match (terminal, clause) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        terminal
    }

    fn overflow_cut(&self) -> Option<usize> {
        let (limit, _) = self.buffer.char_indices().nth(self.max_buffer_chars)?;
        let window = &self.buffer[..limit];
        match window.rfind(char::is_whitespace) {
            Some(pos) if !window[..pos].trim().is_empty() => Some(pos),
            _ => Some(limit),
        }
    }

    fn flush_remainder(&mut self, turn: &Turn, out: &mut Vec<Sentence>) {
        let rest = std::mem::take(&mut self.buffer);
        self.emit_text(turn, &rest, out);
    }

    /// 输出一句普通文本；在标签区域内时附加区域片段
    fn emit_text(&mut self, turn: &Turn, text: &str, out: &mut Vec<Sentence>) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        let (prefix, spans) = match self.region.as_mut() {
            Some(region) => region.take_spans(),
            None => (None, Vec::new()),
        };
        let raw_text = match prefix {
            Some(prefix) => format!("{}{}", prefix, trimmed),
            None => trimmed.to_string(),
        };
        self.emit(turn, raw_text, spans, out);
    }

    fn emit(&mut self, turn: &Turn, raw_text: String, spans: Vec<TagSpan>, out: &mut Vec<Sentence>) {
        let ordinal = turn.next_ordinal();
        tracing::debug!(
            turn_id = %turn.id(),
            ordinal,
            chars = raw_text.chars().count(),
            "Sentence segmented"
        );
        self.emitted += 1;
        out.push(Sentence::new(ordinal, raw_text, spans));
    }
}
