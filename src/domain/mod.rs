//! Domain Layer - 领域层
//!
//! 流式文本处理的纯逻辑部分，不涉及 I/O:
//! - tags: 非朗读结构化标签跟踪
//! - segmenter: 流式分句（可替换的边界策略）
//! - emotion: 表情标注
//! - display / speech_filter: 字幕与朗读两种文本视图
//! - turn: 一次回复的生命周期、序号与取消

pub mod display;
pub mod emotion;
pub mod segmenter;
pub mod sentence;
pub mod speech_filter;
pub mod tags;
pub mod turn;

pub use display::DisplayRenderer;
pub use emotion::{ActionSource, Actions, Annotation, AnnotationExtractor, EmotionError, EmotionModel};
pub use segmenter::{BoundaryStrategy, Language, PunctuationStrategy, SentenceSegmenter, StatisticalStrategy};
pub use sentence::{RenderedSentence, Sentence, TagSpan, TagState, TokenDelta};
pub use speech_filter::{SpeechFilterOptions, SpeechTextFilter};
pub use tags::{OpenRegion, TagEvent, TagStateTracker};
pub use turn::{Turn, TurnId, TurnState};
