//! Annotation Extractor - 句子表情标注
//!
//! 优先级：显式标记 > 关键词 > 继承上一句 > 中性。
//! 含标签边界的句子沿用上一句的表情，且不改变继承状态。

use std::sync::Arc;

use super::value_objects::{ActionSource, Actions, Annotation};
use super::EmotionModel;
use crate::domain::sentence::Sentence;

/// 表情标注器，每个 Turn 一个实例
pub struct AnnotationExtractor {
    model: Arc<EmotionModel>,
    previous: Option<Actions>,
}

impl AnnotationExtractor {
    pub fn new(model: Arc<EmotionModel>) -> Self {
        Self {
            model,
            previous: None,
        }
    }

    pub fn annotate(&mut self, sentence: &Sentence) -> Annotation {
        if sentence.has_boundary() {
            let actions = self
                .previous
                .clone()
                .unwrap_or_else(|| Actions::single(self.model.neutral_id()));
            return Annotation {
                actions,
                source: ActionSource::CarriedOver,
            };
        }

        let text = &sentence.raw_text;
        let (actions, source) = if let Some(id) = self.model.first_marker(text) {
            (Actions::single(id), ActionSource::Explicit)
        } else if let Some(id) = self.model.infer(text) {
            (Actions::single(id), ActionSource::Inferred)
        } else if let Some(previous) = &self.previous {
            (previous.clone(), ActionSource::Inherited)
        } else {
            (Actions::single(self.model.neutral_id()), ActionSource::Default)
        };

        tracing::trace!(ordinal = sentence.ordinal, ?source, ids = ?actions.expression_ids, "Sentence annotated");
        self.previous = Some(actions.clone());
        Annotation { actions, source }
    }
}
