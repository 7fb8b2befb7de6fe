//! Display Renderer - 字幕文本生成
//!
//! 去掉表情标记、合并空白；结构化标签的开始/结束文本替换为可见符号，
//! 只在句子确实包含该边界时替换，正文中的同样文本保持原样。

use std::sync::Arc;

use super::emotion::EmotionModel;
use super::sentence::{Sentence, TagState};
use super::tags::{close_delimiter, open_delimiter};

pub const DEFAULT_OPEN_MARKER: &str = "(";
pub const DEFAULT_CLOSE_MARKER: &str = ")";

pub struct DisplayRenderer {
    model: Arc<EmotionModel>,
    open_marker: String,
    close_marker: String,
}

impl DisplayRenderer {
    pub fn new(model: Arc<EmotionModel>) -> Self {
        Self::with_markers(model, DEFAULT_OPEN_MARKER, DEFAULT_CLOSE_MARKER)
    }

    pub fn with_markers(
        model: Arc<EmotionModel>,
        open_marker: impl Into<String>,
        close_marker: impl Into<String>,
    ) -> Self {
        Self {
            model,
            open_marker: open_marker.into(),
            close_marker: close_marker.into(),
        }
    }

    pub fn render(&self, sentence: &Sentence) -> String {
        let mut text = sentence.raw_text.clone();

        for span in &sentence.tag_spans {
            match span.state {
                TagState::Start => {
                    let delimiter = open_delimiter(&span.tag_name);
                    if let Some(rest) = text.strip_prefix(delimiter.as_str()) {
                        text = format!("{}{}", self.open_marker, rest);
                    }
                }
                TagState::End => {
                    let delimiter = close_delimiter(&span.tag_name);
                    if let Some(rest) = text.strip_suffix(delimiter.as_str()) {
                        text = format!("{}{}", rest, self.close_marker);
                    }
                }
                TagState::Body => {}
            }
        }

        let text = self.model.strip_markers(&text);
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentence::TagSpan;

    fn renderer() -> DisplayRenderer {
        DisplayRenderer::new(Arc::new(EmotionModel::default()))
    }

    #[test]
    fn test_plain_sentence() {
        let s = Sentence::new(0, "[joy]  Hello \n there!", vec![]);
        assert_eq!(renderer().render(&s), "Hello there!");
    }

    #[test]
    fn test_think_boundaries_become_parentheses() {
        let s = Sentence::new(
            1,
            "{think}internal aside{/think}",
            vec![
                TagSpan::new("think", TagState::Start),
                TagSpan::new("think", TagState::End),
            ],
        );
        assert_eq!(renderer().render(&s), "(internal aside)");

        let start = Sentence::new(0, "{think}First.", vec![TagSpan::new("think", TagState::Start)]);
        assert_eq!(renderer().render(&start), "(First.");

        let body = Sentence::new(1, "Second.", vec![TagSpan::new("think", TagState::Body)]);
        assert_eq!(renderer().render(&body), "Second.");
    }

    #[test]
    fn test_literal_delimiters_are_kept() {
        let s = Sentence::new(0, "Type {think} to think.", vec![]);
        assert_eq!(renderer().render(&s), "Type {think} to think.");
    }

    #[test]
    fn test_custom_markers() {
        let r = DisplayRenderer::with_markers(Arc::new(EmotionModel::default()), "<", ">");
        let s = Sentence::new(
            0,
            "{think}hm{/think}",
            vec![
                TagSpan::new("think", TagState::Start),
                TagSpan::new("think", TagState::End),
            ],
        );
        assert_eq!(r.render(&s), "<hm>");
    }
}
