//! Sentence - 句子与标签片段值对象

use serde::{Deserialize, Serialize};

use super::emotion::{ActionSource, Actions};

/// LLM 输出的文本增量（按到达顺序）
///
/// 空字符串是合法的，会被直接忽略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDelta(String);

impl TokenDelta {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TokenDelta {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TokenDelta {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 标签在句子中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagState {
    /// 句子包含标签开始位置
    Start,
    /// 句子完全位于标签内部
    Body,
    /// 句子包含标签结束位置
    End,
}

/// 句子所属的结构化标签片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpan {
    pub tag_name: String,
    pub state: TagState,
}

impl TagSpan {
    pub fn new(tag_name: impl Into<String>, state: TagState) -> Self {
        Self {
            tag_name: tag_name.into(),
            state,
        }
    }
}

/// 分句结果
///
/// `ordinal` 在同一个 Turn 内从 0 开始连续递增
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub ordinal: u64,
    pub raw_text: String,
    pub tag_spans: Vec<TagSpan>,
}

impl Sentence {
    pub fn new(ordinal: u64, raw_text: impl Into<String>, tag_spans: Vec<TagSpan>) -> Self {
        Self {
            ordinal,
            raw_text: raw_text.into(),
            tag_spans,
        }
    }

    /// 是否位于（或触及）任一非朗读标签
    pub fn is_tagged(&self) -> bool {
        !self.tag_spans.is_empty()
    }

    /// 是否包含标签边界（Start / End）
    pub fn has_boundary(&self) -> bool {
        self.tag_spans
            .iter()
            .any(|s| matches!(s.state, TagState::Start | TagState::End))
    }

    /// 查找指定标签的状态
    pub fn span_state(&self, tag_name: &str, state: TagState) -> bool {
        self.tag_spans
            .iter()
            .any(|s| s.tag_name == tag_name && s.state == state)
    }
}

/// 渲染完成、等待合成与投递的句子
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSentence {
    pub ordinal: u64,
    pub display_text: String,
    /// 为空表示不需要合成
    pub speech_text: String,
    pub actions: Actions,
    pub action_source: ActionSource,
}

impl RenderedSentence {
    pub fn is_silent(&self) -> bool {
        self.speech_text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_detection() {
        let plain = Sentence::new(0, "Hello.", vec![]);
        assert!(!plain.is_tagged());
        assert!(!plain.has_boundary());

        let body = Sentence::new(1, "aside", vec![TagSpan::new("think", TagState::Body)]);
        assert!(body.is_tagged());
        assert!(!body.has_boundary());

        let start = Sentence::new(2, "{think}aside", vec![TagSpan::new("think", TagState::Start)]);
        assert!(start.has_boundary());
        assert!(start.span_state("think", TagState::Start));
        assert!(!start.span_state("think", TagState::End));
    }

    #[test]
    fn test_empty_delta() {
        assert!(TokenDelta::from("").is_empty());
        assert_eq!(TokenDelta::from("abc").as_str(), "abc");
    }
}
