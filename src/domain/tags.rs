//! Tag State Tracker - 非朗读结构化标签识别
//!
//! 语法: `{name}` 开始, `{/name}` 结束，名称必须在配置的标签列表中。
//! 标签是扁平的：已有标签打开时再出现任何开始标签（同名或异名）、
//! 或与当前标签不匹配的结束标签，一律按普通文本处理并输出诊断日志。

use super::sentence::{TagSpan, TagState};

const DELIMITER_OPEN: char = '{';
const DELIMITER_CLOSE: char = '}';

/// 标签开始文本，如 `{think}`
pub fn open_delimiter(name: &str) -> String {
    format!("{{{}}}", name)
}

/// 标签结束文本，如 `{/think}`
pub fn close_delimiter(name: &str) -> String {
    format!("{{/{}}}", name)
}

/// 扫描得到的事件，按文本顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    /// 普通文本（包括被当作字面量的非法标签）
    Text(String),
    /// 结构化标签开始
    Open { name: String, delimiter: String },
    /// 结构化标签结束；`forced` 表示流结束时强制闭合
    Close {
        name: String,
        delimiter: String,
        forced: bool,
    },
}

/// 单个 `{...}` 的分类结果
enum Delimiter {
    Open(String),
    Close(String),
    Literal(&'static str),
    Plain,
}

/// 标签状态跟踪器
///
/// 每个 Turn 一个实例，跨 fragment 保持打开状态和未完成的标签前缀
#[derive(Debug, Clone)]
pub struct TagStateTracker {
    recognized: Vec<String>,
    open: Option<String>,
    /// 可能是被切断的标签前缀（如 `{thi`），等待下一个 fragment
    carry: String,
}

impl TagStateTracker {
    pub fn new(recognized: Vec<String>) -> Self {
        Self {
            recognized,
            open: None,
            carry: String::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_tag(&self) -> Option<&str> {
        self.open.as_deref()
    }

    pub fn recognized(&self) -> &[String] {
        &self.recognized
    }

    /// 输入一个 fragment，返回可确定的事件
    pub fn feed(&mut self, fragment: &str) -> Vec<TagEvent> {
        let mut input = std::mem::take(&mut self.carry);
        input.push_str(fragment);
        self.scan(&input, false)
    }

    /// 流结束：输出残留文本，并强制闭合未结束的标签
    pub fn finish(&mut self) -> Vec<TagEvent> {
        let input = std::mem::take(&mut self.carry);
        let mut events = self.scan(&input, true);

        if let Some(name) = self.open.take() {
            tracing::warn!(tag = %name, "Unterminated tag force-closed at end of turn");
            events.push(TagEvent::Close {
                delimiter: close_delimiter(&name),
                name,
                forced: true,
            });
        }

        events
    }

    fn scan(&mut self, input: &str, at_end: bool) -> Vec<TagEvent> {
        let mut events = Vec::new();
        let mut text = String::new();
        let mut rest = input;

        while let Some(pos) = rest.find(DELIMITER_OPEN) {
            text.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            let Some(end) = tail.find(DELIMITER_CLOSE) else {
                if !at_end && self.could_be_delimiter(tail) {
                    self.carry = tail.to_string();
                    rest = "";
                    break;
                }
                text.push(DELIMITER_OPEN);
                rest = &tail[1..];
                continue;
            };

            let delimiter = &tail[..=end];
            match self.classify(&tail[1..end]) {
                Delimiter::Open(name) => {
                    flush_text(&mut events, &mut text);
                    self.open = Some(name.clone());
                    events.push(TagEvent::Open {
                        name,
                        delimiter: delimiter.to_string(),
                    });
                    rest = &tail[end + 1..];
                }
                Delimiter::Close(name) => {
                    flush_text(&mut events, &mut text);
                    self.open = None;
                    events.push(TagEvent::Close {
                        name,
                        delimiter: delimiter.to_string(),
                        forced: false,
                    });
                    rest = &tail[end + 1..];
                }
                Delimiter::Literal(reason) => {
                    tracing::warn!(
                        delimiter = %delimiter,
                        open_tag = ?self.open,
                        reason,
                        "Unsupported tag usage kept as literal text"
                    );
                    text.push_str(delimiter);
                    rest = &tail[end + 1..];
                }
                Delimiter::Plain => {
                    text.push(DELIMITER_OPEN);
                    rest = &tail[1..];
                }
            }
        }

        text.push_str(rest);
        flush_text(&mut events, &mut text);
        events
    }

    fn classify(&self, inner: &str) -> Delimiter {
        if let Some(name) = inner.strip_prefix('/') {
            if !self.is_recognized(name) {
                return Delimiter::Plain;
            }
            return match &self.open {
                Some(open) if open == name => Delimiter::Close(name.to_string()),
                Some(_) => Delimiter::Literal("close tag does not match the open tag"),
                None => Delimiter::Literal("close tag without open tag"),
            };
        }

        if !self.is_recognized(inner) {
            return Delimiter::Plain;
        }
        match &self.open {
            None => Delimiter::Open(inner.to_string()),
            Some(open) if open == inner => Delimiter::Literal("tag opened while already open"),
            Some(_) => Delimiter::Literal("nested tags are not supported"),
        }
    }

    fn is_recognized(&self, name: &str) -> bool {
        self.recognized.iter().any(|t| t == name)
    }

    /// `tail` 以 `{` 开头且不含 `}`，判断它是否可能是某个标签的前缀
    fn could_be_delimiter(&self, tail: &str) -> bool {
        self.recognized
            .iter()
            .any(|n| open_delimiter(n).starts_with(tail) || close_delimiter(n).starts_with(tail))
    }
}

fn flush_text(events: &mut Vec<TagEvent>, text: &mut String) {
    if !text.is_empty() {
        events.push(TagEvent::Text(std::mem::take(text)));
    }
}

/// 分句器视角下当前打开的标签区域
///
/// 负责把标签边界归属到句子：区域内第一句带 `Start`（并以开始标签文本开头），
/// 之后为 `Body`，闭合时的最后一句带 `End`。
#[derive(Debug, Clone)]
pub struct OpenRegion {
    name: String,
    pending_delimiter: Option<String>,
}

impl OpenRegion {
    pub fn new(name: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending_delimiter: Some(delimiter.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 区域内一句完整句子的标签片段，返回（需要前置的开始标签文本, 片段）
    pub fn take_spans(&mut self) -> (Option<String>, Vec<TagSpan>) {
        match self.pending_delimiter.take() {
            Some(delimiter) => (
                Some(delimiter),
                vec![TagSpan::new(&self.name, TagState::Start)],
            ),
            None => (None, vec![TagSpan::new(&self.name, TagState::Body)]),
        }
    }

    /// 区域闭合时最后一句的标签片段
    pub fn close_spans(self) -> (Option<String>, Vec<TagSpan>) {
        match self.pending_delimiter {
            Some(delimiter) => (
                Some(delimiter),
                vec![
                    TagSpan::new(&self.name, TagState::Start),
                    TagSpan::new(&self.name, TagState::End),
                ],
            ),
            None => (None, vec![TagSpan::new(&self.name, TagState::End)]),
        }
    }
}
