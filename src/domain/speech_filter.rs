//! Speech Text Filter - 朗读文本生成
//!
//! 输入为字幕文本。处于任何非朗读标签中的句子直接得到空文本；
//! 其余句子按开关移除括号内容、星号动作、特殊字符。
//! 结果不含任何字母或数字时视为空（不合成）。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::sentence::Sentence;

fn default_true() -> bool {
    true
}

/// 朗读过滤开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechFilterOptions {
    /// 移除 emoji 等非文字符号
    #[serde(default = "default_true")]
    pub remove_special_char: bool,
    /// 移除 `[...]`
    #[serde(default = "default_true")]
    pub ignore_brackets: bool,
    /// 移除 `(...)`
    #[serde(default = "default_true")]
    pub ignore_parentheses: bool,
    /// 移除 `*...*`
    #[serde(default = "default_true")]
    pub ignore_asterisks: bool,
    /// 移除 `<...>`
    #[serde(default = "default_true")]
    pub ignore_angle_brackets: bool,
}

impl Default for SpeechFilterOptions {
    fn default() -> Self {
        Self {
            remove_special_char: true,
            ignore_brackets: true,
            ignore_parentheses: true,
            ignore_asterisks: true,
            ignore_angle_brackets: true,
        }
    }
}

static ASTERISK_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+[^*]*\*+").unwrap());
static ASTERISK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+").unwrap());

static BRACKETS: Lazy<Enclosure> = Lazy::new(|| Enclosure::new(r"\[[^\[\]]*\]", r"[\[\]]"));
static PARENTHESES: Lazy<Enclosure> =
    Lazy::new(|| Enclosure::new(r"[(（][^()（）]*[)）]", r"[()（）]"));
static ANGLE_BRACKETS: Lazy<Enclosure> = Lazy::new(|| Enclosure::new(r"<[^<>]*>", r"[<>]"));

/// 非文字符号（emoji 等），保留字母、数字、空白和可朗读的标点
static SPECIAL_CHAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^\p{Alphabetic}\p{N}\s.,!?;:'"\-…()\[\]<>。，！？、；：「」『』（）“”‘’]"#)
        .unwrap()
});

/// 成对符号：由内向外反复移除最内层的一对及其内容，之后落单的符号直接删除
struct Enclosure {
    innermost: Regex,
    stray: Regex,
}

impl Enclosure {
    fn new(innermost: &str, stray: &str) -> Self {
        Self {
            innermost: Regex::new(innermost).unwrap(),
            stray: Regex::new(stray).unwrap(),
        }
    }

    fn remove(&self, text: &str) -> String {
        let mut text = text.to_string();
        while self.innermost.is_match(&text) {
            text = self.innermost.replace_all(&text, "").into_owned();
        }
        self.stray.replace_all(&text, "").into_owned()
    }
}

pub struct SpeechTextFilter {
    options: SpeechFilterOptions,
}

impl SpeechTextFilter {
    pub fn new(options: SpeechFilterOptions) -> Self {
        Self { options }
    }

    pub fn filter(&self, sentence: &Sentence, display_text: &str) -> String {
        if sentence.is_tagged() {
            return String::new();
        }

        let mut text = display_text.to_string();
        if self.options.ignore_asterisks {
            let without_spans = ASTERISK_SPAN.replace_all(&text, "").into_owned();
            text = ASTERISK.replace_all(&without_spans, "").into_owned();
        }
        if self.options.ignore_brackets {
            text = BRACKETS.remove(&text);
        }
        if self.options.ignore_parentheses {
            text = PARENTHESES.remove(&text);
        }
        if self.options.ignore_angle_brackets {
            text = ANGLE_BRACKETS.remove(&text);
        }
        if self.options.remove_special_char {
            text = SPECIAL_CHAR.replace_all(&text, "").into_owned();
        }

        if !text.chars().any(char::is_alphanumeric) {
            return String::new();
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentence::{TagSpan, TagState};

    fn filter() -> SpeechTextFilter {
        SpeechTextFilter::new(SpeechFilterOptions::default())
    }

    fn plain(text: &str) -> Sentence {
        Sentence::new(0, text, vec![])
    }

    #[test]
    fn test_tagged_sentence_is_silent() {
        let s = Sentence::new(1, "{think}aside{/think}", vec![TagSpan::new("think", TagState::Start)]);
        assert_eq!(filter().filter(&s, "(aside)"), "");

        let body = Sentence::new(2, "aside", vec![TagSpan::new("think", TagState::Body)]);
        assert_eq!(filter().filter(&body, "aside"), "");
    }

    #[test]
    fn test_removes_enclosed_content() {
        let f = filter();
        assert_eq!(f.filter(&plain(""), "Hello (quietly) there"), "Hello there");
        assert_eq!(f.filter(&plain(""), "Hi [smiles] <b>you</b>"), "Hi you");
        assert_eq!(f.filter(&plain(""), "a (b (c) d) e"), "a e");
        assert_eq!(f.filter(&plain(""), "open (never closed"), "open never closed");
        assert_eq!(f.filter(&plain(""), "你好（笑）世界"), "你好世界");
        assert_eq!(f.filter(&plain(""), "keep [[this] too"), "keep too");
    }

    #[test]
    fn test_asterisk_actions() {
        let f = filter();
        assert_eq!(f.filter(&plain(""), "*waves* Hello!"), "Hello!");
        assert_eq!(f.filter(&plain(""), "Sure **bold** thing"), "Sure thing");
        assert_eq!(f.filter(&plain(""), "5 * 3 is fifteen"), "5 3 is fifteen");
    }

    #[test]
    fn test_special_chars_and_empty() {
        let f = filter();
        assert_eq!(f.filter(&plain(""), "Great job 🎉!"), "Great job !");
        assert_eq!(f.filter(&plain(""), "😊"), "");
        assert_eq!(f.filter(&plain(""), "..."), "");
        assert_eq!(f.filter(&plain(""), "你好，世界。"), "你好，世界。");
    }

    #[test]
    fn test_options_can_be_disabled() {
        let options = SpeechFilterOptions {
            remove_special_char: false,
            ignore_brackets: false,
            ignore_parentheses: false,
            ignore_asterisks: false,
            ignore_angle_brackets: false,
        };
        let f = SpeechTextFilter::new(options);
        assert_eq!(f.filter(&plain(""), "*hi* (there) 🎉"), "*hi* (there) 🎉");
    }
}
