//! 句子边界策略
//!
//! 两种可互换的策略：
//! - `PunctuationStrategy`: 规则分句，终止标点 + 空白
//! - `StatisticalStrategy`: 在规则基础上排除缩写、姓名首字母等误切分

/// ASCII 终止标点，后面必须跟空白
fn is_ascii_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

/// CJK 终止标点，后面跟任意字符即可成立
fn is_cjk_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

fn is_terminal(c: char) -> bool {
    is_ascii_terminal(c) || is_cjk_terminal(c)
}

/// 终止标点之后可以附着的闭合符号
fn is_closing(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | '”' | '’' | ')' | ']' | '）' | '」' | '』' | '》'
    )
}

fn is_ascii_clause(c: char) -> bool {
    matches!(c, ',' | ';' | ':')
}

fn is_cjk_clause(c: char) -> bool {
    matches!(c, '，' | '、' | '；' | '：')
}

/// 一段终止标点（可能多个连续，如 `?!`、`...`）
#[derive(Debug, Clone, Copy)]
pub struct TerminalRun<'a> {
    /// 终止标点前的文本
    pub before: &'a str,
    /// 终止标点本身
    pub punctuation: &'a str,
    /// 闭合符号之后的文本（以空白开头，或 CJK 终止时为任意文本）
    pub after: &'a str,
}

/// 对一个候选边界的判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
    /// 需要更多文本才能判断
    NeedMore,
}

/// 句子边界策略
///
/// 返回值均为字节位置：`text[..pos]` 为完整句子
pub trait BoundaryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// 判断一个终止标点候选是否真的结束句子
    fn judge(&self, run: &TerminalRun<'_>) -> Verdict;

    /// 第一个完整句子的结束位置；末尾的终止标点需要等待后续文本
    fn find_boundary(&self, text: &str) -> Option<usize> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut i = 0;

        while i < chars.len() {
            let (pos, c) = chars[i];

            if c == '\n' {
                if !text[..pos].trim().is_empty() {
                    return Some(pos);
                }
                i += 1;
                continue;
            }

            if !is_terminal(c) {
                i += 1;
                continue;
            }

            let mut j = i;
            let mut cjk = false;
            while j < chars.len() && is_terminal(chars[j].1) {
                cjk |= is_cjk_terminal(chars[j].1);
                j += 1;
            }
            let punct_end = if j < chars.len() { chars[j].0 } else { text.len() };
            while j < chars.len() && is_closing(chars[j].1) {
                j += 1;
            }
            if j == chars.len() {
                return None;
            }

            let (cut, next) = chars[j];
            if cjk || next.is_whitespace() {
                let run = TerminalRun {
                    before: &text[..pos],
                    punctuation: &text[pos..punct_end],
                    after: &text[cut..],
                };
                match self.judge(&run) {
                    Verdict::Accept if !text[..cut].trim().is_empty() => return Some(cut),
                    Verdict::NeedMore => return None,
                    _ => {}
                }
            }
            i = j;
        }

        None
    }

    /// 第一个子句边界（逗号、分号、冒号），用于首句快速响应
    fn find_clause_boundary(&self, text: &str) -> Option<usize> {
        let mut iter = text.char_indices().peekable();
        while let Some((pos, c)) = iter.next() {
            let end = pos + c.len_utf8();
            let accepted = if is_cjk_clause(c) {
                iter.peek().is_some()
            } else if is_ascii_clause(c) {
                matches!(iter.peek(), Some((_, next)) if next.is_whitespace())
            } else {
                false
            };
            if accepted && !text[..pos].trim().is_empty() {
                return Some(end);
            }
        }
        None
    }
}

/// 规则分句：终止标点一律成立
#[derive(Debug, Clone, Default)]
pub struct PunctuationStrategy;

impl PunctuationStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl BoundaryStrategy for PunctuationStrategy {
    fn name(&self) -> &'static str {
        "punctuation"
    }

    fn judge(&self, _run: &TerminalRun<'_>) -> Verdict {
        Verdict::Accept
    }
}

/// 分句语言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Chinese,
    Japanese,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "en" => Some(Self::English),
            "zh" => Some(Self::Chinese),
            "ja" => Some(Self::Japanese),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Chinese => "zh",
            Self::Japanese => "ja",
        }
    }
}

const ENGLISH_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "inc", "ltd",
    "co", "no", "fig", "approx", "dept",
];

/// 语言感知分句
///
/// 单个 `.` 的候选会被以下规则否决：
/// 前一个词是常见缩写、单个大写字母（姓名首字母，`I` 除外）、
/// 或下一个词以小写字母开头。
#[derive(Debug, Clone)]
pub struct StatisticalStrategy {
    language: Language,
}

impl StatisticalStrategy {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn is_abbreviation(&self, word: &str) -> bool {
        match self.language {
            Language::English => {
                let lower = word.to_lowercase();
                ENGLISH_ABBREVIATIONS.contains(&lower.as_str())
            }
            Language::Chinese | Language::Japanese => false,
        }
    }
}

impl BoundaryStrategy for StatisticalStrategy {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn judge(&self, run: &TerminalRun<'_>) -> Verdict {
        if run.punctuation.chars().any(is_cjk_terminal) {
            return Verdict::Accept;
        }
        if run.punctuation.contains(['!', '?']) {
            return Verdict::Accept;
        }

        let Some(next) = run.after.trim_start().chars().next() else {
            return Verdict::NeedMore;
        };
        if next.is_lowercase() {
            return Verdict::Reject;
        }

        if run.punctuation == "." {
            let word = run
                .before
                .rsplit(char::is_whitespace)
                .next()
                .unwrap_or("")
                .trim_start_matches(|c: char| !c.is_alphanumeric());

            if self.is_abbreviation(word) {
                return Verdict::Reject;
            }

            let mut letters = word.chars();
            if let (Some(first), None) = (letters.next(), letters.next()) {
                if first.is_uppercase() && first != 'I' {
                    return Verdict::Reject;
                }
            }
        }

        Verdict::Accept
    }
}
