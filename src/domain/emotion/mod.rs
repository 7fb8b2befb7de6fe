//! Emotion - 表情词表与关键词推断
//!
//! - 显式标记: 文本中的 `[joy]` 等，名称大小写不敏感
//! - 关键词: 按类别顺序匹配，第一个命中的类别生效；
//!   文字关键词按词首匹配（`laugh` 命中 "laughing"），emoji 按子串匹配

mod extractor;
mod value_objects;

pub use extractor::AnnotationExtractor;
pub use value_objects::{ActionSource, Actions, Annotation};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// 默认表情词表（名称 -> 表情 ID）
pub const DEFAULT_VOCABULARY: &[(&str, i32)] = &[
    ("neutral", 0),
    ("sadness", 1),
    ("fear", 1),
    ("anger", 2),
    ("disgust", 2),
    ("joy", 3),
    ("surprise", 3),
    ("smirk", 3),
];

/// 默认关键词表，顺序即优先级
pub const DEFAULT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "joy",
        &[
            "😊", "😄", "😂", "🎉", "😃", "😁", "😆", "🥰", "😍", "happy", "joy", "excited",
            "cheerful", "glad", "smile", "laugh", "laughter", "joke",
        ],
    ),
    (
        "sadness",
        &[
            "😢", "😭", "😞", "😔", "☹️", "😿", "sad", "sadness", "sorrow", "sorry",
            "disappointed", "upset", "depressed", "grief",
        ],
    ),
    (
        "anger",
        &[
            "😠", "😡", "🤬", "😤", "💢", "angry", "anger", "mad", "furious", "irritated",
            "annoyed", "rage",
        ],
    ),
    (
        "surprise",
        &[
            "😮", "😲", "🤯", "🤔", "😵", "wow", "amazing", "incredible", "surprised", "shocked",
            "unexpected",
        ],
    ),
    (
        "fear",
        &[
            "😨", "😰", "😱", "😬", "scared", "afraid", "terrified", "nervous", "worried",
            "anxious",
        ],
    ),
    (
        "disgust",
        &["🤢", "🤮", "😖", "🤧", "🙄", "disgusting", "gross", "awful", "terrible", "yuck"],
    ),
    ("smirk", &["😏", "😼", "😎", "smirk", "clever", "sly", "mischievous"]),
];

pub const DEFAULT_NEUTRAL: &str = "neutral";

static DEFAULT_MODEL: Lazy<EmotionModel> = Lazy::new(|| {
    EmotionModel::new(
        DEFAULT_VOCABULARY
            .iter()
            .map(|(name, id)| (name.to_string(), *id))
            .collect(),
        DEFAULT_KEYWORDS
            .iter()
            .map(|(emotion, keywords)| {
                (emotion.to_string(), keywords.iter().map(|k| k.to_string()).collect())
            })
            .collect(),
        DEFAULT_NEUTRAL,
    )
    .unwrap()
});

/// 表情配置错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmotionError {
    #[error("Emotion vocabulary is empty")]
    EmptyVocabulary,

    #[error("Duplicate emotion name: {0}")]
    DuplicateEmotion(String),

    #[error("Neutral emotion '{0}' is not in the vocabulary")]
    UnknownNeutral(String),

    #[error("Keyword category '{0}' is not in the vocabulary")]
    UnknownCategory(String),

    #[error("Invalid emotion pattern: {0}")]
    InvalidPattern(String),
}

/// 一个关键词类别，关键词已编译为单个正则
#[derive(Debug, Clone)]
struct KeywordCategory {
    emotion: String,
    pattern: Option<Regex>,
}

/// 表情模型：词表 + 关键词表，多个 Turn 共享
#[derive(Debug, Clone)]
pub struct EmotionModel {
    vocabulary: Vec<(String, i32)>,
    marker: Regex,
    categories: Vec<KeywordCategory>,
    neutral_id: i32,
}

impl EmotionModel {
    pub fn new(
        vocabulary: Vec<(String, i32)>,
        categories: Vec<(String, Vec<String>)>,
        neutral: &str,
    ) -> Result<Self, EmotionError> {
        if vocabulary.is_empty() {
            return Err(EmotionError::EmptyVocabulary);
        }

        let vocabulary: Vec<(String, i32)> = vocabulary
            .into_iter()
            .map(|(name, id)| (name.to_lowercase(), id))
            .collect();
        for (i, (name, _)) in vocabulary.iter().enumerate() {
            if vocabulary[..i].iter().any(|(other, _)| other == name) {
                return Err(EmotionError::DuplicateEmotion(name.clone()));
            }
        }

        let neutral_id = lookup(&vocabulary, &neutral.to_lowercase())
            .ok_or_else(|| EmotionError::UnknownNeutral(neutral.to_string()))?;

        let names: Vec<String> = vocabulary.iter().map(|(name, _)| regex::escape(name)).collect();
        let marker = compile(&format!(r"(?i)\[({})\]", names.join("|")))?;

        let mut keyword_categories = Vec::with_capacity(categories.len());
        for (emotion, keywords) in categories {
            let emotion = emotion.to_lowercase();
            if lookup(&vocabulary, &emotion).is_none() {
                return Err(EmotionError::UnknownCategory(emotion));
            }
            keyword_categories.push(KeywordCategory {
                pattern: keyword_pattern(&keywords)?,
                emotion,
            });
        }

        Ok(Self {
            vocabulary,
            marker,
            categories: keyword_categories,
            neutral_id,
        })
    }

    pub fn neutral_id(&self) -> i32 {
        self.neutral_id
    }

    /// 名称对应的表情 ID（大小写不敏感）
    pub fn expression_id(&self, name: &str) -> Option<i32> {
        lookup(&self.vocabulary, &name.to_lowercase())
    }

    /// 文本中第一个显式标记对应的表情 ID
    pub fn first_marker(&self, text: &str) -> Option<i32> {
        self.marker
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|name| self.expression_id(name.as_str()))
    }

    /// 去掉文本中所有词表内的 `[emotion]` 标记
    pub fn strip_markers(&self, text: &str) -> String {
        self.marker.replace_all(text, "").into_owned()
    }

    /// 关键词推断，返回第一个命中类别的表情 ID
    pub fn infer(&self, text: &str) -> Option<i32> {
        self.categories
            .iter()
            .find(|category| {
                category
                    .pattern
                    .as_ref()
                    .is_some_and(|pattern| pattern.is_match(text))
            })
            .and_then(|category| self.expression_id(&category.emotion))
    }
}

impl Default for EmotionModel {
    fn default() -> Self {
        DEFAULT_MODEL.clone()
    }
}

fn lookup(vocabulary: &[(String, i32)], name: &str) -> Option<i32> {
    vocabulary
        .iter()
        .find(|(candidate, _)| candidate == name)
        .map(|(_, id)| *id)
}

fn compile(pattern: &str) -> Result<Regex, EmotionError> {
    Regex::new(pattern).map_err(|e| EmotionError::InvalidPattern(e.to_string()))
}

/// 文字关键词匹配词首并允许词尾延伸，其余（emoji 等）按字面匹配
fn keyword_pattern(keywords: &[String]) -> Result<Option<Regex>, EmotionError> {
    let (words, symbols): (Vec<&str>, Vec<&str>) = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .partition(|k| k.chars().all(char::is_alphanumeric));

    let mut alternatives: Vec<String> = symbols.into_iter().map(regex::escape).collect();
    if !words.is_empty() {
        let words: Vec<String> = words.into_iter().map(regex::escape).collect();
        alternatives.push(format!(r"\b(?:{})\w*", words.join("|")));
    }
    if alternatives.is_empty() {
        return Ok(None);
    }

    compile(&format!("(?i){}", alternatives.join("|"))).map(Some)
}
