//! 表情标注值对象

use serde::{Deserialize, Serialize};

/// 句子对应的表情动作
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actions {
    pub expression_ids: Vec<i32>,
}

impl Actions {
    pub fn single(expression_id: i32) -> Self {
        Self {
            expression_ids: vec![expression_id],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expression_ids.is_empty()
    }
}

/// 表情来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    /// 句子中的显式 `[emotion]` 标记
    Explicit,
    /// 关键词推断
    Inferred,
    /// 继承上一句
    Inherited,
    /// Turn 的第一句没有任何线索，使用中性表情
    Default,
    /// 标签边界句，沿用上一句且不更新继承状态
    CarriedOver,
}

/// 标注结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub actions: Actions,
    pub source: ActionSource,
}
