use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// 目录文件中的一条最佳实践（`well_architected_best_practices.json` 的结构）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "Pillar")]
    pub pillar: String,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Best Practice")]
    pub best_practice: String,
}

/// 工作负载元数据中的一个问题答案摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnswerSummary {
    pub question_id: String,
    pub question_title: String,
    #[serde(default)]
    pub choices: Vec<AnswerChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnswerChoice {
    pub choice_id: Option<String>,
    pub title: Option<String>,
}

/// 最佳实践引用：稳定 id + 名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPracticeRef {
    pub id: String,
    pub name: String,
}

/// 一个评审问题及其覆盖的最佳实践
///
/// 每次运行从 `QuestionCatalog` 构建一次，之后只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGroup {
    pub pillar_id: String,
    pub pillar_name: String,
    pub question_id: String,
    pub title: String,
    pub best_practices: Vec<BestPracticeRef>,
}

impl QuestionGroup {
    pub fn best_practice_names(&self) -> Vec<&str> {
        self.best_practices.iter().map(|bp| bp.name.as_str()).collect()
    }
}

/// 由名称生成确定性的后备 id
///
/// 小写，非字母数字的连续字符折叠为 `-`，去掉首尾的 `-`。
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    NON_ALNUM_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}
