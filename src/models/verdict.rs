use serde::{Deserialize, Serialize};

/// 模型返回的单条最佳实践判断（未绑定 id）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVerdict {
    #[serde(default)]
    pub name: String,
    pub relevant: Option<bool>,
    pub applied: Option<bool>,
    pub reason_applied: Option<String>,
    pub reason_not_applied: Option<String>,
    #[serde(alias = "recommendations")]
    pub recommendation: Option<String>,
}

/// 一个最佳实践的判断结果
///
/// `relevant == false` 时其余判断字段一律为空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub best_practice_id: String,
    pub name: String,
    pub relevant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_applied: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_not_applied: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Verdict {
    /// 绑定 id 并收敛字段
    ///
    /// 缺少 `relevant` 时，带有 `applied` 字段即视为相关。
    pub fn from_model(best_practice_id: impl Into<String>, model: ModelVerdict) -> Self {
        let relevant = model.relevant.unwrap_or(model.applied.is_some());
        if !relevant {
            return Self {
                best_practice_id: best_practice_id.into(),
                name: model.name,
                relevant: false,
                applied: None,
                reason_applied: None,
                reason_not_applied: None,
                recommendation: None,
            };
        }
        Self {
            best_practice_id: best_practice_id.into(),
            name: model.name,
            relevant: true,
            applied: Some(model.applied.unwrap_or(false)),
            reason_applied: non_empty(model.reason_applied),
            reason_not_applied: non_empty(model.reason_not_applied),
            recommendation: non_empty(model.recommendation),
        }
    }

    /// 相关但未落实：详细建议与 IaC 生成的输入
    pub fn needs_attention(&self) -> bool {
        self.relevant && self.applied == Some(false)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 一个问题的评审结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEntry {
    pub pillar: String,
    pub question: String,
    pub question_id: String,
    pub verdicts: Vec<Verdict>,
    /// 模型返回的条目数与问题的最佳实践数不一致
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub verdict_count_mismatch: bool,
}

/// 一次评审的有序结果，运行中只追加
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    entries: Vec<AnalysisEntry>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: AnalysisEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AnalysisEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有相关但未落实的最佳实践
    pub fn needing_attention(&self) -> Vec<&Verdict> {
        self.entries
            .iter()
            .flat_map(|entry| entry.verdicts.iter())
            .filter(|v| v.needs_attention())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irrelevant_verdict_drops_assessment_fields() {
        let model = ModelVerdict {
            name: "B".to_string(),
            relevant: Some(false),
            applied: Some(true),
            reason_applied: Some("ignored".to_string()),
            ..Default::default()
        };
        let verdict = Verdict::from_model("bp-b", model);
        assert!(!verdict.relevant);
        assert_eq!(verdict.applied, None);
        assert_eq!(verdict.reason_applied, None);

        let json = serde_json::to_value(&verdict).unwrap();
        assert!(json.get("applied").is_none());
        assert!(json.get("reasonApplied").is_none());
    }

    #[test]
    fn test_missing_relevant_inferred_from_applied() {
        let model = ModelVerdict {
            name: "A".to_string(),
            applied: Some(false),
            reason_not_applied: Some("no MFA".to_string()),
            ..Default::default()
        };
        let verdict = Verdict::from_model("bp-a", model);
        assert!(verdict.relevant);
        assert!(verdict.needs_attention());
    }

    #[test]
    fn test_recommendations_alias() {
        let model: ModelVerdict = serde_json::from_str(
            r#"{"name":"A","relevant":true,"applied":false,"recommendations":"enable MFA"}"#,
        )
        .unwrap();
        assert_eq!(model.recommendation.as_deref(), Some("enable MFA"));
    }
}
