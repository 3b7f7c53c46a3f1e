//! 结果写入服务 - 业务能力层
//!
//! 只负责"按制品 id 存储结果"能力，不关心流程。
//! 所有文件写入 `{output_dir}/{artifact_id}/`。

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::artifact::IacTemplateType;
use crate::models::verdict::AnalysisResult;

/// 运行的总体状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    #[default]
    Completed,
    /// 被取消或有条目失败，结果不完整
    Partial,
    Failed,
}

/// 一次运行各阶段的最终状态
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub artifact_name: String,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub analysis_cancelled: bool,
    pub processed_questions: usize,
    pub total_questions: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_questions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iac_cancelled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_cancelled: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_details: Vec<String>,
    pub finished_at: String,
}

impl RunStatus {
    /// 根据各阶段结果推导总体状态，已是 `Failed` 时保持不变
    pub fn settle(&mut self) {
        if self.state == RunState::Failed {
            return;
        }
        let cancelled = self.analysis_cancelled
            || self.iac_cancelled == Some(true)
            || self.details_cancelled == Some(true);
        let incomplete = !self.failed_questions.is_empty() || !self.failed_details.is_empty();
        self.state = if cancelled || incomplete {
            RunState::Partial
        } else {
            RunState::Completed
        };
        self.finished_at = chrono::Local::now().to_rfc3339();
    }

    pub fn fail(&mut self, error: impl std::fmt::Display) {
        self.state = RunState::Failed;
        self.error = Some(error.to_string());
        self.finished_at = chrono::Local::now().to_rfc3339();
    }
}

/// 结果写入服务
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// 某个制品的结果目录
    pub fn artifact_dir(&self, artifact_id: &str) -> PathBuf {
        self.output_dir.join(artifact_id)
    }

    pub async fn write_analysis(&self, artifact_id: &str, result: &AnalysisResult) -> AppResult<PathBuf> {
        self.write_json(artifact_id, "analysis.json", result).await
    }

    pub async fn write_iac(
        &self,
        artifact_id: &str,
        template_type: IacTemplateType,
        content: &str,
    ) -> AppResult<PathBuf> {
        let file_name = format!("iac.{}", template_type.extension());
        self.write_text(artifact_id, &file_name, content).await
    }

    pub async fn write_details(&self, artifact_id: &str, content: &str) -> AppResult<PathBuf> {
        self.write_text(artifact_id, "details.md", content).await
    }

    pub async fn write_status(&self, artifact_id: &str, status: &RunStatus) -> AppResult<PathBuf> {
        self.write_json(artifact_id, "status.json", status).await
    }

    async fn write_json<T: Serialize>(&self, artifact_id: &str, file_name: &str, value: &T) -> AppResult<PathBuf> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::io(file_name, std::io::Error::other(e)))?;
        self.write_text(artifact_id, file_name, &json).await
    }

    async fn write_text(&self, artifact_id: &str, file_name: &str, content: &str) -> AppResult<PathBuf> {
        let dir = self.artifact_dir(artifact_id);
        ensure_dir(&dir).await?;

        let path = dir.join(file_name);
        debug!("写入结果: {} ({} 字节)", path.display(), content.len());
        fs::write(&path, content)
            .await
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        Ok(path)
    }
}

async fn ensure_dir(dir: &Path) -> AppResult<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::io(dir.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::verdict::{AnalysisEntry, Verdict};

    #[tokio::test]
    async fn test_writes_under_artifact_dir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path());

        let mut result = AnalysisResult::new();
        result.push(AnalysisEntry {
            pillar: "Security".to_string(),
            question: "Q".to_string(),
            question_id: "q".to_string(),
            verdicts: vec![Verdict {
                best_practice_id: "bp".to_string(),
                name: "BP".to_string(),
                relevant: false,
                applied: None,
                reason_applied: None,
                reason_not_applied: None,
                recommendation: None,
            }],
            verdict_count_mismatch: false,
        });

        let path = writer.write_analysis("diagram-1", &result).await.unwrap();
        assert_eq!(path, dir.path().join("diagram-1").join("analysis.json"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json[0]["verdicts"][0]["bestPracticeId"], "bp");

        let iac = writer
            .write_iac("diagram-1", IacTemplateType::Terraform, "resource {}")
            .await
            .unwrap();
        assert!(iac.ends_with("iac.tf"));
    }

    #[test]
    fn test_run_status_settle() {
        let mut status = RunStatus::default();
        status.settle();
        assert_eq!(status.state, RunState::Completed);

        status.details_cancelled = Some(true);
        status.settle();
        assert_eq!(status.state, RunState::Partial);

        status.fail("boom");
        status.settle();
        assert_eq!(status.state, RunState::Failed);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "FAILED");
        assert_eq!(json["error"], "boom");
    }
}
