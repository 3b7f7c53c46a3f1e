use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{AppError, AppResult};
use crate::models::question::{AnswerSummary, CatalogEntry};

/// 从 JSON 文件加载最佳实践目录
pub async fn load_catalog_file(path: &Path) -> AppResult<Vec<CatalogEntry>> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        AppError::catalog_unavailable(format!("无法读取目录文件: {}", path.display()), e)
    })?;

    if content.trim().is_empty() {
        return Err(AppError::CatalogUnavailable {
            reason: format!("目录文件为空: {}", path.display()),
            source: None,
        });
    }

    let entries: Vec<CatalogEntry> = serde_json::from_str(&content).map_err(|e| {
        AppError::catalog_unavailable(format!("无法解析目录文件: {}", path.display()), e)
    })?;

    tracing::info!("成功加载 {} 条最佳实践", entries.len());
    Ok(entries)
}

/// 加载工作负载的答案摘要
///
/// 文件不存在返回 `Ok(None)`（所有 id 走后备规则），存在但无法解析则失败。
pub async fn load_workload_answers(
    answers_dir: &Path,
    workload_id: &str,
) -> AppResult<Option<Vec<AnswerSummary>>> {
    let path = answers_path(answers_dir, workload_id);

    if !fs::try_exists(&path).await.unwrap_or(false) {
        tracing::warn!("工作负载答案文件不存在: {}，将使用后备 id", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(&path).await.map_err(|e| {
        AppError::catalog_unavailable(format!("无法读取工作负载答案: {}", path.display()), e)
    })?;

    let answers: Vec<AnswerSummary> = parse_answers(&content).map_err(|e| {
        AppError::catalog_unavailable(format!("无法解析工作负载答案: {}", path.display()), e)
    })?;

    tracing::info!("工作负载 {} 共 {} 个问题答案", workload_id, answers.len());
    Ok(Some(answers))
}

/// 同时接受裸数组和 `{"AnswerSummaries": [...]}` 两种形式
fn parse_answers(content: &str) -> Result<Vec<AnswerSummary>, serde_json::Error> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum AnswersFile {
        List(Vec<AnswerSummary>),
        Wrapped {
            #[serde(rename = "AnswerSummaries")]
            answer_summaries: Vec<AnswerSummary>,
        },
    }

    Ok(match serde_json::from_str::<AnswersFile>(content)? {
        AnswersFile::List(list) => list,
        AnswersFile::Wrapped { answer_summaries } => answer_summaries,
    })
}

fn answers_path(answers_dir: &Path, workload_id: &str) -> PathBuf {
    // 工作负载 id 可能是 ARN，只保留最后一段
    let file_stem = workload_id.rsplit('/').next().unwrap_or(workload_id);
    answers_dir.join(format!("{}.json", file_stem))
}
