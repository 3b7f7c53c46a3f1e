//! 详细建议生成 - 编排层
//!
//! 为每个"相关但未落实"的最佳实践单独跑一次多轮生成，结果按顺序拼接。
//!
//! - 条目之间与每个条目的轮次之间都检查取消（生成命名空间）
//! - 单个条目失败只记录并跳过，结果标记为部分
//! - 一个条目也没生成出内容且未取消时返回 `NothingGenerated`

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::artifact::{Artifact, IacTemplateType};
use crate::models::verdict::{AnalysisResult, Verdict};
use crate::orchestrator::chunked_generation::{
    ChunkedGenerationController, DetailAccumulator, GenerationRequest, RoundContext,
};
use crate::prompts;
use crate::services::cancellation::CancelToken;
use crate::services::progress::{ProgressEvent, ProgressReporter, ScaledReporter};

/// 条目之间的分隔
pub const ITEM_SEPARATOR: &str = "\n\n---\n\n";

/// 一个待展开的最佳实践
#[derive(Debug, Clone, Copy)]
pub struct DetailItem<'a> {
    pub pillar: &'a str,
    pub question: &'a str,
    pub verdict: &'a Verdict,
}

/// 按评审顺序列出所有待展开的条目
pub fn detail_items(result: &AnalysisResult) -> Vec<DetailItem<'_>> {
    result
        .entries()
        .iter()
        .flat_map(|entry| {
            entry
                .verdicts
                .iter()
                .filter(|v| v.needs_attention())
                .map(move |verdict| DetailItem {
                    pillar: &entry.pillar,
                    question: &entry.question,
                    verdict,
                })
        })
        .collect()
}

/// 生成失败被跳过的条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub name: String,
    pub error: String,
}

/// 详细建议生成结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsOutcome {
    pub content: String,
    pub cancelled: bool,
    /// 有条目失败被跳过
    pub partial: bool,
    pub failed_items: Vec<FailedItem>,
}

/// 条目开始时的整体进度 `round(index / total * 100)`
fn item_progress(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((index * 200 + total) / (2 * total)).min(100) as u8
}

fn item_status(index: usize, total: usize, name: &str) -> String {
    format!(
        "Analyzing {} of {} selected best practices not applied - Best practice: '{}'",
        index + 1,
        total,
        name
    )
}

/// 详细建议生成器
pub struct DetailExpansion<'a> {
    controller: &'a ChunkedGenerationController,
    reporter: Arc<dyn ProgressReporter>,
    output_language: String,
    template_type: Option<IacTemplateType>,
}

impl<'a> DetailExpansion<'a> {
    pub fn new(
        controller: &'a ChunkedGenerationController,
        reporter: Arc<dyn ProgressReporter>,
        output_language: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            reporter,
            output_language: output_language.into(),
            template_type: None,
        }
    }

    /// 图片制品的示例代码使用该模板类型
    pub fn with_template_type(mut self, template_type: Option<IacTemplateType>) -> Self {
        self.template_type = template_type;
        self
    }

    pub async fn run(
        &self,
        artifact: &Artifact,
        result: &AnalysisResult,
        token: &CancelToken,
    ) -> AppResult<DetailsOutcome> {
        let items = detail_items(result);
        let total = items.len();
        if total == 0 {
            return Err(AppError::NothingGenerated(
                "没有相关但未落实的最佳实践".to_string(),
            ));
        }
        info!("📝 为 {} 个未落实的最佳实践生成详细建议", total);

        let system_prompt = prompts::details_system_prompt(artifact, self.template_type);
        let mut outcome = DetailsOutcome::default();
        let mut parts: Vec<String> = Vec::with_capacity(total);

        for (idx, item) in items.iter().enumerate() {
            if token.is_cancelled() {
                info!("🛑 详细建议生成已取消，已完成 {}/{}", idx, total);
                outcome.cancelled = true;
                break;
            }

            let status = item_status(idx, total, &item.verdict.name);
            let band = ScaledReporter::new(
                self.reporter.clone(),
                item_progress(idx, total),
                item_progress(idx + 1, total),
                status,
            );
            let controller = self.controller.with_reporter(Arc::new(band));

            let language = self.output_language.as_str();
            let request = GenerationRequest {
                system_prompt: system_prompt.clone(),
                image: artifact.image().cloned(),
                status: "Generating details".to_string(),
                prompt: |ctx: &RoundContext<'_>| {
                    prompts::details_round_prompt(
                        item.pillar,
                        item.question,
                        item.verdict,
                        artifact,
                        ctx.previous_content,
                        language,
                    )
                },
            };

            let mut accumulator = DetailAccumulator::new();
            match controller.run(&request, &mut accumulator, token).await {
                Ok(generated) => {
                    if !generated.content.trim().is_empty() {
                        parts.push(generated.content);
                    }
                    if generated.cancelled {
                        outcome.cancelled = true;
                        break;
                    }
                }
                Err(e) => {
                    warn!("⚠️ 最佳实践 '{}' 详细建议生成失败，跳过: {}", item.verdict.name, e);
                    outcome.partial = true;
                    outcome.failed_items.push(FailedItem {
                        name: item.verdict.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if parts.is_empty() && !outcome.cancelled {
            return Err(AppError::NothingGenerated(format!(
                "{} 个条目全部失败",
                outcome.failed_items.len()
            )));
        }

        if !outcome.cancelled {
            self.reporter.emit(ProgressEvent::Generation {
                status: "Details generation completed".to_string(),
                progress: 100,
            });
        }
        if outcome.partial {
            warn!(
                "⚠️ 部分结果: {} 个条目生成失败",
                outcome.failed_items.len()
            );
        }

        outcome.content = parts.join(ITEM_SEPARATOR);
        Ok(outcome)
    }
}
