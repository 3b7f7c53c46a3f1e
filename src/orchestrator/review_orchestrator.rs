//! 评审编排器 - 编排层
//!
//! ## 职责
//!
//! 按"支柱顺序 → 问题发现顺序"依次评审所有问题：
//!
//! 1. 开始前一次性计算问题总数，保证进度分母不变
//! 2. 每个问题开始前检查取消（取消以问题为粒度）
//! 3. 每个问题前后各发一次进度事件，第二次 processed 加一
//! 4. 按失败策略处理单个问题的错误
//!
//! 推理调用严格串行，进度计数单调递增。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::FailurePolicy;
use crate::error::AppResult;
use crate::models::artifact::Artifact;
use crate::models::question::QuestionGroup;
use crate::models::verdict::AnalysisResult;
use crate::services::cancellation::CancelToken;
use crate::services::progress::{ProgressEvent, ProgressReporter};
use crate::services::question_catalog::{groups_for_pillar, QuestionCatalog};
use crate::workflow::{QuestionCtx, QuestionFlow};

/// 取消后最后一个进度事件的标签
pub const ANALYSIS_CANCELLED_LABEL: &str = "Analysis cancelled";

/// `FailurePolicy::Skip` 下被跳过的问题
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFailure {
    pub question_id: String,
    pub question: String,
    pub error: String,
}

/// 一次评审的结果
#[derive(Debug, Clone, Default)]
pub struct ReviewOutcome {
    pub result: AnalysisResult,
    pub cancelled: bool,
    pub total_questions: usize,
    pub processed_questions: usize,
    pub failures: Vec<QuestionFailure>,
}

/// 评审编排器
pub struct ReviewOrchestrator {
    catalog: Arc<QuestionCatalog>,
    flow: QuestionFlow,
    reporter: Arc<dyn ProgressReporter>,
    failure_policy: FailurePolicy,
    workload_ref: Option<String>,
}

impl ReviewOrchestrator {
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        flow: QuestionFlow,
        reporter: Arc<dyn ProgressReporter>,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            catalog,
            flow,
            reporter,
            failure_policy,
            workload_ref: None,
        }
    }

    /// 用该工作负载的元数据联接最佳实践 id
    pub fn with_workload(mut self, workload_ref: Option<String>) -> Self {
        self.workload_ref = workload_ref;
        self
    }

    /// 评审制品
    ///
    /// 取消不是错误：返回 `cancelled = true` 和已累积的结果。
    /// `FailurePolicy::Abort` 下任何问题失败都会终止整次运行，已累积结果丢弃。
    pub async fn run(
        &self,
        artifact: &Artifact,
        categories: &[String],
        token: &CancelToken,
    ) -> AppResult<ReviewOutcome> {
        let groups = self.catalog.load(self.workload_ref.as_deref()).await?;
        let selected: Vec<&QuestionGroup> = categories
            .iter()
            .flat_map(|category| {
                let found = groups_for_pillar(&groups, category);
                if found.is_empty() {
                    warn!("⚠️ 支柱 '{}' 在目录中没有问题", category);
                }
                found
            })
            .collect();

        let total = selected.len();
        info!("📋 共 {} 个问题待评审 (支柱: {})", total, categories.join(", "));

        let mut outcome = ReviewOutcome {
            total_questions: total,
            ..Default::default()
        };

        for (idx, group) in selected.iter().enumerate() {
            if token.is_cancelled() {
                info!("🛑 评审已取消，已完成 {}/{}", outcome.processed_questions, total);
                self.emit(outcome.processed_questions, total, &group.pillar_name, ANALYSIS_CANCELLED_LABEL);
                outcome.cancelled = true;
                return Ok(outcome);
            }

            let ctx = QuestionCtx::new(group.pillar_name.clone(), idx + 1, total, group.question_id.clone());
            self.emit(outcome.processed_questions, total, &group.pillar_name, &group.title);

            match self.flow.run(artifact, group, &ctx).await {
                Ok(entry) => outcome.result.push(entry),
                Err(e) => match self.failure_policy {
                    FailurePolicy::Abort => {
                        error!("{} ❌ 评审失败，终止本次运行: {}", ctx, e);
                        return Err(e);
                    }
                    FailurePolicy::Skip => {
                        warn!("{} ⚠️ 评审失败，跳过: {}", ctx, e);
                        outcome.failures.push(QuestionFailure {
                            question_id: group.question_id.clone(),
                            question: group.title.clone(),
                            error: e.to_string(),
                        });
                    }
                },
            }

            outcome.processed_questions += 1;
            self.emit(outcome.processed_questions, total, &group.pillar_name, &group.title);
        }

        info!(
            "✓ 评审完成: {}/{} 个问题，{} 个失败",
            outcome.result.len(),
            total,
            outcome.failures.len()
        );
        Ok(outcome)
    }

    fn emit(&self, processed: usize, total: usize, pillar: &str, question: &str) {
        self.reporter.emit(ProgressEvent::Analysis {
            processed_questions: processed,
            total_questions: total,
            current_pillar: pillar.to_string(),
            current_question: question.to_string(),
        });
    }
}
