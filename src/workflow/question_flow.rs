//! 问题处理流程 - 流程层
//!
//! 核心职责：定义"一个问题"的完整评审流程
//!
//! 流程顺序：
//! 1. 知识库检索
//! 2. 构建提示词 → 推理
//! 3. 解析判断 → 按位置绑定最佳实践 id

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::models::artifact::Artifact;
use crate::models::question::{slugify, QuestionGroup};
use crate::models::verdict::{AnalysisEntry, ModelVerdict, Verdict};
use crate::prompts;
use crate::services::inference::{Inference, Retrieval};
use crate::services::response_parser;
use crate::workflow::question_ctx::QuestionCtx;

/// 问题处理流程
///
/// - 编排单个问题的检索、推理和解析
/// - 不检查取消（取消以问题为粒度，由编排层负责）
/// - 不捕获错误，失败策略由编排层决定
pub struct QuestionFlow {
    retrieval: Arc<dyn Retrieval>,
    inference: Arc<dyn Inference>,
    output_language: String,
    verbose_logging: bool,
}

impl QuestionFlow {
    pub fn new(
        retrieval: Arc<dyn Retrieval>,
        inference: Arc<dyn Inference>,
        output_language: impl Into<String>,
        verbose_logging: bool,
    ) -> Self {
        Self {
            retrieval,
            inference,
            output_language: output_language.into(),
            verbose_logging,
        }
    }

    pub async fn run(
        &self,
        artifact: &Artifact,
        group: &QuestionGroup,
        ctx: &QuestionCtx,
    ) -> AppResult<AnalysisEntry> {
        info!("{} 🔍 检索知识库: {}", ctx, group.title);
        let snippets = self.retrieval.query(&group.pillar_name, group).await?;
        debug!("{} 知识库片段: {}", ctx, snippets.len());

        let system_prompt = prompts::analysis_system_prompt(artifact, group);
        let prompt = prompts::analysis_prompt(artifact, group, &snippets, &self.output_language);

        info!("{} 🤖 评审 {} 个最佳实践...", ctx, group.best_practices.len());
        let raw = self
            .inference
            .invoke(&prompt, &system_prompt, artifact.image())
            .await?;

        if self.verbose_logging {
            debug!("{} 模型原始输出: {}", ctx, raw);
        }

        let model_verdicts = response_parser::parse_verdicts(&raw, group.best_practices.len())?;
        let (verdicts, mismatch) = bind_verdicts(group, model_verdicts);
        if mismatch {
            warn!(
                "{} ⚠️ 判断数量 {} 与最佳实践数量 {} 不一致，已按位置绑定",
                ctx,
                verdicts.len(),
                group.best_practices.len()
            );
        }

        let attention = verdicts.iter().filter(|v| v.needs_attention()).count();
        info!("{} ✓ 完成，{} 个待改进", ctx, attention);

        Ok(AnalysisEntry {
            pillar: group.pillar_name.clone(),
            question: group.title.clone(),
            question_id: group.question_id.clone(),
            verdicts,
            verdict_count_mismatch: mismatch,
        })
    }
}

/// 按位置把模型判断绑定到最佳实践 id
///
/// 多出的判断没有对应的最佳实践，用 `slug("{question}-{name}")` 作为 id。
/// 返回值的第二项表示数量是否不一致。
pub fn bind_verdicts(group: &QuestionGroup, model_verdicts: Vec<ModelVerdict>) -> (Vec<Verdict>, bool) {
    let mismatch = model_verdicts.len() != group.best_practices.len();

    let verdicts = model_verdicts
        .into_iter()
        .enumerate()
        .map(|(idx, model)| {
            let id = match group.best_practices.get(idx) {
                Some(bp) => bp.id.clone(),
                None => slugify(&format!("{}-{}", group.title, model.name)),
            };
            Verdict::from_model(id, model)
        })
        .collect();

    (verdicts, mismatch)
}
