//! IaC 模板生成 - 编排层
//!
//! 根据架构图和评审中"相关但未落实"的最佳实践，按章节多轮生成整份模板。

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::artifact::{Artifact, IacTemplateType};
use crate::models::verdict::AnalysisResult;
use crate::orchestrator::chunked_generation::{
    with_cancellation_notice, ChunkedGenerationController, GenerationRequest, RoundContext,
    SectionAccumulator,
};
use crate::prompts;
use crate::services::cancellation::CancelToken;

/// IaC 生成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IacOutcome {
    pub template_type: IacTemplateType,
    /// 取消时带有取消说明前缀
    pub content: String,
    pub cancelled: bool,
}

/// 生成 IaC 模板
///
/// 只支持图片制品；文本制品本身就是模板，返回 `InvalidArtifact`。
pub async fn generate_iac(
    controller: &ChunkedGenerationController,
    artifact: &Artifact,
    result: &AnalysisResult,
    template_type: IacTemplateType,
    token: &CancelToken,
) -> AppResult<IacOutcome> {
    let Some(image) = artifact.image() else {
        return Err(AppError::InvalidArtifact(format!(
            "IaC 模板只能从架构图生成: {}",
            artifact.name
        )));
    };

    let recommendations = result.needing_attention();
    info!(
        "🏗️ 生成 {} 模板，应用 {} 条建议",
        template_type.display_name(),
        recommendations.len()
    );

    let supporting_doc = artifact.supporting_doc.as_ref();
    let request = GenerationRequest {
        system_prompt: prompts::iac_system_prompt(template_type),
        image: Some(image.clone()),
        status: format!("Generating {} template", template_type.display_name()),
        prompt: |ctx: &RoundContext<'_>| {
            prompts::iac_round_prompt(
                ctx.previous_units,
                ctx.previous_content,
                &recommendations,
                supporting_doc,
            )
        },
    };

    let mut accumulator = SectionAccumulator::new();
    let outcome = controller.run(&request, &mut accumulator, token).await?;

    let content = if outcome.cancelled {
        with_cancellation_notice(&outcome.content)
    } else {
        outcome.content
    };

    Ok(IacOutcome {
        template_type,
        content,
        cancelled: outcome.cancelled,
    })
}
