//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：创建 LLM / 知识库客户端、目录缓存、取消控制器
//! 2. **加载输入**：制品与可选的辅助文档
//! 3. **阶段调度**：评审 → 详细建议（可选）→ IaC 模板（可选）
//! 4. **取消**：Ctrl-C 同时取消评审和生成两个命名空间
//! 5. **结果落盘**：每个阶段完成即写入，最后写 `status.json`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::artifact::{Artifact, IacTemplateType, UploadMode};
use crate::models::loaders::{load_artifact, load_supporting_doc};
use crate::orchestrator::chunked_generation::{ChunkedGenerationController, GenerationSettings};
use crate::orchestrator::detail_expansion::DetailExpansion;
use crate::orchestrator::iac_generation::generate_iac;
use crate::orchestrator::review_orchestrator::{ReviewOrchestrator, ReviewOutcome};
use crate::services::cancellation::{CancellationController, RunKind};
use crate::services::inference::{Inference, Retrieval};
use crate::services::knowledge_base::KnowledgeBaseClient;
use crate::services::llm_service::LlmService;
use crate::services::progress::{ProgressReporter, TracingReporter};
use crate::services::question_catalog::{FileCatalogSource, QuestionCatalog};
use crate::services::result_writer::{ResultWriter, RunStatus};
use crate::utils::logging;
use crate::workflow::QuestionFlow;

/// 应用主结构
pub struct App {
    config: Config,
    upload_mode: UploadMode,
    template_type: Option<IacTemplateType>,
    catalog: Arc<QuestionCatalog>,
    inference: Arc<dyn Inference>,
    retrieval: Arc<dyn Retrieval>,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: Arc<CancellationController>,
    writer: ResultWriter,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        let upload_mode = UploadMode::parse(&config.upload_mode)
            .with_context(|| format!("未知的上传模式: {}", config.upload_mode))?;
        let template_type = match config.iac_template_type.as_deref() {
            Some(raw) => Some(
                IacTemplateType::parse(raw).with_context(|| format!("未知的模板类型: {}", raw))?,
            ),
            None => None,
        };

        let llm = LlmService::new(&config);
        let knowledge_base = KnowledgeBaseClient::new(&config);
        info!("✓ 客户端就绪 (模型: {}, 知识库: {})", llm.model_name(), knowledge_base.endpoint());

        let catalog = Arc::new(QuestionCatalog::new(Arc::new(FileCatalogSource::new(&config))));
        let writer = ResultWriter::new(&config.output_dir);

        Ok(Self {
            config,
            upload_mode,
            template_type,
            catalog,
            inference: Arc::new(llm),
            retrieval: Arc::new(knowledge_base),
            reporter: Arc::new(TracingReporter),
            cancellation: Arc::new(CancellationController::new()),
            writer,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        logging::log_startup(&self.config);

        let artifact = self.load_input().await?;
        let ctrl_c = self.spawn_ctrl_c_handler();

        let mut status = RunStatus {
            artifact_name: artifact.name.clone(),
            ..Default::default()
        };
        let outcome = self.run_stages(&artifact, &mut status).await;
        ctrl_c.abort();

        if let Err(e) = &outcome {
            error!("❌ 运行失败: {:#}", e);
            status.fail(format!("{:#}", e));
        } else {
            status.settle();
        }
        let path = self.writer.write_status(&artifact.id, &status).await?;
        info!("💾 状态已写入: {}", path.display());

        outcome
    }

    async fn load_input(&self) -> Result<Artifact> {
        let mut artifact = load_artifact(Path::new(&self.config.artifact_path), self.upload_mode)
            .await
            .with_context(|| format!("无法加载制品: {}", self.config.artifact_path))?;

        if let Some(doc_path) = &self.config.supporting_doc_path {
            let description = self.config.supporting_doc_description.as_deref().unwrap_or("");
            let doc = load_supporting_doc(Path::new(doc_path), description)
                .await
                .with_context(|| format!("无法加载辅助文档: {}", doc_path))?;
            artifact.supporting_doc = Some(doc);
        }

        info!("✓ 制品已加载: {} (id: {})", artifact.name, artifact.id);
        Ok(artifact)
    }

    /// Ctrl-C 中断整个运行，处理器在运行结束前一直监听
    fn spawn_ctrl_c_handler(&self) -> tokio::task::JoinHandle<()> {
        let cancellation = self.cancellation.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 收到 Ctrl-C，取消当前运行...");
                cancellation.interrupt();
            }
        })
    }

    async fn run_stages(&self, artifact: &Artifact, status: &mut RunStatus) -> Result<()> {
        // 评审
        logging::log_stage_start("Well-Architected 评审");
        let review = self.review(artifact).await?;
        status.analysis_cancelled = review.cancelled;
        status.processed_questions = review.processed_questions;
        status.total_questions = review.total_questions;
        status.failed_questions = review.failures.iter().map(|f| f.question_id.clone()).collect();

        let path = self.writer.write_analysis(&artifact.id, &review.result).await?;
        info!("💾 评审结果已写入: {}", path.display());

        let needing_attention = review.result.needing_attention().len();
        let mut generation_cancelled = review.cancelled || self.cancellation.is_interrupted();

        let controller = ChunkedGenerationController::new(
            self.inference.clone(),
            self.reporter.clone(),
            GenerationSettings {
                max_no_op_rounds: self.config.max_no_op_rounds,
                round_delay: Duration::from_millis(self.config.round_delay_ms),
            },
        );

        // 详细建议
        if self.config.expand_details && generation_cancelled {
            info!("⏭️ 已取消，跳过详细建议");
            status.details_cancelled = Some(true);
        } else if self.config.expand_details {
            if needing_attention == 0 {
                info!("✓ 没有相关但未落实的最佳实践，跳过详细建议");
            } else {
                logging::log_stage_start("详细建议");
                let token = self.cancellation.begin_run(RunKind::Generation);
                let details = DetailExpansion::new(&controller, self.reporter.clone(), &self.config.output_language)
                    .with_template_type(self.template_type)
                    .run(artifact, &review.result, &token)
                    .await?;

                status.details_cancelled = Some(details.cancelled);
                status.failed_details = details.failed_items.iter().map(|f| f.name.clone()).collect();
                generation_cancelled = details.cancelled || self.cancellation.is_interrupted();

                let path = self.writer.write_details(&artifact.id, &details.content).await?;
                info!("💾 详细建议已写入: {}", path.display());
            }
        }

        // IaC 模板
        if let Some(template_type) = self.template_type {
            if generation_cancelled {
                info!("⏭️ 已取消，跳过 IaC 模板生成");
                status.iac_cancelled = Some(true);
            } else if !artifact.is_image() {
                warn!("⚠️ IaC 模板只能从架构图生成，跳过");
            } else {
                logging::log_stage_start("IaC 模板生成");
                let token = self.cancellation.begin_run(RunKind::Generation);
                let iac = generate_iac(&controller, artifact, &review.result, template_type, &token).await?;
                status.iac_cancelled = Some(iac.cancelled);

                let path = self.writer.write_iac(&artifact.id, template_type, &iac.content).await?;
                info!("💾 IaC 模板已写入: {}", path.display());
            }
        }

        logging::print_final_stats(
            review.result.len(),
            review.failures.len(),
            needing_attention,
            &self.writer.artifact_dir(&artifact.id).display().to_string(),
        );
        Ok(())
    }

    async fn review(&self, artifact: &Artifact) -> Result<ReviewOutcome> {
        let flow = QuestionFlow::new(
            self.retrieval.clone(),
            self.inference.clone(),
            &self.config.output_language,
            self.config.verbose_logging,
        );
        let orchestrator = ReviewOrchestrator::new(
            self.catalog.clone(),
            flow,
            self.reporter.clone(),
            self.config.question_failure_policy,
        )
        .with_workload(self.config.workload_id.clone());

        let token = self.cancellation.begin_run(RunKind::Review);
        let outcome = orchestrator
            .run(artifact, &self.config.selected_pillars, &token)
            .await?;
        logging::log_review_complete(
            outcome.processed_questions,
            outcome.total_questions,
            outcome.failures.len(),
            outcome.cancelled,
        );
        Ok(outcome)
    }
}
