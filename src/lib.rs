//! # WA Review
//!
//! 按 Well-Architected 最佳实践评审架构图或 IaC 模板，
//! 并通过多轮生成产出 IaC 模板和详细改进建议。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 模型层（Models）
//! - `models/` - 支柱、问题、判断、章节、制品等纯数据类型
//! - `models/loaders` - 从磁盘加载目录、工作负载答案和制品
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个请求
//! - `QuestionCatalog` - 单飞加载并缓存最佳实践目录
//! - `LlmService` / `KnowledgeBaseClient` - 推理与检索能力
//! - `response_parser` - 判断 / 章节 / 详细建议解析
//! - `CancellationController` - 评审与生成两个取消命名空间
//! - `ResultWriter` - 按制品 id 写结果能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个问题"的完整评审流程
//! - `QuestionCtx` - 上下文封装（支柱 + 问题序号）
//! - `QuestionFlow` - 流程编排（检索 → 推理 → 解析 → 绑定）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/review_orchestrator` - 遍历所有问题，处理取消和进度
//! - `orchestrator/chunked_generation` - 多轮生成状态机
//! - `orchestrator/app` - 应用入口，调度各阶段
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod prompts;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, FailurePolicy};
pub use error::{AppError, AppResult};
pub use models::{AnalysisResult, Artifact, DocumentSection, QuestionGroup, Verdict};
pub use orchestrator::{App, ChunkedGenerationController, ReviewOrchestrator};
pub use services::{CancelToken, CancellationController, Inference, ProgressEvent, ProgressReporter, Retrieval, RunKind};
pub use workflow::{QuestionCtx, QuestionFlow};
