//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责阶段调度、取消与进度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 加载制品和辅助文档
//! - 按顺序调度评审、详细建议、IaC 生成
//! - 安装 Ctrl-C 取消
//! - 写入结果和状态
//!
//! ### `review_orchestrator` - 评审编排器
//! - 按支柱遍历所有问题（Vec<QuestionGroup>）
//! - 以问题为粒度检查取消
//! - 前后各发一次进度事件
//! - 按失败策略处理单个问题的错误
//!
//! ### `chunked_generation` - 多轮生成控制器
//! - 每轮调用推理并与取消信号竞争
//! - 累积章节或段落，直到完成标记
//! - 空转轮次上限，防止卡死
//!
//! ### `iac_generation` / `detail_expansion` - 生成的两种用法
//!
//! ## 层次关系
//!
//! ```text
//! app (评审 → 详细建议 → IaC)
//!     ↓
//! review_orchestrator (处理 Vec<QuestionGroup>)   chunked_generation (处理多轮)
//!     ↓                                               ↓
//! workflow::QuestionFlow (处理单个问题)              services (推理)
//!     ↓
//! services (能力层：catalog / knowledge base / llm / writer)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：review_orchestrator 管评审，chunked_generation 管生成
//! 2. **串行推理**：同一次运行内推理调用严格串行
//! 3. **向下依赖**：编排层 → workflow → services → models
//! 4. **取消不是错误**：通过 `cancelled` 标志返回

pub mod app;
pub mod chunked_generation;
pub mod detail_expansion;
pub mod iac_generation;
pub mod review_orchestrator;

// 重新导出主要类型
pub use app::App;
pub use chunked_generation::{
    with_cancellation_notice, ChunkAccumulator, ChunkedGenerationController, DetailAccumulator,
    GenerationOutcome, GenerationRequest, GenerationSettings, RoundContext, RoundOutcome, RoundPrompt,
    SectionAccumulator,
};
pub use detail_expansion::{DetailExpansion, DetailsOutcome};
pub use iac_generation::{generate_iac, IacOutcome};
pub use review_orchestrator::{QuestionFailure, ReviewOrchestrator, ReviewOutcome};
