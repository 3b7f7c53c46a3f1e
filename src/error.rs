use thiserror::Error;

/// 应用程序错误类型
///
/// 取消不是错误：编排器通过 `cancelled` 标志返回，而不是 `Err`。
#[derive(Debug, Error)]
pub enum AppError {
    /// 最佳实践目录无法加载（目录文件或工作负载元数据读取失败）
    #[error("最佳实践目录不可用: {reason}")]
    CatalogUnavailable {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 模型输出无法解析为预期结构
    #[error("模型输出格式错误: {reason} (片段: {snippet})")]
    MalformedModelOutput { reason: String, snippet: String },

    /// 推理服务调用失败
    #[error("推理调用失败 (模型: {model}): {source}")]
    InferenceFailure {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 知识库检索失败
    #[error("知识库检索失败 ({endpoint}): {source}")]
    RetrievalFailure {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 连续多轮没有新内容，判定生成卡死
    #[error("生成卡死: 连续 {no_op_rounds} 轮没有新内容 (共 {rounds} 轮)")]
    StuckGeneration { no_op_rounds: usize, rounds: usize },

    /// 所有条目都未能生成任何内容
    #[error("没有生成任何内容: {0}")]
    NothingGenerated(String),

    /// 输入的制品不符合操作要求
    #[error("制品无效: {0}")]
    InvalidArtifact(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 文件读写错误
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建目录不可用错误
    pub fn catalog_unavailable(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::CatalogUnavailable {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 创建模型输出格式错误，片段会被截断
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        AppError::MalformedModelOutput {
            reason: reason.into(),
            snippet: crate::utils::logging::truncate_text(raw, 200),
        }
    }

    /// 创建推理调用错误
    pub fn inference(
        model: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AppError::InferenceFailure {
            model: model.into(),
            source: source.into(),
        }
    }

    /// 创建知识库检索错误
    pub fn retrieval(
        endpoint: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AppError::RetrievalFailure {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    /// 创建文件错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
