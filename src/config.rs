use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// 单个问题失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// 第一个失败的问题终止整个评审（已累积结果丢弃）
    Abort,
    /// 记录失败并继续下一个问题
    Skip,
}

impl FailurePolicy {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Some(FailurePolicy::Abort),
            "skip" => Some(FailurePolicy::Skip),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    // --- 知识库配置 ---
    pub knowledge_base_url: String,
    pub knowledge_base_id: String,
    /// 每次检索返回的片段数量
    pub knowledge_base_results: usize,
    // --- 目录配置 ---
    /// 最佳实践目录 JSON 文件
    pub catalog_path: String,
    /// 工作负载答案目录，文件名为 `{workload_id}.json`
    pub workload_answers_dir: Option<String>,
    // --- 本次运行输入 ---
    pub artifact_path: String,
    pub workload_id: Option<String>,
    pub selected_pillars: Vec<String>,
    /// `single` 或 `project`
    pub upload_mode: String,
    /// 为空时不生成 IaC 模板
    pub iac_template_type: Option<String>,
    /// 是否为未落实的最佳实践生成详细建议
    pub expand_details: bool,
    pub supporting_doc_path: Option<String>,
    pub supporting_doc_description: Option<String>,
    // --- 行为配置 ---
    pub output_language: String,
    /// 连续多少轮无新内容视为卡死
    pub max_no_op_rounds: usize,
    /// 两轮生成之间的等待时间（毫秒）
    pub round_delay_ms: u64,
    pub question_failure_policy: FailurePolicy,
    // --- 输出配置 ---
    pub output_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_max_tokens: 4096,
            llm_temperature: 0.7,
            knowledge_base_url: "http://localhost:8080".to_string(),
            knowledge_base_id: "well-architected".to_string(),
            knowledge_base_results: 10,
            catalog_path: "data/well_architected_best_practices.json".to_string(),
            workload_answers_dir: None,
            artifact_path: String::new(),
            workload_id: None,
            selected_pillars: vec!["security".to_string()],
            upload_mode: "single".to_string(),
            iac_template_type: None,
            expand_details: false,
            supporting_doc_path: None,
            supporting_doc_description: None,
            output_language: "en".to_string(),
            max_no_op_rounds: 3,
            round_delay_ms: 1000,
            question_failure_policy: FailurePolicy::Abort,
            output_dir: "output".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 优先读取 `WA_REVIEW_CONFIG` 指向的 TOML 文件，否则从环境变量构建
    pub fn load() -> AppResult<Self> {
        match std::env::var("WA_REVIEW_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path),
            _ => Ok(Self::from_env()),
        }
    }

    /// 从 TOML 文件加载配置，缺省字段使用默认值
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("无法解析 {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            llm_api_key: env_or("LLM_API_KEY", default.llm_api_key),
            llm_api_base_url: env_or("LLM_API_BASE_URL", default.llm_api_base_url),
            llm_model_name: env_or("LLM_MODEL_NAME", default.llm_model_name),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(default.llm_max_tokens),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(default.llm_temperature),
            knowledge_base_url: env_or("KNOWLEDGE_BASE_URL", default.knowledge_base_url),
            knowledge_base_id: env_or("KNOWLEDGE_BASE_ID", default.knowledge_base_id),
            knowledge_base_results: env_parse("KNOWLEDGE_BASE_RESULTS").unwrap_or(default.knowledge_base_results),
            catalog_path: env_or("CATALOG_PATH", default.catalog_path),
            workload_answers_dir: env_opt("WORKLOAD_ANSWERS_DIR"),
            artifact_path: env_or("ARTIFACT_PATH", default.artifact_path),
            workload_id: env_opt("WORKLOAD_ID"),
            selected_pillars: env_opt("SELECTED_PILLARS")
                .map(|v| split_list(&v))
                .unwrap_or(default.selected_pillars),
            upload_mode: env_or("UPLOAD_MODE", default.upload_mode),
            iac_template_type: env_opt("IAC_TEMPLATE_TYPE"),
            expand_details: env_parse("EXPAND_DETAILS").unwrap_or(default.expand_details),
            supporting_doc_path: env_opt("SUPPORTING_DOC_PATH"),
            supporting_doc_description: env_opt("SUPPORTING_DOC_DESCRIPTION"),
            output_language: env_or("OUTPUT_LANGUAGE", default.output_language),
            max_no_op_rounds: env_parse("MAX_NO_OP_ROUNDS").unwrap_or(default.max_no_op_rounds),
            round_delay_ms: env_parse("ROUND_DELAY_MS").unwrap_or(default.round_delay_ms),
            question_failure_policy: env_opt("QUESTION_FAILURE_POLICY")
                .and_then(|v| FailurePolicy::parse(&v))
                .unwrap_or(default.question_failure_policy),
            output_dir: env_or("OUTPUT_DIR", default.output_dir),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 检查互相依赖的配置项
    pub fn validate(&self) -> AppResult<()> {
        if self.max_no_op_rounds == 0 {
            return Err(AppError::Config("max_no_op_rounds 必须大于 0".to_string()));
        }
        if self.selected_pillars.is_empty() {
            return Err(AppError::Config("至少需要选择一个支柱".to_string()));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
