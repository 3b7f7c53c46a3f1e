//! 外部协作方接口
//!
//! 编排器只依赖这两个 trait，具体实现（OpenAI 兼容接口、知识库 HTTP 服务、
//! 测试桩）在构造时注入。

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::artifact::ImageInput;
use crate::models::question::QuestionGroup;

/// 一次生成模型调用
#[async_trait]
pub trait Inference: Send + Sync {
    /// 返回模型的原始文本输出
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: &str,
        image: Option<&ImageInput>,
    ) -> AppResult<String>;
}

/// 知识库语义检索
#[async_trait]
pub trait Retrieval: Send + Sync {
    /// 返回与该问题相关的上下文片段
    async fn query(&self, pillar: &str, question: &QuestionGroup) -> AppResult<Vec<String>>;
}
