//! 知识库检索服务 - 业务能力层
//!
//! `Retrieval` 的 HTTP 实现，请求/响应结构与 Bedrock Retrieve 接口一致：
//! `POST {base}/knowledgebases/{id}/retrieve`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::question::QuestionGroup;
use crate::prompts;
use crate::services::inference::Retrieval;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Debug, Deserialize)]
struct RetrievalResult {
    content: RetrievalContent,
}

#[derive(Debug, Deserialize)]
struct RetrievalContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest {
    retrieval_query: serde_json::Value,
    retrieval_configuration: serde_json::Value,
}

/// 知识库客户端
pub struct KnowledgeBaseClient {
    client: Client,
    endpoint: String,
    number_of_results: usize,
}

impl KnowledgeBaseClient {
    pub fn new(config: &Config) -> Self {
        let endpoint = format!(
            "{}/knowledgebases/{}/retrieve",
            config.knowledge_base_url.trim_end_matches('/'),
            config.knowledge_base_id
        );
        Self {
            client: Client::builder()
                .user_agent(concat!("wa-review/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            endpoint,
            number_of_results: config.knowledge_base_results,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, text: String) -> RetrieveRequest {
        RetrieveRequest {
            retrieval_query: json!({ "text": text }),
            retrieval_configuration: json!({
                "vectorSearchConfiguration": { "numberOfResults": self.number_of_results }
            }),
        }
    }
}

/// 只保留非空片段
fn extract_snippets(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let response: RetrieveResponse = serde_json::from_str(body)?;
    Ok(response
        .retrieval_results
        .into_iter()
        .map(|r| r.content.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

#[async_trait]
impl Retrieval for KnowledgeBaseClient {
    async fn query(&self, pillar: &str, question: &QuestionGroup) -> AppResult<Vec<String>> {
        let text = prompts::knowledge_base_query(pillar, question);
        debug!("检索知识库: {} ({} 字符)", question.title, text.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| AppError::retrieval(&self.endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::retrieval(&self.endpoint, e))?;

        if !status.is_success() {
            warn!("知识库返回错误状态: {}", status);
            return Err(AppError::retrieval(
                &self.endpoint,
                format!("HTTP {}: {}", status, crate::utils::logging::truncate_text(&body, 200)),
            ));
        }

        let snippets =
            extract_snippets(&body).map_err(|e| AppError::retrieval(&self.endpoint, e))?;
        debug!("知识库返回 {} 个片段", snippets.len());
        Ok(snippets)
    }
}
