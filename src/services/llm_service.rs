//! LLM 服务 - 业务能力层
//!
//! `Inference` 的默认实现，只负责"调用一次模型"，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Bedrock 网关, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::artifact::ImageInput;
use crate::services::inference::Inference;

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 完成一次推理
/// - 图片以 data URL 附加到用户消息
/// - 不解析输出，不重试，不关心取消
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（为空时不发送）
    /// - `image`: 可选图片，会追加到用户消息中
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: &str,
        image: Option<&ImageInput>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let messages = self
            .build_messages(user_message, system_message, image)
            .map_err(|e| AppError::inference(&self.model_name, e))?;

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| AppError::inference(&self.model_name, e))?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::inference(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::inference(&self.model_name, "LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }

    /// 构建消息列表：系统消息 + 用户消息（可带图片）
    fn build_messages(
        &self,
        user_message: &str,
        system_message: &str,
        image: Option<&ImageInput>,
    ) -> Result<Vec<ChatCompletionRequestMessage>, async_openai::error::OpenAIError> {
        let mut messages = Vec::new();

        if !system_message.trim().is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(system_message)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match image {
            Some(image) => {
                // 使用 Vision API：文本 + 图片
                let content_parts = vec![
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText {
                            text: user_message.to_string(),
                        },
                    ),
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: image.data_url(),
                                detail: Some(ImageDetail::High),
                            },
                        },
                    ),
                ];

                debug!("使用 Vision API，图片类型: {}", image.media_type);

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(
                        content_parts,
                    ))
                    .build()?
            }
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));
        Ok(messages)
    }
}

#[async_trait]
impl Inference for LlmService {
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: &str,
        image: Option<&ImageInput>,
    ) -> AppResult<String> {
        self.send_to_llm(prompt, system_prompt, image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> LlmService {
        let config = Config {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or_else(|_| "gpt-4o".to_string()),
            ..Config::default()
        };
        LlmService::new(&config)
    }

    #[test]
    fn test_build_messages_text_only() {
        let service = create_test_service();
        let messages = service.build_messages("hello", "system", None).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_build_messages_skips_empty_system_and_attaches_image() {
        let service = create_test_service();
        let image = ImageInput::from_bytes("image/png", b"png");
        let messages = service.build_messages("describe", "  ", Some(&image)).unwrap();
        assert_eq!(messages.len(), 1);

        let ChatCompletionRequestMessage::User(user) = &messages[0] else {
            panic!("expected user message");
        };
        let ChatCompletionRequestUserMessageContent::Array(parts) = &user.content else {
            panic!("expected multi-part content");
        };
        assert_eq!(parts.len(), 2);
    }

    /// 测试通用 LLM 调用
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_send_to_llm_simple -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_send_to_llm_simple() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();

        println!("\n========== 测试通用 LLM 调用 ==========");
        let result = service
            .send_to_llm(
                "List two AWS Well-Architected pillars.",
                "You are a concise assistant.",
                None,
            )
            .await;

        match result {
            Ok(response) => {
                println!("\n========== LLM 响应 ==========");
                println!("{}", response);
                println!("==============================\n");
                assert!(!response.is_empty());
            }
            Err(e) => {
                println!("❌ LLM 调用失败: {}", e);
                panic!("测试失败: {}", e);
            }
        }
    }
}
