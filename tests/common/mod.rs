//! 集成测试共用的脚本化协作方

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use wa_review::error::{AppError, AppResult};
use wa_review::models::artifact::{Artifact, ArtifactContent, ImageInput, UploadMode};
use wa_review::models::question::{AnswerSummary, CatalogEntry, QuestionGroup};
use wa_review::services::inference::{Inference, Retrieval};
use wa_review::services::progress::ProgressEvent;
use wa_review::services::question_catalog::{CatalogSource, QuestionCatalog};

/// 脚本中的一步
pub enum Reply {
    Text(String),
    Fail(&'static str),
    /// 直到 `release` 被通知才返回
    Blocked { text: String, release: Arc<Notify> },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }
}

/// 按顺序返回预设回复的推理服务
pub struct ScriptedInference {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String, bool)>>,
    started: Option<mpsc::UnboundedSender<usize>>,
}

impl ScriptedInference {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            started: None,
        }
    }

    /// 每次调用开始时把调用序号（从 1 开始）发到通道
    pub fn with_start_signal(mut self) -> (Self, mpsc::UnboundedReceiver<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.started = Some(tx);
        (self, rx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    /// (prompt, system_prompt, 是否带图片)
    pub fn prompts(&self) -> Vec<(String, String, bool)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Inference for ScriptedInference {
    async fn invoke(&self, prompt: &str, system_prompt: &str, image: Option<&ImageInput>) -> AppResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), system_prompt.to_string(), image.is_some()));
        if let Some(tx) = &self.started {
            let _ = tx.send(call);
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(reason)) => Err(AppError::inference("scripted", reason)),
            Some(Reply::Blocked { text, release }) => {
                release.notified().await;
                Ok(text)
            }
            None => Err(AppError::inference("scripted", "script exhausted")),
        }
    }
}

/// 固定返回片段的检索服务
pub struct StaticRetrieval(pub Vec<String>);

#[async_trait]
impl Retrieval for StaticRetrieval {
    async fn query(&self, _pillar: &str, _question: &QuestionGroup) -> AppResult<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// 内存中的目录来源
pub struct MemoryCatalog {
    pub entries: Vec<CatalogEntry>,
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }

    async fn load_answers(&self, _workload_id: &str) -> AppResult<Option<Vec<AnswerSummary>>> {
        Ok(None)
    }
}

pub fn entry(pillar: &str, question: &str, best_practice: &str) -> CatalogEntry {
    CatalogEntry {
        pillar: pillar.to_string(),
        question: question.to_string(),
        best_practice: best_practice.to_string(),
    }
}

pub fn catalog(entries: Vec<CatalogEntry>) -> Arc<QuestionCatalog> {
    Arc::new(QuestionCatalog::new(Arc::new(MemoryCatalog { entries })))
}

pub fn template_artifact() -> Artifact {
    Artifact {
        id: "template-20250101000000".to_string(),
        name: "template.yaml".to_string(),
        content: ArtifactContent::Text("Resources:\n  Bucket:\n    Type: AWS::S3::Bucket".to_string()),
        upload_mode: UploadMode::Single,
        supporting_doc: None,
    }
}

pub fn diagram_artifact() -> Artifact {
    Artifact {
        id: "diagram-20250101000000".to_string(),
        name: "diagram.png".to_string(),
        content: ArtifactContent::Image(ImageInput::from_bytes("image/png", b"\x89PNG")),
        upload_mode: UploadMode::Single,
        supporting_doc: None,
    }
}

/// 取出通道中已有的全部事件
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// 只保留生成事件的 (status, progress)
pub fn generation_events(events: &[ProgressEvent]) -> Vec<(String, u8)> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Generation { status, progress } => Some((status.clone(), *progress)),
            _ => None,
        })
        .collect()
}
