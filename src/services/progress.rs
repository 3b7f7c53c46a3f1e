//! 进度上报
//!
//! 编排器把结构化事件推给 `ProgressReporter`。上报是即发即弃的：
//! 实现不得阻塞，也不得向调用方返回错误。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// 进度事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// 评审进度，分母在整次运行中保持不变
    #[serde(rename_all = "camelCase")]
    Analysis {
        processed_questions: usize,
        total_questions: usize,
        current_pillar: String,
        current_question: String,
    },
    /// 生成进度（0-100）
    Generation { status: String, progress: u8 },
}

/// 进度接收端
pub trait ProgressReporter: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// 写入日志的默认实现
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Analysis {
                processed_questions,
                total_questions,
                current_pillar,
                current_question,
            } => info!(
                "📊 [{}/{}] {} - {}",
                processed_questions, total_questions, current_pillar, current_question
            ),
            ProgressEvent::Generation { status, progress } => {
                info!("⏳ [{:>3}%] {}", progress, status)
            }
        }
    }
}

/// 转发到无界通道，接收端关闭后静默丢弃
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressReporter for ChannelReporter {
    fn emit(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            debug!("进度接收端已关闭，丢弃事件");
        }
    }
}

/// 把内层生成进度映射到外层的一个区间
///
/// 多个条目依次生成时，第 i 个条目的 0-100 映射到 `[start, end]`，
/// 状态文本加上条目前缀。
pub struct ScaledReporter {
    inner: Arc<dyn ProgressReporter>,
    start: u8,
    end: u8,
    prefix: String,
}

impl ScaledReporter {
    pub fn new(inner: Arc<dyn ProgressReporter>, start: u8, end: u8, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            start: start.min(100),
            end: end.clamp(start.min(100), 100),
            prefix: prefix.into(),
        }
    }

    fn scale(&self, progress: u8) -> u8 {
        let span = u32::from(self.end - self.start);
        let scaled = u32::from(self.start) + span * u32::from(progress.min(100)) / 100;
        scaled as u8
    }
}

impl ProgressReporter for ScaledReporter {
    fn emit(&self, event: ProgressEvent) {
        let event = match event {
            ProgressEvent::Generation { status, progress } => ProgressEvent::Generation {
                status: format!("{} - {}", self.prefix, status),
                progress: self.scale(progress),
            },
            other => other,
        };
        self.inner.emit(event);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;

    #[test]
    fn test_scaled_reporter_maps_into_band() {
        let recorder = Arc::new(RecordingReporter::default());
        let scaled = ScaledReporter::new(recorder.clone(), 50, 75, "1/2");

        scaled.emit(ProgressEvent::Generation {
            status: "Generating".to_string(),
            progress: 0,
        });
        scaled.emit(ProgressEvent::Generation {
            status: "Done".to_string(),
            progress: 100,
        });

        assert_eq!(
            recorder.events(),
            vec![
                ProgressEvent::Generation {
                    status: "1/2 - Generating".to_string(),
                    progress: 50
                },
                ProgressEvent::Generation {
                    status: "1/2 - Done".to_string(),
                    progress: 75
                },
            ]
        );
    }

    #[test]
    fn test_channel_reporter_ignores_closed_receiver() {
        let (reporter, receiver) = ChannelReporter::new();
        drop(receiver);
        reporter.emit(ProgressEvent::Generation {
            status: "x".to_string(),
            progress: 1,
        });
    }

    #[test]
    fn test_analysis_event_serializes_camel_case() {
        let event = ProgressEvent::Analysis {
            processed_questions: 1,
            total_questions: 3,
            current_pillar: "Security".to_string(),
            current_question: "Q".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "analysis");
        assert_eq!(json["processedQuestions"], 1);
        assert_eq!(json["totalQuestions"], 3);
    }
}
