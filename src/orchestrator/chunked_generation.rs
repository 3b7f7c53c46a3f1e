//! 多轮生成控制器 - 编排层
//!
//! 单次模型调用写不完的长文档（IaC 模板、详细建议）通过多轮调用完成：
//! 每轮把已生成内容放回提示词，直到输出中出现完成标记。
//!
//! 状态：`RUNNING → {RUNNING, COMPLETE, CANCELLED, FAILED}`
//!
//! - 每轮开始前发进度事件，完成前进度封顶 90%，完成时强制 100%
//! - 推理调用与取消信号竞争；取消先到则立即返回已累积内容，
//!   进行中的调用被放弃，结果到达后直接丢弃
//! - 连续 `max_no_op_rounds` 轮没有新内容视为卡死

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::artifact::ImageInput;
use crate::models::section::{join_sections, DocumentSection};
use crate::services::cancellation::CancelToken;
use crate::services::inference::Inference;
use crate::services::progress::{ProgressEvent, ProgressReporter};
use crate::services::response_parser::{parse_chunk, parse_detail_chunk};

/// 完成前的进度上限
pub const PROGRESS_CAP: u8 = 90;

/// IaC 模板取消后加在开头的说明
pub const CANCELLATION_NOTICE: &str =
    "# Note: Template generation was cancelled. Below is a partial version.\n\n";

/// 给部分结果加上取消说明
pub fn with_cancellation_notice(content: &str) -> String {
    format!("{}{}", CANCELLATION_NOTICE, content)
}

/// 第 `iteration` 轮开始时的进度估计
pub fn progress_estimate(iteration: usize) -> u8 {
    iteration.saturating_mul(10).min(PROGRESS_CAP as usize) as u8
}

/// 构建下一轮提示词时可用的信息
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    pub iteration: usize,
    /// 已累积的单元数（章节数或段落数）
    pub previous_units: usize,
    /// 已累积内容的序列化形式
    pub previous_content: &'a str,
}

/// 每轮提示词
pub trait RoundPrompt: Send + Sync {
    fn build(&self, ctx: &RoundContext<'_>) -> String;
}

impl<F> RoundPrompt for F
where
    F: Fn(&RoundContext<'_>) -> String + Send + Sync,
{
    fn build(&self, ctx: &RoundContext<'_>) -> String {
        self(ctx)
    }
}

/// 一次多轮生成请求
pub struct GenerationRequest<P> {
    pub system_prompt: String,
    pub image: Option<ImageInput>,
    /// 进度事件中的状态文本
    pub status: String,
    pub prompt: P,
}

/// 一轮解析后的变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub complete: bool,
    /// 本轮新增的单元数，0 表示空转
    pub added: usize,
}

/// 多轮生成的累积器
pub trait ChunkAccumulator: Send {
    /// 解析一轮原始输出并追加
    fn absorb(&mut self, raw: &str) -> RoundOutcome;
    fn unit_count(&self) -> usize;
    /// 放回下一轮提示词的"已生成内容"
    fn previous_content(&self) -> String;
    /// 最终文档
    fn finish(&self) -> String;
}

/// 按章节累积（IaC 模板）
///
/// 截断标记只表示"还有后续章节"，本轮的章节全部保留。
#[derive(Debug, Default)]
pub struct SectionAccumulator {
    sections: Vec<DocumentSection>,
}

impl SectionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &[DocumentSection] {
        &self.sections
    }
}

impl ChunkAccumulator for SectionAccumulator {
    fn absorb(&mut self, raw: &str) -> RoundOutcome {
        let chunk = parse_chunk(raw);
        let added = chunk.sections.len();
        self.sections.extend(chunk.sections);
        RoundOutcome {
            complete: chunk.complete,
            added,
        }
    }

    fn unit_count(&self) -> usize {
        self.sections.len()
    }

    fn previous_content(&self) -> String {
        if self.sections.is_empty() {
            String::new()
        } else {
            serde_json::to_string_pretty(&self.sections).unwrap_or_default()
        }
    }

    fn finish(&self) -> String {
        join_sections(&self.sections)
    }
}

/// 按段落累积（详细建议）
#[derive(Debug, Default)]
pub struct DetailAccumulator {
    parts: Vec<String>,
}

impl DetailAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkAccumulator for DetailAccumulator {
    fn absorb(&mut self, raw: &str) -> RoundOutcome {
        let detail = parse_detail_chunk(raw);
        let added = if detail.content.trim().is_empty() {
            0
        } else {
            self.parts.push(detail.content);
            1
        };
        RoundOutcome {
            complete: detail.complete,
            added,
        }
    }

    fn unit_count(&self) -> usize {
        self.parts.len()
    }

    fn previous_content(&self) -> String {
        self.parts.join("\n\n")
    }

    fn finish(&self) -> String {
        self.parts.join("\n\n")
    }
}

/// 生成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// 排序拼接后的内容（取消时为部分内容，不含取消说明）
    pub content: String,
    pub cancelled: bool,
    /// 实际完成的推理轮数
    pub rounds: usize,
}

/// 控制器参数
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub max_no_op_rounds: usize,
    pub round_delay: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_no_op_rounds: 3,
            round_delay: Duration::from_millis(1000),
        }
    }
}

/// 多轮生成控制器
pub struct ChunkedGenerationController {
    inference: Arc<dyn Inference>,
    reporter: Arc<dyn ProgressReporter>,
    settings: GenerationSettings,
}

impl ChunkedGenerationController {
    pub fn new(
        inference: Arc<dyn Inference>,
        reporter: Arc<dyn ProgressReporter>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            inference,
            reporter,
            settings,
        }
    }

    /// 换一个进度接收端（详细建议按条目缩放进度）
    pub fn with_reporter(&self, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            inference: self.inference.clone(),
            reporter,
            settings: self.settings,
        }
    }

    /// 运行直到完成、取消或卡死
    pub async fn run<P, A>(
        &self,
        request: &GenerationRequest<P>,
        accumulator: &mut A,
        token: &CancelToken,
    ) -> AppResult<GenerationOutcome>
    where
        P: RoundPrompt,
        A: ChunkAccumulator,
    {
        let mut iteration = 0usize;
        let mut no_op_rounds = 0usize;
        let mut progress = 0u8;

        loop {
            if token.is_cancelled() {
                return Ok(self.cancelled(request, accumulator, iteration, progress));
            }

            progress = progress.max(progress_estimate(iteration));
            self.emit(&request.status, progress);

            let previous_content = accumulator.previous_content();
            let prompt = request.prompt.build(&RoundContext {
                iteration,
                previous_units: accumulator.unit_count(),
                previous_content: &previous_content,
            });

            debug!("第 {} 轮生成，提示词 {} 字符", iteration + 1, prompt.len());
            let raw = match self.invoke_or_cancel(request, prompt, token).await? {
                Some(raw) => raw,
                None => return Ok(self.cancelled(request, accumulator, iteration, progress)),
            };

            // 结果与取消同时到达时以取消为准，本轮内容不追加
            if token.is_cancelled() {
                return Ok(self.cancelled(request, accumulator, iteration, progress));
            }

            let round = accumulator.absorb(&raw);
            iteration += 1;
            debug!(
                "第 {} 轮: 新增 {} 个单元，累计 {}，complete={}",
                iteration,
                round.added,
                accumulator.unit_count(),
                round.complete
            );

            if round.complete {
                self.emit(&format!("{} - completed", request.status), 100);
                info!("✓ 生成完成，共 {} 轮", iteration);
                return Ok(GenerationOutcome {
                    content: accumulator.finish(),
                    cancelled: false,
                    rounds: iteration,
                });
            }

            if round.added == 0 {
                no_op_rounds += 1;
                warn!("⚠️ 第 {} 轮没有新内容 ({}/{})", iteration, no_op_rounds, self.settings.max_no_op_rounds);
                if no_op_rounds >= self.settings.max_no_op_rounds {
                    return Err(AppError::StuckGeneration {
                        no_op_rounds,
                        rounds: iteration,
                    });
                }
            } else {
                no_op_rounds = 0;
            }

            if !self.settings.round_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Ok(self.cancelled(request, accumulator, iteration, progress));
                    }
                    _ = tokio::time::sleep(self.settings.round_delay) => {}
                }
            }
        }
    }

    /// 推理调用与取消信号竞争
    ///
    /// 返回 `None` 表示取消先到；进行中的任务不会被中止，结果被丢弃。
    async fn invoke_or_cancel<P>(
        &self,
        request: &GenerationRequest<P>,
        prompt: String,
        token: &CancelToken,
    ) -> AppResult<Option<String>> {
        let inference = self.inference.clone();
        let system_prompt = request.system_prompt.clone();
        let image = request.image.clone();

        let handle = tokio::spawn(async move {
            inference
                .invoke(&prompt, &system_prompt, image.as_ref())
                .await
        });

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("🛑 取消请求先于推理结果到达，放弃进行中的调用");
                Ok(None)
            }
            joined = handle => match joined {
                Ok(result) => result.map(Some),
                Err(e) => Err(AppError::inference("generation-task", e)),
            },
        }
    }

    fn cancelled<P, A: ChunkAccumulator>(
        &self,
        request: &GenerationRequest<P>,
        accumulator: &A,
        rounds: usize,
        progress: u8,
    ) -> GenerationOutcome {
        info!("🛑 生成已取消，保留 {} 个已生成单元", accumulator.unit_count());
        self.emit(&format!("{} - cancelled", request.status), progress);
        GenerationOutcome {
            content: accumulator.finish(),
            cancelled: true,
            rounds,
        }
    }

    fn emit(&self, status: &str, progress: u8) {
        self.reporter.emit(ProgressEvent::Generation {
            status: status.to_string(),
            progress,
        });
    }
}
