//! 问题处理上下文
//!
//! 封装"我正在处理哪个支柱的第几个问题"这一信息

use std::fmt::Display;

/// 问题处理上下文
///
/// 包含处理单个问题所需的定位信息，只用于日志和错误记录
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 支柱显示名称
    pub pillar_name: String,

    /// 问题在整次运行中的序号（从1开始）
    pub question_index: usize,

    /// 整次运行的问题总数
    pub total_questions: usize,

    /// 问题 id
    pub question_id: String,
}

impl QuestionCtx {
    /// 创建新的问题上下文
    pub fn new(
        pillar_name: String,
        question_index: usize,
        total_questions: usize,
        question_id: String,
    ) -> Self {
        Self {
            pillar_name,
            question_index,
            total_questions,
            question_id,
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {}/{} #{}]",
            self.pillar_name, self.question_index, self.total_questions, self.question_id
        )
    }
}
