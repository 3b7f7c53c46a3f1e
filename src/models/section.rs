use serde::{Deserialize, Serialize};

/// 无法解析序号的章节使用的序号，保证排在所有可解析章节之后
pub const UNORDERED_SECTION: u32 = u32::MAX;

/// 没有描述的章节使用的描述
pub const UNNAMED_SECTION: &str = "Unnamed Section";

/// 多轮生成中的一个文档章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub order: u32,
    pub description: String,
    pub content: String,
}

impl DocumentSection {
    pub fn new(order: u32, description: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            order,
            description: description.into(),
            content: content.into(),
        }
    }
}

/// 按 `order` 升序排列，序号相同的保持到达顺序
pub fn sort_sections(sections: &[DocumentSection]) -> Vec<&DocumentSection> {
    let mut sorted: Vec<&DocumentSection> = sections.iter().collect();
    sorted.sort_by_key(|s| s.order);
    sorted
}

/// 排序后拼接为最终文档
pub fn join_sections(sections: &[DocumentSection]) -> String {
    sort_sections(sections)
        .into_iter()
        .map(|s| format!("# {}\n{}", s.description, s.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
