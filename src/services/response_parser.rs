//! 模型输出解析 - 业务能力层
//!
//! 把半结构化的模型文本转换为类型化记录：
//! - 最佳实践判断（带容错 JSON 修复）
//! - 多轮生成中的文档章节
//! - 详细建议的分段文本
//!
//! JSON 修复是启发式的，调用方只依赖本模块的函数签名，
//! 以便之后替换为更严格的提取器。

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::section::{DocumentSection, UNNAMED_SECTION, UNORDERED_SECTION};
use crate::models::verdict::ModelVerdict;

/// 任务完成标记（IaC 生成与详细建议各有一个历史写法，统一接受）
pub const COMPLETION_MARKERS: &[&str] = &[
    "<end_of_generation>",
    "<end_of_iac_document_generation>",
    "<end_of_details_generation>",
];

/// 模型声明"还有后续内容"的截断标记
pub const TRUNCATION_MARKERS: &[&str] = &["<message_truncated>", "<details_truncated>"];

/// 行首的章节标题：`# Section {N} - {description}`
///
/// `Section` 之后必须是序号或 `-`/`:` 分隔的描述，`# section: outputs`
/// 这类模板注释不会被当成标题。
static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*#+[ \t]*Section\b([ \t]*(?:\d[^\n]*|[^\n]*[-:–][^\n]*))$")
        .expect("static regex")
});

/// 行首的任意级别 Markdown 标题
static HEADING_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#+ ").expect("static regex"));

// ========== 判断解析 ==========

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictEnvelope {
    best_practices: Vec<ModelVerdict>,
}

/// 解析一个问题的最佳实践判断
///
/// 修复步骤：截取最外层花括号 → 折叠空白 → 去掉结构符号两侧空格 →
/// 规范化布尔字面量 → JSON 解析。解析失败返回 `MalformedModelOutput`，
/// 从不返回部分对象。
///
/// 条目数与 `expected_count` 不一致时只记录警告，由调用方按位置绑定 id。
pub fn parse_verdicts(raw: &str, expected_count: usize) -> AppResult<Vec<ModelVerdict>> {
    if !raw.contains('{') || !raw.contains('}') {
        return Err(AppError::malformed("响应中没有 JSON 对象", raw));
    }

    let cleaned = clean_json_string(raw);
    debug!("清理后的 JSON 长度: {} 字符", cleaned.len());

    let envelope: VerdictEnvelope = serde_json::from_str(&cleaned)
        .map_err(|e| AppError::malformed(format!("JSON 解析失败: {}", e), raw))?;

    if envelope.best_practices.len() != expected_count {
        warn!(
            "模型返回 {} 条判断，但问题包含 {} 个最佳实践",
            envelope.best_practices.len(),
            expected_count
        );
    }

    Ok(envelope.best_practices)
}

/// 尽力修复模型返回的 JSON 文本
///
/// 字符串内部只做空白折叠（模型常在字符串中输出原始换行），
/// 其余修复只作用于字符串之外。
pub fn clean_json_string(raw: &str) -> String {
    let isolated = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    };

    let collapsed = collapse_whitespace(isolated);
    repair_structure(&collapsed)
}

/// 所有空白串折叠为单个空格
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out.trim().to_string()
}

fn is_structural(c: char) -> bool {
    matches!(c, ':' | ',' | '{' | '}' | '[' | ']')
}

/// 字符串之外：去掉结构符号两侧空格、删除尾随逗号、规范化布尔和空值
fn repair_structure(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ' ' => {
                let prev_structural = out.chars().last().map(is_structural).unwrap_or(true);
                let next_structural = chars.get(i + 1).copied().map(is_structural).unwrap_or(true);
                if !prev_structural && !next_structural {
                    out.push(' ');
                }
            }
            '}' | ']' => {
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(normalize_literal(&word));
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

fn normalize_literal(word: &str) -> &str {
    match word {
        "True" | "TRUE" => "true",
        "False" | "FALSE" => "false",
        "None" | "NULL" | "Null" => "null",
        other => other,
    }
}

// ========== 章节解析 ==========

/// 一轮生成的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChunk {
    /// 出现了完成标记
    pub complete: bool,
    /// 出现了截断标记（模型声明还有后续）
    pub truncated: bool,
    pub sections: Vec<DocumentSection>,
}

/// 检测并去掉所有完成/截断标记
fn strip_markers(raw: &str) -> (String, bool, bool) {
    let mut text = raw.to_string();
    let mut complete = false;
    let mut truncated = false;

    for marker in COMPLETION_MARKERS {
        if text.contains(marker) {
            complete = true;
            text = text.replace(marker, "");
        }
    }
    for marker in TRUNCATION_MARKERS {
        if text.contains(marker) {
            truncated = true;
            text = text.replace(marker, "");
        }
    }

    (text, complete, truncated)
}

/// 解析一轮 IaC 生成输出
///
/// 按 `# Section {N} - {description}` 切分；没有匹配的标题时返回零个章节，
/// 调用方视为"本轮没有新内容"。第一个标题之前的文字被忽略。
pub fn parse_chunk(raw: &str) -> ParsedChunk {
    let (text, complete, truncated) = strip_markers(raw);

    let headers: Vec<_> = SECTION_HEADER.captures_iter(&text).collect();
    let mut sections = Vec::with_capacity(headers.len());

    for (idx, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(tail)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body_end = headers
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());

        let (order, description) = parse_section_tail(tail.as_str());
        let content = text[whole.end()..body_end].trim().to_string();
        sections.push(DocumentSection::new(order, description, content));
    }

    debug!(
        "解析章节: {} 个, complete={}, truncated={}",
        sections.len(),
        complete,
        truncated
    );

    ParsedChunk {
        complete,
        truncated,
        sections,
    }
}

/// 无法解析的序号使用 `UNORDERED_SECTION`，缺少描述使用 `UNNAMED_SECTION`
fn parse_section_tail(tail: &str) -> (u32, String) {
    let tail = tail.trim();
    let (head, description) = match tail
        .char_indices()
        .find(|(_, c)| matches!(c, '-' | ':' | '–'))
    {
        Some((idx, sep)) => (&tail[..idx], &tail[idx + sep.len_utf8()..]),
        None => (tail, ""),
    };

    let digits: String = head
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let order = digits.parse::<u32>().unwrap_or(UNORDERED_SECTION);

    let description = description.trim().trim_end_matches('.').trim();
    let description = if description.is_empty() {
        UNNAMED_SECTION.to_string()
    } else {
        description.to_string()
    };

    (order, description)
}

// ========== 详细建议解析 ==========

/// 一轮详细建议生成的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDetail {
    pub complete: bool,
    pub content: String,
}

/// 解析一轮详细建议输出
///
/// 未完成时丢弃最后一个标题段落（可能写到一半）。
pub fn parse_detail_chunk(raw: &str) -> ParsedDetail {
    let (text, complete, _) = strip_markers(raw);
    let text = text.trim();

    let content = if complete {
        text.to_string()
    } else {
        drop_incomplete_tail(text)
    };

    ParsedDetail { complete, content }
}

/// 去掉最后一个标题开头的段落；没有标题时原样返回
pub fn drop_incomplete_tail(text: &str) -> String {
    match HEADING_START.find_iter(text).last() {
        Some(last) => text[..last.start()].trim_end().to_string(),
        None => text.to_string(),
    }
}
