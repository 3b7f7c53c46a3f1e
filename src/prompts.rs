//! 提示词构建
//!
//! 只拼接文本，不做任何 I/O。

use phf::phf_map;
use serde_json::json;

use crate::models::artifact::{Artifact, IacTemplateType, SupportingDocument, UploadMode};
use crate::models::question::QuestionGroup;
use crate::models::verdict::Verdict;

/// 输出语言代码到英文名称
static LANGUAGES: phf::Map<&'static str, &'static str> = phf_map! {
    "en" => "English",
    "ja" => "Japanese",
    "es" => "Spanish",
    "zh" => "Chinese",
    "fr" => "French",
    "de" => "German",
    "pt" => "Portuguese",
    "ko" => "Korean",
};

/// 表中没有的代码原样返回，空代码视为 English
pub fn language_name(code: &str) -> &str {
    let code = code.trim();
    if code.is_empty() {
        return "English";
    }
    LANGUAGES
        .get(code.to_lowercase().as_str())
        .copied()
        .unwrap_or(code)
}

/// 非英语时追加到提示词末尾的语言要求
pub fn language_instruction(code: &str) -> String {
    let name = language_name(code);
    if name == "English" {
        String::new()
    } else {
        format!(
            "\n\nWrite every free-text value of your answer in {}. \
             Keep JSON keys, best practice names and markers exactly as specified.",
            name
        )
    }
}

fn best_practices_json(question: &QuestionGroup) -> String {
    let value = json!({
        "pillar": question.pillar_name,
        "question": question.title,
        "bestPractices": question.best_practice_names(),
    });
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

fn artifact_noun(artifact: &Artifact) -> &'static str {
    if artifact.is_image() {
        "architecture diagram"
    } else if artifact.upload_mode == UploadMode::Project {
        "IaC project"
    } else {
        "IaC template document"
    }
}

fn supporting_doc_block(doc: Option<&SupportingDocument>) -> String {
    match doc {
        Some(doc) => format!(
            "\n<supporting_document name=\"{}\">\n<description>{}</description>\n<content>\n{}\n</content>\n</supporting_document>\n\
             When the supporting document influences a conclusion, begin that reasoning with \"[From Supporting Doc]\".\n",
            doc.name, doc.description, doc.text
        ),
        None => String::new(),
    }
}

// ========== 评审 ==========

/// 评审系统提示词：角色、判断规则与 JSON 输出格式
pub fn analysis_system_prompt(artifact: &Artifact, question: &QuestionGroup) -> String {
    let count = question.best_practices.len();
    let noun = artifact_noun(artifact);
    format!(
        r#"You are an AWS Cloud Solutions Architect who reviews solutions against the AWS Well-Architected Framework.
You are given an {noun}. For each of the {count} best practices of the question "{title}" listed in <best_practices_json>, decide whether it is relevant to the {noun} and, if relevant, whether it is applied.

Respond with this EXACT JSON structure and nothing else:
{{
  "bestPractices": [
    {{
      "name": "<exact best practice name>",
      "relevant": <boolean>,
      "applied": <boolean, only when relevant=true>,
      "reasonApplied": "<50 words max, only when applied=true>",
      "reasonNotApplied": "<50 words max, only when applied=false>",
      "recommendations": "<350 words max, risks and how to implement, only when applied=false>"
    }}
  ]
}}

Rules:
1) Keep the order of <best_practices_json>. Do not rename, merge or skip any of the {count} best practices.
2) A best practice about organizational processes rather than resources in the {noun} is relevant=false.
3) Base your answer only on the provided {noun} and the <kb> context. Do not invent facts."#,
        noun = noun,
        count = count,
        title = question.title,
    )
}

/// 评审用户提示词：最佳实践列表、知识库片段、制品内容
pub fn analysis_prompt(
    artifact: &Artifact,
    question: &QuestionGroup,
    kb_snippets: &[String],
    language: &str,
) -> String {
    let mut prompt = format!(
        "<best_practices_json>\n{}\n</best_practices_json>\n\n<kb>\n{}\n</kb>\n",
        best_practices_json(question),
        kb_snippets.join("\n---\n")
    );

    if let Some(text) = artifact.text() {
        let tag = if artifact.upload_mode == UploadMode::Project {
            "uploaded_project"
        } else {
            "uploaded_template_document"
        };
        prompt.push_str(&format!("\n<{tag}>\n{text}\n</{tag}>\n", tag = tag, text = text));
    }

    prompt.push_str(&supporting_doc_block(artifact.supporting_doc.as_ref()));
    prompt.push_str(&language_instruction(language));
    prompt
}

/// 知识库检索查询
pub fn knowledge_base_query(pillar: &str, question: &QuestionGroup) -> String {
    format!(
        "Below <best_practices_to_retrieve> lists the best practices of the question \"{}\" in the Well-Architected pillar \"{}\":\n\
         <best_practices_to_retrieve>\n{}\n</best_practices_to_retrieve>\n\
         For each best practice provide: its name, the risk level if not established, implementation guidance, \
         common anti-patterns, and whether it concerns AWS resources and configurations or organizational processes.",
        question.title,
        pillar,
        best_practices_json(question)
    )
}

// ========== IaC 生成 ==========

pub fn iac_system_prompt(template_type: IacTemplateType) -> String {
    let name = template_type.display_name();
    format!(
        r##"You are an AWS Cloud Solutions Architect who writes Infrastructure as Code.
An architecture diagram is attached together with Well-Architected recommendations. Generate a {name} template that implements the architecture and follows the recommendations.

<instructions>
1. Split a large template into parts. Each part starts with a line "# Section {{number}} - {{description}}".
2. When you provide the last part of the template, end your response with "<end_of_iac_document_generation>".
3. When more parts will follow, end your response with "<message_truncated>".
4. Never repeat a section that was already provided in <previous_responses>.
</instructions>

All sections will be concatenated in section-number order into a single {name} template."##,
        name = name
    )
}

/// 第 N 轮 IaC 生成提示词
pub fn iac_round_prompt(
    previous_count: usize,
    previous_content: &str,
    recommendations: &[&Verdict],
    supporting_doc: Option<&SupportingDocument>,
) -> String {
    let previous = if previous_content.is_empty() {
        "No previous sections generated yet"
    } else {
        previous_content
    };
    let recommendations =
        serde_json::to_string_pretty(recommendations).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = format!(
        "<task>Based on the architecture diagram and the <recommendations> below, generate the IaC template.</task>\n\
         <context>\n<previous_sections_count>{}</previous_sections_count>\n\
         <previous_responses>\n{}\n</previous_responses>\n\
         <recommendations>\n{}\n</recommendations>\n</context>\n",
        previous_count, previous, recommendations
    );
    prompt.push_str(&supporting_doc_block(supporting_doc));
    prompt
}

// ========== 详细建议 ==========

pub fn details_system_prompt(artifact: &Artifact, template_type: Option<IacTemplateType>) -> String {
    let examples = match (artifact.is_image(), template_type) {
        (true, Some(t)) => format!("{} examples", t.display_name()),
        (true, None) => "AWS CloudFormation (YAML) examples".to_string(),
        (false, _) => "template modification examples in the same language and format as <iac_document>".to_string(),
    };
    format!(
        r#"You are an AWS Cloud Solutions Architect who reviews solutions against the AWS Well-Architected Framework. Answer in Markdown.

For the best practice in <bp_recommendation_analysis>:
1. Provide detailed implementation guidance.
2. Include {examples}.
3. Describe the risks of not implementing the best practice.
4. Recommend specific AWS services and features.
5. When your analysis is complete, add "<end_of_details_generation>" at the very end.
6. When you have more details to provide, end your response with "<details_truncated>".

Structure:
# {{Pillar}} - {{Best Practice Name}}
## Implementation Guidance
## Template Modifications
## Risks and Recommendations"#,
        examples = examples
    )
}

/// 单个最佳实践的详细建议提示词
pub fn details_round_prompt(
    pillar: &str,
    question: &str,
    verdict: &Verdict,
    artifact: &Artifact,
    previous_content: &str,
    language: &str,
) -> String {
    let item = json!([{
        "pillar": pillar,
        "question": question,
        "name": verdict.name,
        "reasonNotApplied": verdict.reason_not_applied,
        "recommendations": verdict.recommendation,
    }]);

    let mut prompt = format!(
        "<bp_recommendation_analysis>\n{}\n</bp_recommendation_analysis>\n",
        serde_json::to_string_pretty(&item).unwrap_or_default()
    );
    if let Some(text) = artifact.text() {
        prompt.push_str(&format!("\n<iac_document>\n{}\n</iac_document>\n", text));
    }
    if !previous_content.is_empty() {
        prompt.push_str(&format!(
            "\n<previous_analysis>\n{}\n</previous_analysis>\nContinue from where the previous analysis stopped.\n",
            previous_content
        ));
    }
    prompt.push_str(&supporting_doc_block(artifact.supporting_doc.as_ref()));
    prompt.push_str(&language_instruction(language));
    prompt
}
