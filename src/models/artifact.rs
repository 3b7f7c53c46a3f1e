use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// 随推理请求附带的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// 如 `image/png`
    pub media_type: String,
    pub data_base64: String,
}

impl ImageInput {
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            data_base64: STANDARD.encode(bytes),
        }
    }

    /// `data:{media_type};base64,{data}` 形式，供兼容 OpenAI 的接口使用
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data_base64)
    }
}

/// 上传方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// 单个文件（IaC 模板或架构图）
    Single,
    /// 打包后的多文件项目
    Project,
}

impl UploadMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "single_file" | "single-file" => Some(UploadMode::Single),
            "project" | "multiple" | "multiple_files" | "zip" => Some(UploadMode::Project),
            _ => None,
        }
    }
}

/// 制品内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactContent {
    Text(String),
    Image(ImageInput),
}

/// 纯文本辅助文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportingDocument {
    pub name: String,
    pub description: String,
    pub text: String,
}

/// 被评审的制品
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// 不透明的存储键
    pub id: String,
    pub name: String,
    pub content: ArtifactContent,
    pub upload_mode: UploadMode,
    pub supporting_doc: Option<SupportingDocument>,
}

impl Artifact {
    pub fn is_image(&self) -> bool {
        matches!(self.content, ArtifactContent::Image(_))
    }

    pub fn image(&self) -> Option<&ImageInput> {
        match &self.content {
            ArtifactContent::Image(image) => Some(image),
            ArtifactContent::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            ArtifactContent::Text(text) => Some(text),
            ArtifactContent::Image(_) => None,
        }
    }
}

/// IaC 模板类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IacTemplateType {
    CloudformationYaml,
    CloudformationJson,
    Terraform,
}

impl IacTemplateType {
    pub fn parse(s: &str) -> Option<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        if lowered.contains("terraform") {
            Some(IacTemplateType::Terraform)
        } else if lowered.contains("json") {
            Some(IacTemplateType::CloudformationJson)
        } else if lowered.contains("yaml") || lowered.contains("yml") || lowered == "cloudformation" {
            Some(IacTemplateType::CloudformationYaml)
        } else {
            None
        }
    }

    /// 生成文件的扩展名
    pub fn extension(self) -> &'static str {
        match self {
            IacTemplateType::CloudformationYaml => "yaml",
            IacTemplateType::CloudformationJson => "json",
            IacTemplateType::Terraform => "tf",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            IacTemplateType::CloudformationYaml => "AWS CloudFormation (YAML)",
            IacTemplateType::CloudformationJson => "AWS CloudFormation (JSON)",
            IacTemplateType::Terraform => "Terraform",
        }
    }
}
