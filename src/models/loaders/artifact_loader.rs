use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{AppError, AppResult};
use crate::models::artifact::{Artifact, ArtifactContent, ImageInput, SupportingDocument, UploadMode};
use crate::models::question::slugify;

/// 打包项目时跳过的目录和文件
const EXCLUDED_NAMES: &[&str] = &[
    "node_modules",
    "dist",
    "cdk.out",
    "target",
    ".git",
    ".github",
    "package-lock.json",
    "yarn.lock",
];

/// 打包项目时跳过的二进制/媒体扩展名
const EXCLUDED_EXTENSIONS: &[&str] = &[
    "env", "log", "tmp", "pdf", "png", "jpeg", "jpg", "gif", "bmp", "tiff", "ico", "webp", "svg",
    "mp3", "mp4", "mov", "zip", "gz", "tar", "7z", "exe", "dll", "so", "dylib", "bin", "db",
    "sqlite", "jar", "class", "pyc", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

/// 按扩展名识别图片类型
pub fn image_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// 加载待评审的制品
///
/// - 图片文件 → 架构图
/// - 目录或 `project` 模式 → 打包成单个文本
/// - 其他 → 文本模板
pub async fn load_artifact(path: &Path, upload_mode: UploadMode) -> AppResult<Artifact> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| AppError::io(path.display().to_string(), e))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let (content, upload_mode) = if metadata.is_dir() {
        (ArtifactContent::Text(pack_project(path).await?), UploadMode::Project)
    } else if let Some(media_type) = image_media_type(path) {
        let bytes = fs::read(path)
            .await
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        (
            ArtifactContent::Image(ImageInput::from_bytes(media_type, &bytes)),
            UploadMode::Single,
        )
    } else {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        (ArtifactContent::Text(text), upload_mode)
    };

    if let ArtifactContent::Text(text) = &content {
        if text.trim().is_empty() {
            return Err(AppError::InvalidArtifact(format!("制品内容为空: {}", path.display())));
        }
    }

    tracing::info!("已加载制品: {} ({:?})", name, upload_mode);

    Ok(Artifact {
        id: artifact_id(&name),
        name,
        content,
        upload_mode,
        supporting_doc: None,
    })
}

/// 加载纯文本辅助文档
pub async fn load_supporting_doc(path: &Path, description: &str) -> AppResult<SupportingDocument> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io(path.display().to_string(), e))?;
    Ok(SupportingDocument {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "supporting-document.txt".to_string()),
        description: description.to_string(),
        text,
    })
}

/// 存储键：名称 slug + 时间戳
fn artifact_id(name: &str) -> String {
    let slug = slugify(name);
    let slug = if slug.is_empty() { "artifact".to_string() } else { slug };
    format!("{}-{}", slug, chrono::Local::now().format("%Y%m%d%H%M%S"))
}

/// 把目录下的文本文件打包为一个文本
async fn pack_project(root: &Path) -> AppResult<String> {
    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| AppError::io(dir.display().to_string(), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::io(dir.display().to_string(), e))?
        {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if EXCLUDED_NAMES.contains(&file_name.as_str()) {
                continue;
            }

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| AppError::io(path.display().to_string(), e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if !is_excluded_extension(&path) {
                match fs::read_to_string(&path).await {
                    Ok(content) => files.push((path, content)),
                    Err(e) => tracing::warn!("跳过无法读取的文件 {}: {}", path.display(), e),
                }
            }
        }
    }

    if files.is_empty() {
        return Err(AppError::InvalidArtifact(format!(
            "项目目录中没有可读的文本文件: {}",
            root.display()
        )));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut packed = String::new();
    for (path, content) in &files {
        let relative = path.strip_prefix(root).unwrap_or(path);
        packed.push_str(&format!(
            "<file path=\"{}\">\n{}\n</file>\n",
            relative.display(),
            content
        ));
    }

    tracing::info!("项目打包完成: {} 个文件, {} 字符", files.len(), packed.len());
    Ok(packed)
}

fn is_excluded_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXCLUDED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
