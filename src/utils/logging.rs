/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 重复调用不会报错（测试中会多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wa_review={},warn", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - Well-Architected 评审");
    info!("📄 制品: {}", config.artifact_path);
    info!("📚 支柱: {}", config.selected_pillars.join(", "));
    info!("🤖 模型: {}", config.llm_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始
pub fn log_stage_start(stage: &str) {
    info!("\n{}", "─".repeat(60));
    info!("▶ {}", stage);
    info!("{}", "─".repeat(60));
}

/// 记录评审阶段结束
pub fn log_review_complete(processed: usize, total: usize, failed: usize, cancelled: bool) {
    if cancelled {
        info!("🛑 评审已取消: {}/{} 个问题完成", processed, total);
    } else if failed > 0 {
        info!("✓ 评审结束: {}/{} 个问题完成，{} 个失败已跳过", processed, total, failed);
    } else {
        info!("✓ 评审完成: {}/{} 个问题", processed, total);
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `answered`: 已完成的问题数
/// - `failed`: 失败的问题数
/// - `needing_attention`: 相关但未落实的最佳实践数
/// - `output_dir`: 结果目录
pub fn print_final_stats(answered: usize, failed: usize, needing_attention: usize, output_dir: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 评审完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已评审问题: {}", answered);
    info!("❌ 失败问题: {}", failed);
    info!("⚠️ 待改进最佳实践: {}", needing_attention);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_dir);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
