//! 最佳实践目录 - 业务能力层
//!
//! 加载目录并与工作负载元数据联接，得到带稳定 id 的 `QuestionGroup`。
//! 结果在进程内缓存，首次加载为 single flight：并发调用方只触发一次读取，
//! 之后都拿到同一个 `Arc`。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::loaders::{load_catalog_file, load_workload_answers};
use crate::models::pillar::{pillar_id_from_name, Pillar};
use crate::models::question::{slugify, AnswerSummary, BestPracticeRef, CatalogEntry, QuestionGroup};

/// 目录数据来源
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// 静态目录；失败时返回 `CatalogUnavailable`
    async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>>;

    /// 工作负载答案；没有元数据时返回 `Ok(None)`
    async fn load_answers(&self, workload_id: &str) -> AppResult<Option<Vec<AnswerSummary>>>;
}

/// 基于本地 JSON 文件的数据来源
pub struct FileCatalogSource {
    catalog_path: PathBuf,
    answers_dir: Option<PathBuf>,
}

impl FileCatalogSource {
    pub fn new(config: &Config) -> Self {
        Self {
            catalog_path: PathBuf::from(&config.catalog_path),
            answers_dir: config.workload_answers_dir.as_ref().map(PathBuf::from),
        }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>> {
        load_catalog_file(&self.catalog_path).await
    }

    async fn load_answers(&self, workload_id: &str) -> AppResult<Option<Vec<AnswerSummary>>> {
        match &self.answers_dir {
            Some(dir) => load_workload_answers(dir, workload_id).await,
            None => Ok(None),
        }
    }
}

type GroupCell = Arc<OnceCell<Arc<Vec<QuestionGroup>>>>;

/// 目录缓存
///
/// 进程启动时构造一次，通过 `Arc` 注入。
pub struct QuestionCatalog {
    source: Arc<dyn CatalogSource>,
    base: OnceCell<Arc<Vec<CatalogEntry>>>,
    joined: Mutex<HashMap<String, GroupCell>>,
}

impl QuestionCatalog {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            base: OnceCell::new(),
            joined: Mutex::new(HashMap::new()),
        }
    }

    /// 加载（或从缓存读取）某个工作负载的问题组
    ///
    /// `workload_ref` 为空时所有 id 使用后备规则。
    pub async fn load(&self, workload_ref: Option<&str>) -> AppResult<Arc<Vec<QuestionGroup>>> {
        let key = workload_ref.unwrap_or_default().to_string();
        let cell = {
            let mut joined = self.joined.lock().unwrap_or_else(|e| e.into_inner());
            joined.entry(key.clone()).or_default().clone()
        };

        let groups = cell
            .get_or_try_init(|| async {
                let entries = self.base_catalog().await?;
                let answers = match workload_ref {
                    Some(id) if !id.trim().is_empty() => self.source.load_answers(id).await?,
                    _ => None,
                };
                let groups = build_question_groups(&entries, answers.as_deref());
                info!(
                    "✓ 目录联接完成: {} 个问题组 (工作负载: {})",
                    groups.len(),
                    workload_ref.unwrap_or("-")
                );
                Ok::<_, AppError>(Arc::new(groups))
            })
            .await?;

        Ok(groups.clone())
    }

    async fn base_catalog(&self) -> AppResult<Arc<Vec<CatalogEntry>>> {
        let entries = self
            .base
            .get_or_try_init(|| async {
                info!("📚 正在加载最佳实践目录...");
                let entries = self.source.load_catalog().await?;
                Ok::<_, AppError>(Arc::new(entries))
            })
            .await?;
        Ok(entries.clone())
    }
}

/// 联接目录与答案，按发现顺序分组
///
/// 单条联接失败只影响该条目，使用 slug 后备 id。
pub fn build_question_groups(
    entries: &[CatalogEntry],
    answers: Option<&[AnswerSummary]>,
) -> Vec<QuestionGroup> {
    let mut question_ids: HashMap<&str, &str> = HashMap::new();
    let mut choice_ids: HashMap<String, &str> = HashMap::new();

    for answer in answers.unwrap_or_default() {
        question_ids.insert(answer.question_title.as_str(), answer.question_id.as_str());
        for choice in &answer.choices {
            if let (Some(id), Some(title)) = (&choice.choice_id, &choice.title) {
                choice_ids.insert(join_key(&answer.question_title, title), id.as_str());
            }
        }
    }

    let mut groups: Vec<QuestionGroup> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut fallbacks = 0usize;

    for entry in entries {
        let pillar_id = pillar_id_from_name(&entry.pillar);
        let slot = *index
            .entry((pillar_id.clone(), entry.question.clone()))
            .or_insert_with(|| {
                let question_id = match question_ids.get(entry.question.as_str()) {
                    Some(id) => id.to_string(),
                    None => slugify(&entry.question),
                };
                groups.push(QuestionGroup {
                    pillar_id: pillar_id.clone(),
                    pillar_name: entry.pillar.clone(),
                    question_id,
                    title: entry.question.clone(),
                    best_practices: Vec::new(),
                });
                groups.len() - 1
            });

        let id = match choice_ids.get(&join_key(&entry.question, &entry.best_practice)) {
            Some(id) => id.to_string(),
            None => {
                fallbacks += 1;
                slugify(&format!("{}-{}", entry.question, entry.best_practice))
            }
        };

        groups[slot].best_practices.push(BestPracticeRef {
            id,
            name: entry.best_practice.clone(),
        });
    }

    if answers.is_some() && fallbacks > 0 {
        warn!("{} 条最佳实践未能联接到工作负载元数据，使用后备 id", fallbacks);
    }
    debug!("构建了 {} 个问题组", groups.len());

    groups
}

fn join_key(question: &str, best_practice: &str) -> String {
    format!("{}|||{}", question, best_practice)
}

/// 某个支柱下的问题组（保持发现顺序）
///
/// `pillar` 可以是 id、别名或显示名称。
pub fn groups_for_pillar<'a>(groups: &'a [QuestionGroup], pillar: &str) -> Vec<&'a QuestionGroup> {
    let pillar_id = Pillar::from_id(pillar)
        .or_else(|| Pillar::from_name(pillar))
        .map(|p| p.id().to_string())
        .unwrap_or_else(|| pillar_id_from_name(pillar));

    groups.iter().filter(|g| g.pillar_id == pillar_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::AnswerChoice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn entry(pillar: &str, question: &str, bp: &str) -> CatalogEntry {
        CatalogEntry {
            pillar: pillar.to_string(),
            question: question.to_string(),
            best_practice: bp.to_string(),
        }
    }

    fn sample_entries() -> Vec<CatalogEntry> {
        vec![
            entry("Security", "SEC 1. How do you securely operate?", "Separate workloads"),
            entry("Reliability", "REL 1. How do you manage quotas?", "Aware of quotas"),
            entry("Security", "SEC 1. How do you securely operate?", "Secure account root"),
            entry("Security", "SEC 2. How do you manage identities?", "Use strong sign-in"),
        ]
    }

    struct CountingSource {
        catalog_calls: AtomicUsize,
        answer_calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                catalog_calls: AtomicUsize::new(0),
                answer_calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn load_catalog(&self) -> AppResult<Vec<CatalogEntry>> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(AppError::CatalogUnavailable {
                    reason: "offline".to_string(),
                    source: None,
                });
            }
            Ok(sample_entries())
        }

        async fn load_answers(&self, _workload_id: &str) -> AppResult<Option<Vec<AnswerSummary>>> {
            self.answer_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(vec![AnswerSummary {
                question_id: "securely-operate".to_string(),
                question_title: "SEC 1. How do you securely operate?".to_string(),
                choices: vec![AnswerChoice {
                    choice_id: Some("sec_securely_operate_multi_accounts".to_string()),
                    title: Some("Separate workloads".to_string()),
                }],
            }]))
        }
    }

    #[test]
    fn test_groups_keep_discovery_order() {
        let groups = build_question_groups(&sample_entries(), None);
        let titles: Vec<&str> = groups.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "SEC 1. How do you securely operate?",
                "REL 1. How do you manage quotas?",
                "SEC 2. How do you manage identities?",
            ]
        );
        assert_eq!(groups[0].best_practice_names(), vec!["Separate workloads", "Secure account root"]);
    }

    #[test]
    fn test_fallback_ids_are_slugs() {
        let groups = build_question_groups(&sample_entries(), None);
        assert_eq!(groups[0].question_id, "sec-1-how-do-you-securely-operate");
        assert_eq!(
            groups[0].best_practices[0].id,
            "sec-1-how-do-you-securely-operate-separate-workloads"
        );
    }

    #[test]
    fn test_groups_for_pillar_accepts_names_and_aliases() {
        let groups = build_question_groups(&sample_entries(), None);
        assert_eq!(groups_for_pillar(&groups, "security").len(), 2);
        assert_eq!(groups_for_pillar(&groups, "Security").len(), 2);
        assert_eq!(groups_for_pillar(&groups, "reliability").len(), 1);
        assert!(groups_for_pillar(&groups, "sustainability").is_empty());
    }

    #[tokio::test]
    async fn test_load_joins_ids_and_falls_back_per_entry() {
        let catalog = QuestionCatalog::new(Arc::new(CountingSource::new(false)));
        let groups = catalog.load(Some("wl-1")).await.unwrap();

        assert_eq!(groups[0].question_id, "securely-operate");
        assert_eq!(groups[0].best_practices[0].id, "sec_securely_operate_multi_accounts");
        // 没有元数据的条目仍然成功
        assert_eq!(
            groups[0].best_practices[1].id,
            "sec-1-how-do-you-securely-operate-secure-account-root"
        );
    }

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let source = Arc::new(CountingSource::new(false));
        let catalog = Arc::new(QuestionCatalog::new(source.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = catalog.clone();
                tokio::spawn(async move { catalog.load(Some("wl-1")).await.unwrap() })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.answer_calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

        // 另一个工作负载复用基础目录
        catalog.load(None).await.unwrap();
        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_failure_is_catalog_unavailable() {
        let catalog = QuestionCatalog::new(Arc::new(CountingSource::new(true)));
        let err = catalog.load(None).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogUnavailable { .. }));
    }
}
