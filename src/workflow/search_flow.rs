//! 单成员查询流程
//!
//! 两个登记系统并发查询，各自独立定结局，合并进一条新记录后立即落盘。
//! 落盘发生在人工确认之前，查询结果先于结论存在

use std::sync::Arc;

use tracing::info;

use crate::error::AppResult;
use crate::models::{Member, SearchRecord};
use crate::services::SearchProvider;
use crate::storage::ResultStore;

/// 查询流程
pub struct SearchFlow<N, U> {
    nsopw: N,
    ucaor: U,
    store: Arc<ResultStore>,
}

impl<N: SearchProvider, U: SearchProvider> SearchFlow<N, U> {
    pub fn new(nsopw: N, ucaor: U, store: Arc<ResultStore>) -> Self {
        Self { nsopw, ucaor, store }
    }

    /// 对一个成员发起双系统查询，生成并持久化一条新记录
    ///
    /// 重查同一个成员会生成新键的新记录，旧记录保留作历史
    pub async fn run_both_searches(&self, member: &Member) -> AppResult<SearchRecord> {
        info!("🔍 开始查询: {}", member.full_name());
        let mut record = SearchRecord::new(member.identity_key());

        // 一个系统失败不拖累另一个系统的结果
        let (nsopw, ucaor) = tokio::join!(
            self.nsopw.search(&member.first_name, &member.last_name),
            self.ucaor.search(&member.first_name, &member.last_name),
        );
        info!("📊 NSOPW: {}", nsopw.summary());
        info!("📊 UCAOR: {}", ucaor.summary());

        record.nsopw = Some(nsopw);
        record.ucaor = Some(ucaor);

        self.store.put_record(&record)?;
        self.store.set_last_search(&record)?;
        info!("✓ 查询记录已落盘: {}", record.search_key);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistryOutcome;

    /// 返回固定结局的测试桩
    struct StubProvider {
        id: &'static str,
        outcome: RegistryOutcome,
    }

    impl SearchProvider for StubProvider {
        fn source_id(&self) -> &'static str {
            self.id
        }

        async fn search(&self, _first: &str, _last: &str) -> RegistryOutcome {
            self.outcome.clone()
        }
    }

    fn temp_store(tag: &str) -> Arc<ResultStore> {
        let path = std::env::temp_dir().join(format!(
            "search_flow_test_{}_{}.json",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(ResultStore::open(path).expect("打开存储失败"))
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_other() {
        let store = temp_store("independent");
        let flow = SearchFlow::new(
            StubProvider {
                id: "nsopw",
                outcome: RegistryOutcome::Failed {
                    reason: "Search failed".to_string(),
                },
            },
            StubProvider {
                id: "ucaor",
                outcome: RegistryOutcome::Count { count: 2 },
            },
            store.clone(),
        );

        let member = Member::new("John", "Smith", Some(42));
        let record = flow.run_both_searches(&member).await.expect("查询流程失败");

        assert_eq!(
            record.nsopw,
            Some(RegistryOutcome::Failed {
                reason: "Search failed".to_string()
            })
        );
        assert_eq!(record.ucaor, Some(RegistryOutcome::Count { count: 2 }));
        assert!(record.confirmed.is_none());

        // 确认前就已落盘
        let stored = store.record(&record.search_key).expect("应有记录");
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_research_creates_new_record_and_keeps_history() {
        let store = temp_store("research");
        let flow = SearchFlow::new(
            StubProvider {
                id: "nsopw",
                outcome: RegistryOutcome::Offenders { offenders: vec![] },
            },
            StubProvider {
                id: "ucaor",
                outcome: RegistryOutcome::Count { count: 0 },
            },
            store.clone(),
        );

        let member = Member::new("John", "Smith", Some(42));
        let first = flow.run_both_searches(&member).await.expect("查询流程失败");
        // 保证时间戳不同
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = flow.run_both_searches(&member).await.expect("查询流程失败");

        assert_ne!(first.search_key, second.search_key);
        assert_eq!(store.all_records().len(), 2);

        let latest = store.latest_record_for("john smith").expect("应有记录");
        assert_eq!(latest.search_key, second.search_key);
    }
}
