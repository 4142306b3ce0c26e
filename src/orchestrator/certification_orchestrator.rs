//! 认证队列处理器
//!
//! 从存储扫出"已确认未匹配"且状态还允许处理的记录，构成队列，
//! 单工人串行处理。失败的条目排到队尾重试，次数封顶；
//! 缺年龄是终态失败，不进队列也不重试

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::bus::{Event, EventBus};
use crate::error::AppResult;
use crate::models::{CertificationOutcome, CertificationStatus};
use crate::storage::ResultStore;

/// 认证队列条目（内存态，每次运行从存储重建）
#[derive(Clone, Debug, PartialEq)]
pub struct CertEntry {
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    /// 关联查询记录的时间戳（状态事件用它对账）
    pub record_timestamp: String,
    pub search_key: String,
    pub attempts: u32,
}

impl CertEntry {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// 认证能力
pub trait Certifier {
    /// 处理一个条目，返回结局（不跨边界抛错，失败带原因）
    fn certify(&mut self, entry: &CertEntry) -> impl Future<Output = CertificationOutcome> + Send;

    /// 清理上一条留下的残余（多余标签页等）
    fn cleanup(&mut self) -> impl Future<Output = ()> + Send;
}

/// 认证统计
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CertificationStats {
    pub added: usize,
    pub exists: usize,
    pub failed: usize,
    /// 缺年龄被直接判失败的记录数
    pub missing_age: usize,
}

/// 认证队列处理器
pub struct CertificationOrchestrator<C> {
    agent: C,
    store: Arc<ResultStore>,
    bus: EventBus,
    max_attempts: u32,
}

impl<C: Certifier> CertificationOrchestrator<C> {
    pub fn new(agent: C, store: Arc<ResultStore>, bus: EventBus, max_attempts: u32) -> Self {
        Self {
            agent,
            store,
            bus,
            max_attempts,
        }
    }

    /// 从存储扫描构建队列
    ///
    /// 资格：双确认且结论为未匹配，认证状态是 Pending 或 Failed；
    /// 每个名字只取最新一条。缺年龄立即写终态失败并排除
    pub fn build_queue(&self, stats: &mut CertificationStats) -> AppResult<VecDeque<CertEntry>> {
        let members: HashMap<String, _> = self
            .store
            .members()
            .into_iter()
            .map(|m| (m.identity_key(), m))
            .collect();

        let mut queue = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        // all_records 按新到旧排序，每个名字命中的第一条就是最新
        for record in self.store.all_records() {
            if !seen.insert(record.searched_name.clone()) {
                continue;
            }
            if !record.is_cleared() || !record.certification_status.is_retriable() {
                continue;
            }

            let member = members.get(&record.searched_name);
            let age = member.and_then(|m| m.age);
            let Some(age) = age else {
                warn!("⚠️ 成员缺少可用年龄，认证判终态失败: {}", record.searched_name);
                let status = CertificationStatus::Failed("invalid or missing age".to_string());
                self.store
                    .update_certification_status(&record.search_key, status.clone())?;
                self.bus.publish(Event::CertificationStatusUpdate {
                    record_timestamp: record.timestamp.clone(),
                    outcome: CertificationOutcome::Failed("invalid or missing age".to_string()),
                });
                stats.missing_age += 1;
                continue;
            };

            // 名册里有原大小写姓名就用它，没有就退回小写身份键
            let (first_name, last_name) = match member {
                Some(m) => (m.first_name.clone(), m.last_name.clone()),
                None => {
                    let mut parts = record.searched_name.splitn(2, ' ');
                    (
                        parts.next().unwrap_or_default().to_string(),
                        parts.next().unwrap_or_default().to_string(),
                    )
                }
            };

            queue.push_back(CertEntry {
                first_name,
                last_name,
                age,
                record_timestamp: record.timestamp.clone(),
                search_key: record.search_key.clone(),
                attempts: 0,
            });
        }
        Ok(queue)
    }

    /// 处理整个队列
    pub async fn run(&mut self) -> AppResult<CertificationStats> {
        let mut stats = CertificationStats::default();
        let mut queue = self.build_queue(&mut stats)?;
        if queue.is_empty() {
            info!("📭 没有待认证的条目");
            return Ok(stats);
        }

        info!("{}", "=".repeat(60));
        info!("🚀 开始认证批处理: {} 个条目", queue.len());
        info!("{}", "=".repeat(60));
        // 运行标志压制页面脚本里的交互式弹窗
        self.store.set_cert_batch_flag(true)?;

        while let Some(mut entry) = queue.pop_front() {
            // 先清掉上一条留下的标签页
            self.agent.cleanup().await;

            info!(
                "📤 认证: {} (第 {} 次尝试)",
                entry.full_name(),
                entry.attempts + 1
            );
            let outcome = self.agent.certify(&entry).await;
            self.store
                .update_certification_status(&entry.search_key, outcome.clone().into())?;
            self.bus.publish(Event::CertificationStatusUpdate {
                record_timestamp: entry.record_timestamp.clone(),
                outcome: outcome.clone(),
            });

            match outcome {
                CertificationOutcome::Added => {
                    info!("✅ 已添加认证: {}", entry.full_name());
                    stats.added += 1;
                }
                CertificationOutcome::Exists => {
                    info!("✓ 认证已存在: {}", entry.full_name());
                    stats.exists += 1;
                }
                CertificationOutcome::Failed(reason) => {
                    entry.attempts += 1;
                    if entry.attempts < self.max_attempts {
                        warn!(
                            "⚠️ 认证失败 ({})，排到队尾重试: {}",
                            reason,
                            entry.full_name()
                        );
                        queue.push_back(entry);
                    } else {
                        warn!(
                            "❌ 认证失败 ({})，已达尝试上限 {}: {}",
                            reason,
                            self.max_attempts,
                            entry.full_name()
                        );
                        stats.failed += 1;
                    }
                }
            }
        }

        self.agent.cleanup().await;
        self.store.set_cert_batch_flag(false)?;
        log_certification_stats(&stats);
        Ok(stats)
    }
}

fn log_certification_stats(stats: &CertificationStats) {
    info!("{}", "=".repeat(60));
    info!("📊 认证批处理完成");
    info!("✅ 新增: {}", stats.added);
    info!("✓ 已存在: {}", stats.exists);
    info!("❌ 失败: {}", stats.failed);
    info!("⚠️ 缺年龄: {}", stats.missing_age);
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        make_search_key, Confirmation, ConfirmedBy, Member, RegistryOutcome, SearchRecord,
    };

    /// 照剧本出结局的测试桩，并记录调用顺序
    struct ScriptedAgent {
        script: HashMap<String, Vec<CertificationOutcome>>,
        calls: Vec<String>,
        cleanups: usize,
    }

    impl ScriptedAgent {
        fn new(script: Vec<(&str, Vec<CertificationOutcome>)>) -> Self {
            Self {
                script: script
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: Vec::new(),
                cleanups: 0,
            }
        }
    }

    impl Certifier for ScriptedAgent {
        async fn certify(&mut self, entry: &CertEntry) -> CertificationOutcome {
            let name = entry.full_name();
            self.calls.push(name.clone());
            match self.script.get_mut(&name).and_then(|v| {
                if v.is_empty() {
                    None
                } else {
                    Some(v.remove(0))
                }
            }) {
                Some(outcome) => outcome,
                None => CertificationOutcome::Failed("script exhausted".to_string()),
            }
        }

        async fn cleanup(&mut self) {
            self.cleanups += 1;
        }
    }

    fn temp_store(tag: &str) -> Arc<ResultStore> {
        let path = std::env::temp_dir().join(format!(
            "cert_test_{}_{}.json",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(ResultStore::open(path).expect("打开存储失败"))
    }

    fn seed_cleared_record(
        store: &ResultStore,
        name: &str,
        ts: &str,
        positive_match: bool,
        status: CertificationStatus,
    ) -> SearchRecord {
        let record = SearchRecord {
            search_key: make_search_key(ts),
            searched_name: name.to_string(),
            timestamp: ts.to_string(),
            nsopw: Some(RegistryOutcome::Offenders { offenders: vec![] }),
            ucaor: Some(RegistryOutcome::Count { count: 0 }),
            confirmed: Some(Confirmation {
                confirmed_by: ConfirmedBy {
                    counselor1: true,
                    counselor2: true,
                },
                positive_match,
                timestamp: ts.to_string(),
            }),
            certification_status: status,
        };
        store.put_record(&record).expect("写入失败");
        record
    }

    #[tokio::test]
    async fn test_eligibility_excludes_positive_matches_and_terminal_statuses() {
        let store = temp_store("eligibility");
        store
            .set_members(&[
                Member::new("John", "Smith", Some(42)),
                Member::new("Jane", "Doe", Some(35)),
                Member::new("Bob", "Jones", Some(28)),
                Member::new("Amy", "Lee", Some(30)),
            ])
            .expect("写入失败");

        // 合格：已清白 + Pending
        seed_cleared_record(
            &store,
            "john smith",
            "2024-03-01T10:00:00Z",
            false,
            CertificationStatus::Pending,
        );
        // 不合格：阳性匹配（绝不能进认证队列）
        seed_cleared_record(
            &store,
            "jane doe",
            "2024-03-01T11:00:00Z",
            true,
            CertificationStatus::Pending,
        );
        // 不合格：已是终态
        seed_cleared_record(
            &store,
            "bob jones",
            "2024-03-01T12:00:00Z",
            false,
            CertificationStatus::Added,
        );
        // 合格：之前失败过，可重试
        seed_cleared_record(
            &store,
            "amy lee",
            "2024-03-01T13:00:00Z",
            false,
            CertificationStatus::Failed("Add button not found".to_string()),
        );

        let orchestrator = CertificationOrchestrator::new(
            ScriptedAgent::new(vec![]),
            store,
            EventBus::new(),
            3,
        );
        let mut stats = CertificationStats::default();
        let queue = orchestrator.build_queue(&mut stats).expect("构建队列失败");

        let names: Vec<String> = queue.iter().map(|e| e.full_name()).collect();
        assert_eq!(names, vec!["Amy Lee".to_string(), "John Smith".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_age_is_terminal_failure_not_enqueued() {
        let store = temp_store("missing_age");
        store
            .set_members(&[Member::new("John", "Smith", None)])
            .expect("写入失败");
        let record = seed_cleared_record(
            &store,
            "john smith",
            "2024-03-01T10:00:00Z",
            false,
            CertificationStatus::Pending,
        );

        let mut orchestrator = CertificationOrchestrator::new(
            ScriptedAgent::new(vec![]),
            store.clone(),
            EventBus::new(),
            3,
        );
        let stats = orchestrator.run().await.expect("认证批处理失败");

        assert_eq!(stats.missing_age, 1);
        assert_eq!(stats.added + stats.exists + stats.failed, 0);
        // 状态已写终态失败，且队列里从未出现
        let stored = store.record(&record.search_key).expect("应有记录");
        assert_eq!(
            stored.certification_status,
            CertificationStatus::Failed("invalid or missing age".to_string())
        );
        assert!(orchestrator.agent.calls.is_empty());
    }

    #[tokio::test]
    async fn test_failed_entry_requeues_at_tail_until_attempt_cap() {
        let store = temp_store("retry");
        store
            .set_members(&[
                Member::new("John", "Smith", Some(42)),
                Member::new("Jane", "Doe", Some(35)),
            ])
            .expect("写入失败");
        // Jane 的记录更新，排在队列前面
        let john = seed_cleared_record(
            &store,
            "john smith",
            "2024-03-01T10:00:00Z",
            false,
            CertificationStatus::Pending,
        );
        seed_cleared_record(
            &store,
            "jane doe",
            "2024-03-02T10:00:00Z",
            false,
            CertificationStatus::Pending,
        );

        let agent = ScriptedAgent::new(vec![
            (
                "John Smith",
                vec![
                    CertificationOutcome::Failed("No member found".to_string()),
                    CertificationOutcome::Failed("No member found".to_string()),
                    CertificationOutcome::Failed("No member found".to_string()),
                ],
            ),
            ("Jane Doe", vec![CertificationOutcome::Added]),
        ]);
        let mut orchestrator =
            CertificationOrchestrator::new(agent, store.clone(), EventBus::new(), 3);
        let stats = orchestrator.run().await.expect("认证批处理失败");

        assert_eq!(stats.added, 1);
        assert_eq!(stats.failed, 1);
        // 失败条目每次都排到队尾：Jane 先，John 连续补位重试
        assert_eq!(
            orchestrator.agent.calls,
            vec!["Jane Doe", "John Smith", "John Smith", "John Smith"]
        );
        let stored = store.record(&john.search_key).expect("应有记录");
        assert_eq!(
            stored.certification_status,
            CertificationStatus::Failed("No member found".to_string())
        );
        // 运行标志已复位
        assert!(!store.cert_batch_flag());
    }

    #[tokio::test]
    async fn test_exists_is_terminal_and_flag_lifecycle() {
        let store = temp_store("exists");
        store
            .set_members(&[Member::new("John", "Smith", Some(42))])
            .expect("写入失败");
        let record = seed_cleared_record(
            &store,
            "john smith",
            "2024-03-01T10:00:00Z",
            false,
            CertificationStatus::Pending,
        );

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let agent = ScriptedAgent::new(vec![("John Smith", vec![CertificationOutcome::Exists])]);
        let mut orchestrator = CertificationOrchestrator::new(agent, store.clone(), bus, 3);
        let stats = orchestrator.run().await.expect("认证批处理失败");

        assert_eq!(stats.exists, 1);
        assert_eq!(
            store
                .record(&record.search_key)
                .expect("应有记录")
                .certification_status,
            CertificationStatus::Exists
        );
        // 状态事件以记录时间戳对账
        match rx.recv().await.expect("应有事件") {
            Event::CertificationStatusUpdate {
                record_timestamp,
                outcome,
            } => {
                assert_eq!(record_timestamp, record.timestamp);
                assert_eq!(outcome, CertificationOutcome::Exists);
            }
            other => panic!("收到意外事件: {:?}", other),
        }
        // 每条处理前清理一次，收尾再清理一次
        assert_eq!(orchestrator.agent.cleanups, 2);
    }
}
