//! 双辅导员确认门
//!
//! 每条查询结果都必须经过两位辅导员共同确认才算有结论。
//! 硬性不变量：任何自动化步骤都不得把未获双确认（或结论为阳性匹配）
//! 的成员当作已清白

use std::sync::Arc;

use tracing::info;

use crate::bus::{Event, EventBus};
use crate::error::{AppError, AppResult, DataError};
use crate::models::{Confirmation, ConfirmedBy, SearchRecord};
use crate::storage::ResultStore;

/// 确认状态机
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConfirmationState {
    /// 无人确认
    Unreviewed,
    /// 一位辅导员已确认，等待第二位
    AwaitingSecondCounselor,
    /// 两位辅导员均已确认，结论固定
    Confirmed,
}

impl ConfirmationState {
    /// 按两个勾选标志归类
    pub fn classify(counselor1: bool, counselor2: bool) -> Self {
        match (counselor1, counselor2) {
            (true, true) => ConfirmationState::Confirmed,
            (false, false) => ConfirmationState::Unreviewed,
            _ => ConfirmationState::AwaitingSecondCounselor,
        }
    }
}

/// 确认门
pub struct ConfirmationGate {
    store: Arc<ResultStore>,
    bus: EventBus,
}

impl ConfirmationGate {
    pub fn new(store: Arc<ResultStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// 提交确认
    ///
    /// 两个标志不全为 true 时拒绝，记录保持未确认；成功后结论不可变更，
    /// 名字进入已处理集合，并广播确认事件
    pub fn confirm(
        &self,
        search_key: &str,
        counselor1: bool,
        counselor2: bool,
        positive_match: bool,
    ) -> AppResult<SearchRecord> {
        let record = self
            .store
            .record(search_key)
            .ok_or_else(|| AppError::record_not_found(search_key))?;

        if record.confirmed.is_some() {
            return Err(AppError::Data(DataError::AlreadyConfirmed {
                search_key: search_key.to_string(),
            }));
        }
        if ConfirmationState::classify(counselor1, counselor2) != ConfirmationState::Confirmed {
            return Err(AppError::confirmation_incomplete(
                record.searched_name,
                counselor1,
                counselor2,
            ));
        }

        let confirmation = Confirmation {
            confirmed_by: ConfirmedBy {
                counselor1,
                counselor2,
            },
            positive_match,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let updated = self.store.set_record_confirmation(search_key, &confirmation)?;
        self.store.set_last_search(&updated)?;
        self.store.set_counselor_confirmation(&confirmation)?;
        self.store.add_processed_name(&updated.searched_name)?;

        info!(
            "✓ 双辅导员确认完成: {} ({})",
            updated.searched_name,
            if positive_match {
                "阳性匹配"
            } else {
                "未匹配"
            }
        );
        self.bus.publish(Event::SearchConfirmed {
            search_key: search_key.to_string(),
        });
        self.bus.publish(Event::MemberSearchConfirmed {
            searched_name: updated.searched_name.clone(),
        });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CertificationStatus, RegistryOutcome};

    fn temp_store(tag: &str) -> Arc<ResultStore> {
        let path = std::env::temp_dir().join(format!(
            "confirmation_test_{}_{}.json",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(ResultStore::open(path).expect("打开存储失败"))
    }

    fn seed_record(store: &ResultStore, name: &str, ts: &str) -> SearchRecord {
        let record = SearchRecord {
            search_key: crate::models::make_search_key(ts),
            searched_name: name.to_string(),
            timestamp: ts.to_string(),
            nsopw: Some(RegistryOutcome::Offenders { offenders: vec![] }),
            ucaor: Some(RegistryOutcome::Count { count: 0 }),
            confirmed: None,
            certification_status: CertificationStatus::Pending,
        };
        store.put_record(&record).expect("写入失败");
        record
    }

    #[test]
    fn test_classify_states() {
        assert_eq!(
            ConfirmationState::classify(false, false),
            ConfirmationState::Unreviewed
        );
        assert_eq!(
            ConfirmationState::classify(true, false),
            ConfirmationState::AwaitingSecondCounselor
        );
        assert_eq!(
            ConfirmationState::classify(false, true),
            ConfirmationState::AwaitingSecondCounselor
        );
        assert_eq!(
            ConfirmationState::classify(true, true),
            ConfirmationState::Confirmed
        );
    }

    #[tokio::test]
    async fn test_single_counselor_is_rejected_and_record_untouched() {
        let store = temp_store("single");
        let record = seed_record(&store, "john smith", "2024-03-01T10:00:00Z");
        let gate = ConfirmationGate::new(store.clone(), EventBus::new());

        let result = gate.confirm(&record.search_key, true, false, false);
        assert!(result.is_err());

        let stored = store.record(&record.search_key).expect("应有记录");
        assert!(stored.confirmed.is_none());
        assert!(store.processed_names().is_empty());
    }

    #[tokio::test]
    async fn test_both_counselors_confirm_and_events_fire() {
        let store = temp_store("both");
        let record = seed_record(&store, "john smith", "2024-03-01T10:00:00Z");
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let gate = ConfirmationGate::new(store.clone(), bus);

        let updated = gate
            .confirm(&record.search_key, true, true, false)
            .expect("确认失败");
        assert!(updated.is_cleared());
        assert_eq!(store.processed_names(), vec!["john smith".to_string()]);

        match rx.recv().await.expect("应有事件") {
            Event::SearchConfirmed { search_key } => assert_eq!(search_key, record.search_key),
            other => panic!("收到意外事件: {:?}", other),
        }
        match rx.recv().await.expect("应有事件") {
            Event::MemberSearchConfirmed { searched_name } => {
                assert_eq!(searched_name, "john smith")
            }
            other => panic!("收到意外事件: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_confirmed_conclusion_is_immutable() {
        let store = temp_store("immutable");
        let record = seed_record(&store, "john smith", "2024-03-01T10:00:00Z");
        let gate = ConfirmationGate::new(store.clone(), EventBus::new());

        gate.confirm(&record.search_key, true, true, true)
            .expect("确认失败");
        // 第二次确认（试图翻转结论）必须被拒绝
        let result = gate.confirm(&record.search_key, true, true, false);
        assert!(result.is_err());

        let stored = store.record(&record.search_key).expect("应有记录");
        assert!(stored.confirmed.expect("应已确认").positive_match);
    }

    #[tokio::test]
    async fn test_missing_record_is_an_error() {
        let store = temp_store("missing");
        let gate = ConfirmationGate::new(store, EventBus::new());
        assert!(gate.confirm("search_missing", true, true, false).is_err());
    }
}
