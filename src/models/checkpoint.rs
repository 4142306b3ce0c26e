//! 批处理断点模型
//!
//! 持久化在存储键 `batchProcessing` 下，支持暂停后续跑

use serde::{Deserialize, Serialize};

/// 暂停现场
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PausedAt {
    /// 暂停时正在处理的成员（小写身份键）
    pub member: String,
    /// 暂停时的名册下标
    pub index: usize,
    pub timestamp: String,
}

/// 批处理断点
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct BatchCheckpoint {
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "isPaused")]
    pub is_paused: bool,
    #[serde(rename = "currentIndex")]
    pub current_index: usize,
    #[serde(rename = "totalMembers")]
    pub total_members: usize,
    #[serde(default, rename = "pausedAt", skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<PausedAt>,
}

impl BatchCheckpoint {
    /// 推进到某个下标时的运行中断点
    pub fn running(current_index: usize, total_members: usize) -> Self {
        Self {
            is_active: true,
            is_paused: false,
            current_index,
            total_members,
            paused_at: None,
        }
    }

    /// 记录暂停现场
    pub fn pause(&mut self, member: impl Into<String>, timestamp: impl Into<String>) {
        self.is_paused = true;
        self.paused_at = Some(PausedAt {
            member: member.into(),
            index: self.current_index,
            timestamp: timestamp.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_records_scene() {
        let mut cp = BatchCheckpoint::running(3, 10);
        assert!(cp.is_active);
        assert!(!cp.is_paused);

        cp.pause("john smith", "2024-03-01T00:00:00Z");
        assert!(cp.is_paused);
        let paused = cp.paused_at.expect("应有暂停现场");
        assert_eq!(paused.member, "john smith");
        assert_eq!(paused.index, 3);
    }

    #[test]
    fn test_serde_field_names() {
        let cp = BatchCheckpoint::running(1, 5);
        let json = serde_json::to_value(&cp).expect("序列化失败");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["currentIndex"], 1);
        assert_eq!(json["totalMembers"], 5);
        assert!(json.get("pausedAt").is_none());
    }
}
