//! 类型化事件总线
//!
//! 组件间通信使用带类型的事件枚举（基于 tokio broadcast），
//! 发布方不关心有没有订阅者，订阅方按需过滤自己关心的事件

use tokio::sync::broadcast;

/// 应用内事件
#[derive(Clone, Debug)]
pub enum Event {
    /// 批处理开始查询某个成员
    MemberSearchStarted {
        searched_name: String,
        batch_index: usize,
        total_members: usize,
    },
    /// 某条查询记录完成了双辅导员确认
    SearchConfirmed { search_key: String },
    /// 某个成员（按名字）完成确认，批处理可以推进到下一个
    MemberSearchConfirmed { searched_name: String },
    /// 认证条目状态更新（以记录时间戳关联）
    CertificationStatusUpdate {
        record_timestamp: String,
        outcome: crate::models::CertificationOutcome,
    },
}

/// 事件总线
///
/// Clone 后各持有同一个 broadcast 通道的发送端
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// 创建新的事件总线
    pub fn new() -> Self {
        // 容量足够覆盖单成员处理期间的事件积压
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// 发布事件（没有订阅者时静默丢弃）
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(Event::MemberSearchConfirmed {
            searched_name: "john smith".to_string(),
        });

        let event = rx.recv().await.expect("应能收到事件");
        match event {
            Event::MemberSearchConfirmed { searched_name } => {
                assert_eq!(searched_name, "john smith");
            }
            other => panic!("收到意外事件: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_is_silent() {
        let bus = EventBus::new();
        // 没有订阅者也不应 panic
        bus.publish(Event::SearchConfirmed {
            search_key: "search_x".to_string(),
        });
    }
}
