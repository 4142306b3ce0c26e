//! 尽力等待原语
//!
//! 自动化目标页面没有就绪信号，只能轮询探测。等待是尽力而为的：
//! 超时后流程继续推进，但会留下日志，不会无声吞掉

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// 等待结局
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WaitOutcome {
    /// 条件在超时前成立
    Satisfied,
    /// 超时耗尽，条件仍未成立
    Exhausted,
}

/// 轮询探测直到条件成立或超时耗尽
///
/// `what` 只用于日志描述
pub async fn wait_until<F, Fut>(
    what: &str,
    timeout_ms: u64,
    poll_interval_ms: u64,
    mut probe: F,
) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if probe().await {
            debug!("✓ 等待条件成立: {}", what);
            return WaitOutcome::Satisfied;
        }
        if Instant::now() >= deadline {
            warn!("⚠️ 等待超时 ({}ms): {}", timeout_ms, what);
            return WaitOutcome::Exhausted;
        }
        sleep(Duration::from_millis(poll_interval_ms)).await;
    }
}

/// 固定时长的渲染等待
pub async fn settle(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}
