//! 登记系统查询能力
//!
//! `SearchProvider` 是双登记系统的统一口径：查询永远"成功返回一个结局"，
//! 网络失败被折算成 `RegistryOutcome::Failed`，绝不跨边界抛 `Err`。
//! 这样一个系统挂掉不会连累另一个系统的结果落盘

use std::future::Future;

use tracing::warn;

use crate::clients::{NsopwClient, UcaorClient};
use crate::config::Config;
use crate::models::RegistryOutcome;

/// 登记系统查询能力
pub trait SearchProvider: Send + Sync {
    /// 登记系统标识（"nsopw" / "ucaor"）
    fn source_id(&self) -> &'static str;

    /// 按姓名查询，任何失败都折算进返回的结局
    fn search(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> impl Future<Output = RegistryOutcome> + Send;
}

/// NSOPW（全国，JSON API）
pub struct NsopwProvider {
    client: NsopwClient,
}

impl NsopwProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            client: NsopwClient::new(&config.nsopw_api_url),
        }
    }
}

impl SearchProvider for NsopwProvider {
    fn source_id(&self) -> &'static str {
        "nsopw"
    }

    async fn search(&self, first_name: &str, last_name: &str) -> RegistryOutcome {
        match self.client.search(first_name, last_name).await {
            Ok(offenders) => RegistryOutcome::Offenders { offenders },
            Err(e) => {
                warn!("⚠️ NSOPW 查询失败 ({} {}): {}", first_name, last_name, e);
                RegistryOutcome::Failed {
                    reason: "Search failed".to_string(),
                }
            }
        }
    }
}

/// UCAOR（犹他州，HTML 抓取）
pub struct UcaorProvider {
    client: UcaorClient,
}

impl UcaorProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            client: UcaorClient::new(&config.ucaor_base_url, &config.ucaor_agency_id),
        }
    }
}

impl SearchProvider for UcaorProvider {
    fn source_id(&self) -> &'static str {
        "ucaor"
    }

    async fn search(&self, first_name: &str, last_name: &str) -> RegistryOutcome {
        match self.client.search(first_name, last_name).await {
            // 计数短语缺失 ≠ 0 个：页面可能改版，结果交给人工复核
            Ok(None) => {
                warn!(
                    "⚠️ UCAOR 页面未出现计数短语 ({} {})，结果不可判定",
                    first_name, last_name
                );
                RegistryOutcome::Unknown
            }
            Ok(Some(count)) => RegistryOutcome::Count { count },
            Err(e) => {
                warn!("⚠️ UCAOR 抓取失败 ({} {}): {}", first_name, last_name, e);
                RegistryOutcome::Failed {
                    reason: "Search failed".to_string(),
                }
            }
        }
    }
}
