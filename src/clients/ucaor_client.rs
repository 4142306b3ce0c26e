//! UCAOR 客户端
//!
//! 犹他州登记系统没有 API，只能抓取结果页原始 HTML，
//! 用正则找 "Found N offenders" 计数短语

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::{AppError, AppResult, ScrapeError};

fn count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Found\s+(\d+)\s+offenders").expect("正则表达式无效"))
}

/// 从 HTML 文本中提取 offender 计数
///
/// 短语缺失返回 `None`：页面可能改版或正在显示别的内容，
/// 绝不把"没找到短语"当成"0 个 offender"
pub fn parse_offender_count(html: &str) -> Option<u64> {
    count_regex()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// UCAOR 抓取客户端
pub struct UcaorClient {
    http: reqwest::Client,
    base_url: String,
    agency_id: String,
}

impl UcaorClient {
    pub fn new(base_url: impl Into<String>, agency_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            agency_id: agency_id.into(),
        }
    }

    /// 按姓名抓取结果页并提取计数
    ///
    /// 返回 `Ok(Some(n))` 匹配到计数、`Ok(None)` 短语缺失、`Err` 网络/HTTP 失败
    pub async fn search(&self, first_name: &str, last_name: &str) -> AppResult<Option<u64>> {
        debug!("UCAOR 抓取: {} {}", first_name, last_name);
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("AgencyID", self.agency_id.as_str()),
                ("SubmitNameSearch", "1"),
                ("OfndrLast", last_name),
                ("OfndrFirst", first_name),
                ("OfndrCity", ""),
            ])
            .header(
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(
                "referer",
                format!("https://www.icrimewatch.net/index.php?AgencyID={}", self.agency_id),
            )
            .send()
            .await
            .map_err(|e| {
                AppError::Scrape(ScrapeError::FetchFailed {
                    url: self.base_url.clone(),
                    source: Box::new(e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Scrape(ScrapeError::BadStatus {
                url: self.base_url.clone(),
                status: status.as_u16(),
            }));
        }

        let html = response.text().await.map_err(|e| {
            AppError::Scrape(ScrapeError::FetchFailed {
                url: self.base_url.clone(),
                source: Box::new(e),
            })
        })?;
        Ok(parse_offender_count(&html))
    }
}
