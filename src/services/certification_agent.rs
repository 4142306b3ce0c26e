//! LCR 认证自动化能力
//!
//! 通过浏览器把"已确认未匹配"的成员写进 LCR 的认证页面：
//! 开新标签页 → 页内成员查找 API 拿 uuid → 跳转档案页 → 找认证选项卡 →
//! 查重（精确 / 大比例子串 / "already exists" 提示）→ 填表点添加。
//! 目标页面没有任何就绪信号，节奏靠固定等待 + 轮询探测

use chromiumoxide::{Browser, Page};
use tracing::{debug, info, warn};

use crate::browser::open_page;
use crate::config::Config;
use crate::infrastructure::{wait, JsExecutor};
use crate::models::CertificationOutcome;
use crate::orchestrator::{CertEntry, Certifier};

/// 查询参数的百分号编码（保守集合：字母数字和 -_.~ 之外全部转义）
fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[derive(serde::Deserialize)]
struct LookupResult {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// LCR 认证代理
///
/// 每条认证在独立标签页里走完；标签页登记在 `open_tabs`，
/// 由 `cleanup()` 统一关闭
pub struct LcrCertificationAgent {
    browser: Browser,
    config: Config,
    open_tabs: Vec<Page>,
}

impl LcrCertificationAgent {
    pub fn new(browser: Browser, config: Config) -> Self {
        Self {
            browser,
            config,
            open_tabs: Vec::new(),
        }
    }

    async fn settle(&self) {
        wait::settle(self.config.page_settle_ms).await;
    }

    /// 尽力等页面渲染完成（超时继续推进，只留日志）
    async fn wait_for_render(&self, executor: &JsExecutor, what: &str) {
        wait::wait_until(
            what,
            self.config.wait_timeout_ms,
            self.config.wait_poll_interval_ms,
            || async move {
                executor
                    .eval_bool("document.readyState === 'complete'")
                    .await
                    .unwrap_or(false)
            },
        )
        .await;
    }

    /// 页内调用成员查找 API，取档案 uuid
    async fn lookup_member_uuid(
        &self,
        executor: &JsExecutor,
        entry: &CertEntry,
    ) -> Result<String, CertificationOutcome> {
        let term = percent_encode(&entry.full_name().to_lowercase());
        let js = format!(
            r#"(async () => {{
    const response = await fetch("{api}?term={term}&timestamp=" + Date.now(), {{
        method: "GET",
        headers: {{ "accept": "application/json" }},
        credentials: "include"
    }});
    if (!response.ok) return {{ error: "HTTP " + response.status }};
    const data = await response.json();
    if (data && data.memberResults && data.memberResults.length > 0) {{
        return {{ uuid: data.memberResults[0].uuid }};
    }}
    return {{ error: "not found" }};
}})()"#,
            api = self.config.member_lookup_api_url,
            term = term,
        );

        let result: LookupResult = executor.eval_as(js).await.map_err(|e| {
            warn!("❌ 成员查找 API 调用失败: {}", e);
            CertificationOutcome::Failed(format!("Search error: {}", e))
        })?;
        match result.uuid {
            Some(uuid) => Ok(uuid),
            None => {
                debug!("成员查找无结果: {:?}", result.error);
                Err(CertificationOutcome::Failed("No member found".to_string()))
            }
        }
    }

    /// 在档案页找到认证选项卡并点击（大小写不敏感的 "certif" 锚点扫描）
    async fn open_certification_tab(
        &self,
        executor: &JsExecutor,
    ) -> Result<(), CertificationOutcome> {
        let clicked = executor
            .eval_bool(
                r#"(() => {
    const tab = Array.from(document.querySelectorAll('li a')).find(a =>
        a.textContent && a.textContent.toLowerCase().includes('certif'));
    if (!tab) return false;
    tab.click();
    return true;
})()"#,
            )
            .await
            .unwrap_or(false);
        if clicked {
            Ok(())
        } else {
            Err(CertificationOutcome::Failed(
                "Certification tab not found".to_string(),
            ))
        }
    }

    /// 查重：表格行扫描（精确 / ≥70% 长度的子串）+ "already exists" 提示文本
    async fn certification_exists(&self, executor: &JsExecutor) -> bool {
        let target = serde_json::Value::String(self.config.certification_name.clone()).to_string();
        let js = format!(
            r#"(() => {{
    const target = {target};
    const pageText = document.body.textContent || '';
    if (pageText.includes("'" + target + "'") &&
        (pageText.includes('already exists') || pageText.includes('No action taken'))) {{
        return true;
    }}
    const rows = document.querySelectorAll('table tr');
    for (const row of rows) {{
        const cell = row.querySelector('td:first-child') || row.firstElementChild;
        if (!cell) continue;
        const certName = cell.textContent.trim();
        if (!certName || certName.toLowerCase() === 'certification') continue;
        if (certName === target) return true;
        if ((certName.includes(target) || target.includes(certName)) &&
            certName.length > target.length * 0.7) {{
            return true;
        }}
    }}
    const alerts = document.querySelectorAll('.alert, .notification, [role="alert"]');
    for (const el of alerts) {{
        const text = (el.textContent || '').trim();
        if (text.includes(target) &&
            (text.includes('already exists') || text.includes('No action taken'))) {{
            return true;
        }}
    }}
    return false;
}})()"#,
        );
        executor.eval_bool(js).await.unwrap_or(false)
    }

    /// 打开添加表单、填字段、点最终 Add 按钮
    async fn add_certification(
        &self,
        executor: &JsExecutor,
    ) -> Result<(), CertificationOutcome> {
        let opened = executor
            .eval_bool(
                r#"(() => {
    const link = Array.from(document.querySelectorAll('a')).find(a =>
        a.textContent && a.textContent.includes('Add') &&
        a.textContent.includes('Certification'));
    if (!link) return false;
    link.click();
    return true;
})()"#,
            )
            .await
            .unwrap_or(false);
        if !opened {
            return Err(CertificationOutcome::Failed(
                "Add Certification button not found".to_string(),
            ));
        }
        self.settle().await;

        let name = serde_json::Value::String(self.config.certification_name.clone()).to_string();
        let doc_id =
            serde_json::Value::String(self.config.certification_document_id.clone()).to_string();
        let expiration =
            serde_json::Value::String(self.config.certification_expiration.clone()).to_string();
        let fill_js = format!(
            r#"(() => {{
    const nameInput = document.querySelector('#cert-name') ||
        document.querySelector('input[id*="cert"][id*="name"]');
    const numberInput = document.querySelector('#cert-number') ||
        document.querySelector('input[id*="cert"][id*="number"]');
    const expirationInput = document.querySelector('#expirationDate') ||
        document.querySelector('input.hasDatepicker');
    if (!nameInput || !numberInput || !expirationInput) return false;
    const fill = (input, value) => {{
        input.value = value;
        input.dispatchEvent(new Event('input', {{ bubbles: true }}));
        input.dispatchEvent(new Event('change', {{ bubbles: true }}));
    }};
    fill(nameInput, {name});
    fill(numberInput, {doc_id});
    fill(expirationInput, {expiration});
    return true;
}})()"#,
        );
        let filled = executor.eval_bool(fill_js).await.unwrap_or(false);
        if !filled {
            return Err(CertificationOutcome::Failed(
                "Certification form fields not found".to_string(),
            ));
        }
        self.settle().await;

        let clicked = executor
            .eval_bool(
                r#"(() => {
    let btn = Array.from(document.querySelectorAll('button.btn.btn-primary')).find(b =>
        b.textContent.trim() === 'Add');
    if (!btn) {
        btn = Array.from(document.querySelectorAll('button')).find(b => {
            const t = b.textContent.trim();
            return t === 'Add' || (t.includes('Add') && !t.includes('Cancel'));
        });
    }
    if (!btn) return false;
    btn.click();
    return true;
})()"#,
            )
            .await
            .unwrap_or(false);
        if clicked {
            Ok(())
        } else {
            Err(CertificationOutcome::Failed(
                "Add button not found".to_string(),
            ))
        }
    }

    async fn run_certification(&mut self, entry: &CertEntry) -> CertificationOutcome {
        // 每条认证用全新标签页，登记后由 cleanup 统一关闭
        let page = match open_page(&self.browser, &self.config.lcr_member_list_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!("❌ 打开 LCR 标签页失败: {}", e);
                return CertificationOutcome::Failed(format!("Tab open error: {}", e));
            }
        };
        self.open_tabs.push(page.clone());
        let executor = JsExecutor::new(page);

        self.settle().await;
        self.wait_for_render(&executor, "LCR 成员列表页面渲染").await;

        let uuid = match self.lookup_member_uuid(&executor, entry).await {
            Ok(uuid) => uuid,
            Err(outcome) => return outcome,
        };
        debug!("成员档案 uuid: {}", uuid);

        let profile_url = format!("{}/{}", self.config.lcr_profile_base_url, uuid);
        if let Err(e) = executor.navigate(&profile_url).await {
            warn!("❌ 跳转档案页失败: {}", e);
            return CertificationOutcome::Failed(format!("Navigation error: {}", e));
        }
        self.settle().await;
        self.wait_for_render(&executor, "成员档案页面渲染").await;

        if let Err(outcome) = self.open_certification_tab(&executor).await {
            return outcome;
        }
        self.settle().await;

        if self.certification_exists(&executor).await {
            info!("✓ 认证已存在: {}", entry.full_name());
            return CertificationOutcome::Exists;
        }

        match self.add_certification(&executor).await {
            Ok(()) => CertificationOutcome::Added,
            Err(outcome) => outcome,
        }
    }
}

impl Certifier for LcrCertificationAgent {
    async fn certify(&mut self, entry: &CertEntry) -> CertificationOutcome {
        self.run_certification(entry).await
    }

    async fn cleanup(&mut self) {
        for page in self.open_tabs.drain(..) {
            if let Err(e) = page.close().await {
                debug!("关闭标签页失败（忽略）: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode_lowercased_name() {
        assert_eq!(percent_encode("john smith"), "john%20smith");
        assert_eq!(percent_encode("o'brien"), "o%27brien");
        assert_eq!(percent_encode("abc-123_x.~"), "abc-123_x.~");
    }
}
