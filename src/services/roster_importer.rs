//! 名册导入能力
//!
//! 支持两种来源：
//! - LCR 成员列表页面（通过 JsExecutor 扫描 member-card 行）
//! - 本地 TOML 名册文件
//!
//! 两条路径共用同一套过滤规则：只收成年人（18+）、按身份键去重；
//! `require_age` 控制缺年龄的条目是丢弃还是保留

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, StorageError};
use crate::infrastructure::JsExecutor;
use crate::models::Member;

/// 页面扫描脚本：只取原始文本，名字解析放在 Rust 侧做
const EXTRACT_MEMBERS_JS: &str = r#"
(() => {
    const out = [];
    document.querySelectorAll('member-card').forEach(card => {
        const row = card.closest('tr');
        if (!row) return;
        const nameSpan = card.querySelector('span.ng-binding');
        if (!nameSpan) return;
        const ageCell = row.querySelector('td.age');
        out.push({
            name: nameSpan.textContent.trim(),
            age: ageCell ? ageCell.textContent.trim() : null
        });
    });
    return out;
})()
"#;

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default)]
    age: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    members: Vec<Member>,
}

/// 把 "Last, First Middle" 解析为 (first, last)，first 只取第一个词
pub fn parse_roster_name(full_name: &str) -> Option<(String, String)> {
    let (last, rest) = full_name.split_once(',')?;
    let first = rest.trim().split_whitespace().next()?;
    let last = last.trim();
    if first.is_empty() || last.is_empty() {
        return None;
    }
    Some((first.to_string(), last.to_string()))
}

/// 名册导入器
pub struct RosterImporter {
    require_age: bool,
}

impl RosterImporter {
    pub fn new(require_age: bool) -> Self {
        Self { require_age }
    }

    /// 从 LCR 成员列表页面导入
    ///
    /// 页面用的是无限滚动，调用方需保证列表已完整加载
    pub async fn import_from_page(&self, executor: &JsExecutor) -> AppResult<Vec<Member>> {
        let raw: Vec<RawEntry> = executor
            .eval_as(EXTRACT_MEMBERS_JS)
            .await
            .map_err(|e| AppError::Other(format!("成员列表扫描失败: {}", e)))?;
        info!("🔍 页面扫描到 {} 行成员数据", raw.len());

        let mut members = Vec::new();
        for entry in raw {
            let Some((first, last)) = parse_roster_name(&entry.name) else {
                warn!("⚠️ 无法解析成员姓名: {}", entry.name);
                continue;
            };
            let age = entry.age.as_deref().and_then(|a| a.trim().parse::<u32>().ok());
            members.push(Member::new(first, last, age));
        }
        Ok(self.filter_and_dedupe(members))
    }

    /// 从本地 TOML 名册文件导入
    pub fn import_from_toml(&self, path: &str) -> AppResult<Vec<Member>> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Storage(StorageError::ReadFailed {
                path: path.to_string(),
                source: Box::new(e),
            })
        })?;
        let file: RosterFile = toml::from_str(&raw).map_err(|e| {
            AppError::Storage(StorageError::ParseFailed {
                path: path.to_string(),
                source: Box::new(e),
            })
        })?;
        Ok(self.filter_and_dedupe(file.members))
    }

    /// 过滤 + 去重：未成年人永远丢弃；缺年龄视 `require_age` 而定
    fn filter_and_dedupe(&self, members: Vec<Member>) -> Vec<Member> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for member in members {
            match member.age {
                Some(age) if age < 18 => continue,
                None if self.require_age => {
                    warn!("⚠️ 成员 {} 缺少年龄，已跳过", member.full_name());
                    continue;
                }
                _ => {}
            }
            if seen.insert(member.identity_key()) {
                result.push(member);
            }
        }
        info!("✓ 名册导入完成: {} 名成年成员", result.len());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roster_name_takes_first_given_name_only() {
        assert_eq!(
            parse_roster_name("Smith, John Michael"),
            Some(("John".to_string(), "Smith".to_string()))
        );
        assert_eq!(
            parse_roster_name("Doe, Jane"),
            Some(("Jane".to_string(), "Doe".to_string()))
        );
        assert_eq!(parse_roster_name("NoComma John"), None);
        assert_eq!(parse_roster_name("Smith, "), None);
    }

    #[test]
    fn test_filter_drops_minors_and_dedupes() {
        let importer = RosterImporter::new(true);
        let members = vec![
            Member::new("John", "Smith", Some(42)),
            Member::new("john", "SMITH", Some(42)),
            Member::new("Kid", "Smith", Some(12)),
            Member::new("Jane", "Doe", Some(18)),
        ];
        let result = importer.filter_and_dedupe(members);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].first_name, "John");
        assert_eq!(result[1].first_name, "Jane");
    }

    #[test]
    fn test_require_age_controls_ageless_entries() {
        let members = vec![Member::new("John", "Smith", None)];

        let strict = RosterImporter::new(true);
        assert!(strict.filter_and_dedupe(members.clone()).is_empty());

        let lenient = RosterImporter::new(false);
        assert_eq!(lenient.filter_and_dedupe(members).len(), 1);
    }

    #[test]
    fn test_import_from_toml() {
        let path = std::env::temp_dir().join(format!("roster_test_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[[members]]
firstName = "John"
lastName = "Smith"
age = 42

[[members]]
firstName = "Kid"
lastName = "Smith"
age = 10
"#,
        )
        .expect("写入临时文件失败");

        let importer = RosterImporter::new(true);
        let members = importer
            .import_from_toml(path.to_str().expect("路径无效"))
            .expect("导入失败");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].identity_key(), "john smith");

        let _ = std::fs::remove_file(&path);
    }
}
