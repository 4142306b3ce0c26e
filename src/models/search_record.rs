//! 查询记录模型
//!
//! 每次对一个成员发起双登记系统查询都会生成一条新的 `SearchRecord`，
//! 旧记录永久保留，"最新"由时间戳排序决定

use serde::{Deserialize, Serialize};

/// 登记系统标识 → 显示名称
pub static REGISTRY_SOURCES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "nsopw" => "NSOPW (National Sex Offender Public Website)",
    "ucaor" => "UCAOR (Utah Sex Offender Registry)",
};

/// 根据 ISO-8601 时间戳生成存储键
///
/// 把 ':' 和 '.' 替换为 '_'，保证键在任何命名空间里都安全
pub fn make_search_key(timestamp: &str) -> String {
    format!("search_{}", timestamp.replace([':', '.'], "_"))
}

/// 单个登记系统的查询结局
///
/// 注意：`Unknown`（抓取页面上没出现计数短语）和 `Count { count: 0 }`
/// 是两种不同的结局，绝不互相折算
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum RegistryOutcome {
    /// API 返回了具体的 offender 列表（可能为空）
    Offenders { offenders: Vec<Offender> },
    /// 抓取页面上匹配到了 "Found N offenders" 计数
    Count { count: u64 },
    /// 抓取页面上没有出现计数短语，结果不可判定
    Unknown,
    /// 网络/HTTP 层失败，本次查询无结果
    Failed { reason: String },
}

impl RegistryOutcome {
    /// 报表用的一行摘要
    pub fn summary(&self) -> String {
        match self {
            RegistryOutcome::Offenders { offenders } => {
                format!("{} offender(s) returned", offenders.len())
            }
            RegistryOutcome::Count { count } => format!("Found {} offenders", count),
            RegistryOutcome::Unknown => "Result undetermined".to_string(),
            RegistryOutcome::Failed { reason } => format!("Search failed: {}", reason),
        }
    }

    /// 是否有命中（仅用于展示提示，不用于清白判定）
    pub fn has_hits(&self) -> bool {
        match self {
            RegistryOutcome::Offenders { offenders } => !offenders.is_empty(),
            RegistryOutcome::Count { count } => *count > 0,
            RegistryOutcome::Unknown | RegistryOutcome::Failed { .. } => false,
        }
    }
}

/// NSOPW API 返回的 offender 条目
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Offender {
    #[serde(default)]
    pub name: OffenderName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<OffenderLocation>,
    #[serde(default, rename = "imageUri", skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, rename = "offenderUri", skip_serializing_if = "Option::is_none")]
    pub offender_uri: Option<String>,
}

impl Offender {
    /// 显示用姓名（"Given Sur"）
    pub fn display_name(&self) -> String {
        let given = self.name.given_name.as_deref().unwrap_or("");
        let sur = self.name.sur_name.as_deref().unwrap_or("");
        format!("{} {}", given, sur).trim().to_string()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct OffenderName {
    #[serde(default, rename = "givenName", skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, rename = "middleName", skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, rename = "surName", skip_serializing_if = "Option::is_none")]
    pub sur_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct OffenderLocation {
    #[serde(default, rename = "streetAddress", skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, rename = "zipCode", skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

/// 双辅导员确认标志
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfirmedBy {
    pub counselor1: bool,
    pub counselor2: bool,
}

/// 人工确认结果
///
/// 只有两位辅导员都勾选后该结构才会被写入记录，写入后不可变更
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Confirmation {
    #[serde(rename = "confirmedBy")]
    pub confirmed_by: ConfirmedBy,
    /// 辅导员最终结论：是否为阳性匹配
    #[serde(rename = "positiveMatch")]
    pub positive_match: bool,
    pub timestamp: String,
}

/// 认证条目的持久化状态
///
/// 序列化为字符串："Pending" / "Added" / "Exists" / "Failed: <reason>"
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CertificationStatus {
    Pending,
    Added,
    Exists,
    Failed(String),
}

impl Default for CertificationStatus {
    fn default() -> Self {
        CertificationStatus::Pending
    }
}

impl CertificationStatus {
    /// 是否允许（重新）进入认证队列
    pub fn is_retriable(&self) -> bool {
        matches!(self, CertificationStatus::Pending | CertificationStatus::Failed(_))
    }
}

impl From<String> for CertificationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Added" => CertificationStatus::Added,
            "Exists" => CertificationStatus::Exists,
            "Pending" => CertificationStatus::Pending,
            other => match other.strip_prefix("Failed: ") {
                Some(reason) => CertificationStatus::Failed(reason.to_string()),
                None => CertificationStatus::Pending,
            },
        }
    }
}

impl From<CertificationStatus> for String {
    fn from(status: CertificationStatus) -> Self {
        match status {
            CertificationStatus::Pending => "Pending".to_string(),
            CertificationStatus::Added => "Added".to_string(),
            CertificationStatus::Exists => "Exists".to_string(),
            CertificationStatus::Failed(reason) => format!("Failed: {}", reason),
        }
    }
}

impl std::fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from(self.clone()))
    }
}

/// 单次认证尝试的结局
#[derive(Clone, Debug, PartialEq)]
pub enum CertificationOutcome {
    Added,
    Exists,
    Failed(String),
}

impl From<CertificationOutcome> for CertificationStatus {
    fn from(outcome: CertificationOutcome) -> Self {
        match outcome {
            CertificationOutcome::Added => CertificationStatus::Added,
            CertificationOutcome::Exists => CertificationStatus::Exists,
            CertificationOutcome::Failed(reason) => CertificationStatus::Failed(reason),
        }
    }
}

/// 一次完整的双登记系统查询记录
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchRecord {
    #[serde(rename = "searchKey")]
    pub search_key: String,
    /// 被查询的名字（小写 "first last"）
    #[serde(rename = "searchedName")]
    pub searched_name: String,
    /// ISO-8601 时间戳，同时是记录排序依据和认证状态的关联键
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsopw: Option<RegistryOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ucaor: Option<RegistryOutcome>,
    /// 双辅导员确认；缺失表示尚未确认
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<Confirmation>,
    #[serde(default, rename = "certificationStatus")]
    pub certification_status: CertificationStatus,
}

impl SearchRecord {
    /// 为某个成员创建一条全新的查询记录（生成新键和当前时间戳）
    pub fn new(searched_name: impl Into<String>) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339();
        Self {
            search_key: make_search_key(&timestamp),
            searched_name: searched_name.into(),
            timestamp,
            nsopw: None,
            ucaor: None,
            confirmed: None,
            certification_status: CertificationStatus::Pending,
        }
    }

    /// 是否已获得两位辅导员的确认
    pub fn is_confirmed_by_both(&self) -> bool {
        matches!(
            &self.confirmed,
            Some(c) if c.confirmed_by.counselor1 && c.confirmed_by.counselor2
        )
    }

    /// 是否已确认清白（双确认且结论为非阳性匹配）
    ///
    /// 所有自动化步骤只认这个判定
    pub fn is_cleared(&self) -> bool {
        matches!(
            &self.confirmed,
            Some(c) if c.confirmed_by.counselor1 && c.confirmed_by.counselor2 && !c.positive_match
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_search_key_replaces_separators() {
        let key = make_search_key("2024-03-01T10:20:30.456Z");
        assert_eq!(key, "search_2024-03-01T10_20_30_456Z");
    }

    #[test]
    fn test_certification_status_string_roundtrip() {
        for status in [
            CertificationStatus::Pending,
            CertificationStatus::Added,
            CertificationStatus::Exists,
            CertificationStatus::Failed("No member found".to_string()),
        ] {
            let s = String::from(status.clone());
            assert_eq!(CertificationStatus::from(s), status);
        }
        assert_eq!(
            String::from(CertificationStatus::Failed("x".to_string())),
            "Failed: x"
        );
    }

    #[test]
    fn test_unknown_is_not_zero_count() {
        assert_ne!(RegistryOutcome::Unknown, RegistryOutcome::Count { count: 0 });
        assert!(!RegistryOutcome::Unknown.has_hits());
        assert_eq!(RegistryOutcome::Unknown.summary(), "Result undetermined");
    }

    #[test]
    fn test_cleared_requires_both_counselors_and_negative_match() {
        let mut record = SearchRecord::new("john smith");
        assert!(!record.is_cleared());

        record.confirmed = Some(Confirmation {
            confirmed_by: ConfirmedBy {
                counselor1: true,
                counselor2: false,
            },
            positive_match: false,
            timestamp: record.timestamp.clone(),
        });
        assert!(!record.is_confirmed_by_both());
        assert!(!record.is_cleared());

        record.confirmed = Some(Confirmation {
            confirmed_by: ConfirmedBy {
                counselor1: true,
                counselor2: true,
            },
            positive_match: true,
            timestamp: record.timestamp.clone(),
        });
        assert!(record.is_confirmed_by_both());
        assert!(!record.is_cleared());

        record.confirmed = Some(Confirmation {
            confirmed_by: ConfirmedBy {
                counselor1: true,
                counselor2: true,
            },
            positive_match: false,
            timestamp: record.timestamp.clone(),
        });
        assert!(record.is_cleared());
    }

    #[test]
    fn test_offender_parsing_with_missing_fields() {
        let json = serde_json::json!({
            "name": { "givenName": "John", "surName": "Doe" },
            "age": "45"
        });
        let offender: Offender = serde_json::from_value(json).expect("解析失败");
        assert_eq!(offender.display_name(), "John Doe");
        assert!(offender.locations.is_empty());
    }
}
