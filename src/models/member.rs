//! 名册成员模型

use serde::{Deserialize, Serialize};

/// 名册成员
///
/// 导入后只读，核查流程不会修改名册本身
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Member {
    /// 名（只保留第一个 given name）
    #[serde(rename = "firstName")]
    pub first_name: String,
    /// 姓
    #[serde(rename = "lastName")]
    pub last_name: String,
    /// 年龄（页面导入时可能缺失）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

impl Member {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, age: Option<u32>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
        }
    }

    /// 显示用全名（"First Last"）
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// 身份键：小写 "first last"，贯穿存储和去重
    pub fn identity_key(&self) -> String {
        format!(
            "{} {}",
            self.first_name.trim().to_lowercase(),
            self.last_name.trim().to_lowercase()
        )
    }

    /// 是否成年（18 岁及以上）
    pub fn is_adult(&self) -> bool {
        matches!(self.age, Some(age) if age >= 18)
    }
}
