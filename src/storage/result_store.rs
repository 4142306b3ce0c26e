//! 结果存储
//!
//! 一个 JSON 文件充当键值命名空间，所有写入都整体重写文件。
//! 键约定：
//! - `members`               名册（数组）
//! - `search_<时间戳>`       单条查询记录
//! - `lastSearchResults`     最近一次查询记录的镜像
//! - `processedMemberNames`  已处理名字集合（小写）
//! - `batchProcessing`       批处理断点
//! - `isBatchProcessing`     认证批处理运行标志
//! - `counselorConfirmation` 最近一次确认的暂存值

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::{AppError, AppResult, StorageError};
use crate::models::{BatchCheckpoint, CertificationStatus, Confirmation, Member, SearchRecord};

const KEY_MEMBERS: &str = "members";
const KEY_LAST_SEARCH: &str = "lastSearchResults";
const KEY_PROCESSED_NAMES: &str = "processedMemberNames";
const KEY_CHECKPOINT: &str = "batchProcessing";
const KEY_CERT_BATCH_FLAG: &str = "isBatchProcessing";
const KEY_COUNSELOR_CONFIRMATION: &str = "counselorConfirmation";
const SEARCH_KEY_PREFIX: &str = "search_";

/// 结果存储
pub struct ResultStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl ResultStore {
    /// 打开（或新建）存储文件
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Storage(StorageError::ReadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                AppError::Storage(StorageError::ParseFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })
            })?
        } else {
            Map::new()
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, data: &Map<String, Value>) -> AppResult<()> {
        let serialized = serde_json::to_string_pretty(&Value::Object(data.clone()))?;
        std::fs::write(&self.path, serialized).map_err(|e| {
            AppError::Storage(StorageError::WriteFailed {
                path: self.path.display().to_string(),
                source: Box::new(e),
            })
        })
    }

    // ========== 名册 ==========

    /// 读取名册（缺失时返回空）
    pub fn members(&self) -> Vec<Member> {
        let data = self.lock();
        data.get(KEY_MEMBERS)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// 覆盖写入名册
    pub fn set_members(&self, members: &[Member]) -> AppResult<()> {
        let mut data = self.lock();
        data.insert(KEY_MEMBERS.to_string(), serde_json::to_value(members)?);
        self.persist(&data)
    }

    // ========== 查询记录 ==========

    /// 写入（或覆盖）一条查询记录
    pub fn put_record(&self, record: &SearchRecord) -> AppResult<()> {
        let mut data = self.lock();
        data.insert(record.search_key.clone(), serde_json::to_value(record)?);
        self.persist(&data)
    }

    /// 按键读取单条记录
    pub fn record(&self, search_key: &str) -> Option<SearchRecord> {
        let data = self.lock();
        data.get(search_key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// 读取全部查询记录，按时间戳从新到旧排序
    pub fn all_records(&self) -> Vec<SearchRecord> {
        let data = self.lock();
        let mut records: Vec<SearchRecord> = data
            .iter()
            .filter(|(key, _)| key.starts_with(SEARCH_KEY_PREFIX))
            .filter_map(|(_, v)| serde_json::from_value(v.clone()).ok())
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    /// 某个名字的最新记录
    pub fn latest_record_for(&self, searched_name: &str) -> Option<SearchRecord> {
        let name = searched_name.to_lowercase();
        self.all_records()
            .into_iter()
            .find(|r| r.searched_name == name)
    }

    /// 某个名字下已获双辅导员确认的记录（任意一条即可）
    pub fn confirmed_record_for(&self, searched_name: &str) -> Option<SearchRecord> {
        let name = searched_name.to_lowercase();
        self.all_records()
            .into_iter()
            .find(|r| r.searched_name == name && r.is_confirmed_by_both())
    }

    /// 镜像写入最近一次查询记录
    pub fn set_last_search(&self, record: &SearchRecord) -> AppResult<()> {
        let mut data = self.lock();
        data.insert(KEY_LAST_SEARCH.to_string(), serde_json::to_value(record)?);
        self.persist(&data)
    }

    /// 把确认写到指定记录上
    pub fn set_record_confirmation(
        &self,
        search_key: &str,
        confirmation: &Confirmation,
    ) -> AppResult<SearchRecord> {
        let mut data = self.lock();
        let value = data
            .get(search_key)
            .cloned()
            .ok_or_else(|| AppError::record_not_found(search_key))?;
        let mut record: SearchRecord = serde_json::from_value(value)?;
        record.confirmed = Some(confirmation.clone());
        data.insert(search_key.to_string(), serde_json::to_value(&record)?);
        self.persist(&data)?;
        Ok(record)
    }

    /// 更新指定记录的认证状态
    pub fn update_certification_status(
        &self,
        search_key: &str,
        status: CertificationStatus,
    ) -> AppResult<()> {
        let mut data = self.lock();
        let value = data
            .get(search_key)
            .cloned()
            .ok_or_else(|| AppError::record_not_found(search_key))?;
        let mut record: SearchRecord = serde_json::from_value(value)?;
        record.certification_status = status;
        data.insert(search_key.to_string(), serde_json::to_value(&record)?);
        self.persist(&data)
    }

    // ========== 已处理名字集合 ==========

    pub fn processed_names(&self) -> Vec<String> {
        let data = self.lock();
        data.get(KEY_PROCESSED_NAMES)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn add_processed_name(&self, name: &str) -> AppResult<()> {
        let mut names = self.processed_names();
        let name = name.to_lowercase();
        if !names.contains(&name) {
            names.push(name);
        }
        let mut data = self.lock();
        data.insert(KEY_PROCESSED_NAMES.to_string(), serde_json::to_value(&names)?);
        self.persist(&data)
    }

    pub fn remove_processed_name(&self, name: &str) -> AppResult<()> {
        let name = name.to_lowercase();
        let names: Vec<String> = self
            .processed_names()
            .into_iter()
            .filter(|n| *n != name)
            .collect();
        let mut data = self.lock();
        data.insert(KEY_PROCESSED_NAMES.to_string(), serde_json::to_value(&names)?);
        self.persist(&data)
    }

    pub fn clear_processed_names(&self) -> AppResult<()> {
        let mut data = self.lock();
        data.remove(KEY_PROCESSED_NAMES);
        self.persist(&data)
    }

    // ========== 批处理断点 ==========

    pub fn checkpoint(&self) -> Option<BatchCheckpoint> {
        let data = self.lock();
        data.get(KEY_CHECKPOINT)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set_checkpoint(&self, checkpoint: &BatchCheckpoint) -> AppResult<()> {
        let mut data = self.lock();
        data.insert(KEY_CHECKPOINT.to_string(), serde_json::to_value(checkpoint)?);
        self.persist(&data)
    }

    pub fn clear_checkpoint(&self) -> AppResult<()> {
        let mut data = self.lock();
        data.remove(KEY_CHECKPOINT);
        self.persist(&data)
    }

    // ========== 认证批处理标志 / 确认暂存 ==========

    pub fn cert_batch_flag(&self) -> bool {
        let data = self.lock();
        data.get(KEY_CERT_BATCH_FLAG)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_cert_batch_flag(&self, active: bool) -> AppResult<()> {
        let mut data = self.lock();
        data.insert(KEY_CERT_BATCH_FLAG.to_string(), Value::Bool(active));
        self.persist(&data)
    }

    /// 暂存最近一次确认（供外部查看）
    pub fn set_counselor_confirmation(&self, confirmation: &Confirmation) -> AppResult<()> {
        let mut data = self.lock();
        data.insert(
            KEY_COUNSELOR_CONFIRMATION.to_string(),
            serde_json::to_value(confirmation)?,
        );
        self.persist(&data)
    }

    // ========== 批量清理 ==========

    /// 清空所有查询数据（记录、镜像、确认暂存），名册保留
    pub fn clear_search_data(&self) -> AppResult<()> {
        let mut data = self.lock();
        data.retain(|key, _| {
            !key.starts_with(SEARCH_KEY_PREFIX)
                && key != KEY_LAST_SEARCH
                && key != KEY_COUNSELOR_CONFIRMATION
        });
        self.persist(&data)
    }
}
