//! # Registry Check
//!
//! 一个用于自动化核查名册成员是否出现在公开性犯罪者登记系统中的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `wait` - 带超时的尽力等待原语（自动化目标页面没有就绪信号）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个成员
//! - `NsopwProvider` / `UcaorProvider` - 两个登记系统的查询能力
//! - `LcrCertificationAgent` - LCR 认证自动化能力
//! - `RosterImporter` - 名册导入能力（页面抓取 / TOML 文件）
//! - `report` - 报表数据投影能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个成员"的完整处理流程
//! - `SearchFlow` - 双登记系统并发查询 → 合并 → 持久化
//! - `ConfirmationGate` - 双辅导员人工确认状态机
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_orchestrator` - 批量名册处理器，串行推进、断点续跑
//! - `orchestrator/certification_orchestrator` - 认证队列处理器，失败重排队
//!
//! ## 横切模块
//!
//! - `storage/` - ResultStore：JSON 命名空间的持久化存储
//! - `bus` - 类型化事件总线（替代字符串标签消息）
//! - `models/` - Member / SearchRecord / BatchCheckpoint 等数据模型

pub mod app;
pub mod browser;
pub mod bus;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser, open_page};
pub use bus::{Event, EventBus};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{wait, JsExecutor};
pub use models::{
    BatchCheckpoint, CertificationOutcome, CertificationStatus, Confirmation, Member,
    RegistryOutcome, SearchRecord,
};
pub use orchestrator::{
    BatchCommand, BatchHandle, BatchOrchestrator, BatchState, CertificationOrchestrator, Certifier,
};
pub use services::{NsopwProvider, RosterImporter, SearchProvider, UcaorProvider};
pub use storage::ResultStore;
pub use workflow::{ConfirmationGate, SearchFlow};
