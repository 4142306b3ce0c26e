//! 持久化存储层
//!
//! 单文件 JSON 命名空间，保存名册、查询记录、断点等全部状态

pub mod result_store;

pub use result_store::ResultStore;
