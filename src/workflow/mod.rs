//! 流程层
//!
//! 定义"一个成员"的完整处理流程：双系统查询与双辅导员确认

pub mod confirmation;
pub mod search_flow;

pub use confirmation::{ConfirmationGate, ConfirmationState};
pub use search_flow::SearchFlow;
