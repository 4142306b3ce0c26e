//! 编排层
//!
//! 把单成员流程串成批量作业：名册批处理（串行推进、断点续跑）
//! 和认证队列处理（失败重排队、上限封顶）

pub mod batch_orchestrator;
pub mod certification_orchestrator;

pub use batch_orchestrator::{
    BatchCommand, BatchHandle, BatchOrchestrator, BatchState, BatchStats,
};
pub use certification_orchestrator::{
    CertEntry, CertificationOrchestrator, CertificationStats, Certifier,
};
