//! 数据模型层
//!
//! 定义名册成员、查询记录、批处理断点等核心数据结构

pub mod checkpoint;
pub mod member;
pub mod search_record;

pub use checkpoint::{BatchCheckpoint, PausedAt};
pub use member::Member;
pub use search_record::{
    make_search_key, CertificationOutcome, CertificationStatus, Confirmation, ConfirmedBy,
    Offender, OffenderLocation, OffenderName, RegistryOutcome, SearchRecord, REGISTRY_SOURCES,
};
