//! 业务能力层
//!
//! 每个服务描述"我能做什么"，只处理单个成员，不关心批量编排

pub mod certification_agent;
pub mod registry_search;
pub mod report;
pub mod roster_importer;

pub use certification_agent::LcrCertificationAgent;
pub use registry_search::{NsopwProvider, SearchProvider, UcaorProvider};
pub use report::{build_report, ReportRow};
pub use roster_importer::RosterImporter;
