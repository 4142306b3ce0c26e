//! 基础设施层
//!
//! 持有稀缺资源（Page），只暴露能力，不认识任何业务概念

pub mod js_executor;
pub mod wait;

pub use js_executor::JsExecutor;
