//! 登记系统 HTTP 客户端
//!
//! 只负责网络请求和响应解析，不做结局归类（那是 services 层的事）

pub mod nsopw_client;
pub mod ucaor_client;

pub use nsopw_client::NsopwClient;
pub use ucaor_client::UcaorClient;
