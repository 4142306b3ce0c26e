//! 浏览器连接层
//!
//! 通过调试端口挂接到已登录的 Chrome（登录态由人提供，程序不碰凭据）

pub mod connection;

pub use connection::{connect_to_browser, find_page_by_title, open_page};
