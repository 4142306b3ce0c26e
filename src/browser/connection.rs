use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到调试端口上的浏览器
pub async fn connect_to_browser(port: u16) -> Result<Browser> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok(browser)
}

/// 在已连接的浏览器里打开新标签页并导航
pub async fn open_page(browser: &Browser, url: &str) -> Result<Page> {
    debug!("创建新页面并导航到: {}", url);
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        e
    })?;
    page.goto(url).await.map_err(|e| {
        error!("导航到 {} 失败: {}", url, e);
        e
    })?;
    info!("已导航到: {}", url);
    Ok(page)
}

/// 按标题查找已打开的页面
pub async fn find_page_by_title(browser: &Browser, title: &str) -> Result<Option<Page>> {
    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());
    for p in pages.iter() {
        if let Ok(Some(page_title)) = p.get_title().await {
            if page_title.contains(title) {
                info!("✓ 找到目标页面: {}", page_title);
                return Ok(Some(p.clone()));
            }
        }
    }
    debug!("未找到标题包含 '{}' 的页面", title);
    Ok(None)
}
