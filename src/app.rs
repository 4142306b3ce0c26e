//! 应用入口编排
//!
//! ## 职责
//!
//! 1. **初始化**：日志文件、持久化存储、事件总线
//! 2. **名册准备**：存储为空时从 TOML 文件或 LCR 页面导入
//! 3. **批量核查**：串行跑完名册，确认由人在终端逐个给出
//! 4. **认证批处理**：对已确认未匹配的成员跑 LCR 认证自动化
//! 5. **资源管理**：唯一持有 Browser 的模块

use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use tracing::{info, warn};

use crate::browser::{connect_to_browser, find_page_by_title, open_page};
use crate::bus::{Event, EventBus};
use crate::config::Config;
use crate::infrastructure::{wait, JsExecutor};
use crate::models::REGISTRY_SOURCES;
use crate::orchestrator::{BatchOrchestrator, CertificationOrchestrator};
use crate::services::{
    LcrCertificationAgent, NsopwProvider, RosterImporter, UcaorProvider,
};
use crate::storage::ResultStore;
use crate::utils::logging;
use crate::workflow::{ConfirmationGate, SearchFlow};

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<ResultStore>,
    bus: EventBus,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(&config);

        let store = Arc::new(
            ResultStore::open(&config.store_path)
                .with_context(|| format!("打开存储文件失败: {}", config.store_path))?,
        );

        Ok(Self {
            config,
            store,
            bus: EventBus::new(),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<()> {
        // 连接浏览器（名册页面导入和认证自动化共用）
        let browser = connect_to_browser(self.config.browser_debug_port)
            .await
            .context("连接浏览器失败，请确认 Chrome 已用调试端口启动")?;

        self.ensure_roster(&browser).await?;
        if self.store.members().is_empty() {
            warn!("⚠️ 名册为空，程序结束");
            return Ok(());
        }

        // 人工确认驱动：查询完成后在终端逐个问两位辅导员
        self.spawn_confirmation_driver();

        // 批量核查
        let flow = SearchFlow::new(
            NsopwProvider::new(&self.config),
            UcaorProvider::new(&self.config),
            self.store.clone(),
        );
        let (mut batch, handle) =
            BatchOrchestrator::new(flow, self.store.clone(), self.bus.clone());

        // Ctrl-C 映射为停止命令
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.stop().await;
            }
        });

        let resume = self
            .store
            .checkpoint()
            .map(|cp| cp.is_paused)
            .unwrap_or(false);
        batch.run(resume).await?;

        // 认证批处理
        let agent = LcrCertificationAgent::new(browser, self.config.clone());
        let mut certification = CertificationOrchestrator::new(
            agent,
            self.store.clone(),
            self.bus.clone(),
            self.config.certification_max_attempts,
        );
        certification.run().await?;

        info!("✅ 全部处理完成，日志已保存至: {}", self.config.output_log_file);
        Ok(())
    }

    /// 名册准备：存储里没有名册时，优先 TOML 文件，其次 LCR 页面扫描
    async fn ensure_roster(&self, browser: &Browser) -> Result<()> {
        if !self.store.members().is_empty() {
            info!("📋 名册已存在: {} 人", self.store.members().len());
            return Ok(());
        }

        let importer = RosterImporter::new(self.config.require_age);
        let members = if std::path::Path::new(&self.config.roster_toml).exists() {
            info!("📥 从 TOML 文件导入名册: {}", self.config.roster_toml);
            importer.import_from_toml(&self.config.roster_toml)?
        } else {
            info!("📥 从 LCR 成员列表页面导入名册");
            info!("💡 页面是无限滚动的，请先滚动到底部加载全部成员");
            // 已经开着成员列表就直接用，避免丢掉人滚动加载出来的数据
            let (page, opened_here) = match find_page_by_title(browser, "Member List").await? {
                Some(page) => (page, false),
                None => (open_page(browser, &self.config.lcr_member_list_url).await?, true),
            };
            let executor = JsExecutor::new(page);
            wait::settle(self.config.page_settle_ms).await;
            let members = importer.import_from_page(&executor).await?;
            if opened_here {
                let _ = executor.into_page().close().await;
            }
            members
        };

        if members.is_empty() {
            warn!("⚠️ 没有导入到任何成年成员");
            return Ok(());
        }
        self.store.set_members(&members)?;
        Ok(())
    }

    /// 后台确认驱动：每个成员查询落盘后，在终端向两位辅导员收集确认
    fn spawn_confirmation_driver(&self) {
        let store = self.store.clone();
        let mut rx = self.bus.subscribe();
        let gate = ConfirmationGate::new(self.store.clone(), self.bus.clone());

        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                let Event::MemberSearchStarted { searched_name, .. } = event else {
                    continue;
                };

                // 查询记录要等流程落盘后才存在
                let record = loop {
                    match store.latest_record_for(&searched_name) {
                        Some(record) if record.confirmed.is_none() => break Some(record),
                        Some(_) => break None,
                        None => wait::settle(200).await,
                    }
                };
                let Some(record) = record else { continue };

                for (source, outcome) in [("nsopw", &record.nsopw), ("ucaor", &record.ucaor)] {
                    if let Some(outcome) = outcome {
                        let label = REGISTRY_SOURCES.get(source).copied().unwrap_or(source);
                        info!("📊 {} ({}): {}", label, searched_name, outcome.summary());
                    }
                }

                // 两位辅导员都确认前不放行；不全为是时门会拒绝，重新询问
                loop {
                    let name = searched_name.clone();
                    let answers = tokio::task::spawn_blocking(move || {
                        let c1 = ask(&format!("辅导员 1 已复核 {} 的结果?", name));
                        let c2 = ask("辅导员 2 也已复核?");
                        let positive = ask("结论为阳性匹配?");
                        (c1, c2, positive)
                    })
                    .await
                    .unwrap_or((false, false, false));

                    match gate.confirm(&record.search_key, answers.0, answers.1, answers.2) {
                        Ok(_) => break,
                        Err(e) => warn!("⚠️ 确认被拒绝: {}", e),
                    }
                }
            }
        });
    }
}

/// 终端 y/n 询问（阻塞，只在 spawn_blocking 里用）
fn ask(prompt: &str) -> bool {
    use std::io::Write;
    let mut line = String::new();
    print!("{} [y/n] ", prompt);
    let _ = std::io::stdout().flush();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
