//! 名册批处理器
//!
//! 串行推进：同一时刻最多一个成员在查，推进以该成员完成双辅导员确认为准。
//! 确认是人工动作，没有超时，卡住就停在那里等人。
//! 断点随每次推进落盘，暂停后可以从原位置续跑

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bus::{Event, EventBus};
use crate::error::AppResult;
use crate::models::BatchCheckpoint;
use crate::services::SearchProvider;
use crate::storage::ResultStore;
use crate::workflow::SearchFlow;

/// 批处理状态
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BatchState {
    Idle,
    Loading,
    Running,
    Paused,
    Stopped,
    Completed,
}

/// 批处理控制命令
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BatchCommand {
    /// 暂停：记录现场，不再开始新成员
    Pause,
    /// 停止：清除批处理标志，已有记录数据保留
    Stop,
}

/// 批处理控制句柄（交给外部界面/驱动者持有）
#[derive(Clone)]
pub struct BatchHandle {
    tx: mpsc::Sender<BatchCommand>,
}

impl BatchHandle {
    pub async fn pause(&self) {
        let _ = self.tx.send(BatchCommand::Pause).await;
    }

    pub async fn stop(&self) {
        let _ = self.tx.send(BatchCommand::Stop).await;
    }
}

/// 批处理统计
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BatchStats {
    /// 实际发起查询并完成确认的成员数
    pub searched: usize,
    /// 已有双确认记录而跳过的成员数
    pub skipped: usize,
    /// 已处理集合与记录不一致、被修复重查的成员数
    pub reconciled: usize,
}

/// 名册批处理器
pub struct BatchOrchestrator<N, U> {
    flow: SearchFlow<N, U>,
    store: Arc<ResultStore>,
    bus: EventBus,
    state: BatchState,
    commands: mpsc::Receiver<BatchCommand>,
}

impl<N: SearchProvider, U: SearchProvider> BatchOrchestrator<N, U> {
    pub fn new(
        flow: SearchFlow<N, U>,
        store: Arc<ResultStore>,
        bus: EventBus,
    ) -> (Self, BatchHandle) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                flow,
                store,
                bus,
                state: BatchState::Idle,
                commands: rx,
            },
            BatchHandle { tx },
        )
    }

    /// 当前状态（可随时查询）
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// 跑完整个名册
    ///
    /// `resume` 为 true 时从持久化的暂停断点续跑，否则从头开始
    pub async fn run(&mut self, resume: bool) -> AppResult<BatchStats> {
        self.state = BatchState::Loading;
        let members = self.store.members();
        let total = members.len();
        if total == 0 {
            warn!("⚠️ 名册为空，批处理结束");
            self.state = BatchState::Completed;
            return Ok(BatchStats::default());
        }

        let start_index = if resume {
            match self.store.checkpoint() {
                Some(cp) if cp.is_paused => {
                    let index = cp.paused_at.as_ref().map(|p| p.index).unwrap_or(cp.current_index);
                    info!("⏯️ 从断点续跑: 第 {}/{} 个成员", index + 1, total);
                    index
                }
                _ => 0,
            }
        } else {
            0
        };

        log_batch_start(total, start_index);
        self.state = BatchState::Running;
        let mut stats = BatchStats::default();

        for (index, member) in members.iter().enumerate().skip(start_index) {
            // 先消化积压的控制命令
            while let Ok(cmd) = self.commands.try_recv() {
                match cmd {
                    BatchCommand::Pause => {
                        self.pause_at(index, total, &member.identity_key())?;
                        return Ok(stats);
                    }
                    BatchCommand::Stop => {
                        self.stop()?;
                        return Ok(stats);
                    }
                }
            }

            let name = member.identity_key();

            // 已有双确认记录的成员跳过
            if self.store.confirmed_record_for(&name).is_some() {
                info!("⏭️ 跳过已确认成员: {}", member.full_name());
                stats.skipped += 1;
                continue;
            }
            // 名字在已处理集合里却没有对应的双确认记录：集合漂移，修复后重查
            if self.store.processed_names().contains(&name) {
                warn!("🔧 已处理集合与记录不一致，重查: {}", member.full_name());
                self.store.remove_processed_name(&name)?;
                stats.reconciled += 1;
            }

            self.store
                .set_checkpoint(&BatchCheckpoint::running(index, total))?;
            self.store.add_processed_name(&name)?;

            self.bus.publish(Event::MemberSearchStarted {
                searched_name: name.clone(),
                batch_index: index,
                total_members: total,
            });
            info!(
                "📦 处理第 {}/{} 个成员: {}",
                index + 1,
                total,
                member.full_name()
            );

            // 先订阅再查询，确认事件不会从指缝溜走
            let mut events = self.bus.subscribe();
            self.flow.run_both_searches(member).await?;

            // 等该成员完成双辅导员确认，或收到暂停/停止命令
            loop {
                tokio::select! {
                    cmd = self.commands.recv() => match cmd {
                        Some(BatchCommand::Pause) => {
                            self.pause_at(index, total, &name)?;
                            return Ok(stats);
                        }
                        Some(BatchCommand::Stop) | None => {
                            self.stop()?;
                            return Ok(stats);
                        }
                    },
                    event = events.recv() => match event {
                        Ok(Event::MemberSearchConfirmed { searched_name })
                            if searched_name == name =>
                        {
                            break;
                        }
                        Ok(_) => continue,
                        // 积压丢失时退回存储真相
                        Err(_) => {
                            if self.store.confirmed_record_for(&name).is_some() {
                                break;
                            }
                            events = self.bus.subscribe();
                        }
                    },
                }
            }
            stats.searched += 1;
        }

        self.state = BatchState::Completed;
        self.store.clear_checkpoint()?;
        log_batch_complete(&stats, total);
        Ok(stats)
    }

    fn pause_at(&mut self, index: usize, total: usize, member: &str) -> AppResult<()> {
        let mut checkpoint = BatchCheckpoint::running(index, total);
        checkpoint.pause(member, chrono::Utc::now().to_rfc3339());
        self.store.set_checkpoint(&checkpoint)?;
        self.state = BatchState::Paused;
        info!("⏸️ 批处理已暂停: 第 {}/{} 个成员 ({})", index + 1, total, member);
        Ok(())
    }

    fn stop(&mut self) -> AppResult<()> {
        self.store.clear_checkpoint()?;
        self.state = BatchState::Stopped;
        info!("⏹️ 批处理已停止，查询记录保留");
        Ok(())
    }
}

fn log_batch_start(total: usize, start_index: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始名册批处理");
    info!("📊 名册成员: {} 人，从第 {} 个开始", total, start_index + 1);
    info!("{}", "=".repeat(60));
}

fn log_batch_complete(stats: &BatchStats, total: usize) {
    info!("{}", "=".repeat(60));
    info!("📊 名册批处理完成");
    info!("✅ 查询并确认: {}/{}", stats.searched, total);
    info!("⏭️ 跳过已确认: {}", stats.skipped);
    info!("🔧 修复重查: {}", stats.reconciled);
    info!("{}", "=".repeat(60));
}
