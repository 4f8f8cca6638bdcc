//! RTC 调度器
//!
//! 两层结构:
//! - [`Scheduler`]: 同步核心, 持有 `Sequence` + 槽位表 + 告警, 不做并发保护
//! - [`SharedScheduler`]: 用 [`CriticalMutex`] 保护核心, 供多个生产者任务和
//!   告警上下文共享, 可以直接放在 `static` 中
//!
//! # 触发流程
//!
//! 告警上下文调用 [`SharedScheduler::on_alarm`]: 在锁内取出到期项、弹出、
//! 为新的最早项重新设定告警, 然后 **释放锁之后** 再执行回调。因此回调中
//! 可以再次调度 (例如 [`SharedScheduler::try_add_item`]) 而不会死锁。
//!
//! # Example
//! ```ignore
//! static ALARM: CriticalSignal<AlarmRequest> = CriticalSignal::new();
//! static SCHED: SharedScheduler<SignalAlarm, 8> =
//!     SharedScheduler::new(SignalAlarm::new(&ALARM), SchedulerConfig::new());
//!
//! fn beacon(data: &[u8]) { /* ... */ }
//!
//! let req = ItemRequest::new(clock.now() + 30, 5, beacon, &[0x01]);
//! SCHED.add_item(&req, Duration::from_millis(100)).await?;
//! ```

use embassy_time::Duration;
use heapless::Vec;

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::item::{ItemCallback, ItemRequest, ScheduledItem, SlotTable, ValidatedItem};
use super::sequence::Sequence;
use crate::config::MAX_PAYLOAD_SIZE;
use crate::rtc::RtcAlarm;
use crate::sync::primitives::{lock_timeout, AtomicCounter, CriticalMutex};
use crate::util::log::*;

// ===== 同步核心 =====

/// 从槽位中取出的到期项 (负载已复制)
pub struct FiredItem {
    pub slot: usize,
    pub timestamp: u32,
    pub priority: u8,
    pub callback: Option<ItemCallback>,
    pub data: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl FiredItem {
    /// 执行回调
    pub fn run(&self) {
        if let Some(callback) = self.callback {
            callback(&self.data);
        }
    }
}

/// [`Scheduler::take_due`] 的结果
pub enum Due {
    /// 取出了到期项
    Fired(FiredItem),
    /// 槽位越界, 什么都没做
    OutOfRange,
    /// 槽位不是当前最早项; 已按真实的最早项重新设定告警
    Stale,
}

/// 调度器核心
pub struct Scheduler<A: RtcAlarm, const N: usize> {
    seq: Sequence<N>,
    slots: SlotTable<N>,
    alarm: A,
}

impl<A: RtcAlarm, const N: usize> Scheduler<A, N> {
    /// 创建空调度器 (全部槽位清零, 全部在空闲链上)
    pub const fn new(alarm: A) -> Self {
        Self {
            seq: Sequence::new(),
            slots: SlotTable::new(),
            alarm,
        }
    }

    /// 清空全部待触发项; 已设定的告警会以 `Stale` 结束
    pub fn reset(&mut self) {
        self.slots.clear();
        self.seq.init();
    }

    /// 校验并插入
    pub fn add_item(&mut self, req: &ItemRequest<'_>) -> Result<(), SchedulerError> {
        let item = req.validate()?;
        self.insert(item)
    }

    fn insert(&mut self, item: ValidatedItem<'_>) -> Result<(), SchedulerError> {
        let timestamp = item.timestamp();
        let slot = self.seq.insert(&mut self.slots, item).ok_or(SchedulerError::Full)?;

        // 插入后重新查看链头, 新项成为最早项时才需要重新设定告警
        if self.seq.peek_first() == Some(slot) {
            self.alarm.set_absolute_alarm(timestamp, slot);
        }
        Ok(())
    }

    /// 告警到期: 取出 `slot` 的数据并弹出
    pub fn take_due(&mut self, slot: usize) -> Due {
        if self.seq.peek_first() != Some(slot) {
            if slot >= N {
                return Due::OutOfRange;
            }
            self.arm_head();
            return Due::Stale;
        }

        // 链头槽位必然 < N
        let item = &self.slots[slot];
        let fired = FiredItem {
            slot,
            timestamp: item.timestamp,
            priority: item.priority,
            callback: item.callback,
            data: item.data.clone(),
        };

        self.seq.pop_first();
        self.arm_head();
        Due::Fired(fired)
    }

    /// 为当前最早项重新设定告警
    ///
    /// epoch 时钟被校正后必须调用: 告警任务按 epoch 时间戳换算截止时刻,
    /// 重新设定才会用新的偏移重新计算。空队列时什么都不做。
    pub fn rearm(&mut self) {
        self.arm_head();
    }

    /// 为当前最早项设定告警 (若有)
    fn arm_head(&mut self) {
        if let Some(head) = self.seq.peek_first() {
            let timestamp = self.slots[head].timestamp;
            self.alarm.set_absolute_alarm(timestamp, head);
        }
    }

    /// 待触发数量
    pub fn pending(&self) -> usize {
        self.seq.len()
    }

    /// 还能再插入
    pub fn has_space(&self) -> bool {
        self.seq.has_space()
    }

    /// 下一项的 (时间戳, 优先级)
    pub fn peek_next(&self) -> Option<(u32, u8)> {
        let head = self.seq.peek_first()?;
        self.slots.get(head).map(|item| (item.timestamp, item.priority))
    }

    /// 按触发顺序遍历待触发项
    pub fn iter_pending(&self) -> impl Iterator<Item = &ScheduledItem> + '_ {
        self.seq.iter_active().filter_map(move |slot| self.slots.get(slot))
    }

    pub fn alarm(&self) -> &A {
        &self.alarm
    }
}

// ===== 共享层 =====

/// [`SharedScheduler::on_alarm`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmOutcome {
    /// 回调已执行
    Fired { slot: usize, timestamp: u32 },
    /// 槽位越界
    OutOfRange,
    /// 槽位不是当前最早项, 未执行
    Stale,
    /// 超时内拿不到锁, 未执行, 状态未修改
    LockTimeout,
}

/// 告警上下文统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerStats {
    /// 已执行的回调
    pub fired: u32,
    /// 告警上下文加锁超时次数 (含随后重试成功的)
    pub lock_misses: u32,
    /// 重试用尽后放弃的触发
    pub dropped: u32,
    /// 过期告警
    pub stale: u32,
}

struct StatCounters {
    fired: AtomicCounter,
    lock_misses: AtomicCounter,
    dropped: AtomicCounter,
    stale: AtomicCounter,
}

/// 互斥锁保护的调度器
pub struct SharedScheduler<A: RtcAlarm, const N: usize> {
    inner: CriticalMutex<Scheduler<A, N>>,
    config: SchedulerConfig,
    stats: StatCounters,
}

impl<A: RtcAlarm, const N: usize> SharedScheduler<A, N> {
    /// 一次性初始化: 清零槽位, 复位序列, 创建互斥锁
    pub const fn new(alarm: A, config: SchedulerConfig) -> Self {
        Self {
            inner: CriticalMutex::new(Scheduler::new(alarm)),
            config,
            stats: StatCounters {
                fired: AtomicCounter::new(),
                lock_misses: AtomicCounter::new(),
                dropped: AtomicCounter::new(),
                stale: AtomicCounter::new(),
            },
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// 添加调度项
    ///
    /// 先校验参数 (不加锁), 再在 `timeout` 内获取互斥锁。超时返回
    /// `MutexTimeout` 且状态未被修改; 没有空槽返回 `Full`。
    /// `req` 的负载在返回前已被复制。
    pub async fn add_item(&self, req: &ItemRequest<'_>, timeout: Duration) -> Result<(), SchedulerError> {
        let item = req.validate()?;
        let mut inner = lock_timeout(&self.inner, timeout)
            .await
            .ok_or(SchedulerError::MutexTimeout)?;
        inner.insert(item)
    }

    /// 非阻塞添加, 供同步上下文 (包括调度回调本身) 使用
    ///
    /// 锁被占用时立即返回 `MutexTimeout`。
    pub fn try_add_item(&self, req: &ItemRequest<'_>) -> Result<(), SchedulerError> {
        let item = req.validate()?;
        let mut inner = self.inner.try_lock().map_err(|_| SchedulerError::MutexTimeout)?;
        inner.insert(item)
    }

    /// 告警回调
    ///
    /// `slot` 为设定告警时的最早项槽位。锁超时只计数并返回
    /// `LockTimeout`, 是否重试由告警任务决定。
    pub async fn on_alarm(&self, slot: usize) -> AlarmOutcome {
        if slot >= N {
            return AlarmOutcome::OutOfRange;
        }

        let due = match lock_timeout(&self.inner, self.config.alarm_lock_timeout).await {
            Some(mut inner) => inner.take_due(slot),
            None => {
                let misses = self.stats.lock_misses.increment();
                log_warn!("Alarm slot {}: scheduler lock timeout ({} total)", slot, misses);
                return AlarmOutcome::LockTimeout;
            }
        };

        // 锁已释放
        match due {
            Due::Fired(item) => {
                self.stats.fired.increment();
                log_trace!("Alarm slot {} fired (t={}, prio={})", item.slot, item.timestamp, item.priority);
                item.run();
                AlarmOutcome::Fired {
                    slot: item.slot,
                    timestamp: item.timestamp,
                }
            }
            Due::Stale => {
                self.stats.stale.increment();
                log_debug!("Alarm slot {} is not the earliest item, re-armed", slot);
                AlarmOutcome::Stale
            }
            Due::OutOfRange => AlarmOutcome::OutOfRange,
        }
    }

    /// 记录一次被放弃的触发
    pub fn record_drop(&self, slot: usize) {
        let dropped = self.stats.dropped.increment();
        log_warn!("Alarm slot {} dropped after retries ({} total)", slot, dropped);
    }

    /// 统计快照
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            fired: self.stats.fired.get(),
            lock_misses: self.stats.lock_misses.get(),
            dropped: self.stats.dropped.get(),
            stale: self.stats.stale.get(),
        }
    }

    /// 待触发数量
    pub async fn pending(&self) -> usize {
        self.inner.lock().await.pending()
    }

    /// 下一项的 (时间戳, 优先级)
    pub async fn peek_next(&self) -> Option<(u32, u8)> {
        self.inner.lock().await.peek_next()
    }

    /// 为当前最早项重新设定告警 (对时之后、或丢弃触发之后恢复队列)
    pub async fn rearm(&self) {
        self.inner.lock().await.rearm();
    }

    /// 清空调度器 (重新初始化)
    pub async fn reset(&self) {
        self.inner.lock().await.reset();
    }

    /// 持锁访问核心
    pub async fn with_locked<R>(&self, f: impl FnOnce(&mut Scheduler<A, N>) -> R) -> R {
        let mut inner = self.inner.lock().await;
        f(&mut inner)
    }
}
