//! 实时时钟告警
//!
//! 调度器只依赖 [`RtcAlarm`]: 为某个槽位设定一个绝对时刻 (epoch 秒) 的告警。
//! 固件中由 [`SignalAlarm`] 实现 —— 把请求写入 [`CriticalSignal`],
//! 高优先级执行器上的告警任务 ([`run_alarm_loop`]) 负责等待到期并回调
//! 调度器。Signal 只保留最新值, 所以重新设定告警会替换尚未触发的旧请求。
//!
//! 时间基准由 [`EpochClock`] 提供: epoch 偏移 + embassy 单调时钟。

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use portable_atomic::{AtomicU32, Ordering};

use crate::sched::{AlarmOutcome, SharedScheduler};
use crate::sync::primitives::CriticalSignal;
use crate::util::log::*;

/// 绝对时刻告警
pub trait RtcAlarm {
    /// 在 `timestamp` (epoch 秒) 触发, 把 `slot` 作为上下文交给告警回调
    ///
    /// 重新调用会替换之前的设定。此层视为不会失败。
    fn set_absolute_alarm(&mut self, timestamp: u32, slot: usize);
}

/// 一次告警设定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmRequest {
    pub timestamp: u32,
    pub slot: usize,
}

/// 通过 [`CriticalSignal`] 把告警请求交给告警任务
pub struct SignalAlarm {
    requests: &'static CriticalSignal<AlarmRequest>,
}

impl SignalAlarm {
    pub const fn new(requests: &'static CriticalSignal<AlarmRequest>) -> Self {
        Self { requests }
    }
}

impl RtcAlarm for SignalAlarm {
    fn set_absolute_alarm(&mut self, timestamp: u32, slot: usize) {
        self.requests.signal(AlarmRequest { timestamp, slot });
    }
}

// ===== Epoch 时钟 =====

/// epoch 秒与单调时钟之间的换算
///
/// 保存 "单调时钟 0 点对应的 epoch 秒"。对时前偏移为 0,
/// 此时 epoch 时间即启动后秒数。
pub struct EpochClock {
    boot_epoch: AtomicU32,
}

impl EpochClock {
    pub const fn new() -> Self {
        Self {
            boot_epoch: AtomicU32::new(0),
        }
    }

    /// 对时: 当前时刻的 epoch 秒为 `now_epoch`
    pub fn set_epoch(&self, now_epoch: u32) {
        self.set_epoch_at(now_epoch, Instant::now());
    }

    /// 对时: `at` 时刻的 epoch 秒为 `epoch`
    pub fn set_epoch_at(&self, epoch: u32, at: Instant) {
        let uptime = at.as_secs().min(u32::MAX as u64) as u32;
        self.boot_epoch.store(epoch.saturating_sub(uptime), Ordering::Release);
    }

    /// 当前 epoch 秒
    pub fn now(&self) -> u32 {
        self.epoch_at(Instant::now())
    }

    /// 单调时刻 `at` 对应的 epoch 秒
    pub fn epoch_at(&self, at: Instant) -> u32 {
        let uptime = at.as_secs().min(u32::MAX as u64) as u32;
        self.boot_epoch.load(Ordering::Acquire).saturating_add(uptime)
    }

    /// epoch 秒 `timestamp` 对应的单调时刻, 早于启动的时刻取 0
    pub fn instant_at(&self, timestamp: u32) -> Instant {
        let boot = self.boot_epoch.load(Ordering::Acquire);
        Instant::from_secs(timestamp.saturating_sub(boot) as u64)
    }
}

impl Default for EpochClock {
    fn default() -> Self {
        Self::new()
    }
}

// ===== 告警任务 =====

/// 告警上下文主循环
///
/// 等待当前设定到期或被新设定替换; 到期后调用
/// [`SharedScheduler::on_alarm`]。截止时刻在每次收到设定时按 `clock`
/// 换算, 所以对时之后需要 [`SharedScheduler::rearm`] 重新发出设定。
///
/// 拿不到调度器锁时按 `alarm_retry_limit` / `alarm_retry_delay` 重试,
/// 用尽后记为丢弃并且不再设定告警: 该项仍是链头, 整个队列 (包括它之后
/// 的所有项) 都停住, 直到某次插入成为新的链头、`rearm` 或 `reset`。
pub async fn run_alarm_loop<A: RtcAlarm, const N: usize>(
    scheduler: &SharedScheduler<A, N>,
    requests: &CriticalSignal<AlarmRequest>,
    clock: &EpochClock,
) -> ! {
    log_info!("Alarm loop started");

    let mut pending: Option<AlarmRequest> = None;
    let mut retries: u8 = 0;

    loop {
        let Some(req) = pending else {
            pending = Some(requests.wait().await);
            retries = 0;
            continue;
        };

        match select(Timer::at(clock.instant_at(req.timestamp)), requests.wait()).await {
            Either::First(()) => {
                let outcome = scheduler.on_alarm(req.slot).await;
                pending = next_after_alarm(scheduler, req, outcome, &mut retries).await;
            }
            Either::Second(replacement) => {
                log_trace!("Alarm re-armed: t={} slot={}", replacement.timestamp, replacement.slot);
                pending = Some(replacement);
                retries = 0;
            }
        }
    }
}

/// 根据触发结果决定下一次等待的请求
///
/// 返回 `None` 表示等待下一次设定; 丢弃后队列停住, 见 [`run_alarm_loop`]。
async fn next_after_alarm<A: RtcAlarm, const N: usize>(
    scheduler: &SharedScheduler<A, N>,
    req: AlarmRequest,
    outcome: AlarmOutcome,
    retries: &mut u8,
) -> Option<AlarmRequest> {
    if outcome != AlarmOutcome::LockTimeout {
        *retries = 0;
        return None;
    }

    let config = scheduler.config();
    if *retries < config.alarm_retry_limit {
        *retries += 1;
        log_debug!("Alarm slot {} retry {}", req.slot, *retries);
        if config.alarm_retry_delay > Duration::from_ticks(0) {
            Timer::after(config.alarm_retry_delay).await;
        }
        return Some(req);
    }

    scheduler.record_drop(req.slot);
    *retries = 0;
    None
}
