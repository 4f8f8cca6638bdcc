//! 同步原语封装
//!
//! 基于 embassy-sync 提供的同步原语，统一使用 CriticalSectionRawMutex
//! 以确保生产者任务与告警上下文 (InterruptExecutor) 之间的正确性。
//!
//! 调度器需要的 "RTOS 互斥锁" 抽象是 `acquire(timeout) -> bool` /
//! `release()`; 这里对应为 [`lock_timeout`] 返回的守卫 (drop 即释放)。

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::Channel,
    mutex::{Mutex, MutexGuard},
    signal::Signal,
};
use embassy_time::{with_timeout, Duration};
use portable_atomic::{AtomicU32, Ordering};

// ===== 类型别名: 简化使用 =====

/// 临界区信号量 - 用于任务间单值通知
///
/// 多次发送只保留最后一个值。告警重新设定正是这种语义:
/// 新的最早时间戳覆盖尚未触发的旧请求。
///
/// # Example
/// ```ignore
/// static ALARM: CriticalSignal<AlarmRequest> = CriticalSignal::new();
///
/// ALARM.signal(AlarmRequest { timestamp: 1_700_000_000, slot: 3 });
/// let req = ALARM.wait().await;
/// ```
pub type CriticalSignal<T> = Signal<CriticalSectionRawMutex, T>;

/// 临界区通道 - MPMC 消息队列, 固定容量
///
/// # Type Parameters
/// * `T` - 消息类型
/// * `N` - 队列容量
pub type CriticalChannel<T, const N: usize> = Channel<CriticalSectionRawMutex, T, N>;

/// 临界区互斥锁 - 异步互斥访问
pub type CriticalMutex<T> = Mutex<CriticalSectionRawMutex, T>;

/// [`CriticalMutex`] 的守卫
pub type CriticalGuard<'a, T> = MutexGuard<'a, CriticalSectionRawMutex, T>;

// ===== 带超时的加锁 =====

/// 在 `timeout` 内获取互斥锁
///
/// 等待期间任务让出执行权 (不自旋)。超时返回 `None`,
/// 此时受保护的状态没有被触碰。
///
/// # Example
/// ```ignore
/// match lock_timeout(&SHARED, Duration::from_millis(10)).await {
///     Some(mut guard) => guard.value += 1,
///     None => { /* 锁被长期占用 */ }
/// }
/// ```
pub async fn lock_timeout<T>(mutex: &CriticalMutex<T>, timeout: Duration) -> Option<CriticalGuard<'_, T>> {
    if timeout == Duration::from_ticks(0) {
        return mutex.try_lock().ok();
    }
    with_timeout(timeout, mutex.lock()).await.ok()
}

// ===== 原子计数器 =====

/// 原子计数器 - 用于告警上下文的统计
///
/// 告警上下文没有调用方可以接收错误码, 异常只能通过计数器暴露。
pub struct AtomicCounter {
    count: AtomicU32,
}

impl AtomicCounter {
    /// 创建新的计数器
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// 增加并返回新值
    #[inline(always)]
    pub fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// 获取当前值
    #[inline(always)]
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// 重置为 0
    #[inline(always)]
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}
