//! 调度器运行时配置

use embassy_time::Duration;

use crate::config::{ALARM_LOCK_TIMEOUT_MS, ALARM_RETRY_DELAY_MS, ALARM_RETRY_LIMIT};

/// 调度器配置
///
/// 只影响告警上下文; `add_item` 的超时由每次调用方传入。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// 告警上下文获取互斥锁的超时, 需保持很短
    pub alarm_lock_timeout: Duration,
    /// 告警上下文拿不到锁时的重试次数, 0 表示直接丢弃本次触发
    pub alarm_retry_limit: u8,
    /// 两次重试之间的间隔
    pub alarm_retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerConfig {
    /// 默认配置 (见 `crate::config`)
    pub const fn new() -> Self {
        Self {
            alarm_lock_timeout: Duration::from_millis(ALARM_LOCK_TIMEOUT_MS),
            alarm_retry_limit: ALARM_RETRY_LIMIT,
            alarm_retry_delay: Duration::from_millis(ALARM_RETRY_DELAY_MS),
        }
    }

    /// 设置告警上下文加锁超时
    pub const fn with_alarm_lock_timeout(mut self, timeout: Duration) -> Self {
        self.alarm_lock_timeout = timeout;
        self
    }

    /// 设置重试策略
    pub const fn with_alarm_retry(mut self, limit: u8, delay: Duration) -> Self {
        self.alarm_retry_limit = limit;
        self.alarm_retry_delay = delay;
        self
    }

    /// 关闭重试: 拿不到锁的触发直接丢弃 (只计数)
    pub const fn without_alarm_retry(self) -> Self {
        self.with_alarm_retry(0, Duration::from_ticks(0))
    }
}
