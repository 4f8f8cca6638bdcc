//! OBC 调度器 - 小卫星星载计算机的时间有序动作调度
//!
//! 本库提供以下核心功能:
//! - 定容侵入式有序链表 (`sched::sequence`)
//! - 基于 RTC 告警的一次性回调调度器 (`sched::scheduler`)
//! - 告警上下文与 epoch 时钟 (`rtc`)
//! - 地面命令分发, 延时命令经调度器执行 (`obc`)
//! - 条件编译日志系统
//!
//! 库本身不依赖具体芯片; ESP32-S3 固件入口见 `src/main.rs` (feature `esp32s3`)。

#![cfg_attr(not(test), no_std)]

pub mod obc;
pub mod rtc;
pub mod sched;
pub mod sync;
pub mod util;

// ===== 重导出常用类型 =====
pub use obc::{Command, CommandId, Dispatcher, Response};
pub use rtc::{AlarmRequest, EpochClock, RtcAlarm, SignalAlarm};
pub use sched::{
    AlarmOutcome, ItemCallback, ItemRequest, Scheduler, SchedulerConfig, SchedulerError, SchedulerStats,
    SharedScheduler,
};
pub use sync::primitives::{CriticalChannel, CriticalMutex, CriticalSignal};

// ===== 版本信息 =====
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 系统配置常量
pub mod config {
    /// 调度器槽位数
    pub const SCHEDULER_CAPACITY: usize = 8;

    /// 日志子系统单包最大负载 (字节)
    pub const LOGGER_MAX_PACKET_SIZE: usize = 245;

    /// 调度项最大负载, 与日志包负载上限一致
    pub const MAX_PAYLOAD_SIZE: usize = LOGGER_MAX_PACKET_SIZE;

    /// 告警上下文获取调度器锁的超时 (毫秒)
    pub const ALARM_LOCK_TIMEOUT_MS: u64 = 2;

    /// 告警上下文加锁失败后的重试次数
    pub const ALARM_RETRY_LIMIT: u8 = 3;

    /// 告警重试间隔 (毫秒)
    pub const ALARM_RETRY_DELAY_MS: u64 = 5;

    /// 生产者 `add_item` 默认超时 (毫秒)
    pub const DEFAULT_ADD_TIMEOUT_MS: u64 = 100;

    /// 延时命令在调度器中的优先级
    pub const COMMAND_PRIORITY: u8 = 128;

    /// 命令参数最大长度
    pub const MAX_COMMAND_ARGS: usize = 32;

    /// 应答数据最大长度
    pub const MAX_RESPONSE_DATA: usize = 32;

    /// 命令队列深度
    pub const COMMAND_QUEUE_DEPTH: usize = 8;

    /// 应答队列深度
    pub const RESPONSE_QUEUE_DEPTH: usize = 8;

    /// 告警执行器中断等级
    pub const ALARM_PRIORITY: u8 = 3;
}
