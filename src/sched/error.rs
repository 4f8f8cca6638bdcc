//! 调度器错误码

use core::fmt;

/// `add_item` 的失败原因
///
/// `Full` 与 `MutexTimeout` 都是可恢复的, 调用方可以退避重试
/// 或直接放弃该项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    /// 参数无效 (时间戳 0 是保留的空槽标记)
    InvalidArgs,
    /// 负载超过 `MAX_PAYLOAD_SIZE`, 整体拒绝, 不截断
    DataTooLong,
    /// 没有空闲槽位
    Full,
    /// 超时内未拿到调度器互斥锁, 状态未修改
    MutexTimeout,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgs => write!(f, "Invalid scheduler arguments"),
            Self::DataTooLong => write!(f, "Payload exceeds maximum size"),
            Self::Full => write!(f, "Scheduler full"),
            Self::MutexTimeout => write!(f, "Scheduler mutex timeout"),
        }
    }
}
