//! 时间有序动作调度器
//!
//! - `sequence`: 定容侵入式有序链表 (通用容器)
//! - `item`: 调度项、槽位表以及排序规则
//! - `scheduler`: 同步核心与互斥锁保护的共享层
//! - `config` / `error`: 运行时配置与错误码
//!
//! 排序规则: 时间戳早者先; 同一时间戳优先级高者先; 完全相同的按插入顺序。

pub mod config;
pub mod error;
pub mod item;
pub mod scheduler;
pub mod sequence;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use item::{ItemCallback, ItemRequest, ScheduledItem, SlotTable, ValidatedItem};
pub use scheduler::{AlarmOutcome, Due, FiredItem, Scheduler, SchedulerStats, SharedScheduler};
pub use sequence::{Sequence, SlotStore};
