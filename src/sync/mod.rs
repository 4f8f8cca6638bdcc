//! 同步原语模块
//!
//! 基于 embassy-sync 封装:
//! - `CriticalSignal`: 单值信号量 (告警请求)
//! - `CriticalChannel`: MPMC 消息队列 (命令/应答)
//! - `CriticalMutex`: 异步互斥锁 + `lock_timeout`
//! - `AtomicCounter`: 告警上下文统计

pub mod primitives;

pub use primitives::{lock_timeout, AtomicCounter, CriticalChannel, CriticalGuard, CriticalMutex, CriticalSignal};
