//! 条件编译日志系统
//!
//! 根据 feature 选择日志后端:
//! - `log-defmt`: defmt 二进制日志
//! - `dev` / `log-println`: esp-println 文本日志, 每行带级别标签
//! - 默认 (主机测试 / release): 完全编译掉
//!
//! 调度器核心只在告警上下文记录异常 (锁超时、丢弃、过期告警),
//! `add_item` 的失败一律返回给调用方, 由调用方决定是否记录。

// ===================================================================
// 后端分发: 所有级别宏都汇聚到 `__obc_log!`
// ===================================================================

#[cfg(feature = "log-defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __obc_log {
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}

#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __obc_log {
    (error, $($arg:tt)*) => { esp_println::println!("[ERROR] {}", format_args!($($arg)*)) };
    (warn, $($arg:tt)*) => { esp_println::println!("[WARN] {}", format_args!($($arg)*)) };
    (info, $($arg:tt)*) => { esp_println::println!("[INFO] {}", format_args!($($arg)*)) };
    (debug, $($arg:tt)*) => { esp_println::println!("[DEBUG] {}", format_args!($($arg)*)) };
    (trace, $($arg:tt)*) => { esp_println::println!("[TRACE] {}", format_args!($($arg)*)) };
}

// 无日志后端: 参数仍然做一次借用, 避免仅用于日志的变量产生 unused 警告
#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __obc_log {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

// ===================================================================
// 公共级别宏
// ===================================================================

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::__obc_log!(error, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::__obc_log!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::__obc_log!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::__obc_log!(debug, $($arg)*) };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::__obc_log!(trace, $($arg)*) };
}

// ===================================================================
// 便捷重导出
// ===================================================================
pub use crate::log_debug;
pub use crate::log_error;
pub use crate::log_info;
pub use crate::log_trace;
pub use crate::log_warn;
