//! 地面命令分发
//!
//! 命令到达这里时已经解析完毕 (字符串解析器不在本 crate 中)。
//! [`Dispatcher::submit`] 根据 `execute_at` 决定:
//! - 立即执行: 放入命令队列, 由命令任务执行
//! - 延时执行: 把命令编码成负载交给调度器; 到期回调只做一件事 ——
//!   解码并 `try_send` 回命令队列。回调运行在告警上下文, 不在其中执行命令。
//!
//! # 负载格式
//!
//! | 偏移 | 长度 | 内容 |
//! |------|------|------|
//! | 0 | 1 | 命令 ID |
//! | 1 | 2 | 序号 (LE) |
//! | 3 | n | 参数 |

use core::fmt;

use embassy_time::Duration;
use heapless::Vec;

use crate::config::{
    COMMAND_PRIORITY, COMMAND_QUEUE_DEPTH, DEFAULT_ADD_TIMEOUT_MS, MAX_COMMAND_ARGS, MAX_RESPONSE_DATA,
};
use crate::rtc::{EpochClock, RtcAlarm};
use crate::sched::{ItemCallback, ItemRequest, SchedulerError, SharedScheduler};
use crate::sync::primitives::CriticalChannel;
use crate::util::log::*;

/// 命令负载头长度
pub const COMMAND_HEADER_LEN: usize = 3;

/// 编码后的最大负载长度
pub const COMMAND_PAYLOAD_SIZE: usize = COMMAND_HEADER_LEN + MAX_COMMAND_ARGS;

/// 命令队列类型
pub type CommandQueue = CriticalChannel<Command, COMMAND_QUEUE_DEPTH>;

/// 待执行命令队列 (立即命令与到期命令共用)
pub static COMMAND_QUEUE: CommandQueue = CommandQueue::new();

// ===== 命令模型 =====

/// 命令 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandId {
    /// 回显参数
    Ping = 0x01,
    /// 读取 epoch 时间
    GetTime = 0x02,
    /// 对时, 参数为 4 字节 LE epoch 秒
    SetTime = 0x03,
    /// 调度器状态
    SchedulerStatus = 0x04,
}

impl TryFrom<u8> for CommandId {
    type Error = CommandError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Ping),
            0x02 => Ok(Self::GetTime),
            0x03 => Ok(Self::SetTime),
            0x04 => Ok(Self::SchedulerStatus),
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

/// 命令错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// 未知命令 ID
    UnknownCommand,
    /// 参数长度或内容不对
    BadArgs,
    /// 命令队列已满
    QueueFull,
    /// 调度失败
    Scheduler(SchedulerError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "Unknown command"),
            Self::BadArgs => write!(f, "Bad command arguments"),
            Self::QueueFull => write!(f, "Command queue full"),
            Self::Scheduler(e) => write!(f, "Scheduling failed: {}", e),
        }
    }
}

impl From<SchedulerError> for CommandError {
    fn from(e: SchedulerError) -> Self {
        Self::Scheduler(e)
    }
}

/// 已解析的地面命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: CommandId,
    /// 序号, 用于应答匹配
    pub seq_num: u16,
    /// 执行时刻 (epoch 秒), 0 表示立即
    pub execute_at: u32,
    pub args: Vec<u8, MAX_COMMAND_ARGS>,
}

impl Command {
    /// 立即执行、无参数的命令
    pub const fn new(id: CommandId, seq_num: u16) -> Self {
        Self {
            id,
            seq_num,
            execute_at: 0,
            args: Vec::new(),
        }
    }

    /// 设置参数
    pub fn with_args(mut self, args: &[u8]) -> Result<Self, CommandError> {
        self.args = Vec::from_slice(args).map_err(|_| CommandError::BadArgs)?;
        Ok(self)
    }

    /// 设置执行时刻
    pub const fn at(mut self, execute_at: u32) -> Self {
        self.execute_at = execute_at;
        self
    }

    /// 编码为调度负载 (不含执行时刻)
    pub fn encode_payload(&self) -> Vec<u8, COMMAND_PAYLOAD_SIZE> {
        let mut out = Vec::new();
        let seq = self.seq_num.to_le_bytes();
        // 容量 = 头 + 最大参数, 不会溢出
        let _ = out.extend_from_slice(&[self.id as u8, seq[0], seq[1]]);
        let _ = out.extend_from_slice(&self.args);
        out
    }

    /// 从调度负载解码, 解码出的命令立即执行
    pub fn decode_payload(payload: &[u8]) -> Result<Self, CommandError> {
        if payload.len() < COMMAND_HEADER_LEN {
            return Err(CommandError::BadArgs);
        }
        let id = CommandId::try_from(payload[0])?;
        let seq_num = u16::from_le_bytes([payload[1], payload[2]]);
        Command::new(id, seq_num).with_args(&payload[COMMAND_HEADER_LEN..])
    }
}

// ===== 应答 =====

/// 应答状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandStatus {
    /// 已执行
    Success,
    /// 已进入调度器, 到期后执行
    Scheduled,
    /// 已进入命令队列
    Queued,
    Failed(CommandError),
}

/// 命令应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: CommandId,
    pub seq_num: u16,
    pub status: CommandStatus,
    pub data: Vec<u8, MAX_RESPONSE_DATA>,
}

impl Response {
    fn new(cmd: &Command, status: CommandStatus) -> Self {
        Self {
            id: cmd.id,
            seq_num: cmd.seq_num,
            status,
            data: Vec::new(),
        }
    }

    /// 提交结果的确认应答
    pub fn ack(cmd: &Command, result: Result<CommandStatus, CommandError>) -> Self {
        match result {
            Ok(status) => Self::new(cmd, status),
            Err(e) => Self::new(cmd, CommandStatus::Failed(e)),
        }
    }
}

// ===== 到期回调 =====

/// 把到期命令放回 `queue`
///
/// 供调度回调使用; 告警上下文没有调用方, 失败只记录日志。
pub fn enqueue_into(queue: &CommandQueue, payload: &[u8]) {
    match Command::decode_payload(payload) {
        Ok(cmd) => {
            if queue.try_send(cmd).is_err() {
                log_warn!("Scheduled command dropped: queue full");
            }
        }
        Err(e) => log_error!("Scheduled command payload invalid: {}", e),
    }
}

/// 默认到期回调: 放回 [`COMMAND_QUEUE`]
pub fn enqueue_scheduled(payload: &[u8]) {
    enqueue_into(&COMMAND_QUEUE, payload);
}

// ===== 分发器 =====

/// 命令分发器
pub struct Dispatcher<'a, A: RtcAlarm, const N: usize> {
    scheduler: &'a SharedScheduler<A, N>,
    clock: &'a EpochClock,
    queue: &'a CommandQueue,
    on_due: ItemCallback,
    add_timeout: Duration,
}

impl<'a, A: RtcAlarm, const N: usize> Dispatcher<'a, A, N> {
    /// 使用全局 [`COMMAND_QUEUE`]
    pub fn new(scheduler: &'a SharedScheduler<A, N>, clock: &'a EpochClock) -> Self {
        Self {
            scheduler,
            clock,
            queue: &COMMAND_QUEUE,
            on_due: enqueue_scheduled,
            add_timeout: Duration::from_millis(DEFAULT_ADD_TIMEOUT_MS),
        }
    }

    /// 使用自定义队列; `on_due` 必须把负载送回同一个队列
    pub const fn with_queue(mut self, queue: &'a CommandQueue, on_due: ItemCallback) -> Self {
        self.queue = queue;
        self.on_due = on_due;
        self
    }

    /// 调度时获取锁的超时
    pub const fn with_add_timeout(mut self, timeout: Duration) -> Self {
        self.add_timeout = timeout;
        self
    }

    /// 提交命令
    ///
    /// 已到期的命令进入命令队列, 未到期的交给调度器。
    pub async fn submit(&self, cmd: Command) -> Result<CommandStatus, CommandError> {
        if cmd.execute_at == 0 || cmd.execute_at <= self.clock.now() {
            self.queue.try_send(cmd).map_err(|_| CommandError::QueueFull)?;
            return Ok(CommandStatus::Queued);
        }

        let payload = cmd.encode_payload();
        let req = ItemRequest::new(cmd.execute_at, COMMAND_PRIORITY, self.on_due, &payload);
        self.scheduler.add_item(&req, self.add_timeout).await?;

        log_debug!("Command {} scheduled at {}", cmd.seq_num, cmd.execute_at);
        Ok(CommandStatus::Scheduled)
    }

    /// 执行命令
    pub async fn execute(&self, cmd: &Command) -> Response {
        let mut resp = Response::new(cmd, CommandStatus::Success);
        if let Err(e) = self.handle(cmd, &mut resp.data).await {
            resp.status = CommandStatus::Failed(e);
            resp.data.clear();
        }
        resp
    }

    async fn handle(&self, cmd: &Command, out: &mut Vec<u8, MAX_RESPONSE_DATA>) -> Result<(), CommandError> {
        match cmd.id {
            CommandId::Ping => {
                out.extend_from_slice(&cmd.args).map_err(|_| CommandError::BadArgs)?;
            }
            CommandId::GetTime => {
                push_u32(out, self.clock.now());
            }
            CommandId::SetTime => {
                let epoch: [u8; 4] = cmd.args.as_slice().try_into().map_err(|_| CommandError::BadArgs)?;
                let epoch = u32::from_le_bytes(epoch);
                if epoch == 0 {
                    return Err(CommandError::BadArgs);
                }
                self.clock.set_epoch(epoch);
                // 已设定的告警是按旧偏移换算的截止时刻
                self.scheduler.rearm().await;
                log_info!("Clock set to {}", epoch);
            }
            CommandId::SchedulerStatus => {
                let pending = self.scheduler.pending().await;
                let stats = self.scheduler.stats();
                let _ = out.push(pending as u8);
                for value in [stats.fired, stats.lock_misses, stats.dropped, stats.stale] {
                    push_u32(out, value);
                }
            }
        }
        Ok(())
    }

    /// 命令任务主循环: 取命令、执行、发送应答
    pub async fn run<const R: usize>(&self, responses: &CriticalChannel<Response, R>) -> ! {
        loop {
            let cmd = self.queue.receive().await;
            let resp = self.execute(&cmd).await;
            if let CommandStatus::Failed(e) = resp.status {
                log_warn!("Command {} failed: {}", cmd.seq_num, e);
            }
            responses.send(resp).await;
        }
    }
}

fn push_u32<const M: usize>(out: &mut Vec<u8, M>, value: u32) {
    let _ = out.extend_from_slice(&value.to_le_bytes());
}
