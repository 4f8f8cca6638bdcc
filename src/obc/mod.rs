//! OBC 命令层: 把地面命令送入调度器或命令队列

pub mod command;

pub use command::{
    enqueue_into, enqueue_scheduled, Command, CommandError, CommandId, CommandQueue, CommandStatus, Dispatcher,
    Response, COMMAND_QUEUE,
};
