//! OBC 固件入口 - ESP32-S3
//!
//! 任务布局:
//! - 高优先级 InterruptExecutor: 告警任务 (`run_alarm_loop`), 扮演 RTC 告警中断上下文
//! - 主执行器: 命令分发、下行应答、周期信标
//!
//! 硬件目标: ESP32-S3-N16R8

#![no_std]
#![no_main]

esp_bootloader_esp_idf::esp_app_desc!();

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::{
    interrupt::{software::SoftwareInterruptControl, Priority},
    timer::timg::TimerGroup,
};
use esp_rtos::embassy::InterruptExecutor;
use static_cell::StaticCell;

use obc_scheduler::config::{ALARM_PRIORITY, RESPONSE_QUEUE_DEPTH, SCHEDULER_CAPACITY};
use obc_scheduler::obc::CommandStatus;
use obc_scheduler::rtc::run_alarm_loop;
use obc_scheduler::{
    AlarmRequest, CriticalChannel, CriticalSignal, Dispatcher, EpochClock, ItemRequest, Response, SchedulerConfig,
    SharedScheduler, SignalAlarm,
};

// ===== 条件编译日志 =====
#[cfg(feature = "log-defmt")]
use defmt_rtt as _;

#[allow(unused_imports)]
use obc_scheduler::util::log::*;

// ===== Panic Handler =====
#[cfg(feature = "dev")]
use esp_backtrace as _;

#[cfg(not(feature = "dev"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

// ===== 静态分配 =====
/// 告警执行器
static ALARM_EXECUTOR: StaticCell<InterruptExecutor<2>> = StaticCell::new();

/// 调度器 -> 告警任务
static ALARM_REQUESTS: CriticalSignal<AlarmRequest> = CriticalSignal::new();

static SCHEDULER: SharedScheduler<SignalAlarm, SCHEDULER_CAPACITY> =
    SharedScheduler::new(SignalAlarm::new(&ALARM_REQUESTS), SchedulerConfig::new());

static CLOCK: EpochClock = EpochClock::new();

/// 命令应答 -> 下行
static RESPONSE_QUEUE: CriticalChannel<Response, RESPONSE_QUEUE_DEPTH> = CriticalChannel::new();

/// 信标周期 (秒)
const BEACON_PERIOD_SECS: u32 = 30;

// ===== 任务 =====

#[embassy_executor::task]
async fn alarm_task() {
    run_alarm_loop(&SCHEDULER, &ALARM_REQUESTS, &CLOCK).await
}

#[embassy_executor::task]
async fn command_task() {
    Dispatcher::new(&SCHEDULER, &CLOCK).run(&RESPONSE_QUEUE).await
}

/// 下行应答 (无线链路接入前先记录日志)
#[embassy_executor::task]
async fn downlink_task() {
    loop {
        let resp = RESPONSE_QUEUE.receive().await;
        match resp.status {
            CommandStatus::Failed(err) => {
                log_warn!("Command {} failed: {}", resp.seq_num, err);
            }
            _ => {
                log_info!("Command {} done, {} bytes", resp.seq_num, resp.data.len());
            }
        }
    }
}

fn beacon(data: &[u8]) {
    log_info!("Beacon: {} bytes", data.len());
}

/// 周期信标: 每个周期把下一次信标排进调度器
#[embassy_executor::task]
async fn beacon_task() {
    let payload = obc_scheduler::NAME.as_bytes();

    loop {
        let at = CLOCK.now().saturating_add(BEACON_PERIOD_SECS);
        let req = ItemRequest::new(at, 0, beacon, payload);
        if let Err(err) = SCHEDULER.add_item(&req, Duration::from_millis(100)).await {
            log_error!("Beacon schedule failed: {}", err);
        }

        let stats = SCHEDULER.stats();
        log_debug!(
            "Scheduler: fired={} misses={} dropped={} stale={}",
            stats.fired,
            stats.lock_misses,
            stats.dropped,
            stats.stale
        );

        Timer::after(Duration::from_secs(BEACON_PERIOD_SECS as u64)).await;
    }
}

// ===== 主入口点 =====
#[esp_rtos::main]
async fn main(spawner: Spawner) {
    let peripherals = esp_hal::init(esp_hal::Config::default());

    log_info!("{} v{} starting", obc_scheduler::NAME, obc_scheduler::VERSION);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0);

    // 告警上下文: 高优先级执行器
    let alarm_executor = ALARM_EXECUTOR.init(InterruptExecutor::new(sw_ints.software_interrupt2));
    let priority = match ALARM_PRIORITY {
        1 => Priority::Priority1,
        2 => Priority::Priority2,
        _ => Priority::Priority3,
    };
    let alarm_spawner = alarm_executor.start(priority);
    alarm_spawner.must_spawn(alarm_task());

    spawner.must_spawn(command_task());
    spawner.must_spawn(downlink_task());
    spawner.must_spawn(beacon_task());

    log_info!("All tasks spawned");

    loop {
        Timer::after(Duration::from_secs(60)).await;
        log_info!("Heartbeat: t={} pending={}", CLOCK.now(), SCHEDULER.pending().await);
    }
}
