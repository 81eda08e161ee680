use embassy_time::{Duration, Timer};
use rover_core::control::RoverController;
use rover_core::scheduler::{TickScheduler, Timebase};

use super::{CAPTURE, SERIAL_QUEUES};
use crate::hw::{BoardActuators, EmbassyTimebase};
use crate::status;
use crate::telemetry::{self, TelemetryCursor};

/// Ticks between status log lines (one second at the default rate).
const STATUS_EVERY_TICKS: u32 = 100;

/// Fixed-rate control loop.
///
/// A late wake-up runs one tick; missed ticks are counted, not replayed.
#[embassy_executor::task]
pub async fn run(
    controller: &'static mut RoverController,
    mut actuators: BoardActuators<'static>,
) -> ! {
    let timebase = EmbassyTimebase;
    let mut scheduler =
        TickScheduler::new(controller.config().tick_interval_ms, timebase.now_millis());
    let mut link = SERIAL_QUEUES.link();
    let mut cursor = TelemetryCursor::new();

    loop {
        let now_ms = timebase.now_millis();
        if !scheduler.poll(now_ms) {
            let wait = scheduler.time_until_due(now_ms);
            Timer::after(Duration::from_millis(u64::from(wait))).await;
            continue;
        }

        let dropped = scheduler.take_dropped();
        controller.record_dropped_ticks(dropped, now_ms);

        let report = controller.tick(now_ms, CAPTURE.snapshot(), &mut link, &mut actuators);
        status::record_tick(controller.mode(), dropped);

        telemetry::emit_debug_frame(&report.debug);
        cursor.flush(controller.telemetry());

        if controller.ticks() % STATUS_EVERY_TICKS == 0 {
            telemetry::emit_status(&status::snapshot());
        }
    }
}
