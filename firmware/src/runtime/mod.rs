use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, OutputType, Pull, Speed};
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::time::hz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use rover_core::actuators::ServoCalibration;
use rover_core::capture::{CaptureBank, ChannelId};
use rover_core::config::ControlConfig;
use rover_core::control::RoverController;
use static_cell::StaticCell;

use crate::hw::{BoardActuators, GpioIndicators, PwmServo, SERVO_FRAME_HZ};
use crate::serial::SerialQueues;

mod capture_task;
mod control_task;
mod serial_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Vehicle configuration baked into this build.
pub(super) const CONFIG: ControlConfig = ControlConfig::DEFAULT;

pub(super) static CAPTURE: CaptureBank = CaptureBank::new(CONFIG.neutral_pulse_us);
pub(super) static SERIAL_QUEUES: SerialQueues = SerialQueues::new();

static CONTROLLER: StaticCell<RoverController> = StaticCell::new();

/// Runs the edge handlers above the thread-mode control loop.
static CAPTURE_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[hal::interrupt]
unsafe fn TIM14() {
    unsafe { CAPTURE_EXECUTOR.on_interrupt() }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA6,
        PA7,
        PB3,
        PB4,
        PB5,
        PB8,
        PB9,
        PB0,
        PB1,
        TIM3,
        USART5,
        EXTI3,
        EXTI4,
        EXTI5,
        ..
    } = hal::init(config);

    let controller = match RoverController::try_new(CONFIG) {
        Ok(controller) => CONTROLLER.init(controller),
        Err(error) => {
            defmt::error!("invalid configuration: {}", defmt::Display2Format(&error));
            loop {
                core::future::pending::<()>().await;
            }
        }
    };

    let pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        Some(PwmPin::new(PA7, OutputType::PushPull)),
        None,
        None,
        hz(SERVO_FRAME_HZ),
        CountingMode::EdgeAlignedUp,
    );
    let channels = pwm.split();
    let actuators = BoardActuators {
        steering: PwmServo::new(channels.ch1, ServoCalibration::DEFAULT),
        drive: PwmServo::new(channels.ch2, ServoCalibration::DEFAULT),
        indicators: GpioIndicators::new(
            Output::new(PB8, Level::Low, Speed::Low),
            Output::new(PB9, Level::Low, Speed::Low),
        ),
    };

    hal::interrupt::TIM14.set_priority(Priority::P1);
    let capture_spawner = CAPTURE_EXECUTOR.start(hal::interrupt::TIM14);
    for (channel, pin) in [
        (ChannelId::Steering, ExtiInput::new(PB3, EXTI3, Pull::None)),
        (ChannelId::Drive, ExtiInput::new(PB4, EXTI4, Pull::None)),
        (ChannelId::ModeSelect, ExtiInput::new(PB5, EXTI5, Pull::None)),
    ] {
        capture_spawner
            .spawn(capture_task::run(channel, pin))
            .expect("capture task pool exhausted");
    }

    spawner
        .spawn(serial_task::run(&SERIAL_QUEUES, USART5, PB0, PB1))
        .expect("failed to spawn serial task");
    spawner
        .spawn(control_task::run(controller, actuators))
        .expect("failed to spawn control task");

    defmt::info!("rover controller running");
    core::future::pending::<()>().await;
}
