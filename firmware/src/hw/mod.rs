//! Board adapters that implement the controller's output and time traits.
//!
//! Steering servo and ESC share TIM3 (CH1 on PA6, CH2 on PA7) running a 50 Hz
//! frame; the indicator lamps are plain push-pull GPIO.

use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::TIM3;
use embassy_stm32::timer::simple_pwm::SimplePwmChannel;
use embassy_time::Instant;
use rover_core::actuators::{
    ActuatorDriver, IndicatorOutput, IndicatorSide, ServoCalibration, ServoOutput,
};
use rover_core::scheduler::Timebase;
use rover_core::{Degrees, Micros, Millis};

/// PWM frame rate expected by hobby servos and ESCs.
pub const SERVO_FRAME_HZ: u32 = 50;

/// One PWM channel driven as a servo.
pub struct PwmServo<'d> {
    channel: SimplePwmChannel<'d, TIM3>,
    calibration: ServoCalibration,
}

impl<'d> PwmServo<'d> {
    pub fn new(mut channel: SimplePwmChannel<'d, TIM3>, calibration: ServoCalibration) -> Self {
        channel.set_duty_cycle(0);
        channel.enable();
        Self {
            channel,
            calibration,
        }
    }
}

impl ServoOutput for PwmServo<'_> {
    fn write_angle(&mut self, degrees: Degrees) {
        self.write_pulse_us(self.calibration.pulse_for_angle(degrees));
    }

    fn write_pulse_us(&mut self, pulse_us: Micros) {
        let max_duty = self.channel.max_duty_cycle();
        self.channel
            .set_duty_cycle(self.calibration.duty_for_pulse(pulse_us, max_duty));
    }
}

/// Left and right indicator lamps.
pub struct GpioIndicators<'d> {
    left: Output<'d>,
    right: Output<'d>,
}

impl<'d> GpioIndicators<'d> {
    pub fn new(left: Output<'d>, right: Output<'d>) -> Self {
        Self { left, right }
    }
}

impl IndicatorOutput for GpioIndicators<'_> {
    fn set_indicator(&mut self, side: IndicatorSide, on: bool) {
        let pin = match side {
            IndicatorSide::Left => &mut self.left,
            IndicatorSide::Right => &mut self.right,
        };
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
    }
}

/// Every output the control loop writes.
pub struct BoardActuators<'d> {
    pub steering: PwmServo<'d>,
    pub drive: PwmServo<'d>,
    pub indicators: GpioIndicators<'d>,
}

impl<'d> ActuatorDriver for BoardActuators<'d> {
    type Steering = PwmServo<'d>;
    type Drive = PwmServo<'d>;
    type Indicators = GpioIndicators<'d>;

    fn steering(&mut self) -> &mut Self::Steering {
        &mut self.steering
    }

    fn drive(&mut self) -> &mut Self::Drive {
        &mut self.drive
    }

    fn indicators(&mut self) -> &mut Self::Indicators {
        &mut self.indicators
    }
}

/// Embassy time driver as a [`Timebase`]. Both counters wrap.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbassyTimebase;

impl Timebase for EmbassyTimebase {
    #[allow(clippy::cast_possible_truncation)]
    fn now_millis(&self) -> Millis {
        Instant::now().as_millis() as Millis
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_micros(&self) -> Micros {
        Instant::now().as_micros() as Micros
    }
}
