//! Steering servo and ESC output over a PCA9685 PWM driver.
//!
//! Commands are pulse widths in microseconds. The driver runs at a fixed PWM
//! frequency and each pulse is converted to a 12-bit off-tick count, with the
//! on-tick pinned at zero.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use pwm_pca9685::{Address as PwmAddress, Channel, Error as PwmError, Pca9685};

use super::steering::SteeringCommand;
use crate::utils::config::ActuatorConfig;

/// Internal oscillator frequency of the PCA9685.
const OSC_CLOCK_HZ: u32 = 25_000_000;
/// Ticks per PWM period.
const TICKS: u32 = 4096;

/// Sink for steering/throttle commands. Writes are fire-and-forget.
pub trait Actuator {
    type Error: core::fmt::Debug;

    /// Write the steering pulse, then the throttle pulse.
    fn dispatch(
        &mut self,
        command: &SteeringCommand,
    ) -> Result<(), Self::Error>;
}

/// Errors that can occur when driving the servo/ESC outputs.
#[derive(Debug)]
pub enum ActuatorError<E: core::fmt::Debug> {
    PwmError(PwmError<E>),
    /// Pulse (us) longer than one PWM period at the configured frequency.
    PulseOutOfRange(u16),
    /// Configured channel index above 15.
    InvalidChannel(u8),
}

/// Prescale register value for a PWM frequency, `round(osc / (4096 * f)) - 1`.
pub fn prescale_for(frequency_hz: u32) -> u8 {
    let div = TICKS * frequency_hz.max(1);
    let rounded = (OSC_CLOCK_HZ + div / 2) / div;
    rounded.saturating_sub(1).clamp(3, 255) as u8
}

/// Off-tick count for a pulse width, `round(us * 4096 * f / 1e6)`.
pub fn pulse_to_ticks(
    pulse_us: u16,
    frequency_hz: u32,
) -> Option<u16> {
    let ticks = (u64::from(pulse_us) * u64::from(TICKS) * u64::from(frequency_hz) + 500_000)
        / 1_000_000;
    if ticks >= u64::from(TICKS) {
        None
    } else {
        Some(ticks as u16)
    }
}

fn channel(index: u8) -> Option<Channel> {
    Some(match index {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        _ => return None,
    })
}

/// Steering servo and ESC sharing one PCA9685 on a shared I2C bus.
pub struct Pca9685Actuator<'a, I2C: 'static> {
    pub pwm: Pca9685<RefCellDevice<'a, I2C>>,
    steering: Channel,
    throttle: Channel,
    frequency_hz: u32,
}

impl<'a, I2C, E> Pca9685Actuator<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    /// Bind the driver at the configured address. Performs no bus traffic.
    pub fn new(
        i2c_bus: &'a RefCell<I2C>,
        cfg: &ActuatorConfig,
    ) -> Result<Self, ActuatorError<E>> {
        let steering = channel(cfg.steering_channel)
            .ok_or(ActuatorError::InvalidChannel(cfg.steering_channel))?;
        let throttle = channel(cfg.throttle_channel)
            .ok_or(ActuatorError::InvalidChannel(cfg.throttle_channel))?;
        let pwm = Pca9685::new(RefCellDevice::new(i2c_bus), PwmAddress::from(cfg.i2c_address))
            .map_err(ActuatorError::PwmError)?;
        Ok(Self {
            pwm,
            steering,
            throttle,
            frequency_hz: cfg.pwm_frequency_hz,
        })
    }

    /// Enable the oscillator and set the prescale for the servo frequency.
    pub fn configure(&mut self) -> Result<(), ActuatorError<E>> {
        let prescale = prescale_for(self.frequency_hz);
        self.pwm.enable().map_err(ActuatorError::PwmError)?;
        self.pwm
            .set_prescale(prescale)
            .map_err(ActuatorError::PwmError)?;
        tracing::info!(prescale, hz = self.frequency_hz, "PWM configured");
        Ok(())
    }

    /// Put the oscillator to sleep, releasing both outputs.
    pub fn disable(&mut self) -> Result<(), ActuatorError<E>> {
        self.pwm.disable().map_err(ActuatorError::PwmError)
    }

    fn write_pulse(
        &mut self,
        channel: Channel,
        pulse_us: u16,
    ) -> Result<(), ActuatorError<E>> {
        let ticks = pulse_to_ticks(pulse_us, self.frequency_hz)
            .ok_or(ActuatorError::PulseOutOfRange(pulse_us))?;
        self.pwm
            .set_channel_on_off(channel, 0, ticks)
            .map_err(ActuatorError::PwmError)
    }
}

impl<'a, I2C, E> Actuator for Pca9685Actuator<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    type Error = ActuatorError<E>;

    fn dispatch(
        &mut self,
        command: &SteeringCommand,
    ) -> Result<(), Self::Error> {
        self.write_pulse(self.steering, command.direction)?;
        self.write_pulse(self.throttle, command.speed)
    }
}
