//! GPIO access for the heater output and the status LED panel.
//!
//! Hardware access is feature-gated so the daemon cross-compiles and tests
//! on non-Pi systems: with the `hardware` feature the rppal implementations
//! drive real pins, without it mock implementations record the commanded
//! levels.

use crate::error::Result;
use crate::health::HealthStatus;

/// BCM pin of the heating element driver (active high).
pub const DEFAULT_HEATER_PIN: u8 = 18;

/// Default BCM pins for the status LED panel.
pub const DEFAULT_LED_RED: u8 = 17;
pub const DEFAULT_LED_BLUE: u8 = 27;
pub const DEFAULT_LED_YELLOW: u8 = 22;
pub const DEFAULT_LED_GREEN: u8 = 23;

/// The heater actuator: one digital output, active high.
///
/// Owned exclusively by the control loop, which also guarantees the pin is
/// driven low on every exit path.
pub trait HeaterOutput: Send + Sync {
    /// Drive the output pin. `true` powers the heating element.
    fn set_active(&mut self, on: bool) -> Result<()>;
}

/// Status LED panel fed from the shared health snapshot: blue for internet,
/// yellow for the local web server, green for the packet forwarder, red
/// when any of those is down.
pub trait StatusLedPanel: Send {
    /// Light the panel according to the given snapshot.
    fn apply(&mut self, status: &HealthStatus) -> Result<()>;

    /// Extinguish all LEDs.
    fn all_off(&mut self) -> Result<()>;
}

/// BCM pin assignment for the LED panel.
#[derive(Debug, Clone, Copy)]
pub struct LedPins {
    pub red: u8,
    pub blue: u8,
    pub yellow: u8,
    pub green: u8,
}

impl Default for LedPins {
    fn default() -> Self {
        Self {
            red: DEFAULT_LED_RED,
            blue: DEFAULT_LED_BLUE,
            yellow: DEFAULT_LED_YELLOW,
            green: DEFAULT_LED_GREEN,
        }
    }
}

#[cfg(feature = "hardware")]
mod raspberry_pi {
    use super::*;
    use crate::error::MonitorError;
    use rppal::gpio::{Gpio, OutputPin};

    /// Heater output on a real GPIO pin.
    pub struct GpioHeaterOutput {
        pin: OutputPin,
    }

    impl GpioHeaterOutput {
        /// Claim the pin as an output and drive it to the deactivated level.
        pub fn new(pin: u8) -> Result<Self> {
            let gpio = Gpio::new()
                .map_err(|e| MonitorError::gpio_error(format!("initialize GPIO: {e}")))?;
            let mut pin = gpio
                .get(pin)
                .map_err(|e| MonitorError::gpio_error(format!("claim heater pin: {e}")))?
                .into_output();
            pin.set_low();
            Ok(Self { pin })
        }
    }

    impl HeaterOutput for GpioHeaterOutput {
        fn set_active(&mut self, on: bool) -> Result<()> {
            if on {
                self.pin.set_high();
            } else {
                self.pin.set_low();
            }
            Ok(())
        }
    }

    /// Four-LED panel on real GPIO pins.
    pub struct GpioLedPanel {
        red: OutputPin,
        blue: OutputPin,
        yellow: OutputPin,
        green: OutputPin,
    }

    impl GpioLedPanel {
        pub fn new(pins: LedPins) -> Result<Self> {
            let gpio = Gpio::new()
                .map_err(|e| MonitorError::gpio_error(format!("initialize GPIO: {e}")))?;
            let mut claim = |n: u8| -> Result<OutputPin> {
                let mut pin = gpio
                    .get(n)
                    .map_err(|e| MonitorError::gpio_error(format!("claim LED pin {n}: {e}")))?
                    .into_output();
                pin.set_low();
                Ok(pin)
            };
            Ok(Self {
                red: claim(pins.red)?,
                blue: claim(pins.blue)?,
                yellow: claim(pins.yellow)?,
                green: claim(pins.green)?,
            })
        }
    }

    impl StatusLedPanel for GpioLedPanel {
        fn apply(&mut self, status: &HealthStatus) -> Result<()> {
            let all_up = status.internet_reachable
                && status.local_web_reachable
                && status.packet_forwarder_running;
            set(&mut self.blue, status.internet_reachable);
            set(&mut self.yellow, status.local_web_reachable);
            set(&mut self.green, status.packet_forwarder_running);
            set(&mut self.red, !all_up);
            Ok(())
        }

        fn all_off(&mut self) -> Result<()> {
            for pin in [&mut self.red, &mut self.blue, &mut self.yellow, &mut self.green] {
                pin.set_low();
            }
            Ok(())
        }
    }

    fn set(pin: &mut OutputPin, on: bool) {
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
    }
}

#[cfg(not(feature = "hardware"))]
mod mock {
    use super::*;
    use crate::error::MonitorError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Heater output for systems without GPIO. Records the commanded level
    /// so tests can observe actuation.
    pub struct MockHeaterOutput {
        level: Arc<AtomicBool>,
    }

    impl MockHeaterOutput {
        pub fn new(_pin: u8) -> Result<Self> {
            Ok(Self {
                level: Arc::new(AtomicBool::new(false)),
            })
        }

        /// Shared handle onto the commanded level.
        pub fn level_handle(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.level)
        }
    }

    impl HeaterOutput for MockHeaterOutput {
        fn set_active(&mut self, on: bool) -> Result<()> {
            self.level.store(on, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Lit state of the mock panel, red/blue/yellow/green.
    pub type LedLevels = [bool; 4];

    /// LED panel for systems without GPIO.
    pub struct MockLedPanel {
        lit: Arc<Mutex<LedLevels>>,
    }

    impl MockLedPanel {
        pub fn new(_pins: LedPins) -> Result<Self> {
            Ok(Self {
                lit: Arc::new(Mutex::new([false; 4])),
            })
        }

        /// Shared handle onto the lit state.
        pub fn lit_handle(&self) -> Arc<Mutex<LedLevels>> {
            Arc::clone(&self.lit)
        }

        fn lit(&self) -> Result<MutexGuard<'_, LedLevels>> {
            self.lit
                .lock()
                .map_err(|_| MonitorError::gpio_error("LED state lock poisoned"))
        }
    }

    impl StatusLedPanel for MockLedPanel {
        fn apply(&mut self, status: &HealthStatus) -> Result<()> {
            let all_up = status.internet_reachable
                && status.local_web_reachable
                && status.packet_forwarder_running;
            *self.lit()? = [
                !all_up,
                status.internet_reachable,
                status.local_web_reachable,
                status.packet_forwarder_running,
            ];
            Ok(())
        }

        fn all_off(&mut self) -> Result<()> {
            *self.lit()? = [false; 4];
            Ok(())
        }
    }
}

// Re-export the appropriate implementations
#[cfg(feature = "hardware")]
pub use raspberry_pi::{GpioHeaterOutput as DefaultHeaterOutput, GpioLedPanel as DefaultLedPanel};

#[cfg(not(feature = "hardware"))]
pub use mock::{MockHeaterOutput, MockLedPanel};

#[cfg(not(feature = "hardware"))]
pub use mock::{MockHeaterOutput as DefaultHeaterOutput, MockLedPanel as DefaultLedPanel};
