// t1link/src/transport/serial.rs
//! Serial/UART reader adapter.
//!
//! Character-level readers wire the card's I/O contact straight onto a
//! UART. The adapter owns the reset/power sequencing and two quirks of
//! that electrical setup: the half-duplex line echoes our own transmit
//! bytes back (suppressed with a loopback counter), and the mechanical
//! presence switch bounces (debounced over consecutive samples).

use log::{debug, trace};

use crate::transport::traits::CardTransport;
use crate::utils::bytes_to_hex_spaced;
use crate::Result;

/// Default ISO 7816-3 character clock, Hz
pub const DEFAULT_CLOCK_HZ: u32 = 3_579_545;
/// Default elementary time unit in clock cycles (Fd/Dd = 372/1)
pub const DEFAULT_ETU_CYCLES: u32 = 372;
/// Consecutive identical samples before a presence change is believed
const PRESENCE_STABLE_SAMPLES: u8 = 3;

/// Raw byte I/O plus the control pins a smart-card slot exposes.
pub trait SmartCardPort {
    /// Apply line parameters (called once during activation)
    fn configure(&mut self, line: &LineConfig) -> Result<()>;
    /// Write raw bytes to the I/O line
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
    /// Read whatever is buffered, without blocking
    fn read_available(&mut self) -> Result<Vec<u8>>;
    /// Drive the RST contact
    fn set_reset(&mut self, asserted: bool) -> Result<()>;
    /// Drive card power (VCC)
    fn set_power(&mut self, on: bool) -> Result<()>;
    /// Sample the presence switch (raw, possibly bouncing)
    fn sample_presence(&mut self) -> Result<bool>;
}

/// Smart-card line parameters. ISO 7816-3 fixes even parity and a guard
/// time equivalent to 1.5 extra stop bits; only the baud rate varies with
/// the clock and the negotiated ETU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineConfig {
    /// Symbols per second on the I/O line
    pub baud: u32,
    /// Parity mode (always even for ISO 7816-3)
    pub even_parity: bool,
    /// Stop bits in half units: 3 means 1.5
    pub stop_bits_x2: u8,
}

impl LineConfig {
    /// Derive the baud rate from the card clock and the ETU length.
    pub fn from_clock(clock_hz: u32, etu_cycles: u32) -> Self {
        Self {
            baud: clock_hz / etu_cycles.max(1),
            even_parity: true,
            stop_bits_x2: 3,
        }
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::from_clock(DEFAULT_CLOCK_HZ, DEFAULT_ETU_CYCLES)
    }
}

/// Presence debouncer: a change of state is only reported after the raw
/// sample has agreed with itself for a run of consecutive polls.
#[derive(Debug)]
struct Debounce {
    stable: bool,
    candidate: bool,
    run: u8,
}

impl Debounce {
    fn new(initial: bool) -> Self {
        Self {
            stable: initial,
            candidate: initial,
            run: 0,
        }
    }

    fn update(&mut self, sample: bool) -> bool {
        if sample == self.stable {
            self.run = 0;
        } else if sample == self.candidate {
            self.run += 1;
            if self.run >= PRESENCE_STABLE_SAMPLES {
                self.stable = sample;
                self.run = 0;
            }
        } else {
            self.candidate = sample;
            self.run = 1;
        }
        self.stable
    }
}

/// Serial reader transport over any [`SmartCardPort`].
pub struct SerialTransport<P: SmartCardPort> {
    port: P,
    line: LineConfig,
    debounce: Debounce,
    /// Bytes of our own transmission still expected back on the line
    loopback: usize,
}

impl<P: SmartCardPort> SerialTransport<P> {
    /// Adapter with the standard 372-cycle ETU line settings.
    pub fn new(port: P) -> Self {
        Self::with_line(port, LineConfig::default())
    }

    /// Adapter with explicit line settings.
    pub fn with_line(port: P, line: LineConfig) -> Self {
        Self {
            port,
            line,
            debounce: Debounce::new(false),
            loopback: 0,
        }
    }

    /// Access the underlying port (test instrumentation)
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl<P: SmartCardPort> CardTransport for SerialTransport<P> {
    fn activate(&mut self) -> Result<()> {
        debug!("cold reset at {} baud", self.line.baud);
        self.loopback = 0;
        self.port.configure(&self.line)?;
        self.port.set_power(true)?;
        self.port.set_reset(true)?;
        // releasing RST starts the ATR
        self.port.set_reset(false)?;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.port.set_reset(true)?;
        self.port.set_power(false)?;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write(bytes)?;
        // the half-duplex line will echo these back
        self.loopback += bytes.len();
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<u8>> {
        let mut data = self.port.read_available()?;
        if self.loopback > 0 {
            let skip = self.loopback.min(data.len());
            trace!("dropping {} loopback byte(s)", skip);
            data.drain(..skip);
            self.loopback -= skip;
        }
        if !data.is_empty() {
            trace!("serial rx {}", bytes_to_hex_spaced(&data));
        }
        Ok(data)
    }

    fn card_present(&mut self) -> bool {
        match self.port.sample_presence() {
            Ok(sample) => self.debounce.update(sample),
            Err(_) => false,
        }
    }
}
