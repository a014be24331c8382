//! The narrow per-pin port the collector drives. The only shipped
//! implementation is a simulation; real hardware sits behind the same
//! trait.

/// Electrical level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
	Low,
	High,
}

/// Configured mode of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
	Input,
	Output,
	InputPullUp,
	InputPullDown,
}

/// Per-pin read/write/configure, as much interface as the collector
/// needs and no more.
pub trait Gpio {
	fn configure(&mut self, pin: u8, mode: PinMode, initial: PinLevel);
	fn read(&self, pin: u8) -> PinLevel;
	fn write(&mut self, pin: u8, level: PinLevel);
}

/// Highest pin index any implementation has to support.
pub const MAX_GPIO_PINS: u8 = 64;

#[derive(Debug, Clone, Copy)]
struct PinState {
	mode: PinMode,
	level: PinLevel,
}

impl Default for PinState {
	fn default() -> Self {
		PinState {
			mode: PinMode::Input,
			level: PinLevel::Low,
		}
	}
}

/// A simulated harness: pins joined by `wire` read HIGH whenever any
/// wired peer is an output driven HIGH. Everything else reads its
/// pull-down level.
pub struct VirtualGpio {
	pins: [PinState; MAX_GPIO_PINS as usize],
	wires: Vec<(u8, u8)>,
}

impl VirtualGpio {
	pub fn new() -> Self {
		VirtualGpio {
			pins: [PinState::default(); MAX_GPIO_PINS as usize],
			wires: Vec::new(),
		}
	}

	/// Joins two pins with a simulated wire.
	pub fn wire(&mut self, a: u8, b: u8) {
		self.wires.push((a, b));
	}

	/// A harness where every pin loops back to itself, so each
	/// stimulation cycle sees exactly its own pin connected.
	pub fn with_loopback() -> Self {
		let mut gpio = Self::new();
		for pin in 0..MAX_GPIO_PINS {
			gpio.wire(pin, pin);
		}
		gpio
	}

	fn driven_high(&self, pin: u8) -> bool {
		let state = &self.pins[pin as usize];
		state.mode == PinMode::Output && state.level == PinLevel::High
	}
}

impl Default for VirtualGpio {
	fn default() -> Self {
		Self::new()
	}
}

impl Gpio for VirtualGpio {
	fn configure(&mut self, pin: u8, mode: PinMode, initial: PinLevel) {
		if pin >= MAX_GPIO_PINS {
			return;
		}
		self.pins[pin as usize] = PinState { mode, level: initial };
	}

	fn read(&self, pin: u8) -> PinLevel {
		if pin >= MAX_GPIO_PINS {
			return PinLevel::Low;
		}

		if self.driven_high(pin) {
			return PinLevel::High;
		}

		for &(a, b) in &self.wires {
			if a == pin && self.driven_high(b) {
				return PinLevel::High;
			}
			if b == pin && self.driven_high(a) {
				return PinLevel::High;
			}
		}

		PinLevel::Low
	}

	fn write(&mut self, pin: u8, level: PinLevel) {
		if pin >= MAX_GPIO_PINS {
			return;
		}
		self.pins[pin as usize].level = level;
	}
}
