//! The continuity collector: a cooperative state machine that walks the
//! detection cycles, stimulating one pin per in-window cycle and
//! sampling the whole bank.

use thiserror::Error;

use crate::gpio::{Gpio, PinLevel, PinMode, MAX_GPIO_PINS};

/// Parameters for one collection run. `num` pins are scanned on every
/// cycle; stimulation walks pin `c - start_detection_num` while
/// `start_detection_num <= c < start_detection_num + num`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectorConfig {
	pub num: u8,
	pub start_detection_num: u8,
	pub total_detection_num: u8,
	pub interval_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
	Idle,
	Running,
	Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuityState {
	Disconnected,
	Connected,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
	#[error("configuration field {0} out of range")]
	OutOfRange(&'static str),

	#[error("cannot reconfigure while a collection is running")]
	Reconfiguration,

	#[error("collector has no configuration")]
	NotConfigured,
}

pub struct ContinuityCollector<G: Gpio> {
	gpio: G,
	config: CollectorConfig,
	matrix: Vec<Vec<ContinuityState>>,
	current_cycle: u8,
	status: CollectionStatus,
	last_process_ms: u32,
}

impl<G: Gpio> ContinuityCollector<G> {
	pub fn new(gpio: G) -> Self {
		ContinuityCollector {
			gpio,
			config: CollectorConfig::default(),
			matrix: Vec::new(),
			current_cycle: 0,
			status: CollectionStatus::Idle,
			last_process_ms: 0,
		}
	}

	pub fn status(&self) -> CollectionStatus {
		self.status
	}

	pub fn config(&self) -> CollectorConfig {
		self.config
	}

	pub fn current_cycle(&self) -> u8 {
		self.current_cycle
	}

	pub fn is_complete(&self) -> bool {
		self.status == CollectionStatus::Completed
	}

	/// Validates and stores a configuration, sizing the result matrix.
	/// Refused while a collection is running.
	pub fn configure(&mut self, config: CollectorConfig) -> Result<(), ConfigError> {
		if self.status == CollectionStatus::Running {
			return Err(ConfigError::Reconfiguration);
		}

		if config.num == 0 || config.num > MAX_GPIO_PINS {
			return Err(ConfigError::OutOfRange("num"));
		}
		if config.interval_ms == 0 {
			return Err(ConfigError::OutOfRange("interval_ms"));
		}
		if config.total_detection_num == 0 || config.total_detection_num > MAX_GPIO_PINS {
			return Err(ConfigError::OutOfRange("total_detection_num"));
		}
		if config.start_detection_num >= config.total_detection_num {
			return Err(ConfigError::OutOfRange("start_detection_num"));
		}

		self.config = config;
		self.matrix = vec![
			vec![ContinuityState::Disconnected; config.num as usize];
			config.total_detection_num as usize
		];
		self.current_cycle = 0;
		self.status = CollectionStatus::Idle;

		Ok(())
	}

	/// Begins a new collection run. All pins start as pulled-down inputs.
	pub fn start(&mut self, now_ms: u32) -> Result<(), ConfigError> {
		if self.status == CollectionStatus::Running {
			return Err(ConfigError::Reconfiguration);
		}
		if self.config.num == 0 {
			return Err(ConfigError::NotConfigured);
		}

		for pin in 0..self.config.num {
			self.gpio.configure(pin, PinMode::InputPullDown, PinLevel::Low);
		}

		for row in &mut self.matrix {
			row.fill(ContinuityState::Disconnected);
		}
		self.current_cycle = 0;
		self.status = CollectionStatus::Running;
		self.last_process_ms = now_ms;

		Ok(())
	}

	pub fn stop(&mut self) {
		if self.status == CollectionStatus::Running {
			self.status = CollectionStatus::Idle;
		}
	}

	/// Advances the collection by at most one cycle. The first cycle runs
	/// immediately; later cycles wait out `interval_ms`.
	pub fn process(&mut self, now_ms: u32) {
		if self.status != CollectionStatus::Running {
			return;
		}

		if self.current_cycle >= self.config.total_detection_num {
			self.status = CollectionStatus::Completed;
			return;
		}

		let elapsed = now_ms.wrapping_sub(self.last_process_ms);
		if elapsed < self.config.interval_ms && self.current_cycle != 0 {
			return;
		}

		self.run_cycle();
		self.last_process_ms = now_ms;

		if self.current_cycle >= self.config.total_detection_num {
			self.status = CollectionStatus::Completed;
		}
	}

	/// Runs every remaining cycle back to back. Used when a data read
	/// arrives mid-collection and the reply cannot wait out the pacing.
	pub fn run_to_completion(&mut self) {
		while self.status == CollectionStatus::Running {
			if self.current_cycle >= self.config.total_detection_num {
				self.status = CollectionStatus::Completed;
				break;
			}
			self.run_cycle();
			if self.current_cycle >= self.config.total_detection_num {
				self.status = CollectionStatus::Completed;
			}
		}
	}

	fn run_cycle(&mut self) {
		self.configure_pins_for_cycle(self.current_cycle);

		let row = (0..self.config.num)
			.map(|pin| match self.gpio.read(pin) {
				PinLevel::High => ContinuityState::Connected,
				PinLevel::Low => ContinuityState::Disconnected,
			})
			.collect();

		let cycle = self.current_cycle as usize;
		if cycle < self.matrix.len() {
			self.matrix[cycle] = row;
		}

		self.current_cycle += 1;
	}

	/// On an in-window cycle one pin is driven HIGH as an output and the
	/// rest are pulled-down inputs; outside the window every pin is a
	/// pulled-down input.
	fn configure_pins_for_cycle(&mut self, cycle: u8) {
		let config = self.config;
		let in_window = cycle >= config.start_detection_num
			&& cycle < config.start_detection_num.saturating_add(config.num);

		if in_window {
			let active = cycle - config.start_detection_num;
			for pin in 0..config.num {
				if pin == active {
					self.gpio.configure(pin, PinMode::Output, PinLevel::High);
					self.gpio.write(pin, PinLevel::High);
				} else {
					self.gpio.configure(pin, PinMode::InputPullDown, PinLevel::Low);
				}
			}
		} else {
			for pin in 0..config.num {
				self.gpio.configure(pin, PinMode::InputPullDown, PinLevel::Low);
			}
		}
	}

	pub fn matrix(&self) -> &[Vec<ContinuityState>] {
		&self.matrix
	}

	/// Packs the matrix row-major into bytes, pin index LSB-first inside
	/// each row, zero-padding the high bits of the final byte.
	pub fn data_vector(&self) -> Vec<u8> {
		let total_bits = self.matrix.len() * self.config.num as usize;
		let mut out = Vec::with_capacity(total_bits.div_ceil(8));

		let mut current = 0u8;
		let mut bit = 0u8;
		for row in &self.matrix {
			for state in row.iter().take(self.config.num as usize) {
				if *state == ContinuityState::Connected {
					current |= 1 << bit;
				}
				bit += 1;
				if bit == 8 {
					out.push(current);
					current = 0;
					bit = 0;
				}
			}
		}

		if bit > 0 {
			out.push(current);
		}

		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gpio::VirtualGpio;

	fn configured(num: u8, total: u8, interval: u32) -> ContinuityCollector<VirtualGpio> {
		let mut collector = ContinuityCollector::new(VirtualGpio::with_loopback());
		collector
			.configure(CollectorConfig {
				num,
				start_detection_num: 0,
				total_detection_num: total,
				interval_ms: interval,
			})
			.unwrap();
		collector
	}

	#[test]
	fn test_configure_bounds() {
		let mut collector = ContinuityCollector::new(VirtualGpio::new());
		let bad = CollectorConfig {
			num: 0,
			start_detection_num: 0,
			total_detection_num: 4,
			interval_ms: 10,
		};
		assert_eq!(collector.configure(bad), Err(ConfigError::OutOfRange("num")));

		let bad = CollectorConfig {
			num: 4,
			start_detection_num: 4,
			total_detection_num: 4,
			interval_ms: 10,
		};
		assert_eq!(
			collector.configure(bad),
			Err(ConfigError::OutOfRange("start_detection_num"))
		);

		let bad = CollectorConfig {
			num: 65,
			start_detection_num: 0,
			total_detection_num: 4,
			interval_ms: 10,
		};
		assert_eq!(collector.configure(bad), Err(ConfigError::OutOfRange("num")));
	}

	#[test]
	fn test_start_requires_configuration() {
		let mut collector = ContinuityCollector::new(VirtualGpio::new());
		assert_eq!(collector.start(0), Err(ConfigError::NotConfigured));
	}

	#[test]
	fn test_reconfigure_refused_while_running() {
		let mut collector = configured(4, 4, 10);
		collector.start(0).unwrap();
		let config = collector.config();
		assert_eq!(collector.configure(config), Err(ConfigError::Reconfiguration));
	}

	#[test]
	fn test_cycle_pacing() {
		let mut collector = configured(4, 4, 100);
		collector.start(0).unwrap();

		// First cycle runs immediately; the second must wait the interval.
		collector.process(0);
		assert_eq!(collector.current_cycle(), 1);
		collector.process(50);
		assert_eq!(collector.current_cycle(), 1);
		collector.process(100);
		assert_eq!(collector.current_cycle(), 2);
		collector.process(200);
		collector.process(300);
		assert_eq!(collector.current_cycle(), 4);
		assert!(collector.is_complete());
	}

	#[test]
	fn test_loopback_produces_diagonal() {
		let mut collector = configured(4, 4, 10);
		collector.start(0).unwrap();
		collector.run_to_completion();
		assert!(collector.is_complete());

		let matrix = collector.matrix();
		for (cycle, row) in matrix.iter().enumerate() {
			for (pin, state) in row.iter().enumerate() {
				let expected = if pin == cycle {
					ContinuityState::Connected
				} else {
					ContinuityState::Disconnected
				};
				assert_eq!(*state, expected, "cycle {} pin {}", cycle, pin);
			}
		}
	}

	#[test]
	fn test_data_vector_packing() {
		let mut collector = configured(4, 4, 10);
		collector.start(0).unwrap();
		collector.run_to_completion();

		// Diagonal matrix: bit c*4+c set for c in 0..4, packed LSB-first.
		// Bits 0, 5, 10, 15 -> bytes 0b00100001, 0b10000100.
		assert_eq!(collector.data_vector(), vec![0x21, 0x84]);
	}

	#[test]
	fn test_data_vector_pads_final_byte() {
		let mut collector = configured(3, 3, 10);
		collector.start(0).unwrap();
		collector.run_to_completion();

		// 9 bits -> 2 bytes; diagonal sets bits 0, 4, 8.
		assert_eq!(collector.data_vector(), vec![0x11, 0x01]);
	}

	#[test]
	fn test_stimulation_window_offset() {
		let mut collector = ContinuityCollector::new(VirtualGpio::with_loopback());
		collector
			.configure(CollectorConfig {
				num: 2,
				start_detection_num: 1,
				total_detection_num: 4,
				interval_ms: 10,
			})
			.unwrap();
		collector.start(0).unwrap();
		collector.run_to_completion();

		let matrix = collector.matrix();
		// Cycle 0 is outside the window: nothing driven.
		assert!(matrix[0].iter().all(|s| *s == ContinuityState::Disconnected));
		// Cycles 1 and 2 drive pins 0 and 1 respectively.
		assert_eq!(matrix[1][0], ContinuityState::Connected);
		assert_eq!(matrix[2][1], ContinuityState::Connected);
		// Cycle 3 is past the window again.
		assert!(matrix[3].iter().all(|s| *s == ContinuityState::Disconnected));
	}
}
