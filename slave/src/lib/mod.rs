pub mod collector;
pub mod gpio;

use collector::{CollectorConfig, ContinuityCollector};
use gpio::Gpio;
use whts::messages::{master2slave, slave2backend, slave2master};
use whts::{DeviceStatus, BROADCAST_ID};

/// Firmware version reported in announce messages.
pub const VERSION: (u8, u8, u16) = (0, 1, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
	Idle,
	Configured,
	Collecting,
	CollectionComplete,
	Error,
}

/// A reply produced by the state machine. Data messages belong to the
/// slave-to-backend id space and are framed with the device status;
/// everything else goes back as slave-to-master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	ToMaster(slave2master::Message),
	ToBackend(slave2backend::Message),
}

/// The slave-side state machine: consumes master-to-slave messages,
/// drives the collector, and produces replies.
pub struct SlaveDevice<G: Gpio> {
	device_id: u32,
	short_id: u8,
	state: DeviceState,
	configured: bool,
	collector: ContinuityCollector<G>,
	status: DeviceStatus,
}

impl<G: Gpio> SlaveDevice<G> {
	pub fn new(device_id: u32, gpio: G) -> Self {
		SlaveDevice {
			device_id,
			short_id: 0,
			state: DeviceState::Idle,
			configured: false,
			collector: ContinuityCollector::new(gpio),
			status: DeviceStatus::empty(),
		}
	}

	pub fn device_id(&self) -> u32 {
		self.device_id
	}

	pub fn short_id(&self) -> u8 {
		self.short_id
	}

	pub fn state(&self) -> DeviceState {
		self.state
	}

	pub fn device_status(&self) -> DeviceStatus {
		self.status
	}

	/// The unsolicited announce sent at startup so the master can
	/// register this device.
	pub fn announce(&self) -> slave2master::Message {
		slave2master::Message::Announce(slave2master::Announce {
			device_id: self.device_id,
			version_major: VERSION.0,
			version_minor: VERSION.1,
			version_patch: VERSION.2,
		})
	}

	/// Ticks the collector from the main loop and completes the state
	/// machine when the last cycle lands.
	pub fn poll(&mut self, now_ms: u32) {
		if self.configured && self.state == DeviceState::Collecting {
			self.collector.process(now_ms);
			if self.collector.is_complete() {
				self.state = DeviceState::CollectionComplete;
			}
		}
	}

	/// Handles one master-to-slave message. Returns `None` when the
	/// message is addressed elsewhere or needs no reply.
	pub fn handle_message(
		&mut self,
		destination_id: u32,
		message: &master2slave::Message,
		now_ms: u32,
	) -> Option<Reply> {
		if destination_id != self.device_id && destination_id != BROADCAST_ID {
			return None;
		}

		match message {
			master2slave::Message::Sync(sync) => {
				self.handle_sync(sync.mode, now_ms);
				None
			}
			master2slave::Message::ConductionConfig(config) => {
				Some(Reply::ToMaster(self.handle_conduction_config(config)))
			}
			master2slave::Message::ResistanceConfig(config) => {
				Some(Reply::ToMaster(slave2master::Message::ResistanceConfigResponse(
					slave2master::ResistanceConfigResponse {
						status: 0,
						time_slot: config.time_slot,
						interval: config.interval,
						total_num: config.total_num,
						start_num: config.start_num,
						num: config.num,
					},
				)))
			}
			master2slave::Message::ClipConfig(config) => {
				Some(Reply::ToMaster(slave2master::Message::ClipConfigResponse(
					slave2master::ClipConfigResponse {
						status: 0,
						interval: config.interval,
						mode: config.mode,
						clip_pin: config.clip_pin,
					},
				)))
			}
			master2slave::Message::ReadConductionData(_) => {
				Some(Reply::ToBackend(self.read_conduction_data()))
			}
			master2slave::Message::ReadResistanceData(_) => {
				// No resistance collector yet; a fixed placeholder byte
				// keeps the read path exercised end to end.
				Some(Reply::ToBackend(slave2backend::Message::ResistanceData(
					slave2backend::ResistanceData { data: vec![0x90] },
				)))
			}
			master2slave::Message::ReadClipData(_) => {
				Some(Reply::ToBackend(slave2backend::Message::ClipData(
					slave2backend::ClipData { data: 0xFF },
				)))
			}
			master2slave::Message::Rst(rst) => {
				self.reset();
				Some(Reply::ToMaster(slave2master::Message::RstResponse(
					slave2master::RstResponse {
						status: 0,
						lock_status: rst.lock_status,
						clip_led: rst.clip_led,
					},
				)))
			}
			master2slave::Message::PingRequest(ping) => {
				Some(Reply::ToMaster(slave2master::Message::PingResponse(
					slave2master::PingResponse {
						sequence_number: ping.sequence_number,
						timestamp: now_ms,
					},
				)))
			}
			master2slave::Message::ShortIdAssign(assign) => {
				self.short_id = assign.short_id;
				Some(Reply::ToMaster(slave2master::Message::ShortIdConfirm(
					slave2master::ShortIdConfirm {
						status: 0,
						short_id: assign.short_id,
					},
				)))
			}
		}
	}

	/// Sync starts a collection run if the device has a stored
	/// configuration; an unconfigured device stays put.
	fn handle_sync(&mut self, _mode: u8, now_ms: u32) {
		if !self.configured {
			return;
		}

		self.collector.stop();
		match self.collector.start(now_ms) {
			Ok(()) => {
				self.state = DeviceState::Collecting;
				// One immediate tick so short collections finish promptly.
				self.collector.process(now_ms);
			}
			Err(_) => {
				self.state = DeviceState::Error;
			}
		}
	}

	fn handle_conduction_config(
		&mut self,
		config: &master2slave::ConductionConfig,
	) -> slave2master::Message {
		let collector_config = CollectorConfig {
			num: config.conduction_num as u8,
			start_detection_num: config.start_conduction_num as u8,
			total_detection_num: config.total_conduction_num as u8,
			interval_ms: config.interval as u32,
		};

		let status = match self.collector.configure(collector_config) {
			Ok(()) => {
				self.configured = true;
				self.state = DeviceState::Configured;
				0
			}
			Err(_) => {
				self.configured = false;
				self.state = DeviceState::Error;
				1
			}
		};

		slave2master::Message::ConductionConfigResponse(slave2master::ConductionConfigResponse {
			status,
			time_slot: config.time_slot,
			interval: config.interval,
			total_conduction_num: config.total_conduction_num,
			start_conduction_num: config.start_conduction_num,
			conduction_num: config.conduction_num,
		})
	}

	/// A read while collecting finishes the remaining cycles immediately;
	/// the configuration survives so later syncs can rerun it.
	fn read_conduction_data(&mut self) -> slave2backend::Message {
		if !self.configured {
			return slave2backend::Message::ConductionData(slave2backend::ConductionData {
				data: Vec::new(),
			});
		}

		if self.state == DeviceState::Collecting {
			self.collector.run_to_completion();
			self.state = DeviceState::CollectionComplete;
		}

		slave2backend::Message::ConductionData(slave2backend::ConductionData {
			data: self.collector.data_vector(),
		})
	}

	/// Reset preserves the stored configuration but clears any run in
	/// progress.
	fn reset(&mut self) {
		self.collector.stop();
		self.state = if self.configured {
			DeviceState::Configured
		} else {
			DeviceState::Idle
		};
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gpio::VirtualGpio;

	fn device() -> SlaveDevice<VirtualGpio> {
		SlaveDevice::new(0x12345678, VirtualGpio::with_loopback())
	}

	fn conduction_config(num: u16) -> master2slave::Message {
		master2slave::Message::ConductionConfig(master2slave::ConductionConfig {
			time_slot: 1,
			interval: 10,
			total_conduction_num: num,
			start_conduction_num: 0,
			conduction_num: num,
		})
	}

	#[test]
	fn test_filters_other_destinations() {
		let mut device = device();
		let reply = device.handle_message(0x1111, &conduction_config(4), 0);
		assert!(reply.is_none());
		assert_eq!(device.state(), DeviceState::Idle);
	}

	#[test]
	fn test_broadcast_accepted() {
		let mut device = device();
		let reply = device.handle_message(BROADCAST_ID, &conduction_config(4), 0);
		assert!(reply.is_some());
		assert_eq!(device.state(), DeviceState::Configured);
	}

	#[test]
	fn test_sync_without_config_stays_idle() {
		let mut device = device();
		let sync = master2slave::Message::Sync(master2slave::Sync { mode: 0, timestamp: 0 });
		assert!(device.handle_message(0x12345678, &sync, 0).is_none());
		assert_eq!(device.state(), DeviceState::Idle);
	}

	#[test]
	fn test_configure_then_sync_then_collect() {
		let mut device = device();
		let reply = device.handle_message(0x12345678, &conduction_config(4), 0).unwrap();
		match reply {
			Reply::ToMaster(slave2master::Message::ConductionConfigResponse(response)) => {
				assert_eq!(response.status, 0);
				assert_eq!(response.conduction_num, 4);
			}
			other => panic!("unexpected reply: {:?}", other),
		}

		let sync = master2slave::Message::Sync(master2slave::Sync { mode: 0, timestamp: 0 });
		assert!(device.handle_message(0x12345678, &sync, 0).is_none());
		assert_eq!(device.state(), DeviceState::Collecting);

		// Drive the collector through its cycles from the main loop.
		let mut now = 0;
		while device.state() == DeviceState::Collecting {
			now += 10;
			device.poll(now);
		}
		assert_eq!(device.state(), DeviceState::CollectionComplete);
	}

	#[test]
	fn test_read_mid_collection_completes_first() {
		let mut device = device();
		device.handle_message(0x12345678, &conduction_config(4), 0);
		let sync = master2slave::Message::Sync(master2slave::Sync { mode: 0, timestamp: 0 });
		device.handle_message(0x12345678, &sync, 0);
		assert_eq!(device.state(), DeviceState::Collecting);

		let read = master2slave::Message::ReadConductionData(master2slave::ReadConductionData {
			reserve: 0,
		});
		let reply = device.handle_message(0x12345678, &read, 5).unwrap();
		match reply {
			Reply::ToBackend(slave2backend::Message::ConductionData(data)) => {
				// 4x4 bits -> 2 bytes.
				assert_eq!(data.data.len(), 2);
			}
			other => panic!("unexpected reply: {:?}", other),
		}
		assert_eq!(device.state(), DeviceState::CollectionComplete);
	}

	#[test]
	fn test_reset_preserves_configuration() {
		let mut device = device();
		device.handle_message(0x12345678, &conduction_config(4), 0);
		let sync = master2slave::Message::Sync(master2slave::Sync { mode: 0, timestamp: 0 });
		device.handle_message(0x12345678, &sync, 0);

		let rst = master2slave::Message::Rst(master2slave::Rst { lock_status: 1, clip_led: 0 });
		let reply = device.handle_message(BROADCAST_ID, &rst, 1).unwrap();
		match reply {
			Reply::ToMaster(slave2master::Message::RstResponse(response)) => {
				assert_eq!(response.status, 0);
				assert_eq!(response.lock_status, 1);
			}
			other => panic!("unexpected reply: {:?}", other),
		}
		assert_eq!(device.state(), DeviceState::Configured);

		// The preserved configuration lets a new sync start collecting.
		device.handle_message(0x12345678, &sync, 2);
		assert_eq!(device.state(), DeviceState::Collecting);
	}

	#[test]
	fn test_invalid_config_enters_error() {
		let mut device = device();
		let reply = device.handle_message(0x12345678, &conduction_config(0), 0).unwrap();
		match reply {
			Reply::ToMaster(slave2master::Message::ConductionConfigResponse(response)) => {
				assert_eq!(response.status, 1);
			}
			other => panic!("unexpected reply: {:?}", other),
		}
		assert_eq!(device.state(), DeviceState::Error);
	}

	#[test]
	fn test_ping_echoes_sequence() {
		let mut device = device();
		let ping = master2slave::Message::PingRequest(master2slave::PingRequest {
			sequence_number: 9,
			timestamp: 100,
		});
		let reply = device.handle_message(BROADCAST_ID, &ping, 250).unwrap();
		assert_eq!(
			reply,
			Reply::ToMaster(slave2master::Message::PingResponse(slave2master::PingResponse {
				sequence_number: 9,
				timestamp: 250,
			}))
		);
	}

	#[test]
	fn test_short_id_assignment() {
		let mut device = device();
		let assign =
			master2slave::Message::ShortIdAssign(master2slave::ShortIdAssign { short_id: 5 });
		let reply = device.handle_message(0x12345678, &assign, 0).unwrap();
		assert_eq!(
			reply,
			Reply::ToMaster(slave2master::Message::ShortIdConfirm(slave2master::ShortIdConfirm {
				status: 0,
				short_id: 5,
			}))
		);
		assert_eq!(device.short_id(), 5);
	}
}
