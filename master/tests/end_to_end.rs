//! Drives the master and two simulated slave devices against each other
//! through real codec bytes: enrollment, configuration, and a complete
//! measurement cycle, exactly as the daemons would exchange them.

use master::{Master, Outbound};
use slave::gpio::VirtualGpio;
use slave::{Reply, SlaveDevice};
use slog::o;
use whts::messages::{backend2master, master2backend, slave2backend};
use whts::{Packet, ProtocolCodec};

struct SimSlave {
	id: u32,
	device: SlaveDevice<VirtualGpio>,
	rx: ProtocolCodec,
}

impl SimSlave {
	fn new(id: u32) -> Self {
		SimSlave {
			id,
			device: SlaveDevice::new(id, VirtualGpio::with_loopback()),
			rx: ProtocolCodec::new(),
		}
	}
}

struct Harness {
	master: Master,
	master_rx: ProtocolCodec,
	wire: ProtocolCodec,
	slaves: Vec<SimSlave>,
	to_backend: Vec<master2backend::Message>,
	forwarded: Vec<(u32, slave2backend::Message)>,
}

impl Harness {
	fn new(slave_ids: &[u32]) -> Self {
		Harness {
			master: Master::new(slog::Logger::root(slog::Discard, o!()), 5000),
			master_rx: ProtocolCodec::new(),
			wire: ProtocolCodec::new(),
			slaves: slave_ids.iter().map(|id| SimSlave::new(*id)).collect(),
			to_backend: Vec::new(),
			forwarded: Vec::new(),
		}
	}

	/// A slave's unsolicited announce, as bytes on the master's socket.
	fn announce(&mut self, index: usize, now_ms: u32) {
		let packet = Packet::SlaveToMaster {
			slave_id: self.slaves[index].id,
			message: self.slaves[index].device.announce(),
		};
		for bytes in self.wire.encode_packet(&packet).unwrap() {
			self.master_rx.push_bytes(&bytes, now_ms);
		}
		let out = self.drain_master(now_ms);
		self.deliver(out, now_ms);
	}

	fn backend_request(&mut self, message: backend2master::Message, now_ms: u32) {
		let out = self.master.handle_backend(&message, now_ms);
		self.deliver(out, now_ms);
	}

	fn tick(&mut self, now_ms: u32) {
		let out = self.master.tick(now_ms);
		self.deliver(out, now_ms);
	}

	/// Pushes master outbound traffic through the broadcast channel and
	/// keeps pumping until the exchange goes quiet.
	fn deliver(&mut self, outbound: Vec<Outbound>, now_ms: u32) {
		let mut queue = outbound;
		while !queue.is_empty() {
			for item in std::mem::take(&mut queue) {
				match item {
					Outbound::ToSlave { destination_id, message } => {
						let packet = Packet::MasterToSlave { destination_id, message };
						for bytes in self.wire.encode_packet(&packet).unwrap() {
							for slave in &mut self.slaves {
								slave.rx.push_bytes(&bytes, now_ms);
							}
						}
						self.drain_slaves(now_ms);
					}
					Outbound::ToBackend(message) => self.to_backend.push(message),
					Outbound::Forward { slave_id, message, .. } => {
						self.forwarded.push((slave_id, message));
					}
				}
			}
			queue = self.drain_master(now_ms);
		}
	}

	fn drain_slaves(&mut self, now_ms: u32) {
		for slave in &mut self.slaves {
			while let Some(frame) = slave.rx.next_frame() {
				let packet = Packet::decode(&frame).unwrap();
				let Packet::MasterToSlave { destination_id, message } = packet else {
					panic!("slave received non-command packet");
				};

				if let Some(reply) = slave.device.handle_message(destination_id, &message, now_ms) {
					let packet = match reply {
						Reply::ToMaster(message) => Packet::SlaveToMaster {
							slave_id: slave.id,
							message,
						},
						Reply::ToBackend(message) => Packet::SlaveToBackend {
							slave_id: slave.id,
							device_status: slave.device.device_status(),
							message,
						},
					};
					for bytes in self.wire.encode_packet(&packet).unwrap() {
						self.master_rx.push_bytes(&bytes, now_ms);
					}
				}
			}
		}
	}

	fn drain_master(&mut self, now_ms: u32) -> Vec<Outbound> {
		let mut out = Vec::new();
		while let Some(frame) = self.master_rx.next_frame() {
			match Packet::decode(&frame).unwrap() {
				Packet::SlaveToMaster { slave_id, message } => {
					out.extend(self.master.handle_slave(slave_id, &message, now_ms));
				}
				Packet::SlaveToBackend { slave_id, device_status, message } => {
					out.extend(self.master.handle_slave_data(
						slave_id,
						device_status,
						&message,
						now_ms,
					));
				}
				other => panic!("master received unexpected packet: {:?}", other),
			}
		}

		// Anything addressed off the wire is routed immediately.
		let mut terminal = Vec::new();
		for item in out {
			match item {
				Outbound::ToBackend(message) => self.to_backend.push(message),
				Outbound::Forward { slave_id, message, .. } => {
					self.forwarded.push((slave_id, message))
				}
				to_slave => terminal.push(to_slave),
			}
		}
		terminal
	}
}

#[test]
fn test_enrollment_assigns_sequential_short_ids() {
	let mut harness = Harness::new(&[0x1001, 0x1002]);

	harness.announce(0, 0);
	harness.announce(1, 10);

	assert_eq!(harness.slaves[0].device.short_id(), 1);
	assert_eq!(harness.slaves[1].device.short_id(), 2);
	assert_eq!(harness.master.registry.get(0x1001).unwrap().short_id, 1);
	assert_eq!(harness.master.registry.get(0x1002).unwrap().short_id, 2);
	// Confirms acked the pending assignments.
	assert_eq!(harness.master.pending_commands(), 0);
}

#[test]
fn test_full_measurement_cycle_over_the_wire() {
	let mut harness = Harness::new(&[0x1001, 0x1002]);
	harness.announce(0, 0);
	harness.announce(1, 0);

	harness.backend_request(
		backend2master::Message::SlaveConfig(backend2master::SlaveConfig {
			slaves: vec![
				whts::messages::SlaveConfigEntry {
					id: 0x1001,
					conduction_num: 4,
					resistance_num: 0,
					clip_mode: 0,
					clip_status: 0,
				},
				whts::messages::SlaveConfigEntry {
					id: 0x1002,
					conduction_num: 4,
					resistance_num: 0,
					clip_mode: 0,
					clip_status: 0,
				},
			],
		}),
		0,
	);

	harness.backend_request(
		backend2master::Message::ModeConfig(backend2master::ModeConfig { mode: 0 }),
		0,
	);
	// The config round-trip leaves both slaves configured and no
	// commands outstanding.
	assert_eq!(harness.master.pending_commands(), 0);
	assert_eq!(
		harness.slaves[0].device.state(),
		slave::DeviceState::Configured
	);

	harness.backend_request(
		backend2master::Message::Ctrl(backend2master::Ctrl { running_status: 1 }),
		0,
	);

	harness.tick(0); // cycle begins
	harness.tick(1); // sync broadcast; slaves start collecting
	assert_eq!(
		harness.slaves[0].device.state(),
		slave::DeviceState::Collecting
	);

	// Conduction window: 4 * 100 + 500 = 900 ms.
	harness.tick(901); // enters reading
	harness.tick(902); // read commands; slaves finish and reply

	assert_eq!(harness.forwarded.len(), 2);
	for (slave_id, message) in &harness.forwarded {
		match message {
			slave2backend::Message::ConductionData(data) => {
				// 4x4 loopback diagonal, bit-packed.
				assert_eq!(data.data, vec![0x21, 0x84], "slave {:#010X}", slave_id);
			}
			other => panic!("unexpected forwarded message: {:?}", other),
		}
	}
	assert_eq!(harness.master.pending_commands(), 0);

	// Backend saw a response for every request.
	let response_count = harness
		.to_backend
		.iter()
		.filter(|m| {
			matches!(
				m,
				master2backend::Message::SlaveConfigResponse(_)
					| master2backend::Message::ModeConfigResponse(_)
					| master2backend::Message::CtrlResponse(_)
			)
		})
		.count();
	assert_eq!(response_count, 3);

	// The next cycle starts only after the configured interval.
	harness.tick(3000);
	assert_eq!(
		harness.slaves[0].device.state(),
		slave::DeviceState::CollectionComplete
	);
	harness.tick(6001);
	harness.tick(6002);
	assert_eq!(
		harness.slaves[0].device.state(),
		slave::DeviceState::Collecting
	);
}
