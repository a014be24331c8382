pub mod commands;
pub mod cycle;
pub mod registry;

use commands::{PendingCommands, PingSessions, MAX_RETRIES};
use cycle::{CycleScheduler, CycleState};
use registry::{DeviceRegistry, SlaveConfig};
use slog::{info, warn, Logger};
use whts::messages::{backend2master, master2backend, master2slave, slave2backend, slave2master};
use whts::messages::DeviceInfo;
use whts::DeviceStatus;

/// Minimum gap between cycle starts.
pub const DEFAULT_CYCLE_INTERVAL_MS: u32 = 5000;

/// Something the main loop has to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
	/// Broadcast on the slave channel, addressed by destination id.
	ToSlave {
		destination_id: u32,
		message: master2slave::Message,
	},
	/// Response to the backend.
	ToBackend(master2backend::Message),
	/// A slave data frame relayed upstream unchanged.
	Forward {
		slave_id: u32,
		device_status: DeviceStatus,
		message: slave2backend::Message,
	},
}

/// The master's protocol state: registry, cycle scheduler, pending
/// retries, and ping sessions. All methods are driven by the main loop
/// with the current monotonic time; nothing here touches a socket.
pub struct Master {
	pub registry: DeviceRegistry,
	cycle: CycleScheduler,
	pending: PendingCommands,
	pings: PingSessions,
	current_mode: u8,
	running_status: u8,
	logger: Logger,
}

impl Master {
	pub fn new(logger: Logger, cycle_interval_ms: u32) -> Self {
		Master {
			registry: DeviceRegistry::new(),
			cycle: CycleScheduler::new(cycle_interval_ms),
			pending: PendingCommands::new(),
			pings: PingSessions::new(),
			current_mode: 0,
			running_status: 0,
			logger,
		}
	}

	pub fn current_mode(&self) -> u8 {
		self.current_mode
	}

	pub fn running_status(&self) -> u8 {
		self.running_status
	}

	pub fn cycle_state(&self) -> CycleState {
		self.cycle.state()
	}

	pub fn pending_commands(&self) -> usize {
		self.pending.len()
	}

	/// Queues a slave command through the retry path.
	fn send_with_retry(
		&mut self,
		out: &mut Vec<Outbound>,
		destination_id: u32,
		message: master2slave::Message,
		max_retries: u8,
		now_ms: u32,
	) {
		self.pending.push(destination_id, message.clone(), max_retries, now_ms);
		out.push(Outbound::ToSlave { destination_id, message });
	}

	/// Handles one backend request and returns the traffic it generates,
	/// the response to the backend included.
	pub fn handle_backend(
		&mut self,
		message: &backend2master::Message,
		now_ms: u32,
	) -> Vec<Outbound> {
		let mut out = Vec::new();

		match message {
			backend2master::Message::SlaveConfig(config) => {
				for slave in &config.slaves {
					self.registry.mark_connected(slave.id);
					self.registry.set_config(
						slave.id,
						SlaveConfig {
							conduction_num: slave.conduction_num,
							resistance_num: slave.resistance_num,
							clip_mode: slave.clip_mode,
							clip_status: slave.clip_status,
						},
					);
				}
				info!(self.logger, "Stored slave configuration"; "slaves" => config.slaves.len());

				out.push(Outbound::ToBackend(master2backend::Message::SlaveConfigResponse(
					master2backend::SlaveConfigResponse {
						status: 0,
						slaves: config.slaves.clone(),
					},
				)));
			}

			backend2master::Message::ModeConfig(mode) => {
				self.current_mode = mode.mode;
				self.push_mode_configs(&mut out, now_ms);

				out.push(Outbound::ToBackend(master2backend::Message::ModeConfigResponse(
					master2backend::ModeConfigResponse {
						status: 0,
						mode: mode.mode,
					},
				)));
			}

			backend2master::Message::Rst(rst) => {
				for slave in &rst.slaves {
					if !self.registry.is_connected(slave.id) {
						warn!(self.logger, "Skipping reset of disconnected slave";
							"slave" => format!("{:#010X}", slave.id));
						continue;
					}
					self.send_with_retry(
						&mut out,
						slave.id,
						master2slave::Message::Rst(master2slave::Rst {
							lock_status: slave.lock,
							clip_led: slave.clip_status,
						}),
						MAX_RETRIES,
						now_ms,
					);
				}

				out.push(Outbound::ToBackend(master2backend::Message::RstResponse(
					master2backend::RstResponse {
						status: 0,
						slaves: rst.slaves.clone(),
					},
				)));
			}

			backend2master::Message::Ctrl(ctrl) => {
				self.running_status = ctrl.running_status;
				self.apply_running_status(&mut out, now_ms);

				out.push(Outbound::ToBackend(master2backend::Message::CtrlResponse(
					master2backend::CtrlResponse {
						status: 0,
						running_status: ctrl.running_status,
					},
				)));
			}

			backend2master::Message::PingControl(ping) => {
				if self.registry.is_connected(ping.destination_id) {
					self.pings.start(
						ping.destination_id,
						ping.ping_mode,
						ping.ping_count,
						ping.interval as u32,
						now_ms,
					);
					info!(self.logger, "Started ping session";
						"target" => format!("{:#010X}", ping.destination_id),
						"count" => ping.ping_count);
				} else {
					warn!(self.logger, "Ping target is not connected";
						"target" => format!("{:#010X}", ping.destination_id));
				}

				out.push(Outbound::ToBackend(master2backend::Message::PingResponse(
					master2backend::PingResponse {
						ping_mode: ping.ping_mode,
						total_count: ping.ping_count,
						success_count: 0,
						destination_id: ping.destination_id,
					},
				)));
			}

			backend2master::Message::DeviceListRequest(_) => {
				let devices = self
					.registry
					.iter()
					.map(|(id, entry)| {
						let (major, minor, patch) = entry.version.unwrap_or((0, 0, 0));
						DeviceInfo {
							device_id: *id,
							short_id: entry.short_id,
							online: entry.connected as u8,
							version_major: major,
							version_minor: minor,
							version_patch: patch,
						}
					})
					.collect();

				out.push(Outbound::ToBackend(master2backend::Message::DeviceListResponse(
					master2backend::DeviceListResponse { devices },
				)));
			}
		}

		out
	}

	/// Fans the stored per-slave configuration out as the config command
	/// matching the current mode.
	fn push_mode_configs(&mut self, out: &mut Vec<Outbound>, now_ms: u32) {
		for slave_id in self.registry.connected_slaves() {
			let Some(config) = self.registry.config(slave_id) else {
				warn!(self.logger, "No configuration stored for slave";
					"slave" => format!("{:#010X}", slave_id));
				continue;
			};

			let command = match self.current_mode {
				0 if config.conduction_num > 0 => {
					master2slave::Message::ConductionConfig(master2slave::ConductionConfig {
						time_slot: 1,
						interval: 100,
						total_conduction_num: config.conduction_num as u16,
						start_conduction_num: 0,
						conduction_num: config.conduction_num as u16,
					})
				}
				1 if config.resistance_num > 0 => {
					master2slave::Message::ResistanceConfig(master2slave::ResistanceConfig {
						time_slot: 1,
						interval: 100,
						total_num: config.resistance_num as u16,
						start_num: 0,
						num: config.resistance_num as u16,
					})
				}
				2 => master2slave::Message::ClipConfig(master2slave::ClipConfig {
					interval: 100,
					mode: config.clip_mode,
					clip_pin: config.clip_status,
				}),
				_ => continue,
			};

			self.send_with_retry(out, slave_id, command, MAX_RETRIES, now_ms);
		}
	}

	fn apply_running_status(&mut self, out: &mut Vec<Outbound>, now_ms: u32) {
		match self.running_status {
			0 => {
				self.cycle.reset();
				// A mode-0 sync tells the slaves to idle; one retry only.
				for slave_id in self.registry.connected_slaves() {
					if self.registry.config(slave_id).is_some() {
						self.send_with_retry(
							out,
							slave_id,
							master2slave::Message::Sync(master2slave::Sync {
								mode: 0,
								timestamp: now_ms,
							}),
							1,
							now_ms,
						);
					}
				}
				info!(self.logger, "Stopped all operations");
			}

			1 => {
				self.start_data_collection();
			}

			2 => {
				for slave_id in self.registry.connected_slaves() {
					self.send_with_retry(
						out,
						slave_id,
						master2slave::Message::Rst(master2slave::Rst {
							lock_status: 0,
							clip_led: 0,
						}),
						MAX_RETRIES,
						now_ms,
					);
				}
				self.cycle.reset();
				info!(self.logger, "Reset all devices");
			}

			other => {
				warn!(self.logger, "Unknown running status"; "status" => other);
			}
		}
	}

	/// Arms the cycle scheduler with every connected, configured slave
	/// and the per-mode estimate of its collection time.
	fn start_data_collection(&mut self) {
		let mut slaves = Vec::new();
		for (id, entry) in self.registry.iter() {
			if !entry.connected {
				continue;
			}
			let Some(config) = entry.config else { continue };

			let duration = match self.current_mode {
				0 => config.conduction_num as u32 * 100 + 500,
				1 => config.resistance_num as u32 * 100 + 500,
				_ => 1000,
			};
			slaves.push((*id, duration));
		}

		if slaves.is_empty() {
			warn!(self.logger, "No configured slaves; data collection not started");
		} else {
			info!(self.logger, "Data collection armed";
				"mode" => self.current_mode, "slaves" => slaves.len());
		}

		self.cycle.start_collection(slaves);
	}

	/// Handles a slave reply: registry upkeep, retry acks, ping
	/// accounting, and enrollment.
	pub fn handle_slave(
		&mut self,
		slave_id: u32,
		message: &slave2master::Message,
		now_ms: u32,
	) -> Vec<Outbound> {
		let mut out = Vec::new();
		self.pending.acknowledge(slave_id, message);

		match message {
			slave2master::Message::ConductionConfigResponse(response) => {
				if response.status == 0 {
					self.registry.mark_connected(slave_id);
				}
			}
			slave2master::Message::ResistanceConfigResponse(response) => {
				if response.status == 0 {
					self.registry.mark_connected(slave_id);
				}
			}
			slave2master::Message::ClipConfigResponse(response) => {
				if response.status == 0 {
					self.registry.mark_connected(slave_id);
				}
			}
			slave2master::Message::RstResponse(response) => {
				info!(self.logger, "Reset acknowledged";
					"slave" => format!("{:#010X}", slave_id), "status" => response.status);
			}
			slave2master::Message::PingResponse(response) => {
				self.registry.mark_connected(slave_id);
				self.pings.record_success(slave_id);
				info!(self.logger, "Ping response";
					"slave" => format!("{:#010X}", slave_id),
					"sequence" => response.sequence_number,
					"rtt_ms" => now_ms.wrapping_sub(response.timestamp));
			}
			slave2master::Message::Announce(announce) => {
				self.registry.mark_connected(slave_id);
				self.registry.entry(slave_id).version = Some((
					announce.version_major,
					announce.version_minor,
					announce.version_patch,
				));

				// Enrollment: a device without a short id gets the next
				// free one.
				let short_id = self.registry.next_short_id();
				if self.registry.entry(slave_id).short_id == 0 && short_id != 0 {
					self.registry.set_short_id(slave_id, short_id);
					info!(self.logger, "Assigning short id";
						"slave" => format!("{:#010X}", slave_id), "short_id" => short_id);
					self.send_with_retry(
						&mut out,
						slave_id,
						master2slave::Message::ShortIdAssign(master2slave::ShortIdAssign {
							short_id,
						}),
						MAX_RETRIES,
						now_ms,
					);
				}
			}
			slave2master::Message::ShortIdConfirm(confirm) => {
				self.registry.mark_connected(slave_id);
				self.registry.set_short_id(slave_id, confirm.short_id);
			}
		}

		out
	}

	/// Handles a slave data frame: the cycle is credited and the frame
	/// relayed upstream.
	pub fn handle_slave_data(
		&mut self,
		slave_id: u32,
		device_status: DeviceStatus,
		message: &slave2backend::Message,
		now_ms: u32,
	) -> Vec<Outbound> {
		self.registry.mark_connected(slave_id);
		self.pending.acknowledge_data(slave_id);

		if self.cycle.mark_data_received(slave_id, now_ms) {
			info!(self.logger, "Collection cycle complete"; "at_ms" => now_ms);
		}

		vec![Outbound::Forward {
			slave_id,
			device_status,
			message: message.clone(),
		}]
	}

	/// One main-loop tick: expired retries, due pings, and the cycle
	/// state walk.
	pub fn tick(&mut self, now_ms: u32) -> Vec<Outbound> {
		let mut out = Vec::new();

		let (resends, dropped) = self.pending.tick(now_ms);
		for (destination_id, message) in resends {
			out.push(Outbound::ToSlave { destination_id, message });
		}
		for entry in dropped {
			warn!(self.logger, "Command dropped after retries";
				"slave" => format!("{:#010X}", entry.target_id),
				"retries" => entry.max_retries);

			// A read command that ran out of retries means the slave's
			// data is never coming; stop the cycle waiting on it.
			let was_read = matches!(
				entry.message,
				master2slave::Message::ReadConductionData(_)
					| master2slave::Message::ReadResistanceData(_)
					| master2slave::Message::ReadClipData(_)
			);
			if was_read && self.cycle.mark_data_received(entry.target_id, now_ms) {
				warn!(self.logger, "Collection cycle completed with timed-out slaves";
					"slave" => format!("{:#010X}", entry.target_id));
			}
		}

		let (pings, completed) = self.pings.tick(now_ms);
		for (destination_id, request) in pings {
			out.push(Outbound::ToSlave {
				destination_id,
				message: master2slave::Message::PingRequest(request),
			});
		}
		for session in completed {
			info!(self.logger, "Ping session finished";
				"target" => format!("{:#010X}", session.target_id),
				"success" => session.success, "total" => session.total);
		}

		self.tick_cycle(&mut out, now_ms);

		out
	}

	fn tick_cycle(&mut self, out: &mut Vec<Outbound>, now_ms: u32) {
		if !self.cycle.is_active() {
			return;
		}

		match self.cycle.state() {
			CycleState::Idle | CycleState::Complete => {
				if self.cycle.should_start_cycle(self.running_status == 1, now_ms) {
					self.cycle.begin_cycle(now_ms);
					info!(self.logger, "Collection cycle started"; "at_ms" => now_ms);
				}
			}

			CycleState::Collecting => {
				if !self.cycle.sync_sent() {
					for info in self.cycle.active_slaves() {
						out.push(Outbound::ToSlave {
							destination_id: info.slave_id,
							message: master2slave::Message::Sync(master2slave::Sync {
								mode: self.current_mode,
								timestamp: now_ms,
							}),
						});
					}
					self.cycle.mark_sync_sent(now_ms);
				} else if self.cycle.all_collections_elapsed(now_ms) {
					self.cycle.enter_reading();
					info!(self.logger, "All collection windows elapsed; reading data");
				}
			}

			CycleState::ReadingData => {
				let read_command = match self.current_mode {
					0 => master2slave::Message::ReadConductionData(master2slave::ReadConductionData {
						reserve: 0,
					}),
					1 => master2slave::Message::ReadResistanceData(master2slave::ReadResistanceData {
						reserve: 0,
					}),
					_ => master2slave::Message::ReadClipData(master2slave::ReadClipData { reserve: 0 }),
				};

				for slave_id in self.cycle.slaves_needing_request() {
					self.send_with_retry(out, slave_id, read_command.clone(), MAX_RETRIES, now_ms);
					self.cycle.mark_data_requested(slave_id);
				}
			}
		}
	}
}
