//! The typed message catalog. Message id namespaces are scoped per
//! direction: the same byte means different things under different
//! packet ids, so every decode carries the direction.

pub mod backend2master;
pub mod master2backend;
pub mod master2slave;
pub mod slave2backend;
pub mod slave2master;

use std::io::{self, Cursor};

use wirestruct::{ReadFrom, Size, WriteTo};
use wirestruct_derive::{Size, WireStruct};

use crate::{DecodeError, DeviceStatus, Frame, PacketId};

/// Per-slave configuration as exchanged between backend and master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct SlaveConfigEntry {
	pub id: u32,
	pub conduction_num: u8,
	pub resistance_num: u8,
	pub clip_mode: u8,
	pub clip_status: u16,
}

/// Per-slave reset instruction as exchanged between backend and master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct SlaveResetEntry {
	pub id: u32,
	pub lock: u8,
	pub clip_status: u16,
}

/// One device registry row in a device list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct DeviceInfo {
	pub device_id: u32,
	pub short_id: u8,
	pub online: u8,
	pub version_major: u8,
	pub version_minor: u8,
	pub version_patch: u16,
}

/// Decodes a fixed-layout message body, tolerating trailing bytes.
pub(crate) fn decode_fixed<T: ReadFrom + Size + Default>(body: &[u8]) -> Result<T, DecodeError> {
	let expected = T::default().size();
	if body.len() < expected {
		return Err(DecodeError::InsufficientBytes {
			expected,
			actual: body.len(),
		});
	}

	T::read_from(&mut Cursor::new(body)).map_err(|_| DecodeError::InsufficientBytes {
		expected,
		actual: body.len(),
	})
}

/// Decodes `count` fixed-size records from `body`, validating the
/// declared count against the bytes actually present.
pub(crate) fn decode_counted<T: ReadFrom + Size + Default>(
	count: usize,
	body: &[u8],
) -> Result<Vec<T>, DecodeError> {
	let needed = count * T::default().size();
	if body.len() < needed {
		return Err(DecodeError::DeclaredLengthExceedsBuffer {
			declared: needed,
			available: body.len(),
		});
	}

	let mut cursor = Cursor::new(body);
	let mut items = Vec::with_capacity(count);
	for _ in 0..count {
		items.push(T::read_from(&mut cursor).map_err(|_| DecodeError::DeclaredLengthExceedsBuffer {
			declared: needed,
			available: body.len(),
		})?);
	}

	Ok(items)
}

/// A decoded frame payload: the direction, its routing identifiers, and
/// the typed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
	MasterToSlave {
		destination_id: u32,
		message: master2slave::Message,
	},
	SlaveToMaster {
		slave_id: u32,
		message: slave2master::Message,
	},
	SlaveToBackend {
		slave_id: u32,
		device_status: DeviceStatus,
		message: slave2backend::Message,
	},
	BackendToMaster { message: backend2master::Message },
	MasterToBackend { message: master2backend::Message },
}

impl Packet {
	pub fn packet_id(&self) -> PacketId {
		match self {
			Packet::MasterToSlave { .. } => PacketId::MasterToSlave,
			Packet::SlaveToMaster { .. } => PacketId::SlaveToMaster,
			Packet::SlaveToBackend { .. } => PacketId::SlaveToBackend,
			Packet::BackendToMaster { .. } => PacketId::BackendToMaster,
			Packet::MasterToBackend { .. } => PacketId::MasterToBackend,
		}
	}

	/// Decodes a complete frame's payload into a typed packet.
	pub fn decode(frame: &Frame) -> Result<Packet, DecodeError> {
		let packet_id = PacketId::try_from(frame.packet_id).map_err(DecodeError::UnknownPacketId)?;
		let payload = &frame.payload;

		match packet_id {
			PacketId::MasterToSlave => {
				let (message_id, destination_id, body) = split_routed(payload)?;
				Ok(Packet::MasterToSlave {
					destination_id,
					message: master2slave::Message::decode(message_id, body)?,
				})
			}
			PacketId::SlaveToMaster => {
				let (message_id, slave_id, body) = split_routed(payload)?;
				Ok(Packet::SlaveToMaster {
					slave_id,
					message: slave2master::Message::decode(message_id, body)?,
				})
			}
			PacketId::SlaveToBackend => {
				if payload.len() < 7 {
					return Err(DecodeError::InsufficientBytes {
						expected: 7,
						actual: payload.len(),
					});
				}
				let message_id = payload[0];
				let slave_id = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
				let status_bits = u16::from_le_bytes([payload[5], payload[6]]);
				Ok(Packet::SlaveToBackend {
					slave_id,
					device_status: DeviceStatus::from_bits_truncate(status_bits),
					message: slave2backend::Message::decode(message_id, &payload[7..])?,
				})
			}
			PacketId::BackendToMaster => {
				let (message_id, body) = split_unrouted(payload)?;
				Ok(Packet::BackendToMaster {
					message: backend2master::Message::decode(message_id, body)?,
				})
			}
			PacketId::MasterToBackend => {
				let (message_id, body) = split_unrouted(payload)?;
				Ok(Packet::MasterToBackend {
					message: master2backend::Message::decode(message_id, body)?,
				})
			}
		}
	}

	/// Serializes the packet into frame payload bytes: message id,
	/// routing identifiers, then the message body.
	pub fn encode_payload(&self) -> io::Result<Vec<u8>> {
		let mut out = Vec::new();

		match self {
			Packet::MasterToSlave { destination_id, message } => {
				u8::from(&message.id()).write_to(&mut out)?;
				destination_id.write_to(&mut out)?;
				message.write_to(&mut out)?;
			}
			Packet::SlaveToMaster { slave_id, message } => {
				u8::from(&message.id()).write_to(&mut out)?;
				slave_id.write_to(&mut out)?;
				message.write_to(&mut out)?;
			}
			Packet::SlaveToBackend { slave_id, device_status, message } => {
				u8::from(&message.id()).write_to(&mut out)?;
				slave_id.write_to(&mut out)?;
				device_status.write_to(&mut out)?;
				message.write_to(&mut out)?;
			}
			Packet::BackendToMaster { message } => {
				u8::from(&message.id()).write_to(&mut out)?;
				message.write_to(&mut out)?;
			}
			Packet::MasterToBackend { message } => {
				u8::from(&message.id()).write_to(&mut out)?;
				message.write_to(&mut out)?;
			}
		}

		Ok(out)
	}

	/// Wraps the encoded payload in a complete (unfragmented) frame.
	pub fn to_frame(&self) -> io::Result<Frame> {
		Ok(Frame::complete(self.packet_id(), self.encode_payload()?))
	}
}

fn split_routed(payload: &[u8]) -> Result<(u8, u32, &[u8]), DecodeError> {
	if payload.len() < 5 {
		return Err(DecodeError::InsufficientBytes {
			expected: 5,
			actual: payload.len(),
		});
	}

	let id = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
	Ok((payload[0], id, &payload[5..]))
}

fn split_unrouted(payload: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
	if payload.is_empty() {
		return Err(DecodeError::InsufficientBytes { expected: 1, actual: 0 });
	}

	Ok((payload[0], &payload[1..]))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::BROADCAST_ID;

	#[test]
	fn test_sync_frame_exact_bytes() {
		let packet = Packet::MasterToSlave {
			destination_id: 0x12345678,
			message: master2slave::Message::Sync(master2slave::Sync {
				mode: 1,
				timestamp: 0x075BCD15,
			}),
		};
		let bytes = packet.to_frame().unwrap().serialize().unwrap();
		assert_eq!(
			bytes,
			vec![
				0xAB, 0xCD, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12, 0x01,
				0x15, 0xCD, 0x5B, 0x07,
			]
		);
	}

	#[test]
	fn test_packet_round_trip_all_directions() {
		let packets = vec![
			Packet::MasterToSlave {
				destination_id: BROADCAST_ID,
				message: master2slave::Message::Rst(master2slave::Rst {
					lock_status: 1,
					clip_led: 0x00F0,
				}),
			},
			Packet::SlaveToMaster {
				slave_id: 0x1001,
				message: slave2master::Message::Announce(slave2master::Announce {
					device_id: 0x1001,
					version_major: 1,
					version_minor: 2,
					version_patch: 3,
				}),
			},
			Packet::SlaveToBackend {
				slave_id: 0x55667788,
				device_status: DeviceStatus::BATTERY_LOW_ALARM,
				message: slave2backend::Message::ConductionData(slave2backend::ConductionData {
					data: vec![0x99; 16],
				}),
			},
			Packet::BackendToMaster {
				message: backend2master::Message::PingControl(backend2master::PingControl {
					ping_mode: 0,
					ping_count: 4,
					interval: 1000,
					destination_id: 0x1001,
				}),
			},
			Packet::MasterToBackend {
				message: master2backend::Message::DeviceListResponse(
					master2backend::DeviceListResponse {
						devices: vec![DeviceInfo {
							device_id: 0x1001,
							short_id: 1,
							online: 1,
							version_major: 1,
							version_minor: 2,
							version_patch: 3,
						}],
					},
				),
			},
		];

		for packet in packets {
			let frame = packet.to_frame().unwrap();
			let decoded = Packet::decode(&frame).unwrap();
			assert_eq!(decoded, packet);
		}
	}

	#[test]
	fn test_reserialize_is_identical() {
		let packet = Packet::MasterToSlave {
			destination_id: 0x1001,
			message: master2slave::Message::ConductionConfig(master2slave::ConductionConfig {
				time_slot: 1,
				interval: 100,
				total_conduction_num: 8,
				start_conduction_num: 0,
				conduction_num: 8,
			}),
		};
		let first = packet.to_frame().unwrap().serialize().unwrap();
		let reparsed = Packet::decode(&Frame::parse(&first).unwrap()).unwrap();
		let second = reparsed.to_frame().unwrap().serialize().unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn test_unknown_packet_id() {
		let frame = Frame {
			packet_id: 0x09,
			fragment_sequence: 0,
			more_fragments: 0,
			payload: vec![0x00],
		};
		assert_eq!(Packet::decode(&frame), Err(DecodeError::UnknownPacketId(0x09)));
	}

	#[test]
	fn test_short_routed_header() {
		let frame = Frame::complete(PacketId::MasterToSlave, vec![0x00, 0x01]);
		assert_eq!(
			Packet::decode(&frame),
			Err(DecodeError::InsufficientBytes { expected: 5, actual: 2 })
		);
	}
}
