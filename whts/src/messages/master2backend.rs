//! Responses from the master to the backend, mirroring the control
//! requests with a leading status byte.

use std::io::{self, Write};

use wirestruct::{int_enum, WriteTo};
use wirestruct_derive::{Size, WireStruct};

use super::{decode_counted, decode_fixed, DeviceInfo, SlaveConfigEntry, SlaveResetEntry};
use crate::{DecodeError, PacketId};

int_enum! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum MessageId: u8 {
		SlaveConfigResponse = 0x00,
		ModeConfigResponse = 0x01,
		RstResponse = 0x02,
		CtrlResponse = 0x03,
		PingResponse = 0x04,
		DeviceListResponse = 0x05,
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlaveConfigResponse {
	pub status: u8,
	pub slaves: Vec<SlaveConfigEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ModeConfigResponse {
	pub status: u8,
	pub mode: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RstResponse {
	pub status: u8,
	pub slaves: Vec<SlaveResetEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct CtrlResponse {
	pub status: u8,
	pub running_status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct PingResponse {
	pub ping_mode: u8,
	pub total_count: u16,
	pub success_count: u16,
	pub destination_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceListResponse {
	pub devices: Vec<DeviceInfo>,
}

impl WriteTo for SlaveConfigResponse {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		self.status.write_to(writer)?;
		(self.slaves.len() as u8).write_to(writer)?;
		for slave in &self.slaves {
			slave.write_to(writer)?;
		}
		Ok(())
	}
}

impl WriteTo for RstResponse {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		self.status.write_to(writer)?;
		(self.slaves.len() as u8).write_to(writer)?;
		for slave in &self.slaves {
			slave.write_to(writer)?;
		}
		Ok(())
	}
}

impl WriteTo for DeviceListResponse {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		(self.devices.len() as u8).write_to(writer)?;
		for device in &self.devices {
			device.write_to(writer)?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	SlaveConfigResponse(SlaveConfigResponse),
	ModeConfigResponse(ModeConfigResponse),
	RstResponse(RstResponse),
	CtrlResponse(CtrlResponse),
	PingResponse(PingResponse),
	DeviceListResponse(DeviceListResponse),
}

impl Message {
	pub fn id(&self) -> MessageId {
		match self {
			Message::SlaveConfigResponse(_) => MessageId::SlaveConfigResponse,
			Message::ModeConfigResponse(_) => MessageId::ModeConfigResponse,
			Message::RstResponse(_) => MessageId::RstResponse,
			Message::CtrlResponse(_) => MessageId::CtrlResponse,
			Message::PingResponse(_) => MessageId::PingResponse,
			Message::DeviceListResponse(_) => MessageId::DeviceListResponse,
		}
	}

	pub fn decode(message_id: u8, body: &[u8]) -> Result<Message, DecodeError> {
		let id = MessageId::try_from(message_id).map_err(|raw| DecodeError::UnknownMessageId {
			packet_id: PacketId::MasterToBackend,
			message_id: raw,
		})?;

		Ok(match id {
			MessageId::SlaveConfigResponse => {
				let (status, count) = status_counted_header(body)?;
				Message::SlaveConfigResponse(SlaveConfigResponse {
					status,
					slaves: decode_counted(count, &body[2..])?,
				})
			}
			MessageId::ModeConfigResponse => Message::ModeConfigResponse(decode_fixed(body)?),
			MessageId::RstResponse => {
				let (status, count) = status_counted_header(body)?;
				Message::RstResponse(RstResponse {
					status,
					slaves: decode_counted(count, &body[2..])?,
				})
			}
			MessageId::CtrlResponse => Message::CtrlResponse(decode_fixed(body)?),
			MessageId::PingResponse => Message::PingResponse(decode_fixed(body)?),
			MessageId::DeviceListResponse => {
				if body.is_empty() {
					return Err(DecodeError::InsufficientBytes { expected: 1, actual: 0 });
				}
				Message::DeviceListResponse(DeviceListResponse {
					devices: decode_counted(body[0] as usize, &body[1..])?,
				})
			}
		})
	}
}

fn status_counted_header(body: &[u8]) -> Result<(u8, usize), DecodeError> {
	if body.len() < 2 {
		return Err(DecodeError::InsufficientBytes {
			expected: 2,
			actual: body.len(),
		});
	}

	Ok((body[0], body[1] as usize))
}

impl WriteTo for Message {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		match self {
			Message::SlaveConfigResponse(m) => m.write_to(writer),
			Message::ModeConfigResponse(m) => m.write_to(writer),
			Message::RstResponse(m) => m.write_to(writer),
			Message::CtrlResponse(m) => m.write_to(writer),
			Message::PingResponse(m) => m.write_to(writer),
			Message::DeviceListResponse(m) => m.write_to(writer),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_slave_config_response_round_trip() {
		let message = Message::SlaveConfigResponse(SlaveConfigResponse {
			status: 0,
			slaves: vec![SlaveConfigEntry {
				id: 0x1001,
				conduction_num: 4,
				resistance_num: 0,
				clip_mode: 0,
				clip_status: 0,
			}],
		});
		let mut buf = Vec::new();
		message.write_to(&mut buf).unwrap();
		assert_eq!(buf.len(), 11);
		assert_eq!(Message::decode(0x00, &buf).unwrap(), message);
	}

	#[test]
	fn test_device_list_response_round_trip() {
		let message = Message::DeviceListResponse(DeviceListResponse {
			devices: vec![
				DeviceInfo {
					device_id: 0x1001,
					short_id: 1,
					online: 1,
					version_major: 1,
					version_minor: 0,
					version_patch: 7,
				},
				DeviceInfo {
					device_id: 0x1002,
					short_id: 2,
					online: 0,
					version_major: 0,
					version_minor: 0,
					version_patch: 0,
				},
			],
		});
		let mut buf = Vec::new();
		message.write_to(&mut buf).unwrap();
		assert_eq!(buf[0], 2);
		assert_eq!(Message::decode(0x05, &buf).unwrap(), message);
	}

	#[test]
	fn test_ping_response_layout() {
		let message = Message::PingResponse(PingResponse {
			ping_mode: 0,
			total_count: 4,
			success_count: 3,
			destination_id: 0x1001,
		});
		let mut buf = Vec::new();
		message.write_to(&mut buf).unwrap();
		assert_eq!(buf, vec![0x00, 0x04, 0x00, 0x03, 0x00, 0x01, 0x10, 0x00, 0x00]);
	}
}
