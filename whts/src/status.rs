use std::io::{Read, Write};

use bitflags::bitflags;
use wirestruct::{ReadFrom, Size, WriteTo};

bitflags! {
	/// Per-slave sensor and actuator flags carried in every
	/// slave-to-backend payload. Bits 9..15 are reserved and always
	/// transmitted as zero.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct DeviceStatus: u16 {
		const COLOR_SENSOR = 1 << 0;
		const SLEEVE_LIMIT = 1 << 1;
		const ELECTROMAGNET_UNLOCK_BUTTON = 1 << 2;
		const BATTERY_LOW_ALARM = 1 << 3;
		const PRESSURE_SENSOR = 1 << 4;
		const ELECTROMAGNETIC_LOCK_1 = 1 << 5;
		const ELECTROMAGNETIC_LOCK_2 = 1 << 6;
		const ACCESSORY_1 = 1 << 7;
		const ACCESSORY_2 = 1 << 8;
	}
}

impl ReadFrom for DeviceStatus {
	fn read_from<T: Read>(source: &mut T) -> std::io::Result<Self> {
		let bits = u16::read_from(source)?;
		// Reserved bits are dropped rather than rejected.
		Ok(DeviceStatus::from_bits_truncate(bits))
	}
}

impl WriteTo for DeviceStatus {
	fn write_to<T: Write>(&self, target: &mut T) -> std::io::Result<()> {
		self.bits().write_to(target)
	}
}

impl Size for DeviceStatus {
	fn size(&self) -> usize {
		2
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn test_known_bit_pattern() {
		let status = DeviceStatus::COLOR_SENSOR
			| DeviceStatus::BATTERY_LOW_ALARM
			| DeviceStatus::ELECTROMAGNETIC_LOCK_1;
		assert_eq!(status.bits(), 0x002B);
		assert_eq!(DeviceStatus::from_bits_truncate(0x002B), status);
	}

	#[test]
	fn test_reserved_bits_ignored() {
		let mut cursor = Cursor::new([0x2Bu8, 0xFE]);
		let status = DeviceStatus::read_from(&mut cursor).unwrap();
		assert_eq!(status.bits() & 0xFE00, 0);
		assert!(status.contains(DeviceStatus::COLOR_SENSOR));
	}

	#[test]
	fn test_wire_round_trip() {
		let status = DeviceStatus::PRESSURE_SENSOR | DeviceStatus::ACCESSORY_2;
		let mut buf = Vec::new();
		status.write_to(&mut buf).unwrap();
		assert_eq!(buf.len(), status.size());
		let decoded = DeviceStatus::read_from(&mut Cursor::new(&buf)).unwrap();
		assert_eq!(decoded, status);
	}
}
