mod codec;
mod error;
mod frame;
pub mod messages;
mod status;

pub use codec::{CodecConfig, ProtocolCodec};
pub use error::{DecodeError, FramingError};
pub use frame::{Frame, FRAME_HEADER_SIZE};
pub use messages::Packet;
pub use status::DeviceStatus;

use wirestruct::int_enum;

/// First byte of the frame delimiter pair.
pub const FRAME_DELIMITER_1: u8 = 0xAB;

/// Second byte of the frame delimiter pair.
pub const FRAME_DELIMITER_2: u8 = 0xCD;

/// Destination id addressing every slave on the broadcast channel.
pub const BROADCAST_ID: u32 = 0xFFFF_FFFF;

int_enum! {
	/// The direction a frame travels in. Message id namespaces are scoped
	/// to the packet id, so nothing decodes a message without one.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
	pub enum PacketId: u8 {
		MasterToSlave = 0x00,
		SlaveToMaster = 0x01,
		BackendToMaster = 0x02,
		MasterToBackend = 0x03,
		SlaveToBackend = 0x04,
	}
}
