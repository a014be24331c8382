use crate::{FramingError, PacketId, FRAME_DELIMITER_1, FRAME_DELIMITER_2};

/// Size of the frame header: two delimiters, packet id, fragment
/// sequence, more-fragments flag, and the u16 payload length.
pub const FRAME_HEADER_SIZE: usize = 7;

/// The wire-level envelope. A frame with `fragment_sequence == 0` and
/// `more_fragments == 0` carries a complete packet payload; anything
/// else is one slice of a fragmented payload.
///
/// The packet id is kept as the raw wire byte here; it is interpreted
/// when the payload is decoded into a typed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	pub packet_id: u8,
	pub fragment_sequence: u8,
	pub more_fragments: u8,
	pub payload: Vec<u8>,
}

impl Frame {
	/// Builds a complete (unfragmented) frame around a payload.
	pub fn complete(packet_id: PacketId, payload: Vec<u8>) -> Self {
		Frame {
			packet_id: (&packet_id).into(),
			fragment_sequence: 0,
			more_fragments: 0,
			payload,
		}
	}

	pub fn is_fragment(&self) -> bool {
		self.more_fragments != 0 || self.fragment_sequence != 0
	}

	pub fn serialize(&self) -> Result<Vec<u8>, FramingError> {
		if self.payload.len() > u16::MAX as usize {
			return Err(FramingError::OversizePayload(self.payload.len()));
		}

		let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
		out.push(FRAME_DELIMITER_1);
		out.push(FRAME_DELIMITER_2);
		out.push(self.packet_id);
		out.push(self.fragment_sequence);
		out.push(self.more_fragments);
		out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
		out.extend_from_slice(&self.payload);
		Ok(out)
	}

	/// Parses one frame from the start of `data`. `data` may extend past
	/// the frame; the frame length is taken from the header.
	pub fn parse(data: &[u8]) -> Result<Frame, FramingError> {
		if data.len() < FRAME_HEADER_SIZE {
			return Err(FramingError::Truncated {
				expected: FRAME_HEADER_SIZE,
				actual: data.len(),
			});
		}

		if data[0] != FRAME_DELIMITER_1 || data[1] != FRAME_DELIMITER_2 {
			return Err(FramingError::InvalidDelimiter(data[0], data[1]));
		}

		let packet_length = u16::from_le_bytes([data[5], data[6]]) as usize;
		if data.len() < FRAME_HEADER_SIZE + packet_length {
			return Err(FramingError::Truncated {
				expected: FRAME_HEADER_SIZE + packet_length,
				actual: data.len(),
			});
		}

		Ok(Frame {
			packet_id: data[2],
			fragment_sequence: data[3],
			more_fragments: data[4],
			payload: data[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + packet_length].to_vec(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_serialize_layout() {
		let frame = Frame::complete(PacketId::MasterToSlave, vec![0x01, 0x02, 0x03]);
		let bytes = frame.serialize().unwrap();
		assert_eq!(bytes, vec![0xAB, 0xCD, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0x02, 0x03]);
	}

	#[test]
	fn test_round_trip() {
		let frame = Frame {
			packet_id: 0x04,
			fragment_sequence: 2,
			more_fragments: 1,
			payload: vec![0xDE, 0xAD],
		};
		let parsed = Frame::parse(&frame.serialize().unwrap()).unwrap();
		assert_eq!(parsed, frame);
	}

	#[test]
	fn test_empty_payload() {
		let frame = Frame::complete(PacketId::BackendToMaster, Vec::new());
		let bytes = frame.serialize().unwrap();
		assert_eq!(bytes.len(), FRAME_HEADER_SIZE);
		let parsed = Frame::parse(&bytes).unwrap();
		assert!(parsed.payload.is_empty());
	}

	#[test]
	fn test_bad_delimiter() {
		let err = Frame::parse(&[0xAB, 0xCE, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap_err();
		assert_eq!(err, FramingError::InvalidDelimiter(0xAB, 0xCE));
	}

	#[test]
	fn test_truncated() {
		// Header declares 5 payload bytes but only 2 follow.
		let err = Frame::parse(&[0xAB, 0xCD, 0x00, 0x00, 0x00, 0x05, 0x00, 0x01, 0x02]).unwrap_err();
		assert_eq!(err, FramingError::Truncated { expected: 12, actual: 9 });
	}

	#[test]
	fn test_parse_ignores_trailing_bytes() {
		let mut bytes = Frame::complete(PacketId::MasterToSlave, vec![0x11]).serialize().unwrap();
		bytes.extend_from_slice(&[0xAB, 0xCD, 0xFF]);
		let parsed = Frame::parse(&bytes).unwrap();
		assert_eq!(parsed.payload, vec![0x11]);
	}
}
