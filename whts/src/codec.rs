//! The transport-facing codec: MTU-aware fragmentation on the way out,
//! and a stream reassembler on the way in. Inbound bytes arrive as
//! arbitrary chunks (frames may be concatenated, split across chunks,
//! or interleaved as fragments) and come back out as complete frames
//! in completion order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;

use crate::{Frame, Packet, PacketId, FRAME_DELIMITER_1, FRAME_DELIMITER_2, FRAME_HEADER_SIZE};

/// Tunables for the codec. The MTU caps emitted frame sizes (fragmenting
/// anything larger), the receive buffer bound is the only backpressure
/// primitive, and the fragment timeout evicts groups that never finish.
#[derive(Debug, Clone)]
pub struct CodecConfig {
	pub mtu: usize,
	pub max_receive_buffer: usize,
	pub fragment_timeout_ms: u32,
}

impl Default for CodecConfig {
	fn default() -> Self {
		CodecConfig {
			mtu: 100,
			max_receive_buffer: 4096,
			fragment_timeout_ms: 5000,
		}
	}
}

#[derive(Debug)]
struct FragmentGroup {
	/// (device id, message id) taken from the first fragment's payload
	/// header. Continuation fragments carry no identity of their own.
	identity: Option<(u32, u8)>,

	/// Total fragment count, 0 until the final fragment has been seen.
	total: u8,

	fragments: BTreeMap<u8, Vec<u8>>,
	updated_ms: u32,
}

impl FragmentGroup {
	fn new(now_ms: u32) -> Self {
		FragmentGroup {
			identity: None,
			total: 0,
			fragments: BTreeMap::new(),
			updated_ms: now_ms,
		}
	}

	fn is_complete(&self) -> bool {
		self.total > 0 && (0..self.total).all(|i| self.fragments.contains_key(&i))
	}
}

pub struct ProtocolCodec {
	config: CodecConfig,
	receive_buffer: Vec<u8>,
	complete_frames: VecDeque<Frame>,
	fragments: HashMap<u8, FragmentGroup>,
}

impl ProtocolCodec {
	pub fn new() -> Self {
		Self::with_config(CodecConfig::default())
	}

	pub fn with_config(config: CodecConfig) -> Self {
		assert!(config.mtu > FRAME_HEADER_SIZE, "mtu must exceed the frame header");
		ProtocolCodec {
			config,
			receive_buffer: Vec::new(),
			complete_frames: VecDeque::new(),
			fragments: HashMap::new(),
		}
	}

	pub fn mtu(&self) -> usize {
		self.config.mtu
	}

	/// Serializes a packet into one or more wire frames, fragmenting when
	/// the single-frame encoding exceeds the MTU.
	pub fn encode_packet(&self, packet: &Packet) -> io::Result<Vec<Vec<u8>>> {
		let frame = packet.to_frame()?;
		let bytes = frame
			.serialize()
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

		if bytes.len() <= self.config.mtu {
			return Ok(vec![bytes]);
		}

		self.fragment_frame(&bytes)
	}

	/// Splits a serialized single frame into MTU-sized fragment frames.
	/// Every fragment repeats the packet id; the first fragment's payload
	/// begins with the original payload (and so carries the message
	/// header), later fragments carry raw continuation bytes.
	fn fragment_frame(&self, frame_data: &[u8]) -> io::Result<Vec<Vec<u8>>> {
		let packet_id = frame_data[2];
		let payload = &frame_data[FRAME_HEADER_SIZE..];
		let chunk_size = self.config.mtu - FRAME_HEADER_SIZE;
		let total = payload.len().div_ceil(chunk_size);

		let mut fragments = Vec::with_capacity(total);
		for (i, slice) in payload.chunks(chunk_size).enumerate() {
			let fragment = Frame {
				packet_id,
				fragment_sequence: i as u8,
				more_fragments: if i + 1 == total { 0 } else { 1 },
				payload: slice.to_vec(),
			};
			fragments.push(
				fragment
					.serialize()
					.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
			);
		}

		Ok(fragments)
	}

	/// Feeds a chunk of received bytes into the reassembler. Complete
	/// frames become available through [`next_frame`](Self::next_frame).
	pub fn push_bytes(&mut self, data: &[u8], now_ms: u32) {
		// On overflow the buffer is dropped wholesale; the stream
		// resynchronizes on the next delimiter pair.
		if self.receive_buffer.len() + data.len() > self.config.max_receive_buffer {
			self.receive_buffer.clear();
		}

		self.receive_buffer.extend_from_slice(data);
		self.extract_frames(now_ms);
		self.evict_expired(now_ms);
	}

	/// Takes the next complete frame, in completion order.
	pub fn next_frame(&mut self) -> Option<Frame> {
		self.complete_frames.pop_front()
	}

	/// Drops all buffered bytes, queued frames, and partial fragments.
	pub fn clear(&mut self) {
		self.receive_buffer.clear();
		self.complete_frames.clear();
		self.fragments.clear();
	}

	fn extract_frames(&mut self, now_ms: u32) {
		let mut pos = 0;

		loop {
			let Some(start) = find_frame_header(&self.receive_buffer, pos) else {
				// No header anywhere ahead. Drop the scanned garbage but
				// keep a trailing 0xAB in case its partner is in flight.
				let keep_from = if self.receive_buffer.last() == Some(&FRAME_DELIMITER_1) {
					self.receive_buffer.len() - 1
				} else {
					self.receive_buffer.len()
				};
				self.receive_buffer.drain(..keep_from);
				return;
			};

			if start + FRAME_HEADER_SIZE > self.receive_buffer.len() {
				// Header split across chunks; wait for more bytes.
				self.receive_buffer.drain(..start);
				return;
			}

			let packet_length =
				u16::from_le_bytes([self.receive_buffer[start + 5], self.receive_buffer[start + 6]]) as usize;
			let frame_end = start + FRAME_HEADER_SIZE + packet_length;
			if frame_end > self.receive_buffer.len() {
				self.receive_buffer.drain(..start);
				return;
			}

			if let Ok(frame) = Frame::parse(&self.receive_buffer[start..frame_end]) {
				if frame.is_fragment() {
					self.accept_fragment(frame, now_ms);
				} else {
					self.complete_frames.push_back(frame);
				}
			}

			pos = frame_end;
			if pos >= self.receive_buffer.len() {
				self.receive_buffer.clear();
				return;
			}
		}
	}

	fn accept_fragment(&mut self, frame: Frame, now_ms: u32) {
		let identity = if frame.fragment_sequence == 0 {
			match fragment_identity(frame.packet_id, &frame.payload) {
				Some(identity) => Some(identity),
				// A first fragment too short to carry its own message
				// header is unrecoverable garbage.
				None => return,
			}
		} else {
			None
		};

		let group = self
			.fragments
			.entry(frame.packet_id)
			.or_insert_with(|| FragmentGroup::new(now_ms));

		// A first fragment for a different message while this group is
		// still open means the old message can never complete; the new
		// one takes the slot.
		if let Some(identity) = identity {
			if group.identity.is_some() && group.identity != Some(identity) {
				*group = FragmentGroup::new(now_ms);
			}
			group.identity = Some(identity);
		}

		group.updated_ms = now_ms;
		group.fragments.insert(frame.fragment_sequence, frame.payload);
		if frame.more_fragments == 0 {
			group.total = frame.fragment_sequence + 1;
		}

		if group.is_complete() {
			let mut payload = Vec::new();
			for i in 0..group.total {
				payload.extend_from_slice(&group.fragments[&i]);
			}

			self.complete_frames.push_back(Frame {
				packet_id: frame.packet_id,
				fragment_sequence: 0,
				more_fragments: 0,
				payload,
			});
			self.fragments.remove(&frame.packet_id);
		}
	}

	fn evict_expired(&mut self, now_ms: u32) {
		let timeout = self.config.fragment_timeout_ms;
		self.fragments
			.retain(|_, group| now_ms.wrapping_sub(group.updated_ms) < timeout);
	}
}

impl Default for ProtocolCodec {
	fn default() -> Self {
		Self::new()
	}
}

fn find_frame_header(buffer: &[u8], start: usize) -> Option<usize> {
	if buffer.len() < 2 {
		return None;
	}

	(start..buffer.len() - 1)
		.find(|&i| buffer[i] == FRAME_DELIMITER_1 && buffer[i + 1] == FRAME_DELIMITER_2)
}

/// Extracts the (device id, message id) identity from a first fragment's
/// payload. Backend and master directions carry no device id; theirs is
/// recorded as zero.
fn fragment_identity(packet_id: u8, payload: &[u8]) -> Option<(u32, u8)> {
	match PacketId::try_from(packet_id).ok()? {
		PacketId::MasterToSlave | PacketId::SlaveToMaster | PacketId::SlaveToBackend => {
			if payload.len() < 5 {
				return None;
			}
			let id = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
			Some((id, payload[0]))
		}
		PacketId::BackendToMaster | PacketId::MasterToBackend => {
			payload.first().map(|message_id| (0, *message_id))
		}
	}
}
