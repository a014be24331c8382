//! Unicast command retries and ping sessions. Commands sent through the
//! retry path live in the pending table until a matching reply arrives
//! or the retry budget runs out.

use whts::messages::{master2slave, slave2master};

/// How long an unanswered command waits before being re-sent.
pub const PENDING_COMMAND_TIMEOUT_MS: u32 = 5000;

/// Default retry budget for important commands.
pub const MAX_RETRIES: u8 = 3;

#[derive(Debug, Clone)]
pub struct PendingCommand {
	pub target_id: u32,
	pub message: master2slave::Message,
	pub sent_at_ms: u32,
	pub retry_count: u8,
	pub max_retries: u8,
}

#[derive(Debug, Default)]
pub struct PendingCommands {
	entries: Vec<PendingCommand>,
}

impl PendingCommands {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn push(&mut self, target_id: u32, message: master2slave::Message, max_retries: u8, now_ms: u32) {
		self.entries.push(PendingCommand {
			target_id,
			message,
			sent_at_ms: now_ms,
			retry_count: 0,
			max_retries,
		});
	}

	/// Re-sends every expired entry and drops the ones that have used up
	/// their retries. Returns `(resends, dropped)`.
	pub fn tick(&mut self, now_ms: u32) -> (Vec<(u32, master2slave::Message)>, Vec<PendingCommand>) {
		let mut resends = Vec::new();
		let mut dropped = Vec::new();

		self.entries.retain_mut(|entry| {
			if now_ms.wrapping_sub(entry.sent_at_ms) <= PENDING_COMMAND_TIMEOUT_MS {
				return true;
			}

			if entry.retry_count < entry.max_retries {
				entry.retry_count += 1;
				entry.sent_at_ms = now_ms;
				resends.push((entry.target_id, entry.message.clone()));
				true
			} else {
				dropped.push(entry.clone());
				false
			}
		});

		(resends, dropped)
	}

	/// Removes pending commands answered by this reply, so an acked
	/// command is never re-sent.
	pub fn acknowledge(&mut self, target_id: u32, reply: &slave2master::Message) {
		let acked: fn(&master2slave::Message) -> bool = match reply {
			slave2master::Message::ConductionConfigResponse(_) => {
				|m| matches!(m, master2slave::Message::ConductionConfig(_))
			}
			slave2master::Message::ResistanceConfigResponse(_) => {
				|m| matches!(m, master2slave::Message::ResistanceConfig(_))
			}
			slave2master::Message::ClipConfigResponse(_) => {
				|m| matches!(m, master2slave::Message::ClipConfig(_))
			}
			slave2master::Message::RstResponse(_) => |m| matches!(m, master2slave::Message::Rst(_)),
			slave2master::Message::PingResponse(_) => {
				|m| matches!(m, master2slave::Message::PingRequest(_))
			}
			slave2master::Message::ShortIdConfirm(_) => {
				|m| matches!(m, master2slave::Message::ShortIdAssign(_))
			}
			slave2master::Message::Announce(_) => return,
		};

		self.entries
			.retain(|entry| entry.target_id != target_id || !acked(&entry.message));
	}

	/// A data message answers whichever read command was outstanding for
	/// that slave.
	pub fn acknowledge_data(&mut self, target_id: u32) {
		self.entries.retain(|entry| {
			entry.target_id != target_id
				|| !matches!(
					entry.message,
					master2slave::Message::ReadConductionData(_)
						| master2slave::Message::ReadResistanceData(_)
						| master2slave::Message::ReadClipData(_)
				)
		});
	}
}

/// One backend-requested ping exchange with a single slave.
#[derive(Debug, Clone)]
pub struct PingSession {
	pub target_id: u32,
	pub mode: u8,
	pub total: u16,
	pub current: u16,
	pub success: u16,
	pub interval_ms: u32,
	pub last_send_ms: u32,
}

#[derive(Debug, Default)]
pub struct PingSessions {
	sessions: Vec<PingSession>,
}

impl PingSessions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn start(&mut self, target_id: u32, mode: u8, total: u16, interval_ms: u32, now_ms: u32) {
		self.sessions.push(PingSession {
			target_id,
			mode,
			total,
			current: 0,
			success: 0,
			interval_ms,
			last_send_ms: now_ms,
		});
	}

	/// Emits the pings that are due and retires finished sessions.
	/// Returns `(requests, completed)`.
	pub fn tick(&mut self, now_ms: u32) -> (Vec<(u32, master2slave::PingRequest)>, Vec<PingSession>) {
		let mut requests = Vec::new();
		let mut completed = Vec::new();

		self.sessions.retain_mut(|session| {
			if now_ms.wrapping_sub(session.last_send_ms) < session.interval_ms {
				return true;
			}

			if session.current < session.total {
				session.current += 1;
				session.last_send_ms = now_ms;
				requests.push((
					session.target_id,
					master2slave::PingRequest {
						sequence_number: session.current,
						timestamp: now_ms,
					},
				));
				true
			} else {
				completed.push(session.clone());
				false
			}
		});

		(requests, completed)
	}

	pub fn record_success(&mut self, target_id: u32) {
		if let Some(session) = self.sessions.iter_mut().find(|s| s.target_id == target_id) {
			session.success += 1;
		}
	}
}
