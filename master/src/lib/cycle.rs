//! The measurement cycle scheduler. A cycle walks
//! Idle -> Collecting (sync) -> ReadingData -> Complete, and a new one
//! begins once the configured interval has passed since the last
//! completion.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
	Idle,
	Collecting,
	ReadingData,
	Complete,
}

/// Per-slave bookkeeping for the cycle in progress.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
	pub slave_id: u32,
	pub estimated_duration_ms: u32,
	pub start_ms: u32,
	pub data_requested: bool,
	pub data_received: bool,
}

#[derive(Debug)]
pub struct CycleScheduler {
	state: CycleState,
	active: Vec<CollectionInfo>,
	collection_active: bool,
	sync_sent: bool,
	cycle_start_ms: u32,
	last_cycle_ms: u32,
	cycle_interval_ms: u32,
}

impl CycleScheduler {
	pub fn new(cycle_interval_ms: u32) -> Self {
		CycleScheduler {
			state: CycleState::Idle,
			active: Vec::new(),
			collection_active: false,
			sync_sent: false,
			cycle_start_ms: 0,
			last_cycle_ms: 0,
			cycle_interval_ms,
		}
	}

	pub fn state(&self) -> CycleState {
		self.state
	}

	pub fn is_active(&self) -> bool {
		self.collection_active
	}

	pub fn sync_sent(&self) -> bool {
		self.sync_sent
	}

	pub fn cycle_interval_ms(&self) -> u32 {
		self.cycle_interval_ms
	}

	pub fn cycle_start_ms(&self) -> u32 {
		self.cycle_start_ms
	}

	pub fn active_slaves(&self) -> impl Iterator<Item = &CollectionInfo> {
		self.active.iter()
	}

	/// Arms the scheduler with the slaves taking part and their estimated
	/// collection durations. With no slaves, collection stays inactive
	/// and no cycle will begin.
	pub fn start_collection(&mut self, slaves: Vec<(u32, u32)>) {
		self.active = slaves
			.into_iter()
			.map(|(slave_id, estimated_duration_ms)| CollectionInfo {
				slave_id,
				estimated_duration_ms,
				start_ms: 0,
				data_requested: false,
				data_received: false,
			})
			.collect();

		self.collection_active = !self.active.is_empty();
		self.state = CycleState::Idle;
		self.sync_sent = false;
		self.last_cycle_ms = 0;
	}

	/// Clears all cycle state, leaving the scheduler disarmed.
	pub fn reset(&mut self) {
		self.active.clear();
		self.collection_active = false;
		self.state = CycleState::Idle;
		self.sync_sent = false;
	}

	/// A new cycle starts when the system is running, no cycle is in
	/// flight, and the interval since the last completion has elapsed
	/// (immediately for the first cycle).
	pub fn should_start_cycle(&self, running: bool, now_ms: u32) -> bool {
		if !self.collection_active || !running {
			return false;
		}

		if self.state != CycleState::Idle && self.state != CycleState::Complete {
			return false;
		}

		self.last_cycle_ms == 0 || now_ms.wrapping_sub(self.last_cycle_ms) >= self.cycle_interval_ms
	}

	pub fn begin_cycle(&mut self, now_ms: u32) {
		self.state = CycleState::Collecting;
		self.cycle_start_ms = now_ms;
		self.sync_sent = false;

		for info in &mut self.active {
			info.start_ms = 0;
			info.data_requested = false;
			info.data_received = false;
		}
	}

	pub fn mark_sync_sent(&mut self, now_ms: u32) {
		self.sync_sent = true;
		for info in &mut self.active {
			info.start_ms = now_ms;
			info.data_requested = false;
			info.data_received = false;
		}
	}

	/// True once every slave's estimated collection window has elapsed.
	pub fn all_collections_elapsed(&self, now_ms: u32) -> bool {
		if self.state != CycleState::Collecting || !self.sync_sent {
			return false;
		}

		self.active
			.iter()
			.all(|info| now_ms.wrapping_sub(info.start_ms) >= info.estimated_duration_ms)
	}

	pub fn enter_reading(&mut self) {
		self.state = CycleState::ReadingData;
	}

	/// Slaves that have not had their data requested yet this cycle.
	pub fn slaves_needing_request(&self) -> Vec<u32> {
		if self.state != CycleState::ReadingData {
			return Vec::new();
		}

		self.active
			.iter()
			.filter(|info| !info.data_requested)
			.map(|info| info.slave_id)
			.collect()
	}

	pub fn mark_data_requested(&mut self, slave_id: u32) {
		if let Some(info) = self.active.iter_mut().find(|info| info.slave_id == slave_id) {
			info.data_requested = true;
		}
	}

	/// Records a data arrival. Returns true when this was the last
	/// outstanding slave and the cycle just completed.
	pub fn mark_data_received(&mut self, slave_id: u32, now_ms: u32) -> bool {
		if let Some(info) = self.active.iter_mut().find(|info| info.slave_id == slave_id) {
			info.data_received = true;
		}

		if !self.active.is_empty() && self.active.iter().all(|info| info.data_received) {
			self.state = CycleState::Complete;
			self.last_cycle_ms = now_ms;
			return true;
		}

		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn armed() -> CycleScheduler {
		let mut cycle = CycleScheduler::new(5000);
		cycle.start_collection(vec![(0x1001, 900), (0x1002, 900)]);
		cycle
	}

	#[test]
	fn test_no_slaves_means_no_cycle() {
		let mut cycle = CycleScheduler::new(5000);
		cycle.start_collection(Vec::new());
		assert!(!cycle.is_active());
		assert!(!cycle.should_start_cycle(true, 0));
	}

	#[test]
	fn test_first_cycle_starts_immediately() {
		let cycle = armed();
		assert!(cycle.should_start_cycle(true, 0));
		assert!(!cycle.should_start_cycle(false, 0));
	}

	#[test]
	fn test_collection_window() {
		let mut cycle = armed();
		cycle.begin_cycle(0);
		assert!(!cycle.all_collections_elapsed(10_000));

		cycle.mark_sync_sent(100);
		assert!(!cycle.all_collections_elapsed(500));
		assert!(cycle.all_collections_elapsed(1000));
	}

	#[test]
	fn test_requests_tracked_per_slave() {
		let mut cycle = armed();
		cycle.begin_cycle(0);
		cycle.mark_sync_sent(0);
		cycle.enter_reading();

		assert_eq!(cycle.slaves_needing_request(), vec![0x1001, 0x1002]);
		cycle.mark_data_requested(0x1001);
		assert_eq!(cycle.slaves_needing_request(), vec![0x1002]);
	}

	#[test]
	fn test_cycle_completes_when_all_data_arrives() {
		let mut cycle = armed();
		cycle.begin_cycle(0);
		cycle.mark_sync_sent(0);
		cycle.enter_reading();

		assert!(!cycle.mark_data_received(0x1001, 1000));
		assert!(cycle.mark_data_received(0x1002, 1100));
		assert_eq!(cycle.state(), CycleState::Complete);

		// The next cycle waits out the interval from completion.
		assert!(!cycle.should_start_cycle(true, 5000));
		assert!(cycle.should_start_cycle(true, 6200));
	}

	#[test]
	fn test_begin_resets_per_slave_flags() {
		let mut cycle = armed();
		cycle.begin_cycle(0);
		cycle.mark_sync_sent(0);
		cycle.enter_reading();
		cycle.mark_data_requested(0x1001);
		cycle.mark_data_received(0x1001, 500);
		cycle.mark_data_received(0x1002, 600);

		cycle.begin_cycle(6000);
		assert!(!cycle.sync_sent());
		cycle.mark_sync_sent(6000);
		cycle.enter_reading();
		assert_eq!(cycle.slaves_needing_request(), vec![0x1001, 0x1002]);
	}
}
