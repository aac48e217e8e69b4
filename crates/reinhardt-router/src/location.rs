//! Browser location and history.
//!
//! [`Location`] is what the router writes committed URLs to and listens on
//! for back/forward navigation. [`MemoryLocation`] keeps the history stack in
//! memory, for headless hosts and tests.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// A back/forward move to an existing history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PopStateEvent {
	pub url: String,
	pub state: Value,
}

pub type PopStateListener = Arc<dyn Fn(PopStateEvent) + Send + Sync>;

pub trait Location: Send + Sync {
	/// The current path, including query string and fragment.
	fn path(&self) -> String;

	fn is_current_path_equal_to(&self, path: &str) -> bool {
		self.path() == path
	}

	/// State stored with the current entry.
	fn state(&self) -> Value;

	/// Pushes a new history entry.
	fn go(&self, path: &str, state: Value);

	/// Replaces the current history entry.
	fn replace_state(&self, path: &str, state: Value);

	/// Registers a listener for back/forward moves.
	fn subscribe(&self, listener: PopStateListener);
}

struct HistoryEntry {
	path: String,
	state: Value,
}

struct History {
	entries: Vec<HistoryEntry>,
	index: usize,
}

/// In-memory history stack.
pub struct MemoryLocation {
	history: Mutex<History>,
	listeners: Mutex<Vec<PopStateListener>>,
}

impl fmt::Debug for MemoryLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let history = self.history.lock();
		f.debug_struct("MemoryLocation")
			.field("entries", &history.entries.iter().map(|e| e.path.as_str()).collect::<Vec<_>>())
			.field("index", &history.index)
			.finish()
	}
}

impl Default for MemoryLocation {
	fn default() -> Self {
		Self::new("")
	}
}

impl MemoryLocation {
	/// Starts with a single entry at `initial_path`.
	pub fn new(initial_path: impl Into<String>) -> Self {
		Self {
			history: Mutex::new(History {
				entries: vec![HistoryEntry {
					path: initial_path.into(),
					state: Value::Null,
				}],
				index: 0,
			}),
			listeners: Mutex::new(Vec::new()),
		}
	}

	/// Paths of every entry, oldest first.
	pub fn entries(&self) -> Vec<String> {
		self.history.lock().entries.iter().map(|entry| entry.path.clone()).collect()
	}

	pub fn index(&self) -> usize {
		self.history.lock().index
	}

	pub fn back(&self) -> bool {
		self.traverse(-1)
	}

	pub fn forward(&self) -> bool {
		self.traverse(1)
	}

	/// Moves `delta` entries and notifies listeners. Returns `false` when the
	/// move would leave the stack.
	pub fn traverse(&self, delta: isize) -> bool {
		let event = {
			let mut history = self.history.lock();
			let Some(target) = history.index.checked_add_signed(delta) else {
				return false;
			};
			if target >= history.entries.len() {
				return false;
			}
			history.index = target;
			let entry = &history.entries[target];
			PopStateEvent {
				url: entry.path.clone(),
				state: entry.state.clone(),
			}
		};
		tracing::debug!(url = %event.url, "popstate");
		let listeners = self.listeners.lock().clone();
		for listener in listeners {
			listener(event.clone());
		}
		true
	}
}

impl Location for MemoryLocation {
	fn path(&self) -> String {
		let history = self.history.lock();
		history.entries[history.index].path.clone()
	}

	fn state(&self) -> Value {
		let history = self.history.lock();
		history.entries[history.index].state.clone()
	}

	fn go(&self, path: &str, state: Value) {
		let mut history = self.history.lock();
		let next = history.index + 1;
		history.entries.truncate(next);
		history.entries.push(HistoryEntry {
			path: path.to_string(),
			state,
		});
		history.index = next;
	}

	fn replace_state(&self, path: &str, state: Value) {
		let mut history = self.history.lock();
		let index = history.index;
		history.entries[index] = HistoryEntry {
			path: path.to_string(),
			state,
		};
	}

	fn subscribe(&self, listener: PopStateListener) {
		self.listeners.lock().push(listener);
	}
}
