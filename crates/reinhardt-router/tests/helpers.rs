//! Shared fixtures for router integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use reinhardt_router::{
	ActivatedRoute, ComponentHandle, ComponentType, InjectionContext, OutletHost, RouterEvent,
};
use tokio::sync::broadcast;

/// Records every lifecycle call as `"action:Component"`.
#[derive(Default)]
pub struct RecordingHost {
	calls: Mutex<Vec<String>>,
}

impl RecordingHost {
	fn record(&self, action: &str, route: &ActivatedRoute) {
		let name = route.component().map(ComponentType::name).unwrap_or("-");
		self.calls.lock().push(format!("{action}:{name}"));
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}

	pub fn clear(&self) {
		self.calls.lock().clear();
	}
}

impl OutletHost for RecordingHost {
	fn activate(&self, route: &ActivatedRoute, _context: Option<&InjectionContext>) {
		self.record("activate", route);
	}

	fn deactivate(&self, route: &ActivatedRoute) {
		self.record("deactivate", route);
	}

	fn detach(&self, route: &ActivatedRoute) -> ComponentHandle {
		self.record("detach", route);
		ComponentHandle::new(route.component().map(|c| c.name().to_string()))
	}

	fn attach(&self, route: &ActivatedRoute, _component: ComponentHandle) {
		self.record("attach", route);
	}
}

/// A shared, ordered log guards write into.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
	pub fn push(&self, entry: impl Into<String>) {
		self.0.lock().push(entry.into());
	}

	pub fn entries(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}

/// Everything already emitted on `events`.
pub fn drain(events: &mut broadcast::Receiver<RouterEvent>) -> Vec<RouterEvent> {
	let mut received = Vec::new();
	while let Ok(event) = events.try_recv() {
		received.push(event);
	}
	received
}

pub fn names(events: &[RouterEvent]) -> Vec<&'static str> {
	events.iter().map(RouterEvent::name).collect()
}

/// Waits until an event named `name` arrives.
pub async fn wait_for(events: &mut broadcast::Receiver<RouterEvent>, name: &str) -> RouterEvent {
	loop {
		match events.recv().await {
			Ok(event) if event.name() == name => return event,
			Ok(_) => {}
			Err(error) => panic!("event stream failed while waiting for {name}: {error}"),
		}
	}
}
