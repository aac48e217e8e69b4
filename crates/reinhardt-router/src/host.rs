//! Seams to the host framework that renders components.
//!
//! The router never looks inside a component. It asks the [`OutletHost`] to
//! activate, deactivate, detach and re-attach them, passing opaque handles
//! around.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::activated_route::ActivatedRoute;

/// Opaque context a lazily loaded configuration was created in.
///
/// The host's dependency-injection layer decides what lives inside.
#[derive(Clone)]
pub struct InjectionContext(Arc<dyn Any + Send + Sync>);

impl InjectionContext {
	pub fn new<T: Any + Send + Sync>(value: T) -> Self {
		Self(Arc::new(value))
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for InjectionContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("InjectionContext(..)")
	}
}

/// Opaque handle to a live component instance.
#[derive(Clone)]
pub struct ComponentHandle(Arc<dyn Any + Send + Sync>);

impl ComponentHandle {
	pub fn new<T: Any + Send + Sync>(component: T) -> Self {
		Self(Arc::new(component))
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for ComponentHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("ComponentHandle(..)")
	}
}

/// Component lifecycle calls issued while activating a new router state.
///
/// Calls are synchronous. Deactivation always runs deepest-first and
/// activation root-first.
pub trait OutletHost: Send + Sync {
	/// Mounts the component of `route` in its outlet.
	fn activate(&self, route: &ActivatedRoute, context: Option<&InjectionContext>);

	/// Destroys the component mounted for `route`.
	fn deactivate(&self, route: &ActivatedRoute);

	/// Removes the component of `route` from its outlet without destroying it.
	fn detach(&self, route: &ActivatedRoute) -> ComponentHandle;

	/// Puts a previously detached component back into the outlet of `route`.
	fn attach(&self, route: &ActivatedRoute, component: ComponentHandle);

	/// The live component for `route`, handed to `canDeactivate` guards.
	fn component_instance(&self, _route: &ActivatedRoute) -> Option<ComponentHandle> {
		None
	}
}

/// Host that renders nothing. Useful for headless routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOutletHost;

impl OutletHost for NoopOutletHost {
	fn activate(&self, _route: &ActivatedRoute, _context: Option<&InjectionContext>) {}

	fn deactivate(&self, _route: &ActivatedRoute) {}

	fn detach(&self, _route: &ActivatedRoute) -> ComponentHandle {
		ComponentHandle::new(())
	}

	fn attach(&self, _route: &ActivatedRoute, _component: ComponentHandle) {}
}
