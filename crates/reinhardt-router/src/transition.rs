//! The navigation pipeline.
//!
//! Scheduling happens synchronously in the caller: the in-flight navigation
//! is canceled, the same-URL policy is applied, `NavigationStart` is emitted,
//! and the rest of the pipeline is spawned as one task. That task recognizes
//! the URL, runs guards and resolvers, commits the new state and activates it.
//! A newer navigation cancels the task through its [`CancellationToken`]
//! unless it already committed.

use std::sync::Arc;

use reinhardt_url_tree::UrlTree;
use tokio_util::sync::CancellationToken;

use crate::activate::ActivationPlan;
use crate::activated_route::create_empty_state_snapshot;
use crate::check_guards::{check_guards, get_all_route_guards};
use crate::error::{NavigationCanceling, NavigationCancellationCode, NavigationSkippedCode, RouterError, RouterResult};
use crate::events::RouterEvent;
use crate::guards::{GuardResult, RedirectCommand};
use crate::navigation::{NavigationBehaviorOptions, NavigationInfo, NavigationTrigger, PendingNavigation, RestoredState, Settle};
use crate::options::{OnSameUrlNavigation, UrlUpdateStrategy};
use crate::recognize::Recognizer;
use crate::resolve::resolve_data;
use crate::reuse::create_router_state;
use crate::router::{NavigationErrorResolution, RouterInner};
use crate::snapshot::RouterStateSnapshot;

/// A request to navigate, before it gets an id.
#[derive(Debug, Clone)]
pub(crate) struct NavigationRequest {
	pub raw_url: UrlTree,
	pub trigger: NavigationTrigger,
	pub restored_state: Option<RestoredState>,
	pub behavior: NavigationBehaviorOptions,
}

#[derive(Debug)]
struct InFlight {
	info: NavigationInfo,
	token: CancellationToken,
	settle: Settle,
	committed: bool,
}

/// Bookkeeping of the navigation that is currently running.
#[derive(Debug, Default)]
pub(crate) struct Transitions {
	last_id: u64,
	current: Option<InFlight>,
}

impl Transitions {
	pub(crate) fn current_navigation(&self) -> Option<NavigationInfo> {
		self.current.as_ref().map(|in_flight| in_flight.info.clone())
	}

	fn is_current(&self, id: u64) -> bool {
		self.current.as_ref().is_some_and(|in_flight| in_flight.info.id == id)
	}

	fn set_final_url(&mut self, id: u64, url: &UrlTree) {
		if let Some(in_flight) = self.current.as_mut().filter(|in_flight| in_flight.info.id == id) {
			in_flight.info.final_url = Some(url.clone());
		}
	}

	/// Marks `id` as committed so newer navigations no longer cancel it.
	/// Returns `false` when `id` lost its place to a newer navigation.
	fn mark_committed(&mut self, id: u64) -> bool {
		match self.current.as_mut() {
			Some(in_flight) if in_flight.info.id == id && !in_flight.token.is_cancelled() => {
				in_flight.committed = true;
				true
			}
			_ => false,
		}
	}

	/// Drops `id` if it is still the current navigation.
	fn finish(&mut self, id: u64) -> bool {
		if self.is_current(id) {
			self.current = None;
			true
		} else {
			false
		}
	}
}

/// Per-task state of one navigation.
struct Navigation {
	info: NavigationInfo,
	/// Leaving a URL this router processes for one it does not.
	reset_to_empty: bool,
	target: Option<Arc<RouterStateSnapshot>>,
}

/// Schedules a navigation and returns its pending outcome.
pub(crate) fn schedule_navigation(inner: &Arc<RouterInner>, request: NavigationRequest) -> PendingNavigation {
	let (settle, pending) = Settle::new();
	start_navigation(inner, request, settle);
	pending
}

fn start_navigation(inner: &Arc<RouterInner>, request: NavigationRequest, settle: Settle) {
	let serializer = inner.serializer.as_ref();
	let extracted_url = inner.url_handling.extract(&request.raw_url);

	let mut transitions = inner.transitions.lock();
	transitions.last_id += 1;
	let id = transitions.last_id;

	if let Some(previous) = transitions.current.take() {
		if previous.committed {
			tracing::trace!(navigation_id = previous.info.id, "previous navigation already committed");
		} else {
			previous.token.cancel();
			let reason = format!(
				"Navigation ID {} is not equal to the current navigation id {}",
				previous.info.id, id
			);
			tracing::debug!(navigation_id = previous.info.id, superseded_by = id, "navigation superseded");
			inner.events.emit(RouterEvent::NavigationCancel {
				id: previous.info.id,
				url: serializer.serialize(&previous.info.extracted_url),
				reason,
				code: NavigationCancellationCode::SupersededByNewNavigation,
			});
			previous.settle.resolve(Ok(false));
		}
	}

	let mut state = inner.state.lock();
	let url_transition =
		!state.navigated() || serializer.serialize(&extracted_url) != serializer.serialize(state.current_url_tree());
	let on_same_url = request
		.behavior
		.on_same_url_navigation
		.unwrap_or(inner.options.on_same_url_navigation);

	if !url_transition && on_same_url != OnSameUrlNavigation::Reload {
		let url = serializer.serialize(&request.raw_url);
		tracing::debug!(navigation_id = id, url = %url, "same URL navigation skipped");
		state.set_raw_url_tree(request.raw_url);
		inner.events.emit(RouterEvent::NavigationSkipped {
			id,
			reason: format!("Navigation to {url} was ignored because it is the same as the current Router URL."),
			url,
			code: NavigationSkippedCode::IgnoredSameUrlNavigation,
		});
		settle.resolve(Ok(false));
		return;
	}

	let processes_target = inner.url_handling.should_process_url(&request.raw_url);
	let reset_to_empty =
		!processes_target && url_transition && inner.url_handling.should_process_url(state.raw_url_tree());
	if !processes_target && !reset_to_empty {
		let url = serializer.serialize(&request.raw_url);
		tracing::debug!(navigation_id = id, url = %url, "navigation ignored by URL handling strategy");
		inner.events.emit(RouterEvent::NavigationSkipped {
			id,
			reason: format!(
				"Navigation was ignored because the UrlHandlingStrategy indicated neither the current URL {} nor target URL {} should be processed.",
				serializer.serialize(state.raw_url_tree()),
				url
			),
			url,
			code: NavigationSkippedCode::IgnoredByUrlHandlingStrategy,
		});
		settle.resolve(Ok(false));
		return;
	}

	state.begin_navigation();
	let previous_navigation = state.last_successful_navigation().map(|last| {
		let mut last = last.clone();
		last.previous_navigation = None;
		Box::new(last)
	});
	drop(state);

	let mut behavior = request.behavior;
	if reset_to_empty {
		behavior.skip_location_change = false;
		behavior.replace_url = false;
	}
	let info = NavigationInfo {
		id,
		initial_url: request.raw_url,
		extracted_url,
		final_url: None,
		trigger: request.trigger,
		extras: behavior,
		previous_navigation,
	};

	let url = serializer.serialize(&info.extracted_url);
	tracing::debug!(navigation_id = id, url = %url, trigger = ?info.trigger, "navigation start");
	inner.events.emit(RouterEvent::NavigationStart {
		id,
		url,
		trigger: info.trigger,
		restored_state: request.restored_state,
	});

	let token = CancellationToken::new();
	transitions.current = Some(InFlight {
		info: info.clone(),
		token: token.clone(),
		settle: settle.clone(),
		committed: false,
	});
	drop(transitions);

	let navigation = Navigation {
		info,
		reset_to_empty,
		target: None,
	};
	tokio::spawn(run(Arc::clone(inner), navigation, token, settle));
}

async fn run(inner: Arc<RouterInner>, mut navigation: Navigation, token: CancellationToken, settle: Settle) {
	let outcome = tokio::select! {
		biased;
		_ = token.cancelled() => return,
		outcome = pipeline(&inner, &mut navigation) => outcome,
	};
	match outcome {
		Ok(true) => settle.resolve(Ok(true)),
		Ok(false) => {}
		Err(error) => handle_failure(&inner, navigation, settle, error),
	}
}

/// Runs one navigation up to `NavigationEnd`. `Ok(false)` means a newer
/// navigation took over before this one could commit.
async fn pipeline(inner: &Arc<RouterInner>, navigation: &mut Navigation) -> RouterResult<bool> {
	let serializer = inner.serializer.as_ref();
	let id = navigation.info.id;
	let url = serializer.serialize(&navigation.info.extracted_url);
	let current = inner.state.lock().router_state().clone();

	let (final_url, mut target) = if navigation.reset_to_empty {
		let snapshot = create_empty_state_snapshot(&navigation.info.extracted_url, inner.root_component.clone());
		(navigation.info.extracted_url.clone(), RouterStateSnapshot::clone(&snapshot))
	} else {
		let config = inner.config.read().clone();
		let recognition = Recognizer::new(&config, &inner.loader, serializer, navigation.info.extracted_url.clone())
			.inheritance(inner.options.params_inheritance_strategy)
			.root_component(inner.root_component.clone())
			.max_redirects(inner.options.max_redirects)
			.recognize()
			.await?;
		(recognition.url_after_redirects, recognition.state)
	};
	navigation.info.final_url = Some(final_url.clone());
	inner.transitions.lock().set_final_url(id, &final_url);
	let url_after_redirects = serializer.serialize(&final_url);
	tracing::debug!(navigation_id = id, url = %url, url_after_redirects = %url_after_redirects, "routes recognized");

	let checks = get_all_route_guards(&mut target, current.snapshot());
	let mut target = Arc::new(target);
	navigation.target = Some(Arc::clone(&target));

	if !navigation.reset_to_empty {
		if inner.options.url_update_strategy == UrlUpdateStrategy::Eager && !navigation.info.extras.skip_location_change {
			let raw = inner.url_handling.merge(&final_url, &navigation.info.initial_url);
			inner.state.lock().set_browser_url(
				inner.location.as_ref(),
				serializer,
				&raw,
				&navigation.info.extras,
				id,
			);
		}
		inner.events.emit(RouterEvent::RoutesRecognized {
			id,
			url: url.clone(),
			url_after_redirects: url_after_redirects.clone(),
			state: Arc::clone(&target),
		});
	}

	inner.events.emit(RouterEvent::GuardsCheckStart {
		id,
		url: url.clone(),
		url_after_redirects: url_after_redirects.clone(),
		state: Arc::clone(&target),
	});
	let guards = check_guards(&checks, &target, &current, inner.host.as_ref(), &inner.events).await?;
	inner.events.emit(RouterEvent::GuardsCheckEnd {
		id,
		url: url.clone(),
		url_after_redirects: url_after_redirects.clone(),
		state: Arc::clone(&target),
		should_activate: guards.is_allow(),
	});
	match guards {
		GuardResult::Allow => {}
		GuardResult::Deny => {
			tracing::debug!(navigation_id = id, "guard rejected navigation");
			return Err(RouterError::canceled(NavigationCancellationCode::GuardRejected, ""));
		}
		GuardResult::Redirect(command) => {
			return Err(RouterError::Canceled(NavigationCanceling::redirect(command)));
		}
	}

	if !checks.can_activate.is_empty() {
		inner.events.emit(RouterEvent::ResolveStart {
			id,
			url: url.clone(),
			url_after_redirects: url_after_redirects.clone(),
			state: Arc::clone(&target),
		});
		resolve_data(&checks, &mut target, inner.options.params_inheritance_strategy).await?;
		navigation.target = Some(Arc::clone(&target));
		inner.events.emit(RouterEvent::ResolveEnd {
			id,
			url: url.clone(),
			url_after_redirects: url_after_redirects.clone(),
			state: Arc::clone(&target),
		});
	}

	if !inner.transitions.lock().mark_committed(id) {
		return Ok(false);
	}

	let current = inner.state.lock().router_state().clone();
	let next = create_router_state(inner.reuse.as_ref(), &target, &current);
	{
		let mut state = inner.state.lock();
		state.commit(
			final_url,
			&navigation.info.initial_url,
			next.clone(),
			inner.url_handling.as_ref(),
		);
		if inner.options.url_update_strategy == UrlUpdateStrategy::Deferred
			&& !navigation.info.extras.skip_location_change
		{
			let raw = state.raw_url_tree().clone();
			state.set_browser_url(inner.location.as_ref(), serializer, &raw, &navigation.info.extras, id);
		}
	}

	ActivationPlan::build(inner.reuse.as_ref(), &next, &current).execute(
		inner.host.as_ref(),
		inner.reuse.as_ref(),
		&inner.events,
	);

	let committed_url = {
		let mut state = inner.state.lock();
		state.complete(navigation.info.clone());
		serializer.serialize(state.current_url_tree())
	};
	inner.transitions.lock().finish(id);
	tracing::debug!(navigation_id = id, url = %committed_url, "navigation end");
	inner.events.emit(RouterEvent::NavigationEnd {
		id,
		url,
		url_after_redirects: committed_url,
	});
	Ok(true)
}

fn handle_failure(inner: &Arc<RouterInner>, navigation: Navigation, settle: Settle, error: RouterError) {
	let id = navigation.info.id;
	if !inner.transitions.lock().finish(id) {
		return;
	}
	let url = inner.serializer.serialize(&navigation.info.extracted_url);

	if let RouterError::Canceled(canceling) = &error {
		tracing::debug!(navigation_id = id, code = %canceling.code, reason = %canceling.reason, "navigation canceled");
		inner.events.emit(RouterEvent::NavigationCancel {
			id,
			url,
			reason: canceling.reason.clone(),
			code: canceling.code,
		});
		match &canceling.redirect {
			Some(command) => redirect(inner, &navigation, command.clone(), settle),
			None => {
				if matches!(
					canceling.code,
					NavigationCancellationCode::GuardRejected | NavigationCancellationCode::NoDataFromResolver
				) {
					restore_history(inner, &navigation, false);
				}
				settle.resolve(Ok(false));
			}
		}
		return;
	}

	tracing::warn!(navigation_id = id, url = %url, error = %error, "navigation failed");
	let resolution = match &inner.error_handler {
		Some(handler) => handler(&error, &navigation.info),
		None => NavigationErrorResolution::Rethrow,
	};
	let outcome = match resolution {
		NavigationErrorResolution::Redirect(command) => {
			let canceling = NavigationCanceling::redirect(command.clone());
			inner.events.emit(RouterEvent::NavigationCancel {
				id,
				url,
				reason: canceling.reason,
				code: canceling.code,
			});
			redirect(inner, &navigation, command, settle);
			return;
		}
		NavigationErrorResolution::Resolve(value) => Ok(value),
		NavigationErrorResolution::Rethrow => Err(error.clone()),
	};

	restore_history(inner, &navigation, true);
	inner.events.emit(RouterEvent::NavigationError {
		id,
		url,
		error,
		target: navigation.target.clone(),
	});
	settle.resolve(outcome);
}

/// Starts the follow-up navigation of a redirect, settling the original
/// caller's promise with its outcome.
fn redirect(inner: &Arc<RouterInner>, navigation: &Navigation, command: RedirectCommand, settle: Settle) {
	let raw_url = inner.url_handling.merge(&command.url, &navigation.info.initial_url);
	let browser_triggered = navigation.info.trigger != NavigationTrigger::Imperative;
	let mut behavior = command.behavior;
	behavior.skip_location_change |= navigation.info.extras.skip_location_change;
	behavior.replace_url |= inner.options.url_update_strategy == UrlUpdateStrategy::Eager || browser_triggered;
	tracing::debug!(navigation_id = navigation.info.id, target = %inner.serializer.serialize(&raw_url), "redirecting");
	start_navigation(
		inner,
		NavigationRequest {
			raw_url,
			trigger: NavigationTrigger::Imperative,
			restored_state: None,
			behavior,
		},
		settle,
	);
}

/// Puts the location, and after an error the router state, back to what was
/// committed before `navigation`.
fn restore_history(inner: &Arc<RouterInner>, navigation: &Navigation, reset_internal: bool) {
	let mut state = inner.state.lock();
	if reset_internal {
		state.reset_internal_state(navigation.info.final_url.as_ref(), inner.url_handling.as_ref());
	}
	state.reset_url_to_current(inner.location.as_ref(), inner.serializer.as_ref());
}
