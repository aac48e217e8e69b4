//! Guard and Lazy Loading Integration Tests
//!
//! These tests verify ordering guarantees of the guard phase and the
//! behavior of lazily loaded child configurations:
//! 1. canDeactivate before canActivate, deepest routes first
//! 2. canActivateChild before any child canActivate
//! 3. Concurrent guards at the same depth
//! 4. canMatch, canLoad and the lazy configuration cache

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use helpers::{CallLog, RecordingHost, drain, names};
use reinhardt_router::{
	GuardResult, LoadedRoutes, NavigationBehaviorOptions, NavigationCancellationCode, Route, Router, RouterEvent,
};
use rstest::*;
use tokio::sync::Barrier;

fn behavior() -> NavigationBehaviorOptions {
	NavigationBehaviorOptions::default()
}

fn build(routes: Vec<Route>, host: &Arc<RecordingHost>) -> Router {
	Router::builder(routes).outlet_host(host.clone()).build().unwrap()
}

/// A route whose guards write into `log`.
fn logged(path: &str, component: &str, log: &CallLog) -> Route {
	let (activate_log, deactivate_log) = (log.clone(), log.clone());
	let (activate_name, deactivate_name) = (format!("canActivate:{component}"), format!("canDeactivate:{component}"));
	Route::new(path)
		.component(component)
		.can_activate(move |_, _| {
			let (log, name) = (activate_log.clone(), activate_name.clone());
			async move {
				log.push(name);
				Ok(GuardResult::Allow)
			}
		})
		.can_deactivate(move |_, _, _, _| {
			let (log, name) = (deactivate_log.clone(), deactivate_name.clone());
			async move {
				log.push(name);
				Ok(GuardResult::Allow)
			}
		})
}

#[fixture]
fn host() -> Arc<RecordingHost> {
	Arc::new(RecordingHost::default())
}

// =============================================================================
// Ordering
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_old_branch_is_torn_down_before_new_branch_activates(host: Arc<RecordingHost>) {
	let log = CallLog::default();
	let router = build(
		vec![
			logged("a", "A", &log).children(vec![logged("x", "X", &log)]),
			logged("b", "B", &log).children(vec![logged("y", "Y", &log)]),
		],
		&host,
	);
	router.navigate_by_url("/a/x", behavior()).await.unwrap();
	host.clear();
	let already_logged = log.entries().len();

	assert!(router.navigate_by_url("/b/y", behavior()).await.unwrap());

	assert_eq!(
		log.entries()[already_logged..].to_vec(),
		vec!["canDeactivate:X", "canDeactivate:A", "canActivate:B", "canActivate:Y"]
	);
	assert_eq!(host.calls(), vec!["deactivate:X", "deactivate:A", "activate:B", "activate:Y"]);
}

#[rstest]
#[tokio::test]
async fn test_can_activate_child_completes_before_child_can_activate(host: Arc<RecordingHost>) {
	let log = CallLog::default();
	let (parent_log, child_log) = (log.clone(), log.clone());
	let router = build(
		vec![
			Route::new("parent")
				.component("Parent")
				.can_activate_child(move |_, _| {
					let log = parent_log.clone();
					async move {
						log.push("canActivateChild:start");
						tokio::task::yield_now().await;
						log.push("canActivateChild:end");
						Ok(GuardResult::Allow)
					}
				})
				.children(vec![Route::new("child").component("Child").can_activate(move |_, _| {
					let log = child_log.clone();
					async move {
						log.push("canActivate:child");
						Ok(GuardResult::Allow)
					}
				})]),
		],
		&host,
	);

	assert!(router.navigate_by_url("/parent/child", behavior()).await.unwrap());

	assert_eq!(
		log.entries(),
		vec!["canActivateChild:start", "canActivateChild:end", "canActivate:child"]
	);
	assert_eq!(host.calls(), vec!["activate:Parent", "activate:Child"]);
}

#[rstest]
#[tokio::test]
async fn test_can_deactivate_rejection_keeps_current_route(host: Arc<RecordingHost>) {
	let router = build(
		vec![
			Route::new("editor")
				.component("Editor")
				.can_deactivate(|_, _, _, _| async { Ok(GuardResult::Deny) }),
			Route::new("home").component("Home"),
		],
		&host,
	);
	router.navigate_by_url("/editor", behavior()).await.unwrap();
	let mut events = router.events();

	assert!(!router.navigate_by_url("/home", behavior()).await.unwrap());

	assert_eq!(router.url(), "/editor");
	assert_eq!(host.calls(), vec!["activate:Editor"]);
	let received = drain(&mut events);
	assert!(received.iter().any(|event| matches!(
		event,
		RouterEvent::GuardsCheckEnd { should_activate: false, .. }
	)));
	assert!(matches!(
		received.last(),
		Some(RouterEvent::NavigationCancel { code: NavigationCancellationCode::GuardRejected, .. })
	));
}

#[rstest]
#[tokio::test]
async fn test_guards_at_same_depth_run_concurrently(host: Arc<RecordingHost>) {
	let barrier = Arc::new(Barrier::new(2));
	let waiting = |component: &str, outlet: &str| {
		let barrier = Arc::clone(&barrier);
		Route::new(component.to_lowercase())
			.component(component)
			.outlet(outlet)
			.can_activate(move |_, _| {
				let barrier = Arc::clone(&barrier);
				async move {
					barrier.wait().await;
					Ok(GuardResult::Allow)
				}
			})
	};
	let router = build(vec![waiting("Main", "primary"), waiting("Side", "aside")], &host);

	let committed = tokio::time::timeout(
		Duration::from_secs(5),
		router.navigate_by_url("/main(aside:side)", behavior()),
	)
	.await
	.expect("guards at the same depth must not wait for each other")
	.unwrap();

	assert!(committed);
}

// =============================================================================
// canMatch, canLoad and lazy configuration
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_can_match_falls_through_to_next_route(host: Arc<RecordingHost>) {
	let router = build(
		vec![
			Route::new("dashboard")
				.component("AdminDashboard")
				.can_match(|_, _| async { Ok(GuardResult::Deny) }),
			Route::new("dashboard").component("UserDashboard"),
		],
		&host,
	);

	router.navigate_by_url("/dashboard", behavior()).await.unwrap();

	assert_eq!(host.calls(), vec!["activate:UserDashboard"]);
}

#[rstest]
#[tokio::test]
async fn test_lazy_children_are_loaded_once(host: Arc<RecordingHost>) {
	let loads = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&loads);
	let router = build(
		vec![
			Route::new("admin").component("Admin").load_children(move || {
				counter.fetch_add(1, Ordering::SeqCst);
				async {
					Ok(LoadedRoutes::from(vec![
						Route::new("").component("AdminHome"),
						Route::new("users").component("AdminUsers"),
					]))
				}
			}),
			Route::new("home").component("Home"),
		],
		&host,
	);
	let mut events = router.events();

	router.navigate_by_url("/admin", behavior()).await.unwrap();
	let first = names(&drain(&mut events));
	router.navigate_by_url("/home", behavior()).await.unwrap();
	router.navigate_by_url("/admin/users", behavior()).await.unwrap();
	let later = names(&drain(&mut events));

	assert_eq!(loads.load(Ordering::SeqCst), 1);
	assert_eq!(first.iter().filter(|name| **name == "RouteConfigLoadStart").count(), 1);
	assert_eq!(first.iter().filter(|name| **name == "RouteConfigLoadEnd").count(), 1);
	assert!(!later.contains(&"RouteConfigLoadStart"));
	assert_eq!(router.router_state().leaf().component().map(|c| c.name()), Some("AdminUsers"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lazy_children_load_once_across_threads(host: Arc<RecordingHost>) {
	let loads = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&loads);
	let router = build(
		vec![Route::new("admin").component("Admin").load_children(move || {
			counter.fetch_add(1, Ordering::SeqCst);
			async {
				tokio::task::yield_now().await;
				Ok(LoadedRoutes::from(vec![
					Route::new("").component("AdminHome"),
					Route::new("users").component("AdminUsers"),
				]))
			}
		})],
		&host,
	);

	let tasks: Vec<_> = (0..8)
		.map(|task| {
			let router = router.clone();
			tokio::spawn(async move {
				for step in 0..8 {
					let url = if (task + step) % 2 == 0 { "/admin" } else { "/admin/users" };
					router.navigate_by_url(url, NavigationBehaviorOptions::default()).await.unwrap();
				}
			})
		})
		.collect();
	for task in tasks {
		task.await.unwrap();
	}

	assert_eq!(loads.load(Ordering::SeqCst), 1);
	assert!(router.navigate_by_url("/admin/users", behavior()).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn test_can_load_rejection_skips_loading(host: Arc<RecordingHost>) {
	let loads = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&loads);
	let router = build(
		vec![
			Route::new("admin")
				.can_load(|_, _| async { Ok(GuardResult::Deny) })
				.load_children(move || {
					counter.fetch_add(1, Ordering::SeqCst);
					async { Ok(LoadedRoutes::from(vec![Route::new("").component("AdminHome")])) }
				}),
		],
		&host,
	);
	let mut events = router.events();

	assert!(!router.navigate_by_url("/admin", behavior()).await.unwrap());

	assert_eq!(loads.load(Ordering::SeqCst), 0);
	assert!(matches!(
		drain(&mut events).last(),
		Some(RouterEvent::NavigationCancel { code: NavigationCancellationCode::GuardRejected, .. })
	));
}
