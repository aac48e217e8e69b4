//! Facade re-export tests

use reinhardt_navigation::prelude::*;
use rstest::*;
use serde_json::json;

#[rstest]
fn test_prelude_exposes_url_tree() {
	let serializer = DefaultUrlSerializer;
	let tree = serializer.parse("/team/33(aux:chat)?debug=true").unwrap();

	assert_eq!(tree.root.number_of_children(), 2);
	assert_eq!(serializer.serialize(&tree), "/team/33(aux:chat)?debug=true");
}

#[rstest]
#[tokio::test]
async fn test_prelude_drives_router() {
	let router = Router::builder(vec![Route::new("team/:id").component("Team")])
		.build()
		.unwrap();

	let committed = router
		.navigate(&[json!("/team"), json!(7)], NavigationExtras::default())
		.unwrap()
		.await
		.unwrap();

	assert!(committed);
	assert_eq!(router.url(), "/team/7");
	assert!(router.navigated());
}
