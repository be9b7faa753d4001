// Router-level tests driven through tower::ServiceExt::oneshot
pub mod bookmarks_api_test;
