use crate::models::Request;

/// What the worker does with an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the page's normal network handling applies
    PassThrough,
    /// Network first, cached copy on failure
    NetworkFirst,
    /// Cached copy first, network on a miss
    CacheFirst,
}

/// Decision table for a request.
///
/// | method  | navigation | route         |
/// |---------|------------|---------------|
/// | not GET | any        | pass-through  |
/// | GET     | yes        | network-first |
/// | GET     | no         | cache-first   |
pub fn route(request: &Request) -> Route {
    if !request.is_get() {
        Route::PassThrough
    } else if request.is_navigation() {
        Route::NetworkFirst
    } else {
        Route::CacheFirst
    }
}
