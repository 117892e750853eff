// SPDX-License-Identifier: MIT OR Apache-2.0
//! The ambient `{request, span}` frame carried across suspension points
//! (spec §4.F), implemented as `tokio::task_local!` storage per spec §9's
//! explicit guidance to prefer task-local over continuation-local state in a
//! threaded, cooperatively suspending runtime.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::span::Span;

/// The current task's `{request, span}` frame.
#[derive(Clone, Default)]
pub struct Frame {
    request: Option<Arc<Request>>,
    span: Option<Arc<Span>>,
}

impl Frame {
    /// The frame's current request, if any.
    #[must_use]
    pub fn request(&self) -> Option<Arc<Request>> {
        self.request.clone()
    }

    /// The frame's current span, if any. Per spec, this is the innermost
    /// open span — when a span closes, its parent span (or absent) is
    /// restored here by the caller.
    #[must_use]
    pub fn span(&self) -> Option<Arc<Span>> {
        self.span.clone()
    }
}

tokio::task_local! {
    static FRAME: RefCell<Frame>;
}

/// Execute `f` inside a fresh frame inherited from whatever frame is current
/// on entry (absent a current frame, an empty one). Changes `f` makes to the
/// frame via [`set_request`]/[`set_span`] are visible only within its own
/// execution and are discarded once it returns — this is the "a new frame is
/// pushed per `transaction` and per `instrument`" behavior spec's data model
/// describes.
pub async fn run_in_new_frame<F, Fut, T>(f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let inherited = current_frame();
    FRAME.scope(RefCell::new(inherited), f()).await
}

/// The current frame, or an empty one if no frame is active — e.g. at the
/// top of a task that never entered [`run_in_new_frame`].
#[must_use]
pub fn current_frame() -> Frame {
    FRAME.try_with(|cell| cell.borrow().clone()).unwrap_or_default()
}

/// `get("request")` from spec §4.F.
#[must_use]
pub fn get_request() -> Option<Arc<Request>> {
    FRAME
        .try_with(|cell| cell.borrow().request.clone())
        .unwrap_or(None)
}

/// `get("span")` from spec §4.F.
#[must_use]
pub fn get_span() -> Option<Arc<Span>> {
    FRAME
        .try_with(|cell| cell.borrow().span.clone())
        .unwrap_or(None)
}

/// `set("request", value)`. A no-op outside any [`run_in_new_frame`] scope.
pub fn set_request(request: Option<Arc<Request>>) {
    let _ = FRAME.try_with(|cell| cell.borrow_mut().request = request);
}

/// `set("span", value)`. A no-op outside any [`run_in_new_frame`] scope.
pub fn set_span(span: Option<Arc<Span>>) {
    let _ = FRAME.try_with(|cell| cell.borrow_mut().span = span);
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Capture the current frame now, and restore that exact snapshot on every
/// invocation of the returned closure — regardless of what frame (if any) is
/// current wherever it's later called from.
pub fn bind<F, Fut, T>(f: F) -> impl Fn() -> BoxFuture<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let snapshot = current_frame();
    move || {
        let fut = f();
        Box::pin(FRAME.scope(RefCell::new(snapshot.clone()), fut)) as BoxFuture<T>
    }
}
