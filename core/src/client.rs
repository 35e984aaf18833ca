//! Client entry point: one request builder, two ways to dispatch.
//!
//! # Design
//! `Client` holds only a handle to a `ClientProvider`. `send` and
//! `send_async` both run the same `build_request` on the caller's thread, so
//! every validation error is returned before anything is dispatched. They
//! differ only in how the transport is invoked: `send` calls it on the
//! current thread; `send_async` moves the call onto the runtime's blocking
//! pool and returns a future that resolves exactly once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::{HttpError, Result};
use crate::http::BuiltRequest;
use crate::request::build_request;
use crate::response::ResponseEnvelope;
use crate::transport::{ClientProvider, Transport};
use crate::types::RequestContext;

/// Builds and dispatches requests described by a `RequestContext`.
#[derive(Debug, Clone)]
pub struct Client {
    provider: Arc<ClientProvider>,
}

impl Client {
    pub fn new(provider: Arc<ClientProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ClientProvider {
        &self.provider
    }

    /// Build the wire request without sending it.
    pub fn build(&self, ctx: RequestContext) -> Result<BuiltRequest> {
        build_request(ctx)
    }

    /// Send a request, blocking until the response headers arrive. The body
    /// is left unread in the returned envelope.
    pub fn send(&self, mut ctx: RequestContext) -> Result<ResponseEnvelope> {
        let override_transport = ctx.client.take();
        let request = build_request(ctx)?;
        let transport = self.transport_for(override_transport);
        dispatch(transport.as_ref(), request)
    }

    /// Send a request without blocking the caller.
    ///
    /// Build errors are returned immediately. Must be called from within a
    /// tokio runtime.
    pub fn send_async(&self, mut ctx: RequestContext) -> Result<PendingResponse> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| HttpError::NoRuntime)?;
        let override_transport = ctx.client.take();
        let request = build_request(ctx)?;
        let transport = self.transport_for(override_transport);
        let task = handle.spawn_blocking(move || dispatch(transport.as_ref(), request));
        Ok(PendingResponse { task })
    }

    fn transport_for(&self, override_transport: Option<Arc<dyn Transport>>) -> Arc<dyn Transport> {
        override_transport.unwrap_or_else(|| self.provider.get())
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Arc::new(ClientProvider::default()))
    }
}

fn dispatch(transport: &dyn Transport, request: BuiltRequest) -> Result<ResponseEnvelope> {
    let method = request.request.method().clone();
    let uri = request.request.uri().clone();
    tracing::debug!("Dispatching {} request to: {}", method, uri);
    let raw = transport.execute(request)?;
    tracing::debug!("{} response: {} {}", method, raw.parts.status, uri);
    Ok(ResponseEnvelope::from_raw(raw))
}

/// A response that has not arrived yet.
pub struct PendingResponse {
    task: JoinHandle<Result<ResponseEnvelope>>,
}

impl Future for PendingResponse {
    type Output = Result<ResponseEnvelope>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => Poll::Ready(Err(HttpError::TaskJoin(join_error))),
        }
    }
}

/// Send through the process-wide provider, blocking.
pub fn request(ctx: RequestContext) -> Result<ResponseEnvelope> {
    global_client().send(ctx)
}

/// Send through the process-wide provider, without blocking.
pub fn request_async(ctx: RequestContext) -> Result<PendingResponse> {
    global_client().send_async(ctx)
}

fn global_client() -> Client {
    Client::new(Arc::clone(ClientProvider::global()))
}
