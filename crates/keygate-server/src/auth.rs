// ABOUTME: Tower middleware that runs the keygate Gate on every request it wraps.
// ABOUTME: Forwards allowed requests untouched and answers denied ones with an empty-bodied status.

use axum::body::Body;
use axum::http::{Request, Response};
use keygate_core::{Decision, Gate};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A tower Layer that puts the header gate in front of the wrapped service.
#[derive(Clone)]
pub struct AuthLayer {
    gate: Gate,
}

impl AuthLayer {
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// The middleware service produced by [`AuthLayer`].
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    gate: Gate,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        match self.gate.check(req.headers()) {
            Decision::Allow => {
                // Take the service that was driven to readiness, leave a fresh clone behind.
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                Box::pin(async move { inner.call(req).await })
            }
            Decision::Deny(status) => {
                tracing::debug!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    status = status.as_u16(),
                    "request denied by header gate"
                );
                let mut resp = Response::new(Body::empty());
                *resp.status_mut() = status;
                Box::pin(async move { Ok(resp) })
            }
        }
    }
}
