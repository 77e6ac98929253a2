//! Request instrumentation middleware.
//!
//! [`InstrumentationLayer`] adapts any [`RequestInterceptor`] to a tower
//! layer. Added with `Router::layer`, it runs after routing, so the matched
//! route template is available.

use axum::extract::MatchedPath;
use axum::http::{Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use telemetry::context::{self, TRACEPARENT_HEADER};
use telemetry::instrumentation::{RequestInfo, RequestInterceptor, ResponseInfo};
use tower::{Layer, Service};

/// Tower layer running a [`RequestInterceptor`] around every request.
pub struct InstrumentationLayer<I> {
    interceptor: Arc<I>,
}

impl<I> InstrumentationLayer<I> {
    /// Wraps the given interceptor.
    pub fn new(interceptor: Arc<I>) -> Self {
        Self { interceptor }
    }
}

impl<I> Clone for InstrumentationLayer<I> {
    fn clone(&self) -> Self {
        Self {
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

impl<S, I> Layer<S> for InstrumentationLayer<I> {
    type Service = InstrumentationService<S, I>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentationService {
            inner,
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

/// Service produced by [`InstrumentationLayer`].
pub struct InstrumentationService<S, I> {
    inner: S,
    interceptor: Arc<I>,
}

impl<S: Clone, I> Clone for InstrumentationService<S, I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

impl<S, I, ReqBody, ResBody> Service<Request<ReqBody>> for InstrumentationService<S, I>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    I: RequestInterceptor,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let info = request_info(&request);
        let interceptor = Arc::clone(&self.interceptor);
        let scope = interceptor.before_request(&info);
        let span_context = interceptor.span_context(&scope);
        let future = self.inner.call(request);

        Box::pin(async move {
            let result = match span_context {
                Some(span_context) => context::scope(span_context, future).await,
                None => future.await,
            };
            let status = result
                .as_ref()
                .map_or(StatusCode::INTERNAL_SERVER_ERROR, Response::status);
            interceptor.after_request(
                scope,
                &ResponseInfo {
                    status: status.as_u16(),
                },
            );
            result
        })
    }
}

fn request_info<B>(request: &Request<B>) -> RequestInfo {
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| path.clone(), |matched| matched.as_str().to_string());
    let traceparent = request
        .headers()
        .get(TRACEPARENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);

    RequestInfo {
        method: request.method().to_string(),
        route,
        path,
        traceparent,
    }
}
