//! Tower service layer for the paywall

use super::payment::{attach_receipt, Admission, Paywall};
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;

type HttpTraceLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

/// Create a service builder with request tracing and the paywall
pub fn create_payment_service(
    paywall: Paywall,
) -> ServiceBuilder<Stack<PaywallLayer, Stack<HttpTraceLayer, Identity>>> {
    ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(PaywallLayer::new(paywall))
}

/// Tower layer applying the paywall to an inner service
#[derive(Debug, Clone)]
pub struct PaywallLayer {
    paywall: Paywall,
}

impl PaywallLayer {
    pub fn new(paywall: Paywall) -> Self {
        Self { paywall }
    }
}

impl<S> tower::Layer<S> for PaywallLayer {
    type Service = PaywallService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PaywallService {
            inner,
            paywall: self.paywall.clone(),
        }
    }
}

/// Tower service guarding an inner service with the paywall
#[derive(Debug, Clone)]
pub struct PaywallService<S> {
    inner: S,
    paywall: Paywall,
}

impl<S> tower::Service<http::Request<Body>> for PaywallService<S>
where
    S: tower::Service<http::Request<Body>, Response = Response, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<Body>) -> Self::Future {
        let paywall = self.paywall.clone();
        // The ready inner service goes into the future; a fresh clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let path = req.uri().path().to_string();
            let admission = paywall.admit(&path, req.headers()).await;

            match admission {
                Admission::Unpriced => inner.call(req).await,
                Admission::Paid(payment) => {
                    req.extensions_mut().insert(payment.clone());
                    let mut response = inner.call(req).await?;
                    attach_receipt(&mut response, &payment);
                    Ok(response)
                }
                Admission::Rejected(rejection) => Ok(rejection.into_response()),
            }
        })
    }
}
