//! Every RPC call carries a node identity and a blockchain ID header;
//! a mismatch on either fails the request with a 4xx before it reaches the
//! inner service. A `tower::Layer` so it composes into `jsonrpsee`'s HTTP
//! middleware stack like any other service wrapper.

use http::{HeaderValue, Request, Response, StatusCode};
use std::task::{Context, Poll};
use tower::{Layer, Service};

pub const NODE_ID_HEADER: &str = "x-node-id";
pub const CHAIN_ID_HEADER: &str = "x-chain-id";

#[derive(Clone)]
pub struct AuthLayer {
    expected_node_id: HeaderValue,
    expected_chain_id: HeaderValue,
}

impl AuthLayer {
    pub fn new(node_id: &str, chain_id: &str) -> Self {
        Self {
            expected_node_id: HeaderValue::from_str(node_id).expect("node id must be a valid header value"),
            expected_chain_id: HeaderValue::from_str(chain_id).expect("chain id must be a valid header value"),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            expected_node_id: self.expected_node_id.clone(),
            expected_chain_id: self.expected_chain_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    expected_node_id: HeaderValue,
    expected_chain_id: HeaderValue,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AuthService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let node_ok = req.headers().get(NODE_ID_HEADER) == Some(&self.expected_node_id);
        let chain_ok = req.headers().get(CHAIN_ID_HEADER) == Some(&self.expected_chain_id);

        if node_ok && chain_ok {
            let fut = self.inner.call(req);
            Box::pin(fut)
        } else {
            tracing::warn!(node_ok, chain_ok, "rejecting rpc request: identity header mismatch");
            let mut response = Response::new(ResBody::default());
            *response.status_mut() = StatusCode::FORBIDDEN;
            Box::pin(async move { Ok(response) })
        }
    }
}
