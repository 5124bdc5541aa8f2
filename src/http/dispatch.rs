//! Request dispatch: CONNECT goes to the tunnel handler, everything else is
//! forwarded.

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{Method, Request},
    response::Response,
    BoxError, Router,
};
use tower::ServiceExt;

use crate::http::tunnel::TunnelHandler;

/// Handling strategy for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tunnel,
    Forward,
}

pub fn route(method: &Method) -> Route {
    if method == Method::CONNECT {
        Route::Tunnel
    } else {
        Route::Forward
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    tunnel: TunnelHandler,
    forward: Router,
}

impl Dispatcher {
    pub fn new(tunnel: TunnelHandler, forward: Router) -> Self {
        Self { tunnel, forward }
    }

    pub async fn dispatch<B>(&self, request: Request<B>) -> Response
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        match route(request.method()) {
            Route::Tunnel => self.tunnel.handle(request).await,
            Route::Forward => match self.forward.clone().oneshot(request.map(Body::new)).await {
                Ok(response) => response,
                Err(never) => match never {},
            },
        }
    }
}
