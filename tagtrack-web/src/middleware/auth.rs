//! Bearer-token authentication middleware.
//!
//! Validates the bearer token against the configured identity resolver
//! and attaches the resolved caller identity to the request. WebSocket
//! clients cannot set headers from a browser, so a `token` query
//! parameter is accepted as a fallback.

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::AUTHORIZATION, Method},
    web::Data,
    Error, HttpMessage, HttpResponse,
};
use futures::{
    future::{ok, LocalBoxFuture, Ready},
    FutureExt,
};
use serde_json::json;
use std::{
    cell::RefCell,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
};

use crate::AppState;

/// Authentication middleware factory.
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddleware {
            service: Rc::new(RefCell::new(service)),
        })
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<RefCell<S>>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = S::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        async move {
            // Fast path for CORS preflight
            if Method::OPTIONS == req.method() {
                return srv.call(req).await.map(|res| res.map_into_left_body());
            }

            let state = req
                .app_data::<Data<Arc<AppState>>>()
                .map(|d| Arc::clone(d.get_ref()));
            let Some(state) = state else {
                return srv.call(req).await.map(|res| res.map_into_left_body());
            };
            if !state.auth_enabled {
                return srv.call(req).await.map(|res| res.map_into_left_body());
            }

            let Some(token) = extract_token(&req) else {
                return Ok(unauthorized(req));
            };
            match state.resolver.resolve(&token).await {
                Some(identity) => {
                    req.extensions_mut().insert(identity);
                    srv.call(req).await.map(|res| res.map_into_left_body())
                }
                None => Ok(unauthorized(req)),
            }
        }
        .boxed_local()
    }
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(header) = req.headers().get(AUTHORIZATION) {
        let value = header.to_str().ok()?;
        return value
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string());
    }
    // Query-string fallback for WebSocket upgrades
    token_from_query(req.query_string())
}

fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        pair.strip_prefix("token=")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

fn unauthorized<B: MessageBody>(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
    let response = HttpResponse::Unauthorized().json(json!({
        "error": "Unauthorized",
        "message": "invalid or missing bearer token"
    }));
    req.into_response(response).map_into_right_body()
}
