// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::error::{code::ErrorCode, ApiErrorResponse, BridgeResult},
    raise_error,
};
use poem::{
    web::headers::{authorization::Bearer, Authorization, HeaderMapExt},
    Endpoint, IntoResponse, Middleware, Request, Result,
};
use serde::Deserialize;
use std::sync::Arc;

/// Rejects requests that do not carry the homeserver token.
#[derive(Clone)]
pub struct HomeserverGuard {
    hs_token: Arc<String>,
}

impl HomeserverGuard {
    pub fn new(hs_token: impl Into<String>) -> Self {
        Self {
            hs_token: Arc::new(hs_token.into()),
        }
    }
}

pub struct HomeserverGuardEndpoint<E> {
    ep: E,
    hs_token: Arc<String>,
}

impl<E: Endpoint> Middleware<E> for HomeserverGuard {
    type Output = HomeserverGuardEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        HomeserverGuardEndpoint {
            ep,
            hs_token: self.hs_token.clone(),
        }
    }
}

#[derive(Deserialize)]
struct Param {
    access_token: String,
}

impl<E: Endpoint> Endpoint for HomeserverGuardEndpoint<E> {
    type Output = E::Output;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        if let Err(error) = authorize_homeserver(&req, &self.hs_token) {
            let response = ApiErrorResponse::from(error).into_response();
            return Err(poem::Error::from_response(response));
        }
        self.ep.call(req).await
    }
}

/// Token from the `Authorization: Bearer` header, falling back to the
/// `access_token` query parameter used by older homeservers.
fn extract_token(req: &Request) -> Option<String> {
    req.headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.0.token().to_string())
        .or_else(|| req.params::<Param>().ok().map(|param| param.access_token))
}

pub fn authorize_homeserver(req: &Request, hs_token: &str) -> BridgeResult<()> {
    let token = extract_token(req).ok_or_else(|| {
        raise_error!(
            "Missing homeserver access token".into(),
            ErrorCode::PermissionDenied
        )
    })?;
    if token != hs_token {
        return Err(raise_error!(
            "Invalid homeserver access token".into(),
            ErrorCode::InvalidAppServiceToken
        ));
    }
    Ok(())
}
