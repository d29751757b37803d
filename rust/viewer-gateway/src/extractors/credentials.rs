use crate::authority::Credentials;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use std::convert::Infallible;

#[async_trait]
impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Credentials {
            cookie: parts.headers.get(COOKIE).cloned(),
            authorization: parts.headers.get(AUTHORIZATION).cloned(),
        })
    }
}
