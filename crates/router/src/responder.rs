//! Response handling module that converts handler values into HTTP responses.
//!
//! This module provides the [`Responder`] trait which defines how different types
//! can be turned into a [`Response`], and the helpers used to build the common ones:
//! [`make_error`], [`make_redirect`] and [`json_response`].

use crate::body::ResponseBody;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::header::{HeaderValue, InvalidHeaderValue};
use http::StatusCode;
use serde::Serialize;
use std::convert::Infallible;

/// The response type committed by handlers.
pub type Response = http::Response<ResponseBody>;

/// A trait for types that can be converted into HTTP responses.
///
/// Anything implementing this trait can be handed to
/// [`RouteContext::respond`](crate::RouteContext::respond).
pub trait Responder {
    fn into_response(self) -> Response;
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(t) => t.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// None case returns an empty response.
impl<T: Responder> Responder for Option<T> {
    fn into_response(self) -> Response {
        match self {
            Some(t) => t.into_response(),
            None => Response::new(ResponseBody::empty()),
        }
    }
}

impl<B> Responder for http::Response<B>
where
    B: Into<ResponseBody>,
{
    fn into_response(self) -> Response {
        self.map(|b| b.into())
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn into_response(self) -> Response {
        let (status, responder) = self;
        let mut response = responder.into_response();
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for Box<T> {
    fn into_response(self) -> Response {
        (*self).into_response()
    }
}

impl Responder for StatusCode {
    fn into_response(self) -> Response {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = self;
        response
    }
}

impl Responder for () {
    fn into_response(self) -> Response {
        Response::new(ResponseBody::empty())
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response {
        plain_text(StatusCode::OK, ResponseBody::from(self))
    }
}

impl Responder for String {
    fn into_response(self) -> Response {
        plain_text(StatusCode::OK, ResponseBody::from(self))
    }
}

impl Responder for Bytes {
    fn into_response(self) -> Response {
        let mut response = Response::new(ResponseBody::from(self));
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        response
    }
}

impl Responder for Infallible {
    fn into_response(self) -> Response {
        match self {}
    }
}

const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";

fn plain_text(status: StatusCode, body: ResponseBody) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF_8));
    response
}

/// Builds a plain-text error response. An empty message yields an empty body.
pub fn make_error(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    if message.is_empty() {
        return status.into_response();
    }
    plain_text(status, ResponseBody::from(message))
}

/// Builds a redirect to `location`, with 307 Temporary Redirect unless told otherwise.
pub fn make_redirect(location: &str, status: Option<StatusCode>) -> Result<Response, InvalidHeaderValue> {
    let location = HeaderValue::try_from(location)?;
    let mut response = status.unwrap_or(StatusCode::TEMPORARY_REDIRECT).into_response();
    response.headers_mut().insert(LOCATION, location);
    Ok(response)
}

/// Serializes `value` as a JSON response.
pub fn json_response<T: Serialize + ?Sized>(value: &T) -> Result<Response, serde_json::Error> {
    let body = serde_json::to_vec(value)?;
    let length = body.len();

    let mut response = Response::new(ResponseBody::from(body));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}
