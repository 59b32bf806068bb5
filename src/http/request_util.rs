use failure::Error as FailureError;
use failure::Fail;
use futures::future::IntoFuture;
use futures::{Future, Stream};
use hyper;
use serde::{Deserialize, Serialize};
use serde_json;

use super::ControllerFuture;
use errors::Error;

/// Reads request body into a string
pub fn read_body(body: hyper::Body) -> Box<Future<Item = String, Error = hyper::Error>> {
    Box::new(body.concat2().map(|chunk| String::from_utf8_lossy(&chunk).to_string()))
}

/// Reads request body and deserializes it from json
pub fn parse_body<T>(body: hyper::Body) -> Box<Future<Item = T, Error = FailureError>>
where
    T: for<'de> Deserialize<'de> + 'static,
{
    Box::new(
        read_body(body)
            .map_err(|e| FailureError::from(e.context(Error::Parse)))
            .and_then(|s| {
                serde_json::from_str::<T>(&s)
                    .map_err(move |e| FailureError::from(e.context(format!("Parsing body {} failed!", s)).context(Error::Parse)))
            }),
    )
}

/// Serializes the result of a future into a json response body
pub fn serialize_future<T, E, F>(f: F) -> ControllerFuture
where
    F: IntoFuture<Item = T, Error = E> + 'static,
    E: Into<FailureError> + 'static,
    T: Serialize + 'static,
{
    Box::new(f.into_future().map_err(E::into).and_then(|resp| {
        serde_json::to_string(&resp)
            .map_err(|e| FailureError::from(e.context("Serialization of the response failed")))
    }))
}
