//! Thin http layer glue: the `Application` adapter between hyper and the
//! `Controller`, plus the outbound client and body helpers.

pub mod client;
pub mod errors;
pub mod request_util;

use std::marker::PhantomData;

use failure::{Context, Error as FailureError, Fail};
use futures::{future, Future};
use hyper;
use hyper::header::{ContentLength, ContentType};
use hyper::server::{Request, Response, Service};
use hyper::StatusCode;
use serde_json;

use self::errors::{Codeable, ErrorMessage, PayloadCarrier};

/// Future that controllers return
pub type ControllerFuture = Box<Future<Item = String, Error = FailureError>>;

/// Controller handles route parsing and calling `Service` layer
pub trait Controller {
    fn call(&self, request: Request) -> ControllerFuture;
}

/// Application that converts controller output into http responses.
/// `E` is the error type that carries status codes for the response.
pub struct Application<E: Fail + Codeable + PayloadCarrier> {
    controller: Box<Controller>,
    _error_type: PhantomData<E>,
}

impl<E: Fail + Codeable + PayloadCarrier + 'static> Application<E> {
    pub fn new<C: Controller + 'static>(controller: C) -> Self {
        Application {
            controller: Box::new(controller),
            _error_type: PhantomData,
        }
    }

    fn response_with_json(body: String) -> Response {
        Response::new()
            .with_status(StatusCode::Ok)
            .with_header(ContentType::json())
            .with_header(ContentLength(body.len() as u64))
            .with_body(body)
    }

    fn response_with_error(error: &FailureError) -> Response {
        // the error marker may sit in the chain bare or wrapped in a Context
        let found = error
            .iter_chain()
            .filter_map(|fail| {
                fail.downcast_ref::<E>()
                    .or_else(|| fail.downcast_ref::<Context<E>>().map(|ctx| ctx.get_context()))
            })
            .next();

        let (code, description, payload) = match found {
            Some(e) => (e.code(), format!("{}", e), e.payload()),
            None => (StatusCode::InternalServerError, "Internal server error".to_string(), None),
        };

        error!("Error {} occurred: {:?}", code, error);

        let message = ErrorMessage {
            code: code.as_u16(),
            description,
            payload,
        };

        let body = serde_json::to_string(&message).unwrap_or_else(|_| format!("{{\"code\":{}}}", message.code));
        Response::new()
            .with_status(code)
            .with_header(ContentType::json())
            .with_header(ContentLength(body.len() as u64))
            .with_body(body)
    }
}

impl<E: Fail + Codeable + PayloadCarrier + 'static> Service for Application<E> {
    type Request = Request;
    type Response = Response;
    type Error = hyper::Error;
    type Future = Box<Future<Item = Response, Error = hyper::Error>>;

    fn call(&self, req: Request) -> Self::Future {
        debug!("Received request: {} {}", req.method(), req.path());
        Box::new(self.controller.call(req).then(|res| match res {
            Ok(data) => future::ok(Application::<E>::response_with_json(data)),
            Err(err) => future::ok(Application::<E>::response_with_error(&err)),
        }))
    }
}
