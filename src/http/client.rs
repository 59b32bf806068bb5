//! Outbound http client. Requests are funneled through a bounded channel
//! into a stream that must be spawned on the reactor core, so that any
//! thread holding a `ClientHandle` can issue requests.

use futures::future;
use futures::future::{loop_fn, Loop};
use futures::sync::{mpsc, oneshot};
use futures::{Future, Sink, Stream};
use hyper;
use hyper::client::{HttpConnector, Request};
use hyper::header::{ContentLength, ContentType, Headers};
use hyper::{Method, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use serde::Deserialize;
use serde_json;
use tokio_core::reactor::Handle;

use config;

pub type ClientResult = Result<String, Error>;

#[derive(Debug, Clone, Fail)]
pub enum Error {
    #[fail(display = "http client error - network failure: {}", _0)]
    Network(String),
    #[fail(display = "http client error - response parse failure: {}", _0)]
    Parse(String),
    #[fail(display = "http client error - api responded {}: {}", _0, _1)]
    Api(StatusCode, String),
}

struct Payload {
    url: String,
    method: Method,
    body: Option<String>,
    headers: Option<Headers>,
    callback: oneshot::Sender<ClientResult>,
}

pub struct Client {
    client: hyper::Client<HttpsConnector<HttpConnector>>,
    tx: mpsc::Sender<Payload>,
    rx: mpsc::Receiver<Payload>,
    buffer_size: usize,
    max_retries: usize,
}

impl Client {
    pub fn new(config: &config::Client, handle: &Handle) -> Self {
        let (tx, rx) = mpsc::channel::<Payload>(config.http_client_buffer_size);
        let connector =
            HttpsConnector::new(config.dns_worker_thread_count, handle).expect("Unable to create HttpsConnector");
        let client = hyper::Client::configure().connector(connector).build(handle);
        Client {
            client,
            tx,
            rx,
            buffer_size: config.http_client_buffer_size,
            max_retries: config.http_client_retries,
        }
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            tx: self.tx.clone(),
            max_retries: self.max_retries,
        }
    }

    /// Stream that performs the actual requests. Must be spawned on the core.
    pub fn stream(self) -> Box<Stream<Item = (), Error = ()>> {
        let Client {
            client,
            rx,
            buffer_size,
            ..
        } = self;
        Box::new(
            rx.map(move |payload| Client::send_request(&client, payload))
                .buffer_unordered(buffer_size),
        )
    }

    fn send_request(
        client: &hyper::Client<HttpsConnector<HttpConnector>>,
        payload: Payload,
    ) -> Box<Future<Item = (), Error = ()>> {
        let Payload {
            url,
            method,
            body,
            headers,
            callback,
        } = payload;

        debug!("Starting outbound request: {} {}", method, url);

        let uri = match url.parse::<Uri>() {
            Ok(uri) => uri,
            Err(e) => {
                let _ = callback.send(Err(Error::Network(format!("Malformed url {}: {}", url, e))));
                return Box::new(future::ok(()));
            }
        };

        let mut req = Request::new(method, uri);
        if let Some(headers) = headers {
            *req.headers_mut() = headers;
        }
        req.headers_mut().set(ContentType::json());
        if let Some(body) = body {
            req.headers_mut().set(ContentLength(body.len() as u64));
            req.set_body(body);
        }

        let fut = client
            .request(req)
            .map_err(|e| Error::Network(format!("{}", e)))
            .and_then(|res| {
                let status = res.status();
                res.body()
                    .concat2()
                    .map_err(|e| Error::Network(format!("{}", e)))
                    .map(move |chunk| (status, chunk))
            })
            .and_then(|(status, chunk)| {
                let body = String::from_utf8_lossy(&chunk).to_string();
                if status.is_success() {
                    Ok(body)
                } else {
                    Err(Error::Api(status, body))
                }
            })
            .then(move |result| {
                let _ = callback.send(result);
                Ok(())
            });

        Box::new(fut)
    }
}

/// Sending side of the client, cheap to clone and `Send`
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<Payload>,
    max_retries: usize,
}

pub trait HttpClient: Send + Sync + 'static {
    fn request_json<T>(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: Option<Headers>,
    ) -> Box<Future<Item = T, Error = Error> + Send>
    where
        T: for<'de> Deserialize<'de> + Send + 'static;
}

impl ClientHandle {
    pub fn request(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: Option<Headers>,
    ) -> Box<Future<Item = String, Error = Error> + Send> {
        let max_retries = self.max_retries;
        let tx = self.tx.clone();

        let fut = loop_fn((tx, 0_usize), move |(tx, attempt)| {
            let (callback_tx, callback_rx) = oneshot::channel::<ClientResult>();
            let payload = Payload {
                url: url.clone(),
                method: method.clone(),
                body: body.clone(),
                headers: headers.clone(),
                callback: callback_tx,
            };

            tx.send(payload)
                .map_err(|e| Error::Network(format!("Unable to enqueue request: {}", e)))
                .and_then(move |tx| {
                    callback_rx
                        .map_err(|e| Error::Network(format!("Request was dropped by the client stream: {}", e)))
                        .and_then(|result| result)
                        .then(move |result| match result {
                            Ok(response) => Ok(Loop::Break(response)),
                            // only network failures are retried, api responses are final
                            Err(Error::Network(message)) => {
                                if attempt < max_retries {
                                    warn!("Retrying request after network failure: {}", message);
                                    Ok(Loop::Continue((tx, attempt + 1)))
                                } else {
                                    Err(Error::Network(message))
                                }
                            }
                            Err(e) => Err(e),
                        })
                })
        });

        Box::new(fut)
    }
}

impl HttpClient for ClientHandle {
    fn request_json<T>(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: Option<Headers>,
    ) -> Box<Future<Item = T, Error = Error> + Send>
    where
        T: for<'de> Deserialize<'de> + Send + 'static,
    {
        Box::new(self.request(method, url, body, headers).and_then(|response| {
            let body = if response.is_empty() { "null".to_string() } else { response };
            serde_json::from_str::<T>(&body).map_err(move |e| Error::Parse(format!("{} in response {}", e, body)))
        }))
    }
}
