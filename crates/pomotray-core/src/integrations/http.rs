//! Shared HTTP plumbing for the remote store and service gateways.
//!
//! The timer runs on plain threads, so gateways block on a small private
//! tokio runtime for request/response calls and spawn onto it for
//! fire-and-forget calls.

use reqwest::{Client, RequestBuilder, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cheap to clone; all clones share one runtime and connection pool.
#[derive(Clone)]
pub struct HttpExecutor {
    runtime: Arc<Runtime>,
    client: Client,
}

impl HttpExecutor {
    /// # Errors
    /// Returns an error if the runtime or the TLS client cannot be built.
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("pomotray-http")
            .enable_all()
            .build()?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(std::io::Error::other)?;
        Ok(Self {
            runtime: Arc::new(runtime),
            client,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request and wait for the response.
    ///
    /// The request future is built inside the runtime; reqwest's timeout
    /// needs the reactor at construction time.
    pub fn send(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        self.runtime.block_on(async move { request.send().await })
    }

    /// Send a request and decode a JSON body.
    pub fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<(reqwest::StatusCode, Option<T>, String), reqwest::Error> {
        self.runtime.block_on(async move {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            let body = serde_json::from_str::<T>(&text).ok();
            Ok((status, body, text))
        })
    }

    /// Read the body of a response obtained from [`HttpExecutor::send`].
    pub fn text(&self, response: Response) -> String {
        self.runtime
            .block_on(async move { response.text().await })
            .unwrap_or_default()
    }

    /// Run a future in the background without waiting for it.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_works_from_a_plain_thread() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/ping").with_status(200).with_body("pong").create();

        let http = HttpExecutor::new().unwrap();
        let url = format!("{}/ping", server.url());
        let handle = std::thread::spawn(move || {
            let response = http.send(http.client().get(&url)).unwrap();
            let status = response.status();
            (status, http.text(response))
        });
        let (status, body) = handle.join().expect("sending must not panic");
        assert!(status.is_success());
        assert_eq!(body, "pong");
    }
}
