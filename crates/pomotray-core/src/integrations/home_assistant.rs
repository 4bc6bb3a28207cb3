//! Home Assistant webhooks -- one POST per state change, nobody waits.

use tracing::{debug, error};

use super::http::HttpExecutor;
use super::traits::WebhookGateway;

pub struct HomeAssistantWebhook {
    http: HttpExecutor,
}

impl HomeAssistantWebhook {
    pub fn new(http: HttpExecutor) -> Self {
        Self { http }
    }
}

impl WebhookGateway for HomeAssistantWebhook {
    fn trigger(&self, url: &str) {
        let request = self.http.client().post(url);
        let url = url.to_string();
        self.http.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => debug!(%url, "webhook triggered"),
                Ok(resp) => error!(%url, status = %resp.status(), "webhook rejected"),
                Err(e) => error!(%url, error = %e, "webhook failed"),
            }
        });
    }
}
