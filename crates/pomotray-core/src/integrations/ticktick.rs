//! TickTick habit check-ins through the web API, authenticated with the
//! browser session cookie.

use serde::Deserialize;
use serde_json::json;
use tracing::info;
use url::Url;

use super::http::HttpExecutor;
use super::traits::HabitGateway;
use crate::error::GatewayError;

const SERVICE: &str = "ticktick";

#[derive(Deserialize)]
struct Habit {
    id: String,
    name: String,
}

pub struct TickTickHabits {
    api_base: Url,
    cookie: String,
    http: HttpExecutor,
}

impl TickTickHabits {
    pub fn new(api_base: &str, cookie: String, http: HttpExecutor) -> Result<Self, GatewayError> {
        let api_base = Url::parse(api_base).map_err(|e| GatewayError::Http {
            service: SERVICE,
            message: format!("invalid URL '{api_base}': {e}"),
        })?;
        Ok(Self {
            api_base,
            cookie,
            http,
        })
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        self.api_base.join(path).map_err(|e| GatewayError::Http {
            service: SERVICE,
            message: e.to_string(),
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Cookie", format!("t={}", self.cookie))
    }

    fn habit_id(&self, name: &str) -> Result<String, GatewayError> {
        let request = self.request(self.http.client().get(self.url("/api/v2/habits")?));
        let (status, habits, text) = self
            .http
            .send_json::<Vec<Habit>>(request)
            .map_err(|e| GatewayError::Http {
                service: SERVICE,
                message: e.to_string(),
            })?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }
        habits
            .unwrap_or_default()
            .into_iter()
            .find(|h| h.name == name)
            .map(|h| h.id)
            .ok_or_else(|| GatewayError::HabitNotFound(name.to_string()))
    }
}

impl HabitGateway for TickTickHabits {
    fn check_in(&self, habit: &str, date_stamp: &str, value: u32) -> Result<(), GatewayError> {
        let habit_id = self.habit_id(habit)?;
        let stamp: u64 = date_stamp.parse().map_err(|_| GatewayError::Http {
            service: SERVICE,
            message: format!("invalid date stamp '{date_stamp}'"),
        })?;
        let body = json!({
            "add": [{
                "habitId": habit_id,
                "checkinStamp": stamp,
                "status": value,
            }],
            "update": [],
            "delete": [],
        });
        let request = self.request(
            self.http
                .client()
                .post(self.url("/api/v2/habitCheckins/batch")?)
                .json(&body),
        );
        let response = self.http.send(request).map_err(|e| GatewayError::Http {
            service: SERVICE,
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: self.http.text(response),
            });
        }
        info!(%habit, %date_stamp, "habit checked in");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn habits(server: &mockito::Server) -> TickTickHabits {
        TickTickHabits::new(&server.url(), "cookie123".into(), HttpExecutor::new().unwrap()).unwrap()
    }

    #[test]
    fn checks_in_habit_by_name() {
        let mut server = mockito::Server::new();
        let list = server
            .mock("GET", "/api/v2/habits")
            .match_header("cookie", "t=cookie123")
            .with_status(200)
            .with_body(r#"[{"id": "h1", "name": "Read"}, {"id": "h2", "name": "Deep Work"}]"#)
            .create();
        let batch = server
            .mock("POST", "/api/v2/habitCheckins/batch")
            .match_body(Matcher::PartialJson(json!({
                "add": [{"habitId": "h2", "checkinStamp": 20240601, "status": 2}]
            })))
            .with_status(200)
            .with_body("{}")
            .create();

        habits(&server).check_in("Deep Work", "20240601", 2).unwrap();
        list.assert();
        batch.assert();
    }

    #[test]
    fn unknown_habit_is_an_error() {
        let mut server = mockito::Server::new();
        let _list = server
            .mock("GET", "/api/v2/habits")
            .with_status(200)
            .with_body(r#"[{"id": "h1", "name": "Read"}]"#)
            .create();
        assert!(matches!(
            habits(&server).check_in("Deep Work", "20240601", 2),
            Err(GatewayError::HabitNotFound(name)) if name == "Deep Work"
        ));
    }

    #[test]
    fn expired_cookie_reports_status() {
        let mut server = mockito::Server::new();
        let _list = server.mock("GET", "/api/v2/habits").with_status(401).create();
        assert!(matches!(
            habits(&server).check_in("Deep Work", "20240601", 2),
            Err(GatewayError::Status { status: 401, .. })
        ));
    }
}
