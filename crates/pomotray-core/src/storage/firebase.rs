//! Firebase Realtime Database store over its REST API.
//!
//! `GET`/`PUT`/`PATCH` on `{db_url}/{path}.json`, optionally authenticated
//! with a database secret or ID token passed as `?auth=`.

use serde_json::{Map, Value};
use url::Url;

use super::{segments, PersistenceStore};
use crate::error::StoreError;
use crate::integrations::http::HttpExecutor;

pub struct FirebaseStore {
    base: Url,
    auth: Option<String>,
    http: HttpExecutor,
}

impl FirebaseStore {
    /// # Errors
    /// Returns an error if `db_url` is not an absolute http(s) URL.
    pub fn new(db_url: &str, auth: Option<String>, http: HttpExecutor) -> Result<Self, StoreError> {
        let base = Url::parse(db_url).map_err(|e| StoreError::Http {
            path: db_url.to_string(),
            message: format!("invalid database URL: {e}"),
        })?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Http {
                path: db_url.to_string(),
                message: "database URL cannot be a base".into(),
            });
        }
        Ok(Self {
            base,
            auth: auth.filter(|a| !a.is_empty()),
            http,
        })
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let parts: Vec<&str> = segments(path).collect();
        if let Ok(mut segs) = url.path_segments_mut() {
            segs.pop_if_empty();
            match parts.split_last() {
                Some((last, init)) => {
                    segs.extend(init);
                    segs.push(&format!("{last}.json"));
                }
                None => {
                    segs.push(".json");
                }
            }
        }
        if let Some(auth) = &self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        url
    }

    fn execute(&self, path: &str, request: reqwest::RequestBuilder) -> Result<String, StoreError> {
        let response = self.http.send(request).map_err(|e| StoreError::Http {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(self.http.text(response))
    }
}

impl PersistenceStore for FirebaseStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let body = self.execute(path, self.http.client().get(self.url(path)))?;
        let value: Value = serde_json::from_str(&body).map_err(|e| StoreError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Ok((!value.is_null()).then_some(value))
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.execute(path, self.http.client().put(self.url(path)).json(&value))?;
        Ok(())
    }

    fn update_field(&self, path: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut body = Map::new();
        body.insert(key.to_string(), value);
        self.execute(path, self.http.client().patch(self.url(path)).json(&body))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn store(server: &mockito::Server, auth: Option<&str>) -> FirebaseStore {
        FirebaseStore::new(
            &server.url(),
            auth.map(str::to_string),
            HttpExecutor::new().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn get_decodes_document() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/pomodoro/settings.json")
            .match_query(Matcher::UrlEncoded("auth".into(), "secret".into()))
            .with_status(200)
            .with_body(r#"{"work_timer": 30}"#)
            .create();

        let value = store(&server, Some("secret")).get("pomodoro/settings").unwrap();
        assert_eq!(value, Some(json!({"work_timer": 30})));
        mock.assert();
    }

    #[test]
    fn null_body_means_absent() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/missing.json")
            .with_status(200)
            .with_body("null")
            .create();
        assert_eq!(store(&server, None).get("missing").unwrap(), None);
    }

    #[test]
    fn update_field_patches_single_key() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PATCH", "/time_done/2024-02-03.json")
            .match_body(Matcher::Json(json!({"time_worked": 4})))
            .with_status(200)
            .with_body(r#"{"time_worked": 4}"#)
            .create();

        store(&server, None)
            .update_field("time_done/2024-02-03", "time_worked", json!(4))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn set_puts_whole_value() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/s.json")
            .match_body(Matcher::Json(json!({"a": 1})))
            .with_status(200)
            .with_body(r#"{"a": 1}"#)
            .create();
        store(&server, None).set("s", json!({"a": 1})).unwrap();
        mock.assert();
    }

    #[test]
    fn error_status_is_reported() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/s.json").with_status(401).create();
        assert!(matches!(
            store(&server, None).get("s"),
            Err(StoreError::Status { status: 401, .. })
        ));
    }

    #[test]
    fn rejects_relative_url() {
        let result = FirebaseStore::new("not a url", None, HttpExecutor::new().unwrap());
        assert!(result.is_err());
    }
}
