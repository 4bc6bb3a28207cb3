//! Spotify Web API playback on one named device.
//!
//! Authenticates with a long-lived refresh token; the access token is
//! refreshed before every call so the gateway never holds a stale one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use super::http::HttpExecutor;
use super::traits::PlaybackGateway;
use crate::error::GatewayError;
use crate::secrets::SpotifyCredentials;

const SERVICE: &str = "spotify";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Device {
    id: Option<String>,
    name: String,
}

#[derive(Deserialize)]
struct DevicesResponse {
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
}

pub struct SpotifyPlayback {
    api_base: Url,
    token_url: Url,
    credentials: SpotifyCredentials,
    device_id: String,
    http: HttpExecutor,
}

impl SpotifyPlayback {
    /// Connect and resolve the configured device.
    ///
    /// # Errors
    /// Fails when the token cannot be refreshed or the device is not listed.
    pub fn connect(
        api_base: &str,
        accounts_base: &str,
        credentials: SpotifyCredentials,
        http: HttpExecutor,
    ) -> Result<Self, GatewayError> {
        let api_base = parse_url(api_base)?;
        let token_url = parse_url(accounts_base)?
            .join("api/token")
            .map_err(|e| http_error(e.to_string()))?;
        let mut playback = Self {
            api_base,
            token_url,
            credentials,
            device_id: String::new(),
            http,
        };
        playback.device_id = playback.find_device()?;
        info!(device = %playback.credentials.device_name, "connected to Spotify");
        Ok(playback)
    }

    fn access_token(&self) -> Result<String, GatewayError> {
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));
        let request = self
            .http
            .client()
            .post(self.token_url.clone())
            .header("Authorization", format!("Basic {basic}"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ]);
        let token: TokenResponse = self.json(request)?;
        Ok(token.access_token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.api_base
            .join(path)
            .map_err(|e| http_error(e.to_string()))
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, GatewayError> {
        Ok(request.bearer_auth(self.access_token()?))
    }

    fn find_device(&self) -> Result<String, GatewayError> {
        let request = self.authorized(
            self.http
                .client()
                .get(self.endpoint("v1/me/player/devices")?),
        )?;
        let response: DevicesResponse = self.json(request)?;
        let wanted = &self.credentials.device_name;
        response
            .devices
            .iter()
            .find(|d| &d.name == wanted)
            .and_then(|d| d.id.clone())
            .ok_or_else(|| GatewayError::DeviceNotFound {
                name: wanted.clone(),
                available: response.devices.iter().map(|d| d.name.clone()).collect(),
            })
    }

    fn json<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let (status, body, text) = self
            .http
            .send_json::<T>(request)
            .map_err(|e| http_error(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }
        body.ok_or_else(|| http_error(format!("unexpected response body: {text}")))
    }

    /// Send a request whose response body does not matter.
    fn execute(&self, request: RequestBuilder) -> Result<(), GatewayError> {
        let response = self
            .http
            .send(request)
            .map_err(|e| http_error(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GatewayError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: self.http.text(response),
            })
        }
    }

    fn player_url(&self, action: &str) -> Result<Url, GatewayError> {
        let mut url = self.endpoint(&format!("v1/me/player/{action}"))?;
        url.query_pairs_mut().append_pair("device_id", &self.device_id);
        Ok(url)
    }
}

impl PlaybackGateway for SpotifyPlayback {
    fn play_playlist(&self, uri: &str) -> Result<(), GatewayError> {
        debug!(%uri, "starting playlist");
        let request = self.authorized(
            self.http
                .client()
                .put(self.player_url("play")?)
                .json(&json!({ "context_uri": uri })),
        )?;
        self.execute(request)
    }

    fn pause_playback(&self) -> Result<(), GatewayError> {
        if !self.currently_playing()? {
            debug!("nothing playing, not pausing");
            return Ok(());
        }
        let request = self.authorized(self.http.client().put(self.player_url("pause")?))?;
        self.execute(request)
    }

    fn currently_playing(&self) -> Result<bool, GatewayError> {
        let request = self.authorized(
            self.http
                .client()
                .get(self.endpoint("v1/me/player/currently-playing")?),
        )?;
        let response = self
            .http
            .send(request)
            .map_err(|e| http_error(e.to_string()))?;
        let status = response.status();
        // 204: no active playback at all.
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(false);
        }
        let text = self.http.text(response);
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }
        let playing: CurrentlyPlaying =
            serde_json::from_str(&text).map_err(|e| http_error(e.to_string()))?;
        Ok(playing.is_playing)
    }
}

fn parse_url(raw: &str) -> Result<Url, GatewayError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash).map_err(|e| http_error(format!("invalid URL '{raw}': {e}")))
}

fn http_error(message: String) -> GatewayError {
    GatewayError::Http {
        service: SERVICE,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Mock, ServerGuard};

    fn credentials() -> SpotifyCredentials {
        SpotifyCredentials {
            device_name: "Desk".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
        }
    }

    fn mock_token(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/api/token")
            .match_header("authorization", "Basic aWQ6c2VjcmV0")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token": "tok", "token_type": "Bearer"}"#)
            .expect_at_least(1)
            .create()
    }

    fn mock_devices(server: &mut ServerGuard) -> Mock {
        server
            .mock("GET", "/v1/me/player/devices")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"devices": [{"id": "d1", "name": "Phone"}, {"id": "d2", "name": "Desk"}]}"#)
            .create()
    }

    fn connect(server: &ServerGuard) -> Result<SpotifyPlayback, GatewayError> {
        SpotifyPlayback::connect(
            &server.url(),
            &server.url(),
            credentials(),
            HttpExecutor::new().unwrap(),
        )
    }

    #[test]
    fn connect_resolves_device_by_name() {
        let mut server = mockito::Server::new();
        let token = mock_token(&mut server);
        let devices = mock_devices(&mut server);
        let playback = connect(&server).unwrap();
        assert_eq!(playback.device_id, "d2");
        token.assert();
        devices.assert();
    }

    #[test]
    fn unknown_device_is_a_construction_error() {
        let mut server = mockito::Server::new();
        let _token = mock_token(&mut server);
        let _devices = server
            .mock("GET", "/v1/me/player/devices")
            .with_status(200)
            .with_body(r#"{"devices": [{"id": "d1", "name": "Phone"}]}"#)
            .create();
        match connect(&server) {
            Err(GatewayError::DeviceNotFound { name, available }) => {
                assert_eq!(name, "Desk");
                assert_eq!(available, vec!["Phone".to_string()]);
            }
            other => panic!("expected DeviceNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn play_playlist_targets_device() {
        let mut server = mockito::Server::new();
        let _token = mock_token(&mut server);
        let _devices = mock_devices(&mut server);
        let play = server
            .mock("PUT", "/v1/me/player/play")
            .match_query(Matcher::UrlEncoded("device_id".into(), "d2".into()))
            .match_body(Matcher::Json(json!({"context_uri": "spotify:playlist:x"})))
            .with_status(204)
            .create();

        let playback = connect(&server).unwrap();
        playback.play_playlist("spotify:playlist:x").unwrap();
        play.assert();
    }

    #[test]
    fn pause_skipped_when_nothing_plays() {
        let mut server = mockito::Server::new();
        let _token = mock_token(&mut server);
        let _devices = mock_devices(&mut server);
        let _playing = server
            .mock("GET", "/v1/me/player/currently-playing")
            .with_status(204)
            .create();
        let pause = server
            .mock("PUT", "/v1/me/player/pause")
            .match_query(Matcher::Any)
            .expect(0)
            .create();

        let playback = connect(&server).unwrap();
        playback.switch_to(None).unwrap();
        pause.assert();
    }

    #[test]
    fn pause_sent_when_playing() {
        let mut server = mockito::Server::new();
        let _token = mock_token(&mut server);
        let _devices = mock_devices(&mut server);
        let _playing = server
            .mock("GET", "/v1/me/player/currently-playing")
            .with_status(200)
            .with_body(r#"{"is_playing": true, "item": null}"#)
            .create();
        let pause = server
            .mock("PUT", "/v1/me/player/pause")
            .match_query(Matcher::UrlEncoded("device_id".into(), "d2".into()))
            .with_status(204)
            .create();

        let playback = connect(&server).unwrap();
        playback.pause_playback().unwrap();
        pause.assert();
    }

    #[test]
    fn token_failure_is_reported() {
        let mut server = mockito::Server::new();
        let _token = server
            .mock("POST", "/api/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create();
        assert!(matches!(
            connect(&server),
            Err(GatewayError::Status { status: 400, .. })
        ));
    }
}
