//! reqwest implementation of the backend services.
//!
//! Non-2xx responses become `ConsoleError::Rejected` with the `msg` field
//! of the error body; anything that prevents a usable response becomes
//! `ConsoleError::Transport`.

use anyhow::{bail, Context, Result};
use reqwest::{Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{ManagementApi, NodeApi};
use crate::config::ApiConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{Farm, NodeConfiguration, Zone};
use crate::session::{Session, Tokens};

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ErrorBody {
    msg: Option<String>,
}

#[derive(Deserialize)]
struct FarmEnvelope {
    farm: Farm,
}

#[derive(Deserialize)]
struct ZoneEnvelope {
    zone: Zone,
}

#[derive(Deserialize)]
struct NodeEnvelope {
    node: NodeConfiguration,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration, session: Session) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("irrigation-console/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;

        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid backend url: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("backend url {base_url} cannot carry a path");
        }

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn from_config(api: &ApiConfig, session: Session) -> Result<Self> {
        Self::new(&api.base_url, Duration::from_secs(api.timeout_secs), session)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Exchange credentials for tokens and store them in the session.
    pub async fn login(&self, username: &str, password: &str) -> ConsoleResult<()> {
        let body = json!({ "username": username, "password": password });
        let tokens: Tokens = self
            .fetch(Method::POST, &["auth", "login"], Some(&body))
            .await?;
        self.session.store(tokens).await;
        info!(username, "logged in");
        Ok(())
    }

    pub async fn logout(&self) {
        self.session.clear().await;
        info!("logged out");
    }

    /// The base URL extended by `segments`, each percent-encoded. An empty
    /// last segment leaves a trailing slash.
    fn url(&self, segments: &[&str]) -> ConsoleResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ConsoleError::Transport(format!("{} has no path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> ConsoleResult<Response> {
        let url = self.url(segments)?;
        let path = url.path().to_string();
        let mut req = self.http.request(method.clone(), url);
        if let Some(token) = self.session.access_token().await {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!(%method, %path, "request");
        let resp = req.send().await.map_err(|e| transport(&method, &path, e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let msg = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.msg)
            .unwrap_or_else(|| format!("{method} {path} was rejected ({status})"));
        warn!(%method, %path, %status, %msg, "backend rejected request");
        Err(ConsoleError::Rejected(msg))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> ConsoleResult<T> {
        let resp = self.send(method.clone(), segments, body).await?;
        let path = resp.url().path().to_string();
        resp.json::<T>()
            .await
            .map_err(|e| transport(&method, &path, e))
    }
}

fn transport(method: &Method, path: &str, err: reqwest::Error) -> ConsoleError {
    warn!(%method, path, error = %err, "request failed");
    ConsoleError::Transport(format!("{method} {path}: {err}"))
}

fn to_body<T: serde::Serialize>(value: &T) -> ConsoleResult<Value> {
    serde_json::to_value(value).map_err(|e| ConsoleError::Transport(format!("encode body: {e}")))
}

// ---------------------------------------------------------------------------
// Service implementations
// ---------------------------------------------------------------------------

impl ManagementApi for HttpClient {
    async fn list_farms(&self) -> ConsoleResult<Vec<Farm>> {
        self.fetch(Method::GET, &["api", "management", "farms"], None)
            .await
    }

    async fn list_zones(&self, farm_id: &str) -> ConsoleResult<Vec<Zone>> {
        let segments = ["api", "management", "farms", farm_id, "zones"];
        self.fetch(Method::GET, &segments, None).await
    }

    async fn create_farm(&self, farm: &Farm) -> ConsoleResult<Farm> {
        let body = to_body(farm)?;
        let env: FarmEnvelope = self
            .fetch(Method::POST, &["api", "management", "farms"], Some(&body))
            .await?;
        Ok(env.farm)
    }

    async fn create_zone(&self, farm_id: &str, zone: &Zone) -> ConsoleResult<Zone> {
        let body = to_body(&Zone {
            farm_id: Some(farm_id.to_string()),
            ..zone.clone()
        })?;
        let env: ZoneEnvelope = self
            .fetch(Method::POST, &["api", "management", "zones"], Some(&body))
            .await?;
        Ok(env.zone)
    }
}

impl NodeApi for HttpClient {
    async fn list_nodes(&self) -> ConsoleResult<Vec<NodeConfiguration>> {
        self.fetch(Method::GET, &["api", "nodes", ""], None).await
    }

    async fn create_node(&self, doc: &NodeConfiguration) -> ConsoleResult<NodeConfiguration> {
        let body = to_body(doc)?;
        let env: NodeEnvelope = self
            .fetch(Method::POST, &["api", "nodes", ""], Some(&body))
            .await?;
        Ok(env.node)
    }

    async fn update_node(
        &self,
        node_id: &str,
        doc: &NodeConfiguration,
    ) -> ConsoleResult<NodeConfiguration> {
        let body = to_body(doc)?;
        let env: NodeEnvelope = self
            .fetch(Method::PUT, &["api", "nodes", node_id], Some(&body))
            .await?;
        Ok(env.node)
    }

    async fn delete_node(&self, node_id: &str) -> ConsoleResult<()> {
        self.send(Method::DELETE, &["api", "nodes", node_id], None)
            .await?;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};

    const TOKEN: &str = "tok-1";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {TOKEN}"))
            .unwrap_or(false)
    }

    fn unauthorized() -> axum::response::Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"msg": "Missing Authorization Header"})),
        )
            .into_response()
    }

    async fn login(Json(body): Json<Value>) -> axum::response::Response {
        if body["password"] == "secret" {
            Json(json!({"access_token": TOKEN, "refresh_token": "ref-1"})).into_response()
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"msg": "Bad username or password"})),
            )
                .into_response()
        }
    }

    async fn farms(headers: HeaderMap) -> axum::response::Response {
        if !authorized(&headers) {
            return unauthorized();
        }
        Json(json!([{"farmId": "FARM001", "name": "Farm One"}])).into_response()
    }

    async fn zones(Path(farm_id): Path<String>) -> Json<Value> {
        Json(json!([{"zoneId": "ZONE01", "name": "North", "farmId": farm_id}]))
    }

    async fn create_farm(Json(body): Json<Value>) -> axum::response::Response {
        if body["farmId"] == "FARM001" {
            return (
                StatusCode::CONFLICT,
                Json(json!({"msg": "Farm FARM001 already exists"})),
            )
                .into_response();
        }
        (StatusCode::CREATED, Json(json!({ "farm": body }))).into_response()
    }

    async fn create_zone(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({ "zone": body }))
    }

    async fn update_node(Path(node_id): Path<String>, Json(mut body): Json<Value>) -> Json<Value> {
        body["identity"]["nodeId"] = json!(node_id);
        Json(json!({ "node": body }))
    }

    async fn list_nodes() -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "<html>boom</html>").into_response()
    }

    async fn delete_node() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    async fn spawn_backend() -> String {
        let router = Router::new()
            .route("/auth/login", post(login))
            .route("/api/management/farms", get(farms).post(create_farm))
            .route("/api/management/farms/{farm_id}/zones", get(zones))
            .route("/api/management/zones", post(create_zone))
            .route("/api/nodes/", get(list_nodes))
            .route("/api/nodes/{node_id}", put(update_node).delete(delete_node));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn client(base_url: &str, session: Session) -> HttpClient {
        HttpClient::new(base_url, Duration::from_secs(5), session).unwrap()
    }

    fn sample_node() -> NodeConfiguration {
        serde_json::from_value(json!({
            "identity": {
                "farmId": "FARM001", "zoneId": "ZONE01", "nodeId": "NODE_01", "isMaster": true
            },
            "mac_address": "AA:BB"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn login_stores_token_used_on_later_requests() {
        let base = spawn_backend().await;
        let api = client(&base, Session::anonymous());

        let err = api.list_farms().await.unwrap_err();
        assert_eq!(err, ConsoleError::Rejected("Missing Authorization Header".into()));

        api.login("operator", "secret").await.unwrap();
        assert!(api.session().is_authenticated().await);

        let farms = api.list_farms().await.unwrap();
        assert_eq!(farms[0].farm_id, "FARM001");
    }

    #[tokio::test]
    async fn failed_login_surfaces_backend_message() {
        let base = spawn_backend().await;
        let api = client(&base, Session::anonymous());

        let err = api.login("operator", "wrong").await.unwrap_err();
        assert_eq!(err, ConsoleError::Rejected("Bad username or password".into()));
        assert!(!api.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn logout_drops_credentials() {
        let base = spawn_backend().await;
        let api = client(&base, Session::with_token(TOKEN));
        api.list_farms().await.unwrap();

        api.logout().await;
        assert!(api.list_farms().await.is_err());
    }

    #[tokio::test]
    async fn envelopes_are_unwrapped() {
        let base = spawn_backend().await;
        let api = client(&base, Session::with_token(TOKEN));

        let farm = api
            .create_farm(&Farm {
                farm_id: "FARM002".into(),
                name: "FARM002".into(),
            })
            .await
            .unwrap();
        assert_eq!(farm.farm_id, "FARM002");

        let zone = api
            .create_zone(
                "FARM002",
                &Zone {
                    zone_id: "ZONE09".into(),
                    name: "ZONE09".into(),
                    farm_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(zone.farm_id.as_deref(), Some("FARM002"));

        let zones = api.list_zones("FARM002").await.unwrap();
        assert_eq!(zones[0].farm_id.as_deref(), Some("FARM002"));
    }

    #[tokio::test]
    async fn duplicate_farm_is_a_rejection() {
        let base = spawn_backend().await;
        let api = client(&base, Session::with_token(TOKEN));
        let err = api
            .create_farm(&Farm {
                farm_id: "FARM001".into(),
                name: "FARM001".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, ConsoleError::Rejected("Farm FARM001 already exists".into()));
    }

    #[tokio::test]
    async fn update_is_keyed_by_path_id() {
        let base = spawn_backend().await;
        let api = client(&base, Session::with_token(TOKEN));
        let node = api.update_node("NODE_77", &sample_node()).await.unwrap();
        assert_eq!(node.identity.node_id, "NODE_77");
    }

    #[tokio::test]
    async fn ids_are_sent_as_single_path_segments() {
        let base = spawn_backend().await;
        let api = client(&base, Session::with_token(TOKEN));
        let node = api.update_node("A/B?c#d", &sample_node()).await.unwrap();
        assert_eq!(node.identity.node_id, "A/B?c#d");

        let zones = api.list_zones("FARM 1/x").await.unwrap();
        assert_eq!(zones[0].farm_id.as_deref(), Some("FARM 1/x"));
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        let api = client("http://backend.local/irrigation/", Session::anonymous());
        let url = api.url(&["api", "nodes", ""]).unwrap();
        assert_eq!(url.as_str(), "http://backend.local/irrigation/api/nodes/");

        let url = api.url(&["api", "nodes", "N/1"]).unwrap();
        assert_eq!(url.path(), "/irrigation/api/nodes/N%2F1");
    }

    #[tokio::test]
    async fn rejection_without_json_body_gets_generic_message() {
        let base = spawn_backend().await;
        let api = client(&base, Session::with_token(TOKEN));
        let err = api.list_nodes().await.unwrap_err();
        match err {
            ConsoleError::Rejected(msg) => {
                assert!(msg.starts_with("GET /api/nodes/ was rejected (500"), "got: {msg}")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let base = spawn_backend().await;
        let api = client(&base, Session::with_token(TOKEN));
        api.delete_node("NODE_01").await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(&format!("http://{addr}"), Session::anonymous());
        let err = api.list_farms().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Transport(_)), "got {err:?}");
    }
}
