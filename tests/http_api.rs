#![allow(clippy::unwrap_used, clippy::expect_used)]

use accountdeck_lib::auth::create_user;
use accountdeck_lib::{db, http, AppState, Config};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Server {
    base: String,
    client: reqwest::Client,
    stop: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl Server {
    async fn start(login_enabled: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::for_db(dir.path().join("deck.sqlite3"));
        config.login_enabled = login_enabled;
        config.password_iterations = 1_000;
        let pool = db::open_store(&config).await.expect("open store");
        if login_enabled {
            create_user(&pool, "admin", "hunter2", true, config.password_iterations)
                .await
                .expect("seed user");
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(http::serve(listener, AppState::new(pool, config), async move {
            let _ = stopped.await;
        }));

        Server {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            stop: Some(stop),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let resp = req.send().await.expect("request");
        let status = resp.status();
        let text = resp.text().await.expect("body");
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).expect("json body")
        };
        (status, body)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(self.url(path)).json(&body)).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(self.client.get(self.url(path))).await
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[tokio::test]
async fn health_and_empty_listing() {
    let server = Server::start(false).await;
    let (status, body) = server.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, body) = server.get("/apps").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn crud_link_and_listing_round() {
    let server = Server::start(false).await;

    let (status, mail) = server
        .post("/apps", json!({ "name": "Mail", "folder": "Work" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, chat) = server
        .post("/apps", json!({ "name": "Chat", "folder": "Work", "order": 1 }))
        .await;
    let (status, account) = server.post("/accounts", json!({ "name": "a@x" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, err) = server.post("/apps", json!({ "name": "Mail" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "CATALOG/CONFLICT");

    let (status, err) = server.post("/accounts", json!({ "name": " " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "CATALOG/VALIDATION");

    let (status, _) = server.post("/accounts", json!({ "nom": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for app in [&mail, &chat] {
        let link = json!({ "app_id": app["id"], "account_id": account["id"] });
        let (status, body) = server.post("/accounts/link", link.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "changed": true }));
        let (_, body) = server.post("/accounts/link", link).await;
        assert_eq!(body, json!({ "changed": false }));
    }

    let (status, err) = server
        .post("/accounts/link", json!({ "app_id": mail["id"], "account_id": 999 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "CATALOG/NOT_FOUND");

    let (status, listing) = server.get("/apps").await;
    assert_eq!(status, StatusCode::OK);
    let work = listing["Work"].as_array().expect("Work folder");
    assert_eq!(work.len(), 2);
    assert_eq!(work[0]["name"], "Mail");
    assert_eq!(work[1]["name"], "Chat");
    assert_eq!(work[0]["accounts"][0]["name"], "a@x");

    let chat_path = format!("/apps/{}", chat["id"]);
    let resp = server
        .send(
            server
                .client
                .put(server.url(&chat_path))
                .json(&json!({ "order": 0, "is_hidden": true })),
        )
        .await;
    assert_eq!(resp.0, StatusCode::OK);
    assert_eq!(resp.1["is_hidden"], true);

    let (status, err) = server
        .send(
            server
                .client
                .put(server.url("/accounts/4242"))
                .json(&json!({ "order": 0, "is_hidden": false })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["context"]["id"], "4242");

    let (status, edited) = server
        .send(
            server
                .client
                .patch(server.url(&format!("/accounts/{}", account["id"])))
                .json(&json!({ "abbreviation": "AX" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["abbreviation"], "AX");

    let (_, apps) = server.get(&format!("/accounts/{}/apps", account["id"])).await;
    assert_eq!(apps.as_array().map(Vec::len), Some(2));

    let (status, outcome) = server
        .send(server.client.delete(server.url(&format!("/apps/{}", mail["id"]))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "removed": true, "links_removed": 1 }));

    let (_, listing) = server.get("/apps").await;
    assert_eq!(listing, json!({}));

    let (_, data) = server.get("/manage/data").await;
    assert_eq!(data["apps"].as_array().map(Vec::len), Some(1));
    assert_eq!(data["accounts"].as_array().map(Vec::len), Some(1));
    assert_eq!(data["links"].as_array().map(Vec::len), Some(1));

    let (status, body) = server
        .post("/accounts/unlink", json!({ "app_id": chat["id"], "account_id": account["id"] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "changed": true }));
}

#[tokio::test]
async fn login_disabled_reports_disabled() {
    let server = Server::start(false).await;
    let (status, err) = server
        .post("/login", json!({ "username": "admin", "password": "hunter2" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "AUTH/DISABLED");
}

#[tokio::test]
async fn login_gates_management_routes() {
    let server = Server::start(true).await;

    let (status, _) = server.get("/apps").await;
    assert_eq!(status, StatusCode::OK, "public listing stays open");

    let (status, err) = server.get("/manage/data").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["code"], "AUTH/UNAUTHORIZED");

    let (status, _) = server.post("/accounts", json!({ "name": "a@x" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .post("/login", json!({ "username": "admin", "password": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, session) = server
        .post("/login", json!({ "username": "admin", "password": "hunter2" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["username"], "admin");
    assert!(session["user"].get("password_hash").is_none());
    let token = session["token"].as_str().expect("token").to_string();

    let (status, _) = server
        .send(
            server
                .client
                .post(server.url("/accounts"))
                .bearer_auth(&token)
                .json(&json!({ "name": "a@x" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = server
        .send(server.client.post(server.url("/logout")).bearer_auth(&token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server
        .send(server.client.post(server.url("/logout")).bearer_auth(&token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = server
        .send(server.client.get(server.url("/manage/data")).bearer_auth(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
