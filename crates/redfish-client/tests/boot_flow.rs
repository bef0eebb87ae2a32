//! Runs the virtual-media boot flow against a stub Redfish service.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use redfish_client::{RedfishClient, RedfishClientTrait, RedfishError};
use serde_json::{Value, json};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const IMAGE_URL: &str = "http://10.0.0.10:8000/rhel.iso";
const RESET_PATH: &str = "/redfish/v1/Systems/1/Actions/ComputerSystem.Reset";

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    body: Value,
    authorization: Option<String>,
}

/// A one-system Redfish service with a CD slot on the system or the manager
#[derive(Debug, Clone)]
struct StubRedfish {
    requests: Arc<Mutex<Vec<Recorded>>>,
    media_on_system: bool,
    media_inserted: bool,
    reset_status: StatusCode,
    reject_with: Option<StatusCode>,
}

impl StubRedfish {
    fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            media_on_system: true,
            media_inserted: false,
            reset_status: StatusCode::NO_CONTENT,
            reject_with: None,
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    fn body_of(&self, method: &str, path: &str) -> Value {
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path == path)
            .map(|r| r.body)
            .unwrap_or_else(|| panic!("no {} {}", method, path))
    }

    fn resource(&self, path: &str) -> Option<Value> {
        let image = if self.media_inserted {
            json!("http://old/old.iso")
        } else {
            Value::Null
        };
        let cd = |id: &str| {
            json!({
                "@odata.id": id,
                "Id": "CD1",
                "MediaTypes": ["CD", "DVD"],
                "Inserted": self.media_inserted,
                "Image": image.clone(),
            })
        };
        let value = match path {
            "/redfish/v1/Systems" => json!({ "Members": [{ "@odata.id": "/redfish/v1/Systems/1" }] }),
            "/redfish/v1/Systems/1" => {
                let mut system = json!({
                    "@odata.id": "/redfish/v1/Systems/1",
                    "Id": "1",
                    "Actions": { "#ComputerSystem.Reset": { "target": RESET_PATH } },
                });
                if self.media_on_system {
                    system["VirtualMedia"] = json!({ "@odata.id": "/redfish/v1/Systems/1/VirtualMedia" });
                }
                system
            }
            "/redfish/v1/Systems/1/VirtualMedia" => json!({
                "Members": [
                    { "@odata.id": "/redfish/v1/Systems/1/VirtualMedia/USB1" },
                    { "@odata.id": "/redfish/v1/Systems/1/VirtualMedia/CD1" },
                ]
            }),
            "/redfish/v1/Systems/1/VirtualMedia/USB1" => json!({
                "@odata.id": "/redfish/v1/Systems/1/VirtualMedia/USB1",
                "Id": "USB1",
                "MediaTypes": ["USBStick"],
            }),
            "/redfish/v1/Systems/1/VirtualMedia/CD1" => cd("/redfish/v1/Systems/1/VirtualMedia/CD1"),
            "/redfish/v1/Managers" => json!({ "Members": [{ "@odata.id": "/redfish/v1/Managers/1" }] }),
            "/redfish/v1/Managers/1" => json!({
                "@odata.id": "/redfish/v1/Managers/1",
                "VirtualMedia": { "@odata.id": "/redfish/v1/Managers/1/VirtualMedia" },
            }),
            "/redfish/v1/Managers/1/VirtualMedia" => json!({
                "Members": [{ "@odata.id": "/redfish/v1/Managers/1/VirtualMedia/CD1" }]
            }),
            "/redfish/v1/Managers/1/VirtualMedia/CD1" => cd("/redfish/v1/Managers/1/VirtualMedia/CD1"),
            _ => return None,
        };
        Some(value)
    }
}

async fn handle(
    State(stub): State<StubRedfish>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if let Some(status) = stub.reject_with {
        return status.into_response();
    }

    match method {
        Method::GET => match stub.resource(uri.path()) {
            Some(value) => axum::Json(value).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::POST if uri.path() == RESET_PATH => {
            (stub.reset_status, "reset refused").into_response()
        }
        Method::POST | Method::PATCH => StatusCode::NO_CONTENT.into_response(),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn serve(stub: StubRedfish) -> RedfishClient {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(handle).with_state(stub);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    RedfishClient::new(format!("http://{}/", addr), "root".to_string(), "calvin".to_string())
        .unwrap()
}

#[tokio::test]
async fn test_boot_uses_system_media_in_order() {
    let stub = StubRedfish::new();
    let client = serve(stub.clone()).await;

    client.boot_from_image(IMAGE_URL).await.unwrap();

    assert_eq!(
        stub.calls(),
        vec![
            "GET /redfish/v1/Systems",
            "GET /redfish/v1/Systems/1",
            "GET /redfish/v1/Systems/1/VirtualMedia",
            "GET /redfish/v1/Systems/1/VirtualMedia/USB1",
            "GET /redfish/v1/Systems/1/VirtualMedia/CD1",
            "POST /redfish/v1/Systems/1/VirtualMedia/CD1/Actions/VirtualMedia.InsertMedia",
            "PATCH /redfish/v1/Systems/1",
            "POST /redfish/v1/Systems/1/Actions/ComputerSystem.Reset",
        ]
    );
    assert_eq!(
        stub.body_of(
            "POST",
            "/redfish/v1/Systems/1/VirtualMedia/CD1/Actions/VirtualMedia.InsertMedia"
        ),
        json!({ "Image": IMAGE_URL, "Inserted": true, "WriteProtected": true })
    );
    assert_eq!(
        stub.body_of("PATCH", "/redfish/v1/Systems/1"),
        json!({ "Boot": { "BootSourceOverrideEnabled": "Once", "BootSourceOverrideTarget": "Cd" } })
    );
    assert_eq!(stub.body_of("POST", RESET_PATH), json!({ "ResetType": "ForceRestart" }));
    assert!(
        stub.requests()
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Basic cm9vdDpjYWx2aW4="))
    );
}

#[tokio::test]
async fn test_inserted_media_is_ejected_first() {
    let stub = StubRedfish {
        media_inserted: true,
        ..StubRedfish::new()
    };
    let client = serve(stub.clone()).await;

    client.boot_from_image(IMAGE_URL).await.unwrap();

    let calls = stub.calls();
    let eject = calls
        .iter()
        .position(|c| c.ends_with("/CD1/Actions/VirtualMedia.EjectMedia"))
        .unwrap();
    let insert = calls
        .iter()
        .position(|c| c.ends_with("/CD1/Actions/VirtualMedia.InsertMedia"))
        .unwrap();
    assert!(eject < insert, "{:?}", calls);
}

#[tokio::test]
async fn test_falls_back_to_manager_media() {
    let stub = StubRedfish {
        media_on_system: false,
        ..StubRedfish::new()
    };
    let client = serve(stub.clone()).await;

    client.boot_from_image(IMAGE_URL).await.unwrap();

    assert_eq!(
        stub.calls()[..7],
        [
            "GET /redfish/v1/Systems",
            "GET /redfish/v1/Systems/1",
            "GET /redfish/v1/Managers",
            "GET /redfish/v1/Managers/1",
            "GET /redfish/v1/Managers/1/VirtualMedia",
            "GET /redfish/v1/Managers/1/VirtualMedia/CD1",
            "POST /redfish/v1/Managers/1/VirtualMedia/CD1/Actions/VirtualMedia.InsertMedia",
        ]
    );
}

#[tokio::test]
async fn test_reset_failure_is_api_error() {
    let stub = StubRedfish {
        reset_status: StatusCode::INTERNAL_SERVER_ERROR,
        ..StubRedfish::new()
    };
    let client = serve(stub.clone()).await;

    let err = client.boot_from_image(IMAGE_URL).await.unwrap_err();

    assert!(matches!(&err, RedfishError::Api(msg) if msg.contains("500")), "{err}");
    assert_eq!(
        stub.calls().last().map(String::as_str),
        Some("POST /redfish/v1/Systems/1/Actions/ComputerSystem.Reset")
    );
}

#[tokio::test]
async fn test_rejected_credentials_stop_at_first_request() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
        let stub = StubRedfish {
            reject_with: Some(status),
            ..StubRedfish::new()
        };
        let client = serve(stub.clone()).await;

        let err = client.boot_from_image(IMAGE_URL).await.unwrap_err();

        assert!(matches!(err, RedfishError::Authentication(_)), "{status}: {err}");
        assert_eq!(stub.calls(), vec!["GET /redfish/v1/Systems"]);
    }
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let stub = StubRedfish {
        reject_with: Some(StatusCode::NOT_FOUND),
        ..StubRedfish::new()
    };
    let client = serve(stub).await;

    let err = client.boot_from_image(IMAGE_URL).await.unwrap_err();

    assert!(matches!(err, RedfishError::NotFound(path) if path == "/redfish/v1/Systems"));
}
