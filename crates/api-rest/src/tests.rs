use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use medhelp_core::SigningKey;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "medhelp-test-boundary";
const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n";

fn test_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let cfg = Arc::new(
        CoreConfig::new(
            temp_dir.path().to_path_buf(),
            SigningKey::new("rest-test-signing-key-0123456789abcdef").unwrap(),
            24,
        )
        .unwrap(),
    );
    let state = AppState::open(cfg).expect("AppState::open should succeed");
    (router(state), temp_dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let (status, _, bytes) = send(app, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register_registrar(app: &Router) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/registration",
        None,
        Some(json!({"username": "desk", "password": "desk-pw", "registrar": {"secret": "x"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_owned()
}

async fn register_patient(
    app: &Router,
    username: &str,
    last_name: &str,
    policy: &str,
) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        "/registration",
        None,
        Some(json!({
            "username": username,
            "password": "patient-pw",
            "patient": {"lastname": last_name, "policy_number": policy}
        })),
    )
    .await
}

async fn file_referral(
    app: &Router,
    token: &str,
    last_name: &str,
    policy: &str,
    analyses: &[&str],
) -> Value {
    let (status, body) = call(
        app,
        "POST",
        "/directions",
        Some(token),
        Some(json!({
            "patient": {
                "firstName": "John",
                "lastName": last_name,
                "birthDate": "1980-01-02",
                "policyNumber": policy,
                "tel": "+7 900 000 00 00"
            },
            "doctor": {"name": "Dr. House", "specialty": "Diagnostics"},
            "date": "2024-03-01",
            "icdCode": "R50.9",
            "medicalOrganization": "City Clinic No. 1",
            "analyses": analyses,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

fn upload_request(
    uri: &str,
    token: &str,
    field: &str,
    file_name: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _dir) = test_app();
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let (app, _dir) = test_app();

    let (status, body) = call(&app, "GET", "/directions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, "GET", "/directions", Some("forged.token.value"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_smith_sees_own_referral_and_jones_is_forbidden() {
    let (app, _dir) = test_app();
    let registrar = register_registrar(&app).await;

    let smith_referral = file_referral(&app, &registrar, "Smith", "P-1", &["CBC", "ECG"]).await;
    file_referral(&app, &registrar, "Jones", "P-2", &["MRI"]).await;
    assert_eq!(smith_referral["analyses"].as_array().unwrap().len(), 2);
    assert_eq!(smith_referral["direction"]["status"], 0);
    let referral_id = smith_referral["direction"]["id"].as_i64().unwrap();

    let (status, smith) = register_patient(&app, "smith", "Smith", "P-1").await;
    assert_eq!(status, StatusCode::OK);
    let smith_token = smith["token"].as_str().unwrap();
    let (_, jones) = register_patient(&app, "jones", "Jones", "P-2").await;
    let jones_token = jones["token"].as_str().unwrap();

    let (status, listed) = call(&app, "GET", "/directions", Some(smith_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"].as_i64(), Some(referral_id));
    assert_eq!(listed[0]["patient"]["lastName"], "Smith");

    let (status, all) = call(&app, "GET", "/directions", Some(&registrar), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let uri = format!("/direction/{referral_id}");
    let (status, denied) = call(&app, "GET", &uri, Some(jones_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(denied["error"], error::ACCESS_DENIED);
    let (status, _) = call(&app, "GET", &format!("{uri}/analysis"), Some(jones_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, analyses) =
        call(&app, "GET", &format!("{uri}/analysis"), Some(smith_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analyses.as_array().unwrap().len(), 2);

    let (status, _) = call(&app, "GET", "/direction/999", Some(smith_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_failures_share_one_body() {
    let (app, _dir) = test_app();
    register_registrar(&app).await;

    let (status, wrong_user) = call(
        &app,
        "POST",
        "/authentication",
        None,
        Some(json!({"username": "nobody", "password": "desk-pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, wrong_password) = call(
        &app,
        "POST",
        "/authentication",
        None,
        Some(json!({"username": "desk", "password": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_user, wrong_password);
    assert_eq!(wrong_user["error"], error::INVALID_CREDENTIALS);

    let (status, ok) = call(
        &app,
        "POST",
        "/authentication",
        None,
        Some(json!({"username": "desk", "password": "desk-pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(ok["token"].is_string());
    assert!(ok["expiresAt"].is_string());
}

#[tokio::test]
async fn test_registration_errors() {
    let (app, _dir) = test_app();
    let registrar = register_registrar(&app).await;
    file_referral(&app, &registrar, "Smith", "P-1", &[]).await;

    let (status, _) = call(
        &app,
        "POST",
        "/registration",
        None,
        Some(json!({"username": "both", "password": "pw",
                    "registrar": {"secret": "x"},
                    "patient": {"lastname": "Smith", "policy_number": "P-1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = register_patient(&app, "ghost", "Smith", "P-404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = register_patient(&app, "smith", "Smith", "P-1").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = register_patient(&app, "smith-again", "Smith", "P-1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = register_patient(&app, "desk", "Smith", "P-1").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_and_check_are_registrar_only() {
    let (app, _dir) = test_app();
    let registrar = register_registrar(&app).await;
    let referral = file_referral(&app, &registrar, "Smith", "P-1", &["CBC"]).await;
    let referral_id = referral["direction"]["id"].as_i64().unwrap();
    let analysis_id = referral["analyses"][0]["id"].as_i64().unwrap();
    let (_, smith) = register_patient(&app, "smith", "Smith", "P-1").await;
    let smith_token = smith["token"].as_str().unwrap();

    let status_body = json!({"directionId": referral_id, "status": 2});
    let (status, denied) =
        call(&app, "POST", "/status", Some(smith_token), Some(status_body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(denied["error"], error::ACCESS_DENIED);
    let (status, _) = call(&app, "POST", "/status", Some(&registrar), Some(status_body)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(
        &app,
        "POST",
        "/status",
        Some(&registrar),
        Some(json!({"directionId": 999, "status": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let details_uri = format!("/direction/{referral_id}");
    let (_, details) = call(&app, "GET", &details_uri, Some(smith_token), None).await;
    assert_eq!(details["status"], 2);

    let check_body = json!({"analysisId": analysis_id, "checked": true});
    let (status, _) =
        call(&app, "POST", "/check", Some(smith_token), Some(check_body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "POST", "/check", Some(&registrar), Some(check_body)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, analyses) = call(
        &app,
        "GET",
        &format!("/direction/{referral_id}/analysis"),
        Some(smith_token),
        None,
    )
    .await;
    assert_eq!(analyses[0]["isChecked"], true);
}

#[tokio::test]
async fn test_upload_and_download_analysis_file() {
    let (app, _dir) = test_app();
    let registrar = register_registrar(&app).await;
    let referral = file_referral(&app, &registrar, "Smith", "P-1", &["Blood panel"]).await;
    file_referral(&app, &registrar, "Jones", "P-2", &[]).await;
    let analysis_id = referral["analyses"][0]["id"].as_i64().unwrap();
    let (_, smith) = register_patient(&app, "smith", "Smith", "P-1").await;
    let smith_token = smith["token"].as_str().unwrap().to_owned();
    let (_, jones) = register_patient(&app, "jones", "Jones", "P-2").await;
    let jones_token = jones["token"].as_str().unwrap().to_owned();
    let uri = format!("/analysis/{analysis_id}/file");

    let (status, _, body) = send(&app, get_request(&uri, &smith_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, _, _) = send(&app, upload_request(&uri, &jones_token, "file", "x.pdf", PDF)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let wrong_field = upload_request(&uri, &smith_token, "other", "x.pdf", PDF);
    let (status, _, _) = send(&app, wrong_field).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) =
        send(&app, upload_request(&uri, &smith_token, "file", "result.pdf", PDF)).await;
    assert_eq!(status, StatusCode::OK);
    let uploaded: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(uploaded["file"]["mediaType"], "application/pdf");
    assert_eq!(uploaded["analysis"]["fileId"], uploaded["file"]["id"]);

    let (status, headers, body) = send(&app, get_request(&uri, &smith_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PDF);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("filename=\"Blood panel.pdf\""));

    let (status, _, _) = send(&app, get_request(&uri, &jones_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(&app, get_request("/analysis/999/file", &registrar)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _dir) = test_app();
    let (status, doc) = call(&app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/directions"].is_object());
    assert!(doc["paths"]["/analysis/{analysis}/file"].is_object());
}
