use triserve::http::response::{Response, ResponseBuilder, StatusCode};
use triserve::routes::{ErrorPayload, SuccessPayload};

#[test]
fn test_status_code_numbers_and_phrases() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    assert_eq!(StatusCode::ServiceUnavailable.as_u16(), 503);
    assert_eq!(
        StatusCode::ServiceUnavailable.reason_phrase(),
        "Service Unavailable"
    );
}

#[test]
fn test_builder_adds_content_length() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .body(b"hello".to_vec())
        .build();

    assert_eq!(response.headers.get("Content-Length").unwrap(), "5");
}

#[test]
fn test_json_response_framing() {
    let response = Response::json(StatusCode::Ok, &SuccessPayload::new());
    let bytes = response.to_bytes();
    let text = String::from_utf8(bytes).unwrap();

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Type: application/json\r\n"));
    assert!(text.contains("Content-Length: 34\r\n"));
    assert!(text.ends_with("\r\n\r\n{\"status\":200,\"message\":\"success\"}"));
}

#[test]
fn test_service_unavailable_is_fully_framed() {
    let response = Response::json(
        StatusCode::ServiceUnavailable,
        &ErrorPayload::new(503, "service unavailable"),
    );
    let text = String::from_utf8(response.to_bytes()).unwrap();

    assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
    assert!(text.contains("Content-Length:"));
    assert!(text.contains("\r\n\r\n"));
    let body_len = text.split("\r\n\r\n").nth(1).unwrap().len();
    assert!(text.contains(&format!("Content-Length: {body_len}\r\n")));
}
