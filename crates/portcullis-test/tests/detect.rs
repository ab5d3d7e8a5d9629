//! Version detection and OpenAPI 3.0 behaviour.

use portcullis_spec::{ApiSpec, SpecVersion};
use portcullis_test::{load_fixture, load_fixture_with, TestRequest, TestResponse, TestWebhookRequest};
use portcullis_validator::{
    detect, unmarshal_apicall_request, unmarshal_webhook_request, validate_apicall_response,
    Decoded, DetectError, Diagnostic, Error, MessageKind, ProblemDetails, RequestMessage,
    RequestUnmarshaller, RequestValidator, ValidatorConfig, ValidatorKind,
};
use serde_json::json;

fn inventory() -> ApiSpec {
    load_fixture("inventory-3.0.yaml").expect("inventory fixture should load")
}

#[test]
fn validator_kind_follows_version_and_message() {
    let v30 = inventory();
    let v31 = load_fixture("petstore.yaml").expect("petstore fixture should load");

    assert_eq!(v30.version, Some(SpecVersion::V30));
    assert_eq!(
        detect(&v30, MessageKind::ApiCallRequest),
        Ok(ValidatorKind::V30ApiCallRequest)
    );
    assert_eq!(
        detect(&v31, MessageKind::WebhookResponse),
        Ok(ValidatorKind::V31WebhookResponse)
    );
    assert!(matches!(
        detect(&v30, MessageKind::WebhookRequest),
        Err(DetectError::UnsupportedMessageKind {
            kind: MessageKind::WebhookRequest,
            ..
        })
    ));
}

#[test]
fn webhooks_are_unsupported_in_3_0() {
    let spec = inventory();
    let request = TestWebhookRequest::new("itemAdded", "POST");

    let err = unmarshal_webhook_request(&spec, &request, &ValidatorConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Detect(_)));
    assert_eq!(ProblemDetails::from_error(&err, false).status, 500);
}

#[test]
fn unsupported_version_is_rejected() {
    let spec = load_fixture_with("petstore.yaml", |doc| {
        doc["openapi"] = serde_yaml::Value::String("2.0".into());
    })
    .expect("edited fixture should load");

    let err = unmarshal_apicall_request(&spec, &TestRequest::get("/v1/pets"), &ValidatorConfig::default())
        .unwrap_err();
    assert_eq!(err, Error::Detect(DetectError::UnsupportedVersion("2.0".into())));
}

#[test]
fn nullable_properties_accept_null() {
    let spec = inventory();
    let request = TestRequest::post("/api/items").json(&json!({
        "sku": "ABC-0001",
        "price": 9.5,
        "discontinued": null,
        "note": null
    }));
    let result = unmarshal_apicall_request(&spec, &request, &ValidatorConfig::default()).unwrap();

    assert!(result.is_valid(), "{:?}", result.errors);
    let body = result.body.expect("body");
    assert_eq!(body.get("discontinued"), Some(&Decoded::Null));
    assert_eq!(body.get("price"), Some(&Decoded::Number(9.5)));
    // 3.0 has no top-level security here.
    assert!(result.security.is_none());
}

#[test]
fn non_nullable_property_rejects_null() {
    let spec = inventory();
    let request = TestRequest::post("/api/items").json(&json!({ "sku": null, "price": 1 }));
    let result = unmarshal_apicall_request(&spec, &request, &ValidatorConfig::default()).unwrap();

    assert_eq!(result.errors.len(), 1);
    let error = result.errors[0].schema_error().expect("schema error");
    assert_eq!(error.path.to_pointer(), "/sku");
}

#[test]
fn boolean_exclusive_minimum() {
    let spec = inventory();
    let config = ValidatorConfig::default();

    let zero = TestRequest::post("/api/items").json(&json!({ "sku": "A", "price": 0 }));
    let result = unmarshal_apicall_request(&spec, &zero, &config).unwrap();
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);

    let query = TestRequest::get("/api/items?minPrice=0.01").header("X-Tenant", "acme");
    let result = unmarshal_apicall_request(&spec, &query, &config).unwrap();
    assert!(result.is_valid(), "{:?}", result.errors);
    assert_eq!(result.parameters.query["minPrice"], Decoded::Number(0.01));
}

#[test]
fn unknown_format_is_diagnosed_not_rejected() {
    let spec = inventory();
    let request = TestRequest::post("/api/items").json(&json!({ "sku": "A", "price": 2 }));
    let result = unmarshal_apicall_request(&spec, &request, &ValidatorConfig::default()).unwrap();

    assert!(result.is_valid(), "{:?}", result.errors);
    assert_eq!(
        result.diagnostics,
        vec![Diagnostic::UnknownFormat {
            format: "sku-code".into()
        }]
    );
}

#[test]
fn path_pattern_and_space_delimited_query() {
    let spec = inventory();
    let config = ValidatorConfig::default();

    let ok = TestRequest::get("/api/items/ABC-1234?fields=sku%20price");
    let result = unmarshal_apicall_request(&spec, &ok, &config).unwrap();
    assert!(result.is_valid(), "{:?}", result.errors);
    assert_eq!(
        result.parameters.query["fields"].as_array().map(<[_]>::len),
        Some(2)
    );

    let bad = TestRequest::get("/api/items/abc");
    let result = unmarshal_apicall_request(&spec, &bad, &config).unwrap();
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
}

#[test]
fn required_header_parameter() {
    let spec = inventory();
    let result =
        unmarshal_apicall_request(&spec, &TestRequest::get("/api/items"), &ValidatorConfig::default())
            .unwrap();

    assert!(matches!(
        &result.errors[..],
        [portcullis_validator::ValidationError::MissingParameter { name, .. }] if name == "X-Tenant"
    ));
}

#[test]
fn response_in_3_0() {
    let spec = inventory();
    let request = TestRequest::get("/api/items/ABC-1234");
    let config = ValidatorConfig::default();

    let found = TestResponse::new(200).json(&json!({ "sku": "ABC-1234", "price": 3 }));
    assert!(validate_apicall_response(&spec, &request, &found, &config).is_ok());

    let missing = TestResponse::new(404);
    assert!(validate_apicall_response(&spec, &request, &missing, &config).is_ok());
}

#[test]
fn dispatcher_is_reusable() {
    let spec = inventory();
    let validator =
        RequestValidator::for_kind(&spec, MessageKind::ApiCallRequest, &ValidatorConfig::default())
            .unwrap();

    for id in ["ABC-0001", "XYZ-9999"] {
        let request = TestRequest::get(&format!("/api/items/{}", id));
        let result = validator.unmarshal(RequestMessage::ApiCall(&request)).unwrap();
        assert_eq!(result.parameters.path["id"].as_str(), Some(id));
    }
}
