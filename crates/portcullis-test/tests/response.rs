//! End-to-end response unmarshalling against the petstore fixture.

use portcullis_spec::{ApiSpec, ParameterLocation};
use portcullis_test::{load_fixture, TestRequest, TestResponse};
use portcullis_validator::{
    unmarshal_apicall_response, validate_apicall_response, ApiCallResponseValidator, Decoded,
    Error, FindError, ResponseUnmarshalResult, SchemaErrorKind, ValidationError, ValidatorConfig,
};
use serde_json::{json, Value};

fn petstore() -> ApiSpec {
    load_fixture("petstore.yaml").expect("petstore fixture should load")
}

fn unmarshal(spec: &ApiSpec, request: &TestRequest, response: &TestResponse) -> ResponseUnmarshalResult {
    unmarshal_apicall_response(spec, request, response, &ValidatorConfig::default())
        .expect("response should resolve to a declared response")
}

fn cat() -> Value {
    json!({ "id": 1, "name": "Tom", "petType": "cat", "lives": 7 })
}

#[test]
fn headers_and_body_are_decoded() {
    let spec = petstore();
    let response = TestResponse::new(200)
        .header("X-Rate-Limit", "100")
        .json(&json!([cat(), { "id": 2, "name": "Rex", "petType": "dog", "barks": true }]));
    let result = unmarshal(&spec, &TestRequest::get("/v1/pets"), &response);

    assert!(result.is_valid(), "{:?}", result.errors);
    assert_eq!(result.headers["X-Rate-Limit"], Decoded::Integer(100));
    assert!(!result.headers.contains_key("X-Next"));

    let pets = result.data.as_ref().and_then(Decoded::as_array).expect("array");
    assert_eq!(pets[0].model_name(), Some("Cat"));
    assert_eq!(pets[0].get("lives"), Some(&Decoded::Integer(7)));
    assert_eq!(pets[1].model_name(), Some("Dog"));
    assert_eq!(pets[1].get("barks"), Some(&Decoded::Bool(true)));
}

#[test]
fn missing_required_header() {
    let spec = petstore();
    let response = TestResponse::new(200).json(&json!([]));
    let result = unmarshal(&spec, &TestRequest::get("/v1/pets"), &response);

    assert_eq!(
        result.errors,
        vec![ValidationError::MissingParameter {
            location: ParameterLocation::Header,
            name: "X-Rate-Limit".into()
        }]
    );
}

#[test]
fn header_value_is_cast() {
    let spec = petstore();
    let response = TestResponse::new(200)
        .header("x-rate-limit", "lots")
        .json(&json!([]));
    let result = unmarshal(&spec, &TestRequest::get("/v1/pets"), &response);

    assert!(matches!(
        &result.errors[..],
        [ValidationError::Parameter { location: ParameterLocation::Header, .. }]
    ));
}

#[test]
fn default_response_covers_other_statuses() {
    let spec = petstore();
    let response = TestResponse::new(503).json(&json!({ "code": 503, "message": "busy" }));
    let result = unmarshal(&spec, &TestRequest::get("/v1/pets"), &response);

    assert!(result.is_valid(), "{:?}", result.errors);
    assert_eq!(
        result.data.as_ref().and_then(|d| d.get("code")),
        Some(&Decoded::Integer(503))
    );
}

#[test]
fn status_range_matches_when_no_exact_code() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1").header("Authorization", "Bearer tok");
    let response = TestResponse::new(404).json(&json!({ "code": 404, "message": "no such pet" }));
    let result = unmarshal(&spec, &request, &response);

    assert!(result.is_valid(), "{:?}", result.errors);
}

#[test]
fn undeclared_status_is_fatal() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1");
    let response = TestResponse::new(500);

    let err = unmarshal_apicall_response(&spec, &request, &response, &ValidatorConfig::default())
        .unwrap_err();
    assert_eq!(err, Error::Find(FindError::ResponseNotFound { status: 500 }));
}

#[test]
fn write_only_property_is_rejected_in_responses() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1");
    let mut pet = cat();
    pet["secret"] = json!("catnip");
    let result = unmarshal(&spec, &request, &TestResponse::new(200).json(&pet));

    assert_eq!(result.errors.len(), 1);
    let error = result.errors[0].schema_error().expect("schema error");
    assert_eq!(error.path.to_pointer(), "/secret");
}

#[test]
fn read_only_property_is_allowed_in_responses() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1");
    let result = unmarshal(&spec, &request, &TestResponse::new(200).json(&cat()));

    assert!(result.is_valid(), "{:?}", result.errors);
    assert_eq!(
        result.data.as_ref().and_then(|d| d.get("id")),
        Some(&Decoded::Integer(1))
    );
}

#[test]
fn unknown_discriminator_value() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1");
    let bird = json!({ "id": 3, "name": "Tweety", "petType": "bird" });
    let result = unmarshal(&spec, &request, &TestResponse::new(200).json(&bird));

    let error = result.errors[0].schema_error().expect("schema error");
    assert_eq!(error.path.to_pointer(), "/petType");
    assert_eq!(
        error.kind,
        SchemaErrorKind::UnknownDiscriminator {
            property: "petType".into(),
            value: "bird".into()
        }
    );
}

#[test]
fn missing_discriminator_property() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1");
    let result = unmarshal(
        &spec,
        &request,
        &TestResponse::new(200).json(&json!({ "id": 3, "name": "Tom" })),
    );

    assert_eq!(result.errors.len(), 1);
    let error = result.errors[0].schema_error().expect("schema error");
    assert_eq!(
        error.kind,
        SchemaErrorKind::RequiredPropertyMissing {
            name: "petType".into()
        }
    );
}

#[test]
fn undeclared_content_type_is_collected() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1");
    let response = TestResponse::new(200).with_body("text/html", "<p>Tom</p>");
    let result = unmarshal(&spec, &request, &response);

    assert!(matches!(
        &result.errors[..],
        [ValidationError::MediaType(FindError::MediaTypeNotFound { .. })]
    ));
    assert!(result.data.is_none());
}

#[test]
fn response_without_declared_content() {
    let spec = petstore();
    let result = unmarshal(&spec, &TestRequest::get("/v1/pets/mine"), &TestResponse::new(200));

    assert!(result.is_valid());
    assert!(result.data.is_none());
    assert!(result.headers.is_empty());
}

#[test]
fn validator_is_reusable_across_responses() {
    let spec = petstore();
    let validator = ApiCallResponseValidator::new(&spec, &ValidatorConfig::default());
    let request = TestRequest::get("/v1/pets/1");

    for status in [200, 404] {
        let body = if status == 200 {
            cat()
        } else {
            json!({ "code": status, "message": "x" })
        };
        let result = validator
            .unmarshal_response(&request, &TestResponse::new(status).json(&body))
            .unwrap();
        assert!(result.is_valid(), "{}: {:?}", status, result.errors);
    }
}

#[test]
fn validate_fails_on_collected_errors() {
    let spec = petstore();
    let request = TestRequest::get("/v1/pets/1");
    let response = TestResponse::new(200).json(&json!({ "name": "Tom" }));

    let err = validate_apicall_response(&spec, &request, &response, &ValidatorConfig::default())
        .unwrap_err();
    assert!(err.is_invalid());
}

#[test]
fn response_to_unknown_path_is_fatal() {
    let spec = petstore();
    let err = unmarshal_apicall_response(
        &spec,
        &TestRequest::get("/v1/nope"),
        &TestResponse::new(200),
        &ValidatorConfig::default(),
    )
    .unwrap_err();

    assert!(err.is_not_found());
}
