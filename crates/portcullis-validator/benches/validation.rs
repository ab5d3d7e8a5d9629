//! Validation benchmarks.
//!
//! Run with: cargo bench -p portcullis-validator

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use portcullis_spec::{parse_spec, ApiSpec};
use portcullis_validator::{
    ApiCallRequestValidator, BaseRequest, CoercionMode, Direction, Request, SchemaValidator,
    ValidatorConfig,
};

const SPEC: &str = r#"
openapi: "3.1.0"
info: { title: Bench, version: "1" }
components:
  securitySchemes:
    apiKey: { type: apiKey, name: x-api-key, in: header }
  schemas:
    User:
      type: object
      required: [name, email]
      properties:
        name: { type: string, minLength: 1, maxLength: 100 }
        email: { type: string, format: email }
        age: { type: integer, minimum: 0, maximum: 150 }
        tags:
          type: array
          items: { type: string }
          maxItems: 10
security:
  - apiKey: []
paths:
  /users/{id}:
    put:
      parameters:
        - { name: id, in: path, required: true, schema: { type: string, format: uuid } }
        - { name: page, in: query, schema: { type: integer, minimum: 1 } }
        - { name: limit, in: query, schema: { type: integer, minimum: 1, maximum: 100 } }
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: "#/components/schemas/User" }
      responses:
        "200": { description: ok }
"#;

struct BenchRequest {
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl BaseRequest for BenchRequest {
    fn method(&self) -> &str {
        "PUT"
    }

    fn query(&self) -> &[(String, String)] {
        &self.query
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn cookies(&self) -> &[(String, String)] {
        &[]
    }

    fn content_type(&self) -> Option<&str> {
        Some("application/json")
    }

    fn body(&self) -> Option<&[u8]> {
        Some(&self.body)
    }
}

impl Request for BenchRequest {
    fn path(&self) -> &str {
        &self.path
    }
}

fn spec() -> ApiSpec {
    parse_spec(SPEC).unwrap()
}

fn request(body: &serde_json::Value, query: &[(&str, &str)]) -> BenchRequest {
    BenchRequest {
        path: "/users/550e8400-e29b-41d4-a716-446655440000".to_string(),
        query: query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        headers: vec![(
            "x-api-key".to_string(),
            "12345678901234567890123456789012".to_string(),
        )],
        body: serde_json::to_vec(body).unwrap(),
    }
}

fn bench_validator_creation(c: &mut Criterion) {
    let spec = spec();
    let config = ValidatorConfig::default();

    c.bench_function("validator_creation", |b| {
        b.iter(|| {
            black_box(ApiCallRequestValidator::new(&spec, &config));
        });
    });
}

fn bench_schema_cast(c: &mut Criterion) {
    let spec = spec();
    let Some(user) = spec.schemas.component("User") else {
        return;
    };
    let schemas = SchemaValidator::new(&spec.schemas, &ValidatorConfig::default());

    let small = json!({ "name": "John Doe", "email": "john@example.com" });
    let large = json!({
        "name": "John Doe",
        "email": "john@example.com",
        "age": 30,
        "tags": ["tag1", "tag2", "tag3", "tag4", "tag5"]
    });
    let invalid = json!({ "name": "", "email": "not-an-email", "age": "old" });

    let mut group = c.benchmark_group("schema_cast");
    for (name, value) in [("small_valid", &small), ("large_valid", &large), ("invalid", &invalid)] {
        group.bench_with_input(BenchmarkId::new("user", name), value, |b, value| {
            b.iter(|| {
                black_box(schemas.cast(user, value, CoercionMode::Strict, Direction::Request));
            });
        });
    }
    group.finish();
}

fn bench_full_request(c: &mut Criterion) {
    let spec = spec();
    let validator = ApiCallRequestValidator::new(&spec, &ValidatorConfig::default());

    let valid = request(
        &json!({ "name": "John Doe", "email": "john@example.com" }),
        &[("page", "1"), ("limit", "50")],
    );
    let invalid = request(
        &json!({ "name": "", "email": "nope" }),
        &[("page", "0"), ("limit", "1000")],
    );

    let mut group = c.benchmark_group("full_request");
    group.bench_function("valid", |b| {
        b.iter(|| {
            black_box(validator.unmarshal_request(&valid)).ok();
        });
    });
    group.bench_function("invalid", |b| {
        b.iter(|| {
            black_box(validator.unmarshal_request(&invalid)).ok();
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_validator_creation,
    bench_schema_cast,
    bench_full_request
);
criterion_main!(benches);
