use crate::server::api;
use crate::server::AppContext;

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }

    fn ok(content_type: &'static str, body: String) -> Self {
        Self {
            status_code: 200,
            status_text: "OK",
            content_type,
            body,
        }
    }
}

pub fn route_request(ctx: &AppContext, method: &str, path: &str, body: &str) -> HttpResponse {
    let route = path.split('?').next().unwrap_or(path);
    match (method, route) {
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => HttpResponse::ok("application/json", payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("GET", "/api/offers") => match api::offers_payload(ctx) {
            Ok(payload) => HttpResponse::ok("application/json", payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("GET", "/api/search/estimate") => {
            search_response(api::estimate_payload(path, ctx), "application/json")
        }
        ("POST", "/api/search") => search_response(api::search_payload(body, ctx), "application/json"),
        ("POST", "/api/search/export") => {
            search_response(api::export_payload(body, ctx), "text/csv; charset=utf-8")
        }
        _ => error_response(404, "Not Found", "Route not found"),
    }
}

fn search_response(
    result: Result<String, api::SearchPayloadError>,
    content_type: &'static str,
) -> HttpResponse {
    match result {
        Ok(payload) => HttpResponse::ok(content_type, payload),
        Err(api::SearchPayloadError::Parse(err)) => {
            error_response(400, "Bad Request", &format!("Invalid request body: {err}"))
        }
        Err(api::SearchPayloadError::Validation(validation)) => {
            validation_error_response(400, "Bad Request", validation)
        }
        Err(api::SearchPayloadError::Search(err)) => {
            error_response(400, "Bad Request", &err.to_string())
        }
        Err(api::SearchPayloadError::Export(err)) => {
            error_response(500, "Internal Server Error", &err.to_string())
        }
        Err(err @ api::SearchPayloadError::Serialize(_)) => {
            error_response(500, "Internal Server Error", &err.to_string())
        }
    }
}

fn validation_error_response(
    status_code: u16,
    status_text: &'static str,
    payload: api::ValidationErrorResponse,
) -> HttpResponse {
    let fallback =
        "{\n  \"status\": \"error\",\n  \"message\": \"Validation failed\"\n}".to_string();

    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: serde_json::to_string_pretty(&payload).unwrap_or(fallback),
    }
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}
