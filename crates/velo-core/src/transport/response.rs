//! Classification of server responses.
//!
//! The server's error bodies are schema-free, so every response is first
//! mapped to a [`ResponseOutcome`] before callers decide what it means for
//! their operation.

use serde::Deserialize;
use serde_json::Value;

use super::ApiResponse;

/// What a response means, independent of the operation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// 2xx with a JSON body
    Body(Value),
    /// 2xx without a body
    Empty,
    /// 4xx/5xx carrying an error message
    Failed(RemoteFailure),
    /// 4xx/5xx without a body; a `HEAD` reads this as "does not exist"
    Missing { status: u16, reason: String },
    /// Any status outside the 2xx/4xx/5xx ranges
    Unexpected { status: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub status: u16,
    pub message: String,
}

/// Error body shape used by the server.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    error_message: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    parsed_help_links: Vec<String>,
}

impl ResponseOutcome {
    /// Classify a response.
    ///
    /// Returns `Err` with the decode reason when a 2xx body is not valid JSON.
    pub fn classify(response: &ApiResponse) -> Result<Self, String> {
        let has_body = !response.body.iter().all(u8::is_ascii_whitespace);
        match response.status {
            200..=299 if has_body => serde_json::from_slice(&response.body)
                .map(ResponseOutcome::Body)
                .map_err(|e| e.to_string()),
            200..=299 => Ok(ResponseOutcome::Empty),
            400..=599 if has_body => Ok(ResponseOutcome::Failed(RemoteFailure {
                status: response.status,
                message: failure_message(response),
            })),
            400..=599 => Ok(ResponseOutcome::Missing {
                status: response.status,
                reason: response.reason.clone(),
            }),
            status => Ok(ResponseOutcome::Unexpected { status }),
        }
    }
}

/// Build "<reason>: <message> <errors...> (<help links>)" from an error body.
fn failure_message(response: &ApiResponse) -> String {
    let body: ErrorBody = match serde_json::from_slice(&response.body) {
        Ok(body) => body,
        Err(_) => return String::from_utf8_lossy(&response.body).trim().to_string(),
    };

    let mut message = format!(
        "{}: {}",
        response.reason,
        body.error_message.as_deref().unwrap_or("Unknown error")
    );
    if !body.errors.is_empty() {
        message.push(' ');
        message.push_str(&body.errors.join(". "));
    }
    if !body.parsed_help_links.is_empty() {
        message.push_str(&format!(" ({})", body.parsed_help_links.join(", ")));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_with_body() {
        let response = ApiResponse::json(200, &json!({"Id": "Projects-1"}));
        assert_eq!(
            ResponseOutcome::classify(&response).unwrap(),
            ResponseOutcome::Body(json!({"Id": "Projects-1"}))
        );
    }

    #[test]
    fn test_success_without_body() {
        let response = ApiResponse::empty(200);
        assert_eq!(
            ResponseOutcome::classify(&response).unwrap(),
            ResponseOutcome::Empty
        );
    }

    #[test]
    fn test_missing_without_body() {
        let response = ApiResponse::empty(404);
        assert_eq!(
            ResponseOutcome::classify(&response).unwrap(),
            ResponseOutcome::Missing {
                status: 404,
                reason: "Not Found".to_string()
            }
        );
    }

    #[test]
    fn test_failure_concatenates_errors() {
        let response = ApiResponse::json(
            400,
            &json!({
                "ErrorMessage": "There was a problem with your request.",
                "Errors": ["Version is required", "ProjectId is required"]
            }),
        );
        let ResponseOutcome::Failed(failure) = ResponseOutcome::classify(&response).unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.status, 400);
        assert_eq!(
            failure.message,
            "Bad Request: There was a problem with your request. Version is required. ProjectId is required"
        );
    }

    #[test]
    fn test_failure_includes_help_links() {
        let response = ApiResponse::json(
            409,
            &json!({
                "ErrorMessage": "Release already exists",
                "ParsedHelpLinks": ["https://g.octopushq.com/Releases"]
            }),
        );
        let ResponseOutcome::Failed(failure) = ResponseOutcome::classify(&response).unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(
            failure.message,
            "Conflict: Release already exists (https://g.octopushq.com/Releases)"
        );
    }

    #[test]
    fn test_failure_without_error_message() {
        let response = ApiResponse::json(500, &json!({}));
        let ResponseOutcome::Failed(failure) = ResponseOutcome::classify(&response).unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.message, "Internal Server Error: Unknown error");
    }

    #[test]
    fn test_failure_with_plain_text_body() {
        let response = ApiResponse::new(502, "upstream unavailable\n");
        let ResponseOutcome::Failed(failure) = ResponseOutcome::classify(&response).unwrap() else {
            panic!("expected a failure");
        };
        assert_eq!(failure.message, "upstream unavailable");
    }

    #[test]
    fn test_redirect_is_unexpected() {
        let response = ApiResponse::empty(302);
        assert_eq!(
            ResponseOutcome::classify(&response).unwrap(),
            ResponseOutcome::Unexpected { status: 302 }
        );
    }

    #[test]
    fn test_invalid_json_body() {
        let response = ApiResponse::new(200, "<html>");
        assert!(ResponseOutcome::classify(&response).is_err());
    }
}
