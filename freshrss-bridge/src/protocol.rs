use freshrss_core::{call_tool, ReaderApi};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// One request line: `{"id": .., "tool": "..", "arguments": {..}}`.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, error: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            json!({ "id": self.id, "error": format!("unrenderable response: {err}") }).to_string()
        })
    }
}

pub async fn handle_line(api: &ReaderApi, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "unparseable request line");
            return Response::failure(Value::Null, format!("invalid request: {err}"));
        }
    };

    debug!(id = %request.id, tool = %request.tool, "handling request");
    match call_tool(api, &request.tool, request.arguments).await {
        Ok(result) => Response::success(request.id, result),
        Err(err) => {
            warn!(id = %request.id, tool = %request.tool, error = %err, "tool call failed");
            Response::failure(request.id, err.to_string())
        }
    }
}
