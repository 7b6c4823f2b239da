use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The core's sole output type. Always returned, never thrown: on internal
/// failure `content` carries an apology string instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub agent_id: String,
    pub content: String,
    /// Present only when at least one tool executed and produced a usable
    /// result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
    /// Display-only payloads keyed by tool name; never reinterpreted by the
    /// core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Map<String, Value>>,
    /// Advisory score in [0, 1]; informational only, never used for control
    /// flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

impl AgentResponse {
    pub fn new<A: Into<String>, C: Into<String>>(agent_id: A, content: C) -> Self {
        AgentResponse {
            agent_id: agent_id.into(),
            content: content.into(),
            tools_used: None,
            tool_results: None,
            confidence_score: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>, results: Map<String, Value>) -> Self {
        if !tools.is_empty() {
            self.tools_used = Some(tools);
        }
        if !results.is_empty() {
            self.tool_results = Some(results);
        }
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_tools_omitted() {
        let response = AgentResponse::new("math", "done").with_tools(vec![], Map::new());
        assert!(response.tools_used.is_none());
        assert!(response.tool_results.is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let mut results = Map::new();
        results.insert("calculator".to_string(), json!({"result": 8.0}));
        let response = AgentResponse::new("math", "8")
            .with_tools(vec!["calculator".to_string()], results)
            .with_confidence(0.9);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["agentId"], "math");
        assert_eq!(value["toolsUsed"][0], "calculator");
        assert_eq!(value["toolResults"]["calculator"]["result"], 8.0);
        assert_eq!(value["confidenceScore"], 0.9);
    }
}
