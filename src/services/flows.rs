//! Flow structure traversal (GET /flows/ and descendants)

use std::sync::Arc;

use serde_json::Value;

use crate::client::KlaviyoClient;
use crate::domain::entities::FlowStatus;
use crate::domain::error::Result;

/// A flow as listed by the provider, before statistics are attached
#[derive(Debug, Clone)]
pub struct FlowRecord {
    pub id: String,
    pub name: String,
    pub status: FlowStatus,
}

/// One action inside a flow
#[derive(Debug, Clone)]
pub struct FlowAction {
    pub id: String,
    pub action_type: String,
    pub name: String,
}

impl FlowAction {
    pub fn is_email(&self) -> bool {
        self.action_type.eq_ignore_ascii_case("EMAIL")
    }
}

/// Service for flow structure: flows, their actions, and the messages
/// under an action.
pub struct FlowsService {
    client: Arc<KlaviyoClient>,
}

impl FlowsService {
    pub fn new(client: Arc<KlaviyoClient>) -> Self {
        Self { client }
    }

    pub async fn get_flows(&self) -> Result<Vec<FlowRecord>> {
        let response = self.client.get("/flows/", None).await?;
        Ok(parse_flows(&response))
    }

    pub async fn get_flow(&self, flow_id: &str) -> Result<Option<FlowRecord>> {
        let response = self.client.get(&format!("/flows/{flow_id}/"), None).await?;
        Ok(response.get("data").and_then(parse_flow))
    }

    pub async fn get_flow_actions(&self, flow_id: &str) -> Result<Vec<FlowAction>> {
        let response = self
            .client
            .get(&format!("/flows/{flow_id}/flow-actions/"), None)
            .await?;
        Ok(parse_actions(&response))
    }

    pub async fn get_flow_messages(&self, action_id: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(&format!("/flow-actions/{action_id}/flow-messages/"), None)
            .await?;
        Ok(response
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

fn parse_flow(item: &Value) -> Option<FlowRecord> {
    let id = item.get("id")?.as_str()?.to_string();
    let attrs = item.get("attributes")?;
    Some(FlowRecord {
        id,
        name: attrs
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unnamed Flow")
            .to_string(),
        status: attrs
            .get("status")
            .and_then(Value::as_str)
            .map(FlowStatus::parse)
            .unwrap_or(FlowStatus::Unknown),
    })
}

fn parse_flows(response: &Value) -> Vec<FlowRecord> {
    response
        .get("data")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_flow).collect())
        .unwrap_or_default()
}

fn parse_actions(response: &Value) -> Vec<FlowAction> {
    let Some(items) = response.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?.to_string();
            let attrs = item.get("attributes")?;
            Some(FlowAction {
                id,
                action_type: attrs
                    .get("action_type")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                name: attrs
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flows() {
        let response = json!({
            "data": [
                {"id": "F1", "attributes": {"name": "Welcome Series", "status": "live"}},
                {"id": "F2", "attributes": {"name": "AC - Recovery", "status": "draft"}}
            ]
        });

        let flows = parse_flows(&response);
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].status, FlowStatus::Live);
        assert_eq!(flows[1].status, FlowStatus::Draft);
    }

    #[test]
    fn test_email_action_detection() {
        let response = json!({
            "data": [
                {"id": "A1", "attributes": {"action_type": "EMAIL", "name": "Email 1"}},
                {"id": "A2", "attributes": {"action_type": "TIME_DELAY", "name": ""}},
                {"id": "A3", "attributes": {"action_type": "EMAIL", "name": "Email 2"}}
            ]
        });

        let actions = parse_actions(&response);
        assert_eq!(actions.iter().filter(|a| a.is_email()).count(), 2);
    }
}
