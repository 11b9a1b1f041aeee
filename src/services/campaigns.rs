//! Campaign listing (GET /campaigns/)

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::client::KlaviyoClient;
use crate::dates::{parse_iso, DateWindow};
use crate::domain::entities::{CampaignSummary, Channel};
use crate::domain::error::{AuditError, Result};
use crate::filters::campaign_filter;

/// Service for listing campaigns by channel.
///
/// The provider's date filters on campaigns are unreliable, so the request
/// filters by channel only and the date range is applied client-side on
/// `created_at`.
pub struct CampaignsService {
    client: Arc<KlaviyoClient>,
}

impl CampaignsService {
    pub fn new(client: Arc<KlaviyoClient>) -> Self {
        Self { client }
    }

    /// Campaigns on `channel` created inside `window` (when given).
    ///
    /// For the push channel a 400 means the endpoint does not support the
    /// channel; that yields an empty list without retry.
    pub async fn get_campaigns(
        &self,
        window: Option<&DateWindow>,
        channel: Channel,
    ) -> Result<Vec<CampaignSummary>> {
        let filter = campaign_filter(channel.as_str());
        let query = [("filter", filter)];

        let response = match self.client.get("/campaigns/", Some(&query)).await {
            Ok(response) => response,
            Err(AuditError::BadRequest { .. }) if channel == Channel::Push => {
                warn!("push campaigns not supported via campaigns endpoint");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut campaigns = parse_campaigns(&response, channel);

        if let Some(window) = window {
            let before = campaigns.len();
            campaigns.retain(|c| {
                c.created_at
                    .as_deref()
                    .and_then(|raw| parse_iso(raw).ok())
                    .map(|created| created >= window.start && created <= window.end)
                    .unwrap_or(false)
            });
            debug!(
                channel = channel.as_str(),
                fetched = before,
                in_window = campaigns.len(),
                "filtered campaigns by created_at"
            );
        }

        Ok(campaigns)
    }
}

fn parse_campaigns(response: &Value, channel: Channel) -> Vec<CampaignSummary> {
    let Some(items) = response.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?.to_string();
            let attrs = item.get("attributes")?;
            Some(CampaignSummary {
                id,
                name: attrs
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unnamed Campaign")
                    .to_string(),
                channel,
                created_at: attrs
                    .get("created_at")
                    .and_then(Value::as_str)
                    .map(crate::dates::ensure_canonical),
                sent_at: attrs
                    .get("send_time")
                    .and_then(Value::as_str)
                    .map(crate::dates::ensure_canonical),
                statistics: Default::default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_campaigns() {
        let response = json!({
            "data": [
                {"id": "C1", "attributes": {"name": "Spring Sale", "created_at": "2025-10-01T10:00:00+00:00", "send_time": "2025-10-02T09:00:00Z"}},
                {"id": "C2", "attributes": {"name": "Flash", "created_at": "2025-11-01T10:00:00Z"}},
                {"attributes": {"name": "missing id"}}
            ]
        });

        let campaigns = parse_campaigns(&response, Channel::Email);
        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0].created_at.as_deref(), Some("2025-10-01T10:00:00Z"));
        assert_eq!(campaigns[0].sent_at.as_deref(), Some("2025-10-02T09:00:00Z"));
        assert_eq!(campaigns[1].sent_at, None);
    }
}
