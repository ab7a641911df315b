//! Outbound request body rewriting
//!
//! Clients always speak the OpenAI request format; the body adapter only points
//! the request at the resolved destination.

use crate::domain::route::ModelRoute;
use crate::muxing::constants::{body_fields, paths};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct BodyAdapter;

impl BodyAdapter {
    /// URL to use as `base_url` for the route's provider
    pub fn provider_formatted_url(route: &ModelRoute) -> String {
        let endpoint = route.endpoint.endpoint.as_ref();
        if route.provider_type().needs_v1_suffix() {
            format!("{endpoint}{}", paths::OPENAI_API_PREFIX)
        } else {
            endpoint.to_string()
        }
    }

    /// Copy of `body` targeting the route's model and endpoint
    pub fn set_destination_info(
        &self,
        route: &ModelRoute,
        body: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut rewritten = body.clone();
        rewritten.insert(
            body_fields::MODEL.to_string(),
            Value::String(route.model.name.as_ref().to_string()),
        );
        rewritten.insert(
            body_fields::BASE_URL.to_string(),
            Value::String(Self::provider_formatted_url(route)),
        );
        rewritten
    }
}
