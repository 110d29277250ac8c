use serde::Deserialize;
use utoipa::ToSchema;

/// Replacement allow-list for an open connection.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateFiltersParams {
    /// Event names to receive; empty or `*` receives everything.
    pub event_filters: Vec<String>,
}
