pub(crate) mod tenant_context;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
