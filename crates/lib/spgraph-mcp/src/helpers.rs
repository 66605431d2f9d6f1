use std::borrow::Cow;

use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use spgraph_core::control::ControlError;
use tracing::error;

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

pub fn map_err(err: ControlError) -> ErrorData {
    error!(error = %err, "tool call failed");
    mcp_err(ErrorCode::INTERNAL_ERROR, err.to_string())
}
