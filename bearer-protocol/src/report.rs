//! The wire record shipped to the logs endpoint, per spec.md §3 `ReportLog`
//! and §6.

use serde::{Deserialize, Serialize};

use crate::{dcr::TriggeredRule, log_level::LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "REQUEST_END")]
    RequestEnd,
    #[serde(rename = "REQUEST_ERROR")]
    RequestError,
    #[serde(rename = "REPORT_LOSS")]
    ReportLoss,
}

/// Always-present fields, plus everything gated behind `Restricted`/`All`.
/// Absent optional fields are simply omitted from the JSON body
/// (`skip_serializing_if = "Option::is_none"`), matching how a tiered
/// detail level naturally serializes in the teacher's wire structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportLog {
    #[serde(rename = "logLevel")]
    pub log_level: LogLevel,
    pub protocol: String,
    pub hostname: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub report_type: ReportType,

    // Restricted+
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "errorFullMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "activeDataCollectionRules", skip_serializing_if = "Option::is_none")]
    pub active_data_collection_rules: Option<Vec<TriggeredRule>>,

    // All
    #[serde(rename = "requestHeaders", skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<serde_json::Value>,
    #[serde(rename = "responseHeaders", skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<serde_json::Value>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(rename = "responseBody", skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(rename = "requestBodyPayloadSha", skip_serializing_if = "Option::is_none")]
    pub request_body_shape_hash: Option<String>,
    #[serde(rename = "responseBodyPayloadSha", skip_serializing_if = "Option::is_none")]
    pub response_body_shape_hash: Option<String>,
}

impl ReportLog {
    /// A bare report with only the always-present fields set, used as the
    /// base that `prepare_report` (in `bearer-agent`) fills in further.
    pub fn minimal(log_level: LogLevel, protocol: &str, hostname: &str, port: u16, report_type: ReportType) -> Self {
        Self {
            log_level,
            protocol: protocol.to_string(),
            hostname: hostname.to_string(),
            port,
            report_type,
            start_time: None,
            end_time: None,
            stage: None,
            path: None,
            method: None,
            url: None,
            status_code: None,
            error_code: None,
            error_message: None,
            active_data_collection_rules: None,
            request_headers: None,
            response_headers: None,
            request_body: None,
            response_body: None,
            request_body_shape_hash: None,
            response_body_shape_hash: None,
        }
    }
}
