//! The `{runtime, agent, application, secretKey}` envelope shared by the
//! fetch and logs endpoints (spec.md §6).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    pub version: String,
    pub arch: String,
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub hostname: String,
}

impl RuntimeInfo {
    pub fn detect() -> Self {
        RuntimeInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            arch: std::env::consts::ARCH.to_string(),
            platform: std::env::consts::OS.to_string(),
            kind: "rust".to_string(),
            hostname: hostname(),
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
}

impl Default for AgentInfo {
    fn default() -> Self {
        AgentInfo {
            kind: "rust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationInfo {
    pub environment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchEnvelope {
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    #[serde(rename = "appEnvironment")]
    pub app_environment: String,
    pub application: ApplicationInfo,
    pub runtime: RuntimeInfo,
    pub agent: AgentInfo,
}
