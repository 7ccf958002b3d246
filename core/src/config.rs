use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_RISK_TITLE: &str = "Financial Risk Exceeded";
pub const DEFAULT_RISK_BODY: &str =
    "The amount exceeds the credit limit of the customer. Please select another payment method.";

/// What the guard does when the loader left a risk attribute unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingRiskDataPolicy {
    /// Block the sale with a "risk data unavailable" message.
    #[default]
    Block,
    /// Read a missing total or limit as zero and a missing flag as false.
    /// Only safe when the host guarantees the attributes after every sync.
    TreatAsZero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardMessages {
    #[serde(default = "default_risk_title")]
    pub risk_exceeded_title: String,
    #[serde(default = "default_risk_body")]
    pub risk_exceeded_body: String,
}

impl Default for GuardMessages {
    fn default() -> Self {
        Self {
            risk_exceeded_title: default_risk_title(),
            risk_exceeded_body: default_risk_body(),
        }
    }
}

fn default_risk_title() -> String {
    DEFAULT_RISK_TITLE.to_string()
}

fn default_risk_body() -> String {
    DEFAULT_RISK_BODY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GuardConfig {
    #[serde(default)]
    pub missing_risk_data: MissingRiskDataPolicy,
    #[serde(default)]
    pub messages: GuardMessages,
}

impl GuardConfig {
    /// Load from a JSON file. Every field is optional.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: GuardConfig = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn with_missing_risk_data(mut self, policy: MissingRiskDataPolicy) -> Self {
        self.missing_risk_data = policy;
        self
    }
}
