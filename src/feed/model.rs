use serde::Deserialize;
use serde_json::Value;

/// `{meta: {...}, response: {...}}` wrapper every feed response uses.
#[derive(Deserialize, Debug, Default)]
pub struct Envelope {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub response: Value,
}

#[derive(Deserialize, Debug, Default)]
pub struct Meta {
    pub code: Option<u16>,
    pub error_type: Option<String>,
    pub error_detail: Option<String>,
}
