use std::time::Duration;

use serde::Deserialize;

use crate::args::OutputFormat;
use crate::args::parsers::parse_duration_value;
use crate::error::ValidationError;

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub endpoint: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<Vec<String>>,
    #[serde(alias = "data")]
    pub body: Option<String>,
    #[serde(alias = "requests")]
    pub count: Option<usize>,
    #[serde(alias = "max_in_flight")]
    pub concurrency: Option<usize>,
    pub timeout: Option<DurationValue>,
    pub status: Option<u16>,
    pub service_name: Option<String>,
    pub no_export: Option<bool>,
    pub output_format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => parse_duration_value(text),
        }
    }
}
