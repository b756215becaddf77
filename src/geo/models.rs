use serde::{Deserialize, Serialize};

use super::LookupError;

/// Location resolved for a single IP address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub country_name: String,
    pub region_name: String,
    pub city: String,
}

/// Body returned by the ipstack `/{ip}` endpoint.
///
/// ipstack answers most failures with HTTP 200 and `success: false`, so both
/// shapes decode into the same struct. Location fields are `null` for
/// reserved and private ranges.
#[derive(Debug, Deserialize)]
pub(crate) struct IpStackResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<IpStackError>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IpStackError {
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

impl IpStackResponse {
    pub(crate) fn into_location(self) -> Result<LocationInfo, LookupError> {
        if let Some(error) = self.error {
            return Err(LookupError::Api {
                code: error.code.unwrap_or_default(),
                kind: error.kind.unwrap_or_default(),
                info: error.info.unwrap_or_default(),
            });
        }

        if self.success == Some(false) {
            return Err(LookupError::Api {
                code: 0,
                kind: "unknown".to_string(),
                info: "upstream reported success=false".to_string(),
            });
        }

        Ok(LocationInfo {
            country_name: self.country_name.unwrap_or_default(),
            region_name: self.region_name.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
        })
    }
}
