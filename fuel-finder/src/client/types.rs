//! Fuel Finder API request and response DTOs.
//!
//! Field names match the upstream JSON. Records are deserialized leniently:
//! missing fields fall back to their defaults so that a sparse record does
//! not fail a whole batch.

use serde::{Deserialize, Serialize};

/// OAuth token held by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Empty when the issuer answered without a token.
    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    /// Value of the `Authorization` header for this token.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Apply a renewal response. Fields the renewal omits are kept.
    pub fn merge(&mut self, renewal: TokenRenewal) {
        self.access_token = renewal.access_token;
        if let Some(token_type) = renewal.token_type {
            self.token_type = token_type;
        }
        if let Some(expires_in) = renewal.expires_in {
            self.expires_in = expires_in;
        }
        if let Some(refresh_token) = renewal.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
    }
}

/// Envelope returned by `oauth/generate_access_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Option<OAuthToken>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Token fields returned by `oauth/regenerate_access_token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRenewal {
    #[serde(default)]
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
}

/// Body of the token issuance request.
#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

/// Body of the token renewal request.
#[derive(Debug, Serialize)]
pub(crate) struct RenewalRequest<'a> {
    pub client_id: &'a str,
    pub refresh_token: &'a str,
}

/// Station metadata from `pfs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelStation {
    pub node_id: String,
    pub mft_organisation_name: String,
    pub public_phone_number: Option<String>,
    pub trading_name: String,
    pub is_same_trading_and_brand_name: bool,
    pub brand_name: String,
    pub temporary_closure: bool,
    pub permanent_closure: Option<bool>,
    pub permanent_closure_date: Option<String>,
    pub is_motorway_service_station: bool,
    pub is_supermarket_service_station: bool,
    pub location: Location,
    pub amenities: Vec<String>,
    pub opening_times: OpeningTimes,
    pub fuel_types: Vec<String>,
}

/// Price list from `pfs/fuel-prices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelPrice {
    pub node_id: String,
    pub mft_organisation_name: String,
    pub public_phone_number: Option<String>,
    pub trading_name: String,
    pub fuel_prices: Vec<FuelPriceEntry>,
}

/// Price of one fuel grade. Prices are sent as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelPriceEntry {
    pub fuel_type: String,
    pub price: String,
    pub price_last_updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub address_line_1: String,
    pub address_line_2: String,
    pub city: String,
    pub country: String,
    pub county: String,
    pub postcode: String,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningTimes {
    pub usual_days: UsualDays,
    pub bank_holiday: BankHoliday,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsualDays {
    pub monday: DayOpeningTime,
    pub tuesday: DayOpeningTime,
    pub wednesday: DayOpeningTime,
    pub thursday: DayOpeningTime,
    pub friday: DayOpeningTime,
    pub saturday: DayOpeningTime,
    pub sunday: DayOpeningTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayOpeningTime {
    pub open: String,
    pub close: String,
    pub is_24_hours: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankHoliday {
    #[serde(rename = "type")]
    pub kind: String,
    pub open_time: String,
    pub close_time: String,
    pub is_24_hours: bool,
}
