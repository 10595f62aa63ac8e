use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use urlencoding::encode;

use crate::config::ServiceConfig;
use crate::coords::GeodeticService;
use crate::error::{CoreResult, Error};

/// Vendor conversion endpoint (`coords`, `from`, `to`, `ak` query).
pub struct HttpGeodeticService {
    client: Client,
    url: String,
    access_key: String,
    geodetic_frame: String,
    projected_frame: String,
}

impl HttpGeodeticService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let access_key = config.access_key().ok_or_else(|| {
            anyhow!(
                "No access key for the conversion service; set service.access_key or {}",
                crate::constants::ACCESS_KEY_ENV
            )
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .user_agent(concat!("aoicrop/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for the conversion service")?;
        Ok(Self {
            client,
            url: config.url().to_string(),
            access_key: access_key.to_string(),
            geodetic_frame: config.geodetic_frame().to_string(),
            projected_frame: config.projected_frame().to_string(),
        })
    }

    fn convert(&self, a: f64, b: f64, from: &str, to: &str) -> CoreResult<(f64, f64)> {
        let url = build_conversion_url(&self.url, a, b, from, to, &self.access_key);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| Error::conversion(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::conversion(format!("service returned status {status}")));
        }
        let body = response
            .text()
            .map_err(|err| Error::conversion(format!("failed to read body: {err}")))?;
        parse_conversion_response(&body)
    }
}

impl GeodeticService for HttpGeodeticService {
    fn geodetic_to_projected(&self, lng: f64, lat: f64) -> CoreResult<(f64, f64)> {
        self.convert(lng, lat, &self.geodetic_frame, &self.projected_frame)
    }

    fn projected_to_geodetic(&self, x: f64, y: f64) -> CoreResult<(f64, f64)> {
        self.convert(x, y, &self.projected_frame, &self.geodetic_frame)
    }
}

pub fn build_conversion_url(
    base: &str,
    first: f64,
    second: f64,
    from: &str,
    to: &str,
    access_key: &str,
) -> String {
    let coords = format!("{first},{second}");
    let params = [
        ("coords", coords.as_str()),
        ("from", from),
        ("to", to),
        ("ak", access_key),
    ];
    let mut url = base.trim_end_matches(['?', '&']).to_string();
    let mut separator = if url.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        url.push(separator);
        url.push_str(key);
        url.push('=');
        url.push_str(&encode(value));
        separator = '&';
    }
    url
}

#[derive(Debug, Deserialize)]
struct ConversionResponse {
    status: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Vec<ConvertedPoint>,
}

#[derive(Debug, Deserialize)]
struct ConvertedPoint {
    x: f64,
    y: f64,
}

/// Extracts the first converted `(x, y)` pair.
pub fn parse_conversion_response(body: &str) -> CoreResult<(f64, f64)> {
    let parsed: ConversionResponse = serde_json::from_str(body)
        .map_err(|err| Error::conversion(format!("malformed response: {err}")))?;
    if parsed.status != 0 {
        let message = parsed.message.unwrap_or_else(|| "no message".to_string());
        return Err(Error::conversion(format!(
            "service status {}: {message}",
            parsed.status
        )));
    }
    parsed
        .result
        .first()
        .map(|point| (point.x, point.y))
        .ok_or_else(|| Error::conversion("response carried no result"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_encoded_query() {
        let url = build_conversion_url(
            "https://api.example.com/geoconv/v1/",
            121.5,
            31.25,
            "5",
            "6",
            "k e y",
        );
        assert_eq!(
            url,
            "https://api.example.com/geoconv/v1/?coords=121.5%2C31.25&from=5&to=6&ak=k%20e%20y"
        );
    }

    #[test]
    fn url_appends_to_existing_query() {
        let url = build_conversion_url("http://svc/conv?output=json", 1.0, 2.0, "6", "5", "abc");
        assert_eq!(
            url,
            "http://svc/conv?output=json&coords=1%2C2&from=6&to=5&ak=abc"
        );
    }

    #[test]
    fn parses_first_result() {
        let body = r#"{"status":0,"result":[{"x":13522765.5,"y":3641092.25},{"x":1,"y":2}]}"#;
        assert_eq!(
            parse_conversion_response(body).unwrap(),
            (13522765.5, 3641092.25)
        );
    }

    #[test]
    fn non_zero_status_is_unavailable() {
        let body = r#"{"status":240,"message":"APP service disabled"}"#;
        let err = parse_conversion_response(body).unwrap_err();
        assert!(matches!(err, Error::ConversionUnavailable { .. }));
        assert!(err.to_string().contains("APP service disabled"));
    }

    #[test]
    fn empty_result_and_garbage_are_unavailable() {
        assert!(parse_conversion_response(r#"{"status":0,"result":[]}"#).is_err());
        assert!(parse_conversion_response("<html>busy</html>").is_err());
    }

    #[test]
    fn missing_access_key_is_reported() {
        let config = ServiceConfig::default();
        let err = HttpGeodeticService::new(&config).err().unwrap();
        assert!(err.to_string().contains("access key"));
    }
}
