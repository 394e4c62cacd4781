//! OpenWeatherMap current-weather client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::IngestError;

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";
const DEFAULT_UNITS: &str = "metric";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// WeatherLocation
// ---------------------------------------------------------------------------

/// Where to read the weather, taken from a source's config.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherLocation {
    /// City query such as `"London,GB"`.
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl WeatherLocation {
    /// Read `city`, or `lat` + `lon`, from a source config. `city` wins
    /// when both are present.
    pub fn from_config(config: &Value) -> Result<Self, IngestError> {
        if let Some(city) = config.get("city").and_then(Value::as_str) {
            let city = city.trim();
            if !city.is_empty() {
                return Ok(Self::City(city.to_string()));
            }
        }
        match (
            config.get("lat").and_then(Value::as_f64),
            config.get("lon").and_then(Value::as_f64),
        ) {
            (Some(lat), Some(lon)) => Ok(Self::Coordinates { lat, lon }),
            _ => Err(IngestError::InvalidConfig(
                "source config needs 'city' or both 'lat' and 'lon'".into(),
            )),
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::City(city) => vec![("q", city.clone())],
            Self::Coordinates { lat, lon } => vec![("lat", lat.to_string()), ("lon", lon.to_string())],
        }
    }
}

/// Units requested from the API (`standard`, `metric`, `imperial`).
pub fn units_from_config(config: &Value) -> &str {
    config
        .get("units")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_UNITS)
}

// ---------------------------------------------------------------------------
// OpenWeatherClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the raw current-weather document.
    pub async fn current_weather(
        &self,
        api_key: &str,
        location: &WeatherLocation,
        units: &str,
    ) -> Result<Value, IngestError> {
        let mut query = location.query();
        query.push(("units", units.to_string()));
        query.push(("appid", api_key.to_string()));

        let response = self
            .client
            .get(format!("{}{CURRENT_WEATHER_PATH}", self.base_url))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::HttpStatus(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

impl Default for OpenWeatherClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Flatten a current-weather document into the payload triggers read.
///
/// `temp` is required; the other readings are `null` when the API omits
/// them. `observed_at` comes from `dt` (RFC 3339, UTC).
pub fn normalize_weather(raw: &Value) -> Result<Value, IngestError> {
    let main = raw.get("main");
    let reading = |field: &str| main.and_then(|m| m.get(field)).and_then(Value::as_f64);

    let temp = reading("temp")
        .ok_or_else(|| IngestError::UnexpectedResponse("missing main.temp".into()))?;

    let observed_at = raw
        .get("dt")
        .and_then(Value::as_i64)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

    Ok(json!({
        "temp": temp,
        "feels_like": reading("feels_like"),
        "humidity": reading("humidity"),
        "pressure": reading("pressure"),
        "wind_speed": raw.get("wind").and_then(|w| w.get("speed")).and_then(Value::as_f64),
        "city": raw.get("name").and_then(Value::as_str),
        "observed_at": observed_at.map(|t| t.to_rfc3339()),
    }))
}

/// Observation time of a normalized payload.
pub fn observed_at(payload: &Value) -> Option<DateTime<Utc>> {
    payload
        .get("observed_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample() -> Value {
        json!({
            "coord": {"lon": 13.41, "lat": 52.52},
            "main": {"temp": 21.4, "feels_like": 20.9, "pressure": 1012, "humidity": 48},
            "wind": {"speed": 3.6, "deg": 240},
            "dt": 1_760_000_000,
            "name": "Berlin"
        })
    }

    #[test]
    fn normalize_flattens_readings() {
        let payload = normalize_weather(&sample()).unwrap();
        assert_eq!(payload["temp"], 21.4);
        assert_eq!(payload["feels_like"], 20.9);
        assert_eq!(payload["humidity"], 48.0);
        assert_eq!(payload["pressure"], 1012.0);
        assert_eq!(payload["wind_speed"], 3.6);
        assert_eq!(payload["city"], "Berlin");
        assert_eq!(
            observed_at(&payload),
            DateTime::<Utc>::from_timestamp(1_760_000_000, 0)
        );
    }

    #[test]
    fn normalize_tolerates_missing_optional_readings() {
        let payload = normalize_weather(&json!({"main": {"temp": -4}})).unwrap();
        assert_eq!(payload["temp"], -4.0);
        assert!(payload["wind_speed"].is_null());
        assert!(payload["city"].is_null());
        assert_eq!(observed_at(&payload), None);
    }

    #[test]
    fn normalize_requires_temperature() {
        assert_matches!(
            normalize_weather(&json!({"cod": 401, "message": "Invalid API key"})),
            Err(IngestError::UnexpectedResponse(_))
        );
    }

    #[test]
    fn location_from_config() {
        assert_eq!(
            WeatherLocation::from_config(&json!({"city": " London,GB "})).unwrap(),
            WeatherLocation::City("London,GB".into())
        );
        assert_eq!(
            WeatherLocation::from_config(&json!({"lat": 52.5, "lon": 13.4})).unwrap(),
            WeatherLocation::Coordinates { lat: 52.5, lon: 13.4 }
        );
        assert_eq!(
            WeatherLocation::from_config(&json!({"city": "Oslo", "lat": 1.0, "lon": 2.0})).unwrap(),
            WeatherLocation::City("Oslo".into())
        );
        assert_matches!(
            WeatherLocation::from_config(&json!({"lat": 52.5})),
            Err(IngestError::InvalidConfig(_))
        );
        assert_matches!(
            WeatherLocation::from_config(&json!({"city": ""})),
            Err(IngestError::InvalidConfig(_))
        );
    }

    #[test]
    fn units_default_to_metric() {
        assert_eq!(units_from_config(&json!({})), "metric");
        assert_eq!(units_from_config(&json!({"units": "imperial"})), "imperial");
    }

    /// Serve one canned HTTP response and hand back the request line.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn current_weather_sends_location_units_and_key() {
        let (base, server) = serve_once("200 OK", sample().to_string()).await;
        let client = OpenWeatherClient::new(base);

        let raw = client
            .current_weather("k-1", &WeatherLocation::City("Berlin".into()), "metric")
            .await
            .unwrap();
        assert_eq!(raw["name"], "Berlin");

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /data/2.5/weather?"));
        assert!(request_line.contains("q=Berlin"));
        assert!(request_line.contains("units=metric"));
        assert!(request_line.contains("appid=k-1"));
    }

    #[tokio::test]
    async fn current_weather_reports_http_errors() {
        let (base, _server) =
            serve_once("401 Unauthorized", json!({"cod": 401}).to_string()).await;
        let result = OpenWeatherClient::new(base)
            .current_weather("bad", &WeatherLocation::Coordinates { lat: 1.0, lon: 2.0 }, "metric")
            .await;
        assert_matches!(result, Err(IngestError::HttpStatus(401)));
    }
}
