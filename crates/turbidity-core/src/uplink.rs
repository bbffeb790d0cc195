//! JSON telemetry uplink over HTTP(S)
//!
//! The transport and the link-state check are injected; nothing here talks
//! to a global network stack.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;
use core::future::Future;

use embassy_time::Duration;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::config::UplinkConfig;
use crate::wifi::Connectivity;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Code reported by [`UplinkError::code`] when there is no network link
pub const NO_CONNECTIVITY_CODE: i32 = -1;
pub const SERIALIZE_ERROR_CODE: i32 = -2;

/// Server certificate policy for `https` endpoints
///
/// Defaults to `Verify`. Skipping verification must be opted into
/// explicitly and is logged when the uplink is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TlsMode {
    #[default]
    Verify,
    InsecureSkipVerify,
}

/// Report body posted to the collection server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub time: String,
    pub score: u8,
    pub level: u8,
    pub condition: String,
    pub ntu: f32,
}

impl TelemetryPayload {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A single POST handed to the transport
#[derive(Debug, Clone, Copy)]
pub struct PostRequest<'a> {
    pub url: &'a str,
    pub content_type: &'a str,
    pub body: &'a [u8],
    pub tls: TlsMode,
}

/// Transport error carrying a numeric code that is reported verbatim
pub trait TransportError: core::fmt::Debug {
    fn code(&self) -> i32;
}

/// HTTP client capable of posting a body and returning the status code
pub trait HttpTransport {
    type Error: TransportError;

    fn post(
        &mut self,
        request: &PostRequest<'_>,
    ) -> impl Future<Output = Result<u16, Self::Error>>;
}

#[derive(Error, Debug)]
pub enum UplinkError<E> {
    #[error("No network connectivity")]
    NoConnectivity,
    #[error("Payload serialization failed")]
    Serialize,
    #[error("Transport error: {0:?}")]
    Transport(E),
}

impl<E: TransportError> UplinkError<E> {
    /// Numeric code in the convention of the device's serial log:
    /// `-1` without connectivity, the transport's own code otherwise.
    pub fn code(&self) -> i32 {
        match self {
            Self::NoConnectivity => NO_CONNECTIVITY_CODE,
            Self::Serialize => SERIALIZE_ERROR_CODE,
            Self::Transport(e) => e.code(),
        }
    }
}

/// Posts telemetry to one configured endpoint
pub struct Uplink<'a> {
    endpoint: &'a str,
    tls: TlsMode,
}

impl<'a> Uplink<'a> {
    pub fn new(config: &UplinkConfig<'a>) -> Self {
        if config.is_https() && config.tls == TlsMode::InsecureSkipVerify {
            warn!(
                "uplink: certificate verification DISABLED for {}",
                config.endpoint
            );
        }
        Self {
            endpoint: config.endpoint,
            tls: config.tls,
        }
    }

    pub fn endpoint(&self) -> &'a str {
        self.endpoint
    }

    pub fn tls(&self) -> TlsMode {
        self.tls
    }

    /// Serialize and POST `payload`.
    ///
    /// Without connectivity the transport is not touched and
    /// [`UplinkError::NoConnectivity`] is returned. Any status code the
    /// server answers with, including error statuses, is returned as-is.
    pub async fn send<L, T>(
        &self,
        link: &mut L,
        transport: &mut T,
        payload: &TelemetryPayload,
    ) -> Result<u16, UplinkError<T::Error>>
    where
        L: Connectivity,
        T: HttpTransport,
    {
        if !link.is_connected() {
            warn!("uplink: no connectivity, dropping report");
            return Err(UplinkError::NoConnectivity);
        }

        let body = payload.to_json().map_err(|_| {
            error!("uplink: failed to serialize payload");
            UplinkError::Serialize
        })?;

        let request = PostRequest {
            url: self.endpoint,
            content_type: CONTENT_TYPE_JSON,
            body: &body,
            tls: self.tls,
        };

        let status = transport.post(&request).await.map_err(|e| {
            error!("uplink: transport error {:?}", e);
            UplinkError::Transport(e)
        })?;

        info!("uplink: POST {} -> {}", self.endpoint, status);
        Ok(status)
    }
}

/// Collapse a send result into the device's integer response convention
pub fn response_code<E: TransportError>(result: &Result<u16, UplinkError<E>>) -> i32 {
    match result {
        Ok(status) => i32::from(*status),
        Err(e) => e.code(),
    }
}

/// Format an uptime as `HH:MM:SS`; hours keep counting past 99.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let mut out = String::new();
    let _ = write!(
        out,
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use embassy_futures::block_on;

    struct Link(bool);

    impl Connectivity for Link {
        fn is_connected(&mut self) -> bool {
            self.0
        }
    }

    #[derive(Debug, PartialEq)]
    struct FakeError(i32);

    impl TransportError for FakeError {
        fn code(&self) -> i32 {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        status: u16,
        fail_with: Option<i32>,
        posts: Vec<(String, String, Vec<u8>, TlsMode)>,
    }

    impl HttpTransport for RecordingTransport {
        type Error = FakeError;

        async fn post(&mut self, request: &PostRequest<'_>) -> Result<u16, FakeError> {
            self.posts.push((
                request.url.to_string(),
                request.content_type.to_string(),
                request.body.to_vec(),
                request.tls,
            ));
            match self.fail_with {
                Some(code) => Err(FakeError(code)),
                None => Ok(self.status),
            }
        }
    }

    fn payload() -> TelemetryPayload {
        TelemetryPayload {
            time: "00:01:40".to_string(),
            score: 87,
            level: 5,
            condition: "Sangat Bersih".to_string(),
            ntu: 12.5,
        }
    }

    fn uplink() -> Uplink<'static> {
        Uplink::new(&UplinkConfig {
            endpoint: "https://example.com/api/turbidity",
            tls: TlsMode::Verify,
        })
    }

    #[test]
    fn test_payload_field_names() {
        let body = payload().to_json().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["time"], "00:01:40");
        assert_eq!(json["score"], 87);
        assert_eq!(json["level"], 5);
        assert_eq!(json["condition"], "Sangat Bersih");
        assert_eq!(json["ntu"], 12.5);
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_send_posts_json_with_content_type() {
        let mut transport = RecordingTransport {
            status: 201,
            ..Default::default()
        };
        let result = block_on(uplink().send(&mut Link(true), &mut transport, &payload()));
        assert_eq!(result.unwrap(), 201);

        let (url, content_type, body, tls) = &transport.posts[0];
        assert_eq!(url, "https://example.com/api/turbidity");
        assert_eq!(content_type, "application/json");
        assert_eq!(*tls, TlsMode::Verify);
        let sent: TelemetryPayload = serde_json::from_slice(body).unwrap();
        assert_eq!(sent, payload());
    }

    #[test]
    fn test_no_connectivity_skips_transport() {
        let mut transport = RecordingTransport::default();
        let result = block_on(uplink().send(&mut Link(false), &mut transport, &payload()));
        assert!(matches!(result, Err(UplinkError::NoConnectivity)));
        assert_eq!(response_code(&result), -1);
        assert!(transport.posts.is_empty());
    }

    #[test]
    fn test_error_status_is_passed_through() {
        let mut transport = RecordingTransport {
            status: 503,
            ..Default::default()
        };
        let result = block_on(uplink().send(&mut Link(true), &mut transport, &payload()));
        assert_eq!(response_code(&result), 503);
    }

    #[test]
    fn test_transport_error_code_is_passed_through() {
        let mut transport = RecordingTransport {
            fail_with: Some(-11),
            ..Default::default()
        };
        let result = block_on(uplink().send(&mut Link(true), &mut transport, &payload()));
        assert!(matches!(result, Err(UplinkError::Transport(FakeError(-11)))));
        assert_eq!(response_code(&result), -11);
    }

    #[test]
    fn test_insecure_mode_reaches_transport() {
        let insecure = Uplink::new(&UplinkConfig {
            endpoint: "https://example.com/api",
            tls: TlsMode::InsecureSkipVerify,
        });
        let mut transport = RecordingTransport {
            status: 200,
            ..Default::default()
        };
        block_on(insecure.send(&mut Link(true), &mut transport, &payload())).unwrap();
        assert_eq!(transport.posts[0].3, TlsMode::InsecureSkipVerify);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(100)), "00:01:40");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 5)), "03:00:05");
        assert_eq!(format_uptime(Duration::from_secs(120 * 3600)), "120:00:00");
    }
}
