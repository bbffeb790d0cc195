//! reqwless HTTP client over the embassy-net stack

use alloc::boxed::Box;
use alloc::vec;

use embassy_net::Stack;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embedded_nal_async::{Dns, TcpConnect};
use log::{debug, error};
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::{Method, RequestBuilder};
use thiserror_no_std::Error;
use turbidity_core::uplink::{HttpTransport, PostRequest, TlsMode, TransportError};

const RX_BUFFER_SIZE: usize = 4096;
/// Largest TLS record plus header
const TLS_BUFFER_SIZE: usize = 16_640;

// Negative codes use the Arduino HTTPClient numbering
const CODE_CONNECTION_REFUSED: i32 = -1;
const CODE_SEND_FAILED: i32 = -3;
const CODE_CONNECTION_LOST: i32 = -5;
const CODE_NO_HTTP_SERVER: i32 = -7;
const CODE_TOO_LESS_RAM: i32 = -8;
const CODE_ENCODING: i32 = -9;
const CODE_TLS: i32 = -20;
const CODE_TLS_VERIFICATION_UNAVAILABLE: i32 = -21;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0:?}")]
    Request(reqwless::Error),
    #[error("Certificate verification is not available on this device")]
    TlsVerificationUnavailable,
}

impl TransportError for HttpError {
    fn code(&self) -> i32 {
        match self {
            Self::TlsVerificationUnavailable => CODE_TLS_VERIFICATION_UNAVAILABLE,
            Self::Request(e) => match e {
                reqwless::Error::Dns => CODE_NO_HTTP_SERVER,
                reqwless::Error::Network(_) => CODE_CONNECTION_LOST,
                reqwless::Error::ConnectionAborted => CODE_CONNECTION_REFUSED,
                reqwless::Error::BufferTooSmall => CODE_TOO_LESS_RAM,
                reqwless::Error::Codec | reqwless::Error::InvalidUrl(_) => CODE_ENCODING,
                reqwless::Error::Tls(_) => CODE_TLS,
                _ => CODE_SEND_FAILED,
            },
        }
    }
}

impl From<reqwless::Error> for HttpError {
    fn from(err: reqwless::Error) -> Self {
        Self::Request(err)
    }
}

/// POSTs through a fresh connection per request
///
/// `https` endpoints only work with [`TlsMode::InsecureSkipVerify`]; the
/// TLS stack here has no certificate store to verify against.
pub struct ReqwlessTransport {
    stack: Stack<'static>,
    seed: u64,
    rx_buffer: Box<[u8]>,
    tls_read: Box<[u8]>,
    tls_write: Box<[u8]>,
}

impl ReqwlessTransport {
    pub fn new(stack: Stack<'static>, seed: u64) -> Self {
        Self {
            stack,
            seed,
            rx_buffer: vec![0; RX_BUFFER_SIZE].into_boxed_slice(),
            tls_read: vec![0; TLS_BUFFER_SIZE].into_boxed_slice(),
            tls_write: vec![0; TLS_BUFFER_SIZE].into_boxed_slice(),
        }
    }
}

async fn execute<T, D>(
    client: &mut HttpClient<'_, T, D>,
    request: &PostRequest<'_>,
    rx_buffer: &mut [u8],
) -> Result<u16, HttpError>
where
    T: TcpConnect,
    D: Dns,
{
    let headers = [("Content-Type", request.content_type)];
    let mut handle = client
        .request(Method::POST, request.url)
        .await?
        .headers(&headers)
        .body(request.body);

    let response = handle.send(rx_buffer).await?;
    Ok(response.status.0)
}

impl HttpTransport for ReqwlessTransport {
    type Error = HttpError;

    async fn post(&mut self, request: &PostRequest<'_>) -> Result<u16, HttpError> {
        let https = request.url.starts_with("https://");
        if https && request.tls == TlsMode::Verify {
            error!("http: refusing https without certificate verification support");
            return Err(HttpError::TlsVerificationUnavailable);
        }

        let state = TcpClientState::<1, 1024, 1024>::new();
        let tcp = TcpClient::new(self.stack, &state);
        let dns = DnsSocket::new(self.stack);
        debug!("http: POST {} ({} bytes)", request.url, request.body.len());

        if https {
            self.seed = self.seed.wrapping_add(1);
            let tls = TlsConfig::new(
                self.seed,
                &mut self.tls_read,
                &mut self.tls_write,
                TlsVerify::None,
            );
            let mut client = HttpClient::new_with_tls(&tcp, &dns, tls);
            execute(&mut client, request, &mut self.rx_buffer).await
        } else {
            let mut client = HttpClient::new(&tcp, &dns);
            execute(&mut client, request, &mut self.rx_buffer).await
        }
    }
}
