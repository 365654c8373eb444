//! HTTP delivery of message batches to peers.
//!
//! [`PeerClient`] abstracts the act of posting one [`Envelope`] to one peer so
//! the batching layer can be tested without a network. [`HttpPeerClient`] is
//! the production implementation.

use async_trait::async_trait;
use dws_auth::Credential;
use dws_core::DeviceDescriptor;
use reqwest::header::AUTHORIZATION;

use crate::config::TransportConfig;
use crate::envelope::Envelope;
use crate::error::{Result, TransportError};

/// Delivers message batches to peers.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Post one batch to `peer`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the request cannot be completed and
    /// `TransportError::Rejected` if the peer answers with a non-success status.
    async fn post_batch(&self, peer: &DeviceDescriptor, envelope: &Envelope) -> Result<()>;
}

/// Posts batches over HTTPS with Basic authentication.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
    credential: Credential,
    config: TransportConfig,
}

impl HttpPeerClient {
    /// Create a client for the shared peer credential.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Setup` if the underlying HTTP client cannot be
    /// built.
    pub fn new(credential: Credential, config: TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.allow_insecure_https)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self::with_client(client, credential, config))
    }

    /// Create a client around a preconfigured `reqwest::Client`.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        credential: Credential,
        config: TransportConfig,
    ) -> Self {
        Self {
            client,
            credential,
            config,
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn post_batch(&self, peer: &DeviceDescriptor, envelope: &Envelope) -> Result<()> {
        let url = self.config.endpoint_url(&peer.address);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.credential.authorization_header())
            .json(envelope)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                peer = %peer.role,
                address = %peer.address,
                count = envelope.messages.len(),
                "Delivered batch"
            );
            Ok(())
        } else {
            Err(TransportError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

/// A client that records batches instead of sending them.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingPeerClient {
    batches: parking_lot::Mutex<Vec<(DeviceDescriptor, Envelope)>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingPeerClient {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent post fail (after recording it).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// All batches posted so far.
    #[must_use]
    pub fn batches(&self) -> Vec<(DeviceDescriptor, Envelope)> {
        self.batches.lock().clone()
    }

    /// Every payload posted so far, flattened in delivery order.
    #[must_use]
    pub fn payloads(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flat_map(|(_, envelope)| envelope.messages.iter().cloned())
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PeerClient for RecordingPeerClient {
    async fn post_batch(&self, peer: &DeviceDescriptor, envelope: &Envelope) -> Result<()> {
        self.batches.lock().push((peer.clone(), envelope.clone()));
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            Err(TransportError::Http("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope() -> Envelope {
        Envelope {
            app: "divisibleWorkspaces".into(),
            source: "10.0.0.1".into(),
            messages: vec!["divisibleWorkspaces-Primary-heartbeat".into()],
        }
    }

    fn client() -> HttpPeerClient {
        let config = TransportConfig {
            scheme: "http".into(),
            ..TransportConfig::default()
        };
        HttpPeerClient::new(Credential::new("user", "pass").unwrap(), config).unwrap()
    }

    fn peer_at(server: &MockServer) -> DeviceDescriptor {
        let address = server.address().to_string();
        DeviceDescriptor::parse("Secondary", &address, "BBBBBBBBBBBB").unwrap()
    }

    #[tokio::test]
    async fn posts_authenticated_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(body_json(envelope()))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        client()
            .post_batch(&peer_at(&server), &envelope())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client()
            .post_batch(&peer_at(&server), &envelope())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 401 }));
        assert!(err.is_delivery_failure());
    }

    #[tokio::test]
    async fn recording_client_can_fail() {
        let recorder = RecordingPeerClient::new();
        let peer = DeviceDescriptor::parse("Secondary", "10.0.0.2", "BBBBBBBBBBBB").unwrap();

        recorder.set_failing(true);
        assert!(recorder.post_batch(&peer, &envelope()).await.is_err());
        assert_eq!(recorder.batches().len(), 1);
    }
}
