//! Transport abstraction and the default fallback handlers.
//!
//! The pipeline never talks to the network itself. It serializes the
//! envelope and hands it to a [`Transport`], which is free to be an HTTP
//! client, a message queue, or a canned responder in tests. The
//! [`TransportFallback`] extension wires the transport into the pipeline at
//! the lowest priority, so any extension-supplied handler that stops
//! propagation first wins.

use std::fs;
use tracing::debug;

use crate::bus::{EventContext, FALLBACK_PRIORITY};
use crate::envelope::SoapVersion;
use crate::error::SoapError;
use crate::event::{EventKind, PipelineEvent};
use crate::extension::{Extension, Subscription};

/// An outgoing request as seen by a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Serialized envelope, UTF-8 XML text.
    pub envelope: String,
    /// Endpoint URI.
    pub location: String,
    /// SOAP action.
    pub action: String,
    /// Negotiated SOAP version; decides the content type.
    pub version: SoapVersion,
    /// Whether a response body is expected.
    pub one_way: bool,
}

/// What a transport produced for a request.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// Raw response body text.
    pub body: String,
    /// Request header text as sent, if the transport captures it.
    pub request_headers: Option<String>,
    /// Response header text as received, if the transport captures it.
    pub response_headers: Option<String>,
}

/// Byte-stream abstraction used by the default WSDL-fetch and request
/// fallbacks. Timeouts are the transport's responsibility; the pipeline
/// has no cancellation primitive.
pub trait Transport {
    /// Fetch WSDL text from a URI or path.
    fn fetch(&mut self, uri: &str) -> Result<String, SoapError>;

    /// Deliver a serialized envelope and return the raw response.
    fn send(&mut self, request: &TransportRequest) -> Result<TransportResponse, SoapError>;
}

/// Filesystem-only transport: resolves `file://` URIs and plain paths for
/// WSDL loading, and refuses to send requests.
///
/// This is the construction-time default; making actual calls requires
/// either a real transport or a Request listener that produces responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for LocalTransport {
    fn fetch(&mut self, uri: &str) -> Result<String, SoapError> {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        fs::read_to_string(path)
            .map_err(|e| SoapError::WsdlLoad(format!("failed to read {path}: {e}")))
    }

    fn send(&mut self, _request: &TransportRequest) -> Result<TransportResponse, SoapError> {
        Err(SoapError::Transport(
            "LocalTransport cannot send requests; configure a transport or a request listener"
                .to_string(),
        ))
    }
}

/// Lowest-priority default handlers for WSDL loading and request I/O.
///
/// Subscribed by the client after all user listeners and extensions.
pub struct TransportFallback {
    transport: Box<dyn Transport>,
}

impl TransportFallback {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl Extension for TransportFallback {
    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::WsdlRequest, FALLBACK_PRIORITY),
            Subscription::new(EventKind::Request, FALLBACK_PRIORITY),
        ]
    }

    fn on_event(
        &mut self,
        event: &mut PipelineEvent,
        ctx: &mut EventContext,
    ) -> Result<(), SoapError> {
        match event {
            PipelineEvent::WsdlRequest(request) => {
                if request.wsdl.is_none() {
                    debug!(uri = %request.uri, "fetching WSDL via transport fallback");
                    request.wsdl = Some(self.transport.fetch(&request.uri)?);
                    ctx.stop_propagation();
                }
            }
            PipelineEvent::Request(request) => {
                // An earlier handler that produced a response without
                // stopping propagation keeps its response.
                if request.response.is_none() {
                    debug!(
                        location = %request.location,
                        action = %request.action,
                        "sending request via transport fallback"
                    );
                    let outgoing = TransportRequest {
                        envelope: request.document.to_xml(),
                        location: request.location.clone(),
                        action: request.action.clone(),
                        version: request.soap_version,
                        one_way: request.one_way,
                    };
                    let reply = self.transport.send(&outgoing)?;
                    request.response = Some(reply.body);
                    request.request_headers = reply.request_headers;
                    request.response_headers = reply.response_headers;
                    ctx.stop_propagation();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
