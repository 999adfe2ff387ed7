//! Pipeline event kinds and their payloads.
//!
//! One event fires per lifecycle phase. Every payload is a plain mutable
//! record: handlers observe and may overwrite earlier handlers' mutations
//! (last writer wins within a dispatch). The payloads live only for the
//! duration of one dispatch call.

use crate::document::{XmlDocument, XmlElement};
use crate::envelope::SoapVersion;
use crate::error::SoapFault;

/// Names of the pipeline phases an extension can hook into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Before any WSDL access; a handler may supply the WSDL text itself.
    WsdlRequest,
    /// After the WSDL parsed; handlers may rewrite the document tree.
    WsdlResponse,
    /// Before the underlying call; method name and arguments are mutable.
    Call,
    /// Outgoing envelope ready; a handler performs the actual transport.
    Request,
    /// Incoming envelope parsed; handlers may rewrite it.
    Response,
    /// An application fault was returned; handlers may suppress it.
    Fault,
    /// Final transformation point for the call result.
    Finish,
}

impl EventKind {
    /// Stable string name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WsdlRequest => "wsdl_request",
            Self::WsdlResponse => "wsdl_response",
            Self::Call => "call",
            Self::Request => "request",
            Self::Response => "response",
            Self::Fault => "fault",
            Self::Finish => "finish",
        }
    }
}

/// Payload for [`EventKind::WsdlRequest`].
///
/// Produced before any network or file access. A handler that supplies
/// `wsdl` content should stop propagation so the fallback fetch never runs.
#[derive(Debug, Clone)]
pub struct WsdlRequestEvent {
    /// URI or path the WSDL would be fetched from.
    pub uri: String,
    /// WSDL text supplied by a handler, if any.
    pub wsdl: Option<String>,
}

/// Payload for [`EventKind::WsdlResponse`].
///
/// Carries the parsed WSDL tree. Handlers may rewrite it in place (for
/// example, inject missing metadata) or inspect it to set extension flags;
/// the serialized result becomes the effective WSDL.
#[derive(Debug, Clone)]
pub struct WsdlResponseEvent {
    /// The parsed WSDL document.
    pub document: XmlDocument,
}

/// Payload for [`EventKind::Call`].
#[derive(Debug, Clone)]
pub struct CallEvent {
    /// Method name, rewritable before the underlying call.
    pub method: String,
    /// Ordered argument fragments placed inside the operation element.
    pub arguments: Vec<XmlElement>,
}

/// Payload for [`EventKind::Request`].
///
/// A handler that sets `response` should stop propagation so no later
/// handler overwrites it; the lowest-priority fallback delegates to the
/// configured transport.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// The outgoing SOAP envelope.
    pub document: XmlDocument,
    /// Endpoint URI.
    pub location: String,
    /// SOAP action.
    pub action: String,
    /// Negotiated SOAP version.
    pub soap_version: SoapVersion,
    /// Whether the operation expects no response.
    pub one_way: bool,
    /// Raw response text, unset until a transport handler provides it.
    pub response: Option<String>,
    /// Request header text captured at transport time.
    pub request_headers: Option<String>,
    /// Response header text captured at transport time.
    pub response_headers: Option<String>,
}

/// Payload for [`EventKind::Response`].
///
/// Only created once the raw response parsed as a well-formed envelope for
/// the negotiated SOAP version.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    /// The parsed response envelope.
    pub document: XmlDocument,
    /// Response header text, carried over from transport capture.
    pub response_headers: Option<String>,
}

/// Payload for [`EventKind::Fault`].
#[derive(Debug, Clone)]
pub struct FaultEvent {
    /// The fault being escalated.
    pub fault: SoapFault,
    /// Last request envelope text, when tracing was enabled.
    pub last_request: Option<String>,
    /// Last request header text, when tracing was enabled.
    pub last_request_headers: Option<String>,
    /// Last response text, when tracing was enabled.
    pub last_response: Option<String>,
    /// Last response header text, when tracing was enabled.
    pub last_response_headers: Option<String>,
    /// Substitute result: becomes the call's return value if a handler
    /// stops propagation.
    pub response: Option<XmlDocument>,
}

/// Payload for [`EventKind::Finish`].
#[derive(Debug, Clone)]
pub struct FinishEvent {
    /// The call's result, rewritable before it is returned.
    pub response: Option<XmlDocument>,
}

/// A dispatched pipeline event: one variant per [`EventKind`].
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    WsdlRequest(WsdlRequestEvent),
    WsdlResponse(WsdlResponseEvent),
    Call(CallEvent),
    Request(RequestEvent),
    Response(ResponseEvent),
    Fault(FaultEvent),
    Finish(FinishEvent),
}

impl PipelineEvent {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::WsdlRequest(_) => EventKind::WsdlRequest,
            Self::WsdlResponse(_) => EventKind::WsdlResponse,
            Self::Call(_) => EventKind::Call,
            Self::Request(_) => EventKind::Request,
            Self::Response(_) => EventKind::Response,
            Self::Fault(_) => EventKind::Fault,
            Self::Finish(_) => EventKind::Finish,
        }
    }

    pub fn into_wsdl_request(self) -> Option<WsdlRequestEvent> {
        match self {
            Self::WsdlRequest(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_wsdl_response(self) -> Option<WsdlResponseEvent> {
        match self {
            Self::WsdlResponse(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_call(self) -> Option<CallEvent> {
        match self {
            Self::Call(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_request(self) -> Option<RequestEvent> {
        match self {
            Self::Request(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<ResponseEvent> {
        match self {
            Self::Response(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_fault(self) -> Option<FaultEvent> {
        match self {
            Self::Fault(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_finish(self) -> Option<FinishEvent> {
        match self {
            Self::Finish(event) => Some(event),
            _ => None,
        }
    }
}
