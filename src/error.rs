//! Error types for the SOAP pipeline.
//!
//! Every failure that can cross the client boundary is folded into
//! [`SoapError`]: callers only ever observe this type or a successful
//! result, never raw parser or transport internals.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::envelope::SoapVersion;

/// SOAP pipeline errors.
#[derive(Error, Debug)]
pub enum SoapError {
    /// No handler produced WSDL content, or the content did not parse.
    #[error("WSDL load error: {0}")]
    WsdlLoad(String),

    /// The requested method is not declared by the service description.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Transport-level failure (WSDL fetch or request send).
    #[error("transport error: {0}")]
    Transport(String),

    /// No handler produced response content for the request.
    #[error("no response could be generated for the request")]
    NoResponse,

    /// The response text did not parse as an envelope for the negotiated
    /// SOAP version. The raw text is preserved for diagnosis.
    #[error("response is not a SOAP response")]
    NotSoapResponse(String),

    /// A handler failed while the request event was being dispatched.
    #[error("request dispatch failed: {0}")]
    RequestDispatch(#[source] Box<SoapError>),

    /// A handler failed while the response event was being dispatched.
    #[error("response dispatch failed: {0}")]
    ResponseDispatch(#[source] Box<SoapError>),

    /// An application-level fault returned by the service.
    #[error("SOAP fault [{}] {}", .0.code, .0.message)]
    Fault(SoapFault),

    /// A handler misbehaved in a way the pipeline cannot recover from.
    #[error("handler error: {0}")]
    Handler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An application fault carried in a response Body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoapFault {
    /// Fault code (e.g. `soap:Client`, `env:Receiver`).
    pub code: String,
    /// Human-readable fault reason.
    pub message: String,
    /// Optional application-specific detail text.
    pub detail: Option<String>,
}

impl SoapFault {
    /// Create a new fault without detail.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// Create a fault with detail text.
    pub fn with_detail(
        code: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Render a fault as a complete envelope for the given SOAP version.
///
/// SOAP 1.1 uses `faultcode`/`faultstring`/`detail`; SOAP 1.2 uses
/// `Code/Value`, `Reason/Text` and `Detail`.
pub fn fault_envelope(fault: &SoapFault, version: SoapVersion) -> String {
    match version {
        SoapVersion::Soap11 => soap_11_fault(fault),
        SoapVersion::Soap12 => soap_12_fault(fault),
    }
}

fn soap_11_fault(fault: &SoapFault) -> String {
    let detail = match &fault.detail {
        Some(detail) => format!("\n      <detail>{}</detail>", xml_escape(detail)),
        None => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>{}</faultcode>
      <faultstring>{}</faultstring>{}
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#,
        xml_escape(&fault.code),
        xml_escape(&fault.message),
        detail
    )
}

fn soap_12_fault(fault: &SoapFault) -> String {
    let detail = match &fault.detail {
        Some(detail) => format!("\n      <soap:Detail>{}</soap:Detail>", xml_escape(detail)),
        None => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <soap:Fault>
      <soap:Code>
        <soap:Value>{}</soap:Value>
      </soap:Code>
      <soap:Reason>
        <soap:Text xml:lang="en">{}</soap:Text>
      </soap:Reason>{}
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#,
        xml_escape(&fault.code),
        xml_escape(&fault.message),
        detail
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
