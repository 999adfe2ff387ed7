//! SOAP envelope helpers: version negotiation, request construction,
//! header access and fault extraction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::{XmlDocument, XmlElement, XmlNode};
use crate::error::SoapFault;

/// SOAP 1.1 envelope namespace.
pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// SOAP 1.2 envelope namespace.
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// SOAP versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoapVersion {
    /// SOAP 1.1 (namespace: http://schemas.xmlsoap.org/soap/envelope/)
    #[serde(rename = "1.1")]
    Soap11,
    /// SOAP 1.2 (namespace: http://www.w3.org/2003/05/soap-envelope)
    #[serde(rename = "1.2")]
    Soap12,
}

impl SoapVersion {
    /// Canonical envelope namespace for the version.
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP_11_NS,
            Self::Soap12 => SOAP_12_NS,
        }
    }

    /// HTTP content type conventionally used for the version.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Soap11 => "text/xml; charset=utf-8",
            Self::Soap12 => "application/soap+xml; charset=utf-8",
        }
    }

    /// Map an envelope namespace back to a version.
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP_11_NS => Some(Self::Soap11),
            SOAP_12_NS => Some(Self::Soap12),
            _ => None,
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soap11 => write!(f, "1.1"),
            Self::Soap12 => write!(f, "1.2"),
        }
    }
}

/// Build a request envelope wrapping the operation element and its
/// argument fragments.
///
/// The operation element is bound to the service target namespace; a
/// Header is only added later if an extension asks for one.
pub fn build_request_envelope(
    version: SoapVersion,
    operation: &str,
    namespace: &str,
    arguments: Vec<XmlElement>,
) -> XmlDocument {
    let mut envelope = XmlElement::new("soapenv:Envelope");
    envelope.set_attr("xmlns:soapenv", version.envelope_namespace());

    let mut body = XmlElement::new("soapenv:Body");
    let mut operation_element = XmlElement::new(format!("m:{operation}"));
    operation_element.set_attr("xmlns:m", namespace);
    for argument in arguments {
        operation_element.push(argument);
    }
    body.push(operation_element);
    envelope.push(body);

    XmlDocument::new(envelope)
}

/// Detect the SOAP version of a document from its root element.
///
/// Returns `None` when the root is not an `Envelope` in a recognized
/// namespace; such a document is not a SOAP message at all.
pub fn detect_version(document: &XmlDocument) -> Option<SoapVersion> {
    let root = &document.root;
    if root.local_name() != "Envelope" {
        return None;
    }
    let namespace = root.declared_namespace(root.prefix())?;
    SoapVersion::from_namespace(namespace)
}

/// Insert an empty Header before the Body if the envelope has none.
pub fn ensure_header(document: &mut XmlDocument) {
    let root = &mut document.root;
    let present = root
        .child_elements()
        .any(|element| element.local_name() == "Header");
    if !present {
        let name = match root.prefix() {
            Some(prefix) => format!("{prefix}:Header"),
            None => "Header".to_string(),
        };
        root.children
            .insert(0, XmlNode::Element(XmlElement::new(name)));
    }
}

/// Mutable access to the envelope Header element, if present.
pub fn header_mut(document: &mut XmlDocument) -> Option<&mut XmlElement> {
    document.root.find_child_mut("Header")
}

/// Extract an application fault from a response Body, if one is present.
pub fn extract_fault(document: &XmlDocument, version: SoapVersion) -> Option<SoapFault> {
    let body = document.root.find_child("Body")?;
    let fault = body.find_child("Fault")?;

    let (code, message, detail) = match version {
        SoapVersion::Soap11 => (
            fault.find_child("faultcode").map(|e| e.text()),
            fault.find_child("faultstring").map(|e| e.text()),
            fault.find_child("detail").map(|e| e.text()),
        ),
        SoapVersion::Soap12 => (
            fault
                .find_child("Code")
                .and_then(|code| code.find_child("Value"))
                .map(|e| e.text()),
            fault
                .find_child("Reason")
                .and_then(|reason| reason.find_child("Text"))
                .map(|e| e.text()),
            fault.find_child("Detail").map(|e| e.text()),
        ),
    };

    Some(SoapFault {
        code: code.unwrap_or_default(),
        message: message.unwrap_or_default(),
        detail: detail.filter(|text| !text.is_empty()),
    })
}
