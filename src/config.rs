//! Configuration types for the SOAP client.

use serde::{Deserialize, Serialize};

use crate::envelope::SoapVersion;

/// Data-only client options.
///
/// Runtime collaborators (transport, dispatcher, listeners, extensions)
/// are wired through the builder instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Retain last request/response text and header text after each call.
    pub trace: bool,

    /// SOAP version used for outgoing envelopes and response validation.
    pub soap_version: SoapVersion,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            trace: false,
            soap_version: SoapVersion::Soap11,
        }
    }
}

/// WS-Addressing extension configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressingConfig {
    /// Source endpoint for the `From` header; omitted entirely when unset.
    pub from_address: Option<String>,
}
