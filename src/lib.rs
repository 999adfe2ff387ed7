//! Event-Mediated SOAP Client Pipeline
//!
//! A SOAP client whose entire call lifecycle is mediated by a typed,
//! priority-ordered event bus. Every phase of a call (WSDL loading,
//! invocation, request, response, fault, finish) is published as a
//! mutable event; listeners and extensions observe and rewrite the
//! in-flight payloads, and the built-in transport behavior is itself a
//! lowest-priority extension that any handler can pre-empt.
//!
//! # Features
//!
//! - Ordered in-process event bus with priorities and stop-propagation
//! - Typed, mutable event payloads for all seven pipeline phases
//! - WSDL resolution with handler-supplied or transport-fetched content
//! - SOAP 1.1 / 1.2 envelope construction and fault extraction
//! - Fault escalation with suppress-and-substitute semantics
//! - WS-Addressing header injection driven by the WSDL policy marker
//! - XXE prevention (DOCTYPE and entity declarations rejected)
//!
//! # Example
//!
//! ```ignore
//! use soap_pipeline::{SoapClient, WsAddressing, AddressingConfig};
//!
//! let mut client = SoapClient::builder("http://example.org/stock?wsdl")
//!     .extension(Box::new(WsAddressing::new(AddressingConfig::default())))
//!     .build()?;
//! let response = client.call("GetPrice", vec![symbol_arg])?;
//! ```

pub mod addressing;
pub mod bus;
pub mod client;
pub mod config;
pub mod document;
pub mod envelope;
pub mod error;
pub mod event;
pub mod extension;
pub mod transport;
pub mod wsdl;

pub use addressing::WsAddressing;
pub use bus::{EventContext, EventDispatcher, EventListener, InMemoryDispatcher};
pub use client::{SoapClient, SoapClientBuilder};
pub use config::{AddressingConfig, ClientOptions};
pub use document::{XmlDocument, XmlElement, XmlNode};
pub use envelope::SoapVersion;
pub use error::{SoapError, SoapFault};
pub use event::{EventKind, PipelineEvent};
pub use extension::{Extension, Subscription};
pub use transport::{LocalTransport, Transport};
pub use wsdl::ServiceDescription;
