//! WS-Addressing extension.
//!
//! The canonical consumer of the pipeline: it inspects the WSDL during the
//! `WsdlResponse` phase and, when the service declares addressing support,
//! injects the WS-Addressing headers into every outgoing envelope during
//! the `Request` phase. The enabled flag crossing those two phases is the
//! documented cross-phase coordination mechanism for extensions.

use tracing::debug;
use uuid::Uuid;

use crate::bus::EventContext;
use crate::config::AddressingConfig;
use crate::document::XmlElement;
use crate::envelope;
use crate::error::SoapError;
use crate::event::{EventKind, PipelineEvent};
use crate::extension::{Extension, Subscription};

/// WS-Addressing 1.0 namespace.
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";
/// WSDL binding namespace for the `UsingAddressing` marker.
pub const WSAW_NS: &str = "http://www.w3.org/2006/05/addressing/wsdl";
/// Anonymous reply-to address.
pub const WSA_ANONYMOUS: &str = "http://www.w3.org/2005/08/addressing/anonymous";

/// WS-Addressing header injection, gated on WSDL detection.
pub struct WsAddressing {
    config: AddressingConfig,
    enabled: bool,
}

impl WsAddressing {
    /// Create the extension; it stays disabled until the WSDL declares
    /// addressing support.
    pub fn new(config: AddressingConfig) -> Self {
        Self {
            config,
            enabled: false,
        }
    }

    /// Whether the WSDL declared addressing support.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Extension for WsAddressing {
    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::WsdlResponse, 0),
            Subscription::new(EventKind::Request, 0),
        ]
    }

    fn on_event(
        &mut self,
        event: &mut PipelineEvent,
        _ctx: &mut EventContext,
    ) -> Result<(), SoapError> {
        match event {
            PipelineEvent::WsdlResponse(response) => {
                self.enabled = response
                    .document
                    .find_element(WSAW_NS, "UsingAddressing")
                    .is_some();
                debug!(enabled = self.enabled, "WS-Addressing WSDL inspection");
            }
            PipelineEvent::Request(request) => {
                if self.enabled {
                    let action = request.action.clone();
                    let location = request.location.clone();
                    envelope::ensure_header(&mut request.document);
                    if let Some(header) = envelope::header_mut(&mut request.document) {
                        header.set_attr("xmlns:wsa", WSA_NS);

                        let message_id = format!("urn:uuid:{}", Uuid::new_v4());
                        header.push(XmlElement::with_text(
                            "wsa:MessageID",
                            message_id,
                        ));
                        header.push(XmlElement::with_text(
                            "wsa:Action",
                            action,
                        ));
                        header.push(XmlElement::with_text("wsa:To", location));

                        let mut reply_to = XmlElement::new("wsa:ReplyTo");
                        reply_to.push(XmlElement::with_text(
                            "wsa:Address",
                            WSA_ANONYMOUS,
                        ));
                        header.push(reply_to);

                        if let Some(from_address) = &self.config.from_address {
                            let mut from = XmlElement::new("wsa:From");
                            from.push(XmlElement::with_text(
                                "wsa:Address",
                                from_address.clone(),
                            ));
                            header.push(from);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::XmlDocument;
    use crate::envelope::{build_request_envelope, SoapVersion};
    use crate::event::{RequestEvent, WsdlResponseEvent};

    const WSDL_WITH_ADDRESSING: &str = r#"<definitions
        xmlns="http://schemas.xmlsoap.org/wsdl/"
        xmlns:wsaw="http://www.w3.org/2006/05/addressing/wsdl"
        targetNamespace="urn:stock">
      <binding name="B" type="tns:P">
        <wsaw:UsingAddressing/>
      </binding>
    </definitions>"#;

    const WSDL_WITHOUT_ADDRESSING: &str = r#"<definitions
        xmlns="http://schemas.xmlsoap.org/wsdl/"
        targetNamespace="urn:stock">
      <binding name="B" type="tns:P"/>
    </definitions>"#;

    fn dispatch_wsdl(extension: &mut WsAddressing, wsdl: &str) {
        let mut event = PipelineEvent::WsdlResponse(WsdlResponseEvent {
            document: XmlDocument::parse(wsdl).unwrap(),
        });
        let mut ctx = EventContext::default();
        extension.on_event(&mut event, &mut ctx).unwrap();
    }

    fn request_event() -> PipelineEvent {
        PipelineEvent::Request(RequestEvent {
            document: build_request_envelope(
                SoapVersion::Soap11,
                "GetPrice",
                "urn:stock",
                Vec::new(),
            ),
            location: "http://example.org/soap/stock".to_string(),
            action: "urn:stock#GetPrice".to_string(),
            soap_version: SoapVersion::Soap11,
            one_way: false,
            response: None,
            request_headers: None,
            response_headers: None,
        })
    }

    fn count_headers(document: &XmlDocument, local: &str) -> usize {
        document
            .root
            .find_child("Header")
            .map(|header| {
                header
                    .child_elements()
                    .filter(|e| e.local_name() == local)
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_wsdl_marker_enables_addressing() {
        let mut extension = WsAddressing::new(AddressingConfig::default());
        assert!(!extension.is_enabled());
        dispatch_wsdl(&mut extension, WSDL_WITH_ADDRESSING);
        assert!(extension.is_enabled());
    }

    #[test]
    fn test_wsdl_without_marker_stays_disabled() {
        let mut extension = WsAddressing::new(AddressingConfig::default());
        dispatch_wsdl(&mut extension, WSDL_WITHOUT_ADDRESSING);
        assert!(!extension.is_enabled());
    }

    #[test]
    fn test_headers_injected_when_enabled() {
        let mut extension = WsAddressing::new(AddressingConfig::default());
        dispatch_wsdl(&mut extension, WSDL_WITH_ADDRESSING);

        let mut event = request_event();
        let mut ctx = EventContext::default();
        extension.on_event(&mut event, &mut ctx).unwrap();

        let request = event.into_request().unwrap();
        assert_eq!(count_headers(&request.document, "MessageID"), 1);
        assert_eq!(count_headers(&request.document, "Action"), 1);
        assert_eq!(count_headers(&request.document, "To"), 1);
        assert_eq!(count_headers(&request.document, "ReplyTo"), 1);
        assert_eq!(count_headers(&request.document, "From"), 0);

        let header = request.document.root.find_child("Header").unwrap();
        let action = header.find_child("Action").unwrap();
        assert_eq!(action.text(), "urn:stock#GetPrice");
        let to = header.find_child("To").unwrap();
        assert_eq!(to.text(), "http://example.org/soap/stock");
        let message_id = header.find_child("MessageID").unwrap();
        assert!(message_id.text().starts_with("urn:uuid:"));
        let reply_to = header.find_child("ReplyTo").unwrap();
        assert_eq!(
            reply_to.find_child("Address").unwrap().text(),
            WSA_ANONYMOUS
        );
    }

    #[test]
    fn test_from_header_only_when_configured() {
        let mut extension = WsAddressing::new(AddressingConfig {
            from_address: Some("http://client.example.org/endpoint".to_string()),
        });
        dispatch_wsdl(&mut extension, WSDL_WITH_ADDRESSING);

        let mut event = request_event();
        let mut ctx = EventContext::default();
        extension.on_event(&mut event, &mut ctx).unwrap();

        let request = event.into_request().unwrap();
        assert_eq!(count_headers(&request.document, "From"), 1);
        let from = request
            .document
            .root
            .find_child("Header")
            .and_then(|h| h.find_child("From"))
            .unwrap();
        assert_eq!(
            from.find_child("Address").unwrap().text(),
            "http://client.example.org/endpoint"
        );
    }

    #[test]
    fn test_no_injection_when_disabled() {
        let mut extension = WsAddressing::new(AddressingConfig::default());
        dispatch_wsdl(&mut extension, WSDL_WITHOUT_ADDRESSING);

        let mut event = request_event();
        let mut ctx = EventContext::default();
        extension.on_event(&mut event, &mut ctx).unwrap();

        let request = event.into_request().unwrap();
        assert!(request.document.root.find_child("Header").is_none());
    }
}
