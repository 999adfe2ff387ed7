//! The SOAP client façade and pipeline orchestrator.
//!
//! The client owns the event dispatcher and drives the five-phase
//! lifecycle of every call: Call, Request, Response, Finish, with Fault
//! escalation when the service returns an application fault. WSDL loading
//! happens once, at construction, through its own pair of events so
//! extensions can both supply and rewrite the WSDL before the service
//! description is resolved.
//!
//! A client instance is single-threaded by design: dispatch is
//! synchronous, trace buffers are instance-scoped and unsynchronized, and
//! concurrent calls on one instance are not supported.

use tracing::{debug, info, warn};

use crate::bus::{EventDispatcher, EventListener, InMemoryDispatcher};
use crate::config::ClientOptions;
use crate::document::{XmlDocument, XmlElement};
use crate::envelope;
use crate::error::{SoapError, SoapFault};
use crate::event::{
    CallEvent, EventKind, FaultEvent, FinishEvent, PipelineEvent, RequestEvent, ResponseEvent,
    WsdlRequestEvent, WsdlResponseEvent,
};
use crate::extension::Extension;
use crate::transport::{LocalTransport, Transport, TransportFallback};
use crate::wsdl::ServiceDescription;

/// Builder for [`SoapClient`].
///
/// Listeners and extensions are registered before the transport fallbacks,
/// so a handler that stops propagation always wins over the defaults.
pub struct SoapClientBuilder {
    wsdl_uri: String,
    options: ClientOptions,
    transport: Option<Box<dyn Transport>>,
    dispatcher: Option<Box<dyn EventDispatcher>>,
    listeners: Vec<(EventKind, Box<dyn EventListener>, i32)>,
    extensions: Vec<Box<dyn Extension>>,
}

impl SoapClientBuilder {
    fn new(wsdl_uri: impl Into<String>) -> Self {
        Self {
            wsdl_uri: wsdl_uri.into(),
            options: ClientOptions::default(),
            transport: None,
            dispatcher: None,
            listeners: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Replace the default options.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the transport used by the WSDL-fetch and request fallbacks.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Supply an external dispatcher implementation instead of the
    /// private in-process one.
    pub fn dispatcher(mut self, dispatcher: Box<dyn EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Register an ad-hoc listener for one event kind.
    pub fn listener(
        mut self,
        kind: EventKind,
        listener: Box<dyn EventListener>,
        priority: i32,
    ) -> Self {
        self.listeners.push((kind, listener, priority));
        self
    }

    /// Register an extension for every event kind it declares.
    pub fn extension(mut self, extension: Box<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Run the construction protocol: wire the bus, load and transform
    /// the WSDL, and resolve the service description.
    pub fn build(self) -> Result<SoapClient, SoapError> {
        let mut dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Box::new(InMemoryDispatcher::new()));

        for (kind, listener, priority) in self.listeners {
            dispatcher.subscribe(kind, listener, priority);
        }
        for extension in self.extensions {
            dispatcher.subscribe_extension(extension);
        }

        let transport = self
            .transport
            .unwrap_or_else(|| Box::new(LocalTransport::new()));
        dispatcher.subscribe_extension(Box::new(TransportFallback::new(transport)));

        // WSDL phase: a handler may supply the text; the fallback fetches
        // it from the URI otherwise.
        let mut event = PipelineEvent::WsdlRequest(WsdlRequestEvent {
            uri: self.wsdl_uri.clone(),
            wsdl: None,
        });
        dispatcher.dispatch(&mut event)?;
        let wsdl_text = event
            .into_wsdl_request()
            .and_then(|request| request.wsdl)
            .ok_or_else(|| {
                SoapError::WsdlLoad(format!("no WSDL content produced for {}", self.wsdl_uri))
            })?;

        let document = XmlDocument::parse(&wsdl_text)
            .map_err(|e| SoapError::WsdlLoad(format!("WSDL did not parse: {e}")))?;

        // Let extensions rewrite the WSDL tree; the serialized result is
        // the effective WSDL the service description is resolved from.
        let mut event = PipelineEvent::WsdlResponse(WsdlResponseEvent { document });
        dispatcher.dispatch(&mut event)?;
        let document = event
            .into_wsdl_response()
            .ok_or_else(|| payload_mismatch(EventKind::WsdlResponse))?
            .document;
        let effective_wsdl = document.to_xml();

        let service = ServiceDescription::parse(&effective_wsdl)?;
        info!(
            uri = %self.wsdl_uri,
            location = %service.location,
            "SOAP client initialized"
        );

        Ok(SoapClient {
            options: self.options,
            dispatcher,
            service,
            last_request: None,
            last_request_headers: None,
            last_response: None,
            last_response_headers: None,
        })
    }
}

/// Event-mediated SOAP client.
pub struct SoapClient {
    options: ClientOptions,
    dispatcher: Box<dyn EventDispatcher>,
    service: ServiceDescription,
    last_request: Option<String>,
    last_request_headers: Option<String>,
    last_response: Option<String>,
    last_response_headers: Option<String>,
}

impl SoapClient {
    /// Start building a client for the WSDL at `wsdl_uri`.
    pub fn builder(wsdl_uri: impl Into<String>) -> SoapClientBuilder {
        SoapClientBuilder::new(wsdl_uri)
    }

    /// The resolved service description.
    pub fn service(&self) -> &ServiceDescription {
        &self.service
    }

    /// The options the client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Last request envelope text (tracing only).
    pub fn last_request(&self) -> Option<&str> {
        self.last_request.as_deref()
    }

    /// Last request header text (tracing only).
    pub fn last_request_headers(&self) -> Option<&str> {
        self.last_request_headers.as_deref()
    }

    /// Last response text (tracing only). On a malformed response this
    /// holds the raw, unparsed text.
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Last response header text (tracing only).
    pub fn last_response_headers(&self) -> Option<&str> {
        self.last_response_headers.as_deref()
    }

    /// Perform a SOAP call.
    ///
    /// Returns the final response envelope, or `None` for one-way
    /// operations and for suppressed faults without a substitute response.
    /// Any pipeline failure surfaces as a [`SoapError`], routed through
    /// the fault escalation machinery first.
    pub fn call(
        &mut self,
        method: &str,
        arguments: Vec<XmlElement>,
    ) -> Result<Option<XmlDocument>, SoapError> {
        let mut event = PipelineEvent::Call(CallEvent {
            method: method.to_string(),
            arguments,
        });
        self.dispatcher.dispatch(&mut event)?;
        let call = event
            .into_call()
            .ok_or_else(|| payload_mismatch(EventKind::Call))?;

        debug!(method = %call.method, "performing SOAP call");

        match self.invoke(call) {
            Ok(response) => {
                let mut event = PipelineEvent::Finish(FinishEvent { response });
                self.dispatcher.dispatch(&mut event)?;
                Ok(event
                    .into_finish()
                    .ok_or_else(|| payload_mismatch(EventKind::Finish))?
                    .response)
            }
            Err(error) => self.escalate_fault(error),
        }
    }

    /// Resolve the operation, build the envelope and run the request
    /// protocol.
    fn invoke(&mut self, call: CallEvent) -> Result<Option<XmlDocument>, SoapError> {
        let operation = self.service.operation(&call.method)?;
        let action = operation.soap_action.clone();
        let one_way = operation.one_way;
        let location = self.service.location.clone();

        let document = envelope::build_request_envelope(
            self.options.soap_version,
            &call.method,
            &self.service.target_namespace,
            call.arguments,
        );

        self.perform_request(document, location, action, one_way)
    }

    /// The per-request protocol: Request event, transport, response
    /// validation, Response event, fault detection.
    fn perform_request(
        &mut self,
        document: XmlDocument,
        location: String,
        action: String,
        one_way: bool,
    ) -> Result<Option<XmlDocument>, SoapError> {
        let mut event = PipelineEvent::Request(RequestEvent {
            document,
            location,
            action,
            soap_version: self.options.soap_version,
            one_way,
            response: None,
            request_headers: None,
            response_headers: None,
        });
        if let Err(error) = self.dispatcher.dispatch(&mut event) {
            // No response was produced; the inner error is preserved.
            return Err(SoapError::RequestDispatch(Box::new(error)));
        }
        let request = event
            .into_request()
            .ok_or_else(|| payload_mismatch(EventKind::Request))?;

        if self.options.trace {
            self.last_request = Some(request.document.to_xml());
            self.last_request_headers = request.request_headers.clone();
        }

        let response_text = match request.response {
            Some(text) => text,
            None if request.one_way => return Ok(None),
            None => return Err(SoapError::NoResponse),
        };
        if request.one_way && response_text.trim().is_empty() {
            return Ok(None);
        }

        let document = match XmlDocument::parse(&response_text) {
            Ok(document)
                if envelope::detect_version(&document) == Some(request.soap_version) =>
            {
                document
            }
            _ => {
                warn!(
                    version = %request.soap_version,
                    "response is not a SOAP envelope"
                );
                if self.options.trace {
                    self.last_response = Some(response_text.clone());
                }
                return Err(SoapError::NotSoapResponse(response_text));
            }
        };

        let mut event = PipelineEvent::Response(ResponseEvent {
            document,
            response_headers: request.response_headers,
        });
        if let Err(error) = self.dispatcher.dispatch(&mut event) {
            return Err(SoapError::ResponseDispatch(Box::new(error)));
        }
        let response = event
            .into_response()
            .ok_or_else(|| payload_mismatch(EventKind::Response))?;

        if self.options.trace {
            self.last_response = Some(response.document.to_xml());
            self.last_response_headers = response.response_headers.clone();
        }

        if let Some(fault) = envelope::extract_fault(&response.document, request.soap_version) {
            return Err(SoapError::Fault(fault));
        }

        Ok(Some(response.document))
    }

    /// Fault escalation: Normal -> Faulted -> {Suppressed, Rethrown}.
    ///
    /// A handler that stops propagation suppresses the fault and the
    /// event's `response` becomes the call's return value; otherwise the
    /// original error is rethrown to the caller unchanged.
    fn escalate_fault(&mut self, error: SoapError) -> Result<Option<XmlDocument>, SoapError> {
        let fault = match &error {
            SoapError::Fault(fault) => fault.clone(),
            other => SoapFault::new("soap:Client", other.to_string()),
        };
        warn!(code = %fault.code, message = %fault.message, "escalating fault");

        let mut event = PipelineEvent::Fault(FaultEvent {
            fault,
            last_request: self.last_request.clone(),
            last_request_headers: self.last_request_headers.clone(),
            last_response: self.last_response.clone(),
            last_response_headers: self.last_response_headers.clone(),
            response: None,
        });
        let outcome = self.dispatcher.dispatch(&mut event)?;
        let fault_event = event
            .into_fault()
            .ok_or_else(|| payload_mismatch(EventKind::Fault))?;

        if outcome.stopped {
            debug!("fault suppressed by handler");
            Ok(fault_event.response)
        } else {
            Err(error)
        }
    }
}

fn payload_mismatch(kind: EventKind) -> SoapError {
    SoapError::Handler(format!(
        "{} event payload was replaced with a different variant during dispatch",
        kind.as_str()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::listener_fn;
    use crate::transport::{TransportRequest, TransportResponse};

    const WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
             xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
             targetNamespace="http://example.org/stock">
  <portType name="StockPortType">
    <operation name="GetPrice">
      <input message="tns:GetPriceIn"/>
      <output message="tns:GetPriceOut"/>
    </operation>
  </portType>
  <service name="StockService">
    <port name="StockPort" binding="tns:StockBinding">
      <soap:address location="http://example.org/soap/stock"/>
    </port>
  </service>
</definitions>"#;

    struct CannedTransport {
        response: String,
    }

    impl Transport for CannedTransport {
        fn fetch(&mut self, _uri: &str) -> Result<String, SoapError> {
            Ok(WSDL.to_string())
        }

        fn send(&mut self, _request: &TransportRequest) -> Result<TransportResponse, SoapError> {
            Ok(TransportResponse {
                body: self.response.clone(),
                request_headers: None,
                response_headers: None,
            })
        }
    }

    const RESPONSE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <m:GetPriceResponse xmlns:m="http://example.org/stock">
      <m:Price>1.90</m:Price>
    </m:GetPriceResponse>
  </soap:Body>
</soap:Envelope>"#;

    fn client_with_response(response: &str) -> SoapClient {
        SoapClient::builder("http://example.org/stock?wsdl")
            .transport(Box::new(CannedTransport {
                response: response.to_string(),
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_resolves_service() {
        let client = client_with_response(RESPONSE);
        assert_eq!(client.service().location, "http://example.org/soap/stock");
        assert!(client.service().operation("GetPrice").is_ok());
    }

    #[test]
    fn test_call_returns_parsed_response() {
        let mut client = client_with_response(RESPONSE);
        let response = client.call("GetPrice", Vec::new()).unwrap().unwrap();
        let body = response.root.find_child("Body").unwrap();
        let price = body
            .find_child("GetPriceResponse")
            .and_then(|r| r.find_child("Price"))
            .unwrap();
        assert_eq!(price.text(), "1.90");
    }

    #[test]
    fn test_unknown_method_fails() {
        let mut client = client_with_response(RESPONSE);
        let result = client.call("NoSuchMethod", Vec::new());
        assert!(matches!(result, Err(SoapError::UnknownOperation(_))));
    }

    #[test]
    fn test_call_event_can_rewrite_method() {
        let mut client = SoapClient::builder("http://example.org/stock?wsdl")
            .transport(Box::new(CannedTransport {
                response: RESPONSE.to_string(),
            }))
            .listener(
                EventKind::Call,
                listener_fn(|event, _ctx| {
                    if let PipelineEvent::Call(call) = event {
                        call.method = "GetPrice".to_string();
                    }
                    Ok(())
                }),
                0,
            )
            .build()
            .unwrap();

        // The original name is unknown; the listener rewrites it to a
        // declared operation before resolution.
        let response = client.call("LookupPrice", Vec::new()).unwrap();
        assert!(response.is_some());
    }

    #[test]
    fn test_wsdl_supplied_by_listener() {
        // No transport configured: the listener short-circuits the WSDL
        // fetch and a request listener produces the response.
        let mut client = SoapClient::builder("memory://stock.wsdl")
            .listener(
                EventKind::WsdlRequest,
                listener_fn(|event, ctx| {
                    if let PipelineEvent::WsdlRequest(request) = event {
                        request.wsdl = Some(WSDL.to_string());
                        ctx.stop_propagation();
                    }
                    Ok(())
                }),
                0,
            )
            .listener(
                EventKind::Request,
                listener_fn(|event, ctx| {
                    if let PipelineEvent::Request(request) = event {
                        request.response = Some(RESPONSE.to_string());
                        ctx.stop_propagation();
                    }
                    Ok(())
                }),
                0,
            )
            .build()
            .unwrap();

        let response = client.call("GetPrice", Vec::new()).unwrap();
        assert!(response.is_some());
    }

    #[test]
    fn test_missing_response_fails() {
        let mut client = SoapClient::builder("memory://stock.wsdl")
            .listener(
                EventKind::WsdlRequest,
                listener_fn(|event, ctx| {
                    if let PipelineEvent::WsdlRequest(request) = event {
                        request.wsdl = Some(WSDL.to_string());
                        ctx.stop_propagation();
                    }
                    Ok(())
                }),
                0,
            )
            .listener(
                EventKind::Request,
                listener_fn(|_event, ctx| {
                    // Swallow the request without producing a response.
                    ctx.stop_propagation();
                    Ok(())
                }),
                0,
            )
            .build()
            .unwrap();

        let result = client.call("GetPrice", Vec::new());
        // NoResponse is routed through fault escalation, then rethrown.
        assert!(matches!(result, Err(SoapError::NoResponse)));
    }

    #[test]
    fn test_finish_event_can_replace_response() {
        let mut client = SoapClient::builder("http://example.org/stock?wsdl")
            .transport(Box::new(CannedTransport {
                response: RESPONSE.to_string(),
            }))
            .listener(
                EventKind::Finish,
                listener_fn(|event, _ctx| {
                    if let PipelineEvent::Finish(finish) = event {
                        finish.response = None;
                    }
                    Ok(())
                }),
                0,
            )
            .build()
            .unwrap();

        let response = client.call("GetPrice", Vec::new()).unwrap();
        assert!(response.is_none());
    }
}
