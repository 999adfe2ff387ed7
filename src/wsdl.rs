//! Minimal WSDL service description.
//!
//! The pipeline does not implement WSDL binding resolution; it only needs
//! the endpoint address, each operation's SOAP action, and whether an
//! operation is one-way. A single streaming pass with quick-xml extracts
//! exactly that from the *effective* WSDL, i.e. the text serialized after
//! extensions had their chance to rewrite the document tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use crate::error::SoapError;

/// Resolved metadata for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    /// Operation name as declared in the WSDL.
    pub name: String,
    /// SOAPAction value; defaults to `{targetNamespace}#{name}` when the
    /// binding declares none.
    pub soap_action: String,
    /// True when neither port type nor binding declare an output.
    pub one_way: bool,
}

/// Endpoint and operation metadata extracted from a WSDL document.
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    /// The `targetNamespace` of the definitions element.
    pub target_namespace: String,
    /// Service endpoint from the first `address` element.
    pub location: String,
    operations: HashMap<String, OperationInfo>,
}

impl ServiceDescription {
    /// Parse WSDL text into a service description.
    ///
    /// Elements are matched by local name, which tolerates any prefix
    /// convention. `operation` elements are disambiguated by attribute: a
    /// `name` opens an operation scope, a `soapAction` annotates the
    /// current one.
    pub fn parse(wsdl: &str) -> Result<Self, SoapError> {
        let mut reader = Reader::from_str(wsdl);
        reader.config_mut().trim_text(true);

        let mut target_namespace: Option<String> = None;
        let mut location: Option<String> = None;
        let mut current_operation: Option<String> = None;

        struct Partial {
            soap_action: Option<String>,
            has_output: bool,
        }
        let mut operations: Vec<(String, Partial)> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| SoapError::WsdlLoad(format!("WSDL parse error: {e}")))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    match local_name(e).as_str() {
                        "definitions" => {
                            if let Some(tns) = attr_value(e, "targetNamespace") {
                                target_namespace = Some(tns);
                            }
                        }
                        "operation" => {
                            if let Some(action) = attr_value(e, "soapAction") {
                                // soap:operation annotation for the
                                // enclosing binding operation.
                                if let Some(name) = &current_operation {
                                    if let Some((_, partial)) =
                                        operations.iter_mut().find(|(n, _)| n == name)
                                    {
                                        partial.soap_action = Some(action);
                                    }
                                }
                            } else if let Some(name) = attr_value(e, "name") {
                                if !operations.iter().any(|(n, _)| *n == name) {
                                    operations.push((
                                        name.clone(),
                                        Partial {
                                            soap_action: None,
                                            has_output: false,
                                        },
                                    ));
                                }
                                if matches!(event, Event::Start(_)) {
                                    current_operation = Some(name);
                                }
                            }
                        }
                        "output" => {
                            if let Some(name) = &current_operation {
                                if let Some((_, partial)) =
                                    operations.iter_mut().find(|(n, _)| n == name)
                                {
                                    partial.has_output = true;
                                }
                            }
                        }
                        "address" => {
                            if location.is_none() {
                                location = attr_value(e, "location");
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    if String::from_utf8_lossy(e.local_name().as_ref()) == "operation" {
                        current_operation = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }

            buf.clear();
        }

        let target_namespace = target_namespace
            .ok_or_else(|| SoapError::WsdlLoad("WSDL declares no targetNamespace".to_string()))?;
        let location = location
            .ok_or_else(|| SoapError::WsdlLoad("WSDL declares no service address".to_string()))?;

        let operations = operations
            .into_iter()
            .map(|(name, partial)| {
                let soap_action = partial
                    .soap_action
                    .unwrap_or_else(|| format!("{target_namespace}#{name}"));
                let info = OperationInfo {
                    name: name.clone(),
                    soap_action,
                    one_way: !partial.has_output,
                };
                (name, info)
            })
            .collect();

        Ok(Self {
            target_namespace,
            location,
            operations,
        })
    }

    /// Look up an operation by name.
    pub fn operation(&self, name: &str) -> Result<&OperationInfo, SoapError> {
        self.operations
            .get(name)
            .ok_or_else(|| SoapError::UnknownOperation(name.to_string()))
    }

    /// Declared operation names, in no particular order.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr_value(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if String::from_utf8_lossy(attr.key.as_ref()) == name {
            return Some(
                attr.unescape_value()
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned()),
            );
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
             xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
             xmlns:tns="http://example.org/stock"
             targetNamespace="http://example.org/stock"
             name="StockService">
  <portType name="StockPortType">
    <operation name="GetPrice">
      <input message="tns:GetPriceIn"/>
      <output message="tns:GetPriceOut"/>
    </operation>
    <operation name="Notify">
      <input message="tns:NotifyIn"/>
    </operation>
  </portType>
  <binding name="StockBinding" type="tns:StockPortType">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
    <operation name="GetPrice">
      <soap:operation soapAction="http://example.org/stock/GetPrice"/>
      <input><soap:body use="literal"/></input>
      <output><soap:body use="literal"/></output>
    </operation>
    <operation name="Notify">
      <soap:operation soapAction="http://example.org/stock/Notify"/>
      <input><soap:body use="literal"/></input>
    </operation>
  </binding>
  <service name="StockService">
    <port name="StockPort" binding="tns:StockBinding">
      <soap:address location="http://example.org/soap/stock"/>
    </port>
  </service>
</definitions>"#;

    #[test]
    fn test_parse_service_description() {
        let service = ServiceDescription::parse(WSDL).unwrap();
        assert_eq!(service.target_namespace, "http://example.org/stock");
        assert_eq!(service.location, "http://example.org/soap/stock");

        let get_price = service.operation("GetPrice").unwrap();
        assert_eq!(get_price.soap_action, "http://example.org/stock/GetPrice");
        assert!(!get_price.one_way);
    }

    #[test]
    fn test_one_way_operation() {
        let service = ServiceDescription::parse(WSDL).unwrap();
        let notify = service.operation("Notify").unwrap();
        assert!(notify.one_way);
        assert_eq!(notify.soap_action, "http://example.org/stock/Notify");
    }

    #[test]
    fn test_unknown_operation() {
        let service = ServiceDescription::parse(WSDL).unwrap();
        let result = service.operation("DeletePrice");
        assert!(matches!(result, Err(SoapError::UnknownOperation(_))));
    }

    #[test]
    fn test_default_soap_action() {
        let wsdl = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
            targetNamespace="urn:minimal">
          <portType name="P">
            <operation name="Ping">
              <input message="tns:In"/>
              <output message="tns:Out"/>
            </operation>
          </portType>
          <service name="S">
            <port name="Port" binding="tns:B">
              <address location="http://example.org/minimal"/>
            </port>
          </service>
        </definitions>"#;
        let service = ServiceDescription::parse(wsdl).unwrap();
        let ping = service.operation("Ping").unwrap();
        assert_eq!(ping.soap_action, "urn:minimal#Ping");
    }

    #[test]
    fn test_missing_address_rejected() {
        let wsdl = r#"<definitions targetNamespace="urn:x"></definitions>"#;
        let result = ServiceDescription::parse(wsdl);
        assert!(matches!(result, Err(SoapError::WsdlLoad(_))));
    }

    #[test]
    fn test_missing_target_namespace_rejected() {
        let wsdl = r#"<definitions><service><port><address location="http://x"/></port></service></definitions>"#;
        let result = ServiceDescription::parse(wsdl);
        assert!(matches!(result, Err(SoapError::WsdlLoad(_))));
    }
}
