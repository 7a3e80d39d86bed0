//! Recursive construction of a [`Context`] from a parsed description
//!
//! Each builder takes one element of the document tree and returns either a
//! complete object or an error. Partially built values live only on the
//! builder's stack, so an early `?` return drops them together with every
//! child collected so far; callers never see half-built state.
//!
//! Unknown properties and child elements are not errors. They are reported
//! with `warn!` and skipped.

use std::collections::TryReserveError;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::context::{Context, XML_CONTEXT_NAME};
use crate::device::{Channel, Device, DeviceId, Direction};
use crate::document::{DocumentError, Element, Node};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
    #[error("Missing required field '{field}' on <{element}> in {scope}")]
    MissingRequiredField {
        element: &'static str,
        field: &'static str,
        scope: String,
    },
    #[error("Allocation failure: {0}")]
    AllocationFailure(#[from] TryReserveError),
}

impl From<DocumentError> for BuildError {
    fn from(e: DocumentError) -> Self {
        Self::MalformedDocument(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Append `value` to `list`, reporting allocation failure instead of aborting
fn append<T>(list: &mut Vec<T>, value: T) -> Result<()> {
    list.try_reserve(1)?;
    list.push(value);
    Ok(())
}

fn non_empty(value: &str) -> bool {
    !value.is_empty()
}

/// Read the `name` of an `<attribute>` element and append it to `attrs`.
///
/// `owner` describes the device or channel the list belongs to and is only
/// used in log messages. A repeated `name` property resolves to the last one.
pub fn add_attribute(owner: &str, attrs: &mut Vec<String>, node: &Element) -> Result<()> {
    let mut name = None;

    for (key, value) in node.properties() {
        if key == "name" {
            name = Some(value);
        } else {
            warn!(owner, field = key, "Unknown field in <attribute>");
        }
    }

    let Some(name) = name else {
        error!(owner, "Incomplete <attribute>: missing name");
        return Err(BuildError::MissingRequiredField {
            element: "attribute",
            field: "name",
            scope: owner.to_string(),
        });
    };

    append(attrs, name.to_string())
}

/// Build one channel of `device` from a `<channel>` element
pub fn build_channel(device: &DeviceId, node: &Element) -> Result<Channel> {
    let mut chn = Channel::new(device.clone());

    for (key, value) in node.properties() {
        match key {
            "name" => chn.name = Some(value.to_string()),
            "id" => chn.id = value.to_string(),
            "type" => {
                chn.direction = Direction::from_type(value).unwrap_or_else(|| {
                    warn!(device = %device, value, "Unknown channel type, assuming input");
                    Direction::Input
                });
            }
            _ => warn!(device = %device, field = key, "Unknown field in <channel>"),
        }
    }

    if !non_empty(&chn.id) {
        error!(device = %device, "Incomplete <channel>: missing id");
        return Err(BuildError::MissingRequiredField {
            element: "channel",
            field: "id",
            scope: format!("device {device}"),
        });
    }

    let owner = format!("channel {}", chn.id);
    for child in node.children() {
        match child {
            Node::Element(el) if el.name() == "attribute" => {
                add_attribute(&owner, &mut chn.attrs, el)?;
            }
            Node::Element(el) => {
                warn!(channel = %chn.id, child = el.name(), "Unknown child in <channel>");
            }
            Node::Comment(_) => warn!(channel = %chn.id, child = "comment", "Unknown child in <channel>"),
            Node::Text(_) => {}
        }
    }

    debug!(
        device = %device,
        channel = %chn.id,
        direction = %chn.direction,
        attrs = chn.attrs.len(),
        "Built channel"
    );
    Ok(chn)
}

/// Build one device of the context tagged `context` from a `<device>` element
pub fn build_device(context: &'static str, node: &Element) -> Result<Device> {
    let mut dev = Device::new(context);

    for (key, value) in node.properties() {
        match key {
            "name" => dev.name = Some(value.to_string()),
            "id" => dev.id = DeviceId::new(value),
            _ => warn!(field = key, "Unknown field in <device>"),
        }
    }

    if !non_empty(dev.id.as_str()) {
        error!("Unable to read device ID");
        return Err(BuildError::MissingRequiredField {
            element: "device",
            field: "id",
            scope: format!("context {context}"),
        });
    }

    let owner = format!("device {}", dev.id);
    for child in node.children() {
        match child {
            Node::Element(el) if el.name() == "channel" => {
                let chn = build_channel(&dev.id, el).inspect_err(|e| {
                    error!(device = %dev.id, error = %e, "Unable to create channel");
                })?;
                append(&mut dev.channels, chn)?;
            }
            Node::Element(el) if el.name() == "attribute" => {
                add_attribute(&owner, &mut dev.attrs, el)?;
            }
            Node::Element(el) => {
                warn!(device = %dev.id, child = el.name(), "Unknown child in <device>");
            }
            Node::Comment(_) => warn!(device = %dev.id, child = "comment", "Unknown child in <device>"),
            Node::Text(_) => {}
        }
    }

    debug!(
        device = %dev.id,
        channels = dev.channels.len(),
        attrs = dev.attrs.len(),
        "Built device"
    );
    Ok(dev)
}

/// Build a context from the root element of a description document.
///
/// The root must be `<context>`; anything else is rejected before any device
/// is looked at.
pub fn build_context(root: &Element) -> Result<Context> {
    if root.name() != "context" {
        error!(root = root.name(), "Unrecognized XML file");
        return Err(BuildError::MalformedDocument(format!(
            "expected root element <context>, found <{}>",
            root.name()
        )));
    }

    let mut ctx = Context::new(XML_CONTEXT_NAME);

    for child in root.children() {
        match child {
            Node::Element(el) if el.name() == "device" => {
                let dev = build_device(ctx.name, el).inspect_err(|e| {
                    error!(error = %e, "Unable to create device");
                })?;
                append(&mut ctx.devices, dev)?;
            }
            Node::Element(el) => {
                warn!(child = el.name(), "Unknown child in <context>");
            }
            Node::Comment(_) => warn!(child = "comment", "Unknown child in <context>"),
            Node::Text(_) => {}
        }
    }

    info!(devices = ctx.devices.len(), "Built context");
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, ParseOptions};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn build(xml: &str) -> Result<Context> {
        let doc = Document::parse_str(xml, ParseOptions::strict()).unwrap();
        build_context(doc.root())
    }

    fn element(xml: &str) -> Element {
        Document::parse_str(xml, ParseOptions::strict())
            .unwrap()
            .root()
            .clone()
    }

    fn generate(devices: usize, channels: usize, dev_attrs: usize, chn_attrs: usize) -> String {
        let mut xml = String::from("<context>\n");
        for d in 0..devices {
            xml.push_str(&format!("  <device id=\"dev{d}\" name=\"device {d}\">\n"));
            for c in 0..channels {
                let kind = if c % 2 == 0 { "input" } else { "output" };
                xml.push_str(&format!("    <channel id=\"ch{d}_{c}\" type=\"{kind}\">\n"));
                for a in 0..chn_attrs {
                    xml.push_str(&format!("      <attribute name=\"c{d}_{c}_{a}\"/>\n"));
                }
                xml.push_str("    </channel>\n");
                // Interleave device attributes between channels
                if c < dev_attrs {
                    xml.push_str(&format!("    <attribute name=\"d{d}_{c}\"/>\n"));
                }
            }
            for a in channels..dev_attrs {
                xml.push_str(&format!("    <attribute name=\"d{d}_{a}\"/>\n"));
            }
            xml.push_str("  </device>\n");
        }
        xml.push_str("</context>\n");
        xml
    }

    #[test]
    fn test_structure_matches_document() {
        let (n, m, k, j) = (3, 4, 2, 3);
        let ctx = build(&generate(n, m, k, j)).unwrap();

        assert_eq!(ctx.devices().len(), n);
        for (d, dev) in ctx.devices().iter().enumerate() {
            assert_eq!(dev.id().as_str(), format!("dev{d}"));
            assert_eq!(dev.name(), Some(format!("device {d}").as_str()));

            let expected_attrs: Vec<String> = (0..k).map(|a| format!("d{d}_{a}")).collect();
            assert_eq!(dev.attrs(), expected_attrs.as_slice());

            assert_eq!(dev.channels().len(), m);
            for (c, chn) in dev.channels().iter().enumerate() {
                assert_eq!(chn.id(), format!("ch{d}_{c}"));
                assert_eq!(chn.is_output(), c % 2 == 1);
                assert_eq!(chn.device_id(), dev.id());
                let expected: Vec<String> = (0..j).map(|a| format!("c{d}_{c}_{a}")).collect();
                assert_eq!(chn.attrs(), expected.as_slice());
            }
        }
    }

    #[test]
    fn test_more_device_attrs_than_channels() {
        let ctx = build(&generate(1, 1, 4, 0)).unwrap();
        assert_eq!(ctx.devices()[0].attrs(), ["d0_0", "d0_1", "d0_2", "d0_3"]);
    }

    #[test]
    fn test_empty_context() {
        let ctx = build("<context/>").unwrap();
        assert_eq!(ctx.name(), "xml");
        assert!(ctx.devices().is_empty());
    }

    #[test]
    fn test_scenario_single_device() {
        let ctx = build(
            r#"<context><device id="dev0"><channel id="voltage0" type="output"><attribute name="scale"/></channel><attribute name="calibbias"/></device></context>"#,
        )
        .unwrap();

        assert_eq!(ctx.devices().len(), 1);
        let dev = &ctx.devices()[0];
        assert_eq!(dev.id().as_str(), "dev0");
        assert_eq!(dev.name(), None);
        assert_eq!(dev.attrs(), ["calibbias"]);
        assert_eq!(dev.channels().len(), 1);

        let chn = &dev.channels()[0];
        assert_eq!(chn.id(), "voltage0");
        assert_eq!(chn.direction(), Direction::Output);
        assert_eq!(chn.attrs(), ["scale"]);
        assert!(chn.has_attr("scale"));
        assert!(!chn.has_attr("calibbias"));
    }

    #[test]
    fn test_device_without_id_fails() {
        let err = build(r#"<context><device><channel id="x"/></device></context>"#).unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingRequiredField {
                element: "device",
                field: "id",
                scope: "context xml".to_string(),
            }
        );
    }

    #[test]
    fn test_later_failure_discards_earlier_devices() {
        let err = build(
            r#"<context>
                <device id="good"><channel id="a"/><attribute name="x"/></device>
                <device name="no-id"/>
            </context>"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BuildError::MissingRequiredField { element: "device", .. }
        ));
    }

    #[test]
    fn test_channel_failure_aborts_device_and_context() {
        let err = build(
            r#"<context>
                <device id="d0"><channel id="c0"/></device>
                <device id="d1"><channel id="c1"/><channel name="anonymous"/></device>
            </context>"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingRequiredField {
                element: "channel",
                field: "id",
                scope: "device d1".to_string(),
            }
        );
    }

    #[test]
    fn test_attribute_without_name_fails() {
        let err = build(
            r#"<context><device id="d0"><channel id="c0"><attribute/></channel></device></context>"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingRequiredField {
                element: "attribute",
                field: "name",
                scope: "channel c0".to_string(),
            }
        );

        let err = build(r#"<context><device id="d0"><attribute value="1"/></device></context>"#)
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::MissingRequiredField { element: "attribute", ref scope, .. } if scope == "device d0"
        ));
    }

    #[test]
    fn test_empty_id_is_missing() {
        let err = build(r#"<context><device id=""/></context>"#).unwrap_err();
        assert!(matches!(err, BuildError::MissingRequiredField { field: "id", .. }));
    }

    #[test]
    fn test_root_tag_must_be_context() {
        // The device has no id; processing it would yield MissingRequiredField.
        let err = build(r#"<Context><device/></Context>"#).unwrap_err();
        assert!(matches!(err, BuildError::MalformedDocument(_)));

        let err = build(r#"<iio><device id="a"/></iio>"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed document: expected root element <context>, found <iio>"
        );
    }

    #[traced_test]
    #[test]
    fn test_direction_default_and_fallback() {
        let id = DeviceId::new("dev0");

        let chn = build_channel(&id, &element(r#"<channel id="a"/>"#)).unwrap();
        assert_eq!(chn.direction(), Direction::Input);

        let chn = build_channel(&id, &element(r#"<channel id="b" type="output"/>"#)).unwrap();
        assert_eq!(chn.direction(), Direction::Output);

        let chn = build_channel(&id, &element(r#"<channel id="c" type="input"/>"#)).unwrap();
        assert_eq!(chn.direction(), Direction::Input);
        assert!(!logs_contain("Unknown channel type"));

        let chn = build_channel(&id, &element(r#"<channel id="d" type="garbage"/>"#)).unwrap();
        assert_eq!(chn.direction(), Direction::Input);
        assert!(logs_contain("Unknown channel type"));
        assert!(logs_contain("garbage"));
    }

    #[traced_test]
    #[test]
    fn test_unknown_content_is_tolerated() {
        let noisy = build(
            r#"<context>
                <!-- generated -->
                <device id="dev0" vendor="adi">
                    <channel id="voltage0" scan_index="0">
                        <attribute name="raw" filename="in_voltage0_raw"/>
                        <scan-element format="le:s12/16"/>
                    </channel>
                    <debug-attribute name="direct_reg_access"/>
                    <attribute name="sampling_frequency"/>
                </device>
                <buffer enabled="false"/>
                <device id="dev1"/>
            </context>"#,
        )
        .unwrap();

        let clean = build(
            r#"<context>
                <device id="dev0">
                    <channel id="voltage0">
                        <attribute name="raw"/>
                    </channel>
                    <attribute name="sampling_frequency"/>
                </device>
                <device id="dev1"/>
            </context>"#,
        )
        .unwrap();

        assert_eq!(noisy, clean);
        assert!(logs_contain("Unknown field in <device>"));
        assert!(logs_contain("Unknown field in <channel>"));
        assert!(logs_contain("Unknown field in <attribute>"));
        assert!(logs_contain("Unknown child in <channel>"));
        assert!(logs_contain("Unknown child in <device>"));
        assert!(logs_contain("Unknown child in <context>"));
    }

    #[test]
    fn test_repeated_property_last_wins() {
        let ctx = build(
            r#"<context><device id="first" id="second" name="a" name="b"><channel id="c" type="input" type="output"><attribute name="x" name="y"/></channel></device></context>"#,
        )
        .unwrap();

        let dev = &ctx.devices()[0];
        assert_eq!(dev.id().as_str(), "second");
        assert_eq!(dev.name(), Some("b"));
        let chn = &dev.channels()[0];
        assert_eq!(chn.direction(), Direction::Output);
        assert_eq!(chn.attrs(), ["y"]);
    }

    #[test]
    fn test_empty_attribute_name_is_kept() {
        let ctx = build(
            r#"<context><device id="d"><attribute name=""/><channel id="c"><attribute name=""/></channel></device></context>"#,
        )
        .unwrap();
        let dev = &ctx.devices()[0];
        assert_eq!(dev.attrs(), [""]);
        assert_eq!(dev.channels()[0].attrs(), [""]);
    }

    #[traced_test]
    #[test]
    fn test_comment_children_warn() {
        let ctx = build(
            r#"<context><!-- c --><device id="d"><!-- d --><channel id="c"><!-- x --></channel></device></context>"#,
        )
        .unwrap();
        assert_eq!(ctx.devices()[0].channels().len(), 1);
        assert!(logs_contain("Unknown child in <context>"));
        assert!(logs_contain("Unknown child in <device>"));
        assert!(logs_contain("Unknown child in <channel>"));
        assert!(logs_contain("comment"));
    }

    #[test]
    fn test_duplicate_attribute_names_are_kept() {
        let ctx = build(
            r#"<context><device id="d"><attribute name="raw"/><attribute name="raw"/></device></context>"#,
        )
        .unwrap();
        assert_eq!(ctx.devices()[0].attrs(), ["raw", "raw"]);
    }

    #[test]
    fn test_add_attribute_appends() {
        let mut attrs = vec!["existing".to_string()];
        add_attribute("device d", &mut attrs, &element(r#"<attribute name="scale"/>"#)).unwrap();
        assert_eq!(attrs, ["existing", "scale"]);

        let err = add_attribute("device d", &mut attrs, &element("<attribute/>")).unwrap_err();
        assert!(matches!(err, BuildError::MissingRequiredField { .. }));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_allocation_failure_maps_to_build_error() {
        let mut list: Vec<u8> = Vec::new();
        let err = list.try_reserve(usize::MAX).unwrap_err();
        let err = BuildError::from(err);
        assert!(matches!(err, BuildError::AllocationFailure(_)));
        assert!(err.to_string().starts_with("Allocation failure"));
    }

    #[test]
    fn test_names_and_entities() {
        let ctx = build(
            r#"<context><device id="iio:device0" name="ad7476 &amp; friends"><channel id="voltage0" name="vin&lt;0&gt;"/></device></context>"#,
        )
        .unwrap();
        let dev = &ctx.devices()[0];
        assert_eq!(dev.name(), Some("ad7476 & friends"));
        assert_eq!(dev.channels()[0].name(), Some("vin<0>"));
    }
}
