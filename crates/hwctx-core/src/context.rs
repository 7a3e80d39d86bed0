//! The hardware context: root of the device graph

use serde::Serialize;
use std::path::Path;

use crate::builder::{self, BuildError};
use crate::device::{Channel, Device};
use crate::document::{Document, ParseOptions};

/// Provenance tag of contexts built from an XML description
pub const XML_CONTEXT_NAME: &str = "xml";

/// I/O operations attached to a context.
///
/// A context built from a description has no way to talk to hardware, so it
/// always carries the inert backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Inert,
}

/// A hardware context: an ordered set of devices
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub(crate) name: &'static str,
    pub(crate) backend: Backend,
    pub(crate) devices: Vec<Device>,
}

impl Context {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            backend: Backend::Inert,
            devices: Vec::new(),
        }
    }

    /// Build a context from an XML description file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let doc = Document::from_file(path, ParseOptions::strict()).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Unable to parse XML file");
            BuildError::from(e)
        })?;
        builder::build_context(doc.root())
    }

    /// Build a context from an XML description held in memory
    pub fn from_buffer(data: &[u8]) -> Result<Self, BuildError> {
        Self::from_buffer_with(data, ParseOptions::strict())
    }

    /// Like [`Context::from_buffer`] with explicit parser options
    pub fn from_buffer_with(data: &[u8], options: ParseOptions) -> Result<Self, BuildError> {
        let doc = Document::parse(data, options).map_err(|e| {
            tracing::error!(len = data.len(), error = %e, "Unable to parse XML buffer");
            BuildError::from(e)
        })?;
        builder::build_context(doc.root())
    }

    /// Build a context from an XML string
    pub fn from_xml(xml: &str) -> Result<Self, BuildError> {
        Self::from_buffer(xml.as_bytes())
    }

    /// Provenance tag ("xml" for description-built contexts)
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Devices in document order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// First device with the given id
    pub fn find_device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Every channel of every device, paired with its device
    pub fn channels(&self) -> impl Iterator<Item = (&Device, &Channel)> {
        self.devices
            .iter()
            .flat_map(|dev| dev.channels.iter().map(move |chn| (dev, chn)))
    }
}
