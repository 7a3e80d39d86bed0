//! Device and channel types of a hardware context

use serde::Serialize;

/// Identifier of a device within a context, taken from its `id` property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for DeviceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DeviceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Data direction of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Input,
    Output,
}

impl Direction {
    /// Parse a `type` property value. Only the exact lowercase words match.
    pub fn from_type(value: &str) -> Option<Self> {
        match value {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel of a device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub(crate) id: String,
    pub(crate) name: Option<String>,
    pub(crate) direction: Direction,
    pub(crate) attrs: Vec<String>,
    /// Owning device; lookup only
    #[serde(skip)]
    pub(crate) device: DeviceId,
}

impl Channel {
    pub(crate) fn new(device: DeviceId) -> Self {
        Self {
            id: String::new(),
            name: None,
            direction: Direction::Input,
            attrs: Vec::new(),
            device,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name, if the description gave one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    /// Attribute names in document order (duplicates preserved)
    pub fn attrs(&self) -> &[String] {
        &self.attrs
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a == name)
    }

    /// Id of the device this channel belongs to
    pub fn device_id(&self) -> &DeviceId {
        &self.device
    }
}

/// A device in a hardware context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub(crate) id: DeviceId,
    pub(crate) name: Option<String>,
    pub(crate) attrs: Vec<String>,
    pub(crate) channels: Vec<Channel>,
    /// Provenance tag of the owning context; lookup only
    #[serde(skip)]
    pub(crate) context: &'static str,
}

impl Device {
    pub(crate) fn new(context: &'static str) -> Self {
        Self {
            id: DeviceId::new(""),
            name: None,
            attrs: Vec::new(),
            channels: Vec::new(),
            context,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Human-readable name, if the description gave one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Device attribute names in document order (duplicates preserved)
    pub fn attrs(&self) -> &[String] {
        &self.attrs
    }

    /// Channels in document order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn context_name(&self) -> &'static str {
        self.context
    }

    /// First channel with the given id
    pub fn find_channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn input_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| !c.is_output())
    }

    pub fn output_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_output())
    }

    /// Whether any channel of this device is an output
    pub fn is_output_capable(&self) -> bool {
        self.channels.iter().any(Channel::is_output)
    }
}
