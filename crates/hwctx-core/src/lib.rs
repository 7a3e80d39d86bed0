//! hwctx Core - Hardware context descriptions
//!
//! This crate turns an XML description of a hardware context into an
//! immutable object graph:
//! - Document tree over `quick-xml` (no process-wide parser state)
//! - Context, device and channel model types
//! - Recursive all-or-nothing builders
//!
//! ```xml
//! <context>
//!   <device id="iio:device0" name="ad7476">
//!     <channel id="voltage0" type="input">
//!       <attribute name="raw"/>
//!     </channel>
//!     <attribute name="sampling_frequency"/>
//!   </device>
//! </context>
//! ```

pub mod builder;
pub mod context;
pub mod device;
pub mod document;

use std::path::Path;

pub use builder::{BuildError, Result};
pub use context::{Backend, Context, XML_CONTEXT_NAME};
pub use device::{Channel, Device, DeviceId, Direction};
pub use document::{Document, DocumentError, Element, Node, ParseOptions};

/// Build a context from an XML description file
pub fn build_from_file(path: impl AsRef<Path>) -> Result<Context> {
    Context::from_file(path)
}

/// Build a context from an XML description held in memory
pub fn build_from_buffer(data: &[u8]) -> Result<Context> {
    Context::from_buffer(data)
}
