use std::fmt::{Display, Formatter};
use std::io::Write;

use kinsafe_core::UtcDateTime;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::CliError;

/// Request identifier (UUID v4) stamped on every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: RequestId,
    pub generated_at: UtcDateTime,
    pub degraded: bool,
    /// Resolution metadata from the core: one object, or one per category.
    pub resolution: Value,
}

/// `{ data, meta }` document printed for every command.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub data: Value,
    pub meta: EnvelopeMeta,
}

impl Envelope {
    pub fn new(data: Value, resolution: Value, degraded: bool) -> Self {
        Self {
            data,
            meta: EnvelopeMeta {
                request_id: RequestId::new_v4(),
                generated_at: UtcDateTime::now(),
                degraded,
                resolution,
            },
        }
    }
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_envelope(&mut handle, envelope, pretty)
}

fn write_envelope(writer: &mut impl Write, envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, envelope)?;
    } else {
        serde_json::to_writer(&mut *writer, envelope)?;
    }
    writeln!(writer)?;
    Ok(())
}
