//! JSON persistence for snapshot trees.

use crate::model::PackageSnapshot;
use crate::traits::{CodecError, SnapshotCodec};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl SnapshotCodec for JsonCodec {
    fn encode(&self, snapshot: &PackageSnapshot) -> Result<String, CodecError> {
        if self.pretty {
            serde_json::to_string_pretty(snapshot)
        } else {
            serde_json::to_string(snapshot)
        }
        .map_err(CodecError::Encode)
    }

    fn decode(&self, text: &str) -> Result<PackageSnapshot, CodecError> {
        serde_json::from_str(text).map_err(CodecError::Decode)
    }
}
