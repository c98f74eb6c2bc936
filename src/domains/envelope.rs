use bytes::Bytes;

use crate::error::{require_id, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    id: String,
    payload: Bytes,
}

impl Envelope {
    pub fn new(id: impl Into<String>, payload: impl Into<Bytes>) -> Result<Self> {
        let id = id.into();
        require_id(&id)?;
        Ok(Self {
            id,
            payload: payload.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn matches(&self, id: &str) -> bool {
        self.id == id
    }

    pub fn into_parts(self) -> (String, Bytes) {
        (self.id, self.payload)
    }
}
