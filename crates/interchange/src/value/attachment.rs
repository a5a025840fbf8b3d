use crate::hash::{content_hash, Digest};

/// Reference to an attachment payload stored elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    /// SHA-256 of the payload.
    pub hash: Digest,
    pub mime_type: String,
}

/// An attachment carrying its payload inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub reference: AttachmentRef,
    pub data: Vec<u8>,
}

impl AttachmentRef {
    pub fn new(hash: Digest, mime_type: impl Into<String>) -> Self {
        Self {
            hash,
            mime_type: mime_type.into(),
        }
    }

    /// Lowercase hex of the content hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl Attachment {
    /// Wraps a payload, computing its content hash.
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            reference: AttachmentRef::new(content_hash(&data), mime_type),
            data,
        }
    }

    pub fn hash(&self) -> &Digest {
        &self.reference.hash
    }

    pub fn mime_type(&self) -> &str {
        &self.reference.mime_type
    }

    /// Checks that the stored hash matches the payload.
    pub fn verify(&self) -> bool {
        content_hash(&self.data) == self.reference.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_attachment_verifies() {
        let a = Attachment::new("text/plain", b"hello".to_vec());
        assert!(a.verify());
        assert_eq!(a.mime_type(), "text/plain");
        assert_eq!(
            a.reference.hash_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let mut a = Attachment::new("text/plain", b"hello".to_vec());
        a.data.push(b'!');
        assert!(!a.verify());
    }
}
