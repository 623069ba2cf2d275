// src/domain/message.rs

//! Message payload passed from the caller to a transport.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

/// An opaque message.
///
/// A `Message` owns a byte payload and exposes a string form used both for
/// logging and as the body on every transport. The string form is a lossy
/// UTF-8 view, so a payload that is not valid UTF-8 goes out with
/// replacement characters.
///
/// Messages are immutable and cheap to clone. A publish call takes ownership
/// of its message and does not retain it after returning.
///
/// # Example
///
/// ```
/// # use mom_publish::Message;
/// let message = Message::from(r#"{"orderId":"42"}"#);
/// assert_eq!(message.text(), r#"{"orderId":"42"}"#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    // ---
    payload: Bytes,
}

impl Message {
    // ---
    /// Create a message from any byte-convertible payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// String form of the payload.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Wire form sent as a binary data section: the UTF-8 encoding of
    /// [`text`](Self::text).
    pub fn data_section(&self) -> Bytes {
        match self.text() {
            Cow::Borrowed(_) => self.payload.clone(),
            Cow::Owned(text) => Bytes::from(text.into_bytes()),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl<T> From<T> for Message
where
    T: Into<Bytes>,
{
    fn from(value: T) -> Self {
        // ---
        Message::new(value)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn text_payload_is_shared_not_copied() {
        // ---
        let message = Message::from("hello");

        assert_eq!(message.text(), "hello");
        assert_eq!(message.data_section(), Bytes::from_static(b"hello"));
        assert_eq!(message.to_string(), "hello");
    }

    #[test]
    fn invalid_utf8_is_rendered_lossily() {
        // ---
        let message = Message::from(vec![b'o', b'k', 0xff]);

        assert_eq!(message.text(), "ok\u{fffd}");
        assert_eq!(message.data_section(), Bytes::from("ok\u{fffd}"));
        assert_eq!(message.len(), 3);
    }
}
