//! APDU response framing
//!
//! Every response ends with the two status bytes SW1 SW2. Anything before them is the
//! payload.

pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::Error;
use status::StatusWord;

/// Split raw response bytes into the payload and the trailing status word
///
/// # Errors
/// Returns [`Error::Incomplete`] if the data is too short to contain a status word.
pub fn split_status(data: &[u8]) -> Result<(&[u8], StatusWord), Error> {
    if data.len() < 2 {
        debug!("Response too short: {} bytes", data.len());
        return Err(Error::Incomplete(data.len()));
    }

    let (payload, sw) = data.split_at(data.len() - 2);
    Ok((payload, StatusWord::new(sw[0], sw[1])))
}

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data, possibly empty
    payload: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: Bytes, status: impl Into<StatusWord>) -> Self {
        Self {
            payload,
            status: status.into(),
        }
    }

    /// Create a success (90 00) response
    pub const fn success(payload: Bytes) -> Self {
        Self {
            payload,
            status: status::common::SUCCESS,
        }
    }

    /// Parse a response from raw bytes (including the status word)
    pub fn from_bytes(data: &Bytes) -> Result<Self, Error> {
        let (payload, status) = split_status(data)?;

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            payload: data.slice(..payload.len()),
            status,
        })
    }

    /// Get the response payload
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the response, keeping only the payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response carries the generic success status (90 00)
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check the status word against the one the command is expected to succeed with
    pub fn expect_status(self, expected: StatusWord) -> Result<Self, Error> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(Error::UnexpectedStatus {
                expected,
                actual: self.status,
            })
        }
    }

    /// Check the payload length
    pub fn expect_len(self, expected: usize) -> Result<Self, Error> {
        if self.payload.len() == expected {
            Ok(self)
        } else {
            Err(Error::UnexpectedLength {
                expected,
                actual: self.payload.len(),
            })
        }
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Error> {
        Self::from_bytes(&Bytes::copy_from_slice(data))
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        let mut buf = BytesMut::with_capacity(response.payload.len() + 2);
        buf.put_slice(&response.payload);
        buf.put_u8(response.status.sw1);
        buf.put_u8(response.status.sw2);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_status() {
        let data = [0x01, 0x02, 0x03, 0x90, 0x00];
        let (payload, sw) = split_status(&data).unwrap();
        assert_eq!(payload, &[0x01, 0x02, 0x03]);
        assert_eq!(sw, StatusWord::new(0x90, 0x00));

        let data = [0x90, 0x07];
        let (payload, sw) = split_status(&data).unwrap();
        assert!(payload.is_empty());
        assert_eq!(sw, StatusWord::new(0x90, 0x07));

        assert_eq!(split_status(&[0x90]), Err(Error::Incomplete(1)));
        assert_eq!(split_status(&[]), Err(Error::Incomplete(0)));
    }

    #[test]
    fn test_expect_status() {
        let resp = Response::try_from(&[0x6A, 0x82][..]).unwrap();
        let err = resp.expect_status(status::common::SUCCESS).unwrap_err();
        assert_eq!(err.status_word(), Some(StatusWord::new(0x6A, 0x82)));

        let resp = Response::try_from(&[0x90, 0x07][..]).unwrap();
        assert!(resp.expect_status(StatusWord::new(0x90, 0x07)).is_ok());
    }

    #[test]
    fn test_expect_len() {
        let resp = Response::try_from(&[0xAA, 0xBB, 0x90, 0x00][..]).unwrap();
        assert_eq!(
            resp.clone().expect_len(4),
            Err(Error::UnexpectedLength {
                expected: 4,
                actual: 2
            })
        );
        assert_eq!(resp.expect_len(2).unwrap().payload().as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_response_into_bytes() {
        let resp = Response::new(Bytes::from_static(&[0x01]), (0x90, 0x00));
        let bytes: Bytes = resp.into();
        assert_eq!(bytes.as_ref(), &[0x01, 0x90, 0x00]);
    }
}
