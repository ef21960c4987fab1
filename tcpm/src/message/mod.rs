//! Construction and parsing of PD messages.

pub mod header;
pub mod pdo;
pub mod vendor_defined;

use byteorder::{ByteOrder, LittleEndian};
use header::{ControlMessageType, DataMessageType, Header, MessageType};
use heapless::Vec;

/// The largest number of data objects a message can carry.
pub const MAX_OBJECTS: usize = 7;

/// The largest wire size of a message: header plus seven data objects.
pub const MAX_MESSAGE_SIZE: usize = 2 + 4 * MAX_OBJECTS;

/// Errors that can occur during message parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// The input buffer length does not match the header's object count.
    /// * `expected` - The expected length.
    /// * `found` - The actual length found.
    #[error("invalid input buffer length (expected {expected:?}, found {found:?})")]
    InvalidLength {
        /// The expected length.
        expected: usize,
        /// The actual length found.
        found: usize,
    },
    /// The specification revision field is not supported.
    #[error("unsupported specification revision `{0}`")]
    UnsupportedSpecificationRevision(u8),
}

/// A PD message: header and up to seven raw data objects.
///
/// Data objects keep their wire representation; typed views are provided by
/// the bitfield structs in [`pdo`] and [`vendor_defined`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// The message header.
    pub header: Header,
    /// Data objects following the header.
    pub objects: Vec<u32, MAX_OBJECTS>,
}

impl Message {
    /// Create a control message.
    pub fn control(header: Header) -> Self {
        Self {
            header,
            objects: Vec::new(),
        }
    }

    /// Create a data message from raw data objects.
    ///
    /// At most [`MAX_OBJECTS`] objects are carried; the header object count
    /// is taken from the header as passed in.
    pub fn data(header: Header, objects: &[u32]) -> Self {
        Self {
            header,
            objects: Vec::from_slice(objects).unwrap_or_default(),
        }
    }

    /// Serialize the message, returning the number of written bytes.
    pub fn to_bytes(&self, buffer: &mut [u8]) -> usize {
        let mut size = self.header.to_bytes(buffer);

        for object in &self.objects {
            LittleEndian::write_u32(&mut buffer[size..], *object);
            size += 4;
        }

        size
    }

    /// Parse a message from its wire representation.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < 2 {
            return Err(ParseError::InvalidLength {
                expected: 2,
                found: data.len(),
            });
        }

        let header = Header::from_bytes(&data[..2])?;

        let expected = 2 + 4 * header.num_objects();
        if data.len() < expected {
            return Err(ParseError::InvalidLength {
                expected,
                found: data.len(),
            });
        }

        let mut objects = Vec::new();
        for index in 0..header.num_objects() {
            let offset = 2 + 4 * index;
            // Object count is at most MAX_OBJECTS by construction (3 bit field).
            let _ = objects.push(LittleEndian::read_u32(&data[offset..offset + 4]));
        }

        Ok(Self { header, objects })
    }

    /// Whether this is a control message of the given type.
    pub fn is_control(&self, control_message_type: ControlMessageType) -> bool {
        self.header.message_type() == MessageType::Control(control_message_type)
    }

    /// Whether this is a data message of the given type.
    pub fn is_data(&self, data_message_type: DataMessageType) -> bool {
        self.header.message_type() == MessageType::Data(data_message_type)
    }
}

#[cfg(test)]
mod tests {
    use super::header::{ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision};
    use super::{Message, ParseError};
    use crate::counters::{Counter, CounterType};
    use crate::{DataRole, PowerRole};

    fn template() -> Header {
        Header::new_template(DataRole::Dfp, PowerRole::Source)
    }

    #[test]
    fn control_message_roundtrip() {
        let header = Header::new_control(
            template(),
            Counter::new_from_value(CounterType::MessageId, 5),
            ControlMessageType::Accept,
        );
        let message = Message::control(header);

        let mut buffer = [0u8; 30];
        let size = message.to_bytes(&mut buffer);
        assert_eq!(size, 2);

        let parsed = Message::from_bytes(&buffer[..size]).unwrap();
        assert!(parsed.is_control(ControlMessageType::Accept));
        assert_eq!(parsed.header.message_id(), 5);
        assert!(matches!(parsed.header.spec_revision(), Ok(SpecificationRevision::R2_0)));
    }

    #[test]
    fn data_message_roundtrip() {
        let header = Header::new_data(
            template(),
            Counter::new(CounterType::MessageId),
            DataMessageType::SourceCapabilities,
            2,
        );
        let message = Message::data(header, &[0x1234_5678, 0x9abc_def0]);

        let mut buffer = [0u8; 30];
        let size = message.to_bytes(&mut buffer);
        assert_eq!(size, 10);

        let parsed = Message::from_bytes(&buffer[..size]).unwrap();
        assert!(parsed.is_data(DataMessageType::SourceCapabilities));
        assert_eq!(parsed.objects[0], 0x1234_5678);
        assert_eq!(parsed.objects[1], 0x9abc_def0);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let header = Header::new_data(
            template(),
            Counter::new(CounterType::MessageId),
            DataMessageType::Request,
            1,
        );
        let message = Message::data(header, &[0]);

        let mut buffer = [0u8; 30];
        let size = message.to_bytes(&mut buffer);

        assert_eq!(
            Message::from_bytes(&buffer[..size - 1]),
            Err(ParseError::InvalidLength { expected: 6, found: 5 })
        );
    }

    #[test]
    fn control_has_zero_objects() {
        let header = Header::new_control(
            template(),
            Counter::new(CounterType::MessageId),
            ControlMessageType::PsRdy,
        );

        assert_eq!(header.num_objects(), 0);
        assert_eq!(
            header.message_type(),
            MessageType::Control(ControlMessageType::PsRdy)
        );
    }
}
