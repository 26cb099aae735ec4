//! The growable byte buffer behind every section and function body.

use crate::error::{Error, Result};

/// Writes the binary format's encoding primitives into a growable buffer.
///
/// A section's size is unknown until its content is produced, so content is
/// always staged in a scratch `Writer` and then framed into its parent with
/// [`section()`]; function bodies inside the code section follow the same
/// pattern.
///
/// [`section()`]: Writer::section
#[derive(Debug, Default)]
pub(crate) struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// All growth funnels through here, so allocation failure surfaces as
    /// [`Error::OutOfMemory`] instead of aborting the process.
    fn reserve(&mut self, additional: usize) -> Result<()> {
        self.bytes
            .try_reserve(additional)
            .map_err(|_| Error::OutOfMemory)
    }

    pub(crate) fn byte(&mut self, byte: u8) -> Result<()> {
        self.reserve(1)?;
        self.bytes.push(byte);
        Ok(())
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Unsigned LEB128: seven bits at a time, little end first, bit 7 set on
    /// every byte but the last.
    pub(crate) fn uleb128(&mut self, mut value: u32) -> Result<()> {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                return self.byte(byte);
            }
            self.byte(byte | 0x80)?;
        }
    }

    /// Signed LEB128 of a 64-bit value. The shift is arithmetic; emission
    /// stops once the remaining value is all sign bits and the sign bit of
    /// the emitted byte agrees with it.
    pub(crate) fn sleb128(&mut self, mut value: i64) -> Result<()> {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0) {
                return self.byte(byte);
            }
            self.byte(byte | 0x80)?;
        }
    }

    /// The raw little-endian IEEE-754 bit pattern of an `f64.const` operand.
    pub(crate) fn f64(&mut self, value: f64) -> Result<()> {
        self.bytes(&value.to_le_bytes())
    }

    /// A length-prefixed UTF-8 name.
    pub(crate) fn name(&mut self, name: &str) -> Result<()> {
        self.uleb128(u32::try_from(name.len()).map_err(|_| Error::Overflow)?)?;
        self.bytes(name.as_bytes())
    }

    /// Frames `content` as a section: the id byte, the LEB128 content
    /// length, then the content itself.
    pub(crate) fn section(&mut self, id: u8, content: &Writer) -> Result<()> {
        self.byte(id)?;
        self.uleb128(u32::try_from(content.len()).map_err(|_| Error::Overflow)?)?;
        self.bytes(content.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::Writer;

    fn unsigned(value: u32) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.uleb128(value).unwrap();
        writer.into_bytes()
    }

    fn signed(value: i64) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.sleb128(value).unwrap();
        writer.into_bytes()
    }

    #[test]
    fn unsigned_leb128_widths() {
        assert_eq!(unsigned(0), [0x00]);
        assert_eq!(unsigned(127), [0x7F]);
        assert_eq!(unsigned(128), [0x80, 0x01]);
        assert_eq!(unsigned(624_485), [0xE5, 0x8E, 0x26]);
        assert_eq!(unsigned(u32::MAX), [0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn signed_leb128_terminates_on_sign_agreement() {
        assert_eq!(signed(0), [0x00]);
        assert_eq!(signed(63), [0x3F]);
        assert_eq!(signed(64), [0xC0, 0x00]);
        assert_eq!(signed(-1), [0x7F]);
        assert_eq!(signed(-64), [0x40]);
        assert_eq!(signed(-65), [0xBF, 0x7F]);
        assert_eq!(signed(-123_456), [0xC0, 0xBB, 0x78]);
    }

    #[test]
    fn sections_are_length_prefixed() {
        let mut content = Writer::new();
        content.bytes(&[1, 2, 3]).unwrap();

        let mut writer = Writer::new();
        writer.section(7, &content).unwrap();
        assert_eq!(writer.into_bytes(), [7, 3, 1, 2, 3]);
    }
}
