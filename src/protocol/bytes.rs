//! Little-endian payload field readers and writers.
//!
//! Dialect payload codecs read from [`Bytes`] and write into [`BytesMut`].
//! MAVLink payloads are little-endian with fields sorted by decreasing size.

/// Reader over a payload byte slice.
pub struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Attempted to read past the end of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotEnoughBytes;

impl<'a> Bytes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    fn get_array<const SIZE: usize>(&mut self) -> Result<[u8; SIZE], NotEnoughBytes> {
        let bytes = self
            .data
            .get(self.pos..self.pos + SIZE)
            .ok_or(NotEnoughBytes)?;
        self.pos += SIZE;
        let mut arr = [0u8; SIZE];
        arr.copy_from_slice(bytes);
        Ok(arr)
    }

    #[inline]
    pub fn get_u8(&mut self) -> Result<u8, NotEnoughBytes> {
        let val = *self.data.get(self.pos).ok_or(NotEnoughBytes)?;
        self.pos += 1;
        Ok(val)
    }

    #[inline]
    pub fn get_u16_le(&mut self) -> Result<u16, NotEnoughBytes> {
        Ok(u16::from_le_bytes(self.get_array()?))
    }

    #[inline]
    pub fn get_u32_le(&mut self) -> Result<u32, NotEnoughBytes> {
        Ok(u32::from_le_bytes(self.get_array()?))
    }

    #[inline]
    pub fn get_f32_le(&mut self) -> Result<f32, NotEnoughBytes> {
        Ok(f32::from_le_bytes(self.get_array()?))
    }
}

/// Writer producing a payload byte vector.
#[derive(Default)]
pub struct BytesMut {
    data: Vec<u8>,
}

impl BytesMut {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn put_u8(&mut self, val: u8) {
        self.data.push(val);
    }

    #[inline]
    pub fn put_u16_le(&mut self, val: u16) {
        self.data.extend_from_slice(&val.to_le_bytes());
    }

    #[inline]
    pub fn put_u32_le(&mut self, val: u32) {
        self.data.extend_from_slice(&val.to_le_bytes());
    }

    #[inline]
    pub fn put_f32_le(&mut self, val: f32) {
        self.data.extend_from_slice(&val.to_le_bytes());
    }

    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod bytes_tests {
    use super::*;

    #[test]
    fn fields_round_trip() {
        let mut buf = BytesMut::with_capacity(11);
        buf.put_u32_le(0xDEAD_BEEF);
        buf.put_f32_le(1.5);
        buf.put_u16_le(0x1234);
        buf.put_u8(0x42);
        let data = buf.into_vec();
        assert_eq!(data.len(), 11);

        let mut bytes = Bytes::new(&data);
        assert_eq!(bytes.get_u32_le(), Ok(0xDEAD_BEEF));
        assert_eq!(bytes.get_f32_le(), Ok(1.5));
        assert_eq!(bytes.get_u16_le(), Ok(0x1234));
        assert_eq!(bytes.get_u8(), Ok(0x42));
        assert_eq!(bytes.remaining(), 0);
        assert_eq!(bytes.get_u8(), Err(NotEnoughBytes));
    }
}
