use crate::error::{VellumError, VellumResult};
use crate::storage::codec::DecodedData;

pub struct CommonCodec;

impl CommonCodec {
    pub fn encode_u8(data: u8) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u8(bytes: &[u8]) -> VellumResult<DecodedData<u8>> {
        if bytes.is_empty() {
            return Err(VellumError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                1
            )));
        }
        Ok((u8::from_be_bytes([bytes[0]]), 1))
    }

    pub fn encode_u32(data: u32) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u32(bytes: &[u8]) -> VellumResult<DecodedData<u32>> {
        if bytes.len() < 4 {
            return Err(VellumError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                4
            )));
        }
        let data = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok((u32::from_be_bytes(data), 4))
    }

    pub fn encode_i32(data: i32) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_i32(bytes: &[u8]) -> VellumResult<DecodedData<i32>> {
        if bytes.len() < 4 {
            return Err(VellumError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                4
            )));
        }
        let data = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok((i32::from_be_bytes(data), 4))
    }

    pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + data.len());
        bytes.extend(CommonCodec::encode_u32(data.len() as u32));
        bytes.extend_from_slice(data);
        bytes
    }

    pub fn decode_bytes(bytes: &[u8]) -> VellumResult<DecodedData<Vec<u8>>> {
        let (length, offset) = CommonCodec::decode_u32(bytes)?;
        let length = length as usize;
        if bytes.len() < offset + length {
            return Err(VellumError::Internal(format!(
                "bytes length {} is less than expected {}",
                bytes.len(),
                offset + length
            )));
        }
        let data = bytes[offset..offset + length].to_vec();
        Ok((data, offset + length))
    }
}

#[cfg(test)]
mod tests {
    use super::CommonCodec;

    #[test]
    fn scalar_codec() {
        let (v, offset) = CommonCodec::decode_u8(&CommonCodec::encode_u8(250)).unwrap();
        assert_eq!((v, offset), (250, 1));
        let (v, offset) = CommonCodec::decode_u32(&CommonCodec::encode_u32(123_456)).unwrap();
        assert_eq!((v, offset), (123_456, 4));
        let (v, offset) = CommonCodec::decode_i32(&CommonCodec::encode_i32(-1)).unwrap();
        assert_eq!((v, offset), (-1, 4));
    }

    #[test]
    fn bytes_codec() {
        let (v, offset) = CommonCodec::decode_bytes(&CommonCodec::encode_bytes(b"vellum")).unwrap();
        assert_eq!(v, b"vellum");
        assert_eq!(offset, 10);
        assert!(CommonCodec::decode_bytes(&[0, 0, 0, 9, 1]).is_err());
    }
}
