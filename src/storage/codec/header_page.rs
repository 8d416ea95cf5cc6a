use crate::buffer::PAGE_SIZE;
use crate::error::{VellumError, VellumResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::page::header_page::HEADER_RECORD_SIZE;
use crate::storage::page::{HeaderPage, HEADER_PAGE_MAX_RECORDS, HEADER_RECORD_NAME_SIZE};

pub struct HeaderPageCodec;

impl HeaderPageCodec {
    pub fn encode(page: &HeaderPage) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PAGE_SIZE);
        bytes.extend(CommonCodec::encode_u32(page.records.len() as u32));
        for (name, root_page_id) in page.records.iter() {
            let mut slot = [0u8; HEADER_RECORD_SIZE];
            slot[..name.len()].copy_from_slice(name.as_bytes());
            slot[HEADER_RECORD_NAME_SIZE..]
                .copy_from_slice(&CommonCodec::encode_i32(*root_page_id));
            bytes.extend_from_slice(&slot);
        }
        assert!(bytes.len() <= PAGE_SIZE, "header records overflow page");
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<HeaderPage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(VellumError::Storage(format!(
                "Header page size is not {} instead of {}",
                PAGE_SIZE,
                bytes.len()
            )));
        }
        let (num_records, mut consumed) = CommonCodec::decode_u32(bytes)?;
        if num_records as usize > HEADER_PAGE_MAX_RECORDS {
            return Err(VellumError::Storage(format!(
                "Header page claims {} records, maximum is {}",
                num_records, HEADER_PAGE_MAX_RECORDS
            )));
        }
        let mut records = Vec::with_capacity(num_records as usize);
        for _ in 0..num_records {
            let slot = &bytes[consumed..consumed + HEADER_RECORD_SIZE];
            let name_end = slot[..HEADER_RECORD_NAME_SIZE]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(HEADER_RECORD_NAME_SIZE);
            let name = std::str::from_utf8(&slot[..name_end])
                .map_err(|_| {
                    VellumError::Storage("Header record name is not valid utf8".to_string())
                })?
                .to_string();
            let (root_page_id, _) = CommonCodec::decode_i32(&slot[HEADER_RECORD_NAME_SIZE..])?;
            records.push((name, root_page_id));
            consumed += HEADER_RECORD_SIZE;
        }
        Ok((HeaderPage { records }, consumed))
    }
}
