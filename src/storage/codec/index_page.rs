use crate::buffer::PAGE_SIZE;
use crate::error::{VellumError, VellumResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::page::{
    BPlusTreeInternalPage, BPlusTreeInternalPageHeader, BPlusTreeLeafPage, BPlusTreeLeafPageHeader,
    BPlusTreePage, BPlusTreePageType, RecordId,
};

pub struct BPlusTreePageTypeCodec;

impl BPlusTreePageTypeCodec {
    pub fn encode(page_type: &BPlusTreePageType) -> Vec<u8> {
        match page_type {
            BPlusTreePageType::LeafPage => CommonCodec::encode_u32(1),
            BPlusTreePageType::InternalPage => CommonCodec::encode_u32(2),
        }
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<BPlusTreePageType>> {
        let (flag, offset) = CommonCodec::decode_u32(bytes)?;
        match flag {
            1 => Ok((BPlusTreePageType::LeafPage, offset)),
            2 => Ok((BPlusTreePageType::InternalPage, offset)),
            _ => Err(VellumError::Storage(format!("Invalid page type {}", flag))),
        }
    }
}

pub struct RecordIdCodec;

impl RecordIdCodec {
    pub fn encode(rid: &RecordId) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend(CommonCodec::encode_i32(rid.page_id));
        bytes.extend(CommonCodec::encode_u32(rid.slot_num));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<RecordId>> {
        let mut left_bytes = bytes;
        let (page_id, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (slot_num, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        Ok((
            RecordId::new(page_id, slot_num),
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct BPlusTreePageCodec;

impl BPlusTreePageCodec {
    pub fn encode(page: &BPlusTreePage) -> Vec<u8> {
        match page {
            BPlusTreePage::Leaf(page) => BPlusTreeLeafPageCodec::encode(page),
            BPlusTreePage::Internal(page) => BPlusTreeInternalPageCodec::encode(page),
        }
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<BPlusTreePage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(VellumError::Storage(format!(
                "Index page size is not {} instead of {}",
                PAGE_SIZE,
                bytes.len()
            )));
        }
        // peek the tag without consuming
        let (page_type, _) = BPlusTreePageTypeCodec::decode(bytes)?;
        match page_type {
            BPlusTreePageType::LeafPage => {
                let (page, offset) = BPlusTreeLeafPageCodec::decode(bytes)?;
                Ok((BPlusTreePage::Leaf(page), offset))
            }
            BPlusTreePageType::InternalPage => {
                let (page, offset) = BPlusTreeInternalPageCodec::decode(bytes)?;
                Ok((BPlusTreePage::Internal(page), offset))
            }
        }
    }
}

pub struct BPlusTreeLeafPageCodec;

impl BPlusTreeLeafPageCodec {
    pub fn encode(page: &BPlusTreeLeafPage) -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend(BPlusTreeLeafPageHeaderCodec::encode(&page.header));
        for (key, rid) in page.array.iter() {
            bytes.extend(CommonCodec::encode_bytes(key));
            bytes.extend(RecordIdCodec::encode(rid));
        }
        assert!(bytes.len() <= PAGE_SIZE, "leaf page contents overflow page");
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<BPlusTreeLeafPage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(VellumError::Storage(format!(
                "Index page size is not {} instead of {}",
                PAGE_SIZE,
                bytes.len()
            )));
        }
        let (header, offset) = BPlusTreeLeafPageHeaderCodec::decode(bytes)?;
        let mut left_bytes = &bytes[offset..];

        let mut array = Vec::with_capacity(header.current_size as usize);
        for _ in 0..header.current_size {
            let (key, offset) = CommonCodec::decode_bytes(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            let (rid, offset) = RecordIdCodec::decode(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            array.push((key, rid));
        }

        Ok((BPlusTreeLeafPage { header, array }, PAGE_SIZE))
    }
}

pub struct BPlusTreeInternalPageCodec;

impl BPlusTreeInternalPageCodec {
    pub fn encode(page: &BPlusTreeInternalPage) -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend(BPlusTreeInternalPageHeaderCodec::encode(&page.header));
        for (key, child_page_id) in page.array.iter() {
            bytes.extend(CommonCodec::encode_bytes(key));
            bytes.extend(CommonCodec::encode_i32(*child_page_id));
        }
        assert!(
            bytes.len() <= PAGE_SIZE,
            "internal page contents overflow page"
        );
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<BPlusTreeInternalPage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(VellumError::Storage(format!(
                "Index page size is not {} instead of {}",
                PAGE_SIZE,
                bytes.len()
            )));
        }
        let (header, offset) = BPlusTreeInternalPageHeaderCodec::decode(bytes)?;
        let mut left_bytes = &bytes[offset..];

        let mut array = Vec::with_capacity(header.current_size as usize);
        for _ in 0..header.current_size {
            let (key, offset) = CommonCodec::decode_bytes(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            let (child_page_id, offset) = CommonCodec::decode_i32(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            array.push((key, child_page_id));
        }

        Ok((BPlusTreeInternalPage { header, array }, PAGE_SIZE))
    }
}

pub struct BPlusTreeLeafPageHeaderCodec;

impl BPlusTreeLeafPageHeaderCodec {
    pub fn encode(header: &BPlusTreeLeafPageHeader) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(BPlusTreePageTypeCodec::encode(&header.page_type));
        bytes.extend(CommonCodec::encode_u32(header.lsn));
        bytes.extend(CommonCodec::encode_u32(header.current_size));
        bytes.extend(CommonCodec::encode_u32(header.max_size));
        bytes.extend(CommonCodec::encode_i32(header.parent_page_id));
        bytes.extend(CommonCodec::encode_i32(header.page_id));
        bytes.extend(CommonCodec::encode_i32(header.next_page_id));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<BPlusTreeLeafPageHeader>> {
        let mut left_bytes = bytes;

        let (page_type, offset) = BPlusTreePageTypeCodec::decode(left_bytes)?;
        if !matches!(page_type, BPlusTreePageType::LeafPage) {
            return Err(VellumError::Storage(
                "Index page type must be leaf page".to_string(),
            ));
        }
        left_bytes = &left_bytes[offset..];
        let (lsn, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (current_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (max_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (parent_page_id, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (page_id, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (next_page_id, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        Ok((
            BPlusTreeLeafPageHeader {
                page_type,
                lsn,
                current_size,
                max_size,
                parent_page_id,
                page_id,
                next_page_id,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct BPlusTreeInternalPageHeaderCodec;

impl BPlusTreeInternalPageHeaderCodec {
    pub fn encode(header: &BPlusTreeInternalPageHeader) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(BPlusTreePageTypeCodec::encode(&header.page_type));
        bytes.extend(CommonCodec::encode_u32(header.lsn));
        bytes.extend(CommonCodec::encode_u32(header.current_size));
        bytes.extend(CommonCodec::encode_u32(header.max_size));
        bytes.extend(CommonCodec::encode_i32(header.parent_page_id));
        bytes.extend(CommonCodec::encode_i32(header.page_id));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> VellumResult<DecodedData<BPlusTreeInternalPageHeader>> {
        let mut left_bytes = bytes;

        let (page_type, offset) = BPlusTreePageTypeCodec::decode(left_bytes)?;
        if !matches!(page_type, BPlusTreePageType::InternalPage) {
            return Err(VellumError::Storage(
                "Index page type must be internal page".to_string(),
            ));
        }
        left_bytes = &left_bytes[offset..];
        let (lsn, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (current_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (max_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (parent_page_id, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (page_id, offset) = CommonCodec::decode_i32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        Ok((
            BPlusTreeInternalPageHeader {
                page_type,
                lsn,
                current_size,
                max_size,
                parent_page_id,
                page_id,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::BPlusTreePageCodec;
    use crate::buffer::INVALID_PAGE_ID;
    use crate::storage::index::comparator::default_comparator;
    use crate::storage::page::{
        BPlusTreeInternalPage, BPlusTreeLeafPage, BPlusTreePage, RecordId,
    };

    #[test]
    fn index_page_codec() {
        let mut leaf_page = BPlusTreeLeafPage::new(5, INVALID_PAGE_ID, 100);
        leaf_page.insert(b"apple".to_vec(), RecordId::new(1, 1), default_comparator);
        leaf_page.insert(b"banana".to_vec(), RecordId::new(2, 2), default_comparator);
        leaf_page.header.next_page_id = 6;
        let page = BPlusTreePage::Leaf(leaf_page);
        let (decoded, _) = BPlusTreePageCodec::decode(&BPlusTreePageCodec::encode(&page)).unwrap();
        assert_eq!(decoded, page);

        let mut internal_page = BPlusTreeInternalPage::new(7, INVALID_PAGE_ID, 100);
        internal_page.populate_new_root(1, b"banana".to_vec(), 2);
        internal_page.insert_after(2, b"cherry".to_vec(), 3);
        let page = BPlusTreePage::Internal(internal_page);
        let (decoded, _) = BPlusTreePageCodec::decode(&BPlusTreePageCodec::encode(&page)).unwrap();
        assert_eq!(decoded, page);
    }

    #[test]
    fn zeroed_page_is_rejected() {
        let bytes = [0u8; crate::buffer::PAGE_SIZE];
        assert!(BPlusTreePageCodec::decode(&bytes).is_err());
    }
}
