use crate::buffer::PAGE_SIZE;
use crate::storage::page::{INTERNAL_PAGE_HEADER_SIZE, LEAF_PAGE_HEADER_SIZE};

/// Nominal key width used to derive default tree fan-outs from the page size.
/// Keys are variable-length on disk; this only sizes the defaults.
const NOMINAL_KEY_SIZE: usize = 8;

const LEAF_ENTRY_SIZE: usize = 4 + NOMINAL_KEY_SIZE + 8;
const INTERNAL_ENTRY_SIZE: usize = 4 + NOMINAL_KEY_SIZE + 4;

#[derive(Debug, Clone, Copy)]
pub struct BufferPoolConfig {
    pub buffer_pool_size: usize,
    pub lru_k_k: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            buffer_pool_size: 1024,
            lru_k_k: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BTreeConfig {
    pub leaf_max_size: u32,
    pub internal_max_size: u32,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        BTreeConfig {
            leaf_max_size: ((PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / LEAF_ENTRY_SIZE) as u32,
            internal_max_size: ((PAGE_SIZE - INTERNAL_PAGE_HEADER_SIZE) / INTERNAL_ENTRY_SIZE)
                as u32,
        }
    }
}
