use comfy_table::Cell;
use std::collections::VecDeque;

use crate::buffer::PAGE_SIZE;
use crate::error::VellumResult;
use crate::storage::index::BPlusTree;
use crate::storage::page::BPlusTreePage;

pub fn page_bytes_to_array(bytes: &[u8]) -> [u8; PAGE_SIZE] {
    let mut data = [0u8; PAGE_SIZE];
    data.copy_from_slice(bytes);
    data
}

fn format_key(key: &[u8]) -> String {
    if key.is_empty() {
        return "NULL".to_string();
    }
    if key.len() <= 8 {
        let mut buf = [0u8; 8];
        buf[8 - key.len()..].copy_from_slice(key);
        return u64::from_be_bytes(buf).to_string();
    }
    key.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Level-order rendering of the tree, one table per level.
pub fn pretty_format_index_tree(index: &BPlusTree) -> VellumResult<String> {
    let mut display = String::new();
    if index.is_empty() {
        display.push_str("Empty tree.");
        return Ok(display);
    }

    let mut curr_queue = VecDeque::new();
    curr_queue.push_back(index.root_page_id());

    let mut level_index = 1;
    while !curr_queue.is_empty() {
        let mut next_queue = VecDeque::new();

        display.push_str(&format!("B+ Tree Level No.{}:\n", level_index));

        let mut level_table = comfy_table::Table::new();
        level_table.load_preset("||--+-++|    ++++++");
        let mut level_header = vec![];
        let mut level_row = vec![];

        while let Some(page_id) = curr_queue.pop_front() {
            let curr_page = index.buffer_pool.fetch_tree_page(page_id)?;
            match &curr_page {
                BPlusTreePage::Internal(internal_page) => {
                    let mut page_table = comfy_table::Table::new();
                    page_table.load_preset("||--+-++|    ++++++");
                    let mut page_header = Vec::new();
                    let mut page_row = Vec::new();
                    for (key, child_page_id) in internal_page.array.iter() {
                        page_header.push(Cell::new(format_key(key)));
                        page_row.push(Cell::new(child_page_id));
                    }
                    page_table.set_header(page_header);
                    page_table.add_row(page_row);

                    level_header.push(Cell::new(format!(
                        "page_id={}, size: {}/{}",
                        page_id, internal_page.header.current_size, internal_page.header.max_size
                    )));
                    level_row.push(Cell::new(page_table));

                    next_queue.extend(internal_page.values());
                }
                BPlusTreePage::Leaf(leaf_page) => {
                    let mut page_table = comfy_table::Table::new();
                    page_table.load_preset("||--+-++|    ++++++");
                    let mut page_header = Vec::new();
                    let mut page_row = Vec::new();
                    for (key, rid) in leaf_page.array.iter() {
                        page_header.push(Cell::new(format_key(key)));
                        page_row.push(Cell::new(format!("{}-{}", rid.page_id, rid.slot_num)));
                    }
                    page_table.set_header(page_header);
                    page_table.add_row(page_row);

                    level_header.push(Cell::new(format!(
                        "page_id={}, size: {}/{}, next_page_id={}",
                        page_id,
                        leaf_page.header.current_size,
                        leaf_page.header.max_size,
                        leaf_page.header.next_page_id
                    )));
                    level_row.push(Cell::new(page_table));
                }
            }
            index.buffer_pool.unpin_page(page_id, false);
        }
        level_table.set_header(level_header);
        level_table.add_row(level_row);
        display.push_str(&format!("{level_table}\n"));

        level_index += 1;
        curr_queue = next_queue;
    }
    Ok(display)
}

#[cfg(test)]
mod tests {
    use super::format_key;

    #[test]
    fn key_rendering() {
        assert_eq!(format_key(&[]), "NULL");
        assert_eq!(format_key(&7i32.to_be_bytes()), "7");
        assert_eq!(format_key(&[0xab; 9]), "ab".repeat(9));
    }
}
