use crate::error::DbResult;
use crate::storage::btree;
use crate::storage::page::{self, NodeType};
use crate::storage::table::Table;

/// A position within the key-ordered sequence of cells.
///
/// A cursor is plain data; it names a cell by page number and cell index
/// and never holds onto a page buffer, so it stays valid across calls
/// that grow the tree.
pub struct Cursor {
    pub page_num: u32,
    pub cell_num: u32,
    /// Set once the cursor has moved one past the last cell.
    pub end_of_table: bool,
}

impl Cursor {
    /// Position at the first cell of the leftmost leaf. `end_of_table` is
    /// set when the table holds no rows at all.
    pub fn table_start(table: &mut Table) -> DbResult<Cursor> {
        let mut cursor = Cursor::table_find(table, 0)?;
        let page = table.pager.get_page(cursor.page_num)?;
        cursor.end_of_table = page::leaf_num_cells(&page.data) == 0;
        Ok(cursor)
    }

    /// Return the position of the given key. If the key is not present,
    /// return the position where it should be inserted: the first cell
    /// with a greater key, possibly one past the last cell.
    pub fn table_find(table: &mut Table, key: u32) -> DbResult<Cursor> {
        let mut page_num = table.root_page_num;

        loop {
            let page = table.pager.get_page(page_num)?;
            match page::get_node_type(&page.data)? {
                NodeType::Leaf => return Self::leaf_find(&page.data, page_num, key),
                NodeType::Internal => {
                    let child_index = btree::internal_node_find_child(&page.data, key)?;
                    page_num = page::internal_child(&page.data, child_index)?;
                }
            }
        }
    }

    /// Position one past the last cell of the rightmost leaf.
    pub fn table_end(table: &mut Table) -> DbResult<Cursor> {
        let mut page_num = table.root_page_num;

        loop {
            let page = table.pager.get_page(page_num)?;
            match page::get_node_type(&page.data)? {
                NodeType::Internal => {
                    page_num = page::internal_right_child(&page.data);
                }
                NodeType::Leaf => {
                    return Ok(Cursor {
                        page_num,
                        cell_num: page::leaf_num_cells(&page.data),
                        end_of_table: true,
                    });
                }
            }
        }
    }

    fn leaf_find(
        page: &[u8; page::PAGE_SIZE],
        page_num: u32,
        key: u32,
    ) -> DbResult<Cursor> {
        // Binary search over the leaf's sorted cells.
        let mut min_index = 0;
        let mut one_past_max_index = page::leaf_num_cells(page);

        while min_index != one_past_max_index {
            let index = (min_index + one_past_max_index) / 2;
            let key_at_index = page::leaf_key(page, index)?;
            if key == key_at_index {
                min_index = index;
                break;
            } else if key < key_at_index {
                one_past_max_index = index;
            } else {
                min_index = index + 1;
            }
        }

        Ok(Cursor {
            page_num,
            cell_num: min_index,
            end_of_table: false,
        })
    }

    /// The serialized row under the cursor.
    pub fn value<'t>(&self, table: &'t mut Table) -> DbResult<&'t [u8]> {
        let page = table.pager.get_page(self.page_num)?;
        page::leaf_value(&page.data, self.cell_num)
    }

    /// Step to the next cell, crossing into the right sibling leaf when
    /// the current one is exhausted.
    pub fn advance(&mut self, table: &mut Table) -> DbResult<()> {
        let page = table.pager.get_page(self.page_num)?;
        self.cell_num += 1;

        if self.cell_num >= page::leaf_num_cells(&page.data) {
            let next_page_num = page::leaf_next_leaf(&page.data);
            if next_page_num == 0 {
                // This was the rightmost leaf.
                self.end_of_table = true;
            } else {
                self.page_num = next_page_num;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
