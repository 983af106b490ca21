use std::path::Path;

use log::info;

use crate::error::DbResult;
use crate::storage::btree;
use crate::storage::page;
use crate::storage::pager::Pager;
use crate::storage::row::Row;

/// The single table of the database: a pager plus the page number of the
/// B+ tree root, which is always page 0.
pub struct Table {
    pub root_page_num: u32,
    pub pager: Pager,
}

impl Table {
    /// Open the database file, initializing page 0 as an empty root leaf
    /// when the file is brand new.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Table> {
        let mut pager = Pager::open(path)?;
        let root_page_num = 0;

        if pager.num_pages() == 0 {
            // New database file. Initialize page 0 as leaf node.
            let root = pager.get_page(root_page_num)?;
            page::init_leaf_node(&mut root.data);
            page::set_is_root(&mut root.data, true);
        }

        Ok(Table {
            root_page_num,
            pager,
        })
    }

    /// Write every resident page back to disk. Writes that were never
    /// flushed do not survive the process.
    pub fn close(&mut self) -> DbResult<()> {
        for page_num in 0..self.pager.num_pages() {
            if self.pager.is_resident(page_num) {
                self.pager.flush_page(page_num)?;
            }
        }
        info!("closed table, {} pages", self.pager.num_pages());
        Ok(())
    }

    /// Insert a row keyed by its id; an id already in the table is
    /// rejected.
    pub fn insert(&mut self, row: &Row) -> DbResult<()> {
        btree::insert(self, row)
    }

    /// Every row in ascending key order.
    pub fn select(&mut self) -> DbResult<Vec<Row>> {
        btree::select_rows(self)
    }

    /// Rendering of the tree structure, as printed by the `.btree`
    /// meta-command.
    pub fn render_tree(&mut self) -> DbResult<String> {
        let root_page_num = self.root_page_num;
        let mut out = String::new();
        btree::render_tree(self, root_page_num, 0, &mut out)?;
        Ok(out)
    }
}
