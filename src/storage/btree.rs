//! B+ tree operations over pager-resident nodes.
//!
//! All functions here address nodes by page number and re-fetch buffers
//! from the pager at each step, so no page reference is ever held across
//! a call that may allocate. The cell distribution of a leaf split reads
//! from a snapshot of the pre-split page image.

use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::cursor::Cursor;
use crate::storage::page::{self, NodeType, PAGE_SIZE};
use crate::storage::row::Row;
use crate::storage::table::Table;

/// Insert a row keyed by its id into the tree, keeping cells sorted.
pub fn insert(table: &mut Table, row: &Row) -> DbResult<()> {
    let key = row.id();
    let cursor = Cursor::table_find(table, key)?;

    let node = table.pager.get_page(cursor.page_num)?;
    let num_cells = page::leaf_num_cells(&node.data);
    if cursor.cell_num < num_cells && page::leaf_key(&node.data, cursor.cell_num)? == key {
        return Err(DbError::DuplicateKey(key));
    }

    leaf_node_insert(table, &cursor, key, row)
}

/// Every row of the table in ascending key order.
pub fn select_rows(table: &mut Table) -> DbResult<Vec<Row>> {
    let mut rows = Vec::new();
    let mut cursor = Cursor::table_start(table)?;
    while !cursor.end_of_table {
        rows.push(Row::deserialize(cursor.value(table)?));
        cursor.advance(table)?;
    }
    Ok(rows)
}

/// The largest key anywhere in the subtree rooted at `page_num`. For an
/// internal node that means descending through right children.
pub fn node_max_key(table: &mut Table, page_num: u32) -> DbResult<u32> {
    let node = table.pager.get_page(page_num)?;
    match page::get_node_type(&node.data)? {
        NodeType::Leaf => page::node_max_key(&node.data),
        NodeType::Internal => {
            let right_child = page::internal_right_child(&node.data);
            node_max_key(table, right_child)
        }
    }
}

/// Index of the child which should contain the given key: the first
/// separator greater than or equal to it, or the right child past them.
pub fn internal_node_find_child(page: &[u8; PAGE_SIZE], key: u32) -> DbResult<u32> {
    let num_keys = page::internal_num_keys(page);

    // Binary search
    let mut min_index = 0;
    let mut max_index = num_keys; // there is one more child than key

    while min_index != max_index {
        let index = (min_index + max_index) / 2;
        if page::internal_key(page, index)? >= key {
            max_index = index;
        } else {
            min_index = index + 1;
        }
    }
    Ok(min_index)
}

/// Rewrite the separator that used to read `old_key`. A key that was
/// never a separator (the node in question was the right child) has
/// nothing to update.
fn update_internal_node_key(page: &mut [u8; PAGE_SIZE], old_key: u32, new_key: u32) -> DbResult<()> {
    let old_child_index = internal_node_find_child(page, old_key)?;
    if old_child_index < page::internal_num_keys(page) {
        page::set_internal_key(page, old_child_index, new_key)?;
    }
    Ok(())
}

fn leaf_node_insert(table: &mut Table, cursor: &Cursor, key: u32, row: &Row) -> DbResult<()> {
    let node = table.pager.get_page(cursor.page_num)?;
    let num_cells = page::leaf_num_cells(&node.data);

    if num_cells as usize >= page::LEAF_NODE_MAX_CELLS {
        return leaf_node_split_and_insert(table, cursor, key, row);
    }

    if cursor.cell_num < num_cells {
        // Make room for the new cell
        page::leaf_shift_cells_right(&mut node.data, cursor.cell_num, num_cells)?;
    }

    page::set_leaf_num_cells(&mut node.data, num_cells + 1);
    page::set_leaf_key(&mut node.data, cursor.cell_num, key)?;
    row.serialize(page::leaf_value_mut(&mut node.data, cursor.cell_num)?);
    Ok(())
}

/// Create a new leaf and move half the cells over, splicing the new cell
/// in at the cursor. Afterwards either promote a new root or hand the new
/// leaf to the parent.
fn leaf_node_split_and_insert(
    table: &mut Table,
    cursor: &Cursor,
    key: u32,
    row: &Row,
) -> DbResult<()> {
    let old_page_num = cursor.page_num;
    let old_max = node_max_key(table, old_page_num)?;
    let new_page_num = table.pager.get_unused_page_num();
    debug!("splitting leaf page {old_page_num}, new sibling is page {new_page_num}");

    let (old_snapshot, old_is_root, old_parent) = {
        let old = table.pager.get_page(old_page_num)?;
        (
            old.data,
            page::get_is_root(&old.data),
            page::get_parent(&old.data),
        )
    };

    // The old leaf's sibling becomes the new leaf, and the new leaf's
    // sibling becomes whatever used to be the old leaf's sibling.
    {
        let new = table.pager.get_page(new_page_num)?;
        page::init_leaf_node(&mut new.data);
        page::set_parent(&mut new.data, old_parent);
        page::set_leaf_next_leaf(&mut new.data, page::leaf_next_leaf(&old_snapshot));
    }
    {
        let old = table.pager.get_page(old_page_num)?;
        page::set_leaf_next_leaf(&mut old.data, new_page_num);
    }

    // All existing cells plus the new one are divided evenly between the
    // old (left) and new (right) nodes, preserving key order.
    for i in (0..=page::LEAF_NODE_MAX_CELLS).rev() {
        let destination_page_num = if i >= page::LEAF_NODE_LEFT_SPLIT_COUNT {
            new_page_num
        } else {
            old_page_num
        };
        let index_within_node = (i % page::LEAF_NODE_LEFT_SPLIT_COUNT) as u32;
        let destination = table.pager.get_page(destination_page_num)?;

        if i == cursor.cell_num as usize {
            page::set_leaf_key(&mut destination.data, index_within_node, key)?;
            row.serialize(page::leaf_value_mut(&mut destination.data, index_within_node)?);
        } else if i > cursor.cell_num as usize {
            page::leaf_cell_mut(&mut destination.data, index_within_node)?
                .copy_from_slice(page::leaf_cell(&old_snapshot, (i - 1) as u32)?);
        } else {
            page::leaf_cell_mut(&mut destination.data, index_within_node)?
                .copy_from_slice(page::leaf_cell(&old_snapshot, i as u32)?);
        }
    }

    {
        let old = table.pager.get_page(old_page_num)?;
        page::set_leaf_num_cells(&mut old.data, page::LEAF_NODE_LEFT_SPLIT_COUNT as u32);
    }
    {
        let new = table.pager.get_page(new_page_num)?;
        page::set_leaf_num_cells(&mut new.data, page::LEAF_NODE_RIGHT_SPLIT_COUNT as u32);
    }

    if old_is_root {
        create_new_root(table, new_page_num)
    } else {
        let new_max = node_max_key(table, old_page_num)?;
        {
            let parent = table.pager.get_page(old_parent)?;
            update_internal_node_key(&mut parent.data, old_max, new_max)?;
        }
        internal_node_insert(table, old_parent, new_page_num)
    }
}

/// Grow the tree by one level while keeping page 0 as the root: the old
/// root is copied into a fresh left-child page, and page 0 is
/// reinitialized as an internal node over the two children.
fn create_new_root(table: &mut Table, right_child_page_num: u32) -> DbResult<()> {
    let root_page_num = table.root_page_num;
    let (root_snapshot, root_was_internal) = {
        let root = table.pager.get_page(root_page_num)?;
        (
            root.data,
            page::get_node_type(&root.data)? == NodeType::Internal,
        )
    };

    // The right child may be a page the caller has only just reserved;
    // fetching it pins its number before the left child takes the next
    // one.
    table.pager.get_page(right_child_page_num)?;
    let left_child_page_num = table.pager.get_unused_page_num();
    debug!("creating new root, children are pages {left_child_page_num} and {right_child_page_num}");
    table.pager.get_page(left_child_page_num)?;

    if root_was_internal {
        // An internal root splits before its new sibling has been
        // stamped; stamp it here so both children are valid nodes.
        let right = table.pager.get_page(right_child_page_num)?;
        page::init_internal_node(&mut right.data);
    }

    {
        let left = table.pager.get_page(left_child_page_num)?;
        left.data = root_snapshot;
        page::set_is_root(&mut left.data, false);
    }

    if root_was_internal {
        // The copied node's children still name page 0 as their parent.
        let num_keys = page::internal_num_keys(&root_snapshot);
        for i in 0..=num_keys {
            let child_page_num = page::internal_child(&root_snapshot, i)?;
            let child = table.pager.get_page(child_page_num)?;
            page::set_parent(&mut child.data, left_child_page_num);
        }
    }

    let left_child_max_key = node_max_key(table, left_child_page_num)?;
    {
        let root = table.pager.get_page(root_page_num)?;
        page::init_internal_node(&mut root.data);
        page::set_is_root(&mut root.data, true);
        page::set_internal_num_keys(&mut root.data, 1);
        page::set_internal_child(&mut root.data, 0, left_child_page_num)?;
        page::set_internal_key(&mut root.data, 0, left_child_max_key)?;
        page::set_internal_right_child(&mut root.data, right_child_page_num);
    }
    {
        let left = table.pager.get_page(left_child_page_num)?;
        page::set_parent(&mut left.data, root_page_num);
    }
    {
        let right = table.pager.get_page(right_child_page_num)?;
        page::set_parent(&mut right.data, root_page_num);
    }
    Ok(())
}

/// Add a new (child, key) pair to `parent_page_num`. The rightmost child
/// is stored apart from the cell array, so a child whose keys exceed the
/// current right child's takes its place instead of landing in a cell.
///
/// On the direct paths the child's parent pointer is stamped here; when
/// the parent is full the split takes over, and its own insertion of the
/// pending child decides the final parent.
fn internal_node_insert(
    table: &mut Table,
    parent_page_num: u32,
    child_page_num: u32,
) -> DbResult<()> {
    let child_max_key = node_max_key(table, child_page_num)?;
    let (index, original_num_keys, right_child_page_num) = {
        let parent = table.pager.get_page(parent_page_num)?;
        (
            internal_node_find_child(&parent.data, child_max_key)?,
            page::internal_num_keys(&parent.data),
            page::internal_right_child(&parent.data),
        )
    };

    if original_num_keys as usize >= page::INTERNAL_NODE_MAX_CELLS {
        return internal_node_split_and_insert(table, parent_page_num, child_page_num);
    }

    if right_child_page_num == page::INVALID_PAGE_NUM {
        // An internal node with an invalid right child is empty.
        let parent = table.pager.get_page(parent_page_num)?;
        page::set_internal_right_child(&mut parent.data, child_page_num);
    } else {
        let right_child_max_key = node_max_key(table, right_child_page_num)?;
        let parent = table.pager.get_page(parent_page_num)?;
        page::set_internal_num_keys(&mut parent.data, original_num_keys + 1);

        if child_max_key > right_child_max_key {
            // Replace right child
            page::set_internal_child(&mut parent.data, original_num_keys, right_child_page_num)?;
            page::set_internal_key(&mut parent.data, original_num_keys, right_child_max_key)?;
            page::set_internal_right_child(&mut parent.data, child_page_num);
        } else {
            // Make room for the new cell
            page::internal_shift_cells_right(&mut parent.data, index, original_num_keys)?;
            page::set_internal_child(&mut parent.data, index, child_page_num)?;
            page::set_internal_key(&mut parent.data, index, child_max_key)?;
        }
    }

    let child = table.pager.get_page(child_page_num)?;
    page::set_parent(&mut child.data, parent_page_num);
    Ok(())
}

/// Split a full internal node while inserting `child_page_num` under it,
/// recursing into the parent when that insert overflows too. Splitting
/// the root goes through root promotion first and continues on the copy.
fn internal_node_split_and_insert(
    table: &mut Table,
    parent_page_num: u32,
    child_page_num: u32,
) -> DbResult<()> {
    let mut old_page_num = parent_page_num;
    let old_max = node_max_key(table, old_page_num)?;
    let child_max = node_max_key(table, child_page_num)?;
    let new_page_num = table.pager.get_unused_page_num();
    debug!("splitting internal page {old_page_num}, new sibling is page {new_page_num}");

    let splitting_root = {
        let old = table.pager.get_page(old_page_num)?;
        page::get_is_root(&old.data)
    };

    // `separator_holder` is the node that keeps the separator for the old
    // node once the split is done.
    let separator_holder;
    if splitting_root {
        create_new_root(table, new_page_num)?;
        separator_holder = table.root_page_num;
        old_page_num = {
            let root = table.pager.get_page(table.root_page_num)?;
            page::internal_child(&root.data, 0)?
        };
    } else {
        separator_holder = {
            let old = table.pager.get_page(old_page_num)?;
            page::get_parent(&old.data)
        };
        let new = table.pager.get_page(new_page_num)?;
        page::init_internal_node(&mut new.data);
    }

    let mut remaining_keys = {
        let old = table.pager.get_page(old_page_num)?;
        page::internal_num_keys(&old.data)
    };

    // The old right child moves into the new node first, leaving the old
    // node temporarily without one.
    let moving_page_num = {
        let old = table.pager.get_page(old_page_num)?;
        page::internal_right_child(&old.data)
    };
    internal_node_insert(table, new_page_num, moving_page_num)?;
    {
        let old = table.pager.get_page(old_page_num)?;
        page::set_internal_right_child(&mut old.data, page::INVALID_PAGE_NUM);
    }

    // Cells above the middle follow it over, one at a time.
    for i in ((page::INTERNAL_NODE_MAX_CELLS / 2 + 1)..page::INTERNAL_NODE_MAX_CELLS).rev() {
        let moving_page_num = {
            let old = table.pager.get_page(old_page_num)?;
            page::internal_child(&old.data, i as u32)?
        };
        internal_node_insert(table, new_page_num, moving_page_num)?;
        remaining_keys -= 1;
        {
            let old = table.pager.get_page(old_page_num)?;
            page::set_internal_num_keys(&mut old.data, remaining_keys);
        }
    }

    // The child just below the middle becomes the old node's right child.
    {
        let demoted_cell_child = {
            let old = table.pager.get_page(old_page_num)?;
            page::internal_child(&old.data, remaining_keys - 1)?
        };
        let old = table.pager.get_page(old_page_num)?;
        page::set_internal_right_child(&mut old.data, demoted_cell_child);
        page::set_internal_num_keys(&mut old.data, remaining_keys - 1);
    }

    // The pending child lands in whichever half now bounds its max key.
    let max_after_split = node_max_key(table, old_page_num)?;
    let destination_page_num = if child_max < max_after_split {
        old_page_num
    } else {
        new_page_num
    };
    internal_node_insert(table, destination_page_num, child_page_num)?;

    // The old node shrank; its separator upstairs must shrink with it.
    let old_node_max = node_max_key(table, old_page_num)?;
    {
        let holder = table.pager.get_page(separator_holder)?;
        update_internal_node_key(&mut holder.data, old_max, old_node_max)?;
    }

    if !splitting_root {
        // The insert stamps the new node's parent, or a nested split of
        // a full grandparent re-homes it; either way the pointer is
        // settled downstream and must not be rewritten here.
        let old_parent = {
            let old = table.pager.get_page(old_page_num)?;
            page::get_parent(&old.data)
        };
        internal_node_insert(table, old_parent, new_page_num)?;
    }
    Ok(())
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Append an indented preorder rendering of the subtree at `page_num`,
/// the format the `.btree` meta-command prints.
pub fn render_tree(
    table: &mut Table,
    page_num: u32,
    indentation_level: usize,
    out: &mut String,
) -> DbResult<()> {
    let node_type = {
        let node = table.pager.get_page(page_num)?;
        page::get_node_type(&node.data)?
    };

    match node_type {
        NodeType::Leaf => {
            let node = table.pager.get_page(page_num)?;
            let num_cells = page::leaf_num_cells(&node.data);
            indent(out, indentation_level);
            out.push_str(&format!("- leaf (size {num_cells})\n"));
            for i in 0..num_cells {
                let key = page::leaf_key(&node.data, i)?;
                indent(out, indentation_level + 1);
                out.push_str(&format!("- {key}\n"));
            }
        }
        NodeType::Internal => {
            let (num_keys, right_child) = {
                let node = table.pager.get_page(page_num)?;
                (
                    page::internal_num_keys(&node.data),
                    page::internal_right_child(&node.data),
                )
            };
            indent(out, indentation_level);
            out.push_str(&format!("- internal (size {num_keys})\n"));
            for i in 0..num_keys {
                let (child, key) = {
                    let node = table.pager.get_page(page_num)?;
                    (
                        page::internal_child(&node.data, i)?,
                        page::internal_key(&node.data, i)?,
                    )
                };
                render_tree(table, child, indentation_level + 1, out)?;
                indent(out, indentation_level + 1);
                out.push_str(&format!("- key {key}\n"));
            }
            if right_child != page::INVALID_PAGE_NUM {
                render_tree(table, right_child, indentation_level + 1, out)?;
            }
        }
    }
    Ok(())
}
