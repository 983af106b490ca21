use crate::error::{DbError, DbResult};
use crate::storage::row::ROW_SIZE;

// ┌─────────────────────────────────────────────────────────────────────────┐
// │ Common node header                                                      │
// │────────┬────────┬───────────────────────────────────────────────────────│
// │ Offset │ Length │ Description                                           │
// │────────┼────────┼───────────────────────────────────────────────────────│
// │   0    │   1    │ NODE_TYPE (0 = internal, 1 = leaf)                    │
// │   1    │   1    │ IS_ROOT   (0 = false, 1 = true)                       │
// │   2    │   4    │ PARENT_PAGE (u32): page number of parent (0 if none)  │
// └────────┴────────┴───────────────────────────────────────────────────────┘
//
// ┌─────────────────────────────────────────────────────────────────────────┐
// │ Leaf node                                                               │
// │────────┬────────┬───────────────────────────────────────────────────────│
// │   6    │   4    │ NUM_CELLS (u32)                                       │
// │  10    │   4    │ NEXT_LEAF (u32): right sibling, 0 = rightmost leaf    │
// │  14    │  ...   │ Cells: [key u32][row image, ROW_SIZE bytes] each      │
// └────────┴────────┴───────────────────────────────────────────────────────┘
//
// ┌─────────────────────────────────────────────────────────────────────────┐
// │ Internal node                                                           │
// │────────┬────────┬───────────────────────────────────────────────────────│
// │   6    │   4    │ NUM_KEYS (u32)                                        │
// │  10    │   4    │ RIGHT_CHILD (u32), INVALID_PAGE_NUM when node empty   │
// │  14    │  ...   │ Cells: [child page u32][key u32] each                 │
// └────────┴────────┴───────────────────────────────────────────────────────┘
//
// All multi-byte fields are in the host's byte order.

pub const PAGE_SIZE: usize = 4096;

// Common node header layout.
pub const NODE_TYPE_OFFSET: usize = 0;
pub const IS_ROOT_OFFSET: usize = 1;
pub const PARENT_POINTER_OFFSET: usize = 2;
pub const COMMON_NODE_HEADER_SIZE: usize = 6;

// Leaf node header layout.
pub const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + 4;
pub const LEAF_NODE_HEADER_SIZE: usize = LEAF_NODE_NEXT_LEAF_OFFSET + 4;

// Leaf node body layout.
pub const LEAF_NODE_KEY_SIZE: usize = size_of::<u32>();
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

// A full leaf plus the incoming cell are redistributed over two nodes.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal node header layout.
pub const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize = INTERNAL_NODE_NUM_KEYS_OFFSET + 4;
pub const INTERNAL_NODE_HEADER_SIZE: usize = INTERNAL_NODE_RIGHT_CHILD_OFFSET + 4;

// Internal node body layout.
pub const INTERNAL_NODE_CHILD_SIZE: usize = size_of::<u32>();
pub const INTERNAL_NODE_KEY_SIZE: usize = size_of::<u32>();
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;
/// Kept small for testing; a page physically fits far more cells.
pub const INTERNAL_NODE_MAX_CELLS: usize = 3;

/// Sentinel right-child value of an empty internal node. Page 0 is the
/// root, so a zeroed right-child field would otherwise read as a valid
/// child that makes the node a parent of the root.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

impl TryFrom<u8> for NodeType {
    type Error = DbError;

    fn try_from(byte: u8) -> DbResult<Self> {
        match byte {
            0 => Ok(NodeType::Internal),
            1 => Ok(NodeType::Leaf),
            invalid => Err(DbError::InvalidNodeType(invalid)),
        }
    }
}

fn read_u32(page: &[u8; PAGE_SIZE], offset: usize) -> u32 {
    let bytes = &page[offset..offset + 4];
    u32::from_ne_bytes(bytes.try_into().unwrap())
}

fn write_u32(page: &mut [u8; PAGE_SIZE], offset: usize, value: u32) {
    page[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

/// Read this page's node type (internal vs. leaf).
pub fn get_node_type(page: &[u8; PAGE_SIZE]) -> DbResult<NodeType> {
    NodeType::try_from(page[NODE_TYPE_OFFSET])
}

/// Set the node type.
pub fn set_node_type(page: &mut [u8; PAGE_SIZE], node_type: NodeType) {
    page[NODE_TYPE_OFFSET] = match node_type {
        NodeType::Internal => 0,
        NodeType::Leaf => 1,
    };
}

/// Read the "is_root" flag.
pub fn get_is_root(page: &[u8; PAGE_SIZE]) -> bool {
    page[IS_ROOT_OFFSET] == 1
}

/// Set or clear the "is_root" flag.
pub fn set_is_root(page: &mut [u8; PAGE_SIZE], is_root: bool) {
    page[IS_ROOT_OFFSET] = if is_root { 1 } else { 0 };
}

/// Read the parent page number.
pub fn get_parent(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, PARENT_POINTER_OFFSET)
}

/// Set the parent page number.
pub fn set_parent(page: &mut [u8; PAGE_SIZE], parent: u32) {
    write_u32(page, PARENT_POINTER_OFFSET, parent);
}

/// Number of cells stored in a leaf node.
pub fn leaf_num_cells(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, LEAF_NODE_NUM_CELLS_OFFSET)
}

pub fn set_leaf_num_cells(page: &mut [u8; PAGE_SIZE], num_cells: u32) {
    write_u32(page, LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
}

/// Page number of the leaf's right sibling; 0 means this is the
/// rightmost leaf.
pub fn leaf_next_leaf(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET)
}

pub fn set_leaf_next_leaf(page: &mut [u8; PAGE_SIZE], next: u32) {
    write_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET, next);
}

fn leaf_cell_offset(cell_num: u32) -> DbResult<usize> {
    if cell_num as usize >= LEAF_NODE_MAX_CELLS {
        return Err(DbError::CellOutOfBounds(cell_num));
    }
    Ok(LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE)
}

/// The whole cell (key plus row image) at `cell_num`.
pub fn leaf_cell(page: &[u8; PAGE_SIZE], cell_num: u32) -> DbResult<&[u8]> {
    let offset = leaf_cell_offset(cell_num)?;
    Ok(&page[offset..offset + LEAF_NODE_CELL_SIZE])
}

pub fn leaf_cell_mut(page: &mut [u8; PAGE_SIZE], cell_num: u32) -> DbResult<&mut [u8]> {
    let offset = leaf_cell_offset(cell_num)?;
    Ok(&mut page[offset..offset + LEAF_NODE_CELL_SIZE])
}

/// Key of the cell at `cell_num`.
pub fn leaf_key(page: &[u8; PAGE_SIZE], cell_num: u32) -> DbResult<u32> {
    let offset = leaf_cell_offset(cell_num)?;
    Ok(read_u32(page, offset))
}

pub fn set_leaf_key(page: &mut [u8; PAGE_SIZE], cell_num: u32, key: u32) -> DbResult<()> {
    let offset = leaf_cell_offset(cell_num)?;
    write_u32(page, offset, key);
    Ok(())
}

/// The serialized row stored in the cell at `cell_num`.
pub fn leaf_value(page: &[u8; PAGE_SIZE], cell_num: u32) -> DbResult<&[u8]> {
    let offset = leaf_cell_offset(cell_num)? + LEAF_NODE_KEY_SIZE;
    Ok(&page[offset..offset + LEAF_NODE_VALUE_SIZE])
}

pub fn leaf_value_mut(page: &mut [u8; PAGE_SIZE], cell_num: u32) -> DbResult<&mut [u8]> {
    let offset = leaf_cell_offset(cell_num)? + LEAF_NODE_KEY_SIZE;
    Ok(&mut page[offset..offset + LEAF_NODE_VALUE_SIZE])
}

/// Move the cells at `cell_num..num_cells` one slot to the right, freeing
/// the slot at `cell_num` for a new cell.
pub fn leaf_shift_cells_right(
    page: &mut [u8; PAGE_SIZE],
    cell_num: u32,
    num_cells: u32,
) -> DbResult<()> {
    if num_cells as usize >= LEAF_NODE_MAX_CELLS {
        return Err(DbError::CellOutOfBounds(num_cells));
    }
    let start = leaf_cell_offset(cell_num)?;
    let end = LEAF_NODE_HEADER_SIZE + num_cells as usize * LEAF_NODE_CELL_SIZE;
    page.copy_within(start..end, start + LEAF_NODE_CELL_SIZE);
    Ok(())
}

/// Number of keys stored in an internal node.
pub fn internal_num_keys(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET)
}

pub fn set_internal_num_keys(page: &mut [u8; PAGE_SIZE], num_keys: u32) {
    write_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
}

/// The "+1" child: page number of the subtree holding keys greater than
/// every separator key.
pub fn internal_right_child(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
}

pub fn set_internal_right_child(page: &mut [u8; PAGE_SIZE], right_child: u32) {
    write_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET, right_child);
}

fn internal_cell_offset(cell_num: u32) -> DbResult<usize> {
    let offset = INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE;
    if offset + INTERNAL_NODE_CELL_SIZE > PAGE_SIZE {
        return Err(DbError::CellOutOfBounds(cell_num));
    }
    Ok(offset)
}

/// Child page number at `child_num`. An index equal to the key count
/// resolves to the right-child field.
pub fn internal_child(page: &[u8; PAGE_SIZE], child_num: u32) -> DbResult<u32> {
    let num_keys = internal_num_keys(page);
    if child_num > num_keys {
        return Err(DbError::CellOutOfBounds(child_num));
    }
    if child_num == num_keys {
        Ok(internal_right_child(page))
    } else {
        Ok(read_u32(page, internal_cell_offset(child_num)?))
    }
}

pub fn set_internal_child(
    page: &mut [u8; PAGE_SIZE],
    child_num: u32,
    child: u32,
) -> DbResult<()> {
    let num_keys = internal_num_keys(page);
    if child_num > num_keys {
        return Err(DbError::CellOutOfBounds(child_num));
    }
    if child_num == num_keys {
        set_internal_right_child(page, child);
    } else {
        let offset = internal_cell_offset(child_num)?;
        write_u32(page, offset, child);
    }
    Ok(())
}

/// Separator key at `key_num`.
pub fn internal_key(page: &[u8; PAGE_SIZE], key_num: u32) -> DbResult<u32> {
    let offset = internal_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
    Ok(read_u32(page, offset))
}

pub fn set_internal_key(page: &mut [u8; PAGE_SIZE], key_num: u32, key: u32) -> DbResult<()> {
    let offset = internal_cell_offset(key_num)? + INTERNAL_NODE_CHILD_SIZE;
    write_u32(page, offset, key);
    Ok(())
}

/// Move the cells at `index..num_keys` one slot to the right, freeing the
/// slot at `index` for a new (child, key) pair.
pub fn internal_shift_cells_right(
    page: &mut [u8; PAGE_SIZE],
    index: u32,
    num_keys: u32,
) -> DbResult<()> {
    let start = internal_cell_offset(index)?;
    let end = internal_cell_offset(num_keys)?;
    page.copy_within(start..end, start + INTERNAL_NODE_CELL_SIZE);
    Ok(())
}

/// The largest key stored in this node itself: the last cell's key for a
/// leaf, the last separator for an internal node. The true subtree
/// maximum of an internal node lives under its right child; see
/// `btree::node_max_key`.
pub fn node_max_key(page: &[u8; PAGE_SIZE]) -> DbResult<u32> {
    match get_node_type(page)? {
        NodeType::Leaf => {
            let last = leaf_num_cells(page)
                .checked_sub(1)
                .ok_or(DbError::CorruptPage("max key of an empty leaf"))?;
            leaf_key(page, last)
        }
        NodeType::Internal => {
            let last = internal_num_keys(page)
                .checked_sub(1)
                .ok_or(DbError::CorruptPage("max key of an empty internal node"))?;
            internal_key(page, last)
        }
    }
}

/// Stamp a page as an empty non-root leaf.
pub fn init_leaf_node(page: &mut [u8; PAGE_SIZE]) {
    set_node_type(page, NodeType::Leaf);
    set_is_root(page, false);
    set_leaf_num_cells(page, 0);
    set_leaf_next_leaf(page, 0); // 0 represents no sibling
}

/// Stamp a page as an empty non-root internal node.
pub fn init_internal_node(page: &mut [u8; PAGE_SIZE]) {
    set_node_type(page, NodeType::Internal);
    set_is_root(page, false);
    set_internal_num_keys(page, 0);
    set_internal_right_child(page, INVALID_PAGE_NUM);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::row::Row;

    #[test]
    fn layout_constants() {
        assert_eq!(COMMON_NODE_HEADER_SIZE, 6);
        assert_eq!(LEAF_NODE_HEADER_SIZE, 14);
        assert_eq!(LEAF_NODE_CELL_SIZE, 297);
        assert_eq!(LEAF_NODE_SPACE_FOR_CELLS, 4082);
        assert_eq!(LEAF_NODE_MAX_CELLS, 13);
        assert_eq!(LEAF_NODE_LEFT_SPLIT_COUNT, 7);
        assert_eq!(LEAF_NODE_RIGHT_SPLIT_COUNT, 7);
        assert_eq!(INTERNAL_NODE_HEADER_SIZE, 14);
        assert_eq!(INTERNAL_NODE_CELL_SIZE, 8);
    }

    #[test]
    fn init_leaf_sets_header() {
        let mut page = [0u8; PAGE_SIZE];
        init_leaf_node(&mut page);
        assert_eq!(get_node_type(&page).unwrap(), NodeType::Leaf);
        assert!(!get_is_root(&page));
        assert_eq!(leaf_num_cells(&page), 0);
        assert_eq!(leaf_next_leaf(&page), 0);
    }

    #[test]
    fn init_internal_sets_sentinel_right_child() {
        let mut page = [0u8; PAGE_SIZE];
        init_internal_node(&mut page);
        assert_eq!(get_node_type(&page).unwrap(), NodeType::Internal);
        assert!(!get_is_root(&page));
        assert_eq!(internal_num_keys(&page), 0);
        assert_eq!(internal_right_child(&page), INVALID_PAGE_NUM);
    }

    #[test]
    fn invalid_node_type_byte_is_rejected() {
        let mut page = [0u8; PAGE_SIZE];
        page[NODE_TYPE_OFFSET] = 7;
        assert!(matches!(
            get_node_type(&page),
            Err(DbError::InvalidNodeType(7))
        ));
    }

    #[test]
    fn leaf_cell_round_trip() {
        let mut page = [0u8; PAGE_SIZE];
        init_leaf_node(&mut page);

        let row = Row::new(7, "bob", "bob@example.com");
        set_leaf_key(&mut page, 0, 7).unwrap();
        row.serialize(leaf_value_mut(&mut page, 0).unwrap());

        assert_eq!(leaf_key(&page, 0).unwrap(), 7);
        assert_eq!(Row::deserialize(leaf_value(&page, 0).unwrap()), row);
    }

    #[test]
    fn leaf_cell_index_is_bounded() {
        let page = [0u8; PAGE_SIZE];
        assert!(leaf_key(&page, LEAF_NODE_MAX_CELLS as u32).is_err());
    }

    #[test]
    fn internal_child_index_at_num_keys_is_right_child() {
        let mut page = [0u8; PAGE_SIZE];
        init_internal_node(&mut page);
        set_internal_num_keys(&mut page, 1);
        set_internal_child(&mut page, 0, 2).unwrap();
        set_internal_key(&mut page, 0, 10).unwrap();
        set_internal_right_child(&mut page, 3);

        assert_eq!(internal_child(&page, 0).unwrap(), 2);
        assert_eq!(internal_child(&page, 1).unwrap(), 3);
        assert!(internal_child(&page, 2).is_err());
    }

    #[test]
    fn max_key_per_node_type() {
        let mut leaf = [0u8; PAGE_SIZE];
        init_leaf_node(&mut leaf);
        set_leaf_num_cells(&mut leaf, 2);
        set_leaf_key(&mut leaf, 0, 3).unwrap();
        set_leaf_key(&mut leaf, 1, 9).unwrap();
        assert_eq!(node_max_key(&leaf).unwrap(), 9);

        let mut internal = [0u8; PAGE_SIZE];
        init_internal_node(&mut internal);
        set_internal_num_keys(&mut internal, 2);
        set_internal_key(&mut internal, 0, 5).unwrap();
        set_internal_key(&mut internal, 1, 12).unwrap();
        assert_eq!(node_max_key(&internal).unwrap(), 12);
    }

    #[test]
    fn max_key_of_empty_leaf_is_an_error() {
        let mut page = [0u8; PAGE_SIZE];
        init_leaf_node(&mut page);
        assert!(node_max_key(&page).is_err());
    }
}
