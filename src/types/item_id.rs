use crate::types::ITEM_ID_SIZE;

const LP_OFF_MASK: u32 = 0x7FFF;
const LP_FLAGS_SHIFT: u32 = 15;
const LP_FLAGS_MASK: u32 = 0x3;
const LP_LEN_SHIFT: u32 = 17;
const LP_LEN_MASK: u32 = 0x7FFF;

/// Two-bit state stored in every line pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LpState {
    /// Free for reuse. Length should be zero once the storage is reclaimed.
    #[default]
    Unused = 0,
    /// Live item with storage.
    Normal = 1,
    /// Position-reserving placeholder without storage.
    Redirect = 2,
    /// Marked for deletion, storage not yet reclaimed.
    Dead = 3,
}

impl LpState {
    pub fn from_u8(value: u8) -> Self {
        match value & LP_FLAGS_MASK as u8 {
            0 => LpState::Unused,
            1 => LpState::Normal,
            2 => LpState::Redirect,
            _ => LpState::Dead,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            LpState::Unused => 0,
            LpState::Normal => 1,
            LpState::Redirect => 2,
            LpState::Dead => 3,
        }
    }
}

/*
 * Line Pointer Layout (one little-endian u32)
 * ┌───────────────────────┬─────────┬───────────────────────┐
 * │ lp_len (bits 17..32)  │ flags   │ lp_off (bits 0..15)   │
 * │        15 bits        │ 2 bits  │        15 bits        │
 * └───────────────────────┴─────────┴───────────────────────┘
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemId {
    pub offset: u16, // Byte offset of the item from the start of the page
    pub state: LpState,
    pub length: u16, // Raw (unaligned) item length
}

impl ItemId {
    pub fn new(offset: u16, state: LpState, length: u16) -> Self {
        Self {
            offset,
            state,
            length,
        }
    }

    pub fn unused() -> Self {
        Self::default()
    }

    pub fn is_used(&self) -> bool {
        self.state != LpState::Unused
    }

    pub fn has_storage(&self) -> bool {
        self.length != 0
    }

    pub fn is_dead(&self) -> bool {
        self.state == LpState::Dead
    }

    /// Unused and deallocated, i.e. safe for `add_item` to hand out again.
    pub fn is_recyclable(&self) -> bool {
        !self.is_used() && self.length == 0
    }

    pub fn set_unused(&mut self) {
        *self = Self::unused();
    }

    pub fn to_u32(&self) -> u32 {
        (self.offset as u32 & LP_OFF_MASK)
            | ((self.state.as_u8() as u32 & LP_FLAGS_MASK) << LP_FLAGS_SHIFT)
            | ((self.length as u32 & LP_LEN_MASK) << LP_LEN_SHIFT)
    }

    pub fn from_u32(raw: u32) -> Self {
        Self {
            offset: (raw & LP_OFF_MASK) as u16,
            state: LpState::from_u8(((raw >> LP_FLAGS_SHIFT) & LP_FLAGS_MASK) as u8),
            length: ((raw >> LP_LEN_SHIFT) & LP_LEN_MASK) as u16,
        }
    }

    pub fn to_bytes(&self) -> [u8; ITEM_ID_SIZE] {
        self.to_u32().to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; ITEM_ID_SIZE]) -> Self {
        Self::from_u32(u32::from_le_bytes(bytes))
    }
}
