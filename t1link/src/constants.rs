// t1link/src/constants.rs
//! Common protocol constants used across the crate

/// Node address byte carried in every block prologue. ISO 7816-3 allows
/// addressed multi-node links but every reader this crate targets uses the
/// null address on both sides.
pub const NAD: u8 = 0x00;

/// Prologue length in bytes: NAD + PCB + LEN
pub const PROLOGUE_LEN: usize = 3;

/// Maximum information field length per block. LEN 255 is reserved by the
/// standard and rejected everywhere.
pub const MAX_INF_LEN: usize = 254;

/// The Answer To Reset maximum length per ISO 7816-3
pub const ATR_MAX_LEN: usize = 33;

/// Interface byte slots tracked per protocol class (3 groups of TA/TB/TC)
pub const ATR_MAX_IB: usize = 9;

/// ATR TS byte: direct convention
pub const TS_DIRECT: u8 = 0x3B;
/// ATR TS byte: inverse convention
pub const TS_INVERSE: u8 = 0x3F;

/// PPS exchange initial byte (PPSS)
pub const PPSS: u8 = 0xFF;

/// Delivery attempts for one block before escalating to resynchronization
pub const MAX_BLOCK_ATTEMPTS: u8 = 10;
/// Resynchronization attempts before declaring the link dead
pub const MAX_RESYNC_ATTEMPTS: u8 = 3;
/// Attempts for a single transport-level write before OutputFailure
pub const MAX_WRITE_ATTEMPTS: u8 = 2;

/// CCID bulk message header length
pub const CCID_HEADER_LEN: usize = 10;

/// CCID PC_to_RDR message codes (USB-IF CCID specification v1.1)
pub const CCID_PC_TO_RDR_ICC_POWER_ON: u8 = 0x62;
/// PC_to_RDR_IccPowerOff
pub const CCID_PC_TO_RDR_ICC_POWER_OFF: u8 = 0x63;
/// PC_to_RDR_GetSlotStatus
pub const CCID_PC_TO_RDR_GET_SLOT_STATUS: u8 = 0x65;
/// PC_to_RDR_XfrBlock
pub const CCID_PC_TO_RDR_XFR_BLOCK: u8 = 0x6F;
/// PC_to_RDR_GetParameters
pub const CCID_PC_TO_RDR_GET_PARAMETERS: u8 = 0x6C;
/// PC_to_RDR_SetParameters
pub const CCID_PC_TO_RDR_SET_PARAMETERS: u8 = 0x61;

/// RDR_to_PC_DataBlock
pub const CCID_RDR_TO_PC_DATA_BLOCK: u8 = 0x80;
/// RDR_to_PC_SlotStatus
pub const CCID_RDR_TO_PC_SLOT_STATUS: u8 = 0x81;
/// RDR_to_PC_Parameters
pub const CCID_RDR_TO_PC_PARAMETERS: u8 = 0x82;

/// CCID dwFeatures bit: reader performs PPS negotiation automatically
pub const CCID_FEATURE_AUTO_PPS: u32 = 0x0000_0080;
