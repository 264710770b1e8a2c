//! CID and CSD register decoding
//!
//! Both registers arrive as 136-bit long responses. The core strips the
//! start, transmission and reserved bits, so response word 0 holds register
//! bits [127:96] and word 3 holds bits [31:0].

/// Extract `width` bits of a 128-bit register starting at bit `lsb`
const fn bits(r: &[u32; 4], lsb: u32, width: u32) -> u32 {
    let raw = ((r[0] as u128) << 96) | ((r[1] as u128) << 64) | ((r[2] as u128) << 32) | (r[3] as u128);
    ((raw >> lsb) & ((1u128 << width) - 1)) as u32
}

/// Card Identification register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cid {
    /// Manufacturer ID
    pub manufacturer_id: u8,
    /// OEM / application ID (two ASCII characters)
    pub oem_id: [u8; 2],
    /// Product name (five ASCII characters)
    pub product_name: [u8; 5],
    /// Product revision, BCD major.minor
    pub revision: u8,
    /// Product serial number
    pub serial: u32,
    /// Manufacturing year
    pub year: u16,
    /// Manufacturing month (1-12)
    pub month: u8,
}

impl Cid {
    /// Decode a CID from a long response
    pub const fn from_response(r: &[u32; 4]) -> Self {
        Self {
            manufacturer_id: bits(r, 120, 8) as u8,
            oem_id: [bits(r, 112, 8) as u8, bits(r, 104, 8) as u8],
            product_name: [
                bits(r, 96, 8) as u8,
                bits(r, 88, 8) as u8,
                bits(r, 80, 8) as u8,
                bits(r, 72, 8) as u8,
                bits(r, 64, 8) as u8,
            ],
            revision: bits(r, 56, 8) as u8,
            serial: bits(r, 24, 32),
            year: 2000 + bits(r, 12, 8) as u16,
            month: bits(r, 8, 4) as u8,
        }
    }

    /// Product name as text, `"?????"` if not ASCII
    pub fn name(&self) -> &str {
        match core::str::from_utf8(&self.product_name) {
            Ok(s) if self.product_name.is_ascii() => s,
            _ => "?????",
        }
    }

    /// OEM ID as text
    pub fn oem(&self) -> &str {
        match core::str::from_utf8(&self.oem_id) {
            Ok(s) if self.oem_id.is_ascii() => s,
            _ => "??",
        }
    }

    /// Product revision as (major, minor)
    pub const fn revision(&self) -> (u8, u8) {
        (self.revision >> 4, self.revision & 0xF)
    }
}

/// CSD structure version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsdVersion {
    /// Standard capacity (byte addressed)
    V1,
    /// High / extended capacity (block addressed)
    V2,
    /// Reserved structure value
    Unknown(u8),
}

/// Card Specific Data register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csd {
    /// Structure version
    pub version: CsdVersion,
    /// TRAN_SPEED code
    pub tran_speed: u8,
    /// READ_BL_LEN (log2 of the maximum read block length)
    pub read_bl_len: u8,
    /// C_SIZE field
    pub c_size: u32,
    /// C_SIZE_MULT field (v1 only)
    pub c_size_mult: u8,
}

/// TRAN_SPEED time values, times ten
const TRAN_SPEED_VALUES: [u32; 16] = [0, 10, 12, 13, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 70, 80];

impl Csd {
    /// Decode a CSD from a long response
    pub const fn from_response(r: &[u32; 4]) -> Self {
        let structure = bits(r, 126, 2) as u8;
        let version = match structure {
            0 => CsdVersion::V1,
            1 => CsdVersion::V2,
            other => CsdVersion::Unknown(other),
        };

        // C_SIZE is 12 bits at [73:62] in v1, 22 bits at [69:48] in v2
        let (c_size, c_size_mult) = match version {
            CsdVersion::V1 => (bits(r, 62, 12), bits(r, 47, 3) as u8),
            _ => (bits(r, 48, 22), 0),
        };

        Self {
            version,
            tran_speed: bits(r, 96, 8) as u8,
            read_bl_len: bits(r, 80, 4) as u8,
            c_size,
            c_size_mult,
        }
    }

    /// Capacity in 512-byte blocks
    pub const fn num_blocks(&self) -> u64 {
        match self.version {
            CsdVersion::V1 => {
                let blocks = (self.c_size as u64 + 1) << (self.c_size_mult + 2);
                (blocks << self.read_bl_len) >> 9
            }
            CsdVersion::V2 => (self.c_size as u64 + 1) * 1024,
            CsdVersion::Unknown(_) => 0,
        }
    }

    /// Capacity in bytes
    pub const fn capacity_bytes(&self) -> u64 {
        self.num_blocks() * 512
    }

    /// Maximum read block length in bytes
    pub const fn max_read_block_len(&self) -> u32 {
        1 << self.read_bl_len
    }

    /// Maximum bus transfer rate in kbit/s
    pub const fn max_transfer_rate_kbps(&self) -> u32 {
        let unit = (self.tran_speed & 0x7) as u32;
        let value = TRAN_SPEED_VALUES[((self.tran_speed >> 3) & 0xF) as usize];
        // unit 0 is 100 kbit/s
        if unit > 3 {
            return 0;
        }
        value * 10 * 10u32.pow(unit)
    }
}
