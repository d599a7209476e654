//! Block-witness stream helpers used by verification paths.
//!
//! A witness stream starts with a one-byte format version. Branch nodes are
//! carried as a two-byte child bitmap plus a value-slot flag, which together
//! form a 17-bit mask: bits 0..=15 mark occupied child slots, bit 16 marks an
//! embedded value.

use thiserror::Error;

/// The only witness format version this client understands.
pub const WITNESS_VERSION: u8 = 0x01;

/// All bits a branch mask may legally carry.
pub const BRANCH_MASK_RANGE: u32 = 0x1FFFF;

/// Violations of the witness stream format. Fatal for the whole witness.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WitnessError {
    #[error("Unsupported witness version {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("Witness stream truncated")]
    Truncated,
    #[error(transparent)]
    InvalidMask(#[from] BranchMaskError),
}

/// Parse failure for a single branch mask. The offending node is dropped,
/// the stream may continue.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum BranchMaskError {
    #[error("Branch mask {0:#x} has bits outside the 17-bit range")]
    OutOfRange(u32),
    #[error("Branch mask {0:#x} marks fewer than two occupied slots")]
    TooFewSlots(u32),
}

/// Checks the version byte and returns the remaining stream.
pub fn read_witness_header(data: &[u8]) -> Result<&[u8], WitnessError> {
    match data.first() {
        None => Err(WitnessError::Truncated),
        Some(&WITNESS_VERSION) => Ok(&data[1..]),
        Some(&version) => Err(WitnessError::UnsupportedVersion(version)),
    }
}

/// Validates the branch-mask invariant: at most 17 bits, at least two of them set.
pub fn check_branch_mask(mask: u32) -> Result<(), BranchMaskError> {
    if mask & !BRANCH_MASK_RANGE != 0 {
        return Err(BranchMaskError::OutOfRange(mask));
    }
    if mask.count_ones() < 2 {
        return Err(BranchMaskError::TooFewSlots(mask));
    }
    Ok(())
}

/// Builds a branch mask from its wire form: the big-endian child bitmap pair
/// and the value-slot flag.
pub fn construct_branch_mask(pair: [u8; 2], has_value: bool) -> Result<u32, BranchMaskError> {
    let mask = u32::from(pair[0]) << 8 | u32::from(pair[1]) | (u32::from(has_value) << 16);
    check_branch_mask(mask)?;
    Ok(mask)
}

/// Serializes a branch mask into its wire form.
///
/// Only reachable with masks built by this client, so an invalid mask here is
/// an invariant breakage rather than a parse failure and aborts the process.
pub fn encode_branch_mask(mask: u32) -> ([u8; 2], bool) {
    if let Err(err) = check_branch_mask(mask) {
        panic!("defect: encoding invalid branch mask: {err}");
    }
    ([(mask >> 8) as u8, mask as u8], mask & 0x10000 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn witness_header() {
        assert_eq!(read_witness_header(&[0x01, 0xaa]).unwrap(), &[0xaa]);
        assert_eq!(
            read_witness_header(&[0x02]),
            Err(WitnessError::UnsupportedVersion(0x02))
        );
        assert_eq!(read_witness_header(&[]), Err(WitnessError::Truncated));
    }

    #[test]
    fn branch_mask_round_trip() {
        // Every legal mask shape: low pair only, value bit involved, full mask.
        for mask in [0b11u32, 0b101000, 0xffff, 0x10001, 0x1ffff, 0x18000] {
            let (pair, has_value) = encode_branch_mask(mask);
            assert_eq!(construct_branch_mask(pair, has_value).unwrap(), mask);
        }
    }

    #[test]
    fn branch_mask_rejects_single_slot() {
        for mask in [0u32, 0b1, 0b1000, 0x10000] {
            assert!(matches!(
                check_branch_mask(mask),
                Err(BranchMaskError::TooFewSlots(_))
            ));
        }
    }

    #[test]
    fn branch_mask_rejects_out_of_range_bits() {
        assert!(matches!(
            check_branch_mask(0x20003),
            Err(BranchMaskError::OutOfRange(_))
        ));
        assert!(matches!(
            check_branch_mask(0x8002_0003),
            Err(BranchMaskError::OutOfRange(_))
        ));
    }

    #[test]
    #[should_panic(expected = "defect")]
    fn encoding_invalid_mask_is_a_defect() {
        encode_branch_mask(0b1);
    }
}
