use super::*;
use proptest::prelude::*;

proptest! {
    // RAM is a plain byte array: last write wins, reads are stable.
    #[test]
    fn prop_ram_round_trip(off in 0..RAM_SIZE, val in any::<u8>()) {
        let mut bus = Bus::new();
        prop_assert!(bus.write_byte(RAM_BASE + off, val));
        prop_assert_eq!(bus.read_byte(RAM_BASE + off), Some(val));
        prop_assert_eq!(bus.read_byte(RAM_BASE + off), Some(val));
    }

    // Bulk writes and byte-wise reads agree.
    #[test]
    fn prop_bulk_write_matches_byte_reads(
        off in 0..(RAM_SIZE - 64),
        data in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut bus = Bus::new();
        prop_assert!(bus.write_bytes(RAM_BASE + off, &data));
        for (i, &b) in data.iter().enumerate() {
            prop_assert_eq!(bus.read_byte(RAM_BASE + off + i as u32), Some(b));
        }
    }

    // ROM contents are immutable under arbitrary write attempts.
    #[test]
    fn prop_rom_immutable(addr in ROM_BASE..ROM_BASE + ROM_SIZE, val in any::<u8>()) {
        let mut bus = Bus::new();
        let image: Vec<u8> = (0..256).map(|i| i as u8).collect();
        bus.load_rom(&image);

        let before = bus.read_byte(addr);
        prop_assert!(!bus.write_byte(addr, val));
        prop_assert_eq!(bus.read_byte(addr), before);
    }

    // Every mapped read is deterministic across an identically built bus.
    #[test]
    fn prop_fresh_buses_agree(addr in any::<u32>()) {
        let mut a = Bus::new();
        let mut b = Bus::new();
        a.load_rom(&[1, 2, 3, 4]);
        b.load_rom(&[1, 2, 3, 4]);
        prop_assert_eq!(a.read_byte(addr), b.read_byte(addr));
    }
}
