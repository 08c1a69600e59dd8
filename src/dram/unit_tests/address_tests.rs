use std::collections::HashSet;

use crate::config::AddressMappingScheme;
use crate::dram::address::{encode_address, map_address, MappedAddress};

use super::small_params;

#[test]
fn mapping_is_bijective_for_every_scheme() {
    let schemes = [
        AddressMappingScheme::Scheme1,
        AddressMappingScheme::Scheme2,
        AddressMappingScheme::Scheme3,
        AddressMappingScheme::Scheme4,
        AddressMappingScheme::Scheme5,
        AddressMappingScheme::Scheme6,
        AddressMappingScheme::Scheme7,
        AddressMappingScheme::Scheme8,
    ];
    for scheme in schemes {
        let p = small_params(|d, s| {
            d.num_rows = 8;
            d.num_cols = 16;
            d.num_banks = 4;
            s.num_chans = 2;
            s.num_ranks = 2;
            s.address_mapping_scheme = scheme;
        });
        let mut seen = HashSet::new();
        for chan in 0..2 {
            for rank in 0..2 {
                for bank in 0..4 {
                    for row in 0..8 {
                        for col in 0..2 {
                            let mapped = MappedAddress {
                                chan,
                                rank,
                                bank,
                                row,
                                col,
                            };
                            let addr = encode_address(mapped, &p);
                            assert_eq!(map_address(addr, &p), mapped, "{:?}", scheme);
                            assert!(seen.insert(addr), "{:?} reuses 0x{:x}", scheme, addr);
                        }
                    }
                }
            }
        }
        assert_eq!(seen.len(), 256);
    }
}

#[test]
fn burst_offset_bits_are_ignored() {
    let p = small_params(|_, _| {});
    // 64-byte transactions: the low 6 bits never reach the mapping
    let addr = 0x1240;
    assert_eq!(map_address(addr, &p), map_address(addr | 0x3f, &p));
}

#[test]
fn scheme2_field_layout() {
    let p = small_params(|_, _| {});
    assert_eq!(map_address(1 << 6, &p).col, 1);
    assert_eq!(map_address(1 << 9, &p).bank, 1);
    assert_eq!(map_address(1 << 11, &p).row, 1);
    assert_eq!(map_address(1 << 15, &p).rank, 1);
}
