use log::debug;

use crate::config::{AddressMappingScheme, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedAddress {
    pub chan: u64,
    pub rank: u64,
    pub bank: u64,
    pub row: u64,
    pub col: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Chan,
    Rank,
    Bank,
    Row,
    Col,
}

// Field packing order from LSB to MSB, after the byte-offset and low column
// bits have been dropped. The scheme names follow the conventional MSB:..:LSB
// notation in the comments.
fn field_order(scheme: AddressMappingScheme) -> [Field; 5] {
    use AddressMappingScheme::*;
    use Field::*;
    match scheme {
        Scheme1 => [Bank, Col, Row, Rank, Chan], // chan:rank:row:col:bank
        Scheme2 => [Col, Bank, Row, Rank, Chan], // chan:rank:row:bank:col
        Scheme3 => [Row, Col, Bank, Rank, Chan], // chan:rank:bank:col:row
        Scheme4 => [Col, Row, Bank, Rank, Chan], // chan:rank:bank:row:col
        Scheme5 => [Rank, Bank, Col, Row, Chan], // chan:row:col:bank:rank
        Scheme6 => [Rank, Col, Bank, Row, Chan], // chan:row:bank:col:rank
        Scheme7 => [Chan, Bank, Rank, Col, Row], // row:col:rank:bank:chan
        Scheme8 => [Chan, Rank, Bank, Col, Row], // row:col:bank:rank:chan
    }
}

fn field_width(field: Field, p: &Params) -> u32 {
    match field {
        Field::Chan => p.chan_width,
        Field::Rank => p.rank_width,
        Field::Bank => p.bank_width,
        Field::Row => p.row_width,
        // the low column bits interleave bursts and are consumed with the
        // byte offset; only the high part is a scheduling coordinate
        Field::Col => p.col_width - p.col_low_width,
    }
}

fn mask(width: u32) -> u64 {
    if width == 0 {
        0
    } else {
        (1u64 << width) - 1
    }
}

// Pure address decomposition. Addresses outside the configured storage
// footprint leave stray high bits behind, which is a caller error surfaced
// by the channel bound check at the system boundary.
pub fn map_address(addr: u64, p: &Params) -> MappedAddress {
    let mut bits = addr >> (p.byte_offset_width + p.col_low_width);
    let mut mapped = MappedAddress {
        chan: 0,
        rank: 0,
        bank: 0,
        row: 0,
        col: 0,
    };
    for field in field_order(p.address_mapping_scheme) {
        let width = field_width(field, p);
        let value = bits & mask(width);
        bits >>= width;
        match field {
            Field::Chan => mapped.chan = value,
            Field::Rank => mapped.rank = value,
            Field::Bank => mapped.bank = value,
            Field::Row => mapped.row = value,
            Field::Col => mapped.col = value,
        }
    }
    if p.debug.addr_map {
        debug!(
            "0x{:x} -> chan {} rank {} bank {} row {} col {}",
            addr, mapped.chan, mapped.rank, mapped.bank, mapped.row, mapped.col
        );
    }
    mapped
}

// Inverse of map_address over the configured widths, with zero burst offset.
pub fn encode_address(mapped: MappedAddress, p: &Params) -> u64 {
    let mut addr = 0u64;
    for field in field_order(p.address_mapping_scheme).iter().rev() {
        let width = field_width(*field, p);
        let value = match field {
            Field::Chan => mapped.chan,
            Field::Rank => mapped.rank,
            Field::Bank => mapped.bank,
            Field::Row => mapped.row,
            Field::Col => mapped.col,
        };
        debug_assert_eq!(value & !mask(width), 0, "field value exceeds its width");
        addr = (addr << width) | value;
    }
    addr << (p.byte_offset_width + p.col_low_width)
}
