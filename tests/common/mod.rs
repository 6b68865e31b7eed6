//! Wire encoders shared by the integration tests

#![allow(dead_code)]

pub const START: [u8; 4] = [0, 0, 0, 0x33];
pub const END: [u8; 4] = [0, 0, 0, 0x34];

pub enum Field {
    Single(u8, f32),
    Group(u8, [f32; 3]),
}

/// One radio frame; `end = false` leaves the end marker off.
pub fn radio_frame(timestamp_ms: u32, sequence_number: u32, fields: &[Field], end: bool) -> Vec<u8> {
    let mut out = START.to_vec();
    out.extend_from_slice(&timestamp_ms.to_be_bytes());
    out.extend_from_slice(&sequence_number.to_be_bytes());
    for field in fields {
        match field {
            Field::Single(id, value) => {
                out.push(*id);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Field::Group(id, values) => {
                out.push(*id);
                for value in values {
                    let mut chunk = value.to_le_bytes();
                    chunk.reverse();
                    out.extend_from_slice(&chunk);
                }
            }
        }
    }
    if end {
        out.extend_from_slice(&END);
    }
    out
}

/// A paged dump with the default layout: `abc` headers, 256-byte bodies, `EOF` page last.
pub fn flash_dump(records: &[(u8, [u8; 4])]) -> Vec<u8> {
    const BODY: usize = 256;
    let mut out = Vec::new();
    for page in records.chunks(BODY / 5) {
        out.extend_from_slice(b"abc");
        let mut body = Vec::with_capacity(BODY);
        for (id, value) in page {
            body.push(*id);
            body.extend_from_slice(value);
        }
        body.resize(BODY, 0xFF);
        out.extend_from_slice(&body);
    }
    out.extend_from_slice(b"EOF");
    out.extend(std::iter::repeat_n(0xFF, BODY));
    out
}

pub fn ts(id: u8, ms: u32) -> (u8, [u8; 4]) {
    (id, ms.to_le_bytes())
}

pub fn float(id: u8, value: f32) -> (u8, [u8; 4]) {
    (id, value.to_le_bytes())
}
