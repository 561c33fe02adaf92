//! Catalogue of client message shapes.
//!
//! Each message type offers four escalating tests — `length_check`, `syntax_check`,
//! `logic_check`, `unique_check` — where each implies the previous. Checks take the raw
//! message buffer directly rather than threading values through a keyword-argument map.

use crate::framing::strip_partial_terminator;

type Predicate = fn(&[u8]) -> bool;

/// A client message's length bound and validation chain.
pub struct ClientMessageSpec {
    pub max_len: usize,
    syntax: Option<Predicate>,
    logic: Option<Predicate>,
    unique: Option<Predicate>,
}

impl ClientMessageSpec {
    pub fn length_check(&self, buf: &[u8]) -> bool {
        !buf.is_empty() && buf.len() <= self.max_len
    }

    pub fn syntax_check(&self, buf: &[u8]) -> bool {
        self.length_check(buf) && self.syntax.map_or(true, |check| check(buf))
    }

    pub fn logic_check(&self, buf: &[u8]) -> bool {
        self.syntax_check(buf) && self.logic.map_or(true, |check| check(buf))
    }

    pub fn unique_check(&self, buf: &[u8]) -> bool {
        self.logic_check(buf) && self.unique.map_or(true, |check| check(buf))
    }
}

fn is_signed_int(buf: &[u8]) -> bool {
    let body = buf.strip_prefix(b"-").unwrap_or(buf);
    !body.is_empty() && body.iter().all(u8::is_ascii_digit)
}

fn is_digits(buf: &[u8]) -> bool {
    !buf.is_empty() && buf.iter().all(u8::is_ascii_digit)
}

fn is_key_id_in_range(buf: &[u8]) -> bool {
    matches!(buf, b"0" | b"1" | b"2" | b"3" | b"4")
}

fn is_signed_int_1_to_4(buf: &[u8]) -> bool {
    let body = buf.strip_prefix(b"-").unwrap_or(buf);
    (1..=4).contains(&body.len()) && body.iter().all(u8::is_ascii_digit)
}

fn split_ok(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let rest = buf.strip_prefix(b"OK ")?;
    let space = rest.iter().position(|&b| b == b' ')?;
    Some((&rest[..space], &rest[space + 1..]))
}

fn is_ok_syntax(buf: &[u8]) -> bool {
    match split_ok(buf) {
        Some((x, y)) => is_signed_int_1_to_4(x) && is_signed_int_1_to_4(y),
        None => false,
    }
}

fn is_ok_center(buf: &[u8]) -> bool {
    buf == b"OK 0 0"
}

fn is_recharging(buf: &[u8]) -> bool {
    buf == b"RECHARGING"
}

fn is_full_power(buf: &[u8]) -> bool {
    buf == b"FULL POWER"
}

pub static CLIENT_USERNAME: ClientMessageSpec = ClientMessageSpec {
    max_len: 18,
    syntax: None,
    logic: None,
    unique: None,
};

pub static CLIENT_KEY_ID: ClientMessageSpec = ClientMessageSpec {
    max_len: 3,
    syntax: Some(is_signed_int),
    logic: Some(is_key_id_in_range),
    unique: None,
};

pub static CLIENT_CONFIRMATION: ClientMessageSpec = ClientMessageSpec {
    max_len: 5,
    syntax: Some(is_digits),
    logic: None,
    unique: None,
};

pub static CLIENT_OK: ClientMessageSpec = ClientMessageSpec {
    max_len: 10,
    syntax: Some(is_ok_syntax),
    logic: None,
    unique: Some(is_ok_center),
};

pub static CLIENT_MESSAGE: ClientMessageSpec = ClientMessageSpec {
    max_len: 98,
    syntax: None,
    logic: None,
    unique: None,
};

pub static CLIENT_RECHARGING: ClientMessageSpec = ClientMessageSpec {
    max_len: 10,
    syntax: Some(is_recharging),
    logic: None,
    unique: None,
};

pub static CLIENT_FULL_POWER: ClientMessageSpec = ClientMessageSpec {
    max_len: 10,
    syntax: Some(is_full_power),
    logic: None,
    unique: None,
};

/// Parses a validated `KEY_ID` message. Caller must have checked `logic_check` first.
pub fn parse_key_id(buf: &[u8]) -> i32 {
    std::str::from_utf8(buf)
        .expect("syntax_check validated ASCII digits")
        .parse()
        .expect("syntax_check validated an integer")
}

/// Parses a validated `CONFIRMATION` message. Caller must have checked `syntax_check` first.
pub fn parse_confirmation(buf: &[u8]) -> u32 {
    std::str::from_utf8(buf)
        .expect("syntax_check validated ASCII digits")
        .parse()
        .expect("syntax_check validated an integer")
}

/// Parses a validated `OK` message into its reported coordinates.
/// Caller must have checked `syntax_check` first.
pub fn parse_ok(buf: &[u8]) -> crate::core::Position {
    let (x, y) = split_ok(buf).expect("syntax_check validated the `OK x y` shape");
    let parse = |field: &[u8]| -> i32 {
        std::str::from_utf8(field)
            .expect("syntax_check validated ASCII digits")
            .parse()
            .expect("syntax_check validated an integer")
    };
    crate::core::Position::new(parse(x), parse(y))
}

/// Whether `buf` still has a terminator-free tail too long for any message this phase supports.
///
/// A trailing partial terminator is stripped first, so a terminator arriving split across two
/// reads is never mistaken for an overflow.
pub fn exceeded_max_length(buf: &[u8], supported: &[&ClientMessageSpec]) -> bool {
    let trimmed = strip_partial_terminator(buf);
    supported.iter().all(|spec| !spec.length_check(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_accepts_any_byte_up_to_18() {
        assert!(CLIENT_USERNAME.syntax_check(b"Oompa Loompa"));
        assert!(!CLIENT_USERNAME.syntax_check(b""));
        assert!(!CLIENT_USERNAME.syntax_check(b"this username is far too long"));
    }

    #[test]
    fn key_id_syntax_vs_logic() {
        assert!(CLIENT_KEY_ID.syntax_check(b"10"));
        assert!(!CLIENT_KEY_ID.logic_check(b"10"));
        assert!(CLIENT_KEY_ID.syntax_check(b"-1"));
        assert!(!CLIENT_KEY_ID.logic_check(b"-1"));
        assert!(CLIENT_KEY_ID.logic_check(b"0"));
        assert!(CLIENT_KEY_ID.logic_check(b"4"));
    }

    #[test]
    fn ok_unique_check_is_the_origin() {
        assert!(CLIENT_OK.syntax_check(b"OK 0 -1"));
        assert!(!CLIENT_OK.unique_check(b"OK 0 -1"));
        assert!(CLIENT_OK.unique_check(b"OK 0 0"));
        assert_eq!(parse_ok(b"OK -12 34"), crate::core::Position::new(-12, 34));
    }

    #[test]
    fn recharging_and_full_power_are_exact() {
        assert!(CLIENT_RECHARGING.syntax_check(b"RECHARGING"));
        assert!(!CLIENT_RECHARGING.syntax_check(b"RECHARGING NOW"));
        assert!(CLIENT_FULL_POWER.syntax_check(b"FULL POWER"));
    }

    #[test]
    fn exceeded_max_length_ignores_a_split_terminator_tail() {
        let supported = [&CLIENT_OK];
        // "OK 4 4 2124124 " is already too long for OK's 10-byte bound on its own.
        assert!(exceeded_max_length(b"OK 4 4 2124124 ", &supported));
        assert!(exceeded_max_length(b"OK 4 4 2124124 \x07", &supported));
    }
}
