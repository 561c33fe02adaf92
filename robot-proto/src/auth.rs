//! The shared-secret hash exchange used to authenticate a robot.

/// Per-key additive secret the server adds to the username hash.
pub const SERVER_KEYS: [u32; 5] = [23019, 32037, 18789, 16443, 18189];

/// Per-key additive secret the client is expected to add to the username hash.
pub const CLIENT_KEYS: [u32; 5] = [32037, 29295, 13603, 29533, 21952];

/// `(sum of byte values in `username`) * 1000 mod 65536`. Bytes are treated as code points,
/// not decoded as UTF-8, matching the wire format's single-byte-per-character assumption.
pub fn username_hash(username: &[u8]) -> u32 {
    let sum: u32 = username.iter().map(|&byte| byte as u32).sum();
    (sum * 1000) % 65536
}

pub fn server_hash(username_hash: u32, key_id: usize) -> u32 {
    (username_hash + SERVER_KEYS[key_id]) % 65536
}

pub fn client_hash(username_hash: u32, key_id: usize) -> u32 {
    (username_hash + CLIENT_KEYS[key_id]) % 65536
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_hash_matches_reference_scenario() {
        // "Oompa Loompa", key_id 0: server confirmation is `64907`, client hash is `8389`.
        let hash = username_hash(b"Oompa Loompa");
        assert_eq!(server_hash(hash, 0), 64907);
        assert_eq!(client_hash(hash, 0), 8389);
    }
}
