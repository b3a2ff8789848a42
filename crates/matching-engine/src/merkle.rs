use {
    model::order::OrderUid,
    sha2::{Digest, Sha256},
};

/// Binary SHA-256 merkle root over order uids, committing the round's order
/// set into the VRF input. An odd node at any level is promoted unchanged.
pub fn merkle_root(uids: &[OrderUid]) -> [u8; 32] {
    if uids.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<[u8; 32]> = uids
        .iter()
        .map(|uid| {
            let mut hasher = Sha256::new();
            hasher.update(b"phantompool/v1/merkle-leaf");
            hasher.update(uid.0.to_be_bytes());
            hasher.finalize().into()
        })
        .collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update(b"phantompool/v1/merkle-node");
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                }
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_deterministic_and_order_sensitive() {
        let a = merkle_root(&[OrderUid(1), OrderUid(2), OrderUid(3)]);
        let b = merkle_root(&[OrderUid(1), OrderUid(2), OrderUid(3)]);
        let c = merkle_root(&[OrderUid(3), OrderUid(2), OrderUid(1)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn handles_degenerate_sizes() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
        assert_ne!(merkle_root(&[OrderUid(1)]), [0u8; 32]);
        assert_ne!(merkle_root(&[OrderUid(1)]), merkle_root(&[OrderUid(2)]));
    }
}
