//! Binary Merkle tree over audit entry hashes.
//!
//! Domain separation follows the Certificate Transparency convention:
//! `LeafNode(bytes) = SHA256(0x00 || bytes)` and
//! `Node(left, right) = SHA256(0x01 || left || right)`, so a leaf can never
//! be confused with an interior node.
//!
//! Odd-level policy is **duplicate-last-and-hash**: when a level has an odd
//! number of nodes, the unpaired node is hashed against a copy of itself.
//! This is a pinned, tested contract — the duplicate-last vs. carry-upward
//! choice is a classic source of cross-implementation incompatibility, so it
//! must never be left to a library default.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use agritrail_contracts::error::{TrailError, TrailResult};

/// Which side of the pair the sibling sits on when re-hashing upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// One step of an authentication path: the sibling hash and its side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Hex-encoded sibling node hash.
    pub sibling: String,

    /// The sibling's position relative to the node being proven.
    pub side: Side,
}

/// Compute a leaf node hash: SHA256(0x00 || bytes).
fn leaf_node(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Compute an interior node hash: SHA256(0x01 || left || right).
fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// A fully materialized Merkle tree: every level kept, leaves first.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree over hex-encoded leaf values (entry `current_hash`es).
    ///
    /// Returns `Integrity` for an empty leaf set or a leaf that is not valid
    /// hex — both indicate the caller selected a malformed batch.
    pub fn from_leaf_hex<S: AsRef<str>>(leaves: &[S]) -> TrailResult<Self> {
        if leaves.is_empty() {
            return Err(TrailError::Integrity {
                reason: "cannot build a Merkle tree over zero leaves".to_string(),
            });
        }

        let mut current: Vec<[u8; 32]> = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let bytes = hex::decode(leaf.as_ref()).map_err(|e| TrailError::Integrity {
                reason: format!("leaf is not valid hex: {e}"),
            })?;
            current.push(leaf_node(&bytes));
        }

        let mut levels = vec![current.clone()];
        while current.len() > 1 {
            let mut next: Vec<[u8; 32]> = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                if i + 1 < current.len() {
                    next.push(node_hash(&current[i], &current[i + 1]));
                } else {
                    // Duplicate-last: pair the dangler with itself.
                    next.push(node_hash(&current[i], &current[i]));
                }
                i += 2;
            }
            levels.push(next.clone());
            current = next;
        }

        Ok(Self { levels })
    }

    /// Number of leaves the tree commits to.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    /// The root, hex-encoded.
    pub fn root_hex(&self) -> String {
        self.levels
            .last()
            .and_then(|l| l.first())
            .map(hex::encode)
            .unwrap_or_default()
    }

    /// The authentication path for the leaf at `index`, ordered leaf-to-root.
    ///
    /// With the duplicate-last policy every level contributes exactly one
    /// sibling: an unpaired node's sibling is itself.
    pub fn path(&self, index: usize) -> TrailResult<Vec<PathStep>> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(TrailError::NotFound {
                kind: "merkle leaf",
                id: format!("index {index} of {leaf_count}"),
            });
        }

        let mut steps = Vec::new();
        let mut idx = index;
        for level in &self.levels {
            if level.len() <= 1 {
                break;
            }

            if idx % 2 == 0 {
                // Right sibling, or the node itself when unpaired.
                let sibling = if idx + 1 < level.len() {
                    level[idx + 1]
                } else {
                    level[idx]
                };
                steps.push(PathStep {
                    sibling: hex::encode(sibling),
                    side: Side::Right,
                });
            } else {
                steps.push(PathStep {
                    sibling: hex::encode(level[idx - 1]),
                    side: Side::Left,
                });
            }

            idx /= 2;
        }

        Ok(steps)
    }
}

/// Re-hash `leaf_hex` up `path` and compare against `root_hex`.
///
/// Malformed hex anywhere simply fails verification — an inclusion check
/// answers "does this prove inclusion", never panics or errors.
pub fn verify_path(leaf_hex: &str, path: &[PathStep], root_hex: &str) -> bool {
    let Ok(leaf_bytes) = hex::decode(leaf_hex) else {
        return false;
    };
    let mut current = leaf_node(&leaf_bytes);

    for step in path {
        let Ok(sibling_bytes) = hex::decode(&step.sibling) else {
            return false;
        };
        let sibling: [u8; 32] = match sibling_bytes.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        current = match step.side {
            Side::Right => node_hash(&current, &sibling),
            Side::Left => node_hash(&sibling, &current),
        };
    }

    hex::encode(current) == root_hex
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::{leaf_node, node_hash, verify_path, MerkleTree, Side};

    fn leaves(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[0] = i as u8;
                hex::encode(bytes)
            })
            .collect()
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn empty_leaf_set_is_rejected() {
        let empty: Vec<String> = vec![];
        assert!(MerkleTree::from_leaf_hex(&empty).is_err());
    }

    #[test]
    fn single_leaf_root_is_leaf_node() {
        let leaves = leaves(1);
        let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();

        let expected = leaf_node(&hex::decode(&leaves[0]).unwrap());
        assert_eq!(tree.root_hex(), hex::encode(expected));
        assert!(tree.path(0).unwrap().is_empty());
    }

    #[test]
    fn two_leaf_root_pairs_left_right() {
        let leaves = leaves(2);
        let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();

        let l = leaf_node(&hex::decode(&leaves[0]).unwrap());
        let r = leaf_node(&hex::decode(&leaves[1]).unwrap());
        assert_eq!(tree.root_hex(), hex::encode(node_hash(&l, &r)));
    }

    /// The pinned odd-level contract: with three leaves the dangling third
    /// leaf is hashed against a copy of itself, NOT carried upward.
    #[test]
    fn duplicate_last_policy_is_pinned() {
        let leaves = leaves(3);
        let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();

        let a = leaf_node(&hex::decode(&leaves[0]).unwrap());
        let b = leaf_node(&hex::decode(&leaves[1]).unwrap());
        let c = leaf_node(&hex::decode(&leaves[2]).unwrap());

        let ab = node_hash(&a, &b);
        let cc = node_hash(&c, &c); // duplicate-last
        let expected_root = node_hash(&ab, &cc);

        assert_eq!(tree.root_hex(), hex::encode(expected_root));

        // A carry-upward implementation would produce node_hash(ab, c).
        let carry_root = node_hash(&ab, &c);
        assert_ne!(tree.root_hex(), hex::encode(carry_root));
    }

    // ── Inclusion proofs ──────────────────────────────────────────────────────

    /// Every leaf must verify against the tree's own root, across a range of
    /// tree sizes including odd ones.
    #[test]
    fn every_leaf_verifies_against_root() {
        for n in 1..=17usize {
            let leaves = leaves(n);
            let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();
            let root = tree.root_hex();

            for (idx, leaf) in leaves.iter().enumerate() {
                let path = tree.path(idx).unwrap();
                assert!(verify_path(leaf, &path, &root), "n={n} idx={idx}");
            }
        }
    }

    /// Altering any single sibling in the path must fail verification.
    #[test]
    fn tampered_sibling_fails_verification() {
        let leaves = leaves(8);
        let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();
        let root = tree.root_hex();

        for step_idx in 0..3 {
            let mut path = tree.path(5).unwrap();
            path[step_idx].sibling = hex::encode([0xFFu8; 32]);
            assert!(
                !verify_path(&leaves[5], &path, &root),
                "tampered step {step_idx} still verified"
            );
        }
    }

    #[test]
    fn wrong_leaf_fails_verification() {
        let leaves = leaves(6);
        let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();
        let path = tree.path(2).unwrap();

        assert!(!verify_path(&leaves[3], &path, &tree.root_hex()));
    }

    #[test]
    fn path_index_out_of_range() {
        let leaves = leaves(4);
        let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();
        assert!(tree.path(4).is_err());
    }

    /// The duplicated dangler's path step points at itself on the right.
    #[test]
    fn dangling_leaf_sibling_is_itself() {
        let leaves = leaves(3);
        let tree = MerkleTree::from_leaf_hex(&leaves).unwrap();

        let path = tree.path(2).unwrap();
        let c = leaf_node(&hex::decode(&leaves[2]).unwrap());
        assert_eq!(path[0].sibling, hex::encode(c));
        assert_eq!(path[0].side, Side::Right);

        assert!(verify_path(&leaves[2], &path, &tree.root_hex()));
    }
}
