// 候选去重
// 按 (username, hostname, port) 分组，优先保留 ed25519 来源，其余情况保留先出现的

use std::collections::HashMap;

use crate::constants::discovery::PREFERRED_KEY_TYPE;
use crate::models::{DiscoveryCandidate, IdentityKey};

fn has_preferred_key(candidate: &DiscoveryCandidate) -> bool {
    candidate.key_type.as_deref() == Some(PREFERRED_KEY_TYPE)
}

/// 合并候选，输出保持首次出现的顺序
pub fn merge_candidates(candidates: Vec<DiscoveryCandidate>) -> Vec<DiscoveryCandidate> {
    let mut index: HashMap<IdentityKey, usize> = HashMap::new();
    let mut merged: Vec<DiscoveryCandidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match index.get(&candidate.identity()).copied() {
            Some(slot) => {
                let existing: &mut DiscoveryCandidate = &mut merged[slot];
                if has_preferred_key(&candidate) && !has_preferred_key(existing) {
                    *existing = candidate;
                }
            }
            None => {
                index.insert(candidate.identity(), merged.len());
                merged.push(candidate);
            }
        }
    }
    merged
}
