// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};

use anyhow::bail;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::context::MemberId;
use crate::entry::Entry;
use crate::storage::Store;

#[derive(Default)]
struct MemberState {
    entries: BTreeMap<u64, Entry>,
    max_gap: u32,
    owner_pid: Option<String>,
    owner_address: Option<String>,
}

/// In-memory `Store` used by tests and by simulated crash/restart
/// scenarios that reuse the same backing map across save queue
/// instances.
#[derive(Default)]
pub struct MemStore {
    members: Mutex<HashMap<MemberId, MemberState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn get_last(&self, member_id: MemberId) -> anyhow::Result<Option<Entry>> {
        let members = self.members.lock();
        Ok(members
            .get(&member_id)
            .and_then(|m| m.entries.values().next_back().cloned()))
    }

    fn get(&self, member_id: MemberId, index: u64) -> anyhow::Result<Option<Entry>> {
        let members = self.members.lock();
        Ok(members
            .get(&member_id)
            .and_then(|m| m.entries.get(&index).cloned()))
    }

    fn append(
        &self,
        member_id: MemberId,
        term: u64,
        index: u64,
        payload: Bytes,
    ) -> anyhow::Result<()> {
        let mut members = self.members.lock();
        let state = members.entry(member_id).or_default();
        if state.entries.contains_key(&index) {
            bail!("index {index} is already occupied for member {member_id}");
        }
        state.entries.insert(
            index,
            Entry {
                term,
                index,
                payload,
            },
        );
        Ok(())
    }

    fn delete(&self, member_id: MemberId, index: u64) -> anyhow::Result<()> {
        let mut members = self.members.lock();
        if let Some(state) = members.get_mut(&member_id) {
            state.entries.remove(&index);
        }
        Ok(())
    }

    fn count(&self, member_id: MemberId) -> anyhow::Result<u64> {
        let members = self.members.lock();
        Ok(members
            .get(&member_id)
            .map(|m| m.entries.len() as u64)
            .unwrap_or(0))
    }

    fn get_max_gap(&self, member_id: MemberId) -> anyhow::Result<u32> {
        let members = self.members.lock();
        Ok(members.get(&member_id).map(|m| m.max_gap).unwrap_or(0))
    }

    fn set_max_gap(&self, member_id: MemberId, max_gap: u32) -> anyhow::Result<()> {
        let mut members = self.members.lock();
        members.entry(member_id).or_default().max_gap = max_gap;
        Ok(())
    }

    fn get_owner_pid(&self, member_id: MemberId) -> anyhow::Result<Option<String>> {
        let members = self.members.lock();
        Ok(members.get(&member_id).and_then(|m| m.owner_pid.clone()))
    }

    fn set_owner_pid(&self, member_id: MemberId, pid: &str) -> anyhow::Result<()> {
        let mut members = self.members.lock();
        members.entry(member_id).or_default().owner_pid = Some(pid.to_string());
        Ok(())
    }

    fn get_owner_address(&self, member_id: MemberId) -> anyhow::Result<Option<String>> {
        let members = self.members.lock();
        Ok(members
            .get(&member_id)
            .and_then(|m| m.owner_address.clone()))
    }

    fn set_owner_address(&self, member_id: MemberId, address: &str) -> anyhow::Result<()> {
        let mut members = self.members.lock();
        members.entry(member_id).or_default().owner_address = Some(address.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_rejects_duplicate_index() {
        let store = MemStore::new();
        let member = MemberId(1);
        store.append(member, 1, 1, Bytes::from_static(b"a")).unwrap();
        assert!(store.append(member, 1, 1, Bytes::from_static(b"b")).is_err());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemStore::new();
        let member = MemberId(1);
        store.delete(member, 5).unwrap();
        store.append(member, 1, 5, Bytes::from_static(b"a")).unwrap();
        store.delete(member, 5).unwrap();
        store.delete(member, 5).unwrap();
        assert_eq!(store.count(member).unwrap(), 0);
    }

    #[test]
    fn max_gap_and_owner_slots_round_trip() {
        let store = MemStore::new();
        let member = MemberId(7);
        assert_eq!(store.get_max_gap(member).unwrap(), 0);
        store.set_max_gap(member, 30).unwrap();
        assert_eq!(store.get_max_gap(member).unwrap(), 30);

        assert_eq!(store.get_owner_pid(member).unwrap(), None);
        store.set_owner_pid(member, "pid-1").unwrap();
        assert_eq!(store.get_owner_pid(member).unwrap().as_deref(), Some("pid-1"));

        store.set_owner_address(member, "10.0.0.1:9000").unwrap();
        assert_eq!(
            store.get_owner_address(member).unwrap().as_deref(),
            Some("10.0.0.1:9000")
        );
    }
}
