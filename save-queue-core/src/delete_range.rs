// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

use crate::context::MemberId;
use crate::storage::Store;

/// Deletes entries in `[from, to]` from highest index downward. Deleting
/// forward would, for a moment, leave the top of the range gone while the
/// bottom is still present, which is a wider gap above `saved_index` than
/// before the delete started; deleting backward never widens it, so
/// `max_gap` never needs to be bumped mid-delete.
///
/// `to < 0` is the sentinel meaning "not yet known"; it is re-resolved as
/// `max(saved_index, storage.last_index)`.
///
/// Returns the number of entries actually deleted.
pub(crate) fn delete_range(
    store: &dyn Store,
    member_id: MemberId,
    saved_index: u64,
    from: u64,
    to: i64,
) -> anyhow::Result<u64> {
    let to = if to < 0 {
        let last_index = store.get_last(member_id)?.map(|e| e.index).unwrap_or(0);
        saved_index.max(last_index)
    } else {
        to as u64
    };

    if to < from {
        return Ok(0);
    }

    let mut deleted = 0u64;
    let mut index = to;
    loop {
        store.delete(member_id, index)?;
        deleted += 1;
        if index == from {
            break;
        }
        index -= 1;
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mem_store::MemStore;
    use bytes::Bytes;
    use rstest::rstest;

    fn seed(store: &MemStore, member: MemberId, indices: &[u64]) {
        for &i in indices {
            store.append(member, 1, i, Bytes::from_static(b"x")).unwrap();
        }
    }

    #[test]
    fn deletes_inclusive_range_highest_first() {
        let store = MemStore::new();
        let member = MemberId(1);
        seed(&store, member, &[1, 2, 3, 4, 5]);

        let deleted = delete_range(&store, member, 0, 3, 5).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.count(member).unwrap(), 2);
        assert!(store.get(member, 2).unwrap().is_some());
        assert!(store.get(member, 3).unwrap().is_none());
    }

    #[rstest]
    #[case::negative_to_resolves_from_storage(&[1, 2, 3][..], 0, 2, -1, 2, 1)]
    #[case::empty_range_deletes_nothing(&[1, 2][..], 0, 5, 3, 0, 2)]
    #[case::single_entry_range(&[1, 2, 3][..], 0, 3, 3, 1, 2)]
    fn delete_range_cases(
        #[case] seeded: &[u64],
        #[case] saved_index: u64,
        #[case] from: u64,
        #[case] to: i64,
        #[case] expected_deleted: u64,
        #[case] expected_remaining: u64,
    ) {
        let store = MemStore::new();
        let member = MemberId(1);
        seed(&store, member, seeded);

        let deleted = delete_range(&store, member, saved_index, from, to).unwrap();
        assert_eq!(deleted, expected_deleted);
        assert_eq!(store.count(member).unwrap(), expected_remaining);
    }
}
