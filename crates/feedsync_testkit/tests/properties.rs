//! Property tests for merge, winner picking, purge and the wire form.

use feedsync_protocol::{merge, pick_winner, wire, MergeOperation};
use feedsync_storage::Repository;
use feedsync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn merging_an_item_with_itself_is_noop(item in item_strategy()) {
        let result = merge(Some(&item), &item.clone()).expect("merge failed");
        prop_assert_eq!(result.operation, MergeOperation::None);
        prop_assert!(result.proposed.is_none());
    }

    #[test]
    fn merging_into_nothing_adds(item in item_strategy()) {
        let result = merge(None, &item).expect("merge failed");
        prop_assert_eq!(result.operation, MergeOperation::Added);
        prop_assert_eq!(result.proposed, Some(item));
    }

    #[test]
    fn winner_picking_is_commutative((left, right) in divergent_strategy()) {
        prop_assert_eq!(pick_winner(&left, &right), pick_winner(&right, &left));
    }

    #[test]
    fn transitions_add_exactly_one_update(
        sync in sync_strategy(),
        (by, when) in stamp_strategy(),
    ) {
        let updated = sync.update(by.as_deref(), when).expect("update failed");
        prop_assert_eq!(updated.updates(), sync.updates() + 1);
        prop_assert_eq!(updated.deleted(), sync.deleted());

        let deleted = sync.delete(by.as_deref(), when).expect("delete failed");
        prop_assert_eq!(deleted.updates(), sync.updates() + 1);
        prop_assert!(deleted.deleted());
    }

    #[test]
    fn sparse_purge_is_safe(sync in sync_strategy()) {
        let purged = sync.sparse_purge();

        let mut authors = HashSet::new();
        for entry in purged.history() {
            if let Some(by) = entry.by() {
                prop_assert!(authors.insert(by.to_string()), "duplicate author {}", by);
            }
        }

        let anonymous = |s: &feedsync_protocol::SyncMetadata| {
            s.history().iter().filter(|h| h.by().is_none()).count()
        };
        prop_assert_eq!(anonymous(&purged), anonymous(&sync));
        prop_assert_eq!(purged.last_update(), sync.last_update());
        prop_assert_eq!(&purged, &sync);
    }

    #[test]
    fn wire_roundtrip_preserves_sync((left, right) in divergent_strategy()) {
        let merged = merge(Some(&left), &right)
            .expect("merge failed")
            .proposed
            .unwrap_or(left);
        let bytes = wire::encode_sync(merged.sync()).expect("encode failed");
        let decoded = wire::decode_sync(&bytes).expect("decode failed");

        prop_assert_eq!(&decoded, merged.sync());
        prop_assert_eq!(decoded.history(), merged.sync().history());
        prop_assert_eq!(decoded.conflicts().len(), merged.sync().conflicts().len());
    }

    #[test]
    fn bidirectional_round_converges((left, right) in replica_divergent_strategy()) {
        let pair = ReplicaPair::new();
        let id = left.id().to_string();
        pair.left.add(left).expect("add failed");
        pair.right.add(right).expect("add failed");

        pair.synchronize().expect("sync failed");

        let (left, right) = pair.both(&id);
        let (left, right) = (left.expect("left item"), right.expect("right item"));
        prop_assert_eq!(left.sync(), right.sync());
        prop_assert_eq!(left.sync().conflicts(), right.sync().conflicts());
        prop_assert_eq!(
            pair.left.get_conflicts().expect("read failed").len(),
            pair.right.get_conflicts().expect("read failed").len()
        );
    }

    #[test]
    fn second_round_changes_nothing((left, right) in replica_divergent_strategy()) {
        let pair = ReplicaPair::new();
        let id = left.id().to_string();
        pair.left.add(left).expect("add failed");
        pair.right.add(right).expect("add failed");

        pair.synchronize().expect("sync failed");
        let before = pair.both(&id);
        pair.synchronize().expect("sync failed");
        let after = pair.both(&id);

        prop_assert_eq!(before.0.map(|i| i.sync().clone()), after.0.map(|i| i.sync().clone()));
        prop_assert_eq!(before.1.map(|i| i.sync().clone()), after.1.map(|i| i.sync().clone()));
    }

    #[test]
    fn phase_order_does_not_change_the_outcome((left, right) in replica_divergent_strategy()) {
        let id = left.id().to_string();

        let forward = ReplicaPair::new();
        forward.left.add(left.clone()).expect("add failed");
        forward.right.add(right.clone()).expect("add failed");
        forward.synchronize().expect("sync failed");

        let reversed = ReplicaPair::new();
        reversed.left.add(right).expect("add failed");
        reversed.right.add(left).expect("add failed");
        reversed.synchronize().expect("sync failed");

        let (a, b) = forward.both(&id);
        let (c, d) = reversed.both(&id);
        let ends = [a, b, c, d].map(|item| item.expect("item missing"));
        for end in &ends[1..] {
            prop_assert_eq!(end.sync(), ends[0].sync());
            prop_assert_eq!(end.sync().conflicts().len(), ends[0].sync().conflicts().len());
        }
    }
}

