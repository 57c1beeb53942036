// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use raft_progress::{default_logger, Action, Error, Progress, ProgressState, ProgressTracker, Status};

fn new_tracker(ids: &[u64], next_idx: u64, max_inflight: usize) -> ProgressTracker {
    let mut tracker = ProgressTracker::new(max_inflight, default_logger());
    for &id in ids {
        tracker.add_peer(id, next_idx, false).unwrap();
    }
    tracker
}

// A follower goes through probing, pipelining, a lost message and a snapshot
// while the leader only talks to the tracker.
#[test]
fn test_progress_lifecycle() {
    let mut tracker = new_tracker(&[2], 11, 3);

    // Probe one append at a time.
    assert_eq!(tracker.next_action(2, 1), Action::Append { next_idx: 11 });
    tracker.sent_append(2, 12);
    assert_eq!(tracker.is_paused(2), Some(true));
    assert_eq!(tracker.next_action(2, 1), Action::Wait);

    // The follower only has 7 entries.
    assert!(tracker.handle_append_rejection(2, 10, 7));
    assert_eq!(tracker.next_idx(2), Some(8));
    assert_eq!(tracker.is_paused(2), Some(false));
    // Same rejection again, it's stale now.
    assert!(!tracker.handle_append_rejection(2, 10, 7));

    tracker.sent_append(2, 12);
    assert!(tracker.handle_append_response(2, 12));
    assert_eq!(tracker.state(2), Some(ProgressState::Replicate));
    assert_eq!(tracker.matched(2), Some(12));
    assert_eq!(tracker.next_idx(2), Some(13));

    // Pipeline until the window is full.
    for last in &[14, 16, 18] {
        assert!(matches!(tracker.next_action(2, 1), Action::Append { .. }));
        tracker.sent_append(2, *last);
    }
    assert_eq!(tracker.next_idx(2), Some(19));
    assert_eq!(tracker.next_action(2, 1), Action::Wait);

    // An ack frees the window up to it, a stale one does nothing.
    assert!(tracker.handle_append_response(2, 14));
    assert_eq!(tracker.get(2).unwrap().ins().count(), 2);
    assert!(!tracker.handle_append_response(2, 13));

    // The message carrying 15..=16 got lost, the follower rejects 16.
    assert!(tracker.handle_append_rejection(2, 16, 14));
    assert_eq!(tracker.state(2), Some(ProgressState::Probe));
    assert_eq!(tracker.next_idx(2), Some(15));
    assert_eq!(tracker.get(2).unwrap().ins().count(), 0);

    // Meanwhile the leader compacted past it.
    assert_eq!(tracker.next_action(2, 20), Action::Snapshot);
    tracker.sent_snapshot(2, 19);
    assert_eq!(tracker.state(2), Some(ProgressState::Snapshot));
    assert_eq!(tracker.next_action(2, 20), Action::Wait);

    tracker.handle_snapshot_status(2, true);
    assert_eq!(tracker.state(2), Some(ProgressState::Probe));
    assert_eq!(tracker.next_idx(2), Some(20));
    assert_eq!(tracker.is_paused(2), Some(true));

    assert!(tracker.handle_append_response(2, 19));
    assert_eq!(tracker.state(2), Some(ProgressState::Replicate));
    assert_eq!(tracker.matched(2), Some(19));
    assert_eq!(tracker.next_idx(2), Some(20));
}

#[test]
fn test_progress_never_moves_backwards() {
    let mut pr = Progress::new(5, 10);
    assert!(pr.maybe_update(7));
    for n in 0..=7 {
        assert!(!pr.maybe_update(n));
        assert_eq!(pr.matched(), 7);
        assert!(pr.next_idx() > pr.matched());
    }
    pr.become_replicate();
    // Stale rejections in replicate.
    for rejected in 0..=7 {
        assert!(!pr.maybe_decr_to(rejected, 0));
        assert_eq!(pr.next_idx(), 8);
    }
    assert_eq!(pr.state(), ProgressState::Replicate);
}

#[test]
fn test_progress_display() {
    let mut tracker = new_tracker(&[3, 1, 2], 1, 4);
    tracker.add_peer(4, 1, true).unwrap();
    tracker.handle_append_response(1, 5);
    tracker.sent_append(1, 9);
    tracker.sent_snapshot(2, 20);
    tracker.handle_heartbeat_response(3, 9);

    assert_eq!(
        tracker.to_string(),
        "1: StateReplicate match=5 next=10 inflight=1\n\
         2: StateSnapshot match=0 next=1 paused pendingSnap=20 inactive\n\
         3: StateProbe match=0 next=1\n\
         4: StateProbe match=0 next=1 learner inactive\n"
    );
}

#[test]
fn test_progress_tracker_membership() -> anyhow::Result<()> {
    let mut tracker = new_tracker(&[1, 2, 3], 4, 8);
    match tracker.add_peer(2, 1, false) {
        Err(Error::Exists(2, "progress")) => {}
        res => panic!("unexpected result {:?}", res),
    }
    let removed = tracker.remove(2).unwrap();
    assert_eq!(removed.next_idx(), 4);
    assert!(tracker.remove(2).is_none());
    assert_eq!(tracker.ids_sorted(), vec![1, 3]);

    // Nothing happens to nodes that are not tracked.
    assert_eq!(tracker.next_action(2, 1), Action::Wait);
    assert!(!tracker.handle_append_response(2, 10));
    assert!(!tracker.handle_append_rejection(2, 3, 0));
    assert!(!tracker.handle_heartbeat_response(2, 10));
    tracker.handle_snapshot_status(2, true);
    tracker.handle_unreachable(2);
    tracker.sent_append(2, 10);
    assert_eq!(tracker.len(), 2);

    let json = Status::new(&tracker).to_json()?;
    let re = regex::Regex::new(r#""id":(\d+)"#)?;
    let ids: Vec<&str> = re
        .captures_iter(&json)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();
    assert_eq!(ids, vec!["1", "3"]);
    Ok(())
}

#[test]
fn test_progress_quorum_recently_active() {
    let mut tracker = new_tracker(&[1, 2, 3, 4, 5], 1, 8);
    tracker.add_peer(6, 1, true).unwrap();
    tracker.handle_heartbeat_response(6, 1);
    // Only the leader itself.
    assert!(!tracker.quorum_recently_active(1));

    tracker.handle_heartbeat_response(2, 1);
    tracker.handle_append_response(3, 1);
    assert!(tracker.quorum_recently_active(1));
    // The flags of voters are cleared by the check.
    assert!(!tracker.quorum_recently_active(1));
    assert!(tracker.get(6).unwrap().recent_active());
}
