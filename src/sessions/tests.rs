//! Session Cache Tests
//!
//! ## Test Scopes
//! - **Indices**: upsert, hide, remove and clear keep the three indices linked.
//! - **De-duplication**: repeated removals for one user collapse into one action.
//! - **Site rename**: all indices move to the new site key.
//! - **Concurrency**: the final state matches the last applied action for each
//!   user, whether producers own a user or share one.

#[cfg(test)]
mod tests {
    use crate::sessions::cache::SessionCache;
    use crate::sessions::types::{SessionRecord, SessionsCachingAction};
    use crate::worker::hub::WorkerHub;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(5);

    fn new_cache() -> SessionCache {
        let hub = WorkerHub::new(TICK);
        SessionCache::start(&hub)
    }

    // ============================================================
    // TEST 1: End-to-end upsert / hide scenario
    // ============================================================

    #[tokio::test]
    async fn test_authenticated_then_hidden_upsert() {
        // ARRANGE
        let cache = new_cache();
        let s1 = SessionRecord::for_user("S1", 7);

        // ACT: authenticated, visible
        cache.upsert("A", Some(7), true, false, s1.clone()).unwrap();
        cache.flush().await.unwrap();

        // ASSERT
        assert_eq!(cache.get_authenticated_users_count("A"), 1);
        assert_eq!(cache.get_hidden_users_count("A"), 0);

        // ACT: same session, now hidden
        cache.upsert("A", Some(7), true, true, s1).unwrap();
        cache.flush().await.unwrap();

        // ASSERT
        assert_eq!(cache.get_hidden_users_count("A"), 1);
        assert_eq!(cache.get_authenticated_users_count("A"), 1);
        assert_eq!(cache.get_sessions_count("A"), 1);
        assert!(cache.is_user_hidden("A", 7));
        assert!(cache.site_info("A").unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_unauthenticated_upsert_drops_user_indices() {
        let cache = new_cache();

        cache
            .upsert("A", Some(3), true, true, SessionRecord::for_user("S3", 3))
            .unwrap();
        cache
            .upsert("A", Some(3), false, false, SessionRecord::for_user("S3", 3))
            .unwrap();
        cache.flush().await.unwrap();

        assert!(!cache.is_user_authenticated("A", 3));
        assert!(!cache.is_user_hidden("A", 3));
        assert!(cache.get_session("A", "S3").is_some());
    }

    #[tokio::test]
    async fn test_anonymous_session_is_only_in_sessions_index() {
        let cache = new_cache();

        cache
            .upsert("A", None, false, false, SessionRecord::new("anon"))
            .unwrap();
        cache.flush().await.unwrap();

        assert_eq!(cache.get_sessions_count("A"), 1);
        assert_eq!(cache.get_authenticated_users_count("A"), 0);
        assert!(cache.get_authenticated_users("A").is_empty());
    }

    #[tokio::test]
    async fn test_reads_on_unknown_site_are_empty() {
        let cache = new_cache();

        assert!(cache.get_sessions("missing").is_empty());
        assert!(cache.get_session("missing", "S1").is_none());
        assert_eq!(cache.get_sessions_count("missing"), 0);
        assert!(!cache.is_user_authenticated("missing", 1));
    }

    // ============================================================
    // TEST 2: Removal
    // ============================================================

    #[tokio::test]
    async fn test_remove_user_clears_all_indices_on_all_sites() {
        let cache = new_cache();

        cache
            .upsert("A", Some(5), true, true, SessionRecord::for_user("SA", 5))
            .unwrap();
        cache
            .upsert("B", Some(5), true, false, SessionRecord::for_user("SB", 5))
            .unwrap();
        cache
            .upsert("A", Some(6), true, false, SessionRecord::for_user("S6", 6))
            .unwrap();

        assert!(cache.remove(5).unwrap());
        cache.flush().await.unwrap();

        assert!(!cache.is_user_authenticated("A", 5));
        assert!(!cache.is_user_authenticated("B", 5));
        assert_eq!(cache.get_hidden_users_count("A"), 0);
        assert!(cache.get_session("A", "SA").is_none());
        assert!(cache.get_session("B", "SB").is_none());
        assert_eq!(cache.get_authenticated_users("A"), vec![6]);
        assert!(cache.site_info("A").unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_duplicate_removal_is_dropped() {
        // ARRANGE
        let cache = new_cache();
        cache
            .upsert("A", Some(9), true, false, SessionRecord::for_user("S9", 9))
            .unwrap();
        cache.flush().await.unwrap();
        let before = cache.queue().processed_count();

        // ACT: two removals before the queue drains
        let first = cache.remove(9).unwrap();
        let second = cache.remove(9).unwrap();
        cache.flush().await.unwrap();

        // ASSERT: exactly one removal reached the worker
        assert!(first);
        assert!(!second);
        assert_eq!(cache.queue().processed_count() - before, 1);
        assert!(!cache.is_user_authenticated("A", 9));

        // Once applied, a new removal is accepted again
        assert!(cache.remove(9).unwrap());
    }

    #[tokio::test]
    async fn test_removal_after_upsert_is_not_a_duplicate() {
        let cache = new_cache();

        assert!(cache.remove(4).unwrap());
        cache
            .upsert("A", Some(4), true, false, SessionRecord::for_user("S4", 4))
            .unwrap();
        assert!(cache.remove(4).unwrap());
        cache.flush().await.unwrap();

        assert!(!cache.is_user_authenticated("A", 4));
    }

    #[tokio::test]
    async fn test_remove_session_unlinks_users() {
        let cache = new_cache();

        cache
            .upsert("A", Some(1), true, true, SessionRecord::for_user("S1", 1))
            .unwrap();
        cache.remove_session("A", "S1").unwrap();
        cache.flush().await.unwrap();

        assert_eq!(cache.get_sessions_count("A"), 0);
        assert_eq!(cache.get_authenticated_users_count("A"), 0);
        assert_eq!(cache.get_hidden_users_count("A"), 0);
    }

    // ============================================================
    // TEST 3: Site rename and clear
    // ============================================================

    #[tokio::test]
    async fn test_change_site_name_moves_indices() {
        let cache = new_cache();
        let session = SessionRecord::for_user("S1", 7);

        cache.upsert("A", Some(7), true, true, session.clone()).unwrap();
        cache.change_site_name("A", "B").unwrap();
        cache.flush().await.unwrap();

        assert!(cache.get_sessions("A").is_empty());
        assert_eq!(cache.get_sessions("B"), vec![session]);
        assert!(cache.is_user_authenticated("B", 7));
        assert!(cache.is_user_hidden("B", 7));
        assert_eq!(cache.site_names(), vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn test_change_site_name_merges_into_existing_site() {
        let cache = new_cache();

        cache
            .upsert("A", Some(1), true, false, SessionRecord::for_user("S1", 1))
            .unwrap();
        cache
            .upsert("B", Some(2), true, false, SessionRecord::for_user("S2", 2))
            .unwrap();
        cache.change_site_name("A", "B").unwrap();
        cache.flush().await.unwrap();

        assert_eq!(cache.get_authenticated_users("B"), vec![1, 2]);
        assert_eq!(cache.get_sessions_count("B"), 2);
    }

    #[tokio::test]
    async fn test_clear_empties_every_site() {
        let cache = new_cache();

        cache
            .upsert("A", Some(1), true, false, SessionRecord::for_user("S1", 1))
            .unwrap();
        cache
            .upsert("B", None, false, false, SessionRecord::new("S2"))
            .unwrap();
        cache.clear().unwrap();
        cache.flush().await.unwrap();

        assert!(cache.site_names().is_empty());
    }

    #[tokio::test]
    async fn test_session_cache_is_singleton_per_hub() {
        let hub = WorkerHub::new(TICK);
        let first = SessionCache::start(&hub);
        let second = SessionCache::start(&hub);

        first
            .upsert("A", Some(1), true, false, SessionRecord::for_user("S1", 1))
            .unwrap();
        second.flush().await.unwrap();

        assert!(second.is_user_authenticated("A", 1));
        assert_eq!(hub.queue_count(), 1);
    }

    #[test]
    fn test_action_serialization() {
        let action = SessionsCachingAction::ChangeSiteName {
            old_site_name: "A".to_string(),
            site_name: "B".to_string(),
        };

        let json = serde_json::to_string(&action).unwrap();
        let restored: SessionsCachingAction = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, action);
    }

    // ============================================================
    // TEST 4: Concurrent producers (property)
    // ============================================================

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Upsert { hidden: bool },
        Logout,
        Remove,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            any::<bool>().prop_map(|hidden| Step::Upsert { hidden }),
            Just(Step::Logout),
            Just(Step::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_last_action_per_user_wins(
            producers in prop::collection::vec(prop::collection::vec(step(), 1..12), 1..5)
        ) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let cache = new_cache();

                let mut handles = Vec::new();
                for (index, steps) in producers.iter().cloned().enumerate() {
                    let cache = cache.clone();
                    let user_id = index as i64 + 1;
                    handles.push(std::thread::spawn(move || {
                        let session = SessionRecord::for_user(format!("S{}", user_id), user_id);
                        for step in steps {
                            match step {
                                Step::Upsert { hidden } => cache
                                    .upsert("A", Some(user_id), true, hidden, session.clone())
                                    .unwrap(),
                                Step::Logout => cache
                                    .upsert("A", Some(user_id), false, false, session.clone())
                                    .unwrap(),
                                Step::Remove => {
                                    cache.remove(user_id).unwrap();
                                }
                            }
                        }
                    }));
                }
                for handle in handles {
                    handle.join().unwrap();
                }
                cache.flush().await.unwrap();

                for (index, steps) in producers.iter().enumerate() {
                    let user_id = index as i64 + 1;
                    let (authenticated, hidden) = match steps.last() {
                        Some(Step::Upsert { hidden }) => (true, *hidden),
                        _ => (false, false),
                    };
                    assert_eq!(cache.is_user_authenticated("A", user_id), authenticated);
                    assert_eq!(cache.is_user_hidden("A", user_id), hidden);
                }
                if let Some(site) = cache.site_info("A") {
                    assert!(site.is_consistent());
                }
            });
        }

        #[test]
        fn prop_shared_user_ends_in_last_applied_state(
            producers in prop::collection::vec(prop::collection::vec(step(), 1..10), 2..5)
        ) {
            const USER: i64 = 7;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let cache = new_cache();
                // Actions the cache accepted, in queue order.
                let applied: Arc<Mutex<Vec<(Step, String)>>> = Arc::new(Mutex::new(Vec::new()));

                let mut handles = Vec::new();
                for (index, steps) in producers.iter().cloned().enumerate() {
                    let cache = cache.clone();
                    let applied = applied.clone();
                    handles.push(std::thread::spawn(move || {
                        for (n, step) in steps.into_iter().enumerate() {
                            let session_id = format!("S{}-{}", index, n);
                            let session = SessionRecord::for_user(session_id.clone(), USER);
                            // Enqueue under the lock so the recorded order is the queue order.
                            let mut order = applied.lock().unwrap();
                            let accepted = match step {
                                Step::Upsert { hidden } => cache
                                    .upsert("A", Some(USER), true, hidden, session)
                                    .map(|_| true),
                                Step::Logout => cache
                                    .upsert("A", Some(USER), false, false, session)
                                    .map(|_| true),
                                Step::Remove => cache.remove(USER),
                            }
                            .unwrap();
                            if accepted {
                                order.push((step, session_id));
                            }
                        }
                    }));
                }
                for handle in handles {
                    handle.join().unwrap();
                }
                cache.flush().await.unwrap();

                let last = applied.lock().unwrap().last().cloned();
                match last {
                    Some((Step::Upsert { hidden }, session_id)) => {
                        assert!(cache.is_user_authenticated("A", USER));
                        assert_eq!(cache.is_user_hidden("A", USER), hidden);
                        assert_eq!(
                            cache.get_user_session("A", USER).map(|s| s.session_id),
                            Some(session_id)
                        );
                    }
                    Some((Step::Logout, session_id)) => {
                        assert!(!cache.is_user_authenticated("A", USER));
                        assert!(!cache.is_user_hidden("A", USER));
                        assert!(cache.get_session("A", &session_id).is_some());
                    }
                    Some((Step::Remove, _)) | None => {
                        assert!(!cache.is_user_authenticated("A", USER));
                        assert!(!cache.is_user_hidden("A", USER));
                        assert!(cache
                            .get_sessions("A")
                            .iter()
                            .all(|session| session.user_id != Some(USER)));
                    }
                }
                if let Some(site) = cache.site_info("A") {
                    assert!(site.is_consistent());
                }
            });
        }
    }
}
