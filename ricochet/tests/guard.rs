//! Guard behaviour observed through the thread-local API.

use ricochet::{EventKind, GuardError, GuardMonitor, Phase, TriggerId, guard};
use std::thread;

mod common;
use common::{on_fresh_thread, uri};

#[test]
fn test_balanced_nesting_unwinds_to_empty() {
    on_fresh_thread(|| {
        let (a, b) = (TriggerId::next(), TriggerId::next());
        let doc = uri("/db/c/a.xml");
        let other = uri("/db/c/b.xml");

        guard::register(a, Phase::Before, EventKind::UPDATE_DOCUMENT, &doc, None).unwrap();
        guard::register(b, Phase::Before, EventKind::CREATE_DOCUMENT, &other, None).unwrap();
        guard::register(b, Phase::After, EventKind::CREATE_DOCUMENT, &other, None).unwrap();
        guard::unwind_if_finished(Phase::After);
        assert_eq!(guard::len(), 3);

        guard::register(a, Phase::After, EventKind::UPDATE_DOCUMENT, &doc, None).unwrap();
        guard::unwind_if_finished(Phase::After);
    });
}

#[test]
fn test_direct_recursion_and_its_completion() {
    on_fresh_thread(|| {
        let a = TriggerId::next();
        let doc = uri("/db/c/a.xml");
        let reg = |phase| guard::register(a, phase, EventKind::UPDATE_DOCUMENT, &doc, None);

        reg(Phase::Before).unwrap();
        assert!(matches!(reg(Phase::Before), Err(GuardError::Cycle(_))));
        assert!(matches!(reg(Phase::After), Err(GuardError::Cycle(_))));
        guard::unwind_if_finished(Phase::After);

        reg(Phase::After).unwrap();
        guard::unwind_if_finished(Phase::After);
    });
}

#[test]
fn test_after_without_before_is_a_violation() {
    on_fresh_thread(|| {
        let err = guard::register(
            TriggerId::next(),
            Phase::After,
            EventKind::DELETE_COLLECTION,
            &uri("/db/c"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, GuardError::Violation(_)));
        guard::reset();
    });
}

#[test]
fn test_monitor_sees_open_invocations_per_thread() {
    let handle = thread::Builder::new()
        .name("writer".into())
        .spawn(|| {
            let id = TriggerId::next();
            guard::register(id, Phase::Before, EventKind::CREATE_DOCUMENT, &uri("/db/x"), None)
                .unwrap();

            let report = GuardMonitor::registry()
                .thread(thread::current().id())
                .unwrap();
            assert_eq!(report.thread_name.as_deref(), Some("writer"));
            assert_eq!(report.entries, 1);
            assert_eq!(report.depth, 1);
            assert!(report.dump.contains("CREATE-DOCUMENT"));

            guard::reset();
            thread::current().id()
        })
        .unwrap();

    let id = handle.join().unwrap();
    assert!(GuardMonitor::registry().thread(id).is_none());
}
