//! End-to-end lifecycle coverage over the public API, driven by the
//! in-memory transaction source.

use txscope::mem::{InMemoryBeginner, InMemoryCoordinator, InMemoryTx, MemError};
use txscope::{AnyCoordinator, Coordinator, Scope, Transaction, TxResult};

struct Descriptor {
    name: &'static str,
    begin_error: Option<&'static str>,
    tx_error: Option<&'static str>,
    commit_first: bool,
}

const CASES: &[Descriptor] = &[
    Descriptor {
        name: "clean commit",
        begin_error: None,
        tx_error: None,
        commit_first: true,
    },
    Descriptor {
        name: "clean rollback",
        begin_error: None,
        tx_error: None,
        commit_first: false,
    },
    Descriptor {
        name: "begin failure",
        begin_error: Some("connection refused"),
        tx_error: None,
        commit_first: true,
    },
    Descriptor {
        name: "begin failure wins over tx failure",
        begin_error: Some("connection refused"),
        tx_error: Some("disk full"),
        commit_first: true,
    },
    Descriptor {
        name: "commit failure",
        begin_error: None,
        tx_error: Some("disk full"),
        commit_first: true,
    },
    Descriptor {
        name: "rollback failure",
        begin_error: None,
        tx_error: Some("disk full"),
        commit_first: false,
    },
];

#[test]
fn test_lifecycle_matrix() {
    for case in CASES {
        let mut beginner = InMemoryBeginner::new();
        if let Some(message) = case.begin_error {
            beginner = beginner.begin_error(message);
        }
        if let Some(message) = case.tx_error {
            beginner = beginner.tx_error(message);
        }
        let coordinator = Coordinator::new(beginner);

        let tx = match coordinator.scoped(&Scope::root()) {
            Ok(tx) => {
                assert!(
                    case.begin_error.is_none(),
                    "{}: begin should have failed",
                    case.name
                );
                tx
            }
            Err(err) => {
                let expected = match case.begin_error {
                    Some(message) => message,
                    None => panic!("{}: unexpected begin failure: {err}", case.name),
                };
                assert!(err.is_begin_failure(), "{}: begin tag missing", case.name);
                assert!(!err.is_exhausted(), "{}: begin failure is not a replay", case.name);
                assert_eq!(
                    err.cause_as::<MemError>(),
                    Some(&MemError::new(expected)),
                    "{}: begin cause lost",
                    case.name
                );
                continue;
            }
        };
        let scope = tx.scope();

        assert!(tx.is_owned(), "{}: first handle must own", case.name);

        // A nested request joins without taking ownership, and its own
        // terminal calls decide nothing.
        let joined = coordinator.scoped(&scope).unwrap();
        assert!(!joined.is_owned(), "{}: nested handle must not own", case.name);
        assert_eq!(joined.id(), tx.id(), "{}: nested handle joined another tree", case.name);
        joined.commit(&scope).unwrap();
        joined.rollback(&scope).unwrap();
        assert_eq!(
            tx.underlying().finalize_calls(),
            0,
            "{}: non-owning calls must not reach the resource",
            case.name
        );

        // First terminal call on the owner.
        let first = if case.commit_first {
            tx.commit(&scope)
        } else {
            tx.rollback(&scope)
        };
        match (case.tx_error, first) {
            (None, Ok(())) => {}
            (None, Err(err)) => panic!("{}: unexpected failure: {err}", case.name),
            (Some(_), Ok(())) => panic!("{}: expected a failure", case.name),
            (Some(message), Err(err)) => {
                if case.commit_first {
                    assert!(err.is_commit_failure(), "{}: commit tag missing", case.name);
                } else {
                    assert!(err.is_rollback_failure(), "{}: rollback tag missing", case.name);
                }
                assert!(
                    !err.is_exhausted(),
                    "{}: first outcome must not be a replay",
                    case.name
                );
                assert_eq!(
                    err.cause_as::<MemError>(),
                    Some(&MemError::new(message)),
                    "{}: cause lost",
                    case.name
                );
            }
        }

        // Every later terminal call, on any handle, replays the recorded
        // outcome behind the exhausted marker.
        for handle in [&tx, &joined] {
            let err = handle.commit(&scope).unwrap_err();
            assert!(err.is_exhausted(), "{}: replay must be exhausted", case.name);
            match case.tx_error {
                Some(message) => {
                    let tagged = if case.commit_first {
                        err.is_commit_failure()
                    } else {
                        err.is_rollback_failure()
                    };
                    assert!(tagged, "{}: replay lost the phase tag", case.name);
                    assert_eq!(
                        err.cause_as::<MemError>(),
                        Some(&MemError::new(message)),
                        "{}: replay lost the cause",
                        case.name
                    );
                }
                None => {
                    assert!(
                        !err.is_commit_failure() && !err.is_rollback_failure(),
                        "{}: clean outcome replayed with a phase tag",
                        case.name
                    );
                }
            }
        }

        // No matter how many handles were finalized, the resource saw one
        // call.
        assert_eq!(tx.underlying().finalize_calls(), 1, "{}: resource call count", case.name);
        let (commits, rollbacks) = if case.commit_first { (1, 0) } else { (0, 1) };
        assert_eq!(tx.underlying().commit_calls(), commits, "{}: commit count", case.name);
        assert_eq!(tx.underlying().rollback_calls(), rollbacks, "{}: rollback count", case.name);
    }
}

#[test]
fn test_failed_commit_then_rollback_reports_replay() {
    let coordinator = InMemoryCoordinator::new(InMemoryBeginner::new().tx_error("disk full"));
    let tx = coordinator.scoped(&Scope::root()).unwrap();
    let scope = tx.scope();

    let commit_err = tx.commit(&scope).unwrap_err();
    assert!(commit_err.is_commit_failure());
    assert!(!commit_err.is_exhausted());

    // The cleanup rollback reports what already happened instead of
    // touching the resource again.
    let rollback_err = tx.rollback(&scope).unwrap_err();
    assert!(rollback_err.is_exhausted());
    assert!(rollback_err.is_commit_failure());
    assert!(!rollback_err.is_rollback_failure());
    assert_eq!(
        rollback_err.cause_as::<MemError>(),
        Some(&MemError::new("disk full"))
    );
    assert_eq!(tx.underlying().rollback_calls(), 0);
}

#[test]
fn test_nested_helper_commit_defers_to_request_owner() {
    fn helper(coordinator: &InMemoryCoordinator, scope: &Scope) -> TxResult<()> {
        let tx = coordinator.scoped(scope)?;
        tx.commit(&tx.scope())
    }

    let coordinator = InMemoryCoordinator::new(InMemoryBeginner::new());
    let request_tx = coordinator.scoped(&Scope::root()).unwrap();

    helper(&coordinator, &request_tx.scope()).unwrap();
    assert!(request_tx.terminal_error().is_none());

    // The request layer decides, discarding the helper's work with it.
    request_tx.rollback(&request_tx.scope()).unwrap();
    assert_eq!(request_tx.underlying().commit_calls(), 0);
    assert_eq!(request_tx.underlying().rollback_calls(), 1);
    assert_eq!(coordinator.beginner().begin_calls(), 1);
}

#[test]
fn test_adopted_transaction_is_joined_by_the_coordinator() {
    let coordinator = InMemoryCoordinator::new(InMemoryBeginner::new());

    // A transaction begun elsewhere is adopted by wrapping it; the
    // coordinator then joins it instead of beginning its own.
    let adopted = Transaction::wrap_owned(&Scope::root(), InMemoryTx::new());
    let joined = coordinator.scoped(&adopted.scope()).unwrap();

    assert!(!joined.is_owned());
    assert_eq!(joined.id(), adopted.id());
    assert_eq!(coordinator.beginner().begin_calls(), 0);
}

#[test]
fn test_concurrent_finalization_reaches_resource_once() {
    let tx = Transaction::wrap_owned(&Scope::root(), InMemoryTx::new());
    let scope = tx.scope();

    let outcomes: Vec<TxResult<()>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tx = tx.clone();
                let scope = scope.clone();
                s.spawn(move || {
                    if i % 2 == 0 {
                        tx.commit(&scope)
                    } else {
                        tx.rollback(&scope)
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(successes, 1);
    for err in outcomes.iter().filter_map(|outcome| outcome.as_ref().err()) {
        assert!(err.is_exhausted());
    }
    assert_eq!(tx.underlying().finalize_calls(), 1);
}

#[test]
fn test_erased_coordinators_compose_in_one_collection() {
    let sources: Vec<AnyCoordinator> = vec![
        Coordinator::new(InMemoryBeginner::new()).into_any(),
        Coordinator::new(InMemoryBeginner::new().tx_error("disk full")).into_any(),
    ];

    let mut failures = 0;
    for source in &sources {
        let tx = source.scoped(&Scope::root()).unwrap();
        if let Err(err) = tx.commit(&tx.scope()) {
            assert!(err.is_commit_failure());
            failures += 1;
        }
    }
    assert_eq!(failures, 1);
}
