use directory_core::db::open_db;
use directory_core::{
    ActivityErrorKind, ActivityId, ActivityService, ActivityServiceError, SqliteActivityRepository,
    MAX_ACTIVITY_DEPTH,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: usize = 8;

fn with_service<T>(
    path: &Path,
    f: impl FnOnce(&ActivityService<SqliteActivityRepository<'_>>) -> T,
) -> T {
    let conn = open_db(path).unwrap();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());
    f(&service)
}

/// Runs `WRITERS` threads released together, each on its own connection.
fn race<T, F>(path: &Path, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize, &ActivityService<SqliteActivityRepository<'_>>) -> T + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(WRITERS));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..WRITERS)
        .map(|index| {
            let path: PathBuf = path.to_path_buf();
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            thread::spawn(move || {
                with_service(&path, |service| {
                    barrier.wait();
                    f(index, service)
                })
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn count_activities(path: &Path) -> i64 {
    let conn = open_db(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM activities;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn concurrent_creates_under_valid_parent_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.sqlite3");
    let parent = with_service(&path, |service| {
        let root = service.create_node("Root", None).unwrap();
        service.create_node("Level 2", Some(root.id)).unwrap()
    });

    let results = race(&path, move |index, service| {
        service.create_node(format!("Leaf {index}"), Some(parent.id))
    });

    let ids: HashSet<ActivityId> = results
        .into_iter()
        .map(|result| result.unwrap().id)
        .collect();
    assert_eq!(ids.len(), WRITERS);

    with_service(&path, |service| {
        for id in ids {
            assert_eq!(service.depth_of(id).unwrap(), MAX_ACTIVITY_DEPTH);
        }
    });
}

#[test]
fn concurrent_creates_under_depth_three_parent_all_fail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.sqlite3");
    let parent = with_service(&path, |service| {
        let root = service.create_node("Root", None).unwrap();
        let a = service.create_node("A", Some(root.id)).unwrap();
        service.create_node("B", Some(a.id)).unwrap()
    });
    let before = count_activities(&path);

    let results = race(&path, move |index, service| {
        service.create_node(format!("Too deep {index}"), Some(parent.id))
    });

    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ActivityErrorKind::DepthExceeded, "{err}");
    }
    assert_eq!(count_activities(&path), before);
}

#[test]
fn racing_move_and_insert_never_exceed_depth() {
    // Individually valid: moving `loose` (height 2) under `root`, or adding a
    // child under `loose_child`. Together they would reach depth 4.
    for _ in 0..10 {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.sqlite3");
        let (root, loose, loose_child) = with_service(&path, |service| {
            let root = service.create_node("Root", None).unwrap();
            let loose = service.create_node("Loose", None).unwrap();
            let loose_child = service.create_node("Loose child", Some(loose.id)).unwrap();
            (root.id, loose.id, loose_child.id)
        });

        let results = race(&path, move |index, service| -> Result<(), ActivityServiceError> {
            if index % 2 == 0 {
                service.reassign_parent(loose, Some(root))
            } else {
                service
                    .create_node(format!("Grandchild {index}"), Some(loose_child))
                    .map(|_| ())
            }
        });

        for result in &results {
            if let Err(err) = result {
                assert_eq!(err.kind(), ActivityErrorKind::DepthExceeded, "{err}");
            }
        }
        assert!(results.iter().any(Result::is_ok));

        let conn = open_db(&path).unwrap();
        let mut stmt = conn.prepare("SELECT id FROM activities;").unwrap();
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());
        for id in ids {
            let depth = service.depth_of(id.parse().unwrap()).unwrap();
            assert!(depth <= MAX_ACTIVITY_DEPTH, "depth {depth} for {id}");
        }
    }
}
