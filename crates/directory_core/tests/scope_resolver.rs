use directory_core::db::open_db_in_memory;
use directory_core::{
    resolve_scope, ActivityErrorKind, ActivityId, ActivityReadView, ActivityService,
    SqliteActivityRepository,
};
use std::collections::HashSet;
use uuid::Uuid;

#[test]
fn three_level_chain_scopes_and_rejects_fourth_level() {
    let conn = open_db_in_memory().unwrap();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let root = service.create_node("L1", None).unwrap();
    let child = service.create_node("L2", Some(root.id)).unwrap();
    let grandchild = service.create_node("L3", Some(child.id)).unwrap();

    assert_eq!(
        service.resolve_scope(root.id).unwrap(),
        HashSet::from([root.id, child.id, grandchild.id])
    );
    assert_eq!(
        service.resolve_scope(child.id).unwrap(),
        HashSet::from([child.id, grandchild.id])
    );
    assert_eq!(
        service.resolve_scope(grandchild.id).unwrap(),
        HashSet::from([grandchild.id])
    );

    let err = service.create_node("L4", Some(grandchild.id)).unwrap_err();
    assert_eq!(err.kind(), ActivityErrorKind::DepthExceeded);
}

#[test]
fn missing_start_id_gives_empty_scope() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteActivityRepository::try_new(&conn).unwrap();
    assert!(resolve_scope(&repo, Uuid::new_v4()).unwrap().is_empty());
}

#[test]
fn scope_is_closed_under_children_and_excludes_unrelated_nodes() {
    let conn = open_db_in_memory().unwrap();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let food = service.create_node("Food", None).unwrap();
    let meat = service.create_node("Meat", Some(food.id)).unwrap();
    let dairy = service.create_node("Dairy", Some(food.id)).unwrap();
    service.create_node("Sausages", Some(meat.id)).unwrap();
    service.create_node("Cheese", Some(dairy.id)).unwrap();
    service.create_node("Milk", Some(dairy.id)).unwrap();
    let auto = service.create_node("Automotive", None).unwrap();
    service.create_node("Tires", Some(auto.id)).unwrap();

    let repo = SqliteActivityRepository::try_new(&conn).unwrap();
    let all: Vec<ActivityId> = service
        .forest()
        .unwrap()
        .iter()
        .flat_map(|tree| {
            let mut ids = vec![tree.id];
            for child in &tree.children {
                ids.push(child.id);
                ids.extend(child.children.iter().map(|g| g.id));
            }
            ids
        })
        .collect();
    assert_eq!(all.len(), 8);

    for start in all {
        let scope = resolve_scope(&repo, start).unwrap();
        assert!(scope.contains(&start));

        let members: Vec<_> = scope.iter().copied().collect();
        for child in repo.child_ids(&members).unwrap() {
            assert!(scope.contains(&child), "scope of {start} misses child {child}");
        }

        for id in &scope {
            let mut cursor = Some(*id);
            let mut reached = false;
            while let Some(current) = cursor {
                if current == start {
                    reached = true;
                    break;
                }
                cursor = repo.get_node(current).unwrap().and_then(|n| n.parent_id);
            }
            assert!(reached, "{id} is not a descendant of {start}");
        }
    }

    assert_eq!(service.resolve_scope(food.id).unwrap().len(), 6);
    assert_eq!(service.resolve_scope(auto.id).unwrap().len(), 2);
}
