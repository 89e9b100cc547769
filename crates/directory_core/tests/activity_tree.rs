use directory_core::db::open_db_in_memory;
use directory_core::{
    ActivityErrorKind, ActivityService, ActivityServiceError, SqliteActivityRepository,
    MAX_ACTIVITY_DEPTH,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn activity_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM activities;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn chain_accepts_three_levels_and_rejects_the_fourth() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let root = service.create_node("Food", None).unwrap();
    let a = service.create_node("Meat", Some(root.id)).unwrap();
    let b = service.create_node("Sausages", Some(a.id)).unwrap();
    assert_eq!(service.depth_of(root.id).unwrap(), 1);
    assert_eq!(service.depth_of(a.id).unwrap(), 2);
    assert_eq!(service.depth_of(b.id).unwrap(), MAX_ACTIVITY_DEPTH);

    let err = service.create_node("Smoked", Some(b.id)).unwrap_err();
    assert_eq!(err.kind(), ActivityErrorKind::DepthExceeded);
    assert_eq!(err.error_code(), "depth_exceeded");
    match err {
        ActivityServiceError::DepthExceeded {
            parent_id,
            attempted_depth,
        } => {
            assert_eq!(parent_id, b.id);
            assert_eq!(attempted_depth, 4);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(activity_count(&conn), 3);
    assert!(service.list_children(Some(b.id)).unwrap().is_empty());
}

#[test]
fn missing_parent_is_not_found_and_writes_nothing() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let missing = Uuid::new_v4();
    let err = service.create_node("Orphan", Some(missing)).unwrap_err();
    assert!(matches!(err, ActivityServiceError::ParentNotFound(id) if id == missing));
    assert_eq!(err.kind(), ActivityErrorKind::NotFound);
    assert_eq!(activity_count(&conn), 0);
}

#[test]
fn blank_names_are_rejected_and_names_are_trimmed() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let err = service.create_node("   ", None).unwrap_err();
    assert!(matches!(err, ActivityServiceError::InvalidName));
    assert_eq!(err.kind(), ActivityErrorKind::InvalidInput);

    let node = service.create_node("  IT Services ", None).unwrap();
    assert_eq!(node.name, "IT Services");
    assert!(node.is_root());
}

#[test]
fn children_are_listed_by_name() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let root = service.create_node("Food", None).unwrap();
    let dairy = service.create_node("Dairy", Some(root.id)).unwrap();
    let bakery = service.create_node("Bakery", Some(root.id)).unwrap();

    let children = service.list_children(Some(root.id)).unwrap();
    let ids: Vec<_> = children.iter().map(|node| node.id).collect();
    assert_eq!(ids, vec![bakery.id, dairy.id]);

    let roots = service.list_children(None).unwrap();
    assert_eq!(roots.len(), 1);

    let err = service.list_children(Some(Uuid::new_v4())).unwrap_err();
    assert!(matches!(err, ActivityServiceError::ParentNotFound(_)));
}

#[test]
fn reassigning_a_leaf_under_a_depth_three_node_is_rejected() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let root = service.create_node("Root", None).unwrap();
    let a = service.create_node("A", Some(root.id)).unwrap();
    let b = service.create_node("B", Some(a.id)).unwrap();
    let loose = service.create_node("Loose", None).unwrap();

    let err = service.reassign_parent(loose.id, Some(b.id)).unwrap_err();
    assert_eq!(err.kind(), ActivityErrorKind::DepthExceeded);
    assert!(service.get_node(loose.id).unwrap().is_root());

    service.reassign_parent(loose.id, Some(a.id)).unwrap();
    assert_eq!(service.get_node(loose.id).unwrap().parent_id, Some(a.id));
    assert_eq!(service.depth_of(loose.id).unwrap(), 3);
}

#[test]
fn reassigning_a_subtree_checks_its_height() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let target_root = service.create_node("Target", None).unwrap();
    let target_child = service.create_node("Target child", Some(target_root.id)).unwrap();
    let moving = service.create_node("Moving", None).unwrap();
    let moving_child = service.create_node("Moving child", Some(moving.id)).unwrap();

    let err = service
        .reassign_parent(moving.id, Some(target_child.id))
        .unwrap_err();
    match err {
        ActivityServiceError::DepthExceeded {
            attempted_depth, ..
        } => assert_eq!(attempted_depth, 4),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        service.get_node(moving_child.id).unwrap().parent_id,
        Some(moving.id)
    );
    assert!(service.get_node(moving.id).unwrap().is_root());

    service.reassign_parent(moving.id, Some(target_root.id)).unwrap();
    assert_eq!(service.depth_of(moving_child.id).unwrap(), 3);
}

#[test]
fn reassign_round_trip_restores_structure() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let food = service.create_node("Food", None).unwrap();
    let meat = service.create_node("Meat", Some(food.id)).unwrap();
    let other = service.create_node("Other", None).unwrap();

    let before = service.forest().unwrap();
    service.reassign_parent(meat.id, Some(other.id)).unwrap();
    assert!(service.list_children(Some(food.id)).unwrap().is_empty());
    service.reassign_parent(meat.id, Some(food.id)).unwrap();
    assert_eq!(service.forest().unwrap(), before);

    service.reassign_parent(meat.id, None).unwrap();
    assert!(service.get_node(meat.id).unwrap().is_root());
    assert_eq!(service.list_children(None).unwrap().len(), 3);
}

#[test]
fn reassign_rejects_cycles() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let root = service.create_node("Root", None).unwrap();
    let child = service.create_node("Child", Some(root.id)).unwrap();

    let err = service.reassign_parent(root.id, Some(root.id)).unwrap_err();
    assert_eq!(err.kind(), ActivityErrorKind::CycleDetected);

    let err = service.reassign_parent(root.id, Some(child.id)).unwrap_err();
    assert!(matches!(
        err,
        ActivityServiceError::CycleDetected { node_id, parent_id }
            if node_id == root.id && parent_id == child.id
    ));
    assert_eq!(err.error_code(), "cycle_detected");
    assert!(service.get_node(root.id).unwrap().is_root());
}

#[test]
fn reassign_reports_missing_node_and_parent() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());
    let node = service.create_node("Node", None).unwrap();

    let missing = Uuid::new_v4();
    let err = service.reassign_parent(missing, None).unwrap_err();
    assert!(matches!(err, ActivityServiceError::NodeNotFound(id) if id == missing));

    let err = service.reassign_parent(node.id, Some(missing)).unwrap_err();
    assert!(matches!(err, ActivityServiceError::ParentNotFound(id) if id == missing));
}

#[test]
fn delete_removes_subtree_and_organization_links() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let food = service.create_node("Food", None).unwrap();
    let meat = service.create_node("Meat", Some(food.id)).unwrap();
    let sausages = service.create_node("Sausages", Some(meat.id)).unwrap();
    let keep = service.create_node("IT", None).unwrap();

    let building_id = Uuid::new_v4().to_string();
    let org_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO buildings (id, address, latitude, longitude) VALUES (?1, 'Addr 1', 1.0, 1.0);",
        [&building_id],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO organizations (id, name, building_id) VALUES (?1, 'Org', ?2);",
        [&org_id, &building_id],
    )
    .unwrap();
    for activity in [sausages.id, keep.id] {
        conn.execute(
            "INSERT INTO organization_activities (organization_id, activity_id) VALUES (?1, ?2);",
            [&org_id, &activity.to_string()],
        )
        .unwrap();
    }

    let removed = service.delete_node(meat.id).unwrap();
    assert_eq!(removed, 2);
    assert!(matches!(
        service.get_node(sausages.id).unwrap_err(),
        ActivityServiceError::NodeNotFound(_)
    ));
    assert!(service.list_children(Some(food.id)).unwrap().is_empty());

    let links: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM organization_activities;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(links, 1);

    let err = service.delete_node(meat.id).unwrap_err();
    assert_eq!(err.kind(), ActivityErrorKind::NotFound);
}

#[test]
fn delete_counts_every_removed_descendant() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let food = service.create_node("Food", None).unwrap();
    let meat = service.create_node("Meat", Some(food.id)).unwrap();
    let dairy = service.create_node("Dairy", Some(food.id)).unwrap();
    service.create_node("Sausages", Some(meat.id)).unwrap();
    service.create_node("Cheese", Some(dairy.id)).unwrap();
    service.create_node("Milk", Some(dairy.id)).unwrap();
    service.create_node("IT", None).unwrap();

    assert_eq!(service.delete_node(food.id).unwrap(), 6);
    assert_eq!(activity_count(&conn), 1);
}

#[test]
fn subtree_and_forest_nest_children() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());

    let food = service.create_node("Food", None).unwrap();
    let meat = service.create_node("Meat", Some(food.id)).unwrap();
    service.create_node("Sausages", Some(meat.id)).unwrap();
    service.create_node("Dairy", Some(food.id)).unwrap();
    service.create_node("IT", None).unwrap();

    let tree = service.subtree(food.id).unwrap();
    assert_eq!(tree.height(), 3);
    assert_eq!(tree.node_count(), 4);
    assert_eq!(tree.children[0].name, "Dairy");
    assert_eq!(tree.children[1].children[0].name, "Sausages");

    let forest = service.forest().unwrap();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest.iter().map(|tree| tree.node_count()).sum::<usize>(), 5);
}

#[test]
fn rename_trims_and_reports_missing_nodes() {
    let conn = setup();
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn).unwrap());
    let node = service.create_node("Food", None).unwrap();

    service.rename_node(node.id, " Groceries ").unwrap();
    assert_eq!(service.get_node(node.id).unwrap().name, "Groceries");

    assert!(matches!(
        service.rename_node(node.id, " ").unwrap_err(),
        ActivityServiceError::InvalidName
    ));
    assert!(matches!(
        service.rename_node(Uuid::new_v4(), "X").unwrap_err(),
        ActivityServiceError::NodeNotFound(_)
    ));
}
