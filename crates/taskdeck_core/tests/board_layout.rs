use taskdeck_core::model::board::{Board, Column, Group, Row};
use taskdeck_core::model::entity::Entity;
use taskdeck_core::model::position::position_key;
use taskdeck_core::{Store, StoreError};

async fn seeded_board(store: &Store) {
    let boards = store.boards();
    let mut board = Board::new("b1", "Sprint");
    board.column_order = vec!["todo".to_string(), "done".to_string()];
    boards.save_board(&board).await.unwrap();

    boards.save_group(&Group::new("g1", "b1", "Team")).await.unwrap();

    let mut r1 = Row::new("r1", "b1", "Alice");
    r1.group_id = Some("g1".to_string());
    boards.save_row(&r1).await.unwrap();
    let mut r2 = Row::new("r2", "b1", "Bob");
    r2.order = 1;
    boards.save_row(&r2).await.unwrap();

    boards.save_column(&Column::new("c1", "b1", "todo", "To do")).await.unwrap();
    let mut done = Column::new("c2", "b1", "done", "Done");
    done.order = 1;
    boards.save_column(&done).await.unwrap();
}

#[tokio::test]
async fn entity_moves_between_cells() {
    let store = Store::in_memory();
    seeded_board(&store).await;
    let positions = store.positions();

    let placed = positions
        .set_position("e1", "b1", "board", Some("r1"), "todo", 0.0)
        .await
        .unwrap();
    assert_eq!(placed.id, position_key("e1", "b1", "board"));
    assert_eq!(
        positions
            .get_entities_in_position("b1", "board", Some("r1"), "todo")
            .await
            .unwrap(),
        vec!["e1"]
    );

    let moved = positions
        .set_position("e1", "b1", "board", Some("r2"), "done", 1.0)
        .await
        .unwrap();
    assert_eq!(moved.created_at, placed.created_at);
    assert!(moved.updated_at > placed.updated_at);

    assert!(positions
        .get_entities_in_position("b1", "board", Some("r1"), "todo")
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        positions
            .get_entities_in_position("b1", "board", Some("r2"), "done")
            .await
            .unwrap(),
        vec!["e1"]
    );
    assert_eq!(positions.get_positions_for_entity("e1").await.unwrap().len(), 1);
    assert_eq!(positions.count().await.unwrap(), 1);
}

#[tokio::test]
async fn contexts_hold_independent_placements() {
    let store = Store::in_memory();
    let positions = store.positions();
    positions
        .set_position("e1", "b1", "board", Some("r1"), "todo", 0.0)
        .await
        .unwrap();
    positions
        .set_position("e1", "b1", "list", None, "todo", 0.0)
        .await
        .unwrap();

    assert_eq!(positions.get_positions_for_entity("e1").await.unwrap().len(), 2);
    let list = positions.get_position("e1", "b1", "list").await.unwrap().unwrap();
    assert_eq!(list.row_id, None);
    assert_eq!(
        positions
            .get_entities_in_position("b1", "list", None, "todo")
            .await
            .unwrap(),
        vec!["e1"]
    );

    assert!(positions.remove_position("e1", "b1", "list").await.unwrap());
    assert!(positions.get_position("e1", "b1", "list").await.unwrap().is_none());
    assert_eq!(positions.remove_positions_for_entity("e1").await.unwrap(), 1);
    assert_eq!(positions.remove_positions_for_entity("e1").await.unwrap(), 0);
}

#[tokio::test]
async fn ids_containing_the_separator_keep_separate_placements() {
    let store = Store::in_memory();
    let positions = store.positions();
    positions
        .set_position("a::b", "c", "board", None, "todo", 0.0)
        .await
        .unwrap();
    positions
        .set_position("a", "b::c", "board", None, "done", 1.0)
        .await
        .unwrap();

    assert_eq!(positions.count().await.unwrap(), 2);
    let first = positions.get_position("a::b", "c", "board").await.unwrap().unwrap();
    assert_eq!((first.entity_id.as_str(), first.board_id.as_str()), ("a::b", "c"));
    assert_eq!(first.column_key, "todo");
    let second = positions.get_position("a", "b::c", "board").await.unwrap().unwrap();
    assert_eq!((second.entity_id.as_str(), second.board_id.as_str()), ("a", "b::c"));
    assert_eq!(second.column_key, "done");
}

#[tokio::test]
async fn reorder_cell_assigns_dense_ranks() {
    let store = Store::in_memory();
    let positions = store.positions();
    for (entity, order) in [("e1", 0.5), ("e2", 1.5), ("e3", 2.5), ("e4", 3.5)] {
        positions
            .set_position(entity, "b1", "board", Some("r1"), "todo", order)
            .await
            .unwrap();
    }
    positions
        .set_position("other", "b1", "board", Some("r2"), "todo", 0.0)
        .await
        .unwrap();

    let ordered = vec!["e3".to_string(), "e1".to_string(), "ghost".to_string()];
    let cell = positions
        .reorder_cell("b1", "board", Some("r1"), "todo", &ordered)
        .await
        .unwrap();
    let ids: Vec<&str> = cell.iter().map(|position| position.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["e3", "e1", "e2", "e4"]);
    let orders: Vec<f64> = cell.iter().map(|position| position.order).collect();
    assert_eq!(orders, vec![0.0, 1.0, 2.0, 3.0]);

    assert_eq!(
        positions
            .get_entities_in_position("b1", "board", Some("r1"), "todo")
            .await
            .unwrap(),
        vec!["e3", "e1", "e2", "e4"]
    );
    let untouched = positions.get_position("other", "b1", "board").await.unwrap().unwrap();
    assert_eq!(untouched.order, 0.0);
}

#[tokio::test]
async fn orphans_are_entities_without_a_placement() {
    let store = Store::in_memory();
    let positions = store.positions();
    positions
        .set_position("e1", "b1", "board", Some("r1"), "todo", 0.0)
        .await
        .unwrap();
    positions
        .set_position("e2", "b1", "week", None, "monday", 0.0)
        .await
        .unwrap();

    let all = vec!["e1".to_string(), "e2".to_string(), "e3".to_string()];
    let orphans = positions
        .get_orphaned_entities(&all, "b1", "board")
        .await
        .unwrap();
    assert_eq!(orphans, vec!["e2", "e3"]);
}

#[tokio::test]
async fn board_structure_is_sorted_and_complete() {
    let store = Store::in_memory();
    seeded_board(&store).await;
    let boards = store.boards();

    let structure = boards.get_board_structure("b1").await.unwrap().unwrap();
    assert_eq!(structure.board.name, "Sprint");
    assert_eq!(structure.groups.len(), 1);
    let rows: Vec<&str> = structure.rows.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(rows, vec!["r1", "r2"]);
    let columns: Vec<&str> = structure.columns.iter().map(|column| column.key.as_str()).collect();
    assert_eq!(columns, vec!["todo", "done"]);

    assert!(boards.get_board_structure("missing").await.unwrap().is_none());
    assert_eq!(boards.get_rows_in_group("g1").await.unwrap().len(), 1);
    assert_eq!(
        boards.get_board_by_name("Sprint").await.unwrap().map(|board| board.id),
        Some("b1".to_string())
    );
    let column = boards.get_column_by_key("b1", "done").await.unwrap().unwrap();
    assert_eq!(column.id, "c2");
    assert!(boards.get_column_by_key("b2", "done").await.unwrap().is_none());
}

#[tokio::test]
async fn rows_must_reference_a_group_of_their_board() {
    let store = Store::in_memory();
    seeded_board(&store).await;
    let boards = store.boards();
    boards.save_board(&Board::new("b2", "Other")).await.unwrap();
    boards.save_group(&Group::new("g2", "b2", "Elsewhere")).await.unwrap();

    let mut stray = Row::new("r3", "b1", "Carol");
    stray.group_id = Some("g2".to_string());
    let err = boards.save_row(&stray).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));

    stray.group_id = Some("nope".to_string());
    let err = boards.save_row(&stray).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));
    assert!(boards.get_row("r3").await.unwrap().is_none());
}

#[tokio::test]
async fn column_keys_are_unique_per_board() {
    let store = Store::in_memory();
    seeded_board(&store).await;
    let boards = store.boards();

    let err = boards
        .save_column(&Column::new("c3", "b1", "todo", "Backlog"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));

    // Same key on another board, and re-saving the owner, are both fine.
    boards
        .save_column(&Column::new("c4", "b2", "todo", "To do"))
        .await
        .unwrap();
    let mut renamed = boards.get_column("c1").await.unwrap().unwrap();
    renamed.name = "Next".to_string();
    boards.save_column(&renamed).await.unwrap();
    assert_eq!(boards.get_columns("b1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn board_delete_leaves_children_for_explicit_cleanup() {
    let store = Store::in_memory();
    seeded_board(&store).await;
    let mut entity = Entity::new("e1", "task", "Ship");
    entity.board_id = Some("b1".to_string());
    store.entities().save(&entity).await.unwrap();
    store
        .positions()
        .set_position("e1", "b1", "board", Some("r1"), "todo", 0.0)
        .await
        .unwrap();

    assert!(store.boards().delete_board("b1").await.unwrap());
    assert!(store.boards().get_board("b1").await.unwrap().is_none());
    assert_eq!(store.boards().get_rows("b1").await.unwrap().len(), 2);
    assert_eq!(store.positions().get_positions_for_board("b1").await.unwrap().len(), 1);
    assert_eq!(store.entities().get_by_board("b1").await.unwrap().len(), 1);
}
