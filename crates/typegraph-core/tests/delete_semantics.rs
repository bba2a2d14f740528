//! Delete-path semantics not covered by the numbered `spec.md` §8 scenarios:
//! silent no-ops on missing targets, uniqueness/embedding cleanup on soft
//! delete, and reinstating a soft-deleted node via `clear_deleted`.

mod common;

use serde_json::json;

use common::{context, person_company_graph};
use typegraph_core::{
    create_node, delete_node, hard_delete_node, update_node_with, Cardinality, Collection,
    CreateNodeInput, DeleteBehavior, UniquenessConstraint,
};

#[tokio::test]
async fn soft_delete_of_missing_node_is_a_silent_no_op() {
    let def = person_company_graph(DeleteBehavior::Restrict, Cardinality::Many, None);
    let ctx = context(def);

    delete_node(&ctx, "Person", "nobody")
        .await
        .expect("deleting an absent node is a no-op, not an error");
}

#[tokio::test]
async fn soft_delete_of_already_deleted_node_is_a_silent_no_op() {
    let def = person_company_graph(DeleteBehavior::Restrict, Cardinality::Many, None);
    let ctx = context(def);

    create_node(
        &ctx,
        "Person",
        json!({"name": "Alice", "email": "a@x"}),
        CreateNodeInput {
            id: Some("alice".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    delete_node(&ctx, "Person", "alice").await.unwrap();

    delete_node(&ctx, "Person", "alice")
        .await
        .expect("deleting an already soft-deleted node is a no-op");
}

#[tokio::test]
async fn hard_delete_of_missing_node_is_a_silent_no_op() {
    let def = person_company_graph(DeleteBehavior::Restrict, Cardinality::Many, None);
    let ctx = context(def);

    hard_delete_node(&ctx, "Person", "nobody")
        .await
        .expect("hard-deleting an absent node is a no-op, not an error");
}

#[tokio::test]
async fn hard_delete_can_purge_an_already_soft_deleted_tombstone() {
    let def = person_company_graph(DeleteBehavior::Restrict, Cardinality::Many, None);
    let ctx = context(def);

    create_node(
        &ctx,
        "Person",
        json!({"name": "Alice", "email": "a@x"}),
        CreateNodeInput {
            id: Some("alice".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    delete_node(&ctx, "Person", "alice").await.unwrap();

    hard_delete_node(&ctx, "Person", "alice")
        .await
        .expect("hard delete purges a soft-deleted row");

    assert!(typegraph_core::get_node(&ctx, "Person", "alice").await.unwrap().is_none());
}

#[tokio::test]
async fn soft_delete_frees_the_uniqueness_slot_for_reuse() {
    let constraint = UniquenessConstraint::new("email", vec!["email".to_string()]);
    let def = person_company_graph(DeleteBehavior::Restrict, Cardinality::Many, Some(constraint));
    let ctx = context(def);
    let people = Collection::new(&ctx, "Person");

    people
        .create(json!({"name": "Alice", "email": "a@x"}), CreateNodeInput {
            id: Some("alice".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    people.delete("alice").await.unwrap();

    // A new node can now take the same email, since the old uniqueness row
    // was removed along with the soft delete.
    people
        .create(json!({"name": "Alice Again", "email": "a@x"}), CreateNodeInput {
            id: Some("alice-2".to_string()),
            ..Default::default()
        })
        .await
        .expect("freed uniqueness slot accepts a new occupant");
}

#[tokio::test]
async fn update_with_clear_deleted_reinstates_a_soft_deleted_node() {
    let def = person_company_graph(DeleteBehavior::Restrict, Cardinality::Many, None);
    let ctx = context(def);

    create_node(
        &ctx,
        "Person",
        json!({"name": "Alice", "email": "a@x"}),
        CreateNodeInput {
            id: Some("alice".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    delete_node(&ctx, "Person", "alice").await.unwrap();

    let err = typegraph_core::update_node(&ctx, "Person", "alice", json!({"name": "Alicia"}))
        .await
        .expect_err("plain update on a soft-deleted node fails");
    assert_eq!(err.kind(), typegraph_core::error::ErrorKind::NodeNotFound);

    let reinstated = update_node_with(&ctx, "Person", "alice", json!({"name": "Alicia"}), true)
        .await
        .expect("update with clear_deleted reinstates the node");
    assert!(reinstated.is_live());
    assert_eq!(reinstated.props["name"], "Alicia");
}
