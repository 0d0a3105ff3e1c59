use async_trait::async_trait;
use notifydb::{
    bson::{Bson, Document, doc, oid::ObjectId},
    memory::{InMemoryStore, InMemoryStoreBuilder},
    prelude::*,
};

const MESSAGES: &str = "message";

fn message(actor: i32, created: i64) -> Document {
    doc! {
        "content": format!("message {created}"),
        "actorID": actor,
        "notifyType": 1,
        "seen": false,
        "seenAt": Bson::Null,
        "createdAt": created,
    }
}

fn store_on(backend: &InMemoryStore) -> DocumentStore<InMemoryStoreBuilder> {
    DocumentStore::new(InMemoryStore::builder().with_store(backend.clone()))
}

async fn seed(store: &DocumentStore<InMemoryStoreBuilder>, items: impl IntoIterator<Item = Document>) -> Vec<String> {
    let mut ids = Vec::new();
    for item in items {
        let created = store.add_new_item(MESSAGES, &item).await.unwrap();
        ids.push(created.get_str("_id").unwrap().to_string());
    }
    ids
}

fn created_at(page: &PagedResult<Document>) -> Vec<i64> {
    page.items
        .iter()
        .map(|item| item.get_i64("createdAt").unwrap())
        .collect()
}

#[tokio::test]
async fn insert_then_find_returns_input_with_hex_identifier() {
    let store = DocumentStore::new(InMemoryStore::builder());
    let item = message(1, 1);

    let created = store.add_new_item(MESSAGES, &item).await.unwrap();
    let id = created.get_str("_id").unwrap().to_string();

    assert_eq!(id.len(), 24);
    assert!(!item.contains_key("_id"), "caller document must not be mutated");

    let found = store.find_item_by_id(MESSAGES, id.as_str()).await.unwrap();
    assert_eq!(found, created);

    let mut body = found.clone();
    body.remove("_id");
    assert_eq!(body, item);
}

#[tokio::test]
async fn insert_normalizes_supplied_identifiers() {
    let store = DocumentStore::new(InMemoryStore::builder());
    let id = ObjectId::new();

    let from_hex = store
        .add_new_item(MESSAGES, &doc! { "_id": id.to_hex(), "content": "hex" })
        .await
        .unwrap();
    assert_eq!(from_hex.get_str("_id").unwrap(), id.to_hex());
    assert_eq!(store.find_item_by_id(MESSAGES, id).await.unwrap(), from_hex);

    let generated = store
        .add_new_item(MESSAGES, &doc! { "_id": "", "content": "blank" })
        .await
        .unwrap();
    assert_eq!(generated.get_str("_id").unwrap().len(), 24);

    let invalid = store
        .add_new_item(MESSAGES, &doc! { "_id": "nope", "content": "bad" })
        .await;
    assert!(matches!(invalid, Err(DocumentStoreError::InvalidIdentifierFormat(_))));

    let duplicate = store
        .add_new_item(MESSAGES, &doc! { "_id": id, "content": "again" })
        .await;
    assert!(matches!(duplicate, Err(DocumentStoreError::DocumentAlreadyExists { .. })));
}

#[tokio::test]
async fn delete_then_find_is_not_found() {
    let store = DocumentStore::new(InMemoryStore::builder());
    let ids = seed(&store, [message(1, 1)]).await;

    store.remove_item_by_id(MESSAGES, ids[0].as_str()).await.unwrap();

    assert!(matches!(
        store.find_item_by_id(MESSAGES, ids[0].as_str()).await,
        Err(DocumentStoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.remove_item_by_id(MESSAGES, ids[0].as_str()).await,
        Err(DocumentStoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn identifiers_are_validated_before_lookup() {
    let store = DocumentStore::new(InMemoryStore::builder());

    assert!(matches!(
        store.find_item_by_id(MESSAGES, "not-a-hex-string").await,
        Err(DocumentStoreError::InvalidIdentifierFormat(_))
    ));
    assert!(matches!(
        store.find_item_by_id(MESSAGES, 42).await,
        Err(DocumentStoreError::UnsupportedIdentifierType(_))
    ));
    assert!(matches!(
        store.remove_item_by_id(MESSAGES, ObjectId::new()).await,
        Err(DocumentStoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn update_by_id_replaces_body_and_keeps_identifier() {
    let store = DocumentStore::new(InMemoryStore::builder());
    let ids = seed(&store, [message(1, 1)]).await;

    let update = doc! { "_id": ObjectId::new(), "content": "edited", "seenAt": 5, "createdAt": 1_i64 };
    let before = update.clone();

    store.update_by_id(MESSAGES, ids[0].as_str(), &update).await.unwrap();

    assert_eq!(update, before, "caller update must not be mutated");

    let found = store.find_item_by_id(MESSAGES, ids[0].as_str()).await.unwrap();
    assert_eq!(found.get_str("_id").unwrap(), ids[0]);
    assert_eq!(found.get_str("content").unwrap(), "edited");
    assert!(!found.contains_key("actorID"), "update replaces the whole body");

    assert!(matches!(
        store.update_by_id(MESSAGES, ObjectId::new(), &update).await,
        Err(DocumentStoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn update_by_merges_into_every_match() {
    let store = DocumentStore::new(InMemoryStore::builder());
    let ids = seed(&store, [message(1, 1), message(1, 2), message(2, 3)]).await;

    let update = doc! { "_id": "ignored", "seen": true };
    let before = update.clone();

    let matched = store
        .update_by(MESSAGES, &doc! { "actorID": 1 }, &update)
        .await
        .unwrap();

    assert_eq!(matched, 2);
    assert_eq!(update, before);

    let seen = store
        .get_all_items(MESSAGES, 10, 1, "", "", &doc! { "seen": "true" })
        .await
        .unwrap();
    assert_eq!(seen.pagination.total, 2);

    // merged, not replaced, and identifiers untouched
    for id in &ids[..2] {
        let found = store.find_item_by_id(MESSAGES, id.as_str()).await.unwrap();
        assert_eq!(found.get_str("_id").unwrap(), id);
        assert!(found.get_bool("seen").unwrap());
        assert!(found.contains_key("content"));
    }
}

#[tokio::test]
async fn pages_are_windowed_and_sorted() {
    let store = DocumentStore::new(InMemoryStore::builder());
    seed(&store, (1..=35).map(|n| message(1, n))).await;

    let second = store
        .get_all_items(MESSAGES, 10, 2, "DESC", "createdAt", &doc! {})
        .await
        .unwrap();

    assert_eq!(second.pagination.total, 35);
    assert_eq!(second.pagination.total_page, 4);
    assert_eq!(second.pagination.next_page, Some(3));
    assert_eq!(second.pagination.previous_page, Some(1));
    assert_eq!(second.page_size, 10);
    assert_eq!(created_at(&second), (16..=25).rev().collect::<Vec<_>>());

    let last = store
        .get_all_items(MESSAGES, 10, 4, "asc", "createdAt", &doc! {})
        .await
        .unwrap();

    assert_eq!(last.page_size, 5);
    assert_eq!(created_at(&last), vec![31, 32, 33, 34, 35]);
    assert!(!last.pagination.has_next_page);
    assert_eq!(last.pagination.next_page, None);

    let beyond = store
        .get_all_items(MESSAGES, 10, 5, "asc", "createdAt", &doc! {})
        .await
        .unwrap();
    assert_eq!(beyond.page_size, 0);
    assert!(beyond.items.is_empty());
}

#[tokio::test]
async fn empty_sort_field_keeps_natural_order() {
    let store = DocumentStore::new(InMemoryStore::builder());
    seed(&store, [message(1, 3), message(1, 1), message(1, 2)]).await;

    let page = store
        .get_all_items(MESSAGES, 10, 1, "desc", "", &doc! {})
        .await
        .unwrap();

    assert_eq!(created_at(&page), vec![3, 1, 2]);
}

#[tokio::test]
async fn invalid_page_requests_fail_without_touching_the_store() {
    let backend = InMemoryStore::new();
    let store = store_on(&backend);

    assert!(matches!(
        store.get_all_items(MESSAGES, 0, 1, "", "", &doc! {}).await,
        Err(DocumentStoreError::InvalidPageSize(0))
    ));
    assert!(matches!(
        store.get_all_items(MESSAGES, 10, 0, "", "", &doc! {}).await,
        Err(DocumentStoreError::InvalidPageNumber(0))
    ));
    assert!(!store.is_connecting().await);
}

#[tokio::test]
async fn message_filters_are_coerced_end_to_end() {
    let store = DocumentStore::new(InMemoryStore::builder());
    seed(&store, [message(1, 1), message(2, 2), message(2, 3)]).await;
    store
        .update_by(MESSAGES, &doc! { "createdAt": 3_i64 }, &doc! { "seen": true })
        .await
        .unwrap();

    let page = store
        .get_all_items(MESSAGES, 10, 1, "", "", &doc! { "actorid": "2", "seen": "false" })
        .await
        .unwrap();

    assert_eq!(created_at(&page), vec![2]);
}

#[tokio::test]
async fn messages_missing_required_fields_are_excluded() {
    let store = DocumentStore::new(InMemoryStore::builder());
    seed(&store, [message(1, 1)]).await;
    store
        .add_new_item(MESSAGES, &doc! { "content": "draft", "actorID": 1, "notifyType": 1 })
        .await
        .unwrap();

    let page = store
        .get_all_items(MESSAGES, 10, 1, "", "", &doc! {})
        .await
        .unwrap();

    assert_eq!(page.pagination.total, 1);
}

#[tokio::test]
async fn strict_coercion_rejects_bad_values() {
    let backend = InMemoryStore::new();
    let store = store_on(&backend);
    seed(&store, [message(1, 1)]).await;

    let result = store
        .get_all_items(MESSAGES, 10, 1, "", "", &doc! { "actorid": "abc" })
        .await;

    match result {
        Err(DocumentStoreError::InvalidFilterValue { key, value, .. }) => {
            assert_eq!(key, "actorid");
            assert_eq!(value, "abc");
        }
        other => panic!("expected InvalidFilterValue, got {other:?}"),
    }
    assert_eq!(backend.open_sessions(), 0);
}

#[tokio::test]
async fn lenient_coercion_drops_bad_values() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::with_options(
        InMemoryStore::builder().with_store(backend.clone()),
        StoreOptions::new().with_coercion(CoercionPolicy::Lenient),
    );
    seed(&store, [message(1, 1), message(2, 2)]).await;

    let page = store
        .get_all_items(MESSAGES, 10, 1, "", "", &doc! { "actorid": "abc", "type": "1" })
        .await
        .unwrap();

    assert_eq!(page.pagination.total, 2);
}

#[tokio::test]
async fn filters_follow_the_rules_of_the_named_kind() {
    let store = DocumentStore::new(InMemoryStore::builder());
    for (name, creator) in [("welcome", 3), ("welcome", 4), ("reminder", 3)] {
        store
            .add_new_item(
                "notifyTemplate",
                &doc! { "template": "Hi {{name}}", "nameTemplate": name, "creatorId": creator },
            )
            .await
            .unwrap();
    }

    let page = store
        .get_all_items_by_key(
            "notifyTemplate",
            10,
            1,
            "",
            "",
            &doc! { "name": "welcome", "creatorid": "3" },
            "notifyTemplate",
        )
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 1);

    // an unknown key applies no rules at all
    let raw = store
        .get_all_items_by_key(
            "notifyTemplate",
            10,
            1,
            "",
            "",
            &doc! { "nameTemplate": "welcome" },
            "unknown",
        )
        .await
        .unwrap();
    assert_eq!(raw.pagination.total, 2);
}

#[tokio::test]
async fn unbounded_fetch_keeps_only_bound_device_tokens() {
    let store = DocumentStore::new(InMemoryStore::builder());
    for user in 1..=3 {
        store
            .add_new_item("userdevicetoken", &doc! { "userID": user, "token": format!("t{user}") })
            .await
            .unwrap();
    }
    store
        .add_new_item("userdevicetoken", &doc! { "token": "orphan" })
        .await
        .unwrap();

    let tokens = store
        .get_all_items_no_limit("userdevicetoken", "userdevicetoken")
        .await
        .unwrap();

    assert_eq!(tokens.len(), 3);
    assert!(tokens.iter().all(|t| matches!(t.get("_id"), Some(Bson::String(_)))));
}

#[tokio::test]
async fn unbounded_fetch_lists_every_document_of_other_kinds() {
    let store = DocumentStore::new(InMemoryStore::builder());
    store
        .add_new_item("notifyTemplate", &doc! { "template": "Hi {{name}}", "creatorId": 3 })
        .await
        .unwrap();
    store
        .add_new_item("notifyTemplate", &doc! { "template": "Bye" })
        .await
        .unwrap();
    store.add_new_item(MESSAGES, &doc! { "content": "x" }).await.unwrap();

    let templates = store
        .get_all_items_no_limit("notifyTemplate", "notifyTemplate")
        .await
        .unwrap();
    let messages = store.get_all_items_no_limit(MESSAGES, "message").await.unwrap();

    assert_eq!(templates.len(), 2);
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn paged_results_serialize_for_callers() {
    let store = DocumentStore::new(InMemoryStore::builder());
    seed(&store, [message(1, 1), message(1, 2), message(1, 3)]).await;

    let page = store
        .get_all_items(MESSAGES, 2, 1, "asc", "createdAt", &doc! {})
        .await
        .unwrap();
    let json = page.to_json().unwrap();

    assert_eq!(json["total"], 3);
    assert_eq!(json["pageSize"], 2);
    assert_eq!(json["nextPage"], 2);
    assert!(json.get("previousPage").is_none());
    assert!(json["items"][0]["_id"].is_string());
}

#[tokio::test]
async fn indexes_are_managed_explicitly() {
    let store = DocumentStore::new(InMemoryStore::builder());
    seed(&store, [message(1, 1)]).await;

    store.create_index(MESSAGES, "createdAt", false).await.unwrap();
    store.create_index(MESSAGES, "actorID", false).await.unwrap();
    seed(&store, [message(1, 2)]).await;

    assert_eq!(
        store.list_indexes(MESSAGES).await.unwrap(),
        ["_id_", "actorID_1", "createdAt_1"]
    );

    let dropped = store.drop_indexes(MESSAGES).await.unwrap();

    assert_eq!(dropped, ["actorID_1", "createdAt_1"]);
    assert_eq!(store.list_indexes(MESSAGES).await.unwrap(), ["_id_"]);
}

#[tokio::test]
async fn legacy_flag_drops_indexes_on_insert() {
    let store = DocumentStore::with_options(
        InMemoryStore::builder(),
        StoreOptions::new().with_drop_indexes_on_insert(true),
    );
    store.create_index(MESSAGES, "createdAt", false).await.unwrap();

    seed(&store, [message(1, 1)]).await;

    assert_eq!(store.list_indexes(MESSAGES).await.unwrap(), ["_id_"]);
}

#[tokio::test]
async fn sessions_are_released_on_success_and_failure() {
    let backend = InMemoryStore::new();
    let store = store_on(&backend);
    let ids = seed(&store, [message(1, 1)]).await;

    store.find_item_by_id(MESSAGES, ids[0].as_str()).await.unwrap();
    assert!(store.find_item_by_id(MESSAGES, ObjectId::new()).await.is_err());
    assert!(
        store
            .get_all_items(MESSAGES, 10, 1, "", "", &doc! { "content": { "$regex": "x" } })
            .await
            .is_err()
    );
    store.update_by(MESSAGES, &doc! {}, &doc! { "seen": true }).await.unwrap();
    assert_eq!(backend.open_sessions(), 0);

    let session = store.session().await.unwrap();
    assert_eq!(backend.open_sessions(), 1);
    drop(session);
    assert_eq!(backend.open_sessions(), 0);
}

#[tokio::test]
async fn direct_collection_access_shares_the_executor() {
    let store = DocumentStore::new(InMemoryStore::builder());
    seed(&store, [message(1, 1), message(1, 2)]).await;

    let session = store.session().await.unwrap();
    let messages = Collection::new(MESSAGES, &session);
    let page = messages
        .fetch_page(&doc! {}, PageWindow::new(1, 1).unwrap(), Sort::parse("createdAt", "desc"))
        .await
        .unwrap();

    assert_eq!(messages.name(), MESSAGES);
    assert_eq!(created_at(&page), vec![2]);
    assert_eq!(page.pagination.total_page, 2);
}

#[tokio::test]
async fn connection_is_lazy_and_reopens_after_close() {
    let store = DocumentStore::new(InMemoryStore::builder());

    assert!(!store.is_connecting().await);
    store.close_connection().await.unwrap();

    store.get_connection().await.unwrap();
    assert!(store.is_connecting().await);
    let ids = seed(&store, [message(1, 1)]).await;

    store.close_connection().await.unwrap();
    assert!(!store.is_connecting().await);

    // the next operation reconnects to the same data
    let found = store.find_item_by_id(MESSAGES, ids[0].as_str()).await.unwrap();
    assert_eq!(found.get_str("_id").unwrap(), ids[0]);
    assert!(store.is_connecting().await);
}

struct Unreachable;

#[async_trait]
impl StoreBackendBuilder for Unreachable {
    type Backend = InMemoryStore;

    async fn build(&self) -> DocumentStoreResult<Self::Backend> {
        Err(DocumentStoreError::Connection("connection refused".into()))
    }
}

#[tokio::test]
async fn unreachable_store_reports_connection_errors() {
    let store = DocumentStore::new(Unreachable);

    assert!(matches!(store.get_connection().await, Err(DocumentStoreError::Connection(_))));
    assert!(matches!(
        store.get_all_items(MESSAGES, 10, 1, "", "", &doc! {}).await,
        Err(DocumentStoreError::Connection(_))
    ));
    assert!(!store.is_connecting().await);
}

#[tokio::test]
async fn concurrent_operations_share_one_connection() {
    let backend = InMemoryStore::new();
    let store = store_on(&backend);

    let (first, second, third) = (message(1, 1), message(2, 2), message(3, 3));

    let (a, b, c) = tokio::join!(
        store.add_new_item(MESSAGES, &first),
        store.add_new_item(MESSAGES, &second),
        store.add_new_item(MESSAGES, &third),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(backend.document_count(MESSAGES).await, 3);
    assert_eq!(backend.open_sessions(), 0);
}
