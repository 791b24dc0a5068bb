use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use futures::future::join_all;
use rocket::http::{Header, Status};
use rocket::local::asynchronous::Client;
use shared::{CreatePollRequest, ErrorResponse, Poll, VoteReceipt, VoteRequest, USER_ID_HEADER};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use crate::config::{AppConfig, ConfigError};
use crate::error::{ApiError, PollError};
use crate::polls::PollStore;
use crate::queries::create_table_sql;
use crate::rate_limiter::RateLimiter;
use crate::routes::{build_rocket, AppState};
use crate::utils::check_options_for_profanity;
use crate::store::MemoryPollTable;
use crate::table::{PollRecord, PollTable, TableError};

fn options(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn memory_store() -> (Arc<MemoryPollTable>, PollStore) {
    let table = Arc::new(MemoryPollTable::new());
    (table.clone(), PollStore::new(table))
}

async fn created_poll(store: &PollStore, owner: &str, names: &[&str]) -> Poll {
    let poll = Poll::new(owner, &options(names)).unwrap();
    store.create(&poll).await.unwrap();
    poll
}

struct BrokenTable;

#[async_trait]
impl PollTable for BrokenTable {
    async fn put_item(&self, _record: &PollRecord) -> Result<(), TableError> {
        Err(TableError::Unavailable("connection refused".into()))
    }

    async fn delete_item(&self, _id: Uuid) -> Result<(), TableError> {
        Err(TableError::Unavailable("connection refused".into()))
    }

    async fn get_item(&self, _id: Uuid) -> Result<Option<PollRecord>, TableError> {
        Err(TableError::Unavailable("connection refused".into()))
    }

    async fn update_vote(&self, _id: Uuid, _voter: &str, _option: &str) -> Result<(), TableError> {
        Err(TableError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_create_then_load() {
    let (_, store) = memory_store();
    let poll = created_poll(&store, "alice", &["x", "y"]).await;

    let loaded = store.load(poll.id).await.unwrap();
    assert_eq!(loaded.id, poll.id);
    assert_eq!(loaded.owner, "alice");
    assert_eq!(loaded.votes, 0);
    assert!(loaded.voters.is_empty());
    assert_eq!(loaded.options.get("x"), Some(&0));
    assert_eq!(loaded.options.get("y"), Some(&0));
}

#[tokio::test]
async fn test_create_overwrites_existing_item() {
    let (table, store) = memory_store();
    let mut poll = created_poll(&store, "alice", &["x"]).await;
    store.vote(poll.id, "u1", "x").await.unwrap();

    poll.owner = "bob".into();
    store.create(&poll).await.unwrap();

    let loaded = store.load(poll.id).await.unwrap();
    assert_eq!(loaded.owner, "bob");
    assert_eq!(loaded.votes, 0);
    assert_eq!(table.len().unwrap(), 1);
}

#[tokio::test]
async fn test_second_vote_by_same_user_is_rejected() {
    let (_, store) = memory_store();
    let poll = created_poll(&store, "alice", &["a", "b"]).await;

    store.vote(poll.id, "u1", "a").await.unwrap();
    let second = store.vote(poll.id, "u1", "b").await;
    assert!(matches!(second, Err(PollError::AlreadyVoted)));

    let loaded = store.load(poll.id).await.unwrap();
    assert_eq!(loaded.votes, 1);
    assert_eq!(loaded.options.get("a"), Some(&1));
    assert_eq!(loaded.options.get("b"), Some(&0));
    assert_eq!(loaded.voters.iter().collect::<Vec<_>>(), vec!["u1"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_by_one_user() {
    let (_, store) = memory_store();
    let poll = created_poll(&store, "alice", &["a", "b"]).await;
    let poll_id = poll.id;

    let handles = (0..32).map(|i| {
        let store = store.clone();
        let option = if i % 2 == 0 { "a" } else { "b" };
        tokio::spawn(async move { store.vote(poll_id, "u1", option).await })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results.iter().filter(|r| matches!(r, Err(PollError::AlreadyVoted))).count(),
        31
    );

    let loaded = store.load(poll.id).await.unwrap();
    assert_eq!(loaded.votes, 1);
    assert!(loaded.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tallies_stay_consistent_across_many_voters() {
    let (_, store) = memory_store();
    let poll = created_poll(&store, "alice", &["a", "b", "c"]).await;
    let poll_id = poll.id;

    let votes = (0..60).map(|i| {
        let store = store.clone();
        let option = ["a", "b", "c"][i % 3];
        // every user votes twice; only the first attempt may land
        let user = format!("user-{}", i / 2);
        async move { store.vote(poll_id, &user, option).await }
    });
    let results = join_all(votes).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 30);

    let loaded = store.load(poll.id).await.unwrap();
    assert_eq!(loaded.votes, 30);
    assert_eq!(loaded.voters.len(), 30);
    assert_eq!(loaded.options.values().sum::<u64>(), 30);
    assert!(loaded.is_consistent());
}

#[tokio::test]
async fn test_remove_then_load_is_not_found() {
    let (table, store) = memory_store();
    let poll = created_poll(&store, "alice", &["x"]).await;
    store.vote(poll.id, "u1", "x").await.unwrap();

    store.remove(poll.id).await.unwrap();
    assert!(table.is_empty().unwrap());
    assert!(matches!(store.load(poll.id).await, Err(PollError::NotFound)));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let (_, store) = memory_store();
    let poll = created_poll(&store, "alice", &["x"]).await;

    store.remove(poll.id).await.unwrap();
    store.remove(poll.id).await.unwrap();
    store.remove(Uuid::now_v7()).await.unwrap();
}

#[tokio::test]
async fn test_vote_for_unknown_option_changes_nothing() {
    let (_, store) = memory_store();
    let poll = created_poll(&store, "alice", &["a", "b"]).await;

    let result = store.vote(poll.id, "u1", "c").await;
    assert!(matches!(result, Err(PollError::UnknownOption(o)) if o == "c"));

    let loaded = store.load(poll.id).await.unwrap();
    assert_eq!(loaded, poll);

    // the rejected attempt did not consume the user's vote
    store.vote(poll.id, "u1", "a").await.unwrap();
}

#[tokio::test]
async fn test_vote_on_missing_poll() {
    let (table, store) = memory_store();
    let result = store.vote(Uuid::now_v7(), "u1", "a").await;
    assert!(matches!(result, Err(PollError::NotFound)));
    assert!(table.is_empty().unwrap());
}

#[tokio::test]
async fn test_vote_requires_user_id() {
    let (_, store) = memory_store();
    let poll = created_poll(&store, "alice", &["a"]).await;
    assert!(matches!(store.vote(poll.id, " ", "a").await, Err(PollError::Invalid(_))));
}

#[tokio::test]
async fn test_malformed_item_fails_to_decode() {
    let (table, store) = memory_store();
    let id = Uuid::now_v7();
    table
        .put_item(&PollRecord {
            id,
            user: "alice".into(),
            votes: -1,
            voters: Vec::new(),
            options: HashMap::from([("x".to_string(), 0)]),
        })
        .await
        .unwrap();

    let err = store.load(id).await.unwrap_err();
    assert!(matches!(err, PollError::Decode(_)));
    assert!(err.to_string().starts_with("unmarshaling item"));
}

#[tokio::test]
async fn test_store_failures_carry_their_step() {
    let store = PollStore::new(Arc::new(BrokenTable));
    let poll = Poll::new("alice", &options(&["x"])).unwrap();

    let err = store.create(&poll).await.unwrap_err();
    assert!(matches!(err, PollError::StoreWrite { context: "putting item", .. }));

    let err = store.remove(poll.id).await.unwrap_err();
    assert!(matches!(err, PollError::StoreWrite { context: "deleting item", .. }));

    let err = store.load(poll.id).await.unwrap_err();
    assert!(matches!(err, PollError::StoreRead { context: "getting item", .. }));
    assert_eq!(err.to_string(), "getting item: store unavailable: connection refused");

    let err = store.vote(poll.id, "u1", "x").await.unwrap_err();
    assert!(matches!(err, PollError::StoreWrite { context: "updating item", .. }));
}

#[test]
fn test_poll_errors_map_to_api_errors() {
    assert_eq!(ApiError::from(PollError::AlreadyVoted).status(), Status::Forbidden);
    assert_eq!(ApiError::from(PollError::NotFound).status(), Status::NotFound);
    assert_eq!(ApiError::from(PollError::UnknownOption("c".into())).status(), Status::BadRequest);
    assert_eq!(ApiError::from(PollError::Decode("bad".into())).status(), Status::InternalServerError);
}

#[test]
fn test_rate_limiter_window() {
    let limiter = RateLimiter::new(2, 10);
    let start = OffsetDateTime::now_utc();

    assert!(limiter.check_at("k", start).is_ok());
    assert!(limiter.check_at("k", start + Duration::minutes(1)).is_ok());
    assert!(limiter.check_at("k", start + Duration::minutes(2)).is_err());
    assert!(limiter.check_at("other", start + Duration::minutes(2)).is_ok());
    assert!(limiter.check_at("k", start + Duration::minutes(11)).is_ok());
}

#[test]
fn test_config_from_lookup() {
    let config = AppConfig::from_lookup(|_| None).unwrap();
    assert_eq!(config, AppConfig::default());

    let config = AppConfig::from_lookup(|key| match key {
        "POLLS_TABLE" => Some("polls_staging".into()),
        "CREATE_POLL_LIMIT" => Some("2".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.table, "polls_staging");
    assert_eq!(config.create_poll_limit, 2);
    assert_eq!(config.create_poll_window_minutes, 60);

    assert!(matches!(
        AppConfig::from_lookup(|key| (key == "POLLS_TABLE").then(|| "polls; DROP TABLE x".to_string())),
        Err(ConfigError::InvalidTableName(_))
    ));
    assert!(matches!(
        AppConfig::from_lookup(|key| (key == "CREATE_POLL_LIMIT").then(|| "0".to_string())),
        Err(ConfigError::InvalidValue { key: "CREATE_POLL_LIMIT", .. })
    ));
}

async fn client_with(config: AppConfig) -> Client {
    let state = AppState::new(Arc::new(MemoryPollTable::new()), &config);
    Client::tracked(build_rocket(state)).await.unwrap()
}

async fn create_via_api(client: &Client, user: &str, names: &[&str]) -> Poll {
    let response = client
        .post("/api/polls")
        .header(Header::new(USER_ID_HEADER, user.to_string()))
        .json(&CreatePollRequest { options: options(names) })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    response.into_json::<Poll>().await.unwrap()
}

#[rocket::async_test]
async fn test_api_poll_lifecycle() {
    let client = client_with(AppConfig::default()).await;
    let poll = create_via_api(&client, "alice", &["pizza", "tacos"]).await;
    assert_eq!(poll.owner, "alice");

    let response = client
        .post(format!("/api/polls/{}/votes", poll.id))
        .header(Header::new(USER_ID_HEADER, "bob"))
        .json(&VoteRequest { option: "tacos".into() })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let receipt = response.into_json::<VoteReceipt>().await.unwrap();
    assert_eq!(receipt.user, "bob");
    assert_eq!(receipt.poll_id, poll.id);

    let response = client
        .post(format!("/api/polls/{}/votes", poll.id))
        .header(Header::new(USER_ID_HEADER, "bob"))
        .json(&VoteRequest { option: "pizza".into() })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let body = response.into_json::<ErrorResponse>().await.unwrap();
    assert_eq!(body.status, 403);

    let loaded = client
        .get(format!("/api/polls/{}", poll.id))
        .dispatch()
        .await
        .into_json::<Poll>()
        .await
        .unwrap();
    assert_eq!(loaded.votes, 1);
    assert_eq!(loaded.options.get("tacos"), Some(&1));

    let response = client
        .delete(format!("/api/polls/{}", poll.id))
        .header(Header::new(USER_ID_HEADER, "bob"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .delete(format!("/api/polls/{}", poll.id))
        .header(Header::new(USER_ID_HEADER, "alice"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NoContent);

    let response = client.get(format!("/api/polls/{}", poll.id)).dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}

#[rocket::async_test]
async fn test_api_rejects_bad_input() {
    let client = client_with(AppConfig::default()).await;

    let response = client.get("/api/polls/not-a-uuid").dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .post("/api/polls")
        .header(Header::new(USER_ID_HEADER, "alice"))
        .json(&CreatePollRequest { options: Vec::new() })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let poll = create_via_api(&client, "alice", &["pizza", "tacos"]).await;
    let response = client
        .post(format!("/api/polls/{}/votes", poll.id))
        .header(Header::new(USER_ID_HEADER, "bob"))
        .json(&VoteRequest { option: "sushi".into() })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn test_api_rate_limits_poll_creation() {
    let config = AppConfig { create_poll_limit: 1, ..AppConfig::default() };
    let client = client_with(config).await;

    create_via_api(&client, "alice", &["pizza"]).await;

    let response = client
        .post("/api/polls")
        .header(Header::new(USER_ID_HEADER, "alice"))
        .json(&CreatePollRequest { options: options(&["tacos"]) })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::TooManyRequests);
    let body = response.into_json::<ErrorResponse>().await.unwrap();
    assert_eq!(body.status, 429);
    assert!(body.error.starts_with("Rate limit exceeded"));

    create_via_api(&client, "bob", &["tacos"]).await;
}

#[test]
fn test_create_table_sql_targets_configured_table() {
    let sql = create_table_sql("polls_staging");
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS polls_staging ("));
    assert!(sql.contains("voters TEXT[] NOT NULL DEFAULT '{}'"));
    assert!(sql.contains("options JSONB NOT NULL DEFAULT '{}'::jsonb"));
}

#[test]
fn test_profanity_check() {
    assert!(check_options_for_profanity(&options(&["pizza", "tacos"])).is_ok());
    assert!(check_options_for_profanity(&options(&["fuck", "tacos"])).is_err());
    assert!(check_options_for_profanity(&options(&["pizza fu", "ck tacos"])).is_err());
}

#[rocket::async_test]
async fn test_api_rejects_profane_options() {
    let client = client_with(AppConfig::default()).await;

    let response = client
        .post("/api/polls")
        .header(Header::new(USER_ID_HEADER, "alice"))
        .json(&CreatePollRequest { options: options(&["fuck", "tacos"]) })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body = response.into_json::<ErrorResponse>().await.unwrap();
    assert_eq!(body.status, 400);
    assert!(body.error.contains("profanity"));

    let response = client
        .post("/api/polls")
        .header(Header::new(USER_ID_HEADER, "alice"))
        .json(&CreatePollRequest { options: options(&["pizza fu", "ck tacos"]) })
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body = response.into_json::<ErrorResponse>().await.unwrap();
    assert_eq!(body.status, 400);
    assert!(!body.error.is_empty());
}

#[rocket::async_test]
async fn test_api_malformed_body_gets_json_error() {
    let client = client_with(AppConfig::default()).await;

    let response = client
        .post("/api/polls")
        .header(Header::new(USER_ID_HEADER, "alice"))
        .header(rocket::http::ContentType::JSON)
        .body(r#"{"options": "pizza"}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body = response.into_json::<ErrorResponse>().await.unwrap();
    assert_eq!(body, ErrorResponse::new(422, "Malformed request body."));
}
