use std::collections::BTreeSet;

use firlog::{EngineConfig, Result, SearchRequest, TenantRegistry, TimeRange};
use tempfile::tempdir;
use test_log::test;

const HELLO: &str = "1 <1>1 2020-01-01T00:00:00Z host1 app1 web.1 - hello world";

fn registry(dir: &std::path::Path) -> Result<TenantRegistry> {
    TenantRegistry::open(
        EngineConfig::new()
            .with_data_dir(dir)
            .with_token_list("token-a,token-b"),
    )
}

fn first_day() -> TimeRange {
    TimeRange::parse_rfc3339("2020-01-01T00:00:00Z", "2020-01-01T23:59:59Z").unwrap()
}

#[test]
fn hello_world_round_trip() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;

    let report = registry.ingest("token-a", HELLO)?;
    assert_eq!(report.accepted, 1);
    assert_eq!(report.shards_touched, 1);

    let results = registry.search("token-a", &SearchRequest::new("msg:hello", first_day()))?;
    assert_eq!(results.len(), 1);

    let record = &results.records[0];
    assert_eq!(record.fields["msg"], "hello world");
    assert_eq!(record.fields["host"], "host1");
    assert_eq!(record.fields["time"], "2020-01-01T00:00:00Z");

    let view = record.view()?;
    assert_eq!(view.time, "2020/01/01 00:00:00");
    assert_eq!(view.message, "hello world");
    assert_eq!(view.data, r#"{"app":"app1","host":"host1","process":"web.1"}"#);

    Ok(())
}

#[test]
fn json_fields_survive_round_trip() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;

    let line = r#"1 <1>1 2020-01-01T10:30:00.123456Z host1 app1 web.1 - {"msg":"disk full","level":"error","disk":{"free":0,"mounts":["/","/var"]}}"#;
    registry.ingest("token-a", line)?;

    let results = registry.search("token-a", &SearchRequest::new("level:error AND msg:disk", first_day()))?;
    assert_eq!(results.len(), 1);

    let record = &results.records[0];
    assert_eq!(record.timestamp.to_rfc3339(), "2020-01-01T10:30:00.123456+00:00");
    assert_eq!(record.formatted_message(), "error disk full");
    assert_eq!(
        record.formatted_data()?,
        r#"{"app":"app1","disk":{"free":0,"mounts":["/","/var"]},"host":"host1","process":"web.1"}"#
    );

    Ok(())
}

#[test]
fn two_days_make_two_shards() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;

    registry.ingest("token-a", HELLO)?;
    registry.ingest("token-a", &HELLO.replace("2020-01-01", "2020-01-02"))?;

    let stats = registry.stats()?;
    let days: Vec<&String> = stats["token-a"].keys().collect();
    assert_eq!(days, vec!["20200101", "20200102"]);
    assert!(stats["token-a"].values().all(|s| s.doc_count == 1));

    assert!(temp_dir.path().join("token-a").join("20200101_1.shard").is_dir());
    assert!(temp_dir.path().join("token-a").join("20200102_1.shard").is_dir());

    Ok(())
}

#[test]
fn trailing_newline_only_payload_is_a_no_op() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;

    let report = registry.ingest("token-a", "\n")?;
    assert_eq!(report.accepted, 0);
    assert_eq!(report.rejected, 0);
    assert!(registry.stats()?["token-a"].is_empty());

    Ok(())
}

#[test]
fn results_are_newest_first_and_limited() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;

    let payload: String = (0..5)
        .map(|i| format!("1 <1>1 2020-01-01T0{}:00:00Z h a p - event {}\n", i, i))
        .collect();
    registry.ingest("token-a", &payload)?;

    let results = registry.search("token-a", &SearchRequest::new("msg:event", first_day()).with_limit(3))?;
    let messages: Vec<&str> = results
        .records
        .iter()
        .map(|r| r.fields["msg"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["event 4", "event 3", "event 2"]);

    let narrow = TimeRange::parse_rfc3339("2020-01-01T01:00:00Z", "2020-01-01T02:00:00Z")?;
    let results = registry.search("token-a", &SearchRequest::new("", narrow))?;
    assert_eq!(results.len(), 2);

    Ok(())
}

#[test]
fn tenants_are_isolated() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;

    registry.ingest("token-a", HELLO)?;
    let results = registry.search("token-b", &SearchRequest::new("msg:hello", first_day()))?;
    assert!(results.is_empty());

    Ok(())
}

#[test]
fn data_is_searchable_after_restart() -> Result<()> {
    let temp_dir = tempdir()?;
    let ids: BTreeSet<String> = {
        let registry = registry(temp_dir.path())?;
        registry.ingest("token-a", HELLO)?;
        registry
            .search("token-a", &SearchRequest::new("", first_day()))?
            .records
            .into_iter()
            .map(|r| r.id)
            .collect()
    };

    let registry = registry(temp_dir.path())?;
    assert_eq!(registry.stats()?["token-a"].len(), 1);

    let results = registry.search("token-a", &SearchRequest::new("msg:hello", first_day()))?;
    let reopened: BTreeSet<String> = results.records.into_iter().map(|r| r.id).collect();
    assert_eq!(reopened, ids);
    assert_eq!(registry.metrics().shards_opened, 1);

    Ok(())
}

#[test]
fn unknown_field_is_a_query_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;
    registry.ingest("token-a", HELLO)?;

    let err = registry
        .search("token-a", &SearchRequest::new("host:host1", first_day()))
        .unwrap_err();
    assert!(err.is_query_error());

    Ok(())
}

#[test]
fn sub_second_upper_bound_still_fills_the_limit() -> Result<()> {
    let temp_dir = tempdir()?;
    let registry = registry(temp_dir.path())?;

    let payload = "1 <1>1 2020-01-01T12:00:03Z h a p - inrange\n\
                   1 <1>1 2020-01-01T12:00:04.500Z h a p - outofrange\n";
    registry.ingest("token-a", payload)?;

    let range = TimeRange::parse_rfc3339("2020-01-01T00:00:00Z", "2020-01-01T12:00:04.200Z")?;
    let results = registry.search("token-a", &SearchRequest::new("", range).with_limit(1))?;
    let messages: Vec<&str> = results
        .records
        .iter()
        .map(|r| r.fields["msg"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["inrange"]);

    Ok(())
}
