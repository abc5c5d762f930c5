use assert_cmd::Command;
use predicates::prelude::*;

fn hot_media() -> Command {
    let mut cmd = Command::cargo_bin("hot-media").expect("binary built");
    cmd.env_remove("REDDIT_CLIENT_ID")
        .env_remove("REDDIT_CLIENT_SECRET")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn prints_version() {
    hot_media()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    hot_media()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--limit"))
        .stdout(predicate::str::contains("COMMUNITY_URL"));
}

#[test]
fn rejects_url_without_community() {
    hot_media()
        .arg("https://www.reddit.com/user/someone")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a community url"));
}

#[test]
fn rejects_out_of_range_limit() {
    hot_media()
        .args(["--limit", "0", "https://www.reddit.com/r/pics"])
        .assert()
        .failure();
}

#[test]
fn reports_missing_credentials() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "reddit:\n  client_id: \"\"\n").expect("write config");
    hot_media()
        .args(["--config", config.to_str().expect("utf8 path")])
        .arg("https://www.reddit.com/r/pics")
        .env_remove("HOT_MEDIA_REDDIT__CLIENT_ID")
        .env_remove("HOT_MEDIA_REDDIT__CLIENT_SECRET")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}
