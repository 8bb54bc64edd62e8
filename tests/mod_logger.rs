use tempfile::tempdir;

#[test]
fn configure_logging_creates_the_rolling_log() {
    let dir = tempdir().unwrap();
    mquery::logger::configure_logging(Some(dir.path()), Some("debug"), Some(2));
    log::info!("logger smoke test");
    assert!(dir.path().join("mquery.log").exists());
}
