mod common;

use common::{listings, test_config, ScriptedPage};
use map_harvest::core::export::{columns, parse_delimited};
use map_harvest::domain::model::Termination;
use map_harvest::{LocalStorage, RunRequest, ScrapeEngine, ScraperConfig, TableExporter};
use std::io::Read;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn engine(config: ScraperConfig) -> ScrapeEngine<TableExporter<LocalStorage>> {
    let storage = LocalStorage::new(&config.output.directory);
    let exporter = TableExporter::from_config(storage, &config.output).unwrap();
    ScrapeEngine::new(config, exporter)
}

fn worksheet_xml(path: &std::path::Path) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path)?)?;
    let mut xml = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")?
        .read_to_string(&mut xml)?;
    Ok(xml)
}

fn request(queries: &[&str]) -> RunRequest {
    RunRequest::new(queries.iter().map(|q| q.to_string()).collect())
}

#[tokio::test]
async fn test_end_to_end_query_writes_csv_and_xlsx() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();
    let engine = engine(test_config(&output));

    let mut page = ScriptedPage::new(&[2, 4, 4], listings(&["Alpha", "Bravo", "Charlie", "Delta"]));
    let summary = engine
        .run(&mut page, &request(&["coffee in Lisbon"]), &CancellationToken::new())
        .await?;

    assert_eq!(summary.total_records(), 4);
    let report = &summary.queries[0];
    assert_eq!(report.discovered, 4);
    assert_eq!(report.termination, Some(Termination::Exhausted));
    assert_eq!(
        report.outputs,
        vec!["coffee_in_Lisbon.csv".to_string(), "coffee_in_Lisbon.xlsx".to_string()]
    );

    let csv_data = std::fs::read(temp_dir.path().join("coffee_in_Lisbon.csv"))?;
    let records = parse_delimited(&csv_data, b',')?;
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Bravo", "Charlie", "Delta"]);

    let sheet = worksheet_xml(&temp_dir.path().join("coffee_in_Lisbon.xlsx"))?;
    assert!(sheet.contains(r#"<row r="5""#));
    assert!(!sheet.contains(r#"<row r="6""#));
    Ok(())
}

#[tokio::test]
async fn test_result_target_truncates_listings() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = engine(test_config(temp_dir.path().to_str().unwrap()));

    let mut page = ScriptedPage::new(&[3, 6], listings(&["A", "B", "C", "D", "E", "F"]));
    let summary = engine
        .run(
            &mut page,
            &request(&["pizza"]).with_max_results(Some(2)),
            &CancellationToken::new(),
        )
        .await?;

    let report = &summary.queries[0];
    assert_eq!(report.records, 2);
    assert_eq!(report.termination, Some(Termination::ReachedTarget));
    Ok(())
}

#[tokio::test]
async fn test_rerun_overwrites_instead_of_appending() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = engine(test_config(temp_dir.path().to_str().unwrap()));
    let path = temp_dir.path().join("bakery.csv");

    let mut page = ScriptedPage::new(&[3], listings(&["A", "B", "C"]));
    engine.run(&mut page, &request(&["bakery"]), &CancellationToken::new()).await?;
    let first = std::fs::read(&path)?;

    engine.run(&mut page, &request(&["bakery"]), &CancellationToken::new()).await?;
    let second = std::fs::read(&path)?;

    assert_eq!(first, second);
    assert_eq!(parse_delimited(&second, b',')?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_empty_results_write_header_only() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = engine(test_config(temp_dir.path().to_str().unwrap()));

    let mut page = ScriptedPage::new(&[0], Vec::new());
    let summary = engine
        .run(&mut page, &request(&["nothing here"]), &CancellationToken::new())
        .await?;

    assert_eq!(summary.total_records(), 0);
    let content = std::fs::read_to_string(temp_dir.path().join("nothing_here.csv"))?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec![columns().join(",")]);

    let sheet = worksheet_xml(&temp_dir.path().join("nothing_here.xlsx"))?;
    assert!(sheet.contains(r#"<row r="1""#));
    assert!(!sheet.contains(r#"<row r="2""#));
    Ok(())
}

#[tokio::test]
async fn test_failed_search_does_not_stop_later_queries() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = engine(test_config(temp_dir.path().to_str().unwrap()));

    let mut page = ScriptedPage::new(&[2], listings(&["A", "B"])).with_failing_search("broken");
    let searches = page.searches.clone();
    let summary = engine
        .run(&mut page, &request(&["broken", "bars"]), &CancellationToken::new())
        .await?;

    assert_eq!(*searches.lock().unwrap(), vec!["broken", "bars"]);
    assert!(summary.queries[0].error.is_some());
    assert!(summary.queries[0].outputs.is_empty());
    assert!(!temp_dir.path().join("broken.csv").exists());

    assert!(summary.queries[1].error.is_none());
    assert_eq!(summary.queries[1].records, 2);
    assert!(temp_dir.path().join("bars.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_json_and_zip_bundle() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = test_config(temp_dir.path().to_str().unwrap());
    config.output.formats = vec!["csv".to_string(), "json".to_string()];
    config.output.bundle_zip = true;
    let engine = engine(config);

    let mut page = ScriptedPage::new(&[2], listings(&["A", "B"]));
    let summary = engine
        .run(&mut page, &request(&["tea rooms"]), &CancellationToken::new())
        .await?;
    assert_eq!(
        summary.queries[0].outputs,
        vec!["tea_rooms.csv", "tea_rooms.json", "tea_rooms.zip"]
    );

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(temp_dir.path().join("tea_rooms.json"))?)?;
    assert_eq!(json.as_array().map(Vec::len), Some(2));
    assert_eq!(json[0]["name"], "A");

    let zip_data = std::fs::read(temp_dir.path().join("tea_rooms.zip"))?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data))?;
    assert_eq!(archive.len(), 2);

    let mut csv_file = archive.by_name("tea_rooms.csv")?;
    let mut csv_content = String::new();
    csv_file.read_to_string(&mut csv_content)?;
    assert!(csv_content.starts_with("name,address,website"));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_run_stops_between_queries() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path().to_str().unwrap());
    config.timing.inter_query_delay_ms = 60_000;
    let engine = engine(config);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let mut page = ScriptedPage::new(&[1], listings(&["A"]));
    let result = engine.run(&mut page, &request(&["first", "second"]), &cancel).await;

    assert!(matches!(result, Err(map_harvest::ScrapeError::Cancelled)));
    assert!(temp_dir.path().join("first.csv").exists());
    assert!(!temp_dir.path().join("second.csv").exists());
}
