//! End-to-end harvest runs against a mock WMS server and an on-disk archive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use wmsharvest::coord::TileRange;
use wmsharvest::fetch::{AsyncHttpClient, BackoffPolicy, HttpResponse, TileFetcher, TransportError};
use wmsharvest::harvest::{plan, HarvestConfig, Harvester, NoopProgress};
use wmsharvest::store::{ArchiveMetadata, TileStore};
use wmsharvest::wms::{Credential, WmsConfig};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Mock WMS server.
///
/// Answers the first `reject_first` requests with HTTP 404 and everything
/// after with a PNG. Cancels `cancel_after` once that many requests arrived.
#[derive(Default)]
struct MockWms {
    calls: AtomicUsize,
    reject_first: usize,
    cancel_after: Option<(usize, CancellationToken)>,
    urls: Mutex<Vec<String>>,
}

impl MockWms {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AsyncHttpClient for MockWms {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.urls.lock().unwrap().push(url.to_string());

        if let Some((limit, token)) = &self.cancel_after {
            if n >= *limit {
                token.cancel();
            }
        }

        if n <= self.reject_first {
            Ok(HttpResponse::new(404, Vec::new()))
        } else {
            Ok(HttpResponse::new(200, PNG.to_vec()))
        }
    }
}

fn harvester(client: MockWms, config: HarvestConfig) -> Harvester<MockWms> {
    let fetcher = TileFetcher::new(
        client,
        WmsConfig::default(),
        Credential::new("integration-key"),
        BackoffPolicy::new(1),
    );
    Harvester::new(fetcher, config).unwrap()
}

fn config() -> HarvestConfig {
    HarvestConfig::new().with_zoom_range(0, 3).with_concurrency(1)
}

fn expected_tiles(config: &HarvestConfig) -> u64 {
    config
        .zooms()
        .map(|z| TileRange::covering(&config.tiers.bounds_for(z), z).len())
        .sum()
}

fn open(path: &std::path::Path, config: &HarvestConfig) -> TileStore {
    let metadata = ArchiveMetadata::for_run(config.min_zoom, config.max_zoom, &config.tiers);
    TileStore::open(path, &metadata).unwrap()
}

#[tokio::test]
async fn rerun_of_complete_archive_fetches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nz.mbtiles");
    let config = config();
    let expected = expected_tiles(&config);

    let mut store = open(&path, &config);
    let first = harvester(MockWms::default(), config.clone());
    let summary = first
        .run(&mut store, &mut NoopProgress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.downloaded, expected);
    assert_eq!(first.fetcher().client().calls() as u64, expected);
    let counts_before = store.tile_counts_by_zoom().unwrap();
    store.close().unwrap();

    let mut store = open(&path, &config);
    assert!(store.is_resumed());
    let second = harvester(MockWms::default(), config.clone());
    let summary = second
        .run(&mut store, &mut NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.fetcher().client().calls(), 0);
    assert_eq!(summary.downloaded, 0);
    assert_eq!(summary.existing, expected);
    assert_eq!(store.tile_counts_by_zoom().unwrap(), counts_before);
}

#[tokio::test]
async fn interrupted_run_resumes_without_refetching() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nz.mbtiles");
    let config = config();
    let expected = expected_tiles(&config);

    let cancel = CancellationToken::new();
    let client = MockWms {
        cancel_after: Some((2, cancel.clone())),
        ..MockWms::default()
    };
    let mut store = open(&path, &config);
    let first = harvester(client, config.clone());
    let summary = first.run(&mut store, &mut NoopProgress, &cancel).await.unwrap();

    assert!(summary.interrupted);
    let stored = store.tile_count_total().unwrap();
    assert_eq!(stored, summary.downloaded);
    assert!(stored > 0 && stored < expected);
    drop(store);

    let mut store = open(&path, &config);
    let second = harvester(MockWms::default(), config.clone());
    let summary = second
        .run(&mut store, &mut NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(second.fetcher().client().calls() as u64, expected - stored);
    assert_eq!(store.tile_count_total().unwrap(), expected);
}

#[tokio::test]
async fn failed_tiles_stay_missing_until_next_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nz.mbtiles");
    let config = config();
    let expected = expected_tiles(&config);

    let mut store = open(&path, &config);
    let client = MockWms {
        reject_first: 2,
        ..MockWms::default()
    };
    let first = harvester(client, config.clone());
    let summary = first
        .run(&mut store, &mut NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.downloaded, expected - 2);
    assert_eq!(summary.missing(), 2);
    assert!(!summary.interrupted);
    assert_eq!(store.tile_count_total().unwrap(), expected - 2);

    let second = harvester(MockWms::default(), config.clone());
    let summary = second
        .run(&mut store, &mut NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.fetcher().client().calls(), 2);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(store.tile_count_total().unwrap(), expected);
}

#[tokio::test]
async fn requests_carry_wms_parameters() {
    let config = HarvestConfig::new().with_zoom_range(0, 0);
    let mut store = TileStore::open_in_memory(&ArchiveMetadata::default()).unwrap();
    let h = harvester(MockWms::default(), config);

    h.run(&mut store, &mut NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    let urls = h.fetcher().client().urls.lock().unwrap().clone();
    assert_eq!(urls.len(), 1);
    let url = &urls[0];
    assert!(url.starts_with("https://maps.nationalmap.co.nz/wms?authkey=integration-key"));
    assert!(url.contains("REQUEST=GetMap"));
    assert!(url.contains("SRS=EPSG%3A3857"));
    assert!(url.contains("WIDTH=256"));
}

#[test]
fn archive_metadata_and_plan() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nz.mbtiles");
    let config = HarvestConfig::new().with_zoom_range(10, 12);

    let store = open(&path, &config);
    assert_eq!(store.metadata_value("minzoom").unwrap().as_deref(), Some("10"));
    assert_eq!(store.metadata_value("maxzoom").unwrap().as_deref(), Some("12"));
    assert_eq!(
        store.metadata_value("bounds").unwrap().as_deref(),
        Some("166.0,-47.5,179.0,-34.0")
    );

    let reports = plan(&config, &store).unwrap();
    assert_eq!(reports.len(), 3);
    // z12 narrow range is 149 columns by 205 rows
    assert_eq!(reports[2].pending, 149 * 205);
    assert!(reports.iter().all(|r| r.existing == 0));
}
