//! End-to-end pipeline tests against a stub imagery service and a stub
//! georeferencing tool.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::StubService;
use imagery::{
    CachePolicy, FetchError, GeoreferenceError, ImageFormat, ImageryConfig, ImageryError,
    ImageryPipeline, ParseError, Stage,
};
use report_common::{BoundingBox, CrsCode};
use tokio_util::sync::CancellationToken;
use test_utils::{
    bing_metadata_xml, field_metadata_xml, StubBehavior, StubTool, FIELD_RAW_EXTENT,
};

fn raw_field() -> BoundingBox {
    let (w, s, e, n) = FIELD_RAW_EXTENT;
    BoundingBox::from_4_values(w, s, e, n).unwrap()
}

fn metadata_field() -> BoundingBox {
    BoundingBox::from_4_values(-93.10, 42.95, -93.08, 42.98).unwrap()
}

fn ullr(args: &[String]) -> Vec<f64> {
    let at = args.iter().position(|a| a == "-a_ullr").unwrap();
    args[at + 1..at + 5].iter().map(|a| a.parse().unwrap()).collect()
}

#[tokio::test]
async fn test_run_returns_metadata_bounds() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let raster = pipeline.run(&raw_field()).await.unwrap();

    // The stamped extent is what the service reported, not what was asked for
    assert_eq!(raster.bbox, metadata_field());
    assert_eq!(raster.crs, CrsCode::Epsg4326);
    assert_ne!(raster.bbox, raw_field());
    assert!(raster.output_path.exists());
    assert!(raster.reprojected.is_none());

    let key = raw_field().buffered(0.01).unwrap().cache_key();
    assert_eq!(raster.output_path, dir.path().join(format!("{key}.tiff")));
    assert_eq!(raster.source_path, dir.path().join(format!("{key}.png")));
    assert!(dir.path().join(format!("{key}.xml")).exists());

    let calls = tool.invocations();
    assert_eq!(calls.len(), 1);
    assert_eq!(ullr(&calls[0]), vec![-93.10, 42.98, -93.08, 42.95]);
    assert_eq!(calls[0][calls[0].len() - 2], raster.source_path.to_string_lossy());

    assert_eq!(service.image_hits(), 1);
    assert_eq!(service.metadata_hits(), 1);
}

#[tokio::test]
async fn test_request_carries_buffered_area() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    pipeline.run(&raw_field()).await.unwrap();

    let requested = raw_field().buffered(0.01).unwrap();
    let query = service.last_query();
    let area: Vec<f64> = query["mapArea"]
        .split(',')
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(
        area,
        vec![
            requested.south(),
            requested.west(),
            requested.north(),
            requested.east()
        ]
    );
    assert_eq!(query["mapSize"], "830,830");
    assert_eq!(query["key"], "test-key");
    assert_eq!(query["o"], "xml");
}

#[tokio::test]
async fn test_http_500_never_georeferences() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start_with_status(500, field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let err = pipeline.run(&raw_field()).await.unwrap_err();

    match &err {
        ImageryError::Fetch(fetch) => {
            assert_eq!(fetch.status(), Some(500));
            assert!(!err.to_string().contains("test-key"));
        }
        other => panic!("expected FetchError, got {other:?}"),
    }
    assert!(!tool.was_called());

    let key = raw_field().buffered(0.01).unwrap().cache_key();
    assert!(!dir.path().join(format!("{key}.png")).exists());
}

#[tokio::test]
async fn test_slow_service_times_out_in_fetch() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start_with_delay(Duration::from_secs(10), field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let config = ImageryConfig {
        fetch_timeout_secs: 1,
        ..service.config(dir.path(), tool.path())
    };
    let pipeline = ImageryPipeline::new(config).unwrap();

    let started = std::time::Instant::now();
    let err = pipeline.run(&raw_field()).await.unwrap_err();

    assert!(
        matches!(err, ImageryError::Timeout { stage: Stage::Fetch, .. }),
        "expected fetch timeout, got {err:?}"
    );
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!tool.was_called());

    let key = raw_field().buffered(0.01).unwrap().cache_key();
    assert!(!dir.path().join(format!("{key}.png")).exists());
}

#[tokio::test]
async fn test_cancel_during_georeference() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Hang);
    let config = ImageryConfig {
        georeference_timeout_secs: 60,
        ..service.config(dir.path(), tool.path())
    };
    let pipeline = ImageryPipeline::new(config).unwrap();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        let tool = tool.clone();
        tokio::spawn(async move {
            // Cancel once the tool has started
            while !tool.was_called() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            token.cancel();
        });
    }

    let started = std::time::Instant::now();
    let err = pipeline.run_with_cancel(&raw_field(), &token).await.unwrap_err();

    assert!(
        matches!(err, ImageryError::Cancelled { stage: Stage::Georeference }),
        "expected cancelled georeference, got {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(service.image_hits(), 1);
}

#[tokio::test]
async fn test_missing_tag_is_parse_error() {
    let dir = test_utils::temp_test_dir();
    let metadata = bing_metadata_xml(&[
        ("WestLongitude", "-93.10"),
        ("NorthLatitude", "42.98"),
        ("EastLongitude", "-93.08"),
    ]);
    let service = StubService::start(metadata).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let err = pipeline.run(&raw_field()).await.unwrap_err();

    assert!(matches!(
        err,
        ImageryError::Parse(ParseError::MissingTag {
            tag: "SouthLatitude",
            ..
        })
    ));
    assert!(!tool.was_called());
}

#[tokio::test]
async fn test_empty_metadata_body() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(String::new()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let err = pipeline.run(&raw_field()).await.unwrap_err();
    assert!(matches!(
        err,
        ImageryError::Fetch(FetchError::EmptyBody { .. })
    ));
}

#[tokio::test]
async fn test_failed_georeference_keeps_downloads() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Fail);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let err = pipeline.run(&raw_field()).await.unwrap_err();
    assert!(matches!(
        err,
        ImageryError::Georeference(GeoreferenceError::ExitStatus { .. })
    ));

    let key = raw_field().buffered(0.01).unwrap().cache_key();
    assert!(dir.path().join(format!("{key}.png")).exists());
    assert!(dir.path().join(format!("{key}.xml")).exists());
    assert!(!dir.path().join(format!("{key}.tiff")).exists());
}

#[tokio::test]
async fn test_second_run_reuses_cache() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let first = pipeline.run(&raw_field()).await.unwrap();
    let second = pipeline.run(&raw_field()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(service.image_hits(), 1);
    assert_eq!(service.metadata_hits(), 1);
    assert_eq!(tool.invocations().len(), 2);
}

#[tokio::test]
async fn test_refresh_policy_downloads_again() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let config = ImageryConfig {
        cache_policy: CachePolicy::Refresh,
        ..service.config(dir.path(), tool.path())
    };
    let pipeline = ImageryPipeline::new(config).unwrap();

    pipeline.run(&raw_field()).await.unwrap();
    pipeline.run(&raw_field()).await.unwrap();

    assert_eq!(service.image_hits(), 2);
    assert_eq!(service.metadata_hits(), 2);
}

#[tokio::test]
async fn test_evict_forces_download() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let raster = pipeline.run(&raw_field()).await.unwrap();
    let key = raw_field().buffered(0.01).unwrap().cache_key();
    pipeline.fetcher().evict(&key, ImageFormat::Png).await.unwrap();

    assert!(!raster.output_path.exists());
    assert!(!raster.source_path.exists());

    pipeline.run(&raw_field()).await.unwrap();
    assert_eq!(service.image_hits(), 2);
}

#[tokio::test]
async fn test_mercator_input_matches_geographic() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let tool = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let pipeline = ImageryPipeline::new(service.config(dir.path(), tool.path())).unwrap();

    let merc = projection::to_crs(&raw_field(), CrsCode::Epsg3857).unwrap();
    let raster = pipeline.run(&merc).await.unwrap();

    assert_eq!(raster.bbox, metadata_field());
    assert_eq!(raster.crs, CrsCode::Epsg4326);
}

#[tokio::test]
async fn test_warp_crs_reprojects() {
    let dir = test_utils::temp_test_dir();
    let service = StubService::start(field_metadata_xml()).await;
    let translate = StubTool::install(dir.path(), "gdal_translate", StubBehavior::Succeed);
    let warp = StubTool::install(dir.path(), "gdalwarp", StubBehavior::Succeed);
    let config = ImageryConfig {
        warp_tool: warp.path().to_path_buf(),
        warp_crs: Some(CrsCode::Epsg3857),
        ..service.config(dir.path(), translate.path())
    };
    let pipeline = ImageryPipeline::new(config).unwrap();

    let raster = pipeline.run(&raw_field()).await.unwrap();

    let reprojected = raster.reprojected.clone().unwrap();
    assert!(reprojected.exists());
    assert!(reprojected.to_string_lossy().ends_with("_3857.tiff"));
    assert_eq!(raster.render_path(), reprojected.as_path());

    let calls = warp.invocations();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(&"cubicspline".to_string()));
}

#[test]
fn test_yaml_config() {
    let yaml = r#"
api_key: from-yaml
cache_dir: /tmp/imagery
map_size: { width: 600, height: 400 }
format: jpeg
cache_policy: refresh
buffer:
  mode: relative
  fraction: 0.1
warp_crs: "EPSG:3857"
"#;
    let config: ImageryConfig = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(config.api_key.expose(), "from-yaml");
    assert_eq!(config.map_size.width, 600);
    assert_eq!(config.format, ImageFormat::Jpeg);
    assert_eq!(config.cache_policy, CachePolicy::Refresh);
    assert_eq!(config.buffer, imagery::BufferPolicy::Relative { fraction: 0.1 });
    assert_eq!(config.warp_crs, Some(CrsCode::Epsg3857));
    assert_eq!(config.translate_tool.to_string_lossy(), "gdal_translate");
    assert!(config.validate().is_ok());
}
