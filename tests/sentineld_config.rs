use std::sync::Mutex;

use tempfile::NamedTempFile;

use frame_sentinel::config::SentinelConfig;
use frame_sentinel::detect::{OutOfFramePolicy, SuppressionScope};
use frame_sentinel::SentinelError;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_MODEL_PATH",
        "SENTINEL_LABELS_PATH",
        "SENTINEL_BACKENDS",
        "SENTINEL_CONFIDENCE",
        "SENTINEL_IOU",
        "SENTINEL_SUPPRESSION",
        "SENTINEL_FRAME_RATE",
        "SENTINEL_ALLOW_LIST",
        "SENTINEL_MAX_IMAGES",
        "SENTINEL_PERIOD_HOURS",
        "SENTINEL_DEBUG_INTERVAL_SECS",
        "SENTINEL_SAVE_DIR",
        "SENTINEL_STATE_DB",
        "SENTINEL_SOURCE_URL",
        "SENTINEL_SOURCE_FPS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SentinelConfig::load().expect("load defaults");
    assert_eq!(cfg.model.backends, vec!["tract"]);
    assert_eq!((cfg.model.input_width, cfg.model.input_height), (640, 640));
    assert_eq!(cfg.model.confidence_threshold, 0.7);
    assert_eq!(cfg.model.iou_threshold, 0.5);
    assert_eq!(cfg.model.suppression, SuppressionScope::ClassAgnostic);
    assert_eq!(cfg.capture.frame_rate, 3);
    assert_eq!(cfg.capture.allow_list, vec!["person", "cat", "dog"]);
    assert_eq!(cfg.quota.max_images_per_period, 64);
    assert_eq!(cfg.quota.period_hours, 8);
    assert_eq!(cfg.storage.reference_size, 640);
    assert_eq!(cfg.storage.jpeg_quality, 95);

    let policy = cfg.capture_policy().expect("policy");
    assert_eq!(policy.frame_interval_ms, 333);
    assert_eq!(policy.save_interval_ms, 450_000);
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "path": "/opt/models/yolov8n.onnx",
            "labels_path": "/opt/models/coco.txt",
            "backends": ["tract", "stub"],
            "confidence_threshold": 0.55,
            "suppression": "per_class",
            "discard_out_of_frame": true
        },
        "capture": { "frame_rate": 5, "allow_list": ["person"] },
        "quota": { "max_images_per_period": 10, "period_hours": 2 },
        "storage": { "save_dir": "/var/lib/sentinel/captures", "state_db": "state.db" },
        "source": { "url": "dir:///srv/frames", "target_fps": 4 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_IOU", "0.45");
    std::env::set_var("SENTINEL_ALLOW_LIST", "person, dog");
    std::env::set_var("SENTINEL_DEBUG_INTERVAL_SECS", "10");

    let cfg = SentinelConfig::load().expect("load config");
    assert_eq!(cfg.model.backends, vec!["tract", "stub"]);
    assert_eq!(cfg.model.confidence_threshold, 0.55);
    assert_eq!(cfg.model.iou_threshold, 0.45);
    assert_eq!(cfg.capture.frame_rate, 5);
    assert_eq!(cfg.capture.allow_list, vec!["person", "dog"]);
    assert_eq!(cfg.storage.state_db, "state.db");
    assert_eq!(cfg.source.url, "dir:///srv/frames");
    assert_eq!(cfg.source.target_fps, 4);

    let settings = cfg.engine_settings();
    assert_eq!(settings.scope, SuppressionScope::PerClass);
    assert_eq!(settings.out_of_frame, OutOfFramePolicy::Discard);

    let policy = cfg.capture_policy().expect("policy");
    assert_eq!(policy.frame_interval_ms, 200);
    assert_eq!(policy.save_interval_ms, 10_000);

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("sentinel.toml");
    std::fs::write(
        &path,
        r#"
[model]
backends = ["stub"]
input_width = 320
input_height = 320

[quota]
max_images_per_period = 2
period_hours = 1
"#,
    )
    .expect("write config");

    let cfg = SentinelConfig::load_from(Some(path.as_path())).expect("load toml");
    assert_eq!(cfg.model.backends, vec!["stub"]);
    assert_eq!(cfg.model.input_width, 320);
    assert_eq!(cfg.capture_policy().expect("policy").save_interval_ms, 1_800_000);
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_CONFIDENCE", "1.5");
    let err = SentinelConfig::load().unwrap_err();
    assert!(matches!(
        SentinelError::classify(&err),
        Some(SentinelError::Configuration(_))
    ));
    clear_env();

    std::env::set_var("SENTINEL_FRAME_RATE", "0");
    assert!(SentinelConfig::load().is_err());
    clear_env();

    std::env::set_var("SENTINEL_MAX_IMAGES", "many");
    assert!(SentinelConfig::load().is_err());
    clear_env();

    std::env::set_var("SENTINEL_SUPPRESSION", "sometimes");
    assert!(SentinelConfig::load().is_err());
    clear_env();
}
