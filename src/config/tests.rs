//! Tests for the configuration system: validation, presets, environment
//! parsing and file persistence.

use super::*;
use crate::simd::Strategy;
use crate::system::CacheGeometry;
use std::env;
use std::fs;
use tempfile::tempdir;

/// Each test uses its own prefix so parallel tests never see each other's variables
fn set_vars(prefix: &str, vars: &[(&str, &str)]) {
    for (name, value) in vars {
        env::set_var(format!("{}{}", prefix, name), value);
    }
}

fn clear_vars(prefix: &str, vars: &[(&str, &str)]) {
    for (name, _) in vars {
        env::remove_var(format!("{}{}", prefix, name));
    }
}

#[test]
fn test_default_is_valid() {
    let config = CopyConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.enable_simd);
    assert_eq!(config.streaming_threshold, StreamingThreshold::L3Cache);
    assert_eq!(config.prefetch_distance, 2);
    assert_eq!(config.strategy, Strategy::Auto);
}

#[test]
fn test_all_presets_valid() {
    assert!(CopyConfig::performance_preset().validate().is_ok());
    assert!(CopyConfig::memory_preset().validate().is_ok());
    assert!(CopyConfig::realtime_preset().validate().is_ok());
    assert!(CopyConfig::balanced_preset().validate().is_ok());

    assert_eq!(CopyConfig::balanced_preset(), CopyConfig::default());
    assert_eq!(CopyConfig::memory_preset().streaming_threshold, StreamingThreshold::L2Cache);
    assert_eq!(CopyConfig::realtime_preset().prefetch_distance, 1);
}

#[test]
fn test_prefetch_distance_validation() {
    let mut config = CopyConfig::default();
    config.prefetch_distance = 0;
    let err = config.validate().unwrap_err();
    assert_eq!(err.category(), "config");

    config.prefetch_distance = 17;
    assert!(config.validate().is_err());

    config.prefetch_distance = 16;
    assert!(config.validate().is_ok());
}

#[test]
fn test_threshold_resolution() {
    let geometry = CacheGeometry {
        l1_size: 48 * 1024,
        l2_size: 2 * 1024 * 1024,
        l3_size: 32 * 1024 * 1024,
        cache_line_size: 64,
    };
    assert_eq!(StreamingThreshold::L3Cache.resolve(&geometry), 32 * 1024 * 1024);
    assert_eq!(StreamingThreshold::L2Cache.resolve(&geometry), 2 * 1024 * 1024);
    assert_eq!(StreamingThreshold::Bytes(4096).resolve(&geometry), 4096);
}

#[test]
fn test_threshold_parsing() {
    assert_eq!("l3".parse::<StreamingThreshold>().unwrap(), StreamingThreshold::L3Cache);
    assert_eq!("L2".parse::<StreamingThreshold>().unwrap(), StreamingThreshold::L2Cache);
    assert_eq!("l2_cache".parse::<StreamingThreshold>().unwrap(), StreamingThreshold::L2Cache);
    assert_eq!("64K".parse::<StreamingThreshold>().unwrap(), StreamingThreshold::Bytes(65536));
    assert_eq!("1m".parse::<StreamingThreshold>().unwrap(), StreamingThreshold::Bytes(1 << 20));
    assert_eq!("0".parse::<StreamingThreshold>().unwrap(), StreamingThreshold::Bytes(0));
    assert!("l4".parse::<StreamingThreshold>().is_err());

    assert_eq!(StreamingThreshold::L3Cache.to_string(), "l3");
    assert_eq!(StreamingThreshold::Bytes(512).to_string(), "512");
}

#[test]
fn test_from_env_defaults_when_unset() {
    let config = CopyConfig::from_env_with_prefix("FASTMEM_TEST_UNSET_").unwrap();
    assert_eq!(config, CopyConfig::default());
}

#[test]
fn test_from_env_reads_all_fields() {
    let prefix = "FASTMEM_TEST_ALL_";
    let vars = [
        ("SIMD_ENABLE", "yes"),
        ("SIMD_AVX2", "off"),
        ("SIMD_AVX512", "0"),
        ("STREAMING_THRESHOLD", "256K"),
        ("PREFETCH_DISTANCE", "4"),
        ("STRATEGY", "narrow"),
    ];
    set_vars(prefix, &vars);
    let result = CopyConfig::from_env_with_prefix(prefix);
    clear_vars(prefix, &vars);

    let config = result.unwrap();
    assert!(config.enable_simd);
    assert!(!config.enable_avx2);
    assert!(!config.enable_avx512);
    assert_eq!(config.streaming_threshold, StreamingThreshold::Bytes(256 * 1024));
    assert_eq!(config.prefetch_distance, 4);
    assert_eq!(config.strategy, Strategy::NarrowVector);
}

#[test]
fn test_from_env_rejects_bad_values() {
    let prefix = "FASTMEM_TEST_BAD_";

    let vars = [("PREFETCH_DISTANCE", "many")];
    set_vars(prefix, &vars);
    let result = CopyConfig::from_env_with_prefix(prefix);
    clear_vars(prefix, &vars);
    assert!(result.is_err());

    let vars = [("PREFETCH_DISTANCE", "64")];
    set_vars(prefix, &vars);
    let result = CopyConfig::from_env_with_prefix(prefix);
    clear_vars(prefix, &vars);
    assert!(result.is_err());

    let vars = [("SIMD_ENABLE", "maybe")];
    set_vars(prefix, &vars);
    let result = CopyConfig::from_env_with_prefix(prefix);
    clear_vars(prefix, &vars);
    assert!(result.is_err());

    let vars = [("STRATEGY", "fastest")];
    set_vars(prefix, &vars);
    let result = CopyConfig::from_env_with_prefix(prefix);
    clear_vars(prefix, &vars);
    let err = result.unwrap_err();
    assert_eq!(err.category(), "config");
}

#[test]
fn test_parse_env_helpers() {
    let name = "FASTMEM_TEST_HELPER_VALUE";
    assert_eq!(parse_env_var(name, 7usize).unwrap(), 7);
    assert!(parse_env_bool(name, true).unwrap());

    env::set_var(name, " 12 ");
    assert_eq!(parse_env_var(name, 7usize).unwrap(), 12);
    assert!(parse_env_bool(name, true).is_err());

    env::set_var(name, "ON");
    assert!(parse_env_bool(name, false).unwrap());
    env::remove_var(name);
}

#[test]
fn test_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("copy.json");

    let config = CopyConfig {
        enable_avx512: false,
        streaming_threshold: StreamingThreshold::Bytes(1 << 20),
        prefetch_distance: 3,
        strategy: Strategy::WidestVector,
        ..CopyConfig::default()
    };
    config.save_to_file(&path).unwrap();

    let loaded = CopyConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_partial_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.json");
    fs::write(&path, r#"{ "streaming_threshold": "l2_cache" }"#).unwrap();

    let loaded = CopyConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.streaming_threshold, StreamingThreshold::L2Cache);
    assert_eq!(loaded.prefetch_distance, 2);
}

#[test]
fn test_load_invalid_file() {
    let dir = tempdir().unwrap();

    let path = dir.path().join("bad.json");
    fs::write(&path, "not json").unwrap();
    assert!(CopyConfig::load_from_file(&path).is_err());

    let path = dir.path().join("out_of_range.json");
    fs::write(&path, r#"{ "prefetch_distance": 0 }"#).unwrap();
    assert!(CopyConfig::load_from_file(&path).is_err());

    assert!(CopyConfig::load_from_file(dir.path().join("missing.json")).is_err());
}

#[test]
fn test_helper_constructors() {
    let config = CopyConfig::with_threshold(1024);
    assert_eq!(config.streaming_threshold, StreamingThreshold::Bytes(1024));
    assert!(config.validate().is_ok());

    let config = CopyConfig::portable_only();
    assert!(!config.enable_simd);
    assert_eq!(config.strategy, Strategy::Portable);
}
