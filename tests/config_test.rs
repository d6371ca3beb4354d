use std::time::Duration;

use showerpool::config::Config;

// Environment variables are process-wide, so every case runs in one test.
#[test]
fn config_from_env_defaults_overrides_and_rejects() {
    unsafe {
        std::env::remove_var("SHOWERPOOL_CAPACITY");
        std::env::remove_var("SHOWERPOOL_LOG_DIR");
        std::env::remove_var("SHOWERPOOL_POLL_SECS");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.capacity, 50);
    assert_eq!(config.poll_interval, Duration::from_secs(10));
    assert!(config.log_dir.is_none());
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("SHOWERPOOL_CAPACITY", "100");
        std::env::set_var("SHOWERPOOL_LOG_DIR", "/scratch/logDetResponse");
        std::env::set_var("SHOWERPOOL_POLL_SECS", "3");
    }
    let pool = Config::from_env().unwrap().pool_config();
    assert_eq!(pool.capacity, 100);
    assert_eq!(pool.poll_interval, Duration::from_secs(3));
    assert_eq!(
        pool.log_dir.as_deref(),
        Some(std::path::Path::new("/scratch/logDetResponse"))
    );

    unsafe {
        std::env::set_var("SHOWERPOOL_CAPACITY", "lots");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("SHOWERPOOL_CAPACITY", "0");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::remove_var("SHOWERPOOL_CAPACITY");
        std::env::set_var("SHOWERPOOL_POLL_SECS", "0");
    }
    assert!(Config::from_env().is_err());

    // Clean up
    unsafe {
        std::env::remove_var("SHOWERPOOL_LOG_DIR");
        std::env::remove_var("SHOWERPOOL_POLL_SECS");
    }
}
