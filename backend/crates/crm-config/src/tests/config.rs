use crate::Config;
use crate::tests::{EnvGuard, setup_config_dir};

use googletest::assert_that;
use googletest::prelude::{anything, eq, err, ok};
use serial_test::serial;

#[test]
#[serial]
fn given_no_config_file_when_load_then_ok_with_defaults() {
    // Given
    let _env = setup_config_dir();

    // When
    let result = Config::load();

    // Then
    assert_that!(result, ok(anything()));
    let config = result.unwrap();
    assert_that!(config.server.port, eq(crate::DEFAULT_PORT));
    assert_that!(
        config.transition.persist_timeout_secs,
        eq(crate::DEFAULT_PERSIST_TIMEOUT_SECS)
    );
    assert_that!(
        config.webhooks.request_timeout_secs,
        eq(crate::DEFAULT_WEBHOOK_TIMEOUT_SECS)
    );
}

#[test]
#[serial]
fn given_no_config_file_when_load_and_validate_then_ok() {
    // Given
    let _env = setup_config_dir();

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, ok(anything()));
}

#[test]
#[serial]
fn given_valid_toml_file_when_load_then_uses_toml_values() {
    // Given
    let (temp, _guard) = setup_config_dir();
    std::fs::write(
        temp.path().join("config.toml"),
        r#"
            [server]
            port = 9100

            [transition]
            persist_timeout_secs = 3
        "#,
    )
    .unwrap();

    // When
    let config = Config::load().unwrap();

    // Then
    assert_that!(config.server.port, eq(9100));
    assert_that!(config.transition.persist_timeout_secs, eq(3));
}

#[test]
#[serial]
fn given_env_override_when_load_then_env_wins_over_toml() {
    // Given
    let (temp, _guard) = setup_config_dir();
    std::fs::write(
        temp.path().join("config.toml"),
        "[server]\nport = 9100\n",
    )
    .unwrap();
    let _port = EnvGuard::set("CRM_SERVER_PORT", "9200");

    // When
    let config = Config::load().unwrap();

    // Then
    assert_that!(config.server.port, eq(9200));
}

#[test]
#[serial]
fn given_low_port_when_validate_then_err() {
    // Given
    let _env = setup_config_dir();
    let mut config = Config::load().unwrap();
    config.server.port = 80;

    // When / Then
    assert_that!(config.validate(), err(anything()));
}

#[test]
#[serial]
fn given_escaping_database_path_when_validate_then_err() {
    // Given
    let _env = setup_config_dir();
    let mut config = Config::load().unwrap();
    config.database.path = "../outside.db".to_string();

    // When / Then
    assert_that!(config.validate(), err(anything()));
}

#[test]
#[serial]
fn given_zero_persist_timeout_when_validate_then_err() {
    // Given
    let _env = setup_config_dir();
    let mut config = Config::load().unwrap();
    config.transition.persist_timeout_secs = 0;

    // When / Then
    assert_that!(config.validate(), err(anything()));
}
