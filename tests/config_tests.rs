//! Configuration loading from the environment.

use qingvol::test_support::EnvGuard;
use qingvol::{CloudConfig, ConfigError, RetryPolicy};

const CREDENTIALS: [(&str, &str); 2] = [
    ("QINGVOL_ACCESS_KEY_ID", "AKIDEXAMPLE"),
    ("QINGVOL_SECRET_ACCESS_KEY", "secret-example"),
];

#[tokio::test]
async fn environment_supplies_credentials_and_defaults_fill_the_rest() {
    let _guard = EnvGuard::set_vars(&[CREDENTIALS[0], CREDENTIALS[1], ("QINGVOL_ZONE", "sh1a")])
        .await;

    let config = CloudConfig::load_without_cli_args().expect("config loads");

    assert_eq!(config.access_key_id, "AKIDEXAMPLE");
    assert_eq!(config.secret_access_key, "secret-example");
    assert_eq!(config.zone, "sh1a");
    assert_eq!(config.api_endpoint, "https://api.qingcloud.com/iaas/");
    assert_eq!(config.retry_policy(), RetryPolicy::default());
    assert_eq!(config.validate(), Ok(()));
}

#[tokio::test]
async fn environment_overrides_volume_defaults() {
    let _guard = EnvGuard::set_vars(&[
        CREDENTIALS[0],
        CREDENTIALS[1],
        ("QINGVOL_VOLUME_TYPE", "3"),
        ("QINGVOL_VOLUME_STEP_SIZE_GB", "50"),
    ])
    .await;

    let config = CloudConfig::load_without_cli_args().expect("config loads");
    let class = config.storage_class().expect("valid class");

    assert_eq!(class.volume_type, 3);
    assert_eq!(class.step_size_gb, 50);
}

#[tokio::test]
async fn blank_access_key_names_its_sources() {
    let _guard = EnvGuard::set_vars(&[("QINGVOL_ACCESS_KEY_ID", ""), CREDENTIALS[1]]).await;

    let config = CloudConfig::load_without_cli_args().expect("config loads");
    let err = config.validate().expect_err("access key is blank");

    let ConfigError::MissingField(ref message) = err else {
        panic!("expected MissingField, got {err:?}");
    };
    assert!(message.contains("QINGVOL_ACCESS_KEY_ID"), "{message}");
    assert!(message.contains("qingvol.toml"), "{message}");
    assert!(message.contains("access_key_id"), "{message}");
}
