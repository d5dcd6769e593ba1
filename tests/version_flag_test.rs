use std::process::Command;

#[test]
fn test_version_flag() {
    let binary_path = env!("CARGO_BIN_EXE_credwatch");

    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .expect("Failed to execute binary");

    assert!(
        output.status.success(),
        "Version flag should exit with code 0"
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout.trim().strip_prefix("credwatch ").unwrap_or("");
    assert_eq!(
        version,
        env!("CARGO_PKG_VERSION"),
        "Binary version should match CARGO_PKG_VERSION"
    );
}

#[test]
fn test_config_flag_without_path_fails() {
    let binary_path = env!("CARGO_BIN_EXE_credwatch");

    let output = Command::new(binary_path)
        .arg("--config")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute binary");

    assert!(!output.status.success());
}
