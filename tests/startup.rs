use std::process::Command;

#[test]
fn fails_with_unknown_storage_backend() {
    let exe = env!("CARGO_BIN_EXE_subscription-engine");
    let output = Command::new(exe)
        .env("STORAGE_BACKEND", "sqlite")
        .output()
        .expect("failed to run subscription-engine binary");
    assert!(!output.status.success());
}
