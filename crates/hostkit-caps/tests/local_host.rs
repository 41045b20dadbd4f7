//! Capabilities against the real local machine

use hostkit_caps::{CapabilityError, HostExt};
use hostkit_exec::{LocalHost, Options};

fn flags(names: &[&str]) -> Options {
    names.iter().map(|name| (*name, true)).collect()
}

#[tokio::test]
async fn test_nonexistent_path_is_false() {
    let host = LocalHost::new();

    assert!(!host.path().exists("/nonexistent").await.unwrap());
}

#[tokio::test]
async fn test_root_by_uid_and_by_login() {
    let host = LocalHost::new();

    let by_uid = host.users().get(0).await.unwrap();
    let by_login = host.users().get("root").await.unwrap();

    assert_eq!(by_uid, by_login);
    assert_eq!(by_uid.login, "root");
}

#[tokio::test]
async fn test_file_lifecycle_in_tempdir() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().to_str().unwrap().to_string();
    let host = LocalHost::new();
    let files = host.files();

    let nested = format!("{base}/a/b");
    let one = format!("{nested}/one.txt");
    let two = format!("{nested}/two.txt");
    let three = format!("{nested}/three.txt");
    let hidden = format!("{nested}/.hidden");

    let created = files.mkdir(&[&nested], flags(&["p"])).await.unwrap();
    assert!(created.success);
    assert_eq!((created.stdout.as_str(), created.stderr.as_str()), ("", ""));

    assert!(files.touch(&[&one], Options::new()).await.unwrap().success);
    files.write(&two, b"payload", false).await.unwrap();
    assert!(files.copy(&[&two, &three], Options::new()).await.unwrap().success);
    assert!(files.rename(&[&one, &hidden], Options::new()).await.unwrap().success);

    let mut entries = files.listdir(&nested).await.unwrap();
    entries.sort();
    assert_eq!(entries, vec![".hidden", "three.txt", "two.txt"]);
    assert_eq!(
        files.read_to_string(&format!("{nested}/three.txt")).await.unwrap(),
        "payload"
    );

    assert!(files.chmod("0600", &[&two], Options::new()).await.unwrap().success);
    let mode = host.path().permissions(&format!("{nested}/two.txt")).await.unwrap();
    assert!(mode.starts_with("-rw-------"), "unexpected mode {mode}");
    assert!(host.path().is_file(&format!("{nested}/two.txt")).await.unwrap());
    assert!(host.path().is_dir(&nested).await.unwrap());

    assert!(matches!(
        files.listdir(&format!("{nested}/two.txt")).await,
        Err(CapabilityError::NotADirectory(_))
    ));

    let tree = format!("{base}/a");
    assert!(files.remove(&[&tree], flags(&["r", "f"])).await.unwrap().success);
    assert!(!host.path().exists(&nested).await.unwrap());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_os_type_is_lowercase_linux() {
    let host = LocalHost::new();

    assert_eq!(host.system().os_type().await.unwrap(), "linux");
}

#[tokio::test]
async fn test_failed_file_command_is_a_result() {
    let host = LocalHost::new();

    let result = host
        .files()
        .mkdir(&["/nonexistent/hostkit/dir"], Options::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_ne!(result.status, 0);
    assert!(result.stderr.contains("mkdir"));
}
