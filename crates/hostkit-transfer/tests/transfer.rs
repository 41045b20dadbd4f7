mod common;

use common::RecordingHost;
use hostkit_exec::command::escape;
use hostkit_exec::{ControlsOverride, ExecError, ExecutionResult, Host, OptionsPlacement};
use hostkit_transfer::{Location, TransferError, TransferExt, TransferMethod, TransferOptions};

#[tokio::test]
async fn test_unknown_method_is_an_unsuccessful_result() {
    let host = RecordingHost::local();

    let result = host
        .transfer()
        .get(
            "otherhost",
            "/etc/hosts",
            "/tmp/hosts",
            TransferOptions::new().method("bogus"),
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "unknown copy method 'bogus'");
    assert!(host.commands().is_empty());
}

#[tokio::test]
async fn test_get_defaults_to_scp_as_root() {
    let host = RecordingHost::local();

    let result = host
        .transfer()
        .get("otherhost", "/etc/hosts", "/tmp/hosts", TransferOptions::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        host.rendered(),
        [format!(
            "LC_ALL=en_US.utf-8 scp -o StrictHostKeyChecking=no -o ConnectTimeout=2 {} /tmp/hosts",
            escape("root@otherhost:/etc/hosts")
        )]
    );
}

#[tokio::test]
async fn test_put_with_rsync_and_user() {
    let host = RecordingHost::local();

    host.transfer()
        .put(
            "/srv/site",
            "web",
            "/var/www",
            TransferOptions::new().method("rsync").rmtuser("deploy").opt("a", true),
        )
        .await
        .unwrap();

    assert_eq!(
        host.rendered(),
        [format!(
            "LC_ALL=en_US.utf-8 rsync -a /srv/site {}",
            escape("deploy@web:/var/www")
        )]
    );
}

#[tokio::test]
async fn test_tar_runs_interactively_when_asked() {
    let host = RecordingHost::local();

    host.transfer()
        .put(
            "/srv/site",
            "web",
            "/var/www",
            TransferOptions::new().method("tar").interactive(true),
        )
        .await
        .unwrap();

    let commands = host.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].interactive);
    assert_eq!(
        commands[0].render(),
        format!(
            "LC_ALL=en_US.utf-8 tar cf - -C /srv site | ssh {} {}",
            escape("root@web"),
            escape("tar xf - -C /var/www")
        )
    );
}

#[tokio::test]
async fn test_failed_copy_is_reported_not_raised() {
    let host = RecordingHost::local().replying(1, "scp: /etc/shadow: Permission denied\n");

    let result = host
        .transfer()
        .get("db", "/etc/shadow", "/tmp/shadow", TransferOptions::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.status, 1);
    assert_eq!(result.stderr, "scp: /etc/shadow: Permission denied");
}

#[tokio::test]
async fn test_scalar_ssh_option_is_rejected_before_running() {
    let host = RecordingHost::local();

    let err = host
        .transfer()
        .get(
            "db",
            "/a",
            "/b",
            TransferOptions::new().opt("o", "BatchMode=yes"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::InvalidOption(_)));
    assert!(host.commands().is_empty());
}

#[tokio::test]
async fn test_local_acting_host_treats_localhost_as_a_peer() {
    let host = RecordingHost::local();

    host.transfer()
        .get("localhost", "/a", "/b", TransferOptions::new())
        .await
        .unwrap();

    assert!(host.rendered()[0].contains(&escape("root@localhost:/a")));
}

#[tokio::test]
async fn test_remote_acting_host_delegates_localhost_to_this_machine() {
    let host = RecordingHost::remote(Some(("admin", "192.0.2.10")));

    // the delegated copy never reaches the acting host
    let result: ExecutionResult = host
        .transfer()
        .put(
            "/remote/file",
            "localhost",
            "/local/file",
            TransferOptions::new().method("bogus"),
        )
        .await
        .unwrap();

    assert_eq!(result.stderr, "unknown copy method 'bogus'");
    assert!(host.commands().is_empty());
}

#[tokio::test]
async fn test_remote_acting_host_must_be_connected_for_localhost() {
    let host = RecordingHost::remote(None);

    let err = host
        .transfer()
        .get("localhost", "/a", "/b", TransferOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Exec(ExecError::NotConnected)));
}

#[tokio::test]
async fn test_remote_acting_host_copies_normally_to_other_hosts() {
    let host = RecordingHost::remote(Some(("admin", "192.0.2.10")));

    host.transfer()
        .get("db", "/a", "/b", TransferOptions::new().method("rsync"))
        .await
        .unwrap();

    assert_eq!(
        host.rendered(),
        [format!("LC_ALL=en_US.utf-8 rsync {} /b", escape("root@db:/a"))]
    );
}

#[tokio::test]
async fn test_unknown_method_wins_over_missing_session() {
    let host = RecordingHost::remote(None);

    let result = host
        .transfer()
        .get("localhost", "/a", "/b", TransferOptions::new().method("bogus"))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.status, -1);
    assert_eq!(result.stderr, "unknown copy method 'bogus'");
}

#[test]
fn test_localhost_get_on_remote_host_runs_here_towards_the_acting_host() {
    let host = RecordingHost::remote(Some(("admin", "192.0.2.10")));

    let plan = host
        .transfer()
        .plan_get("localhost", "/a", "/b", TransferOptions::new())
        .unwrap();

    assert!(plan.on_local);
    assert_eq!(plan.method, TransferMethod::Scp);
    assert_eq!((plan.src, plan.src_path.as_str()), (Location::here(), "/a"));
    assert_eq!(
        (plan.dst, plan.dst_path.as_str()),
        (Location::remote("admin", "192.0.2.10"), "/b")
    );
    assert_eq!(
        plan.command.format(&host.controls()).render(),
        format!(
            "LC_ALL=en_US.utf-8 scp -o StrictHostKeyChecking=no -o ConnectTimeout=2 /a {}",
            escape("admin@192.0.2.10:/b")
        )
    );
}

#[test]
fn test_localhost_put_on_remote_host_follows_acting_host_controls() {
    let host = RecordingHost::remote(Some(("admin", "192.0.2.10")));
    let _guard = host.set_controls(
        &ControlsOverride::new()
            .locale("")
            .options_placement(OptionsPlacement::After),
    );

    let plan = host
        .transfer()
        .plan_put(
            "/srv/site",
            "localhost",
            "/var/www",
            TransferOptions::new().method("tar").rmtuser("deploy"),
        )
        .unwrap();

    assert!(plan.on_local);
    assert_eq!(plan.src, Location::remote("deploy", "192.0.2.10"));
    assert_eq!(plan.dst, Location::here());
    assert_eq!(
        plan.command.format(&host.controls()).render(),
        format!(
            "ssh {} {} | tar xf - -C /var/www",
            escape("deploy@192.0.2.10"),
            escape("tar cf - site -C /srv")
        )
    );
}

#[test]
fn test_plan_for_other_hosts_runs_on_acting_host() {
    let host = RecordingHost::local();

    let plan = host
        .transfer()
        .plan_put("/a", "db", "/b", TransferOptions::new().method("rsync"))
        .unwrap();

    assert!(!plan.on_local);
    assert_eq!(plan.dst, Location::remote("root", "db"));
    assert!(host.commands().is_empty());
}
