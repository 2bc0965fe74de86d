use rejoin_coordinator::{Config, Node};
use std::net::Ipv4Addr;
use std::sync::Arc;
use system::testing::ScriptedRunner;
use system::{CommandOutput, NodeIdentity};

async fn serving_node(runner: Arc<ScriptedRunner>) -> (tempfile::TempDir, u16) {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("share");
    std::fs::create_dir(&shared).unwrap();
    std::fs::write(shared.join("haproxy.cfg.base"), "backend api\n").unwrap();

    let mut config = Config::new(&shared);
    config.install_config = dir.path().join("live.cfg");
    config.ready_marker = dir.path().join("ready");
    config.etcd_cert = dir.path().join("missing.crt");
    config.kubeconfig = dir.path().join("missing.config");

    let identity = NodeIdentity::new("node1", Ipv4Addr::new(127, 0, 0, 1));
    let mut node = Node::with_parts(config, identity, runner).await.unwrap();
    node.initialize().await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(node.serve(listener));

    (dir, port)
}

#[tokio::test]
async fn every_request_reactivates_the_config() {
    let runner = Arc::new(ScriptedRunner::new());
    let (dir, port) = serving_node(runner.clone()).await;
    assert_eq!(runner.calls_to("systemctl").len(), 1);

    // Make the live copy stale so a trigger visibly reinstalls it.
    std::fs::write(dir.path().join("live.cfg"), "stale\n").unwrap();

    let client = reqwest::Client::new();
    for (i, path) in ["/", "/reload", "/a/b?c=d"].iter().enumerate() {
        let response = client
            .get(format!("http://127.0.0.1:{port}{path}"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "Request received");
        assert_eq!(runner.calls_to("systemctl").len(), i + 2);
    }

    let live = std::fs::read_to_string(dir.path().join("live.cfg")).unwrap();
    assert!(live.contains("server node1 127.0.0.1:6443 check verify none"));
}

#[tokio::test]
async fn failed_restart_still_acknowledges() {
    let runner = Arc::new(ScriptedRunner::new().on(
        "systemctl",
        &["restart", "haproxy"],
        CommandOutput::failed(1, "Unit haproxy.service not found."),
    ));
    let (_dir, port) = serving_node(runner.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Request received");
    assert_eq!(runner.calls_to("systemctl").len(), 2);
}
