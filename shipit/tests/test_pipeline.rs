//! Pipeline integration tests

mod common;

use secrecy::SecretString;
use tokio_test::{assert_err, assert_ok};

use shipit::app::run::{run, RunOptions};
use shipit::deploy::descriptor::Descriptor;
use shipit::deploy::fsm::Stage;
use shipit::deploy::git::SyncOutcome;
use shipit::errors::DeployError;
use shipit::filesys::dir::Dir;

use common::{connection_check, test_config, test_log, working_copy_with, RecordingRunner, SERVER};

fn options(dir: impl Into<std::path::PathBuf>, cleanup: bool) -> RunOptions {
    RunOptions {
        working_copy: Dir::new(dir),
        cleanup,
    }
}

#[tokio::test]
async fn test_fresh_host_compose_deployment() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    let runner = RecordingRunner::new();
    let log = test_log(tmp.path());

    let report = assert_ok!(run(&test_config(8080), &options(&wc, false), &runner, &log).await);

    assert_eq!(report.sync, SyncOutcome::Updated);
    assert_eq!(report.descriptor, Descriptor::Compose(wc.join("docker-compose.yml")));
    assert_eq!(report.validation.url, format!("http://{}", SERVER));
    assert!(report.validation.probe_ok);
    assert!(!report.cleaned_up);
    assert_eq!(report.stages, Stage::ALL[..8].to_vec());

    let site = runner.stdin_of("tee /etc/nginx/sites-available/app").unwrap();
    assert!(site.contains("proxy_pass http://localhost:8080;"));
    assert!(!site.contains("__APP_PORT__"));

    // Strict left-to-right ordering of the remote work
    let order = [
        "fetch origin main",
        "checkout main",
        "pull origin main",
        connection_check().as_str(),
        "apt-get update",
        "apt-get install",
        "systemctl enable docker",
        "systemctl start docker",
        "usermod -aG docker deploy",
        "rsync -az --delete",
        "docker-compose -f docker-compose.yml down",
        "docker-compose -f docker-compose.yml build",
        "docker-compose -f docker-compose.yml up -d",
        "ln -sf /etc/nginx/sites-available/app /etc/nginx/sites-enabled/app",
        "nginx -t",
        "systemctl reload nginx",
        "docker ps",
        "curl",
    ]
    .map(|needle| runner.position(needle).unwrap_or_else(|| panic!("{} never ran", needle)));
    assert!(order.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", order);

    assert!(!runner.ran("rm -rf ~/app"));
}

#[tokio::test]
async fn test_dockerfile_deployment_publishes_port() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["Dockerfile"]);
    let runner = RecordingRunner::new();
    let log = test_log(tmp.path());

    let report = assert_ok!(run(&test_config(5000), &options(&wc, false), &runner, &log).await);

    assert_eq!(report.descriptor, Descriptor::Dockerfile(wc.join("Dockerfile")));
    assert!(runner.ran("docker build -t app ."));
    assert!(runner.ran("-p 5000:5000"));
    assert!(!runner.ran("docker-compose -f"));
}

#[tokio::test]
async fn test_clone_when_working_copy_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = tmp.path().join("workspace").join("shop");
    let runner = RecordingRunner::new().with_clone_files(vec!["compose.yaml"]);
    let log = test_log(tmp.path());

    let report = assert_ok!(run(&test_config(3000), &options(&wc, false), &runner, &log).await);

    assert_eq!(report.sync, SyncOutcome::Cloned);
    assert_eq!(runner.count("clone --branch main https://github.com/acme/shop.git"), 1);
    assert!(!runner.ran("fetch origin"));
}

#[tokio::test]
async fn test_repeated_sync_never_reclones() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    let runner = RecordingRunner::new();
    let config = test_config(3000);

    for _ in 0..2 {
        let log = test_log(tmp.path());
        assert_ok!(run(&config, &options(&wc, false), &runner, &log).await);
    }

    assert_eq!(runner.count(" clone "), 0);
    assert_eq!(runner.count("fetch origin main"), 2);
    assert_eq!(runner.count("checkout main"), 2);
    assert_eq!(runner.count("pull origin main"), 2);
}

#[tokio::test]
async fn test_missing_descriptor_aborts_before_ssh() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["README.md", "package.json"]);
    let runner = RecordingRunner::new();
    let log = test_log(tmp.path());

    let err = assert_err!(run(&test_config(3000), &options(&wc, false), &runner, &log).await);

    assert!(matches!(err, DeployError::NoDeploymentDescriptor(_)));
    assert_ne!(err.exit_code(), 0);
    assert!(runner.calls().iter().all(|c| c.raw.starts_with("git ")));
}

#[tokio::test]
async fn test_failure_at_any_stage_halts_pipeline() {
    let cases: [(&str, i32, &str); 6] = [
        ("fetch origin main", 128, "ssh "),
        (connection_check().leak(), 255, "apt-get"),
        ("apt-get install", 100, "systemctl enable docker"),
        ("rsync", 23, "docker-compose -f"),
        ("docker-compose.yml build", 2, "up -d"),
        ("nginx -t", 1, "systemctl reload nginx"),
    ];

    for (needle, status, never) in cases {
        let tmp = tempfile::tempdir().unwrap();
        let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
        let runner = RecordingRunner::new().fail_when(needle, status);
        let log = test_log(tmp.path());

        let err = assert_err!(run(&test_config(3000), &options(&wc, false), &runner, &log).await);

        assert_eq!(err.exit_code(), status, "exit code for failure at {}", needle);
        assert!(!runner.ran(never), "{} ran after failure at {}", never, needle);
        assert!(!runner.ran("docker ps"), "validation ran after failure at {}", needle);
    }
}

#[tokio::test]
async fn test_failures_map_to_stage_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);

    let runner = RecordingRunner::new().fail_when("rsync", 12);
    let log = test_log(tmp.path());
    let err = assert_err!(run(&test_config(3000), &options(&wc, false), &runner, &log).await);
    assert!(matches!(err, DeployError::TransferFailed { status: 12, .. }));

    let runner = RecordingRunner::new().fail_when("systemctl reload nginx", 3);
    let log = test_log(tmp.path());
    let err = assert_err!(run(&test_config(3000), &options(&wc, false), &runner, &log).await);
    assert!(matches!(err, DeployError::ProxyConfigFailed { status: 3, .. }));
}

#[tokio::test]
async fn test_tolerated_failures_do_not_abort() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    let runner = RecordingRunner::new()
        .fail_when("usermod", 6)
        .fail_when("docker-compose.yml down", 1)
        .fail_when("sites-enabled/default", 1);
    let log = test_log(tmp.path());

    assert_ok!(run(&test_config(3000), &options(&wc, false), &runner, &log).await);
    assert!(runner.ran("docker-compose.yml up -d"));
}

#[tokio::test]
async fn test_failed_probe_is_advisory() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    let runner = RecordingRunner::new()
        .fail_when("curl", 7)
        .fail_when("docker ps", 1);
    let log = test_log(tmp.path());

    let report = assert_ok!(run(&test_config(3000), &options(&wc, false), &runner, &log).await);

    assert!(!report.validation.probe_ok);
    assert!(report.validation.containers.is_none());
    assert_eq!(report.validation.url, format!("http://{}", SERVER));
}

#[tokio::test]
async fn test_cleanup_after_successful_run() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    // Bringing down an app that is already gone fails; that is fine
    let runner = RecordingRunner::new().fail_when("docker rm -f app", 1);
    let log = test_log(tmp.path());

    let report = assert_ok!(run(&test_config(3000), &options(&wc, true), &runner, &log).await);

    assert!(report.cleaned_up);
    assert_eq!(report.stages.last(), Some(&Stage::Teardown));

    let probe = runner.position("docker ps").unwrap();
    let rm_dir = runner.position("rm -rf ~/app").unwrap();
    let rm_site = runner.position("rm -f /etc/nginx/sites-enabled/app").unwrap();
    let reloads: Vec<usize> = runner
        .calls()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.raw.contains("systemctl reload nginx"))
        .map(|(i, _)| i)
        .collect();

    assert!(probe < rm_dir && rm_dir < rm_site);
    assert_eq!(reloads.len(), 2);
    assert!(reloads[1] > rm_site);
}

#[tokio::test]
async fn test_cleanup_failure_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    let runner = RecordingRunner::new().fail_when("rm -f /etc/nginx/sites-enabled/app", 1);
    let log = test_log(tmp.path());

    let err = assert_err!(run(&test_config(3000), &options(&wc, true), &runner, &log).await);
    assert!(matches!(err, DeployError::CleanupFailed { status: 1, .. }));
}

#[tokio::test]
async fn test_access_token_never_reaches_the_log() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    let runner = RecordingRunner::new();
    let log = test_log(tmp.path());
    let log_path = log.path().to_path_buf();

    let mut config = test_config(3000);
    config.access_token = Some(SecretString::from("ghp_topsecret".to_string()));

    assert_ok!(run(&config, &options(&wc, false), &runner, &log).await);
    assert_ok!(log.finish(5));

    // The token travels in the transport URL only
    assert!(runner.ran("set-url origin https://ghp_topsecret@github.com/acme/shop.git"));
    assert!(runner.calls().iter().all(|c| !c.shown.contains("ghp_topsecret")));

    // and is scrubbed from the working copy before the transfer
    let scrub = runner
        .position("set-url origin https://github.com/acme/shop.git")
        .unwrap();
    assert!(scrub < runner.position("rsync").unwrap());

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("pull origin main"));
    assert!(!contents.contains("ghp_topsecret"));
}

#[tokio::test]
async fn test_existing_working_copy_follows_configured_repository() {
    let tmp = tempfile::tempdir().unwrap();
    let wc = working_copy_with(tmp.path(), &["docker-compose.yml"]);
    let runner = RecordingRunner::new();
    let log = test_log(tmp.path());

    // Same name as the checkout on disk, different repository
    let mut config = test_config(3000);
    config.repo_url = "https://github.com/someone-else/shop.git".to_string();

    assert_ok!(run(&config, &options(&wc, false), &runner, &log).await);

    let set_url = runner
        .position("remote set-url origin https://github.com/someone-else/shop.git")
        .unwrap();
    assert!(set_url < runner.position("fetch origin main").unwrap());
}
