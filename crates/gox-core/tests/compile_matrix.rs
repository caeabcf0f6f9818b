//! End-to-end tests for `Compiler::compile` with scripted git/go fakes.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use gox_core::{
    BuildRequest, ChannelObserver, Compilation, Compiler, ForgeError, Releaser, Releasers,
    Result, SourceControl, StaticChangelog, Toolchain,
};
use gox_release::fakes::MemoryReleaser;

type Timeline = Arc<Mutex<Vec<String>>>;

fn failed(reason: &str) -> ForgeError {
    ForgeError::Command {
        program: "fake".to_string(),
        status: "exit status: 1".to_string(),
        stderr: reason.to_string(),
    }
}

struct FakeGit {
    log: Timeline,
    is_repo: bool,
    head: Option<String>,
}

#[async_trait]
impl SourceControl for FakeGit {
    async fn status(&self, _dir: &Path) -> Result<()> {
        self.log.lock().unwrap().push("git status".to_string());
        if self.is_repo {
            Ok(())
        } else {
            Err(failed("fatal: not a git repository"))
        }
    }

    async fn checkout(&self, _dir: &Path, reference: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("git checkout {reference}"));
        Ok(())
    }

    async fn short_head(&self, _dir: &Path) -> Result<String> {
        self.head.clone().ok_or_else(|| failed("no HEAD"))
    }
}

#[derive(Default)]
struct FakeGo {
    log: Timeline,
    failing_builds: HashSet<String>,
    failing_fetches: HashSet<String>,
    omit_output: bool,
    requests: Mutex<Vec<BuildRequest>>,
}

#[async_trait]
impl Toolchain for FakeGo {
    async fn fetch(&self, dir: &Path, target: &str) -> Result<()> {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.log
            .lock()
            .unwrap()
            .push(format!("go get {target} in {dir_name}"));
        if self.failing_fetches.contains(&dir_name) || self.failing_fetches.contains(target) {
            return Err(failed("cannot find module"));
        }
        Ok(())
    }

    async fn build(&self, _dir: &Path, request: &BuildRequest) -> Result<()> {
        let filename = request
            .output
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        self.log.lock().unwrap().push(format!("go build {filename}"));
        self.requests.lock().unwrap().push(request.clone());

        if self.failing_builds.contains(&filename) {
            return Err(failed("undefined: main"));
        }
        if !self.omit_output {
            let body = format!("binary {}/{}", request.env["GOOS"], request.env["GOARCH"]);
            std::fs::write(&request.output, body).unwrap();
        }
        Ok(())
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    build_root: PathBuf,
    source_root: PathBuf,
    log: Timeline,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let build_root = tmp.path().join("build");
        let source_root = tmp.path().join("gopath");
        let pkg = source_root.join("src/github.com/acme/tool");
        std::fs::create_dir_all(pkg.join("cmd/server")).unwrap();
        std::fs::create_dir_all(pkg.join("cmd/cli")).unwrap();
        Self {
            _tmp: tmp,
            build_root,
            source_root,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn git(&self) -> Arc<FakeGit> {
        Arc::new(FakeGit {
            log: self.log.clone(),
            is_repo: true,
            head: Some("abc1234".to_string()),
        })
    }

    fn go(&self) -> FakeGo {
        FakeGo {
            log: self.log.clone(),
            ..Default::default()
        }
    }

    fn compiler(&self, git: Arc<FakeGit>, go: Arc<FakeGo>) -> Compiler {
        Compiler::new(&self.build_root, &self.source_root, git, go)
    }

    fn timeline(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn registry(releaser: &Arc<MemoryReleaser>) -> Releasers {
    Releasers::new().register("memory", Arc::clone(releaser) as Arc<dyn Releaser>)
}

fn job_2x2() -> Compilation {
    Compilation::new("github.com/acme/tool", "1.0.0")
        .with_targets(["cmd/server", "cmd/cli"])
        .with_platforms(["linux/amd64", "windows/amd64"])
}

fn gunzip(bytes: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(bytes).read_to_string(&mut out).unwrap();
    out
}

#[tokio::test]
async fn all_cells_succeed_produces_every_artifact() {
    let fx = Fixture::new();
    let go = Arc::new(fx.go());
    let compiler = fx.compiler(fx.git(), go.clone());
    let mut job = job_2x2();

    compiler.compile(&mut job).await.expect("compile");

    assert_eq!(
        job.files,
        vec![
            "server_linux_amd64.gz",
            "server_windows_amd64.exe.gz",
            "cli_linux_amd64.gz",
            "cli_windows_amd64.exe.gz",
        ]
    );
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());

    let build_dir = fx.build_root.join(&job.id);
    for file in &job.files {
        assert!(build_dir.join(file).is_file(), "{file} not persisted");
        let uncompressed = file.trim_end_matches(".gz");
        assert!(!build_dir.join(uncompressed).exists(), "{uncompressed} left behind");
    }
    let server = std::fs::read(build_dir.join("server_windows_amd64.exe.gz")).unwrap();
    assert_eq!(gunzip(&server), "binary windows/amd64");
}

#[tokio::test]
async fn build_request_carries_flags_and_platform_env() {
    let fx = Fixture::new();
    let go = Arc::new(fx.go());
    let compiler = fx.compiler(fx.git(), go.clone());
    let mut job = Compilation::new("github.com/acme/tool", "1.0.0")
        .with_platforms(["linux/arm64"])
        .with_variable("main.VERSION", "1.0.0");
    job.shrink = true;

    compiler.compile(&mut job).await.expect("compile");

    let requests = go.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.env["GOOS"], "linux");
    assert_eq!(req.env["GOARCH"], "arm64");
    assert_eq!(req.env["CGO_ENABLED"], "0");
    assert!(req.ldflags.starts_with("-s -w -X main.VERSION=1.0.0 -X main.COMMIT=abc1234"));
    assert!(req.ldflags.contains("-X main.CLOUD_GOX=1"));
    assert!(req.ldflags.contains("-X main.BUILD_TIME="));
    assert_eq!(req.output, fx.build_root.join(&job.id).join("tool_linux_arm64"));
    assert_eq!(job.files, vec!["tool_linux_arm64.gz"]);

    // the commit hash reaches the flags without being written into the job
    assert!(!job.variables.contains_key("main.COMMIT"));
}

#[tokio::test]
async fn one_failing_cell_does_not_fail_the_job() {
    let fx = Fixture::new();
    let mut go = fx.go();
    go.failing_builds.insert("cli_linux_amd64".to_string());
    let compiler = fx.compiler(fx.git(), Arc::new(go));
    let mut job = job_2x2();

    compiler.compile(&mut job).await.expect("compile");

    assert_eq!(job.files.len(), 3);
    assert!(!job.files.contains(&"cli_linux_amd64.gz".to_string()));
}

#[tokio::test]
async fn all_cells_failing_is_no_files_compiled() {
    let fx = Fixture::new();
    let mut go = fx.go();
    for name in [
        "server_linux_amd64",
        "server_windows_amd64.exe",
        "cli_linux_amd64",
        "cli_windows_amd64.exe",
    ] {
        go.failing_builds.insert(name.to_string());
    }
    let compiler = fx.compiler(fx.git(), Arc::new(go));
    let mut job = job_2x2();

    let err = compiler.compile(&mut job).await.unwrap_err();
    assert!(matches!(err, ForgeError::NoFilesCompiled));
    assert!(job.files.is_empty());
    assert!(job.completed_at.is_none());
}

#[tokio::test]
async fn release_setup_happens_once_for_whole_matrix() {
    let fx = Fixture::new();
    let releaser = Arc::new(MemoryReleaser::new());
    let compiler = fx
        .compiler(fx.git(), Arc::new(fx.go()))
        .with_releasers(registry(&releaser))
        .with_changelog(Arc::new(StaticChangelog("***ChangeLog:***\n".to_string())));
    let mut job = job_2x2().with_releaser("memory");

    compiler.compile(&mut job).await.expect("compile");

    let setups = releaser.setup_calls();
    assert_eq!(setups.len(), 1);
    assert_eq!(setups[0].package, "github.com/acme/tool");
    assert_eq!(setups[0].version, "1.0.0");
    assert_eq!(setups[0].changelog, "***ChangeLog:***\n");
    assert_eq!(releaser.uploaded_names(), job.files);

    let uploaded = releaser.uploads();
    assert_eq!(gunzip(&uploaded[0].payload), "binary linux/amd64");
}

#[tokio::test]
async fn failed_release_setup_does_not_fail_the_job() {
    let fx = Fixture::new();
    let releaser = Arc::new(MemoryReleaser::new().failing_setup());
    let compiler = fx
        .compiler(fx.git(), Arc::new(fx.go()))
        .with_releasers(registry(&releaser));
    let mut job = job_2x2().with_releaser("memory");

    compiler.compile(&mut job).await.expect("compile");

    assert_eq!(job.files.len(), 4);
    assert_eq!(releaser.setup_calls().len(), 1);
    assert!(releaser.uploads().is_empty());
}

#[tokio::test]
async fn failed_upload_still_persists_artifact() {
    let fx = Fixture::new();
    let releaser = Arc::new(MemoryReleaser::new().failing_upload("server_linux_amd64.gz"));
    let compiler = fx
        .compiler(fx.git(), Arc::new(fx.go()))
        .with_releasers(registry(&releaser));
    let mut job = job_2x2().with_releaser("memory");

    compiler.compile(&mut job).await.expect("compile");

    assert_eq!(job.files.len(), 4);
    assert_eq!(releaser.uploads().len(), 3);
}

#[tokio::test]
async fn unknown_releaser_disables_publishing() {
    let fx = Fixture::new();
    let releaser = Arc::new(MemoryReleaser::new());
    let compiler = fx
        .compiler(fx.git(), Arc::new(fx.go()))
        .with_releasers(registry(&releaser));
    let mut job = job_2x2().with_releaser("elsewhere");

    compiler.compile(&mut job).await.expect("compile");

    assert_eq!(job.files.len(), 4);
    assert!(releaser.setup_calls().is_empty());
}

#[tokio::test]
async fn no_releaser_means_no_setup() {
    let fx = Fixture::new();
    let releaser = Arc::new(MemoryReleaser::new());
    let compiler = fx
        .compiler(fx.git(), Arc::new(fx.go()))
        .with_releasers(registry(&releaser));
    let mut job = job_2x2();

    compiler.compile(&mut job).await.expect("compile");
    assert!(releaser.setup_calls().is_empty());
}

#[tokio::test]
async fn pinned_commit_is_checked_out_before_builds_and_reverted_after() {
    let fx = Fixture::new();
    let mut go = fx.go();
    go.failing_builds.insert("server_linux_amd64".to_string());
    let compiler = fx.compiler(fx.git(), Arc::new(go));
    let mut job = job_2x2().with_commitish("abc123");

    compiler.compile(&mut job).await.expect("compile");

    let timeline = fx.timeline();
    assert_eq!(timeline[0], "git status");
    assert_eq!(timeline[1], "git checkout abc123");
    assert!(timeline[2].starts_with("go build"));
    assert_eq!(timeline.last().unwrap(), "git checkout -");
    assert_eq!(
        timeline.iter().filter(|l| l.starts_with("go build")).count(),
        4
    );
}

#[tokio::test]
async fn pinned_commit_is_reverted_even_when_every_cell_fails() {
    let fx = Fixture::new();
    let mut go = fx.go();
    go.failing_builds.insert("tool_linux_amd64".to_string());
    let compiler = fx.compiler(fx.git(), Arc::new(go));
    let mut job = Compilation::new("github.com/acme/tool", "1.0.0")
        .with_platforms(["linux/amd64"])
        .with_commitish("abc123");

    let err = compiler.compile(&mut job).await.unwrap_err();
    assert!(matches!(err, ForgeError::NoFilesCompiled));
    assert_eq!(fx.timeline().last().unwrap(), "git checkout -");
}

#[tokio::test]
async fn unpinned_job_never_touches_checkout() {
    let fx = Fixture::new();
    let compiler = fx.compiler(fx.git(), Arc::new(fx.go()));
    let mut job = job_2x2();

    compiler.compile(&mut job).await.expect("compile");
    assert!(!fx.timeline().iter().any(|l| l.starts_with("git")));
}

#[tokio::test]
async fn missing_head_just_omits_commit_variable() {
    let fx = Fixture::new();
    let go = Arc::new(fx.go());
    let git = Arc::new(FakeGit {
        log: fx.log.clone(),
        is_repo: false,
        head: None,
    });
    let compiler = fx.compiler(git, go.clone());
    let mut job = Compilation::new("github.com/acme/tool", "1.0.0").with_platforms(["linux/amd64"]);

    compiler.compile(&mut job).await.expect("compile");
    assert!(!go.requests.lock().unwrap()[0].ldflags.contains("main.COMMIT"));
}

#[tokio::test]
async fn pin_outside_repository_fails_before_building() {
    let fx = Fixture::new();
    let git = Arc::new(FakeGit {
        log: fx.log.clone(),
        is_repo: false,
        head: None,
    });
    let compiler = fx.compiler(git, Arc::new(fx.go()));
    let mut job = job_2x2().with_commitish("abc123");

    let err = compiler.compile(&mut job).await.unwrap_err();
    assert!(matches!(err, ForgeError::NotARepository { .. }));
    assert!(!fx.timeline().iter().any(|l| l.starts_with("go build")));
}

#[tokio::test]
async fn unreadable_output_aborts_job_but_still_reverts() {
    let fx = Fixture::new();
    let mut go = fx.go();
    go.omit_output = true;
    let compiler = fx.compiler(fx.git(), Arc::new(go));
    let mut job = job_2x2().with_commitish("abc123");

    let err = compiler.compile(&mut job).await.unwrap_err();
    assert!(matches!(err, ForgeError::MissingOutput { .. }));

    let timeline = fx.timeline();
    assert_eq!(
        timeline.iter().filter(|l| l.starts_with("go build")).count(),
        1,
        "remaining cells must not run"
    );
    assert_eq!(timeline.last().unwrap(), "git checkout -");
}

#[tokio::test]
async fn missing_subtarget_directory_is_skipped() {
    let fx = Fixture::new();
    let compiler = fx.compiler(fx.git(), Arc::new(fx.go()));
    let mut job = Compilation::new("github.com/acme/tool", "1.0.0")
        .with_targets(["cmd/server", "cmd/ghost"])
        .with_platforms(["linux/amd64"]);

    compiler.compile(&mut job).await.expect("compile");
    assert_eq!(job.files, vec!["server_linux_amd64.gz"]);
}

#[tokio::test]
async fn missing_package_is_fatal() {
    let fx = Fixture::new();
    let compiler = fx.compiler(fx.git(), Arc::new(fx.go()));
    let mut job =
        Compilation::new("github.com/acme/missing", "1.0.0").with_platforms(["linux/amd64"]);

    let err = compiler.compile(&mut job).await.unwrap_err();
    assert!(matches!(err, ForgeError::PackageNotFound(_)));
}

#[tokio::test]
async fn invalid_platform_is_fatal() {
    let fx = Fixture::new();
    let compiler = fx.compiler(fx.git(), Arc::new(fx.go()));
    let mut job = Compilation::new("github.com/acme/tool", "1.0.0").with_platforms(["linux"]);

    let err = compiler.compile(&mut job).await.unwrap_err();
    assert!(matches!(err, ForgeError::InvalidPlatform(_)));
}

#[tokio::test]
async fn subtarget_dependency_failure_skips_only_that_target() {
    let fx = Fixture::new();
    let mut go = fx.go();
    go.failing_fetches.insert("cli".to_string());
    let compiler = fx.compiler(fx.git(), Arc::new(go));
    let mut job = job_2x2();
    job.go_get = true;

    compiler.compile(&mut job).await.expect("compile");

    assert_eq!(
        job.files,
        vec!["server_linux_amd64.gz", "server_windows_amd64.exe.gz"]
    );
    let timeline = fx.timeline();
    assert_eq!(timeline[0], "go get github.com/acme/tool in gopath");
    assert_eq!(
        timeline.iter().filter(|l| l.as_str() == "go get . in cli").count(),
        1,
        "a sub-target is fetched once, not per platform"
    );
}

#[tokio::test]
async fn root_dependency_failure_is_fatal() {
    let fx = Fixture::new();
    let mut go = fx.go();
    go.failing_fetches.insert("github.com/acme/tool".to_string());
    let compiler = fx.compiler(fx.git(), Arc::new(go));
    let mut job = job_2x2();
    job.go_get = true;

    let err = compiler.compile(&mut job).await.unwrap_err();
    assert!(matches!(err, ForgeError::Dependencies { .. }));
}

#[tokio::test]
async fn observer_is_notified_after_each_artifact() {
    let fx = Fixture::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let compiler = fx
        .compiler(fx.git(), Arc::new(fx.go()))
        .with_observer(Arc::new(ChannelObserver::new(tx)));
    let mut job = job_2x2();

    compiler.compile(&mut job).await.expect("compile");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), 4);
    assert_eq!(
        events.iter().map(|e| e.completed).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert_eq!(
        events.iter().map(|e| e.file.clone()).collect::<Vec<_>>(),
        job.files
    );
    assert!(events.iter().all(|e| e.job_id == job.id));
}

#[tokio::test]
async fn rerunning_same_job_id_reuses_build_directory() {
    let fx = Fixture::new();
    let compiler = fx.compiler(fx.git(), Arc::new(fx.go()));
    let mut first =
        Compilation::new("github.com/acme/tool", "1.0.0").with_platforms(["linux/amd64"]);
    first.id = "fixed-id".to_string();
    let mut second = first.clone();

    compiler.compile(&mut first).await.expect("first");
    compiler.compile(&mut second).await.expect("second");
    assert_eq!(second.files, vec!["tool_linux_amd64.gz"]);
}

#[test]
fn env_overrides_do_not_leak_into_job() {
    let job = Compilation::new("github.com/acme/tool", "1.0.0");
    let env: BTreeMap<String, String> =
        gox_core::build_env(&job, &gox_core::Platform::parse("linux/amd64").unwrap());
    assert_eq!(env.len(), 3);
    assert!(job.env.is_empty());
}
