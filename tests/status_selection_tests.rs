//! Integration tests for status queries feeding file selections
//!
//! These tests verify:
//! - git porcelain and svn status output become selection rows
//! - Selection edits decide the target set of an add operation
//! - The add operation passes exactly the selected paths to git
//!
//! The unix tests stand in for git with `sh` running a script named after the
//! git subcommand (`sh status ...`, `sh add ...`) inside a temp directory.
//! Tests against a real repository are skipped when git is not installed.

use camino::{Utf8Path, Utf8PathBuf};
use std::process::Command;
use std::sync::Arc;
use tokio::runtime::Runtime;
use vcs_helper::models::{ItemStatus, StatusFlags};
use vcs_helper::services::git::parse_porcelain;
use vcs_helper::services::svn::parse_status;
use vcs_helper::services::{AddFactory, GitCli, StatusQuery};
use vcs_helper::{
    ConsolePresenter, FileSelection, HelperConfig, Metrics, OperationController, OperationState,
};

#[test]
fn test_porcelain_to_selection() {
    let output = " M src/lib.rs\0?? notes.txt\0R  new.rs\0old.rs\0!! target\0UU merge.rs\0";
    let records = parse_porcelain(output).unwrap();
    assert_eq!(records.len(), 5);

    let selection = FileSelection::from_records(
        records,
        StatusFlags::MODIFIED | StatusFlags::UNVERSIONED,
    );
    let paths: Vec<_> = selection.entries().map(|e| e.path.as_str()).collect();
    // Ignored is left out; a conflict counts as a modification.
    assert_eq!(paths, vec!["src/lib.rs", "notes.txt", "new.rs", "merge.rs"]);
    assert_eq!(
        selection.get(Utf8Path::new("notes.txt")).unwrap().text_status,
        ItemStatus::Unversioned
    );
}

#[test]
fn test_conflict_flag_selects_only_conflicts() {
    let records = parse_porcelain("UU merge.rs\0 M clean.rs\0").unwrap();

    let conflicts = FileSelection::from_records(records.clone(), StatusFlags::CONFLICTED);
    assert_eq!(conflicts.selected_paths(), vec![Utf8PathBuf::from("merge.rs")]);

    let modified = FileSelection::from_records(records, StatusFlags::MODIFIED);
    assert_eq!(modified.len(), 2);
}

#[test]
fn test_svn_status_tree_and_edits() {
    let output = "\
M       trunk/src/main.c
?       trunk/src/scratch.c
 M      trunk/docs
";
    let records = parse_status(output, false);
    let mut selection = FileSelection::from_records(
        records,
        StatusFlags::MODIFIED | StatusFlags::UNVERSIONED,
    );

    let tree = selection.tree();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "trunk");
    assert!(tree[0].entry.is_none());
    let children: Vec<_> = tree[0].children.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(children, vec!["src", "docs"]);

    // Property-only change keeps its own status column.
    let docs = selection.get(Utf8Path::new("trunk/docs")).unwrap();
    assert_eq!(docs.prop_status, ItemStatus::Modified);

    selection.set_all(false);
    assert_eq!(selection.all_state(), Some(false));
    assert_eq!(selection.toggle(Utf8Path::new("trunk/src/main.c")), Some(true));
    assert_eq!(selection.all_state(), None);
    assert_eq!(
        selection.selected_paths(),
        vec![Utf8PathBuf::from("trunk/src/main.c")]
    );
}

fn add_controller(
    runtime: &Runtime,
    git: GitCli,
) -> OperationController<ConsolePresenter<Vec<u8>, Vec<u8>>> {
    OperationController::new(
        ConsolePresenter::new(Vec::new(), Vec::new(), false),
        Box::new(AddFactory::new(git)),
        runtime.handle().clone(),
        &HelperConfig::default(),
        Arc::new(Metrics::new()),
    )
}

fn sink_texts<P: vcs_helper::Presenter>(controller: &OperationController<P>) -> Vec<String> {
    controller
        .sink()
        .snapshot(0)
        .iter()
        .map(|line| line.text().to_string())
        .collect()
}

#[cfg(unix)]
fn fake_git(scripts: &[(&str, &str)]) -> (tempfile::TempDir, GitCli) {
    let dir = tempfile::TempDir::new().unwrap();
    for (name, body) in scripts {
        std::fs::write(dir.path().join(name), body).unwrap();
    }
    let cwd = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let git = GitCli::new("sh").with_current_dir(cwd);
    (dir, git)
}

#[cfg(unix)]
#[test]
fn test_status_query_runs_program() {
    let (_dir, git) = fake_git(&[(
        "status",
        "printf ' M a.txt\\000?? dir/new.rs\\000!! ignored.log\\000'\n",
    )]);

    let records = git
        .status(&[], StatusFlags::MODIFIED | StatusFlags::UNVERSIONED)
        .unwrap();
    assert_eq!(records.len(), 3);

    let selection =
        FileSelection::from_records(records, StatusFlags::MODIFIED | StatusFlags::UNVERSIONED);
    assert_eq!(
        selection.selected_paths(),
        vec![Utf8PathBuf::from("a.txt"), Utf8PathBuf::from("dir/new.rs")]
    );
}

#[cfg(unix)]
#[test]
fn test_status_query_failure_is_an_error() {
    let (_dir, git) = fake_git(&[(
        "status",
        "echo 'fatal: not a git repository' >&2\nexit 128\n",
    )]);

    let err = git.status(&[], StatusFlags::MODIFIED).unwrap_err();
    assert!(err.to_string().contains("128"));
    assert!(err.to_string().contains("not a git repository"));
}

#[cfg(unix)]
#[test]
fn test_add_receives_selected_paths_only() {
    let (_dir, git) = fake_git(&[
        (
            "status",
            "printf ' M keep.rs\\000 M skip.rs\\000?? new.rs\\000'\n",
        ),
        ("add", "shift\nfor p in \"$@\"; do echo \"add '$p'\"; done\n"),
    ]);

    let flags = StatusFlags::MODIFIED | StatusFlags::UNVERSIONED;
    let mut selection = FileSelection::from_records(git.status(&[], flags).unwrap(), flags);
    selection.set_selected(Utf8Path::new("skip.rs"), false);

    let runtime = Runtime::new().unwrap();
    let mut controller = add_controller(&runtime, git);

    controller.begin(selection.selected_paths()).unwrap();
    assert_eq!(controller.wait_blocking(), Some(OperationState::Succeeded));
    assert_eq!(sink_texts(&controller), vec!["add 'keep.rs'", "add 'new.rs'"]);

    let targets = controller.operation().unwrap().targets().to_vec();
    assert_eq!(
        targets,
        vec![Utf8PathBuf::from("keep.rs"), Utf8PathBuf::from("new.rs")]
    );
}

#[cfg(unix)]
#[test]
fn test_add_from_subdirectory_runs_at_toplevel() {
    // root/sub is the working directory; status paths come back root relative.
    let dir = tempfile::TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let sub = root.join("sub");
    std::fs::create_dir(&sub).unwrap();
    std::fs::write(sub.join("f.txt"), "content\n").unwrap();
    std::fs::write(sub.join("status"), "printf '?? sub/f.txt\\000'\n").unwrap();
    std::fs::write(sub.join("rev-parse"), "cd .. && pwd\n").unwrap();
    std::fs::write(
        root.join("add"),
        "shift\nfor p in \"$@\"; do\n  [ -e \"$p\" ] || { echo \"fatal: pathspec '$p' did not match any files\" >&2; exit 128; }\n  echo \"add '$p'\"\ndone\n",
    )
    .unwrap();

    let git = GitCli::new("sh").with_current_dir(sub.clone());
    let flags = StatusFlags::MODIFIED | StatusFlags::UNVERSIONED;
    let selection = FileSelection::from_records(git.status(&[], flags).unwrap(), flags);
    assert_eq!(selection.selected_paths(), vec![Utf8PathBuf::from("sub/f.txt")]);

    let at_root = git.at_toplevel().unwrap();
    let runtime = Runtime::new().unwrap();
    let mut controller = add_controller(&runtime, at_root);
    controller.begin(selection.selected_paths()).unwrap();

    assert_eq!(controller.wait_blocking(), Some(OperationState::Succeeded));
    assert_eq!(sink_texts(&controller), vec!["add 'sub/f.txt'"]);
}

fn real_git_repo() -> Option<(tempfile::TempDir, Utf8PathBuf)> {
    let available = Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);
    if !available {
        eprintln!("git not installed, skipping");
        return None;
    }

    let dir = tempfile::TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().canonicalize().unwrap()).unwrap();
    git_output(&root, &["init", "-q"]);
    Some((dir, root))
}

fn git_output(cwd: &Utf8Path, args: &[&str]) -> String {
    let output = Command::new("git").args(args).current_dir(cwd).output().unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_real_git_add_from_subdirectory() {
    let Some((_dir, root)) = real_git_repo() else {
        return;
    };
    std::fs::create_dir(root.join("sub")).unwrap();
    std::fs::write(root.join("sub").join("f.txt"), "content\n").unwrap();
    std::fs::write(root.join("top.txt"), "left alone\n").unwrap();

    let git = GitCli::default().with_current_dir(root.join("sub"));
    let flags = StatusFlags::MODIFIED | StatusFlags::UNVERSIONED;
    let records = git.status(&[Utf8PathBuf::from(".")], flags).unwrap();
    let selection = FileSelection::from_records(records, flags);
    assert_eq!(selection.selected_paths(), vec![Utf8PathBuf::from("sub/")]);

    let at_root = git.at_toplevel().unwrap();
    assert_eq!(
        std::fs::canonicalize(at_root.toplevel().unwrap()).unwrap(),
        root.as_std_path().to_path_buf()
    );

    let runtime = Runtime::new().unwrap();
    let mut controller = add_controller(&runtime, at_root);
    controller.begin(selection.selected_paths()).unwrap();
    assert_eq!(controller.wait_blocking(), Some(OperationState::Succeeded));

    let status = git_output(&root, &["status", "--porcelain"]);
    assert!(status.contains("A  sub/f.txt"), "{status}");
    assert!(status.contains("?? top.txt"), "{status}");
}
