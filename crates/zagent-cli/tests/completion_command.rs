use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_zagent_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("zagent")
}

#[test]
fn test_completion_command_help() {
    let mut cmd = Command::new(get_zagent_bin());
    cmd.arg("completion").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "Generate shell completion scripts",
        ))
        .stdout(predicate::str::contains("SUPPORTED SHELLS"))
        .stdout(predicate::str::contains("bash"))
        .stdout(predicate::str::contains("zsh"))
        .stdout(predicate::str::contains("fish"))
        .stdout(predicate::str::contains("INSTALLATION"))
        .stdout(predicate::str::contains("~/.bashrc"))
        .stdout(predicate::str::contains("~/.zshrc"));
}

#[test]
fn test_completion_bash_generates_script() {
    let mut cmd = Command::new(get_zagent_bin());
    cmd.arg("completion").arg("--shell").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("_zagent()"))
        .stdout(predicate::str::contains("complete -F _zagent"));
}

#[test]
fn test_completion_zsh_generates_script() {
    let mut cmd = Command::new(get_zagent_bin());
    cmd.arg("completion").arg("--shell").arg("zsh");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("#compdef zagent"))
        .stdout(predicate::str::contains("_zagent()"));
}

#[test]
fn test_completion_fish_generates_script() {
    let mut cmd = Command::new(get_zagent_bin());
    cmd.arg("completion").arg("--shell").arg("fish");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("complete -c zagent"));
}

#[test]
fn test_completion_lists_subcommands() {
    let mut cmd = Command::new(get_zagent_bin());
    cmd.arg("completion").arg("--shell").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ticket"))
        .stdout(predicate::str::contains("queue"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn test_completion_requires_shell() {
    let mut cmd = Command::new(get_zagent_bin());
    cmd.arg("completion");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--shell"));
}
