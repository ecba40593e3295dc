use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let p = dir.path().join(name);
    fs::write(&p, contents).expect("write file ok");
    p
}

#[test]
fn compile_prints_a_listing() {
    let dir = tempdir().unwrap();
    let main_c = write_file(
        &dir,
        "main.c",
        r#"
            int add(int a, int b) { return a + b; }
            int main(void) { return add(2, 3); }
        "#,
    );

    let mut cmd = Command::cargo_bin("wrencc").unwrap();
    cmd.arg("compile").arg(&main_c);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(".text"))
        .stdout(predicate::str::contains("main:"))
        .stdout(predicate::str::contains("add:"));
}

#[test]
fn compile_writes_an_output_file() {
    let dir = tempdir().unwrap();
    let main_c = write_file(&dir, "main.c", "int main(void) { return 0; }");
    let out = dir.path().join("out.lst");

    let mut cmd = Command::cargo_bin("wrencc").unwrap();
    cmd.arg("compile").arg(&main_c).args(["-o"]).arg(&out);
    cmd.assert().success();

    let listing = fs::read_to_string(&out).expect("listing exists");
    assert!(listing.contains("main:"));
    assert!(listing.contains(".static"));
}

#[test]
fn tokens_lists_tokens_with_locations() {
    let dir = tempdir().unwrap();
    let main_c = write_file(&dir, "main.c", "int x = 42;");

    let mut cmd = Command::cargo_bin("wrencc").unwrap();
    cmd.arg("tokens").arg(&main_c);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Keyword(Int)"))
        .stdout(predicate::str::contains("1:1"));
}

#[test]
fn ast_prints_the_tree() {
    let dir = tempdir().unwrap();
    let main_c = write_file(&dir, "main.c", "int main(void) { return 0; }");

    let mut cmd = Command::cargo_bin("wrencc").unwrap();
    cmd.arg("ast").arg(&main_c);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("TranslationUnit"))
        .stdout(predicate::str::contains("Return"));
}

#[test]
fn semantic_errors_exit_nonzero_with_location() {
    let dir = tempdir().unwrap();
    let main_c = write_file(&dir, "main.c", "int main(void) {\n    return y;\n}");

    let mut cmd = Command::cargo_bin("wrencc").unwrap();
    cmd.arg("compile").arg(&main_c);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("undefined identifier 'y'"))
        .stderr(predicate::str::contains("2:"));
}

#[test]
fn missing_input_fails_with_context() {
    let mut cmd = Command::cargo_bin("wrencc").unwrap();
    cmd.args(["compile", "no-such-file.c"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no-such-file.c"));
}
