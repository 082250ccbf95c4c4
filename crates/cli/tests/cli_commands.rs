use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0">
  <ItemGroup>
    <Compile Include="server.js" />
  </ItemGroup>
</Project>"#;

fn setup_workspace() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let app = temp.path().join("app");
    fs::create_dir_all(app.join("routes")).unwrap();
    fs::write(app.join("server.js"), b"").unwrap();
    fs::write(app.join("routes").join("index.js"), b"").unwrap();
    fs::write(app.join("app.njsproj"), PROJECT).unwrap();
    temp
}

#[allow(deprecated)]
fn vsproj(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vsproj").expect("binary");
    cmd.current_dir(workspace).arg("--quiet");
    cmd
}

#[test]
fn add_then_remove_round_trips_through_manifest() {
    let temp = setup_workspace();
    let root = temp.path();
    let manifest = root.join("app").join("app.njsproj");

    vsproj(root)
        .args(["add", "app/routes/index.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("to app.njsproj"));
    let text = fs::read_to_string(&manifest).unwrap();
    assert!(text.starts_with(r#"<?xml version="1.0" encoding="Windows-1252"?>"#));
    assert!(text.contains(r#"<Compile Include="routes\index.js" />"#));

    vsproj(root)
        .args(["remove", "app/server.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));
    let text = fs::read_to_string(&manifest).unwrap();
    assert!(!text.contains("server.js"));
}

#[test]
fn adding_folder_lists_folder_and_contents() {
    let temp = setup_workspace();
    let root = temp.path();

    vsproj(root).args(["add", "app/routes"]).assert().success();
    let text = fs::read_to_string(root.join("app").join("app.njsproj")).unwrap();
    assert!(text.contains(r#"<Folder Include="routes\" />"#));
    assert!(text.contains(r#"<Compile Include="routes\index.js" />"#));
}

#[test]
fn file_outside_projects_reports_no_project() {
    let temp = setup_workspace();
    let root = temp.path();
    fs::write(root.join("loose.js"), b"").unwrap();

    vsproj(root)
        .args(["add", "loose.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no project found"));
}

#[test]
fn config_file_changes_project_extension() {
    let temp = setup_workspace();
    let root = temp.path();
    fs::rename(
        root.join("app").join("app.njsproj"),
        root.join("app").join("app.csproj"),
    )
    .unwrap();
    fs::write(
        root.join(".vsproj.toml"),
        "proj_extension = \"csproj\"\nitem_type = \"None\"\n",
    )
    .unwrap();

    vsproj(root)
        .args(["add", "app/routes/index.js"])
        .assert()
        .success();
    let text = fs::read_to_string(root.join("app").join("app.csproj")).unwrap();
    assert!(text.contains(r#"<None Include="routes\index.js" />"#));
}

#[test]
fn disabled_config_refuses_to_run() {
    let temp = setup_workspace();
    let root = temp.path();
    fs::write(root.join(".vsproj.toml"), "enabled = false\n").unwrap();

    vsproj(root)
        .args(["add", "app/server.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("disabled"));
}

#[test]
fn clear_ignored_empties_the_list() {
    let temp = setup_workspace();
    let root = temp.path();
    fs::create_dir_all(root.join(".vsproj")).unwrap();
    fs::write(
        root.join(".vsproj").join("ignore.json"),
        r#"{"ignore_paths":["/somewhere/a.js"]}"#,
    )
    .unwrap();

    vsproj(root)
        .arg("clear-ignored")
        .assert()
        .success()
        .stdout(predicate::str::contains("cleared 1 ignored path(s)"));
    let text = fs::read_to_string(root.join(".vsproj").join("ignore.json")).unwrap();
    assert!(!text.contains("a.js"));
}
