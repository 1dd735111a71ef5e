use serde_json::{json, Map, Value};
use stepwise_runner::ports::workspace_tools::WorkspaceTools;
use stepwise_runner::ToolPort;

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::test]
async fn write_then_read_then_list() {
    let dir = tempfile::tempdir().unwrap();
    let tools = WorkspaceTools::new(dir.path());

    let wrote = tools
        .invoke(
            "write_file",
            &params(json!({"path": "docs/notes.md", "content": "# Notes\n"})),
        )
        .await
        .unwrap();
    assert!(wrote.success, "{:?}", wrote.error);

    let read = tools
        .invoke("read_file", &params(json!({"path": "docs/notes.md"})))
        .await
        .unwrap();
    assert_eq!(read.payload.as_deref(), Some("# Notes\n"));

    std::fs::write(dir.path().join("top.txt"), "x").unwrap();
    let listing = tools
        .invoke("list_directory", &params(json!({"path": "."})))
        .await
        .unwrap();
    assert_eq!(listing.payload.as_deref(), Some("docs/\ntop.txt"));
}

#[tokio::test]
async fn escaping_paths_are_tool_failures() {
    let dir = tempfile::tempdir().unwrap();
    let tools = WorkspaceTools::new(dir.path());

    for path in ["../outside.txt", "/etc/passwd", "a/../../b"] {
        let out = tools
            .invoke("read_file", &params(json!({"path": path})))
            .await
            .unwrap();
        assert!(!out.success, "{path} should be refused");
        assert!(out.error.is_some());
    }
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directories_cannot_leave_the_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "TOP SECRET").unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
    let tools = WorkspaceTools::new(dir.path());

    let read = tools
        .invoke("read_file", &params(json!({"path": "link/secret.txt"})))
        .await
        .unwrap();
    assert!(!read.success);
    assert_eq!(read.payload, None);

    let listing = tools
        .invoke("list_directory", &params(json!({"path": "link"})))
        .await
        .unwrap();
    assert!(!listing.success);

    let wrote = tools
        .invoke(
            "write_file",
            &params(json!({"path": "link/planted.txt", "content": "x"})),
        )
        .await
        .unwrap();
    assert!(!wrote.success);
    assert!(!outside.path().join("planted.txt").exists());

    let nested = tools
        .invoke(
            "write_file",
            &params(json!({"path": "link/deeper/planted.txt", "content": "x"})),
        )
        .await
        .unwrap();
    assert!(!nested.success);
    assert!(!outside.path().join("deeper").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn dangling_symlinks_are_not_followed_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let target = outside.path().join("created.txt");
    std::os::unix::fs::symlink(&target, dir.path().join("dangling.txt")).unwrap();
    let tools = WorkspaceTools::new(dir.path());

    let wrote = tools
        .invoke(
            "write_file",
            &params(json!({"path": "dangling.txt", "content": "x"})),
        )
        .await
        .unwrap();
    assert!(!wrote.success);
    assert!(!target.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_inside_the_workspace_still_work() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("real")).unwrap();
    std::fs::write(dir.path().join("real/a.txt"), "inside").unwrap();
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();
    let tools = WorkspaceTools::new(dir.path());

    let read = tools
        .invoke("read_file", &params(json!({"path": "alias/a.txt"})))
        .await
        .unwrap();
    assert_eq!(read.payload.as_deref(), Some("inside"));
}

#[tokio::test]
async fn missing_file_and_bad_params() {
    let dir = tempfile::tempdir().unwrap();
    let tools = WorkspaceTools::new(dir.path());

    let out = tools
        .invoke("read_file", &params(json!({"path": "nope.txt"})))
        .await
        .unwrap();
    assert!(!out.success);

    let out = tools
        .invoke("write_file", &params(json!({"path": "a.txt"})))
        .await
        .unwrap();
    assert_eq!(out.error.as_deref(), Some("missing parameter `content`"));

    let out = tools
        .invoke("read_file", &params(json!({"path": 42})))
        .await
        .unwrap();
    assert_eq!(out.error.as_deref(), Some("parameter `path` must be a string"));

    let out = tools.invoke("delete_everything", &Map::new()).await.unwrap();
    assert_eq!(out.error.as_deref(), Some("unknown tool `delete_everything`"));
}

#[tokio::test]
async fn advertised_tools() {
    let tools = WorkspaceTools::new(".");
    let names: Vec<String> = tools
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["list_directory", "read_file", "write_file"]);
}
