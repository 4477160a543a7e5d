//! `fs.*` capability group

use crate::script::{ScriptError, ScriptResult, Value};
use trx_vfs::{FileInfo, Vfs};

pub(super) const METHODS: [&str; 12] = [
    "read",
    "write",
    "append",
    "exists",
    "list",
    "mkdir",
    "remove",
    "stat",
    "cwd",
    "resolve",
    "isFile",
    "isDirectory",
];

fn path_arg(method: &str, args: &[Value]) -> ScriptResult<String> {
    match args.first() {
        Some(Value::String(path)) => Ok(path.clone()),
        Some(other) if !other.is_nullish() => Ok(other.to_string()),
        _ => Err(ScriptError::Type(format!("fs.{method}: path must be a string"))),
    }
}

/// `true` unless the flag argument is given and falsy.
fn recursive_arg(args: &[Value]) -> bool {
    args.get(1).map_or(true, |v| v.is_nullish() || v.truthy())
}

fn content_arg(args: &[Value]) -> String {
    args.get(1)
        .filter(|v| !matches!(v, Value::Undefined))
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn vfs_error(err: &trx_vfs::VfsError) -> ScriptError {
    ScriptError::error(err.to_string())
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn stat_value(info: &FileInfo) -> Value {
    Value::object([
        ("name", Value::string(&info.name)),
        ("path", Value::string(&info.path)),
        ("type", Value::string(info.file_type.as_str())),
        ("size", Value::Number(info.size as f64)),
        ("isFile", Value::Bool(info.is_file())),
        ("isDirectory", Value::Bool(info.is_dir())),
        ("mtime", Value::Number(info.mtime_millis() as f64)),
        ("ctime", Value::Number(info.ctime_millis() as f64)),
    ])
}

pub(super) async fn call(vfs: &dyn Vfs, method: &str, args: &[Value]) -> ScriptResult<Value> {
    if method == "cwd" {
        return Ok(Value::String(vfs.cwd()));
    }
    let path = path_arg(method, args)?;
    match method {
        "read" => vfs.read(&path).await.map(Value::String).map_err(|e| vfs_error(&e)),
        "write" => vfs
            .write(&path, &content_arg(args))
            .await
            .map(|()| Value::Undefined)
            .map_err(|e| vfs_error(&e)),
        "append" => vfs
            .append(&path, &content_arg(args))
            .await
            .map(|()| Value::Undefined)
            .map_err(|e| vfs_error(&e)),
        "exists" => Ok(Value::Bool(vfs.exists(&path))),
        "isFile" => Ok(Value::Bool(vfs.is_file(&path))),
        "isDirectory" => Ok(Value::Bool(vfs.is_directory(&path))),
        "resolve" => Ok(Value::String(vfs.resolve(&path))),
        "stat" => vfs.stat(&path).map(|info| stat_value(&info)).map_err(|e| vfs_error(&e)),
        "list" => vfs
            .list(&path)
            .map(|entries| Value::Array(entries.iter().map(stat_value).collect()))
            .map_err(|e| vfs_error(&e)),
        "mkdir" => vfs
            .mkdir(&path, recursive_arg(args))
            .map(|()| Value::Undefined)
            .map_err(|e| vfs_error(&e)),
        "remove" => vfs
            .remove(&path, recursive_arg(args))
            .map(|()| Value::Undefined)
            .map_err(|e| vfs_error(&e)),
        _ => Err(ScriptError::Type(format!("fs.{method} is not a function"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trx_vfs::MemoryVfs;

    fn vfs() -> MemoryVfs {
        MemoryVfs::new("test").with_dirs(&["/home/user"])
    }

    #[tokio::test]
    async fn test_write_read_append() {
        let vfs = vfs();
        vfs.set_cwd("/home/user").unwrap();
        call(&vfs, "write", &["a.txt".into(), "one".into()]).await.unwrap();
        call(&vfs, "append", &["a.txt".into(), "two".into()]).await.unwrap();
        let text = call(&vfs, "read", &["/home/user/a.txt".into()]).await.unwrap();
        assert_eq!(text, Value::string("onetwo"));
        assert_eq!(
            call(&vfs, "resolve", &["a.txt".into()]).await.unwrap(),
            Value::string("/home/user/a.txt")
        );
    }

    #[tokio::test]
    async fn test_mkdir_and_remove_are_recursive() {
        let vfs = vfs();
        call(&vfs, "mkdir", &["/x/y/z".into()]).await.unwrap();
        assert_eq!(call(&vfs, "isDirectory", &["/x/y/z".into()]).await.unwrap(), Value::Bool(true));
        call(&vfs, "remove", &["/x".into()]).await.unwrap();
        assert_eq!(call(&vfs, "exists", &["/x".into()]).await.unwrap(), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_errors_are_thrown() {
        let vfs = vfs();
        let err = call(&vfs, "read", &["/missing".into()]).await.unwrap_err();
        assert!(err.message().contains("No such file or directory"));
        let err = call(&vfs, "read", &[]).await.unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)));
    }

    #[tokio::test]
    async fn test_list_entries() {
        let vfs = vfs();
        vfs.insert_file("/home/user/b.txt", "bb").unwrap();
        let Value::Array(entries) = call(&vfs, "list", &["/home/user".into()]).await.unwrap() else {
            panic!("expected array");
        };
        assert_eq!(entries.len(), 1);
        let Value::Object(entry) = &entries[0] else {
            panic!("expected object");
        };
        assert_eq!(entry["name"], Value::string("b.txt"));
        assert_eq!(entry["size"], Value::Number(2.0));
        assert_eq!(entry["isFile"], Value::Bool(true));
    }
}
