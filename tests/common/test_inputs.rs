//! Builders for unit fixtures on disk and in memory

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::json;
use tempfile::TempDir;

use dexshard::{CompiledUnit, FieldSymbol, MethodSymbol};

/// In-memory unit whose payload is its own name. Fields and methods are
/// declared on a shared owner `LT;`.
pub fn unit(name: &str, fields: &[&str], methods: &[&str]) -> CompiledUnit {
    unit_owned(name, "LT;", fields, methods)
}

/// In-memory unit with symbols declared on `owner`
pub fn unit_owned(name: &str, owner: &str, fields: &[&str], methods: &[&str]) -> CompiledUnit {
    CompiledUnit::new(
        name,
        name.as_bytes().to_vec(),
        fields.iter().map(|f| FieldSymbol::new(owner, *f, "I")),
        methods
            .iter()
            .map(|m| MethodSymbol::new(owner, *m, Vec::<String>::new(), "V")),
    )
}

/// One manifest entry to be written by `TestInputs::manifest`
#[derive(Debug, Clone)]
pub struct UnitSpec {
    pub name: String,
    pub payload: Vec<u8>,
    pub fields: Vec<String>,
    pub methods: Vec<String>,
    pub declared_size: Option<u64>,
    pub stored: bool,
}

impl UnitSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            payload: name.as_bytes().to_vec(),
            fields: Vec::new(),
            methods: Vec::new(),
            declared_size: None,
            stored: true,
        }
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn compressed(mut self) -> Self {
        self.stored = false;
        self
    }
}

/// Temp directory holding manifests, payload files and outputs
pub struct TestInputs {
    dir: TempDir,
}

impl TestInputs {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Output directory inside the temp dir
    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Write payloads for `units` under `<stem>/` and a manifest `<stem>.json`
    pub fn manifest(&self, stem: &str, units: &[UnitSpec]) -> PathBuf {
        let payload_dir = self.dir.path().join(stem);
        fs::create_dir_all(&payload_dir).expect("Failed to create payload dir");

        let entries: Vec<_> = units
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let file = format!("{}/{}.bin", stem, i);
                fs::write(self.dir.path().join(&file), &spec.payload)
                    .expect("Failed to write payload");
                let fields: Vec<_> = spec
                    .fields
                    .iter()
                    .map(|f| json!({"owner": "LT;", "name": f, "type": "I"}))
                    .collect();
                let methods: Vec<_> = spec
                    .methods
                    .iter()
                    .map(|m| json!({"owner": "LT;", "name": m, "params": [], "return": "V"}))
                    .collect();
                let mut entry = json!({
                    "name": spec.name,
                    "path": file,
                    "stored": spec.stored,
                    "fields": fields,
                    "methods": methods,
                });
                if let Some(size) = spec.declared_size {
                    entry["size"] = json!(size);
                }
                entry
            })
            .collect();

        let path = self.dir.path().join(format!("{}.json", stem));
        let manifest = json!({ "units": entries });
        fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap())
            .expect("Failed to write manifest");
        path
    }

    /// Write a text file relative to the temp dir
    pub fn add_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative_path);
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Run the dexshard binary with the temp dir as working directory
    pub fn run_cli(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_dexshard"))
            .current_dir(self.path())
            .args(args)
            .output()
            .expect("Failed to run CLI")
    }

    /// Run CLI and expect success, return stdout
    pub fn run_cli_success(&self, args: &[&str]) -> String {
        let output = self.run_cli(args);
        assert!(
            output.status.success(),
            "CLI command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run CLI and expect failure, return (exit code, stderr)
    pub fn run_cli_failure(&self, args: &[&str]) -> (i32, String) {
        let output = self.run_cli(args);
        assert!(
            !output.status.success(),
            "CLI command {:?} should have failed",
            args
        );
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }
}
