use anyhow::Result;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run the CLI binary against the configuration in `temp_dir`
fn run_cli(temp_dir: &TempDir, args: &[&str]) -> Result<std::process::Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_docqa"));
    cmd.current_dir(temp_dir.path())
        .arg("--config")
        .arg(temp_dir.path().join("docqa.toml"))
        .args(args);

    let output = cmd.output()?;
    Ok(output)
}

/// Helper to write an offline configuration and a small corpus
fn write_workspace(temp_dir: &TempDir) -> Result<()> {
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("corpus"))?;
    std::fs::write(
        root.join("corpus/rbi.txt"),
        "RBI stands for Reserve Bank of India. It regulates banks.",
    )?;
    std::fs::write(
        root.join("corpus/hindi.md"),
        "भारतीय रिज़र्व बैंक देश का केंद्रीय बैंक है।",
    )?;
    std::fs::write(
        root.join("docqa.toml"),
        format!(
            r#"
data_dir = "{data_dir}"
corpus = "{corpus}"
top_k = 2

[[spaces]]
name = "hindi"
script = "devanagari"
[spaces.embedding]
model_name = "hashing-256"
backend = {{ kind = "hashing", dimension = 256 }}

[[spaces]]
name = "english"
script = "latin"
[spaces.embedding]
model_name = "hashing-256"
backend = {{ kind = "hashing", dimension = 256 }}
"#,
            data_dir = toml_path(&root.join("cache")),
            corpus = toml_path(&root.join("corpus")),
        ),
    )?;
    Ok(())
}

fn toml_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_cli_help() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_cli(&temp_dir, &["--help"])?;

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Ask questions about a document corpus"));
    for command in ["build", "query", "ask", "batch", "status", "detect", "clean"] {
        assert!(text.contains(command), "help is missing {command}");
    }
    Ok(())
}

#[test]
fn test_cli_detect() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_workspace(&temp_dir)?;

    let output = run_cli(&temp_dir, &["detect", "भारत क्या है"])?;
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Script: devanagari"));
    assert!(text.contains("Space: hindi"));

    let output = run_cli(&temp_dir, &["detect", "12345"])?;
    assert!(stdout(&output).contains("none (unsupported)"));
    Ok(())
}

#[test]
fn test_cli_build_then_reuse() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_workspace(&temp_dir)?;

    let output = run_cli(&temp_dir, &["build"])?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("english (latin): Built, 3 chunks, dimension 256"));
    assert!(temp_dir.path().join("cache/english_faiss.index").exists());
    assert!(temp_dir.path().join("cache/hindi_content_chunks.json").exists());

    let output = run_cli(&temp_dir, &["build"])?;
    assert!(stdout(&output).contains("english (latin): Loaded"));

    let output = run_cli(&temp_dir, &["build", "--force"])?;
    assert!(stdout(&output).contains("english (latin): Built"));
    Ok(())
}

#[test]
fn test_cli_clean_removes_indices() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_workspace(&temp_dir)?;

    run_cli(&temp_dir, &["build"])?;
    assert!(temp_dir.path().join("cache/english_faiss.index").exists());

    let output = run_cli(&temp_dir, &["clean"])?;
    assert!(output.status.success());
    assert!(!temp_dir.path().join("cache/english_faiss.index").exists());
    assert!(!temp_dir.path().join("cache/hindi_content_chunks.json").exists());
    Ok(())
}

#[test]
fn test_cli_query_json() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_workspace(&temp_dir)?;

    let output = run_cli(
        &temp_dir,
        &["query", "What does RBI stand for?", "-k", "1", "--format", "json"],
    )?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let hits: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let hits = hits.as_array().expect("query output should be a JSON array");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["text"], "RBI stands for Reserve Bank of India.");
    Ok(())
}

#[test]
fn test_cli_ask() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_workspace(&temp_dir)?;

    let output = run_cli(&temp_dir, &["ask", "What does RBI stand for?"])?;
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("RBI stands for Reserve Bank of India."));

    let output = run_cli(&temp_dir, &["ask", "12345"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("not supported"));
    Ok(())
}

#[test]
fn test_cli_status() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_workspace(&temp_dir)?;

    let output = run_cli(&temp_dir, &["status", "--format", "json"])?;
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["overall_status"], "Warning");
    assert_eq!(report["spaces"][0]["artifact"]["state"], "missing");

    run_cli(&temp_dir, &["build"])?;
    let output = run_cli(&temp_dir, &["status", "--format", "json"])?;
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["overall_status"], "Healthy");
    assert_eq!(report["spaces"][1]["info"]["count"], 3);
    Ok(())
}

#[test]
fn test_cli_batch() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_workspace(&temp_dir)?;
    let input = temp_dir.path().join("questions.csv");
    std::fs::write(&input, "Questions\nWhat does RBI stand for?\n\n")?;

    let output = run_cli(
        &temp_dir,
        &[
            "batch",
            "--input",
            &input.to_string_lossy(),
            "--output",
            &temp_dir.path().join("answers.csv").to_string_lossy(),
        ],
    )?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Answered 1 of 1 questions"));

    let written = std::fs::read_to_string(temp_dir.path().join("answers.csv"))?;
    assert!(written.starts_with("Questions,Responses\n"));
    Ok(())
}

#[test]
fn test_cli_query_without_index_or_corpus_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::write(
        temp_dir.path().join("docqa.toml"),
        format!(
            "data_dir = \"{}\"\n\n[[spaces]]\nname = \"english\"\nscript = \"latin\"\n\
             [spaces.embedding]\nmodel_name = \"hashing-16\"\n\
             backend = {{ kind = \"hashing\", dimension = 16 }}\n",
            toml_path(&temp_dir.path().join("cache"))
        ),
    )?;

    let output = run_cli(&temp_dir, &["query", "anything"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No index has been built yet"));
    Ok(())
}
