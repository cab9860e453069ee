use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::{tempdir, TempDir};

static BIN: &str = env!("CARGO_BIN_EXE_rq");

const EXAMPLE: &str = "\
streamlit==1.33.0
en-core-web-sm @ https://github.com/explosion/spacy-models/releases/download/en_core_web_sm-3.7.0/en_core_web_sm-3.7.0.tar.gz
";

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn project(requirements: &str) -> Result<TempDir> {
    let dir = tempdir()?;
    fs::write(dir.path().join("requirements.txt"), requirements)?;
    Ok(dir)
}

fn rq(root: &Path, args: &[&str]) -> Result<Output> {
    Ok(Command::new(BIN)
        .args(args)
        .arg("--root")
        .arg(root)
        .arg("--config")
        .arg(root.join("no-such-config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?)
}

fn json(output: &Output) -> Result<Value> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn codes(findings: &Value) -> Vec<String> {
    findings
        .as_array()
        .map(|all| {
            all.iter()
                .filter_map(|f| f["code"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn format_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("stderr:\n{stderr}\nstdout:\n{stdout}")
}

#[test]
fn check_example_manifest() -> Result<()> {
    let dir = project(EXAMPLE)?;
    let output = rq(dir.path(), &["check"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("looks good"));
    Ok(())
}

#[test]
fn check_reports_duplicates() -> Result<()> {
    let dir = project("requests\nnumpy\nRequests==2.31.0\n")?;
    let output = rq(dir.path(), &["check", "--json"])?;
    assert!(!output.status.success(), "{}", format_output(&output));
    let findings = json(&output)?;
    assert_eq!(codes(&findings), vec!["name::duplicate"]);
    assert_eq!(findings[0]["line"], 3);
    assert_eq!(findings[0]["severity"], "error");
    Ok(())
}

#[test]
fn check_reports_every_parse_error() -> Result<()> {
    let dir = project("streamlit banana\nok\nen-core-web-sm @ not a url\n")?;
    let output = rq(dir.path(), &["check", "--json"])?;
    assert!(!output.status.success(), "{}", format_output(&output));
    let findings = json(&output)?;
    assert_eq!(codes(&findings), vec!["manifest::parse", "manifest::parse"]);
    assert_eq!(findings[1]["line"], 3);
    Ok(())
}

#[test]
fn check_renders_diagnostics() -> Result<()> {
    let dir = project("foo\nfoo\n")?;
    let output = rq(dir.path(), &["check"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rq::check::name::duplicate"), "{stderr}");
    assert!(stderr.contains("rq::check::failed"), "{stderr}");
    Ok(())
}

#[test]
fn pins_from_flag_or_config() -> Result<()> {
    let dir = project("flask>=3\nstreamlit==1.33.0\n")?;
    let output = rq(dir.path(), &["check", "--json"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    assert!(codes(&json(&output)?).is_empty());

    let output = rq(dir.path(), &["check", "--json", "--require-pins"])?;
    // Unpinned declarations are only warnings.
    assert!(output.status.success(), "{}", format_output(&output));
    assert_eq!(codes(&json(&output)?), vec!["version::unpinned"]);

    fs::write(dir.path().join("rqrc.toml"), "require_pins = true\n")?;
    let output = rq(dir.path(), &["check", "--json"])?;
    assert_eq!(codes(&json(&output)?), vec!["version::unpinned"]);
    Ok(())
}

#[test]
fn url_sources_can_be_forbidden() -> Result<()> {
    let dir = project(EXAMPLE)?;
    let output = rq(dir.path(), &["check", "--json", "--no-urls"])?;
    assert!(!output.status.success(), "{}", format_output(&output));
    assert_eq!(codes(&json(&output)?), vec!["url::forbidden"]);
    Ok(())
}

#[test]
fn check_follows_includes() -> Result<()> {
    let dir = project("-r base.txt\nflask==3.0.2\n")?;
    fs::write(dir.path().join("base.txt"), "Flask>=2\n")?;

    let output = rq(dir.path(), &["check", "--json"])?;
    assert!(!output.status.success(), "{}", format_output(&output));
    let findings = json(&output)?;
    assert_eq!(codes(&findings), vec!["name::duplicate"]);
    assert!(findings[0]["file"]
        .as_str()
        .unwrap_or_default()
        .ends_with("base.txt"));

    let output = rq(dir.path(), &["check", "--json", "--no-includes"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    Ok(())
}

#[test]
fn constraints_may_repeat_requirements() -> Result<()> {
    let dir = project("-c constraints.txt\nrequests\n")?;
    fs::write(dir.path().join("constraints.txt"), "requests==2.31.0\n")?;
    let output = rq(dir.path(), &["check", "--json"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    assert!(codes(&json(&output)?).is_empty());

    fs::write(
        dir.path().join("constraints.txt"),
        "requests==2.31.0\nRequests<3\n",
    )?;
    let output = rq(dir.path(), &["check", "--json"])?;
    assert!(!output.status.success(), "{}", format_output(&output));
    let findings = json(&output)?;
    assert_eq!(codes(&findings), vec!["name::duplicate"]);
    assert_eq!(findings[0]["line"], 2);
    Ok(())
}

#[test]
fn parse_errors_in_includes_keep_other_findings() -> Result<()> {
    let dir = project("foo\nfoo\n-r bad.txt\n")?;
    fs::write(dir.path().join("bad.txt"), "bad name!\n")?;
    let output = rq(dir.path(), &["check", "--json"])?;
    assert!(!output.status.success(), "{}", format_output(&output));
    let findings = json(&output)?;
    assert_eq!(codes(&findings), vec!["name::duplicate", "manifest::parse"]);
    assert!(findings[1]["file"]
        .as_str()
        .unwrap_or_default()
        .ends_with("bad.txt"));
    Ok(())
}

#[test]
fn list_json() -> Result<()> {
    let dir = project(EXAMPLE)?;
    let output = rq(dir.path(), &["list", "--json"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    let listed = json(&output)?;
    assert_eq!(listed[0]["name"], "streamlit");
    assert_eq!(listed[0]["constraint"], "==1.33.0");
    assert_eq!(listed[0]["source"], "index");
    assert_eq!(listed[0]["line"], 1);
    assert_eq!(listed[1]["name"], "en-core-web-sm");
    assert_eq!(listed[1]["normalized"], "en-core-web-sm");
    assert_eq!(listed[1]["constraint"], Value::Null);
    assert_eq!(
        listed[1]["source"],
        "https://github.com/explosion/spacy-models/releases/download/en_core_web_sm-3.7.0/en_core_web_sm-3.7.0.tar.gz"
    );
    Ok(())
}

#[test]
fn list_table() -> Result<()> {
    let dir = project("Django[bcrypt] ~= 4.2\n")?;
    let output = rq(dir.path(), &["list"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Django[bcrypt]"), "{stdout}");
    assert!(stdout.contains("~=4.2"), "{stdout}");
    assert!(stdout.contains("line 1"), "{stdout}");
    Ok(())
}

#[test]
fn fmt_prints_and_writes() -> Result<()> {
    let src = "# deps\nZope.Interface >= 5.0  # why not\n\n--no-index\naiohttp == 3.9.3\n";
    let dir = project(src)?;

    let output = rq(dir.path(), &["fmt", "--sort"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "--no-index\naiohttp==3.9.3\nZope.Interface>=5.0\n"
    );
    // Printing leaves the file alone.
    assert_eq!(fs::read_to_string(dir.path().join("requirements.txt"))?, src);

    let output = rq(dir.path(), &["fmt", "--write", "--quiet"])?;
    assert!(output.status.success(), "{}", format_output(&output));
    assert_eq!(
        fs::read_to_string(dir.path().join("requirements.txt"))?,
        "Zope.Interface>=5.0\n--no-index\naiohttp==3.9.3\n"
    );
    Ok(())
}

#[test]
fn missing_manifest_fails() -> Result<()> {
    let dir = tempdir()?;
    let output = rq(dir.path(), &["check"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rq::manifest::io"), "{stderr}");
    Ok(())
}
