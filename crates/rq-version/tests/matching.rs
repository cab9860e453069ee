use rq_version::{Version, VersionError, VersionSpecifier, VersionSpecifiers};

type Result<T> = std::result::Result<T, VersionError>;

fn matches(spec: &str, version: &str) -> Result<bool> {
    Ok(VersionSpecifiers::parse(spec)?.contains(&Version::parse(version)?))
}

#[test]
fn exact_pins() -> Result<()> {
    assert!(matches("==1.33.0", "1.33.0")?);
    assert!(matches("==1.33", "1.33.0")?);
    assert!(matches("==1.33.0", "1.33.0+cpu")?);
    assert!(!matches("==1.33.0+cpu", "1.33.0")?);
    assert!(!matches("==1.33.0", "1.33.1")?);
    assert!(matches("!=1.33.0", "1.33.1")?);
    Ok(())
}

#[test]
fn prefix_matching() -> Result<()> {
    assert!(matches("==3.7.*", "3.7.0")?);
    assert!(matches("==3.7.*", "3.7.2rc1")?);
    assert!(matches("==3.7.*", "3.7")?);
    assert!(!matches("==3.7.*", "3.8.0")?);
    assert!(matches("!=3.7.*", "3.8.0")?);
    assert!(!matches("==1.*", "2!1.0")?);
    Ok(())
}

#[test]
fn ordered_comparisons() -> Result<()> {
    assert!(matches(">=1.0,<2.0", "1.5")?);
    assert!(!matches(">=1.0,<2.0", "2.0")?);
    assert!(matches("<=2.0", "2.0+local")?);
    assert!(!matches("<2.0", "2.0rc1")?);
    assert!(matches("<2.0rc2", "2.0rc1")?);
    assert!(!matches(">1.0", "1.0.post1")?);
    assert!(matches(">1.0.post1", "1.0.post2")?);
    assert!(!matches(">1.0", "1.0+local")?);
    assert!(matches(">1.0", "1.0.1")?);
    Ok(())
}

#[test]
fn compatible_release() -> Result<()> {
    assert!(matches("~=2.2", "2.3")?);
    assert!(!matches("~=2.2", "3.0")?);
    assert!(matches("~=1.4.5", "1.4.9")?);
    assert!(!matches("~=1.4.5", "1.5.0")?);
    assert!(!matches("~=1.4.5", "1.4.4")?);
    Ok(())
}

#[test]
fn display_is_canonical() -> Result<()> {
    let spec: VersionSpecifier = "~= v1.4.5-alpha".parse()?;
    assert_eq!(spec.to_string(), "~=1.4.5a0");
    let reparsed: VersionSpecifier = spec.to_string().parse()?;
    assert_eq!(reparsed, spec);
    Ok(())
}
