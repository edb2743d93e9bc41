use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};

use regex::Regex;
use tokio::sync::OnceCell;

use crate::config::{expand_path, Config};
use crate::models::{Dependency, SourceKind};
use crate::shell::Shell;

use super::SourceError;

/// Version comparators recognised in requirement lines. The comparator and
/// everything after it are discarded; only the leading package name matters.
const VERSION_OPERATORS: [&str; 6] = ["<", ">", "<=", ">=", "==", "!="];

const REQUIREMENTS_TXT: &str = "requirements.txt";

/// Matches a leading package name, optionally followed by a version
/// comparator. Lines that match nothing (blank, comments, `-r` directives)
/// carry no package.
static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"^(\w+)({})?", VERSION_OPERATORS.join("|"));
    Regex::new(&pattern).unwrap()
});

/// Dependency source for pip-managed Python projects.
///
/// Applies when the project configures a virtual environment whose `bin/pip`
/// is executable and the working directory holds a `requirements.txt`.
/// Resolution asks that pip, not the manifest, what is actually installed:
/// one `pip show` per declared package, mapped to a record pointing at the
/// package's `.dist-info` directory.
pub struct PipSource<'a, S> {
    config: &'a Config,
    shell: S,
    /// Full result set, computed once per instance.
    dependencies: OnceCell<Vec<Dependency>>,
    /// Resolved virtual-env directory. The outer cell distinguishes "not yet
    /// resolved" from the inner `None`, "resolved and there is none".
    virtual_env_dir: OnceLock<Option<PathBuf>>,
}

impl<'a, S: Shell> PipSource<'a, S> {
    pub fn new(config: &'a Config, shell: S) -> Self {
        Self {
            config,
            shell,
            dependencies: OnceCell::new(),
            virtual_env_dir: OnceLock::new(),
        }
    }

    /// Virtual environment directory from `[python] virtual_env_dir`, expanded
    /// against the project root once and cached for the source's lifetime.
    fn virtual_env_dir(&self) -> Option<&Path> {
        self.virtual_env_dir
            .get_or_init(|| {
                let dir = self.config.python.virtual_env_dir.as_deref()?;
                Some(expand_path(dir, &self.config.root))
            })
            .as_deref()
    }

    /// The pip executable every metadata query goes through.
    fn virtual_env_pip(&self) -> Option<PathBuf> {
        Some(self.virtual_env_dir()?.join("bin").join("pip"))
    }

    async fn resolve_all(&self) -> Result<Vec<Dependency>, SourceError> {
        use futures::future::try_join_all;

        const BATCH_SIZE: usize = 8;

        let Some(pip) = self.virtual_env_pip() else {
            return Err(SourceError::Disabled {
                kind: SourceKind::Pip,
            });
        };

        let manifest = self.config.working_dir().join(REQUIREMENTS_TXT);
        let names = parse_requirements(&manifest)?;

        // Each query is independent, so run them in small concurrent batches.
        // try_join_all keeps manifest order and aborts the whole resolution on
        // the first failure; a partially resolved set is never returned.
        let mut dependencies = Vec::with_capacity(names.len());
        for batch in names.chunks(BATCH_SIZE) {
            let queries: Vec<_> = batch.iter().map(|name| self.show(&pip, name)).collect();
            dependencies.extend(try_join_all(queries).await?);
        }

        Ok(dependencies)
    }

    /// Ask pip for one package's installed metadata and shape it into a record.
    async fn show(&self, pip: &Path, name: &str) -> Result<Dependency, SourceError> {
        let stdout = self
            .shell
            .run(pip, &["--disable-pip-version-check", "show", name])
            .await
            .map_err(|source| SourceError::Tool {
                name: name.to_string(),
                source,
            })?;

        let metadata = PackageMetadata::parse(&stdout);
        let package = metadata.require(name, "Name")?;
        let version = metadata.require(name, "Version")?;
        let location = metadata.require(name, "Location")?;

        // The conventional per-package metadata directory. A guess: downstream
        // license detection decides what to do when it does not exist.
        let path = Path::new(location).join(format!("{package}-{version}.dist-info"));

        Ok(Dependency {
            path,
            kind: SourceKind::Pip,
            name: package.to_string(),
            version: version.to_string(),
            summary: metadata.get("Summary").map(str::to_string),
            homepage: metadata.get("Home-page").map(str::to_string),
        })
    }
}

impl<S: Shell> super::Source for PipSource<'_, S> {
    fn kind(&self) -> SourceKind {
        SourceKind::Pip
    }

    fn enabled(&self) -> bool {
        let Some(pip) = self.virtual_env_pip() else {
            return false;
        };
        if !self.shell.tool_available(&pip) {
            return false;
        }
        self.config.working_dir().join(REQUIREMENTS_TXT).exists()
    }

    async fn dependencies(&self) -> Result<&[Dependency], SourceError> {
        self.dependencies
            .get_or_try_init(|| self.resolve_all())
            .await
            .map(Vec::as_slice)
    }
}

/// Extract declared package names from `requirements.txt`, manifest order
/// preserved, duplicates included. Lines that do not start with a package
/// name are skipped without error.
fn parse_requirements(path: &Path) -> Result<Vec<String>, SourceError> {
    let content =
        std::fs::read_to_string(path).map_err(|source| SourceError::ManifestUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(content
        .lines()
        .filter_map(|line| PACKAGE_RE.captures(line.trim()))
        .map(|captures| captures[1].to_string())
        .collect())
}

/// Parsed `pip show` output: a loose field map over `Key: value` lines.
struct PackageMetadata {
    fields: HashMap<String, String>,
}

impl PackageMetadata {
    /// Split each line at the first colon, trimming both sides. Lines without
    /// a key contribute nothing; an empty value is kept as an empty string; a
    /// repeated key keeps its last value.
    fn parse(raw: &str) -> Self {
        let mut fields = HashMap::new();
        for line in raw.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            fields.insert(key.to_string(), value.trim().to_string());
        }
        Self { fields }
    }

    fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Accessor for the fields a record cannot be built without.
    fn require(&self, package: &str, field: &'static str) -> Result<&str, SourceError> {
        self.get(field).ok_or_else(|| SourceError::MissingField {
            name: package.to_string(),
            field,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;
    use crate::config::PythonConfig;
    use crate::shell::ShellError;
    use crate::source::Source;

    /// Canned `pip show` transcripts keyed by package name; querying anything
    /// else fails the way a vanished executable would.
    struct FakeShell {
        responses: HashMap<String, String>,
        calls: AtomicUsize,
        available: bool,
    }

    impl FakeShell {
        fn new(responses: &[(&str, &str)]) -> Self {
            Self {
                responses: responses
                    .iter()
                    .map(|(name, out)| (name.to_string(), out.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
                available: true,
            }
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Shell for FakeShell {
        fn tool_available(&self, _tool: &Path) -> bool {
            self.available
        }

        async fn run(&self, _tool: &Path, args: &[&str]) -> Result<String, ShellError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = *args.last().unwrap();
            self.responses
                .get(name)
                .cloned()
                .ok_or_else(|| ShellError::Spawn {
                    command: format!("pip --disable-pip-version-check show {name}"),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
                })
        }
    }

    const FLASK_SHOW: &str = "Name: Flask\n\
        Version: 2.3.1\n\
        Summary: A web framework.\n\
        Home-page: https://palletsprojects.com/p/flask\n\
        Location: /usr/lib/python3/site-packages\n\
        Requires: click, jinja2\n";

    const REQUESTS_SHOW: &str = "Name: requests\n\
        Version: 2.31.0\n\
        Summary: Python HTTP for Humans.\n\
        Home-page: https://requests.readthedocs.io\n\
        Location: /usr/lib/python3/site-packages\n";

    fn project(requirements: Option<&str>, venv: Option<&str>) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        if let Some(contents) = requirements {
            std::fs::write(dir.path().join("requirements.txt"), contents).unwrap();
        }
        let config = Config {
            root: dir.path().to_path_buf(),
            pwd: None,
            python: PythonConfig {
                virtual_env_dir: venv.map(str::to_string),
            },
        };
        (dir, config)
    }

    #[test]
    fn test_parse_requirements_extracts_names() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(
            &manifest,
            "requests==2.31.0\nflask>=2.0\n# comment\n\n-r other.txt\nscipy\nnumpy!=1.26.0\n",
        )
        .unwrap();

        let names = parse_requirements(&manifest).unwrap();
        assert_eq!(names, ["requests", "flask", "scipy", "numpy"]);
    }

    #[test]
    fn test_parse_requirements_stops_at_non_word_chars() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(&manifest, "zope.interface==5.0\nFlask_Login>=0.6\n").unwrap();

        let names = parse_requirements(&manifest).unwrap();
        assert_eq!(names, ["zope", "Flask_Login"]);
    }

    #[test]
    fn test_parse_requirements_keeps_duplicates() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(&manifest, "requests==1.0\nrequests==2.0\n").unwrap();

        let names = parse_requirements(&manifest).unwrap();
        assert_eq!(names, ["requests", "requests"]);
    }

    #[test]
    fn test_parse_requirements_missing_file_is_fatal() {
        let err = parse_requirements(Path::new("/nonexistent/requirements.txt")).unwrap_err();
        assert!(matches!(err, SourceError::ManifestUnreadable { .. }));
    }

    #[test]
    fn test_metadata_last_duplicate_wins() {
        let metadata = PackageMetadata::parse("Name: first\nName: second\n");
        assert_eq!(metadata.get("Name"), Some("second"));
    }

    #[test]
    fn test_metadata_drops_lines_without_key() {
        let metadata = PackageMetadata::parse(": stray value\nnot a field line\nName: x\n");
        assert_eq!(metadata.fields.len(), 1);
        assert_eq!(metadata.get("Name"), Some("x"));
    }

    #[test]
    fn test_metadata_keeps_empty_values() {
        let metadata = PackageMetadata::parse("Summary:\nName: x\n");
        assert_eq!(metadata.get("Summary"), Some(""));
    }

    #[test]
    fn test_metadata_splits_at_first_colon() {
        let metadata = PackageMetadata::parse("Home-page: https://example.com/a:b\n");
        assert_eq!(metadata.get("Home-page"), Some("https://example.com/a:b"));
    }

    #[test]
    fn test_enabled_false_without_virtual_env() {
        let (_dir, config) = project(Some("flask==2.3.1\n"), None);
        let source = PipSource::new(&config, FakeShell::new(&[]));
        assert!(!source.enabled());
    }

    #[test]
    fn test_enabled_false_when_pip_not_executable() {
        let (_dir, config) = project(Some("flask==2.3.1\n"), Some("venv"));
        let source = PipSource::new(&config, FakeShell::new(&[]).unavailable());
        assert!(!source.enabled());
    }

    #[test]
    fn test_enabled_false_without_manifest() {
        let (_dir, config) = project(None, Some("venv"));
        let source = PipSource::new(&config, FakeShell::new(&[]));
        assert!(!source.enabled());
    }

    #[test]
    fn test_enabled_when_venv_pip_and_manifest_present() {
        let (_dir, config) = project(Some("flask==2.3.1\n"), Some("venv"));
        let source = PipSource::new(&config, FakeShell::new(&[]));
        assert!(source.enabled());
    }

    #[test]
    fn test_virtual_env_dir_expands_against_root() {
        let (dir, config) = project(None, Some("venv"));
        let source = PipSource::new(&config, FakeShell::new(&[]));

        let venv = dir.path().join("venv");
        assert_eq!(source.virtual_env_dir(), Some(venv.as_path()));
        assert_eq!(
            source.virtual_env_pip(),
            Some(venv.join("bin").join("pip"))
        );
    }

    #[test]
    fn test_virtual_env_dir_absent_is_cached_none() {
        let (_dir, config) = project(None, None);
        let source = PipSource::new(&config, FakeShell::new(&[]));
        assert_eq!(source.virtual_env_dir(), None);
        assert_eq!(source.virtual_env_dir(), None);
        assert_eq!(source.virtual_env_pip(), None);
    }

    #[tokio::test]
    async fn test_resolves_in_manifest_order() {
        let (_dir, config) = project(Some("flask==2.3.1\n# comment\nrequests>=2.0\n"), Some("venv"));
        let shell = FakeShell::new(&[("flask", FLASK_SHOW), ("requests", REQUESTS_SHOW)]);
        let source = PipSource::new(&config, shell);

        let deps = source.dependencies().await.unwrap();
        assert_eq!(deps.len(), 2);

        assert_eq!(deps[0].name, "Flask");
        assert_eq!(deps[0].version, "2.3.1");
        assert_eq!(deps[0].kind, SourceKind::Pip);
        assert_eq!(
            deps[0].path,
            Path::new("/usr/lib/python3/site-packages/Flask-2.3.1.dist-info")
        );
        assert_eq!(deps[0].summary.as_deref(), Some("A web framework."));
        assert_eq!(
            deps[0].homepage.as_deref(),
            Some("https://palletsprojects.com/p/flask")
        );

        assert_eq!(deps[1].name, "requests");
        assert_eq!(deps[1].kind, SourceKind::Pip);
    }

    #[tokio::test]
    async fn test_resolves_across_batches_in_order() {
        let requirements: String = (0..10).map(|i| format!("pkg{i}==1.0\n")).collect();
        let shows: Vec<(String, String)> = (0..10)
            .map(|i| {
                (
                    format!("pkg{i}"),
                    format!("Name: pkg{i}\nVersion: 1.0\nLocation: /sp\n"),
                )
            })
            .collect();
        let pairs: Vec<(&str, &str)> = shows
            .iter()
            .map(|(name, out)| (name.as_str(), out.as_str()))
            .collect();

        let (_dir, config) = project(Some(&requirements), Some("venv"));
        let source = PipSource::new(&config, FakeShell::new(&pairs));

        let deps = source.dependencies().await.unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("pkg{i}")).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_dependencies_cached_after_first_call() {
        let (_dir, config) = project(Some("flask==2.3.1\nrequests>=2.0\n"), Some("venv"));
        let shell = FakeShell::new(&[("flask", FLASK_SHOW), ("requests", REQUESTS_SHOW)]);
        let source = PipSource::new(&config, shell);

        let first = source.dependencies().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(source.shell.calls(), 2);

        let second = source.dependencies().await.unwrap();
        assert_eq!(second.len(), 2);
        // No further pip invocations: the memoized set was returned.
        assert_eq!(source.shell.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_aborts_without_partial_results() {
        let (_dir, config) = project(Some("flask==2.3.1\nrequests>=2.0\n"), Some("venv"));
        let shell = FakeShell::new(&[("flask", FLASK_SHOW)]);
        let source = PipSource::new(&config, shell);

        let err = source.dependencies().await.unwrap_err();
        match err {
            SourceError::Tool { name, .. } => assert_eq!(name, "requests"),
            other => panic!("expected Tool error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_location_field_is_distinct_error() {
        let (_dir, config) = project(Some("flask==2.3.1\n"), Some("venv"));
        let shell = FakeShell::new(&[("flask", "Name: Flask\nVersion: 2.3.1\n")]);
        let source = PipSource::new(&config, shell);

        let err = source.dependencies().await.unwrap_err();
        match err {
            SourceError::MissingField { name, field } => {
                assert_eq!(name, "flask");
                assert_eq!(field, "Location");
            }
            other => panic!("expected MissingField error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dependencies_without_virtual_env_is_disabled() {
        let (_dir, config) = project(Some("flask==2.3.1\n"), None);
        let source = PipSource::new(&config, FakeShell::new(&[]));

        let err = source.dependencies().await.unwrap_err();
        assert!(matches!(err, SourceError::Disabled { .. }));
    }
}
