//! engine::regen
//!
//! Regeneration strategies.
//!
//! A [`Regenerator`] produces the generator's output for one version inside a
//! working directory. The orchestrator does not care how: the production
//! variant spawns the generator as a subprocess, the in-process variant
//! renders a template function and is used for deterministic runs.
//!
//! # Contract
//!
//! - Output is written into `work_dir` only.
//! - The metadata file is read from `work_dir` and left there, with its
//!   version updated to what was generated.
//! - Running twice at the same version and configuration produces the same
//!   tree.
//!
//! # Example
//!
//! ```
//! use scaffold_upgrade::engine::regen::{RenderedFile, Regenerator, TemplateRegenerator};
//! use scaffold_upgrade::core::types::SemanticVersion;
//!
//! let regen = TemplateRegenerator::new(
//!     "generator-jhipster",
//!     SemanticVersion::parse("8.1.0").unwrap(),
//!     |ctx| Ok(vec![RenderedFile::new("README.md", format!("# {}\n", ctx.metadata.base_name))]),
//! );
//! assert_eq!(regen.installed_version().unwrap().to_string(), "8.1.0");
//! ```

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::core::generator::Generator;
use crate::core::metadata::{MetadataError, MetadataStore, ProjectMetadata, VERSION_PLACEHOLDER};
use crate::core::types::SemanticVersion;

/// Flag passed to the generator in placeholder mode.
pub const PLACEHOLDER_FLAG: &str = "--use-version-placeholders";

/// Errors from a regeneration run.
#[derive(Debug, Error)]
pub enum RegenError {
    /// The generator could not be started.
    #[error("failed to start generator '{program}'")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The generator ran and exited unsuccessfully.
    #[error("generator command '{command}' failed with {status}{}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The installed version could not be read from the generator's output.
    #[error("could not determine installed generator version from output: {output:?}")]
    UnknownVersion { output: String },

    /// The working directory has no metadata to generate from.
    #[error("no generator metadata found at '{path}'")]
    MissingMetadata { path: PathBuf },

    /// A template failed to render.
    #[error("template rendering failed: {0}")]
    Template(String),

    /// Metadata could not be read or written.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Generated output could not be written.
    #[error("failed to write '{path}'")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Parameters of one regeneration.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Version to generate; `None` means whatever is installed.
    pub version: Option<&'a SemanticVersion>,
    /// Project root to generate into.
    pub work_dir: &'a Path,
    /// Metadata file name relative to `work_dir`.
    pub metadata_file: &'a str,
    /// Render versions as placeholders.
    pub use_version_placeholders: bool,
    /// Suppress generator output.
    pub silent: bool,
}

/// A way of producing generator output.
pub trait Regenerator {
    /// Generate the project in `request.work_dir`.
    ///
    /// # Errors
    ///
    /// Any failure aborts the upgrade before the generated tree is committed.
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<(), RegenError>;

    /// Version of the generator that `latest` resolves to.
    fn installed_version(&self) -> Result<SemanticVersion, RegenError>;
}

// =============================================================================
// Process regenerator
// =============================================================================

/// Runs the generator as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRegenerator {
    generator: Generator,
    executable: Option<PathBuf>,
}

impl ProcessRegenerator {
    /// Create a regenerator that runs `generator.program` with its argument
    /// template.
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            executable: None,
        }
    }

    /// Run this executable instead, with version-less arguments.
    pub fn with_executable(mut self, executable: Option<PathBuf>) -> Self {
        self.executable = executable;
        self
    }

    /// Program and arguments for a generation run.
    pub fn command_line(&self, request: &GenerationRequest<'_>) -> (String, Vec<String>) {
        let (program, mut args) = match &self.executable {
            Some(path) => (path.display().to_string(), Generator::executable_args()),
            None => (
                self.generator.program.clone(),
                self.generator
                    .expand_args(&self.generator.args, request.version),
            ),
        };
        if request.use_version_placeholders {
            args.push(PLACEHOLDER_FLAG.to_string());
        }
        (program, args)
    }

    /// Program and arguments that print the installed version.
    pub fn version_command_line(&self) -> (String, Vec<String>) {
        match &self.executable {
            Some(path) => (path.display().to_string(), vec!["--version".to_string()]),
            None => (
                self.generator.program.clone(),
                self.generator
                    .expand_args(&self.generator.version_args, None),
            ),
        }
    }
}

impl Regenerator for ProcessRegenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<(), RegenError> {
        let (program, args) = self.command_line(request);

        let stdout = if request.silent {
            Stdio::null()
        } else {
            Stdio::inherit()
        };
        let output = Command::new(&program)
            .args(&args)
            .current_dir(request.work_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| RegenError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !request.silent && !output.stderr.is_empty() {
            let _ = std::io::stderr().write_all(&output.stderr);
        }

        if !output.status.success() {
            return Err(RegenError::Failed {
                command: render_command(&program, &args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(())
    }

    fn installed_version(&self) -> Result<SemanticVersion, RegenError> {
        let (program, args) = self.version_command_line();
        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RegenError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RegenError::Failed {
                command: render_command(&program, &args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_reported_version(&stdout).ok_or_else(|| RegenError::UnknownVersion {
            output: stdout.trim().to_string(),
        })
    }
}

fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The last whitespace-separated token of `output` that is a version.
///
/// Generators print banners and warnings around the version, so the whole
/// output is scanned from the end.
pub fn parse_reported_version(output: &str) -> Option<SemanticVersion> {
    output
        .split_whitespace()
        .rev()
        .find_map(|token| SemanticVersion::parse(token).ok())
}

// =============================================================================
// Template regenerator
// =============================================================================

/// Inputs available to a template function.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Metadata as found in the working directory.
    pub metadata: &'a ProjectMetadata,
    /// Version being generated.
    pub version: &'a SemanticVersion,
    /// Version as it should appear in output (`VERSION` in placeholder mode).
    pub version_label: &'a str,
}

/// A file produced by a template, path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: String,
    pub contents: String,
}

impl RenderedFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

type TemplateFn = dyn Fn(&TemplateContext<'_>) -> Result<Vec<RenderedFile>, String>;

/// Renders a template function in-process.
pub struct TemplateRegenerator {
    namespace: String,
    installed: SemanticVersion,
    template: Box<TemplateFn>,
}

impl fmt::Debug for TemplateRegenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRegenerator")
            .field("namespace", &self.namespace)
            .field("installed", &self.installed)
            .finish_non_exhaustive()
    }
}

impl TemplateRegenerator {
    /// Create a regenerator for metadata `namespace` that reports `installed`
    /// as its version.
    pub fn new<F>(namespace: impl Into<String>, installed: SemanticVersion, template: F) -> Self
    where
        F: Fn(&TemplateContext<'_>) -> Result<Vec<RenderedFile>, String> + 'static,
    {
        Self {
            namespace: namespace.into(),
            installed,
            template: Box::new(template),
        }
    }
}

impl Regenerator for TemplateRegenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<(), RegenError> {
        let store = MetadataStore::new(request.work_dir, request.metadata_file, &self.namespace);
        let mut metadata = store.read()?.ok_or_else(|| RegenError::MissingMetadata {
            path: store.path(),
        })?;

        let version = request.version.unwrap_or(&self.installed);
        let label = if request.use_version_placeholders {
            VERSION_PLACEHOLDER.to_string()
        } else {
            version.to_string()
        };

        let files = (self.template)(&TemplateContext {
            metadata: &metadata,
            version,
            version_label: &label,
        })
        .map_err(RegenError::Template)?;

        for file in files {
            let path = contained_path(request.work_dir, &file.path)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| RegenError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, file.contents.as_bytes())
                .map_err(|source| RegenError::Write { path, source })?;
        }

        metadata.generator_version = Some(label);
        store.write(&metadata)?;
        Ok(())
    }

    fn installed_version(&self) -> Result<SemanticVersion, RegenError> {
        Ok(self.installed.clone())
    }
}

fn contained_path(root: &Path, relative: &str) -> Result<PathBuf, RegenError> {
    let rel = Path::new(relative);
    let escapes = relative.is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(RegenError::Template(format!(
            "rendered path '{relative}' is outside the project"
        )));
    }
    Ok(root.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    fn request<'a>(dir: &'a Path, version: Option<&'a SemanticVersion>) -> GenerationRequest<'a> {
        GenerationRequest {
            version,
            work_dir: dir,
            metadata_file: ".yo-rc.json",
            use_version_placeholders: false,
            silent: true,
        }
    }

    fn seed_metadata(dir: &Path) {
        MetadataStore::new(dir, ".yo-rc.json", "generator-jhipster")
            .write(&ProjectMetadata::new("shop"))
            .unwrap();
    }

    fn readme_template() -> TemplateRegenerator {
        TemplateRegenerator::new("generator-jhipster", v("8.1.0"), |ctx| {
            Ok(vec![
                RenderedFile::new(
                    "README.md",
                    format!("# {} ({})\n", ctx.metadata.base_name, ctx.version_label),
                ),
                RenderedFile::new("src/main/app.txt", "app\n"),
            ])
        })
    }

    mod process {
        use super::*;

        #[test]
        fn command_line_pins_version() {
            let regen = ProcessRegenerator::new(Generator::default());
            let version = v("8.1.0");
            let dir = TempDir::new().unwrap();

            let (program, args) = regen.command_line(&request(dir.path(), Some(&version)));
            assert_eq!(program, "npx");
            assert!(args.contains(&"generator-jhipster@8.1.0".to_string()));
            assert!(!args.contains(&PLACEHOLDER_FLAG.to_string()));
        }

        #[test]
        fn executable_override_is_version_less() {
            let regen = ProcessRegenerator::new(Generator::default())
                .with_executable(Some(PathBuf::from("/opt/jhipster/cli.js")));
            let version = v("8.1.0");
            let dir = TempDir::new().unwrap();
            let mut req = request(dir.path(), Some(&version));
            req.use_version_placeholders = true;

            let (program, args) = regen.command_line(&req);
            assert_eq!(program, "/opt/jhipster/cli.js");
            assert!(args.iter().all(|a| !a.contains("8.1.0")));
            assert_eq!(args.last().map(String::as_str), Some(PLACEHOLDER_FLAG));

            let (_, version_args) = regen.version_command_line();
            assert_eq!(version_args, vec!["--version"]);
        }

        #[test]
        fn parses_version_from_noisy_output() {
            let output = "INFO! Using bundled JHipster\n8.1.0\n";
            assert_eq!(parse_reported_version(output), Some(v("8.1.0")));
            assert_eq!(parse_reported_version("no version here"), None);
        }

        #[cfg(unix)]
        #[test]
        fn failing_command_reports_stderr() {
            let dir = TempDir::new().unwrap();
            let generator = Generator {
                program: "sh".into(),
                args: vec!["-c".into(), "echo boom >&2; exit 3".into()],
                ..Default::default()
            };
            let err = ProcessRegenerator::new(generator)
                .generate(&request(dir.path(), None))
                .unwrap_err();

            match err {
                RegenError::Failed { stderr, .. } => assert!(stderr.contains("boom")),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn missing_program_is_spawn_error() {
            let dir = TempDir::new().unwrap();
            let generator = Generator {
                program: "definitely-not-a-generator-binary".into(),
                ..Default::default()
            };
            let err = ProcessRegenerator::new(generator)
                .generate(&request(dir.path(), None))
                .unwrap_err();
            assert!(matches!(err, RegenError::Spawn { .. }));
        }
    }

    mod template {
        use super::*;

        #[test]
        fn renders_files_and_records_version() {
            let dir = TempDir::new().unwrap();
            seed_metadata(dir.path());
            let version = v("8.2.0");

            readme_template()
                .generate(&request(dir.path(), Some(&version)))
                .unwrap();

            let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
            assert_eq!(readme, "# shop (8.2.0)\n");
            assert!(dir.path().join("src/main/app.txt").exists());

            let meta = MetadataStore::new(dir.path(), ".yo-rc.json", "generator-jhipster")
                .read()
                .unwrap()
                .unwrap();
            assert_eq!(meta.generator_version.as_deref(), Some("8.2.0"));
        }

        #[test]
        fn unknown_version_uses_installed() {
            let dir = TempDir::new().unwrap();
            seed_metadata(dir.path());

            readme_template().generate(&request(dir.path(), None)).unwrap();

            let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
            assert_eq!(readme, "# shop (8.1.0)\n");
        }

        #[test]
        fn placeholder_mode_hides_version() {
            let dir = TempDir::new().unwrap();
            seed_metadata(dir.path());
            let version = v("8.2.0");
            let mut req = request(dir.path(), Some(&version));
            req.use_version_placeholders = true;

            readme_template().generate(&req).unwrap();

            let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
            assert_eq!(readme, "# shop (VERSION)\n");
        }

        #[test]
        fn deterministic_at_fixed_version() {
            let dir = TempDir::new().unwrap();
            seed_metadata(dir.path());
            let version = v("8.2.0");
            let regen = readme_template();

            regen.generate(&request(dir.path(), Some(&version))).unwrap();
            let first = fs::read(dir.path().join(".yo-rc.json")).unwrap();
            regen.generate(&request(dir.path(), Some(&version))).unwrap();
            let second = fs::read(dir.path().join(".yo-rc.json")).unwrap();

            assert_eq!(first, second);
        }

        #[test]
        fn missing_metadata_is_error() {
            let dir = TempDir::new().unwrap();
            let err = readme_template()
                .generate(&request(dir.path(), None))
                .unwrap_err();
            assert!(matches!(err, RegenError::MissingMetadata { .. }));
        }

        #[test]
        fn escaping_paths_rejected() {
            let dir = TempDir::new().unwrap();
            seed_metadata(dir.path());
            let regen = TemplateRegenerator::new("generator-jhipster", v("1.0.0"), |_| {
                Ok(vec![RenderedFile::new("../outside.txt", "x")])
            });

            let err = regen.generate(&request(dir.path(), None)).unwrap_err();
            assert!(matches!(err, RegenError::Template(_)));
        }
    }
}
