//! The chainable pipe and its stage runner.
//!
//! A [`Pipe`] is one generation of files. Every transform runs as a stage:
//! each resolved file is handed to a transform together with a fresh output
//! file in a new registry directory, and the outputs become the next pipe.
//! Pipes are never mutated; the original name of every file travels along in
//! the name map of each derived pipe.

use futures_util::stream::{self, StreamExt};
use glob::Pattern;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::backend::{ImageBackend, ImageOp, RasterBackend, TransformOutcome};
use crate::error::{PipeError, PipeResult};
use crate::progress::{resident_memory_bytes, ConsoleProgress, ProgressReporter, StageProgress};
use crate::sprite::{stylesheet, SheetComposer, SpriteBackend, SpriteOptions, SpriteRule, SpriteSheet};

use super::names::{self, NameMap, TempFileHandle};
use super::options::PipeOptions;
use super::registry::TempRegistry;
use super::selector::FileSetResolver;

/// Collaborators shared by a pipe and everything derived from it.
#[derive(Clone)]
pub struct PipeEnv {
    registry: Arc<TempRegistry>,
    images: Arc<dyn ImageBackend>,
    sprites: Arc<dyn SpriteBackend>,
    reporter: Arc<dyn ProgressReporter>,
}

impl PipeEnv {
    /// Environment with the bundled backends and console progress.
    pub fn new(registry: Arc<TempRegistry>) -> Self {
        Self {
            registry,
            images: Arc::new(RasterBackend),
            sprites: Arc::new(SheetComposer),
            reporter: Arc::new(ConsoleProgress::new()),
        }
    }

    pub fn with_image_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.images = backend;
        self
    }

    pub fn with_sprite_backend(mut self, backend: Arc<dyn SpriteBackend>) -> Self {
        self.sprites = backend;
        self
    }

    /// Replace the reporter used when a pipe is verbose.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// The registry owning every stage directory.
    pub fn registry(&self) -> &Arc<TempRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for PipeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeEnv")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Result of [`Pipe::sprite_factory`].
#[derive(Debug)]
pub struct SpriteOutput {
    /// Pipe holding the composite image as its only file
    pub pipe: Pipe,
    /// Sheet layout as reported by the sprite backend
    pub sheet: SpriteSheet,
    /// One rule per image, named after the image's original basename
    pub rules: Vec<SpriteRule>,
    /// `rules` rendered as CSS
    pub stylesheet: String,
}

/// Serializable summary of a sprite run, for manifests.
#[derive(Debug, Serialize)]
pub struct SpriteManifest<'a> {
    pub image: &'a Path,
    pub width: u32,
    pub height: u32,
    pub rules: &'a [SpriteRule],
}

impl SpriteOutput {
    pub fn manifest(&self) -> SpriteManifest<'_> {
        SpriteManifest {
            image: &self.sheet.image,
            width: self.sheet.width,
            height: self.sheet.height,
            rules: &self.rules,
        }
    }
}

/// One generation of files with chainable transforms.
#[derive(Debug)]
pub struct Pipe {
    resolver: FileSetResolver,
    options: PipeOptions,
    env: PipeEnv,
    files: OnceLock<Vec<PathBuf>>,
}

impl Pipe {
    /// Create a pipe over glob patterns or literal paths.
    ///
    /// An empty selector list is valid and yields an empty pipe.
    pub fn new<I, S>(selectors: I, options: PipeOptions, env: PipeEnv) -> PipeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        options.validate()?;
        let resolver = FileSetResolver::new(selectors.into_iter().map(Into::into).collect())?;
        Ok(Self {
            resolver,
            options,
            env,
            files: OnceLock::new(),
        })
    }

    /// The declared selectors.
    pub fn selectors(&self) -> &[String] {
        self.resolver.selectors()
    }

    pub fn options(&self) -> &PipeOptions {
        &self.options
    }

    /// Name map of this generation; `None` for pipes built from user selectors.
    pub fn name_map(&self) -> Option<&NameMap> {
        self.options.name_map.as_deref()
    }

    /// Resolved files, computed on first access and frozen afterwards.
    pub fn files(&self) -> &[PathBuf] {
        self.files.get_or_init(|| self.resolver.resolve())
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    /// Original (first-generation) basename of one of this pipe's files.
    pub fn original_name(&self, path: &Path) -> PipeResult<String> {
        names::original_name(path, self.name_map())
    }

    /// Original basenames of every file, in `files()` order.
    pub fn original_names(&self) -> PipeResult<Vec<String>> {
        self.files()
            .iter()
            .map(|f| self.original_name(f))
            .collect()
    }

    /// Resize every image to exactly `width` x `height`.
    pub async fn resize(&self, width: u32, height: u32) -> PipeResult<Pipe> {
        self.apply(ImageOp::Resize { width, height }).await
    }

    /// Proportional thumbnail fitting inside `width` x `height`.
    ///
    /// Without a height the box is square, so the longest edge becomes `width`.
    pub async fn thumbnail(&self, width: u32, height: Option<u32>) -> PipeResult<Pipe> {
        self.apply(ImageOp::ResizeToFit { width, height }).await
    }

    /// Exact `width` x `height` thumbnail: scale to cover, crop the longer axis.
    pub async fn cropped_thumbnail(&self, width: u32, height: u32) -> PipeResult<Pipe> {
        self.apply(ImageOp::ResizeToFill { width, height }).await
    }

    pub async fn trim(&self, fuzz: u8) -> PipeResult<Pipe> {
        self.apply(ImageOp::Trim { fuzz }).await
    }

    pub async fn shave(&self, x: u32, y: u32) -> PipeResult<Pipe> {
        self.apply(ImageOp::Shave { x, y }).await
    }

    /// Run one backend operation over every file.
    ///
    /// When the backend reports [`TransformOutcome::Unchanged`] the input is
    /// copied through as-is.
    pub async fn apply(&self, op: ImageOp) -> PipeResult<Pipe> {
        if self.options.verbose {
            tracing::info!("Running {}", op);
        }
        let backend = Arc::clone(&self.env.images);
        self.run_stage(op.name(), move |input, output, _name| {
            match backend.apply(&op, input, output)? {
                TransformOutcome::Written => Ok(()),
                TransformOutcome::Unchanged => copy_file(input, output, op.name()),
            }
        })
        .await
    }

    /// Copy every file into a fresh stage directory.
    pub async fn copy_to_temp_dir(&self) -> PipeResult<Pipe> {
        self.run_stage("copy", |input, output, _name| copy_file(input, output, "copy"))
            .await
    }

    /// Compose every file into one sprite sheet.
    ///
    /// Files that are not yet in a single stage directory are copied into one
    /// first. Rules are named after each image's original basename.
    pub async fn sprite_factory(&self, options: &SpriteOptions) -> PipeResult<SpriteOutput> {
        if self.name_map().is_none() {
            let flat = self.copy_to_temp_dir().await?;
            return flat.compose_sprite(options).await;
        }
        self.compose_sprite(options).await
    }

    async fn compose_sprite(&self, options: &SpriteOptions) -> PipeResult<SpriteOutput> {
        let plain_options = self.options.with_name_map(None);

        let Some(dir) = self.files().first().and_then(|f| f.parent()) else {
            return Ok(SpriteOutput {
                pipe: Pipe::new(Vec::<String>::new(), plain_options, self.env.clone())?,
                sheet: SpriteSheet {
                    image: options.output_image.clone(),
                    width: 0,
                    height: 0,
                    placements: Vec::new(),
                },
                rules: Vec::new(),
                stylesheet: String::new(),
            });
        };

        if self.options.verbose {
            tracing::info!("Running sprite factory on {} file(s)", self.len());
        }

        let backend = Arc::clone(&self.env.sprites);
        let task_dir = dir.to_path_buf();
        let task_options = options.clone();
        let sheet = tokio::task::spawn_blocking(move || backend.compose(&task_dir, &task_options))
            .await
            .map_err(|e| PipeError::transform(dir, "sprite", format!("Task join error: {}", e)))??;

        let rules = sheet
            .placements
            .iter()
            .map(|placement| -> PipeResult<SpriteRule> {
                let stem = names::original_stem(&placement.source, self.name_map())?;
                Ok(SpriteRule::new(&options.selector, &stem, &placement.style))
            })
            .collect::<PipeResult<Vec<_>>>()?;
        let css = stylesheet(&rules);

        if let Some(path) = &options.stylesheet {
            std::fs::write(path, &css).map_err(|source| PipeError::ExportFailed {
                path: sheet.image.clone(),
                destination: path.clone(),
                source,
            })?;
        }

        let pipe = Pipe::new(
            [Pattern::escape(&sheet.image.to_string_lossy())],
            plain_options,
            self.env.clone(),
        )?;

        Ok(SpriteOutput {
            pipe,
            sheet,
            rules,
            stylesheet: css,
        })
    }

    /// Copy every file to `dir` under its original basename.
    pub fn save(&self, dir: impl AsRef<Path>) -> PipeResult<&Self> {
        self.save_renamed(dir, |name| name.to_string())
    }

    /// Copy every file to `dir`, naming it `rename(original basename)`.
    pub fn save_renamed<F>(&self, dir: impl AsRef<Path>, rename: F) -> PipeResult<&Self>
    where
        F: Fn(&str) -> String,
    {
        let dir = dir.as_ref();
        for file in self.files() {
            let name = rename(&self.original_name(file)?);
            let destination = dir.join(&name);
            std::fs::copy(file, &destination).map_err(|source| PipeError::ExportFailed {
                path: file.clone(),
                destination: destination.clone(),
                source,
            })?;
            tracing::debug!("Saved {:?} as {:?}", file, destination);
        }
        Ok(self)
    }

    /// Run `transform` over every file, producing the next generation.
    ///
    /// `transform(input, output, original_name)` must leave its result at
    /// `output`, which already exists as an empty file. Outputs are paired
    /// with inputs by position when the new name map is built.
    pub async fn run_stage<F>(&self, stage: &str, transform: F) -> PipeResult<Pipe>
    where
        F: Fn(&Path, &Path, &str) -> PipeResult<()> + Send + Sync + 'static,
    {
        let start = Instant::now();
        let inputs = self.files();
        let total = inputs.len();

        let dir = self.env.registry.create_dir()?;
        let original_names = inputs
            .iter()
            .map(|f| self.original_name(f))
            .collect::<PipeResult<Vec<_>>>()?;
        let outputs = inputs
            .iter()
            .map(|f| allocate_output(&dir, f))
            .collect::<PipeResult<Vec<_>>>()?;

        tracing::debug!("Stage '{}': {} file(s) into {:?}", stage, total, dir);

        let verbose = self.options.verbose;
        let reporter = &self.env.reporter;
        if verbose {
            reporter.stage_started(stage, total);
        }

        let transform = Arc::new(transform);
        let timeout_ms = self.options.transform_timeout_ms;
        let jobs = inputs
            .iter()
            .zip(&outputs)
            .zip(&original_names)
            .enumerate()
            .map(|(index, ((input, output), name))| {
                let job = FileJob {
                    stage: stage.to_string(),
                    input: input.clone(),
                    output: output.path().to_path_buf(),
                    name: name.clone(),
                    timeout_ms,
                };
                let transform = Arc::clone(&transform);
                async move { job.run(transform).await.map(|()| index) }
            });

        let mut finished = stream::iter(jobs).buffer_unordered(self.options.parallel_workers.max(1));
        let mut completed = 0;
        while let Some(result) = finished.next().await {
            let index = match result {
                Ok(index) => index,
                Err(e) => {
                    if verbose {
                        reporter.stage_finished(stage);
                    }
                    tracing::debug!("Stage '{}' failed after {} file(s)", stage, completed);
                    return Err(e);
                }
            };
            completed += 1;
            if verbose {
                reporter.report(&StageProgress {
                    stage,
                    completed,
                    total,
                    current_name: &original_names[index],
                    memory_bytes: resident_memory_bytes(),
                });
            }
        }
        drop(finished);

        if verbose {
            reporter.stage_finished(stage);
        }

        let name_map = NameMap::from_pairs(outputs.into_iter().zip(original_names));
        let selector = Path::new(&Pattern::escape(&dir.to_string_lossy())).join("*");

        tracing::debug!(
            "Stage '{}' finished {} file(s) in {:?}",
            stage,
            total,
            start.elapsed()
        );

        Pipe::new(
            [selector.to_string_lossy().into_owned()],
            self.options.with_name_map(Some(Arc::new(name_map))),
            self.env.clone(),
        )
    }
}

/// One transform invocation.
///
/// Untimed jobs run on the blocking pool. Timed jobs run on a detached
/// worker thread: a transform that overruns is abandoned, and the runtime
/// does not wait for it at shutdown.
struct FileJob {
    stage: String,
    input: PathBuf,
    output: PathBuf,
    name: String,
    timeout_ms: Option<u64>,
}

impl FileJob {
    async fn run<F>(self, transform: Arc<F>) -> PipeResult<()>
    where
        F: Fn(&Path, &Path, &str) -> PipeResult<()> + Send + Sync + 'static,
    {
        let start = Instant::now();
        let FileJob {
            stage,
            input,
            output,
            name,
            timeout_ms,
        } = self;

        let task_input = input.clone();
        let work = move || transform(&task_input, &output, &name);

        let result = match timeout_ms {
            Some(ms) => {
                let (tx, rx) = tokio::sync::oneshot::channel();
                std::thread::Builder::new()
                    .name(format!("imagepipe-{}", stage))
                    .spawn(move || {
                        // Receiver is gone once the job timed out
                        let _ = tx.send(work());
                    })
                    .map_err(|e| {
                        PipeError::transform(&input, &stage, format!("Worker spawn failed: {}", e))
                    })?;

                match tokio::time::timeout(Duration::from_millis(ms), rx).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(PipeError::transform(
                        &input,
                        &stage,
                        "Worker exited without a result",
                    )),
                    Err(_) => {
                        tracing::warn!("Abandoning {:?} after {}ms in '{}'", input, ms, stage);
                        return Err(PipeError::Timeout {
                            path: input,
                            stage,
                            timeout_ms: ms,
                        });
                    }
                }
            }
            None => match tokio::task::spawn_blocking(work).await {
                Ok(result) => result,
                Err(e) => Err(PipeError::transform(
                    &input,
                    &stage,
                    format!("Task join error: {}", e),
                )),
            },
        };

        if result.is_ok() {
            tracing::trace!("  {} {:?}: {:?}", stage, input, start.elapsed());
        }
        result
    }
}

/// Create an empty, uniquely named output file for `input` inside `dir`.
///
/// The input's extension is kept so format-by-extension encoders write the
/// same format back.
fn allocate_output(dir: &Path, input: &Path) -> PipeResult<TempFileHandle> {
    let suffix = input
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let file = tempfile::Builder::new()
        .prefix("gen-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|source| PipeError::TempFileCreationFailed {
            dir: dir.to_path_buf(),
            source,
        })?;
    let path = file
        .into_temp_path()
        .keep()
        .map_err(|e| PipeError::TempFileCreationFailed {
            dir: dir.to_path_buf(),
            source: e.error,
        })?;
    Ok(TempFileHandle::new(path))
}

fn copy_file(input: &Path, output: &Path, stage: &str) -> PipeResult<()> {
    std::fs::copy(input, output)
        .map(|_| ())
        .map_err(|e| PipeError::transform(input, stage, format!("Copy failed: {}", e)))
}
