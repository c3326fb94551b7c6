//! The `imagepipe run` command: select, transform, save.

use clap::{Args, ValueEnum};
use imagepipe_core::{Config, ImageOp, ImagePipe, Pipe, SpriteLayout, TempRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::progress::BarProgress;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Glob patterns selecting the input files
    #[arg(required = true)]
    pub selectors: Vec<String>,

    /// Operation to apply, in order (resize:WxH, thumbnail:W[xH], crop:WxH,
    /// trim:FUZZ, shave:XxY, copy)
    #[arg(long = "op", value_name = "OP", value_parser = parse_op)]
    pub ops: Vec<Step>,

    /// Directory to save the final files into, under their original names
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Prefix prepended to every saved file name
    #[arg(long, requires = "out")]
    pub rename_prefix: Option<String>,

    /// Compose the final files into a sprite sheet at this path
    #[arg(long, value_name = "PNG")]
    pub sprite: Option<PathBuf>,

    /// Write the sprite stylesheet to this path
    #[arg(long, requires = "sprite")]
    pub stylesheet: Option<PathBuf>,

    /// Write a JSON manifest of the sprite sheet to this path
    #[arg(long, requires = "sprite")]
    pub manifest: Option<PathBuf>,

    /// Sprite arrangement (overrides config)
    #[arg(long, value_enum, requires = "sprite")]
    pub layout: Option<LayoutArg>,

    /// CSS selector prefix for sprite rules (overrides config)
    #[arg(long, requires = "sprite")]
    pub selector: Option<String>,

    /// Number of files transformed concurrently (overrides config)
    #[arg(short = 'j', long)]
    pub parallel: Option<usize>,

    /// Per-file transform timeout in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Show per-file progress while stages run
    #[arg(long)]
    pub progress: bool,
}

/// Sprite arrangement as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    Horizontal,
    Vertical,
}

impl From<LayoutArg> for SpriteLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Horizontal => SpriteLayout::Horizontal,
            LayoutArg::Vertical => SpriteLayout::Vertical,
        }
    }
}

/// One step of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Transform(ImageOp),
    Copy,
}

impl Step {
    async fn apply(&self, pipe: &Pipe) -> imagepipe_core::PipeResult<Pipe> {
        match self {
            Step::Transform(op) => pipe.apply(*op).await,
            Step::Copy => pipe.copy_to_temp_dir().await,
        }
    }
}

/// Parse `name[:args]` into a step.
pub fn parse_op<'a>(s: &'a str) -> Result<Step, String> {
    let (name, arg) = match s.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (s, None),
    };

    let need = |arg: Option<&'a str>| arg.ok_or_else(|| format!("'{name}' needs an argument"));

    let step = match name {
        "resize" => {
            let (width, height) = parse_pair(need(arg)?)?;
            Step::Transform(ImageOp::Resize { width, height })
        }
        "thumbnail" => {
            let arg = need(arg)?;
            let (width, height) = match arg.split_once('x') {
                Some((w, h)) => (parse_dim(w)?, Some(parse_dim(h)?)),
                None => (parse_dim(arg)?, None),
            };
            Step::Transform(ImageOp::ResizeToFit { width, height })
        }
        "crop" => {
            let (width, height) = parse_pair(need(arg)?)?;
            Step::Transform(ImageOp::ResizeToFill { width, height })
        }
        "trim" => {
            let fuzz = match arg {
                Some(a) => a
                    .parse::<u8>()
                    .map_err(|_| format!("invalid fuzz '{a}' (expected 0-255)"))?,
                None => 0,
            };
            Step::Transform(ImageOp::Trim { fuzz })
        }
        "shave" => {
            let (x, y) = parse_pair(need(arg)?)?;
            Step::Transform(ImageOp::Shave { x, y })
        }
        "copy" => {
            if arg.is_some() {
                return Err("'copy' takes no argument".to_string());
            }
            Step::Copy
        }
        other => {
            return Err(format!(
                "unknown operation '{other}' (expected resize, thumbnail, crop, trim, shave or copy)"
            ))
        }
    };
    Ok(step)
}

fn parse_pair(s: &str) -> Result<(u32, u32), String> {
    let (a, b) = s
        .split_once('x')
        .ok_or_else(|| format!("expected AxB, got '{s}'"))?;
    Ok((parse_dim(a)?, parse_dim(b)?))
}

fn parse_dim(s: &str) -> Result<u32, String> {
    s.trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid number '{s}'"))
}

/// Execute the run command.
pub async fn execute(
    args: RunArgs,
    config: Config,
    registry: Arc<TempRegistry>,
) -> anyhow::Result<()> {
    if args.out.is_none() && args.sprite.is_none() {
        anyhow::bail!("Nothing to do with the results: pass --out and/or --sprite");
    }

    let mut imagepipe = ImagePipe::new(config, registry)?;
    if args.progress {
        imagepipe = imagepipe.with_reporter(Arc::new(BarProgress::new()));
    }

    let mut options = imagepipe.options().verbose(args.progress);
    if let Some(ms) = args.timeout_ms {
        options = options.transform_timeout_ms(Some(ms));
    }
    if let Some(workers) = args.parallel {
        options = options.parallel_workers(workers);
    }

    let mut pipe = imagepipe.pipe_with(args.selectors.clone(), options)?;
    tracing::info!("Selected {} files", pipe.len());
    if pipe.is_empty() {
        tracing::warn!("No files matched {:?}", args.selectors);
    }

    for step in &args.ops {
        pipe = step.apply(&pipe).await?;
    }

    if let Some(out) = &args.out {
        save(&pipe, out, args.rename_prefix.as_deref())?;
        println!("Saved {} files to {}", pipe.len(), out.display());
    }

    if let Some(sprite_path) = &args.sprite {
        let mut sprite = imagepipe.sprite_options(sprite_path);
        sprite.stylesheet = args.stylesheet.clone();
        if let Some(layout) = args.layout {
            sprite.layout = layout.into();
        }
        if let Some(selector) = &args.selector {
            sprite.selector = selector.clone();
        }
        for path in [Some(sprite_path), args.stylesheet.as_ref(), args.manifest.as_ref()]
            .into_iter()
            .flatten()
        {
            ensure_parent(path)?;
        }

        let output = pipe.sprite_factory(&sprite).await?;
        if let Some(manifest) = &args.manifest {
            std::fs::write(manifest, serde_json::to_string_pretty(&output.manifest())?)?;
            tracing::info!("Manifest written to {}", manifest.display());
        }
        println!(
            "Sprite {} ({}x{}, {} images)",
            sprite_path.display(),
            output.sheet.width,
            output.sheet.height,
            output.rules.len()
        );
    }

    Ok(())
}

fn save(pipe: &Pipe, out: &Path, prefix: Option<&str>) -> anyhow::Result<()> {
    std::fs::create_dir_all(out)?;
    match prefix {
        Some(prefix) => pipe.save_renamed(out, |name| format!("{prefix}{name}"))?,
        None => pipe.save(out)?,
    };
    Ok(())
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_parse_op_variants() {
        assert_eq!(
            parse_op("resize:640x480").unwrap(),
            Step::Transform(ImageOp::Resize {
                width: 640,
                height: 480
            })
        );
        assert_eq!(
            parse_op("thumbnail:100").unwrap(),
            Step::Transform(ImageOp::ResizeToFit {
                width: 100,
                height: None
            })
        );
        assert_eq!(
            parse_op("thumbnail:100x50").unwrap(),
            Step::Transform(ImageOp::ResizeToFit {
                width: 100,
                height: Some(50)
            })
        );
        assert_eq!(
            parse_op("crop:32x32").unwrap(),
            Step::Transform(ImageOp::ResizeToFill {
                width: 32,
                height: 32
            })
        );
        assert_eq!(
            parse_op("trim").unwrap(),
            Step::Transform(ImageOp::Trim { fuzz: 0 })
        );
        assert_eq!(
            parse_op("shave:2x3").unwrap(),
            Step::Transform(ImageOp::Shave { x: 2, y: 3 })
        );
        assert_eq!(parse_op("copy").unwrap(), Step::Copy);
    }

    #[test]
    fn test_parse_op_errors() {
        assert!(parse_op("resize").is_err());
        assert!(parse_op("resize:640").is_err());
        assert!(parse_op("crop:axb").is_err());
        assert!(parse_op("trim:300").is_err());
        assert!(parse_op("copy:1").is_err());
        assert!(parse_op("blur:2").unwrap_err().contains("unknown operation"));
    }

    #[test]
    fn run_args_keep_op_order() {
        let cli = TestCli::parse_from([
            "test", "*.png", "--op", "trim:8", "--op", "crop:16x16", "--out", "out",
        ]);
        assert_eq!(cli.args.selectors, vec!["*.png"]);
        assert_eq!(cli.args.ops.len(), 2);
        assert_eq!(cli.args.ops[0], Step::Transform(ImageOp::Trim { fuzz: 8 }));
        assert!(cli.args.parallel.is_none());
        assert!(!cli.args.progress);
    }

    #[test]
    fn run_args_stylesheet_requires_sprite() {
        let result =
            TestCli::try_parse_from(["test", "*.png", "--out", "o", "--stylesheet", "s.css"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_execute_saves_under_original_names() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), b"alpha").unwrap();

        let selector = format!("{}/*.txt", src.path().display());
        let cli = TestCli::parse_from([
            "test",
            selector.as_str(),
            "--op",
            "copy",
            "--op",
            "copy",
            "--out",
            out.path().to_str().unwrap(),
            "--rename-prefix",
            "x-",
        ]);

        let registry = Arc::new(TempRegistry::new());
        execute(cli.args, Config::default(), Arc::clone(&registry))
            .await
            .unwrap();

        assert_eq!(std::fs::read(out.path().join("x-a.txt")).unwrap(), b"alpha");
        assert_eq!(registry.len(), 2);
        registry.sweep();
    }

    #[tokio::test]
    async fn test_execute_requires_destination() {
        let cli = TestCli::parse_from(["test", "*.png"]);
        let result = execute(cli.args, Config::default(), Arc::new(TempRegistry::new())).await;
        assert!(result.is_err());
    }
}
