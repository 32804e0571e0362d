mod cli;
mod run;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cli::{CheckArgs, Command, EffectsArgs, GpuArgs, KernelArgs};
use lumafx::{EffectDescriptor, GaussianKernel, ParamKind, ParamSpec};
use recipe::Recipe;
use serde::Serialize;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Effects(args) => list_effects(args),
        Command::Check(args) => check_recipe(&cli.gpu, args),
        Command::Kernel(args) => print_kernel(args),
        Command::Run(args) => run::run(&cli.gpu, args),
    }
}

pub(crate) fn load_recipe(path: &Path) -> Result<Recipe> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read recipe {}", path.display()))?;
    Recipe::from_toml_str(&text).with_context(|| format!("invalid recipe {}", path.display()))
}

#[derive(Serialize)]
struct EffectEntry {
    name: &'static str,
    group: String,
    summary: &'static str,
    params: Vec<ParamEntry>,
}

#[derive(Serialize)]
struct ParamEntry {
    name: &'static str,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<f32>,
}

impl From<&EffectDescriptor> for EffectEntry {
    fn from(descriptor: &EffectDescriptor) -> Self {
        Self {
            name: descriptor.name,
            group: descriptor.group.to_string(),
            summary: descriptor.summary,
            params: descriptor.params.iter().map(ParamEntry::from).collect(),
        }
    }
}

impl From<&ParamSpec> for ParamEntry {
    fn from(param: &ParamSpec) -> Self {
        // JSON has no infinities; unbounded ends are left out.
        let bound = |value: f32| value.is_finite().then_some(value);
        let numeric = matches!(
            param.kind,
            ParamKind::Scalar | ParamKind::Integer | ParamKind::Point | ParamKind::Color
        );
        Self {
            name: param.name,
            kind: param.kind.to_string(),
            min: if numeric { bound(param.min) } else { None },
            max: if numeric { bound(param.max) } else { None },
            default: matches!(param.kind, ParamKind::Scalar | ParamKind::Integer | ParamKind::Flag)
                .then_some(param.default),
        }
    }
}

fn list_effects(args: EffectsArgs) -> Result<()> {
    let entries: Vec<EffectEntry> = lumafx::catalogue().iter().map(EffectEntry::from).collect();
    if args.json {
        let json = serde_json::to_string_pretty(&entries).context("failed to encode effects")?;
        println!("{json}");
        return Ok(());
    }

    for entry in entries {
        println!("{:<24} {:<8} {}", entry.name, entry.group, entry.summary);
        for param in entry.params {
            let range = match (param.min, param.max) {
                (Some(min), Some(max)) => format!("[{min}, {max}]"),
                (Some(min), None) => format!("[{min}, inf)"),
                (None, Some(max)) => format!("(-inf, {max}]"),
                (None, None) => String::new(),
            };
            let default = param
                .default
                .map(|value| format!("default {value}"))
                .unwrap_or_default();
            println!("    {:<16} {:<10} {:<18} {}", param.name, param.kind, range, default);
        }
    }
    Ok(())
}

fn check_recipe(gpu: &GpuArgs, args: CheckArgs) -> Result<()> {
    let recipe = load_recipe(&args.recipe)?;
    for issue in recipe.issues() {
        tracing::warn!("{issue}");
    }

    let programs = recipe.programs();
    let mut failures = 0usize;
    for spec in &programs {
        if let Err(err) = spec.validate() {
            failures += 1;
            eprintln!("{err}");
        }
    }
    if failures > 0 {
        bail!("{failures} of {} programs failed validation", programs.len());
    }

    if args.gpu {
        let ctx = run::create_context(gpu)?;
        for spec in programs.iter().cloned() {
            ctx.program(spec.key().clone(), || spec)
                .context("failed to compile program on the device")?;
        }
        tracing::info!(
            adapter = %ctx.adapter_info().name,
            programs = ctx.cached_programs(),
            "compiled every program on the device"
        );
    }

    println!(
        "{}: ok ({} steps, {} programs, {} warnings)",
        args.recipe.display(),
        recipe.steps.len(),
        programs.len(),
        recipe.issues().len()
    );
    Ok(())
}

fn print_kernel(args: KernelArgs) -> Result<()> {
    let size = lumafx::descriptor("gaussian")
        .and_then(|descriptor| descriptor.param("size"))
        .map_or(args.size, |param| param.clamp(args.size as f32) as u32);
    if size != args.size {
        tracing::warn!(requested = args.size, size, "kernel size clamped");
    }
    let kernel = GaussianKernel::new(size, args.sigma);

    println!("# key: {}", kernel.key(args.axis));
    for (offset, weight) in kernel.offsets().zip(kernel.weights()) {
        println!("# {offset:>3}  {weight:.9}");
    }
    print!("{}", kernel.source(args.axis));
    Ok(())
}
