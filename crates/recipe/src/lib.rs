//! Effect chains described in TOML.
//!
//! ```toml
//! version = 1
//! format = "rgba16f"
//!
//! [[steps]]
//! effect = "brightness_contrast"
//! brightness = 0.1
//!
//! [[steps]]
//! effect = "vignette"
//! size = 0.4
//! amount = -0.3
//! ```
//!
//! Omitted numeric parameters take the catalogue default; omitted centres
//! are the middle of the surface. Values outside their range are clamped
//! when the recipe runs and reported up front by [`Recipe::issues`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use lumafx::{
    Axis, EffectChain, EffectError, GaussianKernel, ParamSpec, PixelFormat, ProgramSpec, WarpSpace,
};
use serde::de::{self, Deserializer};
use serde::Deserialize;

/// The only recipe version this crate understands.
pub const RECIPE_VERSION: u32 = 1;

/// Colour dot screen paints into bright areas when none is given.
pub const DEFAULT_COLORIZED: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("failed to parse recipe: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid recipe: {0}")]
    Invalid(String),
    #[error("step {index} ({effect}) failed: {source}")]
    Step {
        index: usize,
        effect: &'static str,
        #[source]
        source: EffectError,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_from_str")]
    pub format: PixelFormat,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One entry of `[[steps]]`, selected by its `effect` key.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Step {
    BrightnessContrast {
        brightness: Option<f32>,
        contrast: Option<f32>,
    },
    Curves {
        red: Vec<[f32; 2]>,
        green: Option<Vec<[f32; 2]>>,
        blue: Option<Vec<[f32; 2]>>,
    },
    Denoise {
        exponent: Option<f32>,
    },
    HueSaturation {
        hue: Option<f32>,
        saturation: Option<f32>,
    },
    Infrared {
        amount: Option<f32>,
    },
    Noise {
        amount: Option<f32>,
    },
    Sepia {
        amount: Option<f32>,
    },
    Skin {},
    SplitTone {
        highlight: Option<[f32; 4]>,
        shadow: Option<[f32; 4]>,
        mix: Option<f32>,
    },
    StreetPhoto {
        amount: Option<f32>,
    },
    UnsharpMask {
        radius: Option<f32>,
        strength: Option<f32>,
    },
    Vibrance {
        amount: Option<f32>,
    },
    Vignette {
        size: Option<f32>,
        amount: Option<f32>,
        x: Option<f32>,
        y: Option<f32>,
        width: Option<f32>,
        height: Option<f32>,
    },
    WhiteBalance {
        amount: Option<f32>,
    },
    Bilateral {},
    BoxBlur {},
    Gaussian {
        size: Option<u32>,
        sigma: Option<f32>,
    },
    LensBlur {
        radius: Option<f32>,
        brightness: Option<f32>,
        angle: Option<f32>,
    },
    TiltShift {
        start: [f32; 2],
        end: [f32; 2],
        blur_radius: Option<f32>,
        gradient_radius: Option<f32>,
    },
    TriangleBlur {
        radius: Option<f32>,
    },
    ZoomBlur {
        center: Option<[f32; 2]>,
        strength: Option<f32>,
    },
    BrightnessQuantization {
        steps: Option<u32>,
    },
    ColorHalftone {
        center: Option<[f32; 2]>,
        angle: Option<f32>,
        size: Option<f32>,
    },
    Comic {
        sigma: Option<f32>,
    },
    DifferenceOfGaussians {
        sigma: Option<f32>,
    },
    DotScreen {
        center: Option<[f32; 2]>,
        angle: Option<f32>,
        size: Option<f32>,
        colorized: Option<[f32; 4]>,
    },
    EdgeWork {
        radius: Option<f32>,
    },
    HexagonalPixelate {
        center: Option<[f32; 2]>,
        scale: Option<f32>,
    },
    Ink {
        strength: Option<f32>,
    },
    /// Uses (and consumes) the snapshot named `mask` as the join mask.
    Join {
        mask: String,
    },
    /// Stores the current result for a later `join`.
    Snapshot {
        name: String,
    },
    Grid {
        distance: Option<[f32; 2]>,
        color: Option<[f32; 3]>,
    },
    Bending {
        center: Option<[f32; 2]>,
        radius: Option<f32>,
        strength: Option<f32>,
    },
    BulgePinch {
        center: Option<[f32; 2]>,
        radius: Option<f32>,
        strength: Option<f32>,
    },
    Crop {
        left: Option<f32>,
        top: Option<f32>,
        right: Option<f32>,
        bottom: Option<f32>,
    },
    Flip {
        #[serde(default)]
        vertical: bool,
        #[serde(default)]
        horizontal: bool,
    },
    MatrixWarp {
        matrix: Vec<f32>,
        #[serde(default)]
        inverse: bool,
        #[serde(default, deserialize_with = "deserialize_from_str")]
        space: WarpSpace,
    },
    Move {
        vertical: Option<f32>,
        horizontal: Option<f32>,
    },
    Perspective {
        before: Vec<f32>,
        after: Vec<f32>,
    },
    Rotate {
        angle: Option<f32>,
    },
    Swirl {
        center: Option<[f32; 2]>,
        radius: Option<f32>,
        angle: Option<f32>,
    },
    /// `sy` follows `sx` when omitted.
    Zoom {
        sx: Option<f32>,
        sy: Option<f32>,
    },
}

/// A parameter that will be clamped when the recipe runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub step: usize,
    pub effect: &'static str,
    pub param: &'static str,
    pub value: f32,
    pub clamped: f32,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({}): {} = {} is out of range and will be clamped to {}",
            self.step, self.effect, self.param, self.value, self.clamped
        )
    }
}

fn deserialize_from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
}

fn param(effect: &str, name: &str) -> Option<&'static ParamSpec> {
    lumafx::descriptor(effect)?.param(name)
}

/// The catalogue default for `effect.name`, used when a recipe omits it.
fn or_default(value: Option<f32>, effect: &str, name: &str) -> f32 {
    value.unwrap_or_else(|| param(effect, name).map_or(0.0, |spec| spec.default))
}

impl Recipe {
    pub fn from_toml_str(input: &str) -> Result<Self, RecipeError> {
        let recipe: Recipe = toml::from_str(input)?;
        recipe.validate()?;
        Ok(recipe)
    }

    /// Checks everything that would otherwise fail part-way through a run.
    pub fn validate(&self) -> Result<(), RecipeError> {
        if self.version != RECIPE_VERSION {
            return Err(RecipeError::Invalid(format!(
                "unsupported recipe version {}; expected {RECIPE_VERSION}",
                self.version
            )));
        }
        if self.steps.is_empty() {
            return Err(RecipeError::Invalid("recipe must contain at least one step".into()));
        }

        let mut snapshots = BTreeSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            step.validate()
                .map_err(|reason| RecipeError::Invalid(format!("step {index} ({}): {reason}", step.name())))?;
            match step {
                Step::Snapshot { name } => {
                    snapshots.insert(name.as_str());
                }
                Step::Join { mask } => {
                    if !snapshots.remove(mask.as_str()) {
                        return Err(RecipeError::Invalid(format!(
                            "step {index} (join): no earlier snapshot named '{mask}'"
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Every supplied value that lies outside its parameter's range.
    pub fn issues(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            let effect = step.name();
            for (name, value) in step.supplied_values() {
                let Some(spec) = param(effect, name) else {
                    continue;
                };
                if !spec.contains(value) {
                    issues.push(Issue {
                        step: index,
                        effect,
                        param: spec.name,
                        value,
                        clamped: spec.clamp(value),
                    });
                }
            }
        }
        issues
    }

    /// Distinct Gaussian kernels the recipe will generate.
    pub fn kernels(&self) -> Vec<GaussianKernel> {
        let mut kernels: Vec<GaussianKernel> = Vec::new();
        for step in &self.steps {
            let kernel = match step {
                Step::Gaussian { size, sigma } => {
                    let size = size.map_or_else(
                        || or_default(None, "gaussian", "size"),
                        |size| size as f32,
                    );
                    let sigma = or_default(*sigma, "gaussian", "sigma");
                    let clamp = |name: &str, value: f32| {
                        param("gaussian", name).map_or(value, |spec| spec.clamp(value))
                    };
                    GaussianKernel::new(clamp("size", size) as u32, clamp("sigma", sigma))
                }
                Step::Comic { .. } => {
                    let (size, sigma) = lumafx::COMIC_EDGE_BLUR;
                    GaussianKernel::new(size, sigma)
                }
                _ => continue,
            };
            if !kernels.contains(&kernel) {
                kernels.push(kernel);
            }
        }
        kernels
    }

    /// Program specs for every pass the recipe can run, generated kernels
    /// included.
    pub fn programs(&self) -> Vec<ProgramSpec> {
        let effects: BTreeSet<&str> = self
            .steps
            .iter()
            .flat_map(|step| step.program_effects())
            .collect();
        let mut programs: Vec<ProgramSpec> = lumafx::static_programs()
            .into_iter()
            .filter(|spec| effects.contains(spec.key().effect()))
            .collect();
        for kernel in self.kernels() {
            for axis in [Axis::Horizontal, Axis::Vertical] {
                programs.push(kernel.program_spec(axis));
            }
        }
        programs
    }

    /// Runs every step in order. Stops at the first failing step; earlier
    /// steps stay applied.
    pub fn apply(&self, chain: &mut EffectChain<'_>) -> Result<(), RecipeError> {
        for (index, step) in self.steps.iter().enumerate() {
            tracing::debug!(index, effect = step.name(), "applying recipe step");
            step.apply(chain).map_err(|source| RecipeError::Step {
                index,
                effect: step.name(),
                source,
            })?;
        }
        Ok(())
    }
}

fn check_points(channel: &str, points: &[[f32; 2]]) -> Result<(), String> {
    lumafx::check_curve_points(channel, points).map_err(|err| match err {
        EffectError::Config { reason, .. } => reason,
        other => other.to_string(),
    })
}

fn check_finite(name: &str, values: &[f32]) -> Result<(), String> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(format!("{name} values must be finite"))
    }
}

impl Step {
    /// Catalogue name of the effect, or `snapshot`.
    pub fn name(&self) -> &'static str {
        match self {
            Step::BrightnessContrast { .. } => "brightness_contrast",
            Step::Curves { .. } => "curves",
            Step::Denoise { .. } => "denoise",
            Step::HueSaturation { .. } => "hue_saturation",
            Step::Infrared { .. } => "infrared",
            Step::Noise { .. } => "noise",
            Step::Sepia { .. } => "sepia",
            Step::Skin {} => "skin",
            Step::SplitTone { .. } => "split_tone",
            Step::StreetPhoto { .. } => "street_photo",
            Step::UnsharpMask { .. } => "unsharp_mask",
            Step::Vibrance { .. } => "vibrance",
            Step::Vignette { .. } => "vignette",
            Step::WhiteBalance { .. } => "white_balance",
            Step::Bilateral {} => "bilateral",
            Step::BoxBlur {} => "box_blur",
            Step::Gaussian { .. } => "gaussian",
            Step::LensBlur { .. } => "lens_blur",
            Step::TiltShift { .. } => "tilt_shift",
            Step::TriangleBlur { .. } => "triangle_blur",
            Step::ZoomBlur { .. } => "zoom_blur",
            Step::BrightnessQuantization { .. } => "brightness_quantization",
            Step::ColorHalftone { .. } => "color_halftone",
            Step::Comic { .. } => "comic",
            Step::DifferenceOfGaussians { .. } => "difference_of_gaussians",
            Step::DotScreen { .. } => "dot_screen",
            Step::EdgeWork { .. } => "edge_work",
            Step::HexagonalPixelate { .. } => "hexagonal_pixelate",
            Step::Ink { .. } => "ink",
            Step::Join { .. } => "join",
            Step::Snapshot { .. } => "snapshot",
            Step::Grid { .. } => "grid",
            Step::Bending { .. } => "bending",
            Step::BulgePinch { .. } => "bulge_pinch",
            Step::Crop { .. } => "crop",
            Step::Flip { .. } => "flip",
            Step::MatrixWarp { .. } => "matrix_warp",
            Step::Move { .. } => "move",
            Step::Perspective { .. } => "perspective",
            Step::Rotate { .. } => "rotate",
            Step::Swirl { .. } => "swirl",
            Step::Zoom { .. } => "zoom",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Step::Curves { red, green, blue } => {
                check_points("red", red)?;
                if let Some(green) = green {
                    check_points("green", green)?;
                }
                if let Some(blue) = blue {
                    check_points("blue", blue)?;
                }
                Ok(())
            }
            Step::MatrixWarp { matrix, .. } => {
                if !matches!(matrix.len(), 4 | 9) {
                    return Err(format!("matrix needs 4 or 9 values, got {}", matrix.len()));
                }
                check_finite("matrix", matrix)
            }
            Step::Perspective { before, after } => {
                for (name, quad) in [("before", before), ("after", after)] {
                    if quad.len() != 8 {
                        return Err(format!("{name} needs 8 values, got {}", quad.len()));
                    }
                    check_finite(name, quad)?;
                }
                Ok(())
            }
            Step::TiltShift { start, end, .. } => {
                check_finite("start", start)?;
                check_finite("end", end)?;
                if start == end {
                    return Err("start and end must differ".into());
                }
                Ok(())
            }
            Step::LensBlur { angle: Some(angle), .. } | Step::Rotate { angle: Some(angle) } => {
                check_finite("angle", &[*angle])
            }
            Step::Zoom { sx, sy } => {
                let factors: Vec<f32> = [sx, sy].into_iter().flatten().copied().collect();
                check_finite("zoom", &factors)
            }
            Step::Crop { left, top, right, bottom } => {
                let edges: Vec<f32> =
                    [left, top, right, bottom].into_iter().flatten().copied().collect();
                check_finite("crop", &edges)
            }
            Step::Snapshot { name } | Step::Join { mask: name } if name.trim().is_empty() => {
                Err("snapshot names may not be empty".into())
            }
            _ => Ok(()),
        }
    }

    /// Values given explicitly in the recipe, keyed by parameter name.
    /// Points and colours contribute one entry per component.
    fn supplied_values(&self) -> Vec<(&'static str, f32)> {
        fn scalar(out: &mut Vec<(&'static str, f32)>, name: &'static str, value: &Option<f32>) {
            if let Some(value) = value {
                out.push((name, *value));
            }
        }
        fn each<const N: usize>(
            out: &mut Vec<(&'static str, f32)>,
            name: &'static str,
            values: &Option<[f32; N]>,
        ) {
            if let Some(values) = values {
                out.extend(values.iter().map(|value| (name, *value)));
            }
        }

        let mut out = Vec::new();
        match self {
            Step::BrightnessContrast { brightness, contrast } => {
                scalar(&mut out, "brightness", brightness);
                scalar(&mut out, "contrast", contrast);
            }
            Step::Denoise { exponent } => scalar(&mut out, "exponent", exponent),
            Step::HueSaturation { hue, saturation } => {
                scalar(&mut out, "hue", hue);
                scalar(&mut out, "saturation", saturation);
            }
            Step::Infrared { amount }
            | Step::Noise { amount }
            | Step::Sepia { amount }
            | Step::StreetPhoto { amount }
            | Step::Vibrance { amount }
            | Step::WhiteBalance { amount } => scalar(&mut out, "amount", amount),
            Step::SplitTone { highlight, shadow, mix } => {
                each(&mut out, "highlight", highlight);
                each(&mut out, "shadow", shadow);
                scalar(&mut out, "mix", mix);
            }
            Step::UnsharpMask { radius, strength } => {
                scalar(&mut out, "radius", radius);
                scalar(&mut out, "strength", strength);
            }
            Step::Vignette { size, amount, x, y, width, height } => {
                scalar(&mut out, "size", size);
                scalar(&mut out, "amount", amount);
                scalar(&mut out, "x", x);
                scalar(&mut out, "y", y);
                scalar(&mut out, "width", width);
                scalar(&mut out, "height", height);
            }
            Step::Gaussian { size, sigma } => {
                scalar(&mut out, "size", &size.map(|size| size as f32));
                scalar(&mut out, "sigma", sigma);
            }
            Step::LensBlur { radius, brightness, angle } => {
                scalar(&mut out, "radius", radius);
                scalar(&mut out, "brightness", brightness);
                scalar(&mut out, "angle", angle);
            }
            Step::TiltShift { blur_radius, gradient_radius, .. } => {
                scalar(&mut out, "blur_radius", blur_radius);
                scalar(&mut out, "gradient_radius", gradient_radius);
            }
            Step::TriangleBlur { radius } | Step::EdgeWork { radius } => {
                scalar(&mut out, "radius", radius)
            }
            Step::ZoomBlur { strength, .. } => scalar(&mut out, "strength", strength),
            Step::BrightnessQuantization { steps } => {
                scalar(&mut out, "steps", &steps.map(|steps| steps as f32));
            }
            Step::ColorHalftone { angle, size, .. } => {
                scalar(&mut out, "angle", angle);
                scalar(&mut out, "size", size);
            }
            Step::Comic { sigma } | Step::DifferenceOfGaussians { sigma } => {
                scalar(&mut out, "sigma", sigma)
            }
            Step::DotScreen { angle, size, colorized, .. } => {
                scalar(&mut out, "angle", angle);
                scalar(&mut out, "size", size);
                each(&mut out, "colorized", colorized);
            }
            Step::HexagonalPixelate { scale, .. } => scalar(&mut out, "scale", scale),
            Step::Ink { strength } => scalar(&mut out, "strength", strength),
            Step::Grid { distance, color } => {
                each(&mut out, "distance", distance);
                each(&mut out, "color", color);
            }
            Step::Bending { radius, strength, .. } | Step::BulgePinch { radius, strength, .. } => {
                scalar(&mut out, "radius", radius);
                scalar(&mut out, "strength", strength);
            }
            Step::Crop { left, top, right, bottom } => {
                scalar(&mut out, "left", left);
                scalar(&mut out, "top", top);
                scalar(&mut out, "right", right);
                scalar(&mut out, "bottom", bottom);
            }
            Step::Swirl { radius, angle, .. } => {
                scalar(&mut out, "radius", radius);
                scalar(&mut out, "angle", angle);
            }
            _ => {}
        }
        out
    }

    /// Catalogue effects whose programs this step runs.
    fn program_effects(&self) -> Vec<&'static str> {
        match self {
            Step::Snapshot { .. } | Step::Gaussian { .. } => Vec::new(),
            Step::WhiteBalance { .. } => vec!["curves"],
            Step::UnsharpMask { .. } => vec!["triangle_blur", "unsharp_mask"],
            Step::DifferenceOfGaussians { .. } => vec!["difference_of_gaussians", "denoise"],
            Step::Comic { .. } => vec![
                "difference_of_gaussians",
                "denoise",
                "brightness_quantization",
                "join",
            ],
            Step::Rotate { .. } | Step::Zoom { .. } | Step::Perspective { .. } => {
                vec!["matrix_warp"]
            }
            step => vec![step.name()],
        }
    }

    fn apply(&self, chain: &mut EffectChain<'_>) -> Result<(), EffectError> {
        let (width, height) = chain.surface().size();
        let middle = [width as f32 / 2.0, height as f32 / 2.0];
        let effect = self.name();
        let value = |supplied: &Option<f32>, name: &str| or_default(*supplied, effect, name);

        match self {
            Step::BrightnessContrast { brightness, contrast } => {
                chain.brightness_contrast(value(brightness, "brightness"), value(contrast, "contrast"))?;
            }
            Step::Curves { red, green, blue } => {
                chain.curves(red, green.as_deref(), blue.as_deref())?;
            }
            Step::Denoise { exponent } => {
                chain.denoise(value(exponent, "exponent"))?;
            }
            Step::HueSaturation { hue, saturation } => {
                chain.hue_saturation(value(hue, "hue"), value(saturation, "saturation"))?;
            }
            Step::Infrared { amount } => {
                chain.infrared(value(amount, "amount"))?;
            }
            Step::Noise { amount } => {
                chain.noise(value(amount, "amount"))?;
            }
            Step::Sepia { amount } => {
                chain.sepia(value(amount, "amount"))?;
            }
            Step::Skin {} => {
                chain.skin()?;
            }
            Step::SplitTone { highlight, shadow, mix } => {
                chain.split_tone(
                    highlight.unwrap_or(lumafx::DEFAULT_HIGHLIGHT),
                    shadow.unwrap_or(lumafx::DEFAULT_SHADOW),
                    value(mix, "mix"),
                )?;
            }
            Step::StreetPhoto { amount } => {
                chain.street_photo(value(amount, "amount"))?;
            }
            Step::UnsharpMask { radius, strength } => {
                chain.unsharp_mask(value(radius, "radius"), value(strength, "strength"))?;
            }
            Step::Vibrance { amount } => {
                chain.vibrance(value(amount, "amount"))?;
            }
            Step::Vignette { size, amount, x, y, width, height } => {
                chain.vignette_area(
                    value(size, "size"),
                    value(amount, "amount"),
                    [
                        value(x, "x"),
                        value(y, "y"),
                        value(width, "width"),
                        value(height, "height"),
                    ],
                )?;
            }
            Step::WhiteBalance { amount } => {
                chain.white_balance(value(amount, "amount"))?;
            }
            Step::Bilateral {} => {
                chain.bilateral()?;
            }
            Step::BoxBlur {} => {
                chain.box_blur()?;
            }
            Step::Gaussian { size, sigma } => {
                let size = size.unwrap_or_else(|| or_default(None, effect, "size") as u32);
                chain.gaussian(size, value(sigma, "sigma"))?;
            }
            Step::LensBlur { radius, brightness, angle } => {
                chain.lens_blur(
                    value(radius, "radius"),
                    value(brightness, "brightness"),
                    value(angle, "angle"),
                )?;
            }
            Step::TiltShift { start, end, blur_radius, gradient_radius } => {
                chain.tilt_shift(
                    *start,
                    *end,
                    value(blur_radius, "blur_radius"),
                    value(gradient_radius, "gradient_radius"),
                )?;
            }
            Step::TriangleBlur { radius } => {
                chain.triangle_blur(value(radius, "radius"))?;
            }
            Step::ZoomBlur { center, strength } => {
                chain.zoom_blur(center.unwrap_or(middle), value(strength, "strength"))?;
            }
            Step::BrightnessQuantization { steps } => {
                let steps = steps.unwrap_or_else(|| or_default(None, effect, "steps") as u32);
                chain.brightness_quantization(steps)?;
            }
            Step::ColorHalftone { center, angle, size } => {
                chain.color_halftone(
                    center.unwrap_or(middle),
                    value(angle, "angle"),
                    value(size, "size"),
                )?;
            }
            Step::Comic { sigma } => {
                chain.comic(value(sigma, "sigma"))?;
            }
            Step::DifferenceOfGaussians { sigma } => {
                chain.difference_of_gaussians(value(sigma, "sigma"))?;
            }
            Step::DotScreen { center, angle, size, colorized } => {
                chain.dot_screen(
                    center.unwrap_or(middle),
                    value(angle, "angle"),
                    value(size, "size"),
                    colorized.unwrap_or(DEFAULT_COLORIZED),
                )?;
            }
            Step::EdgeWork { radius } => {
                chain.edge_work(value(radius, "radius"))?;
            }
            Step::HexagonalPixelate { center, scale } => {
                chain.hexagonal_pixelate(center.unwrap_or(middle), value(scale, "scale"))?;
            }
            Step::Ink { strength } => {
                chain.ink(value(strength, "strength"))?;
            }
            Step::Join { mask } => {
                let ctx = chain.context();
                let texture = chain
                    .surface()
                    .take_snapshot(mask)
                    .ok_or_else(|| EffectError::MissingSnapshot(mask.clone()))?;
                let result = chain.join(&texture).map(drop);
                texture.destroy(ctx);
                result?;
            }
            Step::Snapshot { name } => {
                let ctx = chain.context();
                chain.surface().snapshot(ctx, name);
            }
            Step::Grid { distance, color } => {
                chain.grid(*distance, *color)?;
            }
            Step::Bending { center, radius, strength } => {
                chain.bending(
                    center.unwrap_or(middle),
                    value(radius, "radius"),
                    value(strength, "strength"),
                )?;
            }
            Step::BulgePinch { center, radius, strength } => {
                chain.bulge_pinch(
                    center.unwrap_or(middle),
                    value(radius, "radius"),
                    value(strength, "strength"),
                )?;
            }
            Step::Crop { left, top, right, bottom } => {
                chain.crop(
                    value(left, "left"),
                    value(top, "top"),
                    value(right, "right"),
                    value(bottom, "bottom"),
                )?;
            }
            Step::Flip { vertical, horizontal } => {
                chain.flip(*vertical, *horizontal)?;
            }
            Step::MatrixWarp { matrix, inverse, space } => {
                chain.matrix_warp(matrix, *inverse, *space)?;
            }
            Step::Move { vertical, horizontal } => {
                chain.move_by(value(vertical, "vertical"), value(horizontal, "horizontal"))?;
            }
            Step::Perspective { before, after } => {
                chain.perspective(before, after)?;
            }
            Step::Rotate { angle } => {
                chain.rotate(value(angle, "angle"))?;
            }
            Step::Swirl { center, radius, angle } => {
                chain.swirl(
                    center.unwrap_or(middle),
                    value(radius, "radius"),
                    value(angle, "angle"),
                )?;
            }
            Step::Zoom { sx, sy } => {
                let sx = value(sx, "sx");
                chain.zoom(sx, sy.unwrap_or(sx))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
description = "warm portrait"
format = "rgba16f"

[[steps]]
effect = "brightness_contrast"
brightness = 0.1
contrast = 0.2

[[steps]]
effect = "curves"
red = [[0.0, 0.0], [0.5, 0.6], [1.0, 1.0]]

[[steps]]
effect = "gaussian"
size = 7
sigma = 1.5

[[steps]]
effect = "matrix_warp"
matrix = [1.0, 0.2, 0.0, 1.0]
space = "centered"

[[steps]]
effect = "move"
horizontal = 12.0

[[steps]]
effect = "flip"
vertical = true
"#;

    fn recipe(steps: &str) -> Result<Recipe, RecipeError> {
        Recipe::from_toml_str(&format!("version = 1\n{steps}"))
    }

    #[test]
    fn parses_sample_recipe() {
        let recipe = Recipe::from_toml_str(SAMPLE).expect("parse recipe");
        assert_eq!(recipe.format, PixelFormat::Rgba16Float);
        assert_eq!(recipe.description.as_deref(), Some("warm portrait"));
        assert_eq!(recipe.steps.len(), 6);
        assert_eq!(
            recipe.steps[3],
            Step::MatrixWarp {
                matrix: vec![1.0, 0.2, 0.0, 1.0],
                inverse: false,
                space: WarpSpace::Centered,
            }
        );
        assert_eq!(recipe.steps[4].name(), "move");
        assert_eq!(
            recipe.steps[5],
            Step::Flip {
                vertical: true,
                horizontal: false
            }
        );
        assert!(recipe.issues().is_empty());
    }

    #[test]
    fn format_defaults_to_rgba8() {
        let recipe = recipe("[[steps]]\neffect = \"skin\"\n").unwrap();
        assert_eq!(recipe.format, PixelFormat::Rgba8);
    }

    #[test]
    fn rejects_wrong_version_and_empty_recipes() {
        let err = Recipe::from_toml_str("version = 2\n[[steps]]\neffect = \"skin\"\n").unwrap_err();
        assert!(matches!(err, RecipeError::Invalid(_)));
        let err = Recipe::from_toml_str("version = 1\n").unwrap_err();
        assert!(matches!(err, RecipeError::Invalid(_)));
    }

    #[test]
    fn unknown_effects_and_bad_spaces_fail_to_parse() {
        let err = recipe("[[steps]]\neffect = \"glitch\"\n").unwrap_err();
        assert!(matches!(err, RecipeError::Parse(_)));
        let err = recipe("[[steps]]\neffect = \"matrix_warp\"\nmatrix = [1.0, 0.0, 0.0, 1.0]\nspace = \"polar\"\n")
            .unwrap_err();
        assert!(matches!(err, RecipeError::Parse(_)));
    }

    #[test]
    fn structural_parameters_are_validated() {
        for steps in [
            "[[steps]]\neffect = \"curves\"\nred = [[0.5, 0.5]]\n",
            "[[steps]]\neffect = \"curves\"\nred = [[0.0, 0.0], [1.0, 1.0]]\nblue = [[0.3, 0.0], [0.3, 1.0]]\n",
            "[[steps]]\neffect = \"matrix_warp\"\nmatrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]\n",
            "[[steps]]\neffect = \"perspective\"\nbefore = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]\nafter = [0.0, 0.0]\n",
            "[[steps]]\neffect = \"tilt_shift\"\nstart = [3.0, 3.0]\nend = [3.0, 3.0]\n",
        ] {
            let err = recipe(steps).unwrap_err();
            assert!(matches!(err, RecipeError::Invalid(_)), "{steps}: {err}");
        }

        let err = recipe("[[steps]]\neffect = \"curves\"\nred = [[0.2, 0.0], [0.2, 1.0]]\n")
            .unwrap_err();
        assert!(err.to_string().contains("red curve repeats an x value"), "{err}");
    }

    #[test]
    fn geometry_values_must_be_finite() {
        for (steps, name) in [
            ("[[steps]]\neffect = \"rotate\"\nangle = inf\n", "angle"),
            ("[[steps]]\neffect = \"zoom\"\nsx = 2.0\nsy = nan\n", "zoom"),
            ("[[steps]]\neffect = \"crop\"\nleft = -inf\n", "crop"),
            ("[[steps]]\neffect = \"lens_blur\"\nangle = nan\n", "angle"),
        ] {
            let err = recipe(steps).unwrap_err();
            assert!(matches!(err, RecipeError::Invalid(_)), "{steps}: {err}");
            assert!(err.to_string().contains(&format!("{name} values must be finite")), "{err}");
        }

        assert!(recipe("[[steps]]\neffect = \"rotate\"\nangle = 0.5\n").is_ok());
        assert!(recipe("[[steps]]\neffect = \"zoom\"\nsx = 2.0\n").is_ok());
        assert!(recipe("[[steps]]\neffect = \"crop\"\nright = 0.5\n").is_ok());
    }

    #[test]
    fn join_needs_an_earlier_snapshot() {
        let err = recipe("[[steps]]\neffect = \"join\"\nmask = \"edges\"\n").unwrap_err();
        assert!(err.to_string().contains("no earlier snapshot named 'edges'"), "{err}");

        let ok = recipe(
            "[[steps]]\neffect = \"snapshot\"\nname = \"edges\"\n\
             [[steps]]\neffect = \"ink\"\n\
             [[steps]]\neffect = \"join\"\nmask = \"edges\"\n",
        );
        assert!(ok.is_ok());

        let err = recipe(
            "[[steps]]\neffect = \"snapshot\"\nname = \"edges\"\n\
             [[steps]]\neffect = \"join\"\nmask = \"edges\"\n\
             [[steps]]\neffect = \"join\"\nmask = \"edges\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::Invalid(_)));
    }

    #[test]
    fn issues_report_values_that_will_be_clamped() {
        let recipe = recipe(
            "[[steps]]\neffect = \"sepia\"\namount = 3.0\n\
             [[steps]]\neffect = \"gaussian\"\nsize = 99\n\
             [[steps]]\neffect = \"split_tone\"\nhighlight = [1.5, 0.0, 0.0, 1.0]\n",
        )
        .unwrap();
        let issues = recipe.issues();
        assert_eq!(issues.len(), 3, "{issues:?}");
        assert_eq!(
            issues[0],
            Issue {
                step: 0,
                effect: "sepia",
                param: "amount",
                value: 3.0,
                clamped: 1.0
            }
        );
        assert_eq!(issues[1].clamped, 63.0);
        assert_eq!(issues[2].param, "highlight");
        assert!(issues[0].to_string().contains("clamped to 1"));
    }

    #[test]
    fn kernels_are_clamped_and_deduplicated() {
        let recipe = recipe(
            "[[steps]]\neffect = \"gaussian\"\n\
             [[steps]]\neffect = \"gaussian\"\nsize = 5\nsigma = 1.0\n\
             [[steps]]\neffect = \"gaussian\"\nsize = 200\nsigma = 1.0\n\
             [[steps]]\neffect = \"comic\"\n",
        )
        .unwrap();
        let kernels: Vec<(u32, f32)> = recipe
            .kernels()
            .iter()
            .map(|kernel| (kernel.size(), kernel.sigma()))
            .collect();
        assert_eq!(kernels, vec![(5, 1.0), (63, 1.0), (5, 0.8)]);
    }

    #[test]
    fn programs_cover_composite_effects() {
        let recipe = recipe("[[steps]]\neffect = \"comic\"\n[[steps]]\neffect = \"rotate\"\nangle = 0.3\n").unwrap();
        let effects: BTreeSet<&str> = recipe
            .programs()
            .iter()
            .map(|spec| spec.key().effect())
            .collect();
        for expected in [
            "difference_of_gaussians",
            "denoise",
            "brightness_quantization",
            "join",
            "gaussian",
            "matrix_warp",
        ] {
            assert!(effects.contains(expected), "missing {expected}: {effects:?}");
        }
        assert!(!effects.contains("sepia"));
    }

    #[test]
    fn every_catalogue_effect_except_join_has_a_step() {
        for entry in lumafx::catalogue() {
            let toml = match entry.name {
                "join" => continue,
                "curves" => "[[steps]]\neffect = \"curves\"\nred = [[0.0, 0.0], [1.0, 1.0]]\n".to_string(),
                "tilt_shift" => {
                    "[[steps]]\neffect = \"tilt_shift\"\nstart = [0.0, 0.0]\nend = [1.0, 1.0]\n".to_string()
                }
                "matrix_warp" => "[[steps]]\neffect = \"matrix_warp\"\nmatrix = [1.0, 0.0, 0.0, 1.0]\n".to_string(),
                "perspective" => {
                    "[[steps]]\neffect = \"perspective\"\nbefore = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]\nafter = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]\n".to_string()
                }
                name => format!("[[steps]]\neffect = \"{name}\"\n"),
            };
            let parsed = recipe(&toml).unwrap_or_else(|err| panic!("{}: {err}", entry.name));
            assert_eq!(parsed.steps[0].name(), entry.name);
        }
    }
}
