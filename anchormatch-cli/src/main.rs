use anchormatch::image::io::load_image;
use anchormatch::{
    CalibrationOutcome, CaptureSource, DisplayMetrics, FileCapture, FrameSequence, Locator,
    LocatorConfig, Match, MatchConfig, Pattern, Rect, RegionOffset, ScaleConfig, SearchRegion,
    SearchState, Size, TargetId, TrackableTarget,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "anchormatch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CaptureConfig {
    /// One screenshot file, searched once.
    File { path: PathBuf },
    /// A list of screenshots, searched in order.
    Frames { paths: Vec<PathBuf> },
}

#[derive(Debug, Deserialize)]
struct DisplayConfig {
    logical: [u32; 2],
    physical: [u32; 2],
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScaleConfigJson {
    candidates: Vec<f32>,
    min_margin: f32,
    axis_tolerance: f32,
}

impl Default for ScaleConfigJson {
    fn default() -> Self {
        let cfg = ScaleConfig::default();
        Self {
            candidates: cfg.candidates,
            min_margin: cfg.min_margin,
            axis_tolerance: cfg.axis_tolerance,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MatchConfigJson {
    max_matches: usize,
    nms_radius: Option<usize>,
    parallel: bool,
    timeout_ms: Option<u64>,
}

impl Default for MatchConfigJson {
    fn default() -> Self {
        let cfg = MatchConfig::default();
        Self {
            max_matches: cfg.max_matches,
            nms_radius: cfg.nms_radius,
            parallel: cfg.parallel,
            timeout_ms: cfg
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatternConfig {
    path: PathBuf,
    name: Option<String>,
    min_similarity: Option<f32>,
    native_resolution: Option<[u32; 2]>,
    region: Option<[i64; 4]>,
}

#[derive(Debug, Deserialize)]
struct DependencyConfig {
    anchor: String,
    #[serde(default)]
    offset: [i32; 4],
}

#[derive(Debug, Deserialize)]
struct TargetConfig {
    id: String,
    patterns: Vec<PatternConfig>,
    region: Option<[i64; 4]>,
    depends_on: Option<DependencyConfig>,
}

#[derive(Debug, Deserialize)]
struct CalibrateConfig {
    target: String,
    region: Option<[i64; 4]>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    capture: Option<CaptureConfig>,
    display: Option<DisplayConfig>,
    default_min_similarity: f32,
    scale: ScaleConfigJson,
    #[serde(rename = "match")]
    match_cfg: MatchConfigJson,
    background: [u8; 3],
    targets: Vec<TargetConfig>,
    calibrate: Option<CalibrateConfig>,
    output_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let cfg = LocatorConfig::default();
        Self {
            capture: None,
            display: None,
            default_min_similarity: cfg.default_min_similarity,
            scale: ScaleConfigJson::default(),
            match_cfg: MatchConfigJson::default(),
            background: cfg.background,
            targets: Vec::new(),
            calibrate: None,
            output_path: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct MatchRecord {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    score: f32,
    pattern: String,
}

impl From<&Match> for MatchRecord {
    fn from(value: &Match) -> Self {
        Self {
            x: value.rect.x,
            y: value.rect.y,
            width: value.rect.width,
            height: value.rect.height,
            score: value.score,
            pattern: value.pattern.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TargetRecord {
    id: String,
    /// Searched rectangle; `null` means the whole capture or no search.
    region: Option<[i64; 4]>,
    state: &'static str,
    matches: Vec<MatchRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct FrameRecord {
    index: usize,
    targets: Vec<TargetRecord>,
}

#[derive(Debug, Serialize)]
struct CandidateRecord {
    factor: f32,
    score: Option<f32>,
}

#[derive(Debug, Serialize)]
struct CalibrationRecord {
    target: String,
    selected: Option<f32>,
    candidates: Vec<CandidateRecord>,
}

impl CalibrationRecord {
    fn new(target: &TargetId, outcome: &CalibrationOutcome) -> Self {
        Self {
            target: target.to_string(),
            selected: outcome.selected,
            candidates: outcome
                .scores
                .iter()
                .map(|s| CandidateRecord {
                    factor: s.factor,
                    score: s.score,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<CalibrationRecord>,
    frames: Vec<FrameRecord>,
}

fn to_rect(r: [i64; 4]) -> Result<Rect, Box<dyn std::error::Error>> {
    Ok(Rect::new(
        i32::try_from(r[0])?,
        i32::try_from(r[1])?,
        u32::try_from(r[2])?,
        u32::try_from(r[3])?,
    ))
}

fn from_rect(r: Rect) -> [i64; 4] {
    [
        i64::from(r.x),
        i64::from(r.y),
        i64::from(r.width),
        i64::from(r.height),
    ]
}

fn state_name(state: SearchState) -> &'static str {
    match state {
        SearchState::Unsearched => "unsearched",
        SearchState::Found => "found",
        SearchState::NotFound => "not_found",
    }
}

fn load_pattern(cfg: &PatternConfig) -> Result<Pattern, Box<dyn std::error::Error>> {
    let image = load_image(&cfg.path)?;
    let name = match &cfg.name {
        Some(name) => name.clone(),
        None => file_stem(&cfg.path),
    };
    let mut pattern = Pattern::new(name, image);
    if let Some(min) = cfg.min_similarity {
        pattern = pattern.with_min_similarity(min);
    }
    if let Some([w, h]) = cfg.native_resolution {
        pattern = pattern.with_native_resolution(Size::new(w, h));
    }
    if let Some(region) = cfg.region {
        pattern = pattern.with_region_hint(to_rect(region)?);
    }
    Ok(pattern)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_locator(config: &Config) -> Result<Locator, Box<dyn std::error::Error>> {
    let locator_cfg = LocatorConfig {
        default_min_similarity: config.default_min_similarity,
        matching: MatchConfig {
            max_matches: config.match_cfg.max_matches,
            nms_radius: config.match_cfg.nms_radius,
            parallel: config.match_cfg.parallel,
            timeout: config.match_cfg.timeout_ms.map(Duration::from_millis),
        },
        scale: ScaleConfig {
            candidates: config.scale.candidates.clone(),
            min_margin: config.scale.min_margin,
            axis_tolerance: config.scale.axis_tolerance,
        },
        background: config.background,
    };
    let mut locator = Locator::new(locator_cfg);
    if let Some(display) = &config.display {
        let metrics = DisplayMetrics::new(
            Size::new(display.logical[0], display.logical[1]),
            Size::new(display.physical[0], display.physical[1]),
        );
        locator = locator.with_display_metrics(Arc::new(metrics));
    }

    // Anchors may be listed after their dependents, so edges go in last.
    for target_cfg in &config.targets {
        let mut target = TrackableTarget::new(target_cfg.id.as_str());
        for pattern_cfg in &target_cfg.patterns {
            target = target.with_pattern(load_pattern(pattern_cfg)?);
        }
        if let Some(region) = target_cfg.region {
            target = target.with_region(to_rect(region)?);
        }
        locator.add_target(target)?;
    }
    for target_cfg in &config.targets {
        if let Some(dep) = &target_cfg.depends_on {
            let [x, y, w, h] = dep.offset;
            locator.register_dependency(
                &TargetId::from(target_cfg.id.as_str()),
                &TargetId::from(dep.anchor.as_str()),
                RegionOffset::new(x, y, w, h),
            )?;
        }
    }
    Ok(locator)
}

fn search_frame(locator: &Locator, capture: &anchormatch::Image, index: usize) -> FrameRecord {
    let mut targets = Vec::new();
    for id in locator.search_order() {
        // Results from an earlier frame must not anchor this one.
        locator.clear_matches(&id);
    }
    for id in locator.search_order() {
        let region = locator.resolve_search_region(&id).ok().and_then(|r| match r {
            SearchRegion::Full => None,
            SearchRegion::Area(rect) => Some(from_rect(rect)),
        });
        let (matches, error) = match locator.find_target(&id, capture) {
            Ok(found) => (found.iter().map(MatchRecord::from).collect(), None),
            Err(err) => {
                tracing::warn!(target_id = id.as_str(), error = %err, "search failed");
                (Vec::new(), Some(err.to_string()))
            }
        };
        tracing::info!(target_id = id.as_str(), matches = matches.len(), "target searched");
        targets.push(TargetRecord {
            id: id.to_string(),
            region,
            state: state_name(locator.search_state(&id)),
            matches,
            error,
        });
    }
    FrameRecord { index, targets }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("anchormatch=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.targets.is_empty() {
        return Err("at least one target must be configured".into());
    }
    if config.match_cfg.max_matches == 0 {
        return Err("match.max_matches must be at least 1".into());
    }

    let (source, frames): (Box<dyn CaptureSource>, usize) = match &config.capture {
        Some(CaptureConfig::File { path }) => (Box::new(FileCapture::new(path)), 1),
        Some(CaptureConfig::Frames { paths }) => {
            let images = paths.iter().map(load_image).collect::<Result<Vec<_>, _>>()?;
            (Box::new(FrameSequence::new(images)), paths.len())
        }
        None => return Err("capture must be set in the config".into()),
    };
    let locator = build_locator(&config)?;

    let mut output = Output {
        calibration: None,
        frames: Vec::with_capacity(frames),
    };
    for index in 0..frames {
        let capture = source.capture()?;
        if index == 0 {
            if let Some(cal) = &config.calibrate {
                let id = TargetId::from(cal.target.as_str());
                let region = cal.region.map(to_rect).transpose()?;
                let outcome = locator.calibrate_scale(&id, &capture, region)?;
                output.calibration = Some(CalibrationRecord::new(&id, &outcome));
            }
        }
        output.frames.push(search_frame(&locator, &capture, index));
    }

    let json = serde_json::to_string_pretty(&output)?;
    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
