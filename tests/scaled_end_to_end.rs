//! A toolbar pattern cut from a 1920x1080 screen, searched in a 1536x864
//! capture of the same UI rendered at 80%.

use anchormatch::{
    Calibration, Image, Locator, LocatorConfig, MatchRequest, Pattern, PatternMatcher, Rect,
    RgbImage, ScaleEstimator, ScaleFactor, Size, TargetId, TrackableTarget,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CAPTURE: Size = Size::new(1536, 864);
const NATIVE: Size = Size::new(1920, 1080);
const BLOCKS_X: usize = 12;
const BLOCKS_Y: usize = 8;
/// Where the scaled element sits in the capture.
const ELEMENT_AT: (usize, usize) = (300, 200);
/// Neighborhood the element is known to be in.
const HINT: Rect = Rect::new(260, 170, 140, 100);

fn block_colors(seed: u64) -> Vec<[u8; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..BLOCKS_X * BLOCKS_Y)
        .map(|_| {
            let mut px = [0u8; 3];
            for c in px.iter_mut() {
                *c = if rng.random_bool(0.5) { 255 } else { 0 };
            }
            px
        })
        .collect()
}

fn render_blocks(colors: &[[u8; 3]], block: usize) -> RgbImage {
    RgbImage::from_fn(BLOCKS_X * block, BLOCKS_Y * block, |x, y| {
        colors[(y / block) * BLOCKS_X + x / block]
    })
    .unwrap()
}

/// Pattern at native scale: 5px blocks, 60x40.
fn native_pattern(colors: &[[u8; 3]]) -> Pattern {
    Pattern::new("toolbar", render_blocks(colors, 5).to_image())
        .with_native_resolution(NATIVE)
        .with_region_hint(HINT)
}

/// Mid-gray capture with the element drawn at 4px blocks, 48x32.
fn scaled_capture(colors: &[[u8; 3]]) -> Image {
    let element = render_blocks(colors, 4);
    let (ex, ey) = ELEMENT_AT;
    RgbImage::from_fn(CAPTURE.width as usize, CAPTURE.height as usize, |x, y| {
        if (ex..ex + element.width()).contains(&x) && (ey..ey + element.height()).contains(&y) {
            *element.view().get(x - ex, y - ey).unwrap()
        } else {
            [128, 128, 128]
        }
    })
    .unwrap()
    .to_image()
}

#[test]
fn calibration_selects_point_eight() {
    let colors = block_colors(7);
    let pattern = native_pattern(&colors);
    let capture = scaled_capture(&colors);

    let estimator = ScaleEstimator::default();
    let outcome = estimator
        .calibrate(&Calibration::new(&pattern, &capture).with_region(HINT))
        .unwrap();

    assert_eq!(outcome.selected, Some(0.8));
    let best = outcome.best_score().unwrap();
    assert_eq!(best.factor, 0.8);
    assert_eq!(best.score, Some(1.0));
    assert_eq!(best.location, Some(Rect::new(300, 200, 48, 32)));
    let runner_up = outcome.runner_up_score().unwrap();
    assert!(runner_up.score.unwrap() <= 0.95, "runner-up {runner_up:?}");
}

#[test]
fn scaled_match_beats_naive_match() {
    let colors = block_colors(7);
    let pattern = native_pattern(&colors);
    let capture = scaled_capture(&colors);
    let id = TargetId::from("toolbar");
    let matcher = PatternMatcher::new();

    let scaled = matcher
        .find_matches(
            &MatchRequest::new(&id, &pattern, &capture)
                .region(Some(HINT))
                .min_similarity(0.85)
                .scale(ScaleFactor::Known(0.8)),
        )
        .unwrap();
    assert!(!scaled.is_empty());
    assert!(scaled[0].score >= 0.85);
    assert_eq!(scaled[0].rect, Rect::new(300, 200, 48, 32));

    let naive = matcher
        .find_matches(
            &MatchRequest::new(&id, &pattern, &capture)
                .region(Some(HINT))
                .min_similarity(0.0)
                .scale(ScaleFactor::Known(1.0)),
        )
        .unwrap();
    assert!(naive[0].score <= 0.70, "naive best {}", naive[0].score);
    assert_eq!(naive[0].rect.size(), Size::new(60, 40));
}

#[test]
fn resolution_ratio_alone_gives_point_eight() {
    let estimator = ScaleEstimator::default();
    assert_eq!(
        estimator.estimate(NATIVE, CAPTURE, None),
        ScaleFactor::Known(0.8)
    );
    assert_eq!(estimator.estimate(CAPTURE, CAPTURE, None), ScaleFactor::Known(1.0));
}

#[test]
fn locator_calibrates_then_finds() {
    let colors = block_colors(11);
    let capture = scaled_capture(&colors);
    let id = TargetId::from("toolbar");

    let mut locator = Locator::new(LocatorConfig::default());
    locator
        .add_target(TrackableTarget::new(id.clone()).with_pattern(native_pattern(&colors)))
        .unwrap();

    let outcome = locator.calibrate_scale(&id, &capture, Some(HINT)).unwrap();
    assert_eq!(outcome.selected, Some(0.8));
    assert_eq!(locator.scale_prior(&id), Some(0.8));
    assert_eq!(
        locator.estimate_scale(&id, CAPTURE).unwrap(),
        vec![ScaleFactor::Known(0.8)]
    );

    let found = locator.find_target(&id, &capture).unwrap();
    assert_eq!(found[0].rect, Rect::new(300, 200, 48, 32));
    assert_eq!(found[0].score, 1.0);
    assert_eq!(&*found[0].pattern, "toolbar");
}

#[test]
fn repeated_searches_are_identical() {
    let colors = block_colors(3);
    let pattern = native_pattern(&colors);
    let capture = scaled_capture(&colors);
    let id = TargetId::from("toolbar");
    let matcher = PatternMatcher::new();
    let req = MatchRequest::new(&id, &pattern, &capture)
        .region(Some(HINT))
        .min_similarity(0.5)
        .scale(ScaleFactor::Known(0.75));

    let first = matcher.find_matches(&req).unwrap();
    for _ in 0..3 {
        assert_eq!(matcher.find_matches(&req).unwrap(), first);
    }
}
