#![cfg(feature = "rayon")]

use anchormatch::lowlevel::{scan_sad, scan_sad_par};
use anchormatch::{
    CancelToken, MatchConfig, MatchError, MatchRequest, Pattern, PatternMatcher, Rect, RgbImage,
    ScaleFactor, SearchControl, TargetId,
};
use std::thread;
use std::time::Duration;

fn make_image(width: usize, height: usize) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        [
            (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8,
            (((x * 5) + (y * 11)) & 0xFF) as u8,
            ((x ^ (y * 3)) & 0xFF) as u8,
        ]
    })
    .unwrap()
}

fn crop(src: &RgbImage, x0: usize, y0: usize, w: usize, h: usize) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| *src.view().get(x0 + x, y0 + y).unwrap()).unwrap()
}

#[test]
fn parallel_scan_matches_sequential_scan() {
    let image = make_image(120, 90);
    let tpl = crop(&image, 40, 30, 16, 12);
    let control = SearchControl::new();

    for threshold in [0.0, 0.6, 0.95] {
        let seq = scan_sad(image.view(), tpl.view(), threshold, &control).unwrap();
        let par = scan_sad_par(image.view(), tpl.view(), threshold, &control).unwrap();
        assert_eq!(seq, par, "threshold {threshold}");
    }
}

#[test]
fn parallel_matcher_matches_sequential_matcher() {
    let image = make_image(160, 120).to_image();
    let tpl = crop(&make_image(160, 120), 50, 40, 20, 16);
    let pattern = Pattern::new("tile", tpl.to_image());
    let id = TargetId::from("tile");

    let sequential = PatternMatcher::new();
    let parallel = PatternMatcher::new().with_config(MatchConfig {
        parallel: true,
        ..MatchConfig::default()
    });

    for scale in [1.0, 0.8, 1.25] {
        for region in [None, Some(Rect::new(30, 20, 90, 70))] {
            let req = MatchRequest::new(&id, &pattern, &image)
                .region(region)
                .min_similarity(0.5)
                .scale(ScaleFactor::Known(scale));
            assert_eq!(
                sequential.find_matches(&req).unwrap(),
                parallel.find_matches(&req).unwrap(),
                "scale {scale}, region {region:?}"
            );
        }
    }
}

#[test]
fn parallel_scan_stops_when_cancelled_mid_scan() {
    let image = make_image(700, 700);
    let tpl = make_image(48, 48);
    let token = CancelToken::new();
    let control = SearchControl::new().with_cancel(token.clone());

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        token.cancel();
    });
    let result = scan_sad_par(image.view(), tpl.view(), 0.0, &control);
    canceller.join().unwrap();
    assert_eq!(result, Err(MatchError::Cancelled));
}

#[test]
fn parallel_matcher_honors_deadline() {
    let image = make_image(700, 700).to_image();
    let pattern = Pattern::new("tile", make_image(48, 48).to_image());
    let id = TargetId::from("tile");
    let matcher = PatternMatcher::new().with_config(MatchConfig {
        parallel: true,
        ..MatchConfig::default()
    });
    let req = MatchRequest::new(&id, &pattern, &image)
        .min_similarity(0.0)
        .control(SearchControl::new().with_timeout(Duration::from_millis(30)));
    assert!(matches!(
        matcher.find_matches(&req),
        Err(MatchError::Timeout { .. })
    ));
}
