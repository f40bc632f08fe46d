use image::RgbImage;

use storycanvas::{CANVAS_HEIGHT, CANVAS_WIDTH, Region, RegionScorer, StoryCanvas};

const LONG: &str = "Grandes equipes nascem de pequenas atitudes todos dias";
const SHORT: &str = "Pense nisso";

fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut v = x.wrapping_mul(0x9E37_79B9) ^ y.wrapping_mul(0x85EB_CA6B) ^ seed;
    v ^= v >> 15;
    v = v.wrapping_mul(0x2C1B_3C6D);
    v ^ (v >> 12)
}

/// Top band speckled with skin tones at `skin_percent` density, the rest random.
fn speckled_canvas(skin_percent: u32, seed: u32) -> StoryCanvas {
    let img = RgbImage::from_fn(CANVAS_WIDTH, CANVAS_HEIGHT, |x, y| {
        let v = hash(x / 6, y / 6, seed);
        if y < CANVAS_HEIGHT / 3 && v % 100 < skin_percent {
            let shade = (v >> 8) as u8 % 40;
            image::Rgb([200 + shade / 2, 140 + shade, 110 + shade / 2])
        } else {
            image::Rgb([(v >> 4) as u8, (v >> 12) as u8, (v >> 20) as u8])
        }
    });
    StoryCanvas::from_image(img).unwrap()
}

#[test]
fn top_is_never_chosen_over_a_likely_person() {
    let scorer = RegionScorer::default();
    let mut vetoed = 0;
    for (i, skin) in [0u32, 10, 30, 60, 90, 100].into_iter().enumerate() {
        let canvas = speckled_canvas(skin, i as u32 * 7919);
        for (text, limit) in [(LONG, 0.2f32), (SHORT, 0.15)] {
            let d = scorer.score(&canvas, text, 150.0);
            let top = d.score_for(Region::Top).unwrap();
            if top.signals.person_likelihood > limit {
                vetoed += 1;
                assert_ne!(d.chosen, Region::Top, "skin {skin}% text {text:?}");
            }
        }
    }
    assert!(vetoed > 0, "no canvas exercised the person veto");
}

#[test]
fn every_decision_names_a_candidate_region() {
    let scorer = RegionScorer::default();
    for seed in 0..4 {
        let canvas = speckled_canvas(seed * 25, seed);
        let d = scorer.score(&canvas, LONG, 150.0);
        assert!(Region::ALL.contains(&d.chosen));
        assert!(d.scores.iter().all(|s| s.final_score.is_finite() && s.final_score >= 0.0));
    }
}

#[test]
fn identical_pixels_give_identical_decisions() {
    let scorer = RegionScorer::default();
    let a = speckled_canvas(40, 3);
    let b = speckled_canvas(40, 3);
    assert_eq!(scorer.score(&a, LONG, 150.0), scorer.score(&b, LONG, 150.0));
}
