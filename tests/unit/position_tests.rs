// Keyword placement tables for legacy positioning

use boothmark::watermark::position::{
    calculate_position, calculate_text_anchor, fit_logo, ImageDimensions, PlacementPosition,
    WatermarkDimensions,
};
use boothmark::watermark::WatermarkPosition;
use rstest::rstest;

const IMAGE: ImageDimensions = ImageDimensions {
    width: 800,
    height: 1200,
};

#[rstest]
#[case("top-left", 20, 20)]
#[case("top-center", 350, 20)]
#[case("top-right", 680, 20)]
#[case("center-left", 20, 575)]
#[case("center", 350, 575)]
#[case("center-right", 680, 575)]
#[case("bottom-left", 20, 1130)]
#[case("bottom-center", 350, 1130)]
#[case("bottom-right", 680, 1130)]
#[case("nowhere", 680, 1130)]
fn logo_keyword_placement(#[case] keyword: &str, #[case] x: i32, #[case] y: i32) {
    let logo = WatermarkDimensions {
        width: 100,
        height: 50,
    };
    let position = WatermarkPosition::parse_or_default(Some(keyword));
    assert_eq!(
        calculate_position(position, &IMAGE, &logo, 20),
        PlacementPosition::new(x, y)
    );
}

#[rstest]
#[case(WatermarkPosition::TopLeft, 20.0, 40.0)]
#[case(WatermarkPosition::Center, 350.0, 600.0)]
#[case(WatermarkPosition::CenterRight, 680.0, 600.0)]
#[case(WatermarkPosition::BottomCenter, 350.0, 1180.0)]
#[case(WatermarkPosition::BottomRight, 680.0, 1180.0)]
fn text_keyword_anchor(#[case] position: WatermarkPosition, #[case] x: f64, #[case] y: f64) {
    assert_eq!(calculate_text_anchor(position, &IMAGE, 100.0, 20.0), (x, y));
}

#[rstest]
#[case((1000, 100), (120, 12))]
#[case((100, 1000), (18, 180))]
#[case((400, 400), (120, 120))]
#[case((60, 90), (60, 90))]
fn logo_clamp_keeps_aspect(#[case] natural: (u32, u32), #[case] expected: (u32, u32)) {
    let fitted = fit_logo(
        &WatermarkDimensions {
            width: natural.0,
            height: natural.1,
        },
        &IMAGE,
        0.15,
    );
    assert_eq!((fitted.width, fitted.height), expected);
    assert!(fitted.width as f64 <= 120.0 && fitted.height as f64 <= 180.0);
}
