//! Synthetic scene builders shared by the integration tests.

use cucumeter_common::PixelRect;
use image::{Rgb, RgbImage};

pub const BACKGROUND: Rgb<u8> = Rgb([70u8, 70, 70]);
pub const SHEET_WHITE: Rgb<u8> = Rgb([235u8, 235, 235]);
pub const PRODUCE_GREEN: Rgb<u8> = Rgb([40u8, 130, 45]);
pub const NEUTRAL_GRAY: Rgb<u8> = Rgb([90u8, 90, 90]);

/// Dark tabletop with a bright reference sheet.
pub fn sheet_scene(width: u32, height: u32, sheet: PixelRect) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    paint_rect(&mut img, sheet, SHEET_WHITE);
    img
}

pub fn paint_rect(img: &mut RgbImage, rect: PixelRect, color: Rgb<u8>) {
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}
