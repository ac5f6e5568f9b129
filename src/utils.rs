use image::{GrayImage, RgbImage};
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use ndarray::{par_azip, prelude::*, Zip};

use ndarray_stats::QuantileExt;
use nshare::ToNdarray3;

pub fn init_log(level: &str) {
    let stdout: ConsoleAppender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{h({l})}] - {m}{n}",
        )))
        .build();
    let log_config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(
            Root::builder()
                .appender("stdout")
                .build(if level == "trace" {
                    LevelFilter::Trace
                } else if level == "debug" {
                    LevelFilter::Debug
                } else {
                    LevelFilter::Info
                }),
        )
        .unwrap();
    log4rs::init_config(log_config).unwrap();
}

/// 像素色差, 取 B/G/R 三通道绝对差的最大值
pub fn pixel_distance(p1: &[u8], p2: &[u8]) -> i32 {
    (p1[0] as i32 - p2[0] as i32)
        .abs()
        .max((p1[1] as i32 - p2[1] as i32).abs())
        .max((p1[2] as i32 - p2[2] as i32).abs())
}

/// 像素色差, 取 B/G/R 三通道绝对差之和
pub fn pixel_distance_l1(p1: &[u8], p2: &[u8]) -> i32 {
    (p1[0] as i32 - p2[0] as i32).abs()
        + (p1[1] as i32 - p2[1] as i32).abs()
        + (p1[2] as i32 - p2[2] as i32).abs()
}

/// 计算census序列的汉明距离
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// 3x3中值滤波
///
/// 边界像素取窗口内有效坐标部分的中值。无效值(NaN)排序时排在所有有限值之后,
/// 窗口中值落在无效值上时结果保持无效。
pub fn median_filter_3x3(source: &ArrayView2<f32>) -> Array2<f32> {
    let (height, width) = source.dim();
    let mut ret = Array2::<f32>::zeros((height, width));
    Zip::indexed(&mut ret).par_for_each(|(y, x), out| {
        let mut wnd: Vec<f32> = Vec::with_capacity(9);
        for r in -1i32..=1 {
            for c in -1i32..=1 {
                let yy = y as i32 + r;
                let xx = x as i32 + c;
                if yy < 0 || yy >= height as i32 || xx < 0 || xx >= width as i32 {
                    continue;
                }
                wnd.push(source[(yy as usize, xx as usize)]);
            }
        }
        wnd.sort_by(|a, b| match (a.is_nan(), b.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => a.partial_cmp(b).unwrap(),
        });
        *out = wnd[wnd.len() / 2];
    });
    ret
}

/// 将 RgbImage 转换为 H x W x 3 的 BGR 交错字节缓冲区
pub fn to_bgr_bytes(source: &RgbImage) -> Vec<u8> {
    let mut nd = source.clone().into_ndarray3();
    // (C, H, W) -> (H, W, C)
    nd.swap_axes(0, 1);
    nd.swap_axes(1, 2);
    // RGB -> BGR
    let bgr = nd.slice(s![.., .., ..;-1]);
    bgr.to_owned().into_raw_vec()
}

/// 将视差图归一化转换为灰度图, 无效值(NaN)按0处理
pub fn to_disparity_image(source: &ArrayView2<f32>) -> Option<GrayImage> {
    let (height, width) = source.dim();
    let mut abs_source = Array2::<f32>::zeros((height, width));
    par_azip!((r in &mut abs_source, s in source) {
        if s.is_nan() {
            *r = 0f32;
        } else {
            *r = s.abs();
        }
    });
    let disparity_min = *abs_source.min().ok()?;
    let d = *abs_source.max().ok()? - disparity_min;
    let d = if d > 0f32 { d } else { 1f32 };
    let mut ret = Array2::<u8>::zeros((height, width));
    par_azip!((r in &mut ret, s in abs_source.view()) {
        *r = ((s - disparity_min) / d * 255f32) as u8;
    });
    GrayImage::from_raw(width as u32, height as u32, ret.into_raw_vec())
}
