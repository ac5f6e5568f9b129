use adcensus_stereo::core::ADCensusOption;
use adcensus_stereo::{utils, ADCensus};

use log::{debug, info};

pub fn main() {
    // 初始化日志
    utils::init_log("debug");

    let mut args = std::env::args().skip(1);
    let left_path = args.next().unwrap_or_else(|| "images/left.png".to_string());
    let right_path = args.next().unwrap_or_else(|| "images/right.png".to_string());

    let limg = image::open(&left_path).unwrap().to_rgb8();
    let rimg = image::open(&right_path).unwrap().to_rgb8();

    // 1. 源图处理
    let limg = image::imageops::blur(&limg, 1.0);
    let rimg = image::imageops::blur(&rimg, 1.0);
    let left_bgr = utils::to_bgr_bytes(&limg);
    let right_bgr = utils::to_bgr_bytes(&rimg);

    let option = ADCensusOption::new(0, 64)
        .set_lrcheck_thres(1.0f32)
        .set_do_lr_check(true)
        .set_do_filling(true)
        .set_irv_th(0.4)
        .set_irv_ts(20)
        .set_do_discontinuity_adjustment(false)
        .build();

    let (width, height) = limg.dimensions();
    let mut stereo = ADCensus::new(width, height, Some(option)).unwrap();
    let mut disparity = vec![0f32; (width * height) as usize];

    let mut sw = stopwatch::Stopwatch::start_new();
    stereo
        .matching(&left_bgr, &right_bgr, &mut disparity)
        .unwrap();
    info!("matching elapse time: {}ms", sw.elapsed_ms());

    sw.restart();
    utils::to_disparity_image(&stereo.disparity_left())
        .unwrap()
        .save("display-left.png")
        .unwrap();
    utils::to_disparity_image(&stereo.disparity_right())
        .unwrap()
        .save("display-right.png")
        .unwrap();
    debug!(
        "[match] save disparity image. elapse time: {}ms",
        sw.elapsed_ms()
    );
}
