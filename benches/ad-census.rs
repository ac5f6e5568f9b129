use adcensus_stereo::core::ADCensusOption;
use adcensus_stereo::ADCensus;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// xorshift32 伪随机噪声影像
fn noise_bgr(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let n = (width * height * 3) as usize;
    let mut state = seed;
    let mut buf = Vec::with_capacity(n);
    for _ in 0..n {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        buf.push((state >> 24) as u8);
    }
    buf
}

fn shifted_right(left: &[u8], width: u32, height: u32, shift: usize) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut right = vec![0u8; w * h * 3];
    for y in 0..h {
        for x in 0..w {
            if x + shift < w {
                for c in 0..3 {
                    right[(y * w + x) * 3 + c] = left[(y * w + x + shift) * 3 + c];
                }
            }
        }
    }
    right
}

pub fn adcensus_matching_bench(c: &mut Criterion) {
    let (width, height) = (160u32, 120u32);
    let left = noise_bgr(width, height, 0x2F6E_2B1C);
    let right = shifted_right(&left, width, height, 5);

    let option = ADCensusOption::new(0, 32)
        .set_lrcheck_thres(1.0f32)
        .set_do_lr_check(true)
        .set_do_filling(true)
        .set_irv_th(0.4)
        .set_irv_ts(20)
        .set_do_discontinuity_adjustment(false)
        .build();

    let mut stereo = ADCensus::new(width, height, Some(option)).unwrap();
    let mut out = vec![0f32; (width * height) as usize];

    let mut group = c.benchmark_group("ad-census");
    group.sample_size(10);
    group.bench_function("ad-census match bench", |b| {
        b.iter(|| {
            stereo
                .matching(black_box(&left), black_box(&right), &mut out)
                .unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, adcensus_matching_bench);
criterion_main!(benches);
